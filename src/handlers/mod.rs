pub mod erp_directory;
pub mod mappings;
pub mod proposals;
