pub mod mapping;
pub mod proposal;
pub mod snapshot;
pub mod sync_record;

pub use mapping::*;
pub use proposal::*;
pub use snapshot::*;
pub use sync_record::*;
