pub mod erp;
pub mod mapping_service;
pub mod notification_service;
pub mod preflight_service;
pub mod proposal_service;
pub mod snapshot_resolver;

pub use mapping_service::MappingService;
pub use notification_service::{
    LogNotificationSink, NotificationSink, SyncErrorNotice, WebhookNotificationSink,
};
pub use preflight_service::{PreflightPath, PreflightReport, PreflightService};
pub use proposal_service::ProposalService;
pub use snapshot_resolver::{ResolveContext, ResolveOutcome, SnapshotResolver};
