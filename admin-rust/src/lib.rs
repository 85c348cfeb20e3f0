mod coordinator;
mod dashboard;
mod errors;
mod inbox;
mod lifecycle;
mod listing;
pub mod opentelemetry;
mod resource_list;
mod retry;

pub use coordinator::{DeleteOutcome, ImageCleanup, OrphanPolicy, ResourceCoordinator};
pub use dashboard::{
    CardState, DashboardAggregator, DashboardMount, DashboardOptions, DashboardSnapshot,
    RefreshOutcome, RATE_LIMIT_GUIDANCE,
};
pub use errors::{AdminError, AdminResult};
pub use inbox::ContactInbox;
pub use lifecycle::{LifecycleObserver, LifecyclePhase};
pub use listing::ListingView;
pub use resource_list::ResourceList;
pub use retry::RetryPolicy;
