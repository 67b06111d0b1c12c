//! Indexing pipeline: status tracking and run orchestration.

pub mod coordinator;
pub mod status;

pub use coordinator::{IndexingCoordinator, NO_DESCRIPTION, RunOutcome};
pub use status::{IndexingStatus, StatusTracker};
