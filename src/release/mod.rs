// ABOUTME: Release records and the batch controller that drives them.
// ABOUTME: Batches move Requested -> Tagging -> Verifying -> Staged -> Deploying -> Committed | RolledBack.

mod batch;
mod cancel;
mod controller;
mod journal;
mod model;

pub use batch::{
    BatchFailure, BatchFailureKind, BatchReport, BatchRequest, BatchState, ReleaseRequest,
};
pub use cancel::CancelToken;
pub use controller::{Backends, ReleaseController};
pub use journal::{BatchJournal, JournalError};
pub use model::{Release, ReleaseStatus};
