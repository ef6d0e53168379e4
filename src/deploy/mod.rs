// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Exports the orchestrator, attempt records, state markers, and deploy lock.

mod attempt;
mod deployment;
mod error;
mod lock;
mod orchestrator;
mod state;
mod transitions;

pub use attempt::{DeployOutcome, DeploymentAttempt, ServiceHealth};
pub use deployment::{Activation, Deployment};
pub use error::{DeployError, DeployErrorKind};
pub use lock::{DeployLock, LockInfo};
pub use orchestrator::{deploy, restore};
pub use state::{HealthChecked, ImagesPulled, Initialized, Restarted};
pub use transitions::TransitionResult;
