// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Service names, image references, version labels, and phantom-typed ids.

mod id;
mod image_ref;
mod service_name;
mod version;

pub use id::{BatchId, CommitId, Id};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use service_name::{ServiceName, ServiceNameError};
pub use version::{VersionLabel, VersionLabelError};
