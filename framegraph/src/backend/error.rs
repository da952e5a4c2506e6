//! Backend error types.

use thiserror::Error;

use crate::graph::{PassIndex, ResourceIndex};

/// Errors that can occur in backend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The resource was registered as neither imported nor temporal.
    #[error("resource {0} is not registered with the backend")]
    UnregisteredResource(ResourceIndex),
    /// The resource has no storage bound.
    #[error("resource {0} is not constructed")]
    NotConstructed(ResourceIndex),
    /// The resource already has storage bound.
    #[error("resource {0} is already constructed")]
    AlreadyConstructed(ResourceIndex),
    /// The allocator could not create a new instance.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),
    /// The pass does not belong to the graph.
    #[error("pass {0} is not part of the graph")]
    UnknownPass(PassIndex),
}
