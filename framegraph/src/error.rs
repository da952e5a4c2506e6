//! Frame graph construction errors.

use thiserror::Error;

use crate::graph::ResourceIndex;

/// Errors raised while registering nodes in a [`FrameGraph`](crate::FrameGraph).
///
/// Registration is all-or-nothing: a failed call leaves the graph unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A resource with this name is already registered.
    #[error("resource `{0}` is already registered")]
    DuplicateResourceName(String),
    /// A pass with this name is already registered.
    #[error("pass `{0}` is already registered")]
    DuplicatePassName(String),
    /// Pass names must not be empty.
    #[error("pass name must not be empty")]
    EmptyPassName,
    /// A copy pass must have as many outputs as inputs.
    #[error("copy pass `{pass}` has {inputs} inputs but {outputs} outputs")]
    CopyArityMismatch {
        pass: String,
        inputs: usize,
        outputs: usize,
    },
    /// The index does not refer to a registered resource.
    #[error("resource {0} is not registered")]
    UnknownResource(ResourceIndex),
    /// No resource is registered under this name.
    #[error("unknown resource name `{0}`")]
    UnknownResourceName(String),
    /// No pass is registered under this name.
    #[error("unknown pass name `{0}`")]
    UnknownPassName(String),
    /// The resource is already the source of another move.
    #[error("resource {0} is already moved out")]
    MoveOutConflict(ResourceIndex),
    /// The resource is already the destination of another move.
    #[error("resource {0} is already moved into")]
    MoveInConflict(ResourceIndex),
    /// A resource cannot be moved into itself.
    #[error("resource {0} cannot be moved into itself")]
    SelfMove(ResourceIndex),
}
