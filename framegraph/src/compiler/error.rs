//! Compilation errors.

use thiserror::Error;

use crate::graph::{PassIndex, ResourceIndex};

/// A resource is used in a way no schedule can satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// Two general passes write the same resource.
    #[error("resource {resource} is written by both pass {first} and pass {second}")]
    MultipleWriters {
        resource: ResourceIndex,
        first: PassIndex,
        second: PassIndex,
    },
    /// Two copy passes copy into the same resource.
    #[error("resource {resource} is copied into by both pass {first} and pass {second}")]
    MultipleCopyIns {
        resource: ResourceIndex,
        first: PassIndex,
        second: PassIndex,
    },
    /// A resource is the source of two moves.
    #[error("resource {resource} is moved into both {first_dst} and {second_dst}")]
    MoveOutConflict {
        resource: ResourceIndex,
        first_dst: ResourceIndex,
        second_dst: ResourceIndex,
    },
    /// A resource is the destination of two moves.
    #[error("resource {resource} receives moves from both {first_src} and {second_src}")]
    MoveInConflict {
        resource: ResourceIndex,
        first_src: ResourceIndex,
        second_src: ResourceIndex,
    },
    /// A chain of moves leads back to where it started.
    #[error("resource {resource} is part of a move cycle")]
    MoveCycle { resource: ResourceIndex },
}

/// The pass dependencies contain a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CyclicDependencyError {
    /// Passes that could not be scheduled, in ascending order.
    #[error("pass graph is not a DAG: {} passes are part of or behind a cycle", .remaining.len())]
    NotADag { remaining: Vec<PassIndex> },
}

/// Errors that can occur during frame graph compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Cyclic(#[from] CyclicDependencyError),
}
