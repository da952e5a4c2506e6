//! # UFG FrameGraph
//!
//! Frame graph compiler: turns a declarative description of a frame's work
//! into a validated execution schedule.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`FrameGraph`] - Named resources, and passes reading and writing them
//! - [`compile`] - Pass ordering, resource lifetimes and storage moves
//! - [`ResourceBackend`] - Trait binding concrete storage to resources, with
//!   the in-memory [`PooledBackend`]
//! - [`Executor`] and [`ParallelExecutor`] - Drive passes and resource events
//!
//! ## Example
//!
//! ```
//! use ufg_framegraph::{Executor, FrameGraph, PooledBackend};
//!
//! let mut graph = FrameGraph::new("frame");
//! let depth = graph.register_resource_node("depth").unwrap();
//! let color = graph.register_resource_node("color").unwrap();
//! graph.register_general_pass_node("depth_prepass", vec![], vec![depth]).unwrap();
//! graph.register_general_pass_node("shade", vec![depth], vec![color]).unwrap();
//!
//! let compiled = graph.compile().unwrap();
//!
//! let mut backend = PooledBackend::<&str, u32, ()>::new(|_| Ok(0));
//! backend.register_temporal(depth, "d32");
//! backend.register_temporal(color, "rgba16f");
//!
//! Executor::new()
//!     .execute(&graph, &compiled, &mut backend, |_pass, node, resources| {
//!         log::info!("{} uses {} resources", node.name(), resources.len());
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

pub mod backend;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod graph;

// Re-export main types for convenience
pub use backend::{BackendError, PassResources, PooledBackend, ResourceBackend};
pub use compiler::{
    CompileError, CompileResult, CyclicDependencyError, PassInfo, ResourceInfo, StructuralError,
    compile, compile_into,
};
pub use error::GraphError;
pub use executor::{ExecuteError, Executor, ExecutorConfig, ParallelExecutor, PassFailure};
pub use graph::{
    FrameGraph, MoveIndex, MoveNode, PassIndex, PassKind, PassNode, ResourceIndex, ResourceNode,
};

/// FrameGraph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library versions.
pub fn init() {
    ufg_core::init();
    log::info!("UFG FrameGraph v{} initialized", VERSION);
}
