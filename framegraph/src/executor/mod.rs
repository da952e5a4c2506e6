//! Frame graph execution.
//!
//! Executors walk a [`CompileResult`] and drive a [`ResourceBackend`] with its
//! resource events while running user-supplied pass work:
//!
//! 1. The prologue: constructs, moves, destructs of resources no pass touches
//! 2. For every pass: constructs, [`request_pass_resources`], the pass work,
//!    moves, destructs
//!
//! [`Executor`] runs passes one at a time in
//! [`sorted_passes`](CompileResult::sorted_passes) order. [`ParallelExecutor`]
//! runs independent passes concurrently on a scoped worker pool.
//!
//! [`request_pass_resources`]: ResourceBackend::request_pass_resources

mod parallel;

pub use parallel::ParallelExecutor;

use thiserror::Error;

use crate::backend::{BackendError, PassResources, ResourceBackend};
use crate::compiler::{CompileResult, PassInfo};
use crate::graph::{FrameGraph, PassIndex, PassNode, ResourceIndex};

/// Error returned by pass work.
pub type PassFailure = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while executing a compiled frame graph.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The backend rejected a resource event.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    /// The work of a pass returned an error.
    #[error("pass {pass} `{name}` failed: {source}")]
    PassFailed {
        pass: PassIndex,
        name: String,
        #[source]
        source: PassFailure,
    },
    /// The compile result was not produced from this graph.
    #[error("compile result does not match the graph: {0}")]
    ResultMismatch(String),
    /// Pass work panicked on a worker thread.
    #[error("pass work panicked on a worker thread")]
    WorkerPanicked,
}

/// Configuration for [`ParallelExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    worker_count: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self { worker_count }
    }
}

impl ExecutorConfig {
    /// Create a configuration using the available parallelism.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads (at least one).
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Get the number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

/// Sequential executor.
///
/// Passes run on the calling thread in compiled order, so pass work only needs
/// to be `FnMut`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    /// Create a sequential executor.
    pub fn new() -> Self {
        Self
    }

    /// Execute every pass of `result`.
    ///
    /// Stops at the first failing backend event or pass and returns its error.
    pub fn execute<B, F>(
        &self,
        graph: &FrameGraph,
        result: &CompileResult,
        backend: &mut B,
        mut work: F,
    ) -> Result<(), ExecuteError>
    where
        B: ResourceBackend,
        F: FnMut(PassIndex, &PassNode, &PassResources<B::Handle>) -> Result<(), PassFailure>,
    {
        ufg_core::profile_function!();
        check_result(graph, result)?;
        log::debug!(
            "Executor: running '{}' ({} passes)",
            graph.name(),
            result.pass_count()
        );

        apply_prologue(graph, result, backend)?;

        for &pass in result.sorted_passes() {
            let node = pass_node(graph, pass)?;
            let info = pass_info(result, pass)?;
            ufg_core::profile_scope_dynamic!(node.name());

            for &resource in info.construct_resources() {
                backend.construct(graph, resource)?;
            }
            let resources = backend.request_pass_resources(graph, pass)?;
            run_pass(pass, node, || work(pass, node, &resources))?;
            apply_moves(graph, result, backend, info)?;
            for &resource in info.destruct_resources() {
                backend.destruct(graph, resource)?;
            }
        }

        ufg_core::frame_mark!();
        Ok(())
    }
}

pub(crate) fn check_result(graph: &FrameGraph, result: &CompileResult) -> Result<(), ExecuteError> {
    if graph.pass_count() != result.pass_count() {
        return Err(ExecuteError::ResultMismatch(format!(
            "graph has {} passes, result has {}",
            graph.pass_count(),
            result.pass_count()
        )));
    }
    Ok(())
}

pub(crate) fn pass_node(graph: &FrameGraph, pass: PassIndex) -> Result<&PassNode, ExecuteError> {
    graph
        .pass_node(pass)
        .ok_or_else(|| ExecuteError::ResultMismatch(format!("pass {pass} is not in the graph")))
}

fn pass_info(result: &CompileResult, pass: PassIndex) -> Result<&PassInfo, ExecuteError> {
    result
        .pass_info(pass)
        .ok_or_else(|| ExecuteError::ResultMismatch(format!("pass {pass} has no events")))
}

pub(crate) fn move_destination(
    result: &CompileResult,
    src: ResourceIndex,
) -> Result<ResourceIndex, ExecuteError> {
    result.moves_src2dst().get(&src).copied().ok_or_else(|| {
        ExecuteError::ResultMismatch(format!("resource {src} is moved without a destination"))
    })
}

/// Apply the events of resources no pass touches.
pub(crate) fn apply_prologue<B: ResourceBackend>(
    graph: &FrameGraph,
    result: &CompileResult,
    backend: &mut B,
) -> Result<(), ExecuteError> {
    let prologue = result.prologue();
    for &resource in prologue.construct_resources() {
        backend.construct(graph, resource)?;
    }
    apply_moves(graph, result, backend, prologue)?;
    for &resource in prologue.destruct_resources() {
        backend.destruct(graph, resource)?;
    }
    Ok(())
}

fn apply_moves<B: ResourceBackend>(
    graph: &FrameGraph,
    result: &CompileResult,
    backend: &mut B,
    info: &PassInfo,
) -> Result<(), ExecuteError> {
    for &src in info.move_resources() {
        let dst = move_destination(result, src)?;
        backend.move_resource(graph, dst, src)?;
    }
    Ok(())
}

/// Run pass work, wrapping its error.
pub(crate) fn run_pass(
    pass: PassIndex,
    node: &PassNode,
    work: impl FnOnce() -> Result<(), PassFailure>,
) -> Result<(), ExecuteError> {
    work().map_err(|source| {
        log::warn!("Pass '{}' failed: {}", node.name(), source);
        ExecuteError::PassFailed {
            pass,
            name: node.name().to_owned(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PooledBackend;

    fn backend() -> PooledBackend<&'static str, u32, ()> {
        let mut next = 0;
        PooledBackend::new(move |_| {
            next += 1;
            Ok(next)
        })
    }

    #[test]
    fn test_config_worker_count() {
        assert!(ExecutorConfig::default().worker_count() >= 1);
        assert_eq!(ExecutorConfig::new().with_worker_count(0).worker_count(), 1);
        assert_eq!(ExecutorConfig::new().with_worker_count(6).worker_count(), 6);
    }

    #[test]
    fn test_execute_in_order() {
        let mut graph = FrameGraph::new("frame");
        let a = graph.register_resource_node("a").unwrap();
        let b = graph.register_resource_node("b").unwrap();
        let second = graph
            .register_general_pass_node("second", vec![a], vec![b])
            .unwrap();
        let first = graph
            .register_general_pass_node("first", vec![], vec![a])
            .unwrap();
        let result = graph.compile().unwrap();

        let mut backend = backend();
        backend.register_temporal(a, "tex");
        backend.register_temporal(b, "tex");

        let mut ran = Vec::new();
        Executor::new()
            .execute(&graph, &result, &mut backend, |pass, _, resources| {
                ran.push((pass, resources.len()));
                Ok(())
            })
            .unwrap();

        assert_eq!(ran, vec![(first, 1), (second, 2)]);
        assert_eq!(backend.constructed_count(), 0);
        assert_eq!(backend.stats().allocated, 2);
    }

    #[test]
    fn test_pass_failure_stops_execution() {
        let mut graph = FrameGraph::new("frame");
        let a = graph.register_resource_node("a").unwrap();
        graph
            .register_general_pass_node("broken", vec![], vec![a])
            .unwrap();
        graph
            .register_general_pass_node("after", vec![a], vec![])
            .unwrap();
        let result = graph.compile().unwrap();

        let mut backend = backend();
        backend.register_temporal(a, "buf");

        let mut calls = 0;
        let err = Executor::new()
            .execute(&graph, &result, &mut backend, |_, node, _| {
                calls += 1;
                if node.name() == "broken" {
                    Err("device lost".into())
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(calls, 1);
        assert_eq!(err.to_string(), "pass #0 `broken` failed: device lost");
    }

    #[test]
    fn test_result_mismatch() {
        let mut graph = FrameGraph::new("frame");
        let result = graph.compile().unwrap();
        graph.register_general_pass_node("late", vec![], vec![]).unwrap();

        let mut backend = backend();
        let err = Executor::new()
            .execute(&graph, &result, &mut backend, |_, _, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ExecuteError::ResultMismatch(_)));
    }

    #[test]
    fn test_unregistered_resource_surfaces_backend_error() {
        let mut graph = FrameGraph::new("frame");
        let a = graph.register_resource_node("a").unwrap();
        graph
            .register_general_pass_node("write", vec![], vec![a])
            .unwrap();
        let result = graph.compile().unwrap();

        let mut backend = backend();
        let err = Executor::new()
            .execute(&graph, &result, &mut backend, |_, _, _| Ok(()))
            .unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Backend(BackendError::UnregisteredResource(r)) if r == a
        ));
    }
}
