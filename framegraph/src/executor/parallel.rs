use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{
    ExecuteError, ExecutorConfig, PassFailure, apply_prologue, check_result, move_destination,
    pass_node, run_pass,
};
use crate::backend::{PassResources, ResourceBackend};
use crate::compiler::CompileResult;
use crate::graph::{FrameGraph, PassIndex, PassNode, ResourceIndex};

/// Multi-threaded executor that runs independent passes in parallel.
///
/// Workers are dispatched via `std::thread::scope` and share one scheduler
/// state behind a [`parking_lot::Mutex`]: the ready queue, the in-degree of
/// every pending pass, the remaining-user count of every resource and the
/// backend itself. Backend calls are therefore serialized; only pass work runs
/// outside the lock.
///
/// A pass becomes ready once all its predecessors in the
/// [`PassGraph`](crate::compiler::PassGraph) completed. Its resources are
/// constructed when it is dispatched, and a resource is moved or destructed
/// as soon as the last pass using it completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelExecutor {
    config: ExecutorConfig,
}

struct Scheduler<'a, B> {
    backend: &'a mut B,
    ready: VecDeque<PassIndex>,
    in_degree: Vec<usize>,
    remaining_users: HashMap<ResourceIndex, usize>,
    constructed: HashSet<ResourceIndex>,
    running: usize,
    completed: usize,
    error: Option<ExecuteError>,
}

impl<B: ResourceBackend> Scheduler<'_, B> {
    /// Construct the resources `pass` is first to touch and fetch its handles.
    fn begin(
        &mut self,
        graph: &FrameGraph,
        result: &CompileResult,
        pass: PassIndex,
        node: &PassNode,
    ) -> Result<PassResources<B::Handle>, ExecuteError> {
        for resource in node.resources() {
            if result.moves_dst2src().contains_key(&resource) {
                continue;
            }
            if self.constructed.insert(resource) {
                self.backend.construct(graph, resource)?;
            }
        }
        Ok(self.backend.request_pass_resources(graph, pass)?)
    }

    /// Release the resources `pass` was last to touch and unlock its
    /// successors.
    fn finish(
        &mut self,
        graph: &FrameGraph,
        result: &CompileResult,
        pass: PassIndex,
        node: &PassNode,
    ) -> Result<(), ExecuteError> {
        for resource in node.resources() {
            let remaining = self.remaining_users.entry(resource).or_insert(1);
            *remaining -= 1;
            if *remaining > 0 {
                continue;
            }

            if result.moves_src2dst().contains_key(&resource) {
                let dst = move_destination(result, resource)?;
                self.backend.move_resource(graph, dst, resource)?;
                if self.remaining_users.get(&dst).copied().unwrap_or(0) == 0 {
                    self.backend.destruct(graph, dst)?;
                }
            } else {
                self.backend.destruct(graph, resource)?;
            }
        }

        self.completed += 1;
        for successor in result.pass_graph().successors(pass) {
            let degree = &mut self.in_degree[successor.index()];
            *degree -= 1;
            if *degree == 0 {
                self.ready.push_back(successor);
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: ExecuteError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

impl ParallelExecutor {
    /// Create a parallel executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute every pass of `result`, running independent passes
    /// concurrently.
    ///
    /// After the first failure no new pass is dispatched; passes already
    /// running are allowed to finish and the first error is returned.
    pub fn execute<B, F>(
        &self,
        graph: &FrameGraph,
        result: &CompileResult,
        backend: &mut B,
        work: F,
    ) -> Result<(), ExecuteError>
    where
        B: ResourceBackend + Send,
        F: Fn(PassIndex, &PassNode, &PassResources<B::Handle>) -> Result<(), PassFailure> + Sync,
    {
        ufg_core::profile_function!();
        check_result(graph, result)?;

        let total = result.pass_count();
        log::debug!(
            "ParallelExecutor: running '{}' ({} passes, {} workers)",
            graph.name(),
            total,
            self.config.worker_count()
        );

        apply_prologue(graph, result, backend)?;
        if total == 0 {
            return Ok(());
        }

        let in_degree = result.pass_graph().in_degrees();
        let ready = result
            .sorted_passes()
            .iter()
            .copied()
            .filter(|pass| in_degree[pass.index()] == 0)
            .collect();
        let remaining_users = result
            .resources()
            .map(|(resource, info)| (resource, info.users().len()))
            .collect();

        let state = Mutex::new(Scheduler {
            backend,
            ready,
            in_degree,
            remaining_users,
            constructed: HashSet::new(),
            running: 0,
            completed: 0,
            error: None,
        });
        let wakeup = Condvar::new();

        let panicked = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.worker_count().min(total))
                .map(|_| {
                    scope.spawn(|| {
                        ufg_core::set_thread_name!("framegraph: worker");
                        worker_loop(graph, result, total, &state, &wakeup, &work);
                    })
                })
                .collect();
            handles
                .into_iter()
                .fold(false, |panicked, handle| handle.join().is_err() || panicked)
        });

        let scheduler = state.into_inner();
        if let Some(error) = scheduler.error {
            return Err(error);
        }
        if panicked {
            return Err(ExecuteError::WorkerPanicked);
        }

        ufg_core::frame_mark!();
        Ok(())
    }
}

fn worker_loop<B, F>(
    graph: &FrameGraph,
    result: &CompileResult,
    total: usize,
    state: &Mutex<Scheduler<'_, B>>,
    wakeup: &Condvar,
    work: &F,
) where
    B: ResourceBackend,
    F: Fn(PassIndex, &PassNode, &PassResources<B::Handle>) -> Result<(), PassFailure>,
{
    let mut guard = state.lock();
    loop {
        if guard.error.is_some() || guard.completed == total {
            break;
        }
        let Some(pass) = guard.ready.pop_front() else {
            if guard.running == 0 {
                guard.fail(ExecuteError::ResultMismatch(
                    "no pass is ready but the frame is incomplete".to_owned(),
                ));
                wakeup.notify_all();
                break;
            }
            wakeup.wait(&mut guard);
            continue;
        };

        let outcome = run_dispatched(graph, result, pass, &mut guard, work);
        if let Err(error) = outcome {
            guard.fail(error);
        }
        wakeup.notify_all();
    }
}

fn run_dispatched<B, F>(
    graph: &FrameGraph,
    result: &CompileResult,
    pass: PassIndex,
    guard: &mut MutexGuard<'_, Scheduler<'_, B>>,
    work: &F,
) -> Result<(), ExecuteError>
where
    B: ResourceBackend,
    F: Fn(PassIndex, &PassNode, &PassResources<B::Handle>) -> Result<(), PassFailure>,
{
    let node = pass_node(graph, pass)?;
    let resources = guard.begin(graph, result, pass, node)?;

    guard.running += 1;
    let outcome = MutexGuard::unlocked(guard, || {
        ufg_core::profile_scope_dynamic!(node.name());
        panic::catch_unwind(AssertUnwindSafe(|| {
            run_pass(pass, node, || work(pass, node, &resources))
        }))
    });
    guard.running -= 1;

    match outcome {
        Ok(finished) => finished?,
        Err(_) => {
            log::warn!("Pass '{}' panicked", node.name());
            return Err(ExecuteError::WorkerPanicked);
        }
    }
    guard.finish(graph, result, pass, node)
}
