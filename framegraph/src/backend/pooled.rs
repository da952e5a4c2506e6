//! In-memory pooled backend.
//!
//! [`PooledBackend`] binds abstract handles to resources. Every resource must
//! be registered before it is constructed:
//!
//! - **Imported** resources are owned outside the frame graph. They always
//!   bind the handle supplied at registration, and on destruct they are
//!   transitioned back to their external state instead of being pooled.
//! - **Temporal** resources live for part of the frame. They are keyed by a
//!   type `K`; construct reuses a released instance of the same key before
//!   calling the allocator.
//!
//! States are opaque values of type `S`. Each pass can require a state per
//! resource; [`request_pass_resources`](ResourceBackend::request_pass_resources)
//! records a [`StateTransition`] whenever the current state differs.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ufg_core::pool::{Acquired, FreeLists};

use super::{BackendError, PassResources, ResourceBackend};
use crate::graph::{FrameGraph, PassIndex, ResourceIndex};

type Allocator<K, H> = Box<dyn FnMut(&K) -> Result<H, BackendError> + Send>;

/// Counters of pool activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackendStats {
    /// Instances created by the allocator.
    pub allocated: usize,
    /// Constructs served from a free list.
    pub reused: usize,
    /// Temporal instances returned to a free list.
    pub recycled: usize,
    /// Instances handed over by a move.
    pub moved: usize,
}

/// A recorded state change of a bound instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition<S> {
    /// Resource the instance was bound to.
    pub resource: ResourceIndex,
    /// Pass requiring the new state, or `None` when an imported resource is
    /// restored on destruct.
    pub pass: Option<PassIndex>,
    /// State before the transition, `None` for a fresh allocation.
    pub from: Option<S>,
    /// State after the transition.
    pub to: S,
}

#[derive(Debug, Clone)]
enum Registration<K, H, S> {
    Imported { handle: H, external_state: S },
    Temporal { key: K },
}

#[derive(Debug, Clone)]
enum Origin<K, S> {
    Imported { external_state: S },
    Temporal { key: K },
}

#[derive(Debug)]
struct Instance<H, S> {
    handle: H,
    state: Option<S>,
}

#[derive(Debug)]
struct Binding<K, H, S> {
    instance: Instance<H, S>,
    origin: Origin<K, S>,
}

/// Backend binding abstract handles `H` to resources, pooling temporal
/// instances by type key `K` and tracking states `S`.
pub struct PooledBackend<K, H, S> {
    registrations: HashMap<ResourceIndex, Registration<K, H, S>>,
    pass_states: HashMap<(PassIndex, ResourceIndex), S>,
    bound: HashMap<ResourceIndex, Binding<K, H, S>>,
    pool: FreeLists<K, Instance<H, S>>,
    allocator: Allocator<K, H>,
    transitions: Vec<StateTransition<S>>,
    stats: BackendStats,
}

impl<K: Eq + Hash, H, S> fmt::Debug for PooledBackend<K, H, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBackend")
            .field("registered", &self.registrations.len())
            .field("bound", &self.bound.len())
            .field("pooled", &self.pool.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<K, H, S> PooledBackend<K, H, S>
where
    K: Eq + Hash + Clone,
    H: Clone,
    S: Clone + PartialEq,
{
    /// Create a backend that allocates new temporal instances with
    /// `allocator`.
    pub fn new(allocator: impl FnMut(&K) -> Result<H, BackendError> + Send + 'static) -> Self {
        Self {
            registrations: HashMap::new(),
            pass_states: HashMap::new(),
            bound: HashMap::new(),
            pool: FreeLists::new(),
            allocator: Box::new(allocator),
            transitions: Vec::new(),
            stats: BackendStats::default(),
        }
    }

    /// Register `resource` as imported, bound to `handle` in `external_state`.
    pub fn register_imported(&mut self, resource: ResourceIndex, handle: H, external_state: S) {
        self.registrations.insert(
            resource,
            Registration::Imported {
                handle,
                external_state,
            },
        );
    }

    /// Register `resource` as temporal, pooled under `key`.
    pub fn register_temporal(&mut self, resource: ResourceIndex, key: K) {
        self.registrations
            .insert(resource, Registration::Temporal { key });
    }

    /// Require `resource` to be in `state` while `pass` runs.
    pub fn register_pass_state(&mut self, pass: PassIndex, resource: ResourceIndex, state: S) {
        self.pass_states.insert((pass, resource), state);
    }

    /// Check if `resource` is registered as imported.
    pub fn is_imported(&self, resource: ResourceIndex) -> bool {
        matches!(
            self.registrations.get(&resource),
            Some(Registration::Imported { .. })
        )
    }

    /// Check if `resource` currently has an instance bound.
    pub fn is_constructed(&self, resource: ResourceIndex) -> bool {
        self.bound.contains_key(&resource)
    }

    /// Handle bound to `resource`.
    pub fn handle(&self, resource: ResourceIndex) -> Option<&H> {
        self.bound.get(&resource).map(|b| &b.instance.handle)
    }

    /// Current state of the instance bound to `resource`.
    pub fn state(&self, resource: ResourceIndex) -> Option<&S> {
        self.bound.get(&resource)?.instance.state.as_ref()
    }

    /// Get pool activity counters.
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Transitions recorded so far, oldest first.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }

    /// Take the recorded transitions, leaving none behind.
    pub fn take_transitions(&mut self) -> Vec<StateTransition<S>> {
        std::mem::take(&mut self.transitions)
    }

    /// Number of released instances available for reuse.
    pub fn pooled_count(&self) -> usize {
        self.pool.len()
    }

    /// Number of resources with an instance bound.
    pub fn constructed_count(&self) -> usize {
        self.bound.len()
    }

    /// Empty the free lists, returning every pooled handle with its key.
    pub fn release_pool(&mut self) -> Vec<(K, H)> {
        self.pool
            .drain()
            .map(|(key, instance)| (key, instance.handle))
            .collect()
    }

    fn transition(
        &mut self,
        resource: ResourceIndex,
        pass: Option<PassIndex>,
        from: Option<S>,
        to: S,
    ) {
        log::trace!(
            "PooledBackend: transitioning resource {} for pass {:?}",
            resource,
            pass.map(PassIndex::index)
        );
        self.transitions.push(StateTransition {
            resource,
            pass,
            from,
            to,
        });
    }
}

impl<K, H, S> ResourceBackend for PooledBackend<K, H, S>
where
    K: Eq + Hash + Clone,
    H: Clone,
    S: Clone + PartialEq,
{
    type Handle = H;

    fn construct(
        &mut self,
        graph: &FrameGraph,
        resource: ResourceIndex,
    ) -> Result<(), BackendError> {
        if self.bound.contains_key(&resource) {
            return Err(BackendError::AlreadyConstructed(resource));
        }
        let name = graph.resource_node(resource).map_or("", |node| node.name());

        let binding = match self.registrations.get(&resource) {
            None => return Err(BackendError::UnregisteredResource(resource)),
            Some(Registration::Imported {
                handle,
                external_state,
            }) => {
                log::trace!("PooledBackend: binding imported resource '{}'", name);
                Binding {
                    instance: Instance {
                        handle: handle.clone(),
                        state: Some(external_state.clone()),
                    },
                    origin: Origin::Imported {
                        external_state: external_state.clone(),
                    },
                }
            }
            Some(Registration::Temporal { key }) => {
                let allocator = &mut self.allocator;
                let acquired = self.pool.acquire_or_create(key, |key| {
                    allocator(key).map(|handle| Instance {
                        handle,
                        state: None,
                    })
                })?;
                if acquired.is_reused() {
                    log::trace!("PooledBackend: reusing pooled instance for '{}'", name);
                    self.stats.reused += 1;
                } else {
                    log::trace!("PooledBackend: allocating instance for '{}'", name);
                    self.stats.allocated += 1;
                }
                Binding {
                    instance: match acquired {
                        Acquired::Reused(instance) | Acquired::Created(instance) => instance,
                    },
                    origin: Origin::Temporal { key: key.clone() },
                }
            }
        };

        self.bound.insert(resource, binding);
        Ok(())
    }

    fn destruct(
        &mut self,
        graph: &FrameGraph,
        resource: ResourceIndex,
    ) -> Result<(), BackendError> {
        let binding = self
            .bound
            .remove(&resource)
            .ok_or(BackendError::NotConstructed(resource))?;
        let name = graph.resource_node(resource).map_or("", |node| node.name());

        match binding.origin {
            Origin::Imported { external_state } => {
                log::trace!("PooledBackend: restoring imported resource '{}'", name);
                if binding.instance.state.as_ref() != Some(&external_state) {
                    self.transition(resource, None, binding.instance.state, external_state);
                }
            }
            Origin::Temporal { key } => {
                log::trace!("PooledBackend: recycling instance of '{}'", name);
                self.stats.recycled += 1;
                self.pool.release(key, binding.instance);
            }
        }
        Ok(())
    }

    fn move_resource(
        &mut self,
        graph: &FrameGraph,
        dst: ResourceIndex,
        src: ResourceIndex,
    ) -> Result<(), BackendError> {
        if self.bound.contains_key(&dst) {
            return Err(BackendError::AlreadyConstructed(dst));
        }
        let binding = self
            .bound
            .remove(&src)
            .ok_or(BackendError::NotConstructed(src))?;

        log::trace!(
            "PooledBackend: moving '{}' into '{}'",
            graph.resource_node(src).map_or("", |node| node.name()),
            graph.resource_node(dst).map_or("", |node| node.name())
        );
        self.stats.moved += 1;
        self.bound.insert(dst, binding);
        Ok(())
    }

    fn request_pass_resources(
        &mut self,
        graph: &FrameGraph,
        pass: PassIndex,
    ) -> Result<PassResources<H>, BackendError> {
        let node = graph.pass_node(pass).ok_or(BackendError::UnknownPass(pass))?;

        let mut resources = PassResources::new();
        for resource in node.resources() {
            let required = self.pass_states.get(&(pass, resource)).cloned();
            let binding = self
                .bound
                .get_mut(&resource)
                .ok_or(BackendError::NotConstructed(resource))?;
            let handle = binding.instance.handle.clone();

            if let Some(state) = required {
                if binding.instance.state.as_ref() != Some(&state) {
                    let from = binding.instance.state.replace(state.clone());
                    self.transition(resource, Some(pass), from, state);
                }
            }
            resources.insert(resource, handle);
        }
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Layout {
        Undefined,
        ColorAttachment,
        ShaderRead,
        Present,
    }

    fn counting_backend() -> PooledBackend<u32, u32, Layout> {
        let mut next = 0;
        PooledBackend::new(move |_key: &u32| {
            next += 1;
            Ok(next)
        })
    }

    fn graph_with(names: &[&str]) -> (FrameGraph, Vec<ResourceIndex>) {
        let mut graph = FrameGraph::new("test");
        let resources = names
            .iter()
            .map(|name| graph.register_resource_node(*name).unwrap())
            .collect();
        (graph, resources)
    }

    #[test]
    fn test_unregistered_resource() {
        let (graph, r) = graph_with(&["a"]);
        let mut backend = counting_backend();
        assert_eq!(
            backend.construct(&graph, r[0]),
            Err(BackendError::UnregisteredResource(r[0]))
        );
    }

    #[test]
    fn test_temporal_reuse_first() {
        let (graph, r) = graph_with(&["a", "b", "c"]);
        let mut backend = counting_backend();
        backend.register_temporal(r[0], 64);
        backend.register_temporal(r[1], 64);
        backend.register_temporal(r[2], 128);

        backend.construct(&graph, r[0]).unwrap();
        let first = *backend.handle(r[0]).unwrap();
        backend.destruct(&graph, r[0]).unwrap();
        assert_eq!(backend.pooled_count(), 1);

        backend.construct(&graph, r[1]).unwrap();
        assert_eq!(backend.handle(r[1]), Some(&first));

        backend.construct(&graph, r[2]).unwrap();
        assert_ne!(backend.handle(r[2]), Some(&first));

        assert_eq!(
            backend.stats(),
            BackendStats {
                allocated: 2,
                reused: 1,
                recycled: 1,
                moved: 0,
            }
        );
    }

    #[test]
    fn test_allocation_failure() {
        let (graph, r) = graph_with(&["a"]);
        let mut backend: PooledBackend<u32, u32, Layout> =
            PooledBackend::new(|_| Err(BackendError::AllocationFailed("out of memory".into())));
        backend.register_temporal(r[0], 1);

        assert_eq!(
            backend.construct(&graph, r[0]),
            Err(BackendError::AllocationFailed("out of memory".into()))
        );
        assert!(!backend.is_constructed(r[0]));
    }

    #[test]
    fn test_double_construct() {
        let (graph, r) = graph_with(&["a"]);
        let mut backend = counting_backend();
        backend.register_temporal(r[0], 1);
        backend.construct(&graph, r[0]).unwrap();
        assert_eq!(
            backend.construct(&graph, r[0]),
            Err(BackendError::AlreadyConstructed(r[0]))
        );
    }

    #[test]
    fn test_move_transfers_instance() {
        let (graph, r) = graph_with(&["src", "dst"]);
        let mut backend = counting_backend();
        backend.register_temporal(r[0], 1);

        backend.construct(&graph, r[0]).unwrap();
        let handle = *backend.handle(r[0]).unwrap();
        backend.move_resource(&graph, r[1], r[0]).unwrap();

        assert!(!backend.is_constructed(r[0]));
        assert_eq!(backend.handle(r[1]), Some(&handle));
        assert_eq!(backend.stats().allocated, 1);
        assert_eq!(backend.stats().moved, 1);

        // The instance keeps its temporal key and goes back to the pool
        backend.destruct(&graph, r[1]).unwrap();
        assert_eq!(backend.release_pool(), vec![(1, handle)]);
    }

    #[test]
    fn test_move_from_unconstructed() {
        let (graph, r) = graph_with(&["src", "dst"]);
        let mut backend = counting_backend();
        assert_eq!(
            backend.move_resource(&graph, r[1], r[0]),
            Err(BackendError::NotConstructed(r[0]))
        );
    }

    #[test]
    fn test_imported_state_restored() {
        let (mut graph, r) = graph_with(&["swapchain"]);
        let pass = graph
            .register_general_pass_node("draw", vec![], vec![r[0]])
            .unwrap();

        let mut backend = counting_backend();
        backend.register_imported(r[0], 77, Layout::Present);
        backend.register_pass_state(pass, r[0], Layout::ColorAttachment);

        backend.construct(&graph, r[0]).unwrap();
        let resources = backend.request_pass_resources(&graph, pass).unwrap();
        assert_eq!(resources.get(r[0]), Some(&77));
        assert_eq!(backend.state(r[0]), Some(&Layout::ColorAttachment));

        backend.destruct(&graph, r[0]).unwrap();
        assert_eq!(backend.pooled_count(), 0);
        assert_eq!(
            backend.take_transitions(),
            vec![
                StateTransition {
                    resource: r[0],
                    pass: Some(pass),
                    from: Some(Layout::Present),
                    to: Layout::ColorAttachment,
                },
                StateTransition {
                    resource: r[0],
                    pass: None,
                    from: Some(Layout::ColorAttachment),
                    to: Layout::Present,
                },
            ]
        );
        assert!(backend.transitions().is_empty());
    }

    #[test]
    fn test_request_skips_matching_state() {
        let (mut graph, r) = graph_with(&["gbuffer", "hdr"]);
        let write = graph
            .register_general_pass_node("write", vec![], vec![r[0]])
            .unwrap();
        let read = graph
            .register_general_pass_node("read", vec![r[0]], vec![r[1]])
            .unwrap();

        let mut backend = counting_backend();
        backend.register_temporal(r[0], 1);
        backend.register_temporal(r[1], 1);
        backend.register_pass_state(write, r[0], Layout::ColorAttachment);
        backend.register_pass_state(read, r[0], Layout::ShaderRead);

        backend.construct(&graph, r[0]).unwrap();
        backend.request_pass_resources(&graph, write).unwrap();
        backend.request_pass_resources(&graph, write).unwrap();
        assert_eq!(backend.transitions().len(), 1);
        assert_eq!(backend.transitions()[0].from, None);

        // `hdr` is not constructed yet
        assert_eq!(
            backend.request_pass_resources(&graph, read),
            Err(BackendError::NotConstructed(r[1]))
        );
        backend.construct(&graph, r[1]).unwrap();
        let resources = backend.request_pass_resources(&graph, read).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(backend.state(r[0]), Some(&Layout::ShaderRead));
        assert_eq!(backend.state(r[1]), None);
        assert_ne!(backend.state(r[0]), Some(&Layout::Undefined));
    }

    #[test]
    fn test_unknown_pass() {
        let (graph, _) = graph_with(&[]);
        let mut backend = counting_backend();
        let bogus = PassIndex::new(3);
        assert_eq!(
            backend.request_pass_resources(&graph, bogus),
            Err(BackendError::UnknownPass(bogus))
        );
    }
}
