//! Resource backend abstraction.
//!
//! The compiler only decides *when* storage is bound and released. A
//! [`ResourceBackend`] decides *what* the storage is. Executors drive it with
//! the events of a [`CompileResult`](crate::compiler::CompileResult):
//!
//! - `construct` - bind an instance to a resource before its first use
//! - `move_resource` - hand a resource's instance over to another resource
//! - `destruct` - release the instance after the last use
//! - `request_pass_resources` - look up the instances a pass works on
//!
//! # Available Backends
//!
//! - [`PooledBackend`]: in-memory backend over abstract handles, with imported
//!   resources and reuse-first free lists for temporal ones

mod error;
mod pooled;

pub use error::BackendError;
pub use pooled::{BackendStats, PooledBackend, StateTransition};

use crate::graph::{FrameGraph, PassIndex, ResourceIndex};

/// Binds concrete instances to frame graph resources.
pub trait ResourceBackend {
    /// Handle to a concrete instance, cloned into [`PassResources`].
    type Handle: Clone;

    /// Bind an instance to `resource`.
    fn construct(&mut self, graph: &FrameGraph, resource: ResourceIndex)
    -> Result<(), BackendError>;

    /// Release the instance bound to `resource`.
    fn destruct(&mut self, graph: &FrameGraph, resource: ResourceIndex)
    -> Result<(), BackendError>;

    /// Rebind the instance of `src` to `dst` without allocating or copying.
    fn move_resource(
        &mut self,
        graph: &FrameGraph,
        dst: ResourceIndex,
        src: ResourceIndex,
    ) -> Result<(), BackendError>;

    /// Prepare every resource `pass` touches and return their handles.
    fn request_pass_resources(
        &mut self,
        graph: &FrameGraph,
        pass: PassIndex,
    ) -> Result<PassResources<Self::Handle>, BackendError>;
}

/// Handles of the resources a pass touches, sorted by resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResources<H> {
    entries: Vec<(ResourceIndex, H)>,
}

impl<H> Default for PassResources<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H> PassResources<H> {
    /// Create an empty set of pass resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the handle of `resource`, replacing any previous one.
    pub fn insert(&mut self, resource: ResourceIndex, handle: H) {
        match self.entries.binary_search_by_key(&resource, |(r, _)| *r) {
            Ok(i) => self.entries[i].1 = handle,
            Err(i) => self.entries.insert(i, (resource, handle)),
        }
    }

    /// Get the handle bound to `resource`.
    pub fn get(&self, resource: ResourceIndex) -> Option<&H> {
        self.entries
            .binary_search_by_key(&resource, |(r, _)| *r)
            .ok()
            .map(|i| &self.entries[i].1)
    }

    /// Iterate over `(resource, handle)` pairs by ascending resource.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceIndex, &H)> {
        self.entries.iter().map(|(r, h)| (*r, h))
    }

    /// Get the number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pass touches no resources.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> FromIterator<(ResourceIndex, H)> for PassResources<H> {
    fn from_iter<I: IntoIterator<Item = (ResourceIndex, H)>>(iter: I) -> Self {
        let mut resources = Self::new();
        for (resource, handle) in iter {
            resources.insert(resource, handle);
        }
        resources
    }
}
