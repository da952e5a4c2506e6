//! Frame graph node types.

use super::ResourceIndex;

/// A logical storage slot tracked by the frame graph.
///
/// Resource nodes carry no description of the storage itself. What a slot is
/// backed by (its type, whether it is imported) is registered with the
/// backend, see [`PooledBackend`](crate::backend::PooledBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    name: String,
}

impl ResourceNode {
    /// Create a resource node.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the resource name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The kind of work a pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Arbitrary work: reads every input, writes every output.
    General,
    /// Strict positional copy: input `i` is copied into output `i`.
    Copy,
}

/// A unit of work declaring the resources it reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassNode {
    kind: PassKind,
    name: String,
    inputs: Vec<ResourceIndex>,
    outputs: Vec<ResourceIndex>,
}

impl PassNode {
    /// Create a general pass node.
    pub fn general(
        name: impl Into<String>,
        inputs: Vec<ResourceIndex>,
        outputs: Vec<ResourceIndex>,
    ) -> Self {
        Self {
            kind: PassKind::General,
            name: name.into(),
            inputs,
            outputs,
        }
    }

    /// Create a copy pass node.
    ///
    /// `inputs` and `outputs` are paired by position. The lengths are checked
    /// when the node is registered with a
    /// [`FrameGraph`](crate::graph::FrameGraph).
    pub fn copy(
        name: impl Into<String>,
        inputs: Vec<ResourceIndex>,
        outputs: Vec<ResourceIndex>,
    ) -> Self {
        Self {
            kind: PassKind::Copy,
            name: name.into(),
            inputs,
            outputs,
        }
    }

    /// Get the pass kind.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Get the pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resources read by this pass, in declaration order.
    pub fn inputs(&self) -> &[ResourceIndex] {
        &self.inputs
    }

    /// Resources written by this pass, in declaration order.
    pub fn outputs(&self) -> &[ResourceIndex] {
        &self.outputs
    }

    /// Check if this is a general pass.
    pub fn is_general(&self) -> bool {
        matches!(self.kind, PassKind::General)
    }

    /// Check if this is a copy pass.
    pub fn is_copy(&self) -> bool {
        matches!(self.kind, PassKind::Copy)
    }

    /// `(source, destination)` pairs of a copy pass.
    ///
    /// Empty for general passes.
    pub fn copy_pairs(&self) -> impl Iterator<Item = (ResourceIndex, ResourceIndex)> + '_ {
        let pairs = match self.kind {
            PassKind::General => 0,
            PassKind::Copy => self.inputs.len().min(self.outputs.len()),
        };
        self.inputs
            .iter()
            .copied()
            .zip(self.outputs.iter().copied())
            .take(pairs)
    }

    /// Every resource this pass touches, without duplicates.
    pub fn resources(&self) -> Vec<ResourceIndex> {
        let mut resources: Vec<_> = self.inputs.iter().chain(&self.outputs).copied().collect();
        resources.sort_unstable();
        resources.dedup();
        resources
    }
}

/// Declares that `src`'s storage is handed over to `dst` once `src` is no
/// longer used, instead of being freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveNode {
    dst: ResourceIndex,
    src: ResourceIndex,
}

impl MoveNode {
    /// Create a move node from `src` into `dst`.
    pub fn new(dst: ResourceIndex, src: ResourceIndex) -> Self {
        Self { dst, src }
    }

    /// The resource receiving the storage.
    pub fn dst(&self) -> ResourceIndex {
        self.dst
    }

    /// The resource giving up its storage.
    pub fn src(&self) -> ResourceIndex {
        self.src
    }
}
