//! Frame graph infrastructure.
//!
//! The frame graph is a declarative description of one frame's work: named
//! *resources* (logical storage slots) and named *passes* that read and write
//! them. The [`compiler`](crate::compiler) turns it into a schedule:
//!
//! - Pass ordering via topological sort
//! - Resource lifetime analysis
//! - Storage hand-over between resources (moves)
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Execution | [`Executor`](crate::executor::Executor), [`ParallelExecutor`](crate::executor::ParallelExecutor) | Drive passes and resource events |
//! | Schedule | [`CompileResult`](crate::compiler::CompileResult) | Pass order, lifetimes, events |
//! | **Graph** | [`FrameGraph`] | Nodes and names (this module) |
//! | Node | [`ResourceNode`], [`PassNode`], [`MoveNode`] | Single graph element |
//!
//! # Example
//!
//! ```
//! use ufg_framegraph::FrameGraph;
//!
//! let mut graph = FrameGraph::new("frame");
//! let gbuffer = graph.register_resource_node("gbuffer").unwrap();
//! let hdr = graph.register_resource_node("hdr").unwrap();
//!
//! let geometry = graph
//!     .register_general_pass_node("geometry", vec![], vec![gbuffer])
//!     .unwrap();
//! let lighting = graph
//!     .register_general_pass_node("lighting", vec![gbuffer], vec![hdr])
//!     .unwrap();
//!
//! let compiled = graph.compile().unwrap();
//! assert_eq!(compiled.sorted_passes(), &[geometry, lighting]);
//! ```

mod node;

use std::collections::HashMap;
use std::fmt;

pub use node::{MoveNode, PassKind, PassNode, ResourceNode};

use crate::compiler::{self, CompileError, CompileResult};
use crate::error::GraphError;

/// Handle to a resource in the frame graph.
///
/// `ResourceIndex` is `Copy` and cheap to pass around. It is only valid within
/// the `FrameGraph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceIndex(u32);

impl ResourceIndex {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of the resource in registration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a pass in the frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassIndex(u32);

impl PassIndex {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of the pass in registration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a move in the frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoveIndex(u32);

impl MoveIndex {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position of the move in registration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MoveIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The frame graph owns every node of one frame.
///
/// Indices are assigned in registration order and stay valid until
/// [`clear`](Self::clear) is called. Registration validates names and
/// references eagerly; hazards between passes (multiple writers, cycles) are
/// only detected by [`compile`](Self::compile).
#[derive(Debug, Default, Clone)]
pub struct FrameGraph {
    name: String,
    resources: Vec<ResourceNode>,
    passes: Vec<PassNode>,
    moves: Vec<MoveNode>,
    resource_names: HashMap<String, ResourceIndex>,
    pass_names: HashMap<String, PassIndex>,
    moved_out: HashMap<ResourceIndex, MoveIndex>,
    moved_in: HashMap<ResourceIndex, MoveIndex>,
}

impl FrameGraph {
    /// Create an empty frame graph with a debug name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get the debug name of the graph.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a resource node.
    pub fn register_resource_node(
        &mut self,
        name: impl Into<String>,
    ) -> Result<ResourceIndex, GraphError> {
        let name = name.into();
        if self.resource_names.contains_key(&name) {
            return Err(GraphError::DuplicateResourceName(name));
        }

        let index = ResourceIndex::new(self.resources.len() as u32);
        self.resource_names.insert(name.clone(), index);
        self.resources.push(ResourceNode::new(name));
        Ok(index)
    }

    /// Register a general pass that reads `inputs` and writes `outputs`.
    pub fn register_general_pass_node(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<ResourceIndex>,
        outputs: Vec<ResourceIndex>,
    ) -> Result<PassIndex, GraphError> {
        self.register_pass_node(PassNode::general(name, inputs, outputs))
    }

    /// Register a copy pass that copies `inputs[i]` into `outputs[i]`.
    pub fn register_copy_pass_node(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<ResourceIndex>,
        outputs: Vec<ResourceIndex>,
    ) -> Result<PassIndex, GraphError> {
        self.register_pass_node(PassNode::copy(name, inputs, outputs))
    }

    /// Register a pass node of any kind.
    pub fn register_pass_node(&mut self, pass: PassNode) -> Result<PassIndex, GraphError> {
        if pass.name().is_empty() {
            return Err(GraphError::EmptyPassName);
        }
        if self.pass_names.contains_key(pass.name()) {
            return Err(GraphError::DuplicatePassName(pass.name().to_owned()));
        }
        if pass.is_copy() && pass.inputs().len() != pass.outputs().len() {
            return Err(GraphError::CopyArityMismatch {
                pass: pass.name().to_owned(),
                inputs: pass.inputs().len(),
                outputs: pass.outputs().len(),
            });
        }
        for &resource in pass.inputs().iter().chain(pass.outputs()) {
            self.check_resource(resource)?;
        }

        let index = PassIndex::new(self.passes.len() as u32);
        self.pass_names.insert(pass.name().to_owned(), index);
        self.passes.push(pass);
        Ok(index)
    }

    /// Register a move of `src`'s storage into `dst`.
    pub fn register_move_node(
        &mut self,
        dst: ResourceIndex,
        src: ResourceIndex,
    ) -> Result<MoveIndex, GraphError> {
        self.check_resource(dst)?;
        self.check_resource(src)?;
        if dst == src {
            return Err(GraphError::SelfMove(src));
        }
        if self.moved_out.contains_key(&src) {
            return Err(GraphError::MoveOutConflict(src));
        }
        if self.moved_in.contains_key(&dst) {
            return Err(GraphError::MoveInConflict(dst));
        }

        let index = MoveIndex::new(self.moves.len() as u32);
        self.moved_out.insert(src, index);
        self.moved_in.insert(dst, index);
        self.moves.push(MoveNode::new(dst, src));
        Ok(index)
    }

    /// Push a move without the registration checks.
    #[cfg(test)]
    pub(crate) fn push_move_unchecked(&mut self, dst: ResourceIndex, src: ResourceIndex) {
        self.moves.push(MoveNode::new(dst, src));
    }

    fn check_resource(&self, resource: ResourceIndex) -> Result<(), GraphError> {
        if resource.index() < self.resources.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownResource(resource))
        }
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Look up a resource by name.
    pub fn resource_node_index(&self, name: &str) -> Result<ResourceIndex, GraphError> {
        self.resource_names
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownResourceName(name.to_owned()))
    }

    /// Look up several resources by name, failing on the first unknown one.
    pub fn resource_node_indices(&self, names: &[&str]) -> Result<Vec<ResourceIndex>, GraphError> {
        names
            .iter()
            .map(|name| self.resource_node_index(name))
            .collect()
    }

    /// Look up a pass by name.
    pub fn pass_node_index(&self, name: &str) -> Result<PassIndex, GraphError> {
        self.pass_names
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownPassName(name.to_owned()))
    }

    /// Check if a resource with this name is registered.
    pub fn is_registered_resource_node(&self, name: &str) -> bool {
        self.resource_names.contains_key(name)
    }

    /// Check if a pass with this name is registered.
    pub fn is_registered_pass_node(&self, name: &str) -> bool {
        self.pass_names.contains_key(name)
    }

    /// Get a resource node by index.
    pub fn resource_node(&self, index: ResourceIndex) -> Option<&ResourceNode> {
        self.resources.get(index.index())
    }

    /// Get a pass node by index.
    pub fn pass_node(&self, index: PassIndex) -> Option<&PassNode> {
        self.passes.get(index.index())
    }

    /// Get a move node by index.
    pub fn move_node(&self, index: MoveIndex) -> Option<&MoveNode> {
        self.moves.get(index.index())
    }

    /// All resource nodes in registration order.
    pub fn resource_nodes(&self) -> &[ResourceNode] {
        &self.resources
    }

    /// All pass nodes in registration order.
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.passes
    }

    /// All move nodes in registration order.
    pub fn move_nodes(&self) -> &[MoveNode] {
        &self.moves
    }

    /// Iterate over pass indices with their nodes.
    pub fn passes(&self) -> impl Iterator<Item = (PassIndex, &PassNode)> {
        self.passes
            .iter()
            .enumerate()
            .map(|(i, pass)| (PassIndex::new(i as u32), pass))
    }

    /// Get the number of resources in the graph.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Get the number of passes in the graph.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Get the number of moves in the graph.
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Check if the graph has no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.passes.is_empty() && self.moves.is_empty()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Remove every node, keeping allocated capacity.
    ///
    /// Indices obtained before the call are invalidated.
    pub fn clear(&mut self) {
        self.resources.clear();
        self.passes.clear();
        self.moves.clear();
        self.resource_names.clear();
        self.pass_names.clear();
        self.moved_out.clear();
        self.moved_in.clear();
    }

    /// Compile the graph into a schedule.
    ///
    /// Shorthand for [`compiler::compile`].
    pub fn compile(&self) -> Result<CompileResult, CompileError> {
        compiler::compile(self)
    }
}
