//! Frame graph compilation.
//!
//! This module compiles a [`FrameGraph`](crate::graph::FrameGraph) into a
//! [`CompileResult`]: a pass order plus the lifetime of every resource.
//!
//! # Phases
//!
//! 1. **Usage collection** - writer, readers and copy-in of each resource
//! 2. **Move resolution** - conflicting and cyclic moves are rejected, chains
//!    through untouched resources are collapsed (`A -> B -> C` becomes `A -> C`)
//! 3. **Dependency edges** - hazards on resources, copies and moves become
//!    edges of the [`PassGraph`]
//! 4. **Topological sort** - Kahn's algorithm; a cycle fails with
//!    [`CyclicDependencyError::NotADag`]
//! 5. **Lifetimes** - first/last order position of each resource and the
//!    construct, move and destruct events of each pass
//!
//! Compilation is deterministic and all-or-nothing. Structural errors are
//! reported before cycles.
//!
//! # Example
//!
//! ```
//! use ufg_framegraph::FrameGraph;
//!
//! let mut graph = FrameGraph::new("frame");
//! let color = graph.register_resource_node("color").unwrap();
//! let draw = graph
//!     .register_general_pass_node("draw", vec![], vec![color])
//!     .unwrap();
//! let present = graph
//!     .register_general_pass_node("present", vec![color], vec![])
//!     .unwrap();
//!
//! let compiled = graph.compile().unwrap();
//! assert_eq!(compiled.sorted_passes(), &[draw, present]);
//! assert_eq!(compiled.first_pass(color), Some(draw));
//! assert_eq!(compiled.last_pass(color), Some(present));
//! assert_eq!(compiled.pass_info(draw).unwrap().construct_resources(), &[color]);
//! ```

mod error;
mod lifetime;
mod pass_graph;
mod usage;

use std::collections::{BTreeMap, BTreeSet};

use ufg_core::pool::Poolable;

use crate::graph::{FrameGraph, PassIndex, ResourceIndex};

pub use error::{CompileError, CyclicDependencyError, StructuralError};
pub use pass_graph::PassGraph;

/// Position of a pass in [`CompileResult::sorted_passes`].
pub type OrderPos = usize;

/// How a resource is used, and for how long.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    writer: Option<PassIndex>,
    readers: Vec<PassIndex>,
    copy_in: Option<PassIndex>,
    first: Option<OrderPos>,
    last: Option<OrderPos>,
}

impl ResourceInfo {
    /// The general pass writing this resource.
    pub fn writer(&self) -> Option<PassIndex> {
        self.writer
    }

    /// Passes reading this resource, in registration order.
    pub fn readers(&self) -> &[PassIndex] {
        &self.readers
    }

    /// The copy pass copying into this resource.
    pub fn copy_in(&self) -> Option<PassIndex> {
        self.copy_in
    }

    /// Order position of the first pass touching this resource.
    pub fn first(&self) -> Option<OrderPos> {
        self.first
    }

    /// Order position of the last pass touching this resource.
    pub fn last(&self) -> Option<OrderPos> {
        self.last
    }

    /// Check if any pass writes, reads or copies into this resource.
    pub fn is_touched(&self) -> bool {
        self.writer.is_some() || !self.readers.is_empty() || self.copy_in.is_some()
    }

    /// Every distinct pass touching this resource.
    pub fn users(&self) -> BTreeSet<PassIndex> {
        self.writer
            .iter()
            .chain(&self.readers)
            .chain(&self.copy_in)
            .copied()
            .collect()
    }
}

/// Resource events of one pass.
///
/// Executors apply them around the pass: constructs before it runs, then moves,
/// then destructs after it completes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassInfo {
    construct_resources: Vec<ResourceIndex>,
    destruct_resources: Vec<ResourceIndex>,
    move_resources: Vec<ResourceIndex>,
}

impl PassInfo {
    /// Resources whose storage is bound before the pass runs.
    pub fn construct_resources(&self) -> &[ResourceIndex] {
        &self.construct_resources
    }

    /// Resources whose storage is released after the pass.
    pub fn destruct_resources(&self) -> &[ResourceIndex] {
        &self.destruct_resources
    }

    /// Move sources whose storage is handed to their destination after the
    /// pass.
    pub fn move_resources(&self) -> &[ResourceIndex] {
        &self.move_resources
    }

    /// Check if the pass has no resource events.
    pub fn is_empty(&self) -> bool {
        self.construct_resources.is_empty()
            && self.destruct_resources.is_empty()
            && self.move_resources.is_empty()
    }

    fn clear(&mut self) {
        self.construct_resources.clear();
        self.destruct_resources.clear();
        self.move_resources.clear();
    }
}

/// A compiled frame graph ready for execution.
///
/// Immutable once produced. Per-pass data is indexed by [`PassIndex`],
/// per-resource data only exists for resources referenced by a pass or a move.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompileResult {
    rsrc2info: BTreeMap<ResourceIndex, ResourceInfo>,
    pass_graph: PassGraph,
    sorted_passes: Vec<PassIndex>,
    pass2order: Vec<OrderPos>,
    pass2info: Vec<PassInfo>,
    prologue: PassInfo,
    moves_src2dst: BTreeMap<ResourceIndex, ResourceIndex>,
    moves_dst2src: BTreeMap<ResourceIndex, ResourceIndex>,
    copies_src2dst: BTreeMap<ResourceIndex, BTreeSet<ResourceIndex>>,
    copies_dst2src: BTreeMap<ResourceIndex, ResourceIndex>,
}

impl CompileResult {
    /// Pass execution order respecting every dependency.
    pub fn sorted_passes(&self) -> &[PassIndex] {
        &self.sorted_passes
    }

    /// Position of `pass` in [`sorted_passes`](Self::sorted_passes).
    pub fn pass_order(&self, pass: PassIndex) -> Option<OrderPos> {
        self.pass2order.get(pass.index()).copied()
    }

    /// Resource events of `pass`.
    pub fn pass_info(&self, pass: PassIndex) -> Option<&PassInfo> {
        self.pass2info.get(pass.index())
    }

    /// Resource events applied before the first pass.
    ///
    /// Only resources no pass touches (the ends of move chains) get events
    /// here.
    pub fn prologue(&self) -> &PassInfo {
        &self.prologue
    }

    /// Usage and lifetime of `resource`.
    pub fn resource_info(&self, resource: ResourceIndex) -> Option<&ResourceInfo> {
        self.rsrc2info.get(&resource)
    }

    /// Usage and lifetime of every referenced resource, by ascending index.
    pub fn resources(&self) -> impl Iterator<Item = (ResourceIndex, &ResourceInfo)> {
        self.rsrc2info.iter().map(|(&resource, info)| (resource, info))
    }

    /// The validated pass dependency graph.
    pub fn pass_graph(&self) -> &PassGraph {
        &self.pass_graph
    }

    /// Surviving moves, keyed by source.
    pub fn moves_src2dst(&self) -> &BTreeMap<ResourceIndex, ResourceIndex> {
        &self.moves_src2dst
    }

    /// Surviving moves, keyed by destination.
    pub fn moves_dst2src(&self) -> &BTreeMap<ResourceIndex, ResourceIndex> {
        &self.moves_dst2src
    }

    /// Copy destinations, keyed by source.
    pub fn copies_src2dst(&self) -> &BTreeMap<ResourceIndex, BTreeSet<ResourceIndex>> {
        &self.copies_src2dst
    }

    /// Copy sources, keyed by destination.
    pub fn copies_dst2src(&self) -> &BTreeMap<ResourceIndex, ResourceIndex> {
        &self.copies_dst2src
    }

    /// The pass at which `resource` becomes live.
    pub fn first_pass(&self, resource: ResourceIndex) -> Option<PassIndex> {
        let order = self.rsrc2info.get(&resource)?.first?;
        self.sorted_passes.get(order).copied()
    }

    /// The pass after which `resource` is no longer used.
    pub fn last_pass(&self, resource: ResourceIndex) -> Option<PassIndex> {
        let order = self.rsrc2info.get(&resource)?.last?;
        self.sorted_passes.get(order).copied()
    }

    /// Get the number of passes in the compiled graph.
    pub fn pass_count(&self) -> usize {
        self.sorted_passes.len()
    }

    /// Check if the compiled graph has no passes.
    pub fn is_empty(&self) -> bool {
        self.sorted_passes.is_empty()
    }

    fn is_touched(&self, resource: ResourceIndex) -> bool {
        self.rsrc2info
            .get(&resource)
            .is_some_and(ResourceInfo::is_touched)
    }
}

impl Poolable for CompileResult {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.rsrc2info.clear();
        self.pass_graph.reset(0);
        self.sorted_passes.clear();
        self.pass2order.clear();
        for info in &mut self.pass2info {
            info.clear();
        }
        self.pass2info.clear();
        self.prologue.clear();
        self.moves_src2dst.clear();
        self.moves_dst2src.clear();
        self.copies_src2dst.clear();
        self.copies_dst2src.clear();
    }
}

/// Compile a frame graph into an execution schedule.
///
/// # Returns
///
/// * `Ok(CompileResult)` - Pass order, lifetimes and resource events
/// * `Err(CompileError::Structural)` - Conflicting writers, copies or moves
/// * `Err(CompileError::Cyclic)` - If the pass dependencies contain a cycle
pub fn compile(graph: &FrameGraph) -> Result<CompileResult, CompileError> {
    let mut result = CompileResult::default();
    compile_into(graph, &mut result)?;
    Ok(result)
}

/// Compile a frame graph into an existing [`CompileResult`], reusing its
/// allocations.
///
/// This is the in-place variant of [`compile`]. The target is reset first and
/// is left empty if compilation fails.
pub fn compile_into(graph: &FrameGraph, target: &mut CompileResult) -> Result<(), CompileError> {
    ufg_core::profile_function!();
    target.reset();

    let result = run_phases(graph, target);
    match &result {
        Ok(()) => {
            ufg_core::profile_plot!("framegraph_edges", target.pass_graph.edge_count());
            log::debug!(
                "FrameGraph '{}': compiled {} passes, {} resources, {} moves, {} edges",
                graph.name(),
                target.pass_count(),
                target.rsrc2info.len(),
                target.moves_src2dst.len(),
                target.pass_graph.edge_count(),
            );
        }
        Err(err) => {
            log::debug!("FrameGraph '{}': compilation failed: {}", graph.name(), err);
            target.reset();
        }
    }
    result
}

fn run_phases(graph: &FrameGraph, target: &mut CompileResult) -> Result<(), CompileError> {
    {
        ufg_core::profile_scope!("collect_usage");
        usage::collect_usage(graph, target)?;
    }
    {
        ufg_core::profile_scope!("resolve_moves");
        usage::resolve_moves(graph, target)?;
    }
    {
        ufg_core::profile_scope!("build_edges");
        pass_graph::build_edges(graph, target);
    }
    {
        ufg_core::profile_scope!("topological_sort");
        let CompileResult {
            pass_graph: edges,
            sorted_passes,
            ..
        } = target;
        edges.sort_into(sorted_passes)?;
    }
    {
        ufg_core::profile_scope!("assign_lifetimes");
        lifetime::assign_lifetimes(target);
    }
    Ok(())
}
