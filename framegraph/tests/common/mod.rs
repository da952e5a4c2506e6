//! Common utilities for frame graph integration tests.
//!
//! Graph fixtures for the reference scenarios, schedule property checks and a
//! pooled backend over counting handles.

#![allow(dead_code)]

use ufg_framegraph::{
    BackendError, CompileResult, FrameGraph, PassIndex, PooledBackend, ResourceIndex,
};

/// Initialize logging once for the test binary.
pub fn init_logging() {
    if env_logger::builder().is_test(true).try_init().is_ok() {
        ufg_framegraph::init();
    }
}

// ============================================================================
// Scenario Fixtures
// ============================================================================

/// Linear + fan chain: depth prepass, gbuffer, lighting, post.
pub struct LinearFan {
    pub graph: FrameGraph,
    pub depth: ResourceIndex,
    pub gbuffer: [ResourceIndex; 3],
    pub lighting: ResourceIndex,
    pub final_color: ResourceIndex,
    pub depth_pass: PassIndex,
    pub gbuffer_pass: PassIndex,
    pub lighting_pass: PassIndex,
    pub post_pass: PassIndex,
}

/// Build the linear + fan chain, registering passes in `pass_order`.
///
/// `pass_order` is a permutation of `0..4` naming depth, gbuffer, lighting and
/// post respectively.
pub fn linear_fan(pass_order: [usize; 4]) -> LinearFan {
    let mut graph = FrameGraph::new("linear_fan");
    for name in ["Depth", "GBuffer1", "GBuffer2", "GBuffer3", "Lighting", "Final"] {
        graph.register_resource_node(name).unwrap();
    }
    let depth = graph.resource_node_index("Depth").unwrap();
    let gbuffer = graph
        .resource_node_indices(&["GBuffer1", "GBuffer2", "GBuffer3"])
        .unwrap();
    let gbuffer = [gbuffer[0], gbuffer[1], gbuffer[2]];
    let lighting = graph.resource_node_index("Lighting").unwrap();
    let final_color = graph.resource_node_index("Final").unwrap();

    let mut passes = [None; 4];
    for which in pass_order {
        let index = match which {
            0 => graph.register_general_pass_node("Depth", vec![], vec![depth]),
            1 => graph.register_general_pass_node("GBuffer", vec![depth], gbuffer.to_vec()),
            2 => graph.register_general_pass_node("Lighting", gbuffer.to_vec(), vec![lighting]),
            3 => graph.register_general_pass_node("Post", vec![lighting], vec![final_color]),
            _ => panic!("unknown pass {which}"),
        };
        passes[which] = Some(index.unwrap());
    }

    LinearFan {
        graph,
        depth,
        gbuffer,
        lighting,
        final_color,
        depth_pass: passes[0].unwrap(),
        gbuffer_pass: passes[1].unwrap(),
        lighting_pass: passes[2].unwrap(),
        post_pass: passes[3].unwrap(),
    }
}

/// Move chain `A -> B -> C` where `B` is never touched by a pass.
pub struct MoveChain {
    pub graph: FrameGraph,
    pub a: ResourceIndex,
    pub b: ResourceIndex,
    pub c: ResourceIndex,
    pub write_a: PassIndex,
    pub read_a: PassIndex,
    pub write_c: PassIndex,
    pub read_c: PassIndex,
}

pub fn move_chain() -> MoveChain {
    let mut graph = FrameGraph::new("move_chain");
    let a = graph.register_resource_node("A").unwrap();
    let b = graph.register_resource_node("B").unwrap();
    let c = graph.register_resource_node("C").unwrap();
    let out = graph.register_resource_node("Out").unwrap();

    let write_c = graph
        .register_general_pass_node("WriteC", vec![], vec![c])
        .unwrap();
    let read_c = graph
        .register_general_pass_node("ReadC", vec![c], vec![out])
        .unwrap();
    let write_a = graph
        .register_general_pass_node("WriteA", vec![], vec![a])
        .unwrap();
    let read_a = graph
        .register_general_pass_node("ReadA", vec![a], vec![])
        .unwrap();

    graph.register_move_node(b, a).unwrap();
    graph.register_move_node(c, b).unwrap();

    MoveChain {
        graph,
        a,
        b,
        c,
        write_a,
        read_a,
        write_c,
        read_c,
    }
}

/// Two passes each reading what the other writes.
pub fn read_write_cycle() -> FrameGraph {
    let mut graph = FrameGraph::new("cycle");
    let r1 = graph.register_resource_node("R1").unwrap();
    let r2 = graph.register_resource_node("R2").unwrap();
    graph
        .register_general_pass_node("P1", vec![r1], vec![r2])
        .unwrap();
    graph
        .register_general_pass_node("P2", vec![r2], vec![r1])
        .unwrap();
    graph
}

/// A copy of `X` into `Y` next to two general readers of `X`.
pub struct CopyAfterReaders {
    pub graph: FrameGraph,
    pub x: ResourceIndex,
    pub y: ResourceIndex,
    pub writer: PassIndex,
    pub readers: [PassIndex; 2],
    pub copy: PassIndex,
}

pub fn copy_after_readers() -> CopyAfterReaders {
    let mut graph = FrameGraph::new("copy");
    let x = graph.register_resource_node("X").unwrap();
    let y = graph.register_resource_node("Y").unwrap();
    let out0 = graph.register_resource_node("Out0").unwrap();
    let out1 = graph.register_resource_node("Out1").unwrap();

    // Copy registered first so registration order cannot hide a missing edge
    let copy = graph
        .register_copy_pass_node("CopyXY", vec![x], vec![y])
        .unwrap();
    let writer = graph
        .register_general_pass_node("WriteX", vec![], vec![x])
        .unwrap();
    let reader0 = graph
        .register_general_pass_node("ReadX0", vec![x], vec![out0])
        .unwrap();
    let reader1 = graph
        .register_general_pass_node("ReadX1", vec![x], vec![out1])
        .unwrap();

    CopyAfterReaders {
        graph,
        x,
        y,
        writer,
        readers: [reader0, reader1],
        copy,
    }
}

/// Temporal anti-aliasing: the previous frame's history is read, the new
/// history is copied from the resolved color, and the scratch target is
/// handed over to the tonemapped output.
pub struct Taa {
    pub graph: FrameGraph,
    pub color: ResourceIndex,
    pub history: ResourceIndex,
    pub resolved: ResourceIndex,
    pub scratch: ResourceIndex,
    pub output: ResourceIndex,
    pub draw: PassIndex,
    pub resolve: PassIndex,
    pub save_history: PassIndex,
    pub tonemap: PassIndex,
}

pub fn taa() -> Taa {
    let mut graph = FrameGraph::new("taa");
    let color = graph.register_resource_node("Color").unwrap();
    let history = graph.register_resource_node("History").unwrap();
    let resolved = graph.register_resource_node("Resolved").unwrap();
    let scratch = graph.register_resource_node("Scratch").unwrap();
    let output = graph.register_resource_node("Output").unwrap();

    let draw = graph
        .register_general_pass_node("Draw", vec![], vec![color])
        .unwrap();
    let resolve = graph
        .register_general_pass_node("Resolve", vec![color, history], vec![resolved])
        .unwrap();
    let save_history = graph
        .register_copy_pass_node("SaveHistory", vec![resolved], vec![history])
        .unwrap();
    let tonemap = graph
        .register_general_pass_node("Tonemap", vec![resolved], vec![output])
        .unwrap();
    graph.register_move_node(output, scratch).unwrap();

    Taa {
        graph,
        color,
        history,
        resolved,
        scratch,
        output,
        draw,
        resolve,
        save_history,
        tonemap,
    }
}

/// A wide graph: `width` independent chains of `depth` passes feeding one
/// final pass.
pub fn wide_graph(width: usize, depth: usize) -> FrameGraph {
    let mut graph = FrameGraph::new("wide");
    let mut tails = Vec::with_capacity(width);
    for chain in 0..width {
        let mut previous = None;
        for step in 0..depth {
            let out = graph
                .register_resource_node(format!("r{chain}_{step}"))
                .unwrap();
            graph
                .register_general_pass_node(
                    format!("p{chain}_{step}"),
                    previous.into_iter().collect(),
                    vec![out],
                )
                .unwrap();
            previous = Some(out);
        }
        tails.extend(previous);
    }
    graph
        .register_general_pass_node("gather", tails, vec![])
        .unwrap();
    graph
}

// ============================================================================
// Schedule Properties
// ============================================================================

/// Position of `pass` in the compiled order.
pub fn position(result: &CompileResult, pass: PassIndex) -> usize {
    result
        .pass_order(pass)
        .unwrap_or_else(|| panic!("pass {pass} missing from the schedule"))
}

/// Check every schedule property that holds for any valid compile result.
pub fn assert_valid_schedule(graph: &FrameGraph, result: &CompileResult) {
    // Permutation of all passes
    let mut sorted = result.sorted_passes().to_vec();
    sorted.sort();
    let all: Vec<_> = graph.passes().map(|(index, _)| index).collect();
    assert_eq!(sorted, all, "sorted passes are not a permutation");

    // Every edge is respected
    for (from, to) in result.pass_graph().edges() {
        assert!(
            position(result, from) < position(result, to),
            "edge {from} -> {to} violated"
        );
    }

    // Writers precede their readers
    for (resource, info) in result.resources() {
        if let Some(writer) = info.writer() {
            for &reader in info.readers() {
                assert!(
                    position(result, writer) < position(result, reader),
                    "writer {writer} of {resource} runs after reader {reader}"
                );
            }
        }
    }

    // Final accessers of a move source precede first accessers of its destination
    for (&src, &dst) in result.moves_src2dst() {
        let src_info = result.resource_info(src).unwrap();
        let dst_info = result.resource_info(dst).unwrap();
        if let (Some(last), Some(first)) = (src_info.last(), dst_info.first()) {
            assert!(last < first, "move {src} -> {dst} overlaps");
        }
    }

    // Alias maps are mutual inverses
    for (&src, &dst) in result.moves_src2dst() {
        assert_eq!(result.moves_dst2src().get(&dst), Some(&src));
    }
    assert_eq!(result.moves_src2dst().len(), result.moves_dst2src().len());
    for (&dst, &src) in result.copies_dst2src() {
        assert!(result.copies_src2dst()[&src].contains(&dst));
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Type key of pooled test instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Rgba8,
    Rgba16f,
    D32,
}

/// Layout-like state of test instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    ColorAttachment,
    ShaderRead,
    TransferDst,
    Present,
}

pub type TestBackend = PooledBackend<Format, u32, Layout>;

/// Backend whose allocator hands out increasing handles starting at 1.
pub fn counting_backend() -> TestBackend {
    let mut next = 0;
    PooledBackend::new(move |_: &Format| {
        next += 1;
        Ok::<_, BackendError>(next)
    })
}

/// Counting backend with every resource of `graph` registered as temporal
/// under `format`.
pub fn temporal_backend(graph: &FrameGraph, format: Format) -> TestBackend {
    let mut backend = counting_backend();
    for node in graph.resource_nodes() {
        let resource = graph.resource_node_index(node.name()).unwrap();
        backend.register_temporal(resource, format);
    }
    backend
}
