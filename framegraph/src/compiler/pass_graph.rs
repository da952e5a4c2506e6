//! Pass dependency graph and topological sort.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{CompileResult, CyclicDependencyError, ResourceInfo};
use crate::graph::{FrameGraph, PassIndex};

/// Dependency edges between passes.
///
/// An edge `a -> b` means `a` must complete before `b` starts. Every pass of
/// the compiled graph is a key, including passes without edges.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassGraph {
    adjacency: BTreeMap<PassIndex, BTreeSet<PassIndex>>,
}

impl PassGraph {
    pub(crate) fn reset(&mut self, pass_count: usize) {
        self.adjacency.clear();
        for i in 0..pass_count {
            self.adjacency.insert(PassIndex::new(i as u32), BTreeSet::new());
        }
    }

    pub(crate) fn add_edge(&mut self, from: PassIndex, to: PassIndex) {
        self.adjacency.entry(from).or_default().insert(to);
    }

    /// Passes that must run after `pass`.
    pub fn successors(&self, pass: PassIndex) -> impl Iterator<Item = PassIndex> + '_ {
        self.adjacency.get(&pass).into_iter().flatten().copied()
    }

    /// Check if the edge `from -> to` exists.
    pub fn has_edge(&self, from: PassIndex, to: PassIndex) -> bool {
        self.adjacency
            .get(&from)
            .is_some_and(|successors| successors.contains(&to))
    }

    /// Iterate over every edge as `(from, to)`.
    pub fn edges(&self) -> impl Iterator<Item = (PassIndex, PassIndex)> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(&from, successors)| successors.iter().map(move |&to| (from, to)))
    }

    /// Number of incoming edges of every pass, indexed by pass.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.adjacency.len()];
        for (_, to) in self.edges() {
            in_degree[to.index()] += 1;
        }
        in_degree
    }

    /// Get the number of passes in the graph.
    pub fn pass_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Get the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    /// Topologically sort the passes into `order` using Kahn's algorithm.
    ///
    /// Ready passes are taken first-in first-out, seeded in ascending pass
    /// index, so the same graph always yields the same order.
    pub(crate) fn sort_into(&self, order: &mut Vec<PassIndex>) -> Result<(), CyclicDependencyError> {
        order.clear();
        let mut in_degree = self.in_degrees();

        let mut queue: VecDeque<PassIndex> = self
            .adjacency
            .keys()
            .copied()
            .filter(|pass| in_degree[pass.index()] == 0)
            .collect();

        while let Some(pass) = queue.pop_front() {
            order.push(pass);
            for successor in self.successors(pass) {
                in_degree[successor.index()] -= 1;
                if in_degree[successor.index()] == 0 {
                    queue.push_back(successor);
                }
            }
        }

        if order.len() != self.adjacency.len() {
            let remaining = self
                .adjacency
                .keys()
                .copied()
                .filter(|pass| in_degree[pass.index()] > 0)
                .collect();
            order.clear();
            return Err(CyclicDependencyError::NotADag { remaining });
        }

        Ok(())
    }
}

/// Derive every dependency edge from resource usage, copies and moves.
///
/// Must run after usage collection and move resolution.
pub(super) fn build_edges(graph: &FrameGraph, target: &mut CompileResult) {
    let CompileResult {
        rsrc2info,
        pass_graph,
        moves_src2dst,
        ..
    } = target;
    pass_graph.reset(graph.pass_count());

    for info in rsrc2info.values() {
        if let Some(writer) = info.writer {
            for &reader in &info.readers {
                pass_graph.add_edge(writer, reader);
            }
        }
        if let Some(copy_in) = info.copy_in {
            // The copy overwrites what the readers see
            for &reader in &info.readers {
                pass_graph.add_edge(reader, copy_in);
            }
            if let (Some(writer), true) = (info.writer, info.readers.is_empty()) {
                pass_graph.add_edge(writer, copy_in);
            }
        }
    }

    // A copy is the final use of its source
    for (copy_pass, pass) in graph.passes().filter(|(_, pass)| pass.is_copy()) {
        for &src in pass.inputs() {
            let Some(info) = rsrc2info.get(&src) else {
                continue;
            };
            for &reader in &info.readers {
                if graph.pass_node(reader).is_some_and(|node| node.is_general()) {
                    pass_graph.add_edge(reader, copy_pass);
                }
            }
        }
    }

    for (src, dst) in moves_src2dst.iter() {
        let (Some(src_info), Some(dst_info)) = (rsrc2info.get(src), rsrc2info.get(dst)) else {
            continue;
        };
        for from in final_accessers(src_info) {
            for to in first_accessers(dst_info) {
                pass_graph.add_edge(from, to);
            }
        }
    }
}

/// Passes that touch a resource last: its copy-in, else its readers, else its
/// writer.
fn final_accessers(info: &ResourceInfo) -> Vec<PassIndex> {
    if let Some(copy_in) = info.copy_in {
        vec![copy_in]
    } else if !info.readers.is_empty() {
        info.readers.clone()
    } else {
        info.writer.into_iter().collect()
    }
}

/// Passes that touch a resource first: its writer, else its readers, else its
/// copy-in.
fn first_accessers(info: &ResourceInfo) -> Vec<PassIndex> {
    if let Some(writer) = info.writer {
        vec![writer]
    } else if !info.readers.is_empty() {
        info.readers.clone()
    } else {
        info.copy_in.into_iter().collect()
    }
}
