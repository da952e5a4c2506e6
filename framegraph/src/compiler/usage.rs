//! Resource usage collection and move resolution.

use std::collections::BTreeMap;

use super::{CompileResult, ResourceInfo, StructuralError};
use crate::graph::{FrameGraph, PassIndex, PassKind, ResourceIndex};

/// Record the writer, readers and copy-in of every resource, in registration
/// order.
pub(super) fn collect_usage(
    graph: &FrameGraph,
    target: &mut CompileResult,
) -> Result<(), StructuralError> {
    for (pass_index, pass) in graph.passes() {
        match pass.kind() {
            PassKind::General => {
                for &resource in pass.inputs() {
                    add_reader(&mut target.rsrc2info, resource, pass_index);
                }
                for &resource in pass.outputs() {
                    let info = target.rsrc2info.entry(resource).or_default();
                    if let Some(first) = info.writer {
                        if first != pass_index {
                            return Err(StructuralError::MultipleWriters {
                                resource,
                                first,
                                second: pass_index,
                            });
                        }
                    }
                    info.writer = Some(pass_index);
                }
            }
            PassKind::Copy => {
                for (src, dst) in pass.copy_pairs() {
                    add_reader(&mut target.rsrc2info, src, pass_index);

                    // A destination repeated within one copy pass counts twice
                    let info = target.rsrc2info.entry(dst).or_default();
                    if let Some(first) = info.copy_in {
                        return Err(StructuralError::MultipleCopyIns {
                            resource: dst,
                            first,
                            second: pass_index,
                        });
                    }
                    info.copy_in = Some(pass_index);

                    target.copies_dst2src.insert(dst, src);
                    target.copies_src2dst.entry(src).or_default().insert(dst);
                }
            }
        }
    }

    for node in graph.move_nodes() {
        target.rsrc2info.entry(node.src()).or_default();
        target.rsrc2info.entry(node.dst()).or_default();
    }

    Ok(())
}

fn add_reader(
    rsrc2info: &mut BTreeMap<ResourceIndex, ResourceInfo>,
    resource: ResourceIndex,
    pass: PassIndex,
) {
    let info = rsrc2info.entry(resource).or_default();
    if !info.readers.contains(&pass) {
        info.readers.push(pass);
    }
}

/// Build the move maps, reject conflicting or cyclic moves and collapse
/// chains through untouched intermediates.
///
/// Must run after [`collect_usage`].
pub(super) fn resolve_moves(
    graph: &FrameGraph,
    target: &mut CompileResult,
) -> Result<(), StructuralError> {
    let mut src2dst = BTreeMap::new();
    let mut dst2src = BTreeMap::new();

    for node in graph.move_nodes() {
        let (src, dst) = (node.src(), node.dst());
        if let Some(&first_dst) = src2dst.get(&src) {
            return Err(StructuralError::MoveOutConflict {
                resource: src,
                first_dst,
                second_dst: dst,
            });
        }
        if let Some(&first_src) = dst2src.get(&dst) {
            return Err(StructuralError::MoveInConflict {
                resource: dst,
                first_src,
                second_src: src,
            });
        }
        src2dst.insert(src, dst);
        dst2src.insert(dst, src);
    }

    // Every node has at most one successor and one predecessor, so each chain
    // starts at a source that is never a destination. Sources not reached from
    // any start lie on a cycle.
    let mut chains = Vec::new();
    let mut reached = 0;
    for &start in src2dst.keys().filter(|src| !dst2src.contains_key(*src)) {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(&next) = src2dst.get(&current) {
            chain.push(next);
            current = next;
        }
        reached += chain.len() - 1;
        chains.push(chain);
    }
    if reached != src2dst.len() {
        let mut cyclic = src2dst.keys().copied().filter(|src| {
            !chains
                .iter()
                .any(|chain| chain[..chain.len() - 1].contains(src))
        });
        if let Some(resource) = cyclic.next() {
            return Err(StructuralError::MoveCycle { resource });
        }
    }

    for chain in chains {
        let last = chain.len() - 1;
        let kept: Vec<ResourceIndex> = chain
            .iter()
            .enumerate()
            .filter(|&(i, resource)| i == 0 || i == last || target.is_touched(*resource))
            .map(|(_, &resource)| resource)
            .collect();

        for pair in kept.windows(2) {
            target.moves_src2dst.insert(pair[0], pair[1]);
            target.moves_dst2src.insert(pair[1], pair[0]);
        }
        if kept.len() < chain.len() {
            log::trace!(
                "FrameGraph: collapsed move chain of {} resources to {}",
                chain.len(),
                kept.len()
            );
        }
    }

    Ok(())
}
