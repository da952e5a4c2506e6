//! Resource lifetimes and per-pass events.

use super::{CompileResult, PassInfo};
use crate::graph::PassIndex;

/// Assign `first`/`last` order positions to every resource and place its
/// construct, move and destruct events.
///
/// Read-only resources live from their earliest reader to their latest one.
/// Must run after the passes are sorted.
pub(super) fn assign_lifetimes(target: &mut CompileResult) {
    let CompileResult {
        rsrc2info,
        sorted_passes,
        pass2order,
        pass2info,
        prologue,
        moves_src2dst,
        moves_dst2src,
        ..
    } = target;

    pass2order.clear();
    pass2order.resize(sorted_passes.len(), 0);
    for (order, pass) in sorted_passes.iter().enumerate() {
        pass2order[pass.index()] = order;
    }
    pass2info.clear();
    pass2info.resize_with(sorted_passes.len(), PassInfo::default);

    let order = |pass: PassIndex| pass2order[pass.index()];
    for info in rsrc2info.values_mut() {
        let min_reader = info.readers.iter().map(|&p| order(p)).min();
        let max_reader = info.readers.iter().map(|&p| order(p)).max();
        let copy_in = info.copy_in.map(order);

        info.first = info.writer.map(order).or(min_reader).or(copy_in);
        info.last = copy_in.or(max_reader).or(info.first);
    }

    for (&resource, info) in rsrc2info.iter() {
        let is_move_src = moves_src2dst.contains_key(&resource);
        let is_move_dst = moves_dst2src.contains_key(&resource);

        match (info.first, info.last) {
            (Some(first), Some(last)) => {
                if !is_move_dst {
                    pass2info[sorted_passes[first].index()]
                        .construct_resources
                        .push(resource);
                }
                let last_info = &mut pass2info[sorted_passes[last].index()];
                if is_move_src {
                    last_info.move_resources.push(resource);
                } else {
                    last_info.destruct_resources.push(resource);
                }
            }
            // Untouched chain start: bound and handed over before any pass
            _ if is_move_src => {
                if !is_move_dst {
                    prologue.construct_resources.push(resource);
                }
                prologue.move_resources.push(resource);
            }
            // Untouched chain end: dropped right where its source hands over
            _ => {
                let Some(src) = moves_dst2src.get(&resource) else {
                    continue;
                };
                let slot = match rsrc2info.get(src).and_then(|src_info| src_info.last) {
                    Some(last) => &mut pass2info[sorted_passes[last].index()],
                    None => &mut *prologue,
                };
                slot.destruct_resources.push(resource);
            }
        }
    }
}
