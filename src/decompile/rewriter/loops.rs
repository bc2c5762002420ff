//! Loop collapse.
//!
//! The outermost loop header is found in reverse postorder, its natural loop
//! and exit chosen, and the whole loop replaced by a single node whose body
//! is structured recursively. Edges back to the header become `continue`
//! statements and edges to the exit become `break` statements.

use std::collections::BTreeSet;

use super::Structurer;
use crate::decompile::dominator::Dominators;
use crate::decompile::error::{DecompileError, DecompileResult};
use crate::decompile::statement_graph::NodeId;
use crate::decompile::statements::{Marker, Statement};
use crate::decompile::types::JavaType;
use crate::decompile::values::JavaValue;

pub(super) fn collapse_loops(
    s: &mut Structurer,
    entry: &mut NodeId,
    members: &mut BTreeSet<NodeId>,
) -> DecompileResult<()> {
    loop {
        let doms = Dominators::compute(&*s.graph, *entry, Some(members));
        let header = doms.reverse_postorder().iter().copied().find(|&h| {
            s.graph
                .node(h)
                .source
                .iter()
                .any(|&u| members.contains(&u) && doms.dominates(h, u))
        });
        let Some(header) = header else {
            return Ok(());
        };
        collapse(s, header, &doms, entry, members)?;
    }
}

/// Condition header with exactly one edge inside the loop:
/// `(inside edge index, inside target, outside target)`.
fn header_exit(s: &Structurer, header: NodeId, natural: &BTreeSet<NodeId>) -> Option<(usize, NodeId, NodeId)> {
    let node = s.graph.node(header);
    if !matches!(node.statement, Statement::Condition { ternary: false, .. }) {
        return None;
    }
    match node.next.as_slice() {
        [a, b] if natural.contains(a) && !natural.contains(b) => Some((0, *a, *b)),
        [a, b] if !natural.contains(a) && natural.contains(b) => Some((1, *b, *a)),
        _ => None,
    }
}

/// Single latch that is a condition leaving the loop on its other edge:
/// `(latch, edge index to the header, outside target)`.
fn latch_exit(
    s: &Structurer,
    header: NodeId,
    latches: &[NodeId],
    natural: &BTreeSet<NodeId>,
) -> Option<(NodeId, usize, NodeId)> {
    let [latch] = latches else {
        return None;
    };
    if *latch == header {
        return None;
    }
    let node = s.graph.node(*latch);
    if !matches!(node.statement, Statement::Condition { ternary: false, .. }) || node.next.len() != 2 {
        return None;
    }
    let back = node.next.iter().position(|&n| n == header)?;
    let other = node.next[1 - back];
    (!natural.contains(&other)).then_some((*latch, back, other))
}

fn is_marker(s: &Structurer, node: NodeId) -> bool {
    matches!(
        s.graph.node(node).statement,
        Statement::Break { .. } | Statement::Continue { .. }
    )
}

fn collapse(
    s: &mut Structurer,
    header: NodeId,
    doms: &Dominators,
    entry: &mut NodeId,
    members: &mut BTreeSet<NodeId>,
) -> DecompileResult<()> {
    let header_id = s.graph.node(header).id;
    let mut latches: Vec<NodeId> = s
        .graph
        .node(header)
        .source
        .iter()
        .copied()
        .filter(|&u| members.contains(&u) && doms.dominates(header, u))
        .collect();
    latches.sort_unstable();
    latches.dedup();

    let mut natural = BTreeSet::from([header]);
    let mut pending = latches.clone();
    while let Some(n) = pending.pop() {
        if natural.insert(n) {
            pending.extend(
                s.graph
                    .node(n)
                    .source
                    .iter()
                    .copied()
                    .filter(|&p| members.contains(&p) && doms.contains(p)),
            );
        }
    }

    let mut candidates: Vec<NodeId> = Vec::new();
    for &n in doms.reverse_postorder() {
        if !natural.contains(&n) {
            continue;
        }
        for &next in &s.graph.node(n).next {
            if !natural.contains(&next) && members.contains(&next) && !candidates.contains(&next) {
                candidates.push(next);
            }
        }
    }

    let outside: BTreeSet<NodeId> = members.difference(&natural).copied().collect();
    let reaches: Vec<BTreeSet<NodeId>> = candidates
        .iter()
        .map(|&c| s.graph.reachable(c, &outside, &BTreeSet::new()))
        .collect();
    let terminal = |i: usize| {
        candidates
            .iter()
            .enumerate()
            .all(|(j, c)| j == i || (!reaches[i].contains(c) && !reaches[j].contains(&candidates[i])))
    };

    let header_edge = header_exit(s, header, &natural);
    let latch_edge = latch_exit(s, header, &latches, &natural);
    let preferred = header_edge
        .map(|(_, _, out)| out)
        .or(latch_edge.map(|(_, _, out)| out))
        .filter(|p| candidates.contains(p));

    let nonterminal: Vec<usize> = (0..candidates.len())
        .filter(|&i| !terminal(i) && !is_marker(s, candidates[i]))
        .collect();
    let exit = if !nonterminal.is_empty() {
        let found = nonterminal
            .iter()
            .copied()
            .find(|&i| nonterminal.iter().all(|&j| reaches[j].contains(&candidates[i])));
        match found {
            Some(i) => Some(candidates[i]),
            None => return Err(DecompileError::InvalidBreak { header: header_id }),
        }
    } else if preferred.is_some() {
        preferred
    } else {
        let plain: Vec<NodeId> = candidates.iter().copied().filter(|&c| !is_marker(s, c)).collect();
        match (plain.as_slice(), candidates.as_slice()) {
            ([only], _) => Some(*only),
            ([], [only]) => Some(*only),
            _ => None,
        }
    };

    let mut body = natural.clone();
    let stop: BTreeSet<NodeId> = exit.into_iter().collect();
    for &c in &candidates {
        if Some(c) == exit {
            continue;
        }
        for n in s.graph.reachable(c, &outside, &stop) {
            if !doms.dominates(header, n) {
                return Err(DecompileError::InvalidBreak { header: header_id });
            }
            body.insert(n);
        }
    }

    let id = s.new_loop();
    let loop_node = s.graph.add_with_id(header_id, Statement::Goto);
    for pred in s.graph.node(header).source.clone() {
        if !body.contains(&pred) {
            s.graph.retarget(pred, header, loop_node);
        }
    }
    if *entry == header {
        *entry = loop_node;
    }
    if s.graph.entry == Some(header) {
        s.graph.entry = Some(loop_node);
    }

    let while_edge = header_edge.filter(|&(_, _, out)| Some(out) == exit);
    let mut body_members = body.clone();
    let (condition, body_entry) = if let Some((inside_edge, inside, _)) = while_edge {
        let value = match s.graph.take_statement(header) {
            Statement::Condition { value, .. } => value,
            _ => return Err(DecompileError::InvalidShape { node: header_id, reason: "loop" }),
        };
        s.graph.set_next(header, Vec::new());
        body_members.remove(&header);
        let condition = if inside_edge == 0 { value } else { value.negate() };
        (condition, (inside != header).then_some(inside))
    } else {
        let condition = match latch_edge {
            Some((latch, back, out)) if Some(out) == exit => {
                let value = match s.graph.take_statement(latch) {
                    Statement::Condition { value, .. } => value,
                    _ => return Err(DecompileError::InvalidShape { node: header_id, reason: "loop" }),
                };
                s.graph.node_mut(latch).statement = Statement::Middle(Marker::End);
                s.graph.set_next(latch, Vec::new());
                if back == 0 {
                    value
                } else {
                    value.negate()
                }
            }
            _ => JavaValue::Custom {
                text: "true".into(),
                ty: Some(JavaType::boolean()),
            },
        };
        (condition, Some(header))
    };

    for n in body_members.clone() {
        let from_id = s.graph.node(n).id;
        let mut targets = s.graph.node(n).next.clone();
        targets.dedup();
        for target in targets {
            let marker = if target == header {
                Statement::Continue { target: id, label: None }
            } else if Some(target) == exit {
                Statement::Break {
                    target: Some(id),
                    label: None,
                }
            } else if body_members.contains(&target) {
                continue;
            } else {
                return Err(DecompileError::InvalidBreak { header: header_id });
            };
            let marker = s.graph.add_with_id(from_id, marker);
            s.graph.retarget(n, target, marker);
            body_members.insert(marker);
        }
    }
    if while_edge.is_some() {
        s.graph.remove(header);
    }

    let statements = match body_entry {
        Some(start) => s.structure_region(start, body_members)?,
        None => Vec::new(),
    };
    let statement = if while_edge.is_some() {
        Statement::While {
            id,
            label: None,
            condition,
            body: statements,
        }
    } else {
        Statement::DoWhile {
            id,
            label: None,
            condition,
            body: statements,
        }
    };
    log::trace!("collapsed loop {:?} at node {}", id, header_id);
    s.graph.node_mut(loop_node).statement = statement;
    s.graph.set_next(loop_node, exit.into_iter().collect());
    for n in &body {
        members.remove(n);
    }
    members.insert(loop_node);
    Ok(())
}
