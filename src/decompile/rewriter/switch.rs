//! `switch` collapse.
//!
//! Case targets that share a node share a case group. Groups are emitted in
//! label order with `default` last, except that a group another group falls
//! into is emitted straight after it.

use std::collections::BTreeSet;

use super::Structurer;
use crate::decompile::dominator::{Dominators, PostDominators};
use crate::decompile::error::{DecompileError, DecompileResult};
use crate::decompile::statement_graph::NodeId;
use crate::decompile::statements::{CaseItem, CaseLabel, Marker, Statement};

#[derive(Clone, Copy, Debug, PartialEq)]
enum CaseEnd {
    /// Leaves to the node after the switch.
    Merge,
    /// Runs into the group with this target.
    FallThrough(NodeId),
    /// Returns, throws, breaks or continues.
    Terminal,
}

pub(super) fn rewrite(
    s: &mut Structurer,
    node: NodeId,
    doms: &Dominators,
    post: &PostDominators,
    members: &BTreeSet<NodeId>,
) -> DecompileResult<()> {
    let id = s.graph.node(node).id;
    let shape = || DecompileError::InvalidShape { node: id, reason: "switch" };
    let cases = std::mem::take(&mut s.graph.node_mut(node).cases);
    if cases.is_empty() {
        return Err(shape());
    }
    let mut groups: Vec<(NodeId, Vec<CaseLabel>)> = Vec::new();
    for (label, target) in cases {
        match groups.iter_mut().find(|g| g.0 == target) {
            Some(group) => group.1.push(label),
            None => groups.push((target, vec![label])),
        }
    }
    for group in &mut groups {
        group.1.sort();
    }
    groups.sort_by_key(|g| g.1[0]);
    let targets: Vec<NodeId> = groups.iter().map(|g| g.0).collect();
    let merge = match post
        .ipdom(node)
        .filter(|&m| members.contains(&m) && !s.graph.is_removed(m))
    {
        Some(merge) => Some(merge),
        None => common_exit(s, &targets, doms, members).ok_or_else(shape)?,
    };

    let mut regions = Vec::with_capacity(groups.len());
    for &target in &targets {
        if Some(target) == merge {
            regions.push((Vec::new(), CaseEnd::Merge));
            continue;
        }
        if !members.contains(&target) {
            return Err(shape());
        }
        let stop = |n: NodeId| targets.contains(&n) || Some(n) == merge;
        let (chain, exit) = s.chain(target, doms, members, &stop)?;
        let end = match exit {
            None => CaseEnd::Terminal,
            Some(n) if Some(n) == merge => CaseEnd::Merge,
            Some(n) if targets.contains(&n) && n != target => CaseEnd::FallThrough(n),
            Some(_) => return Err(shape()),
        };
        regions.push((chain, end));
    }

    let falls_into = |j: usize| {
        regions
            .iter()
            .any(|(_, end)| *end == CaseEnd::FallThrough(targets[j]))
    };
    let mut order = Vec::with_capacity(groups.len());
    let mut emitted = vec![false; groups.len()];
    for start in 0..groups.len() {
        if emitted[start] || falls_into(start) {
            continue;
        }
        let mut cur = start;
        loop {
            emitted[cur] = true;
            order.push(cur);
            let CaseEnd::FallThrough(next) = regions[cur].1 else {
                break;
            };
            let Some(j) = targets.iter().position(|&t| t == next) else {
                return Err(shape());
            };
            if emitted[j] {
                return Err(shape());
            }
            cur = j;
        }
    }
    if order.len() != groups.len() {
        return Err(shape());
    }

    let mut bodies: Vec<Vec<Statement>> = Vec::with_capacity(groups.len());
    for (chain, _) in &regions {
        bodies.push(s.take_statements(chain));
    }
    let mut items = Vec::with_capacity(groups.len());
    for (position, &index) in order.iter().enumerate() {
        let mut body = std::mem::take(&mut bodies[index]);
        let later_code = order[position + 1..].iter().any(|&j| !bodies[j].is_empty());
        if regions[index].1 == CaseEnd::Merge && later_code {
            body.push(Statement::Break {
                target: None,
                label: None,
            });
        }
        items.push(CaseItem {
            labels: std::mem::take(&mut groups[index].1),
            body,
        });
    }

    let value = match s.graph.take_statement(node) {
        Statement::Middle(Marker::Switch(value)) => value,
        _ => return Err(shape()),
    };
    s.graph.node_mut(node).statement = Statement::Switch { value, cases: items };
    s.graph.set_next(node, merge.into_iter().collect());
    Ok(())
}

/// Where the cases that complete normally continue, when a returning or
/// throwing case leaves the switch without a post-dominator. `None` inside
/// means no case completes normally; the outer `None` means they disagree.
fn common_exit(
    s: &Structurer,
    targets: &[NodeId],
    doms: &Dominators,
    members: &BTreeSet<NodeId>,
) -> Option<Option<NodeId>> {
    let mut merge = None;
    for &target in targets {
        if !members.contains(&target) {
            continue;
        }
        let Ok((_, Some(exit))) = s.chain(target, doms, members, &|n| targets.contains(&n)) else {
            continue;
        };
        if targets.contains(&exit) {
            continue;
        }
        match merge {
            None => merge = Some(exit),
            Some(m) if m == exit => {}
            Some(_) => return None,
        }
    }
    Some(merge)
}

#[cfg(test)]
mod tests {
    use crate::decompile::rewriter::structure;
    use crate::decompile::statement_graph::StatementGraph;
    use crate::decompile::statements::{CaseItem, CaseLabel, Marker, Statement};
    use crate::decompile::values::JavaValue;
    use pretty_assertions::assert_eq;

    fn brk() -> Statement {
        Statement::Break {
            target: None,
            label: None,
        }
    }

    #[test]
    fn test_cases_with_breaks_and_shared_target() {
        // switch (v) { case 1: case 2: a; break; case 3: b; break; default: c; }
        let mut g = StatementGraph::new();
        let sw = g.add(Statement::Middle(Marker::Switch(JavaValue::custom("v"))));
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        let c = g.add(Statement::custom("c"));
        let end = g.add(Statement::Return(None));
        for target in [a, a, b, c] {
            g.link(sw, target);
        }
        g.node_mut(sw).cases = vec![
            (CaseLabel::Value(2), a),
            (CaseLabel::Value(1), a),
            (CaseLabel::Value(3), b),
            (CaseLabel::Default, c),
        ];
        g.link(a, end);
        g.link(b, end);
        g.link(c, end);
        assert_eq!(
            structure(&mut g).unwrap(),
            vec![
                Statement::Switch {
                    value: JavaValue::custom("v"),
                    cases: vec![
                        CaseItem {
                            labels: vec![CaseLabel::Value(1), CaseLabel::Value(2)],
                            body: vec![Statement::custom("a"), brk()],
                        },
                        CaseItem {
                            labels: vec![CaseLabel::Value(3)],
                            body: vec![Statement::custom("b"), brk()],
                        },
                        CaseItem {
                            labels: vec![CaseLabel::Default],
                            body: vec![Statement::custom("c")],
                        },
                    ],
                },
                Statement::Return(None),
            ]
        );
    }

    #[test]
    fn test_returning_case_keeps_common_exit() {
        // switch (v) { case 1: return; case 2: a; break; default: b; } c; return;
        let mut g = StatementGraph::new();
        let sw = g.add(Statement::Middle(Marker::Switch(JavaValue::custom("v"))));
        let early = g.add(Statement::Return(None));
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        let c = g.add(Statement::custom("c"));
        let end = g.add(Statement::Return(None));
        g.link(sw, early);
        g.link(sw, a);
        g.link(sw, b);
        g.node_mut(sw).cases = vec![
            (CaseLabel::Value(1), early),
            (CaseLabel::Value(2), a),
            (CaseLabel::Default, b),
        ];
        g.link(a, c);
        g.link(b, c);
        g.link(c, end);
        assert_eq!(
            structure(&mut g).unwrap(),
            vec![
                Statement::Switch {
                    value: JavaValue::custom("v"),
                    cases: vec![
                        CaseItem {
                            labels: vec![CaseLabel::Value(1)],
                            body: vec![Statement::Return(None)],
                        },
                        CaseItem {
                            labels: vec![CaseLabel::Value(2)],
                            body: vec![Statement::custom("a"), brk()],
                        },
                        CaseItem {
                            labels: vec![CaseLabel::Default],
                            body: vec![Statement::custom("b")],
                        },
                    ],
                },
                Statement::custom("c"),
                Statement::Return(None),
            ]
        );
    }

    #[test]
    fn test_fallthrough_group_follows_its_source() {
        // case 5 falls into case 1; label order alone would put case 1 first.
        let mut g = StatementGraph::new();
        let sw = g.add(Statement::Middle(Marker::Switch(JavaValue::custom("v"))));
        let one = g.add(Statement::custom("one"));
        let five = g.add(Statement::custom("five"));
        let end = g.add(Statement::Return(None));
        g.link(sw, one);
        g.link(sw, five);
        g.link(sw, end);
        g.node_mut(sw).cases = vec![
            (CaseLabel::Value(1), one),
            (CaseLabel::Value(5), five),
            (CaseLabel::Default, end),
        ];
        g.link(five, one);
        g.link(one, end);
        let body = structure(&mut g).unwrap();
        let Statement::Switch { cases, .. } = &body[0] else {
            panic!("expected a switch, got {:?}", body[0]);
        };
        let labels: Vec<Vec<CaseLabel>> = cases.iter().map(|c| c.labels.clone()).collect();
        assert_eq!(
            labels,
            vec![
                vec![CaseLabel::Value(5)],
                vec![CaseLabel::Value(1)],
                vec![CaseLabel::Default]
            ]
        );
        assert_eq!(cases[1].body, vec![Statement::custom("one")]);
    }
}
