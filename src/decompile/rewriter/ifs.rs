//! Two-way conditions: short-circuit fusion, `if`/`else` collapse and the
//! boolean ternary peephole.

use std::collections::BTreeSet;

use super::Structurer;
use crate::decompile::dominator::Dominators;
use crate::decompile::error::{DecompileError, DecompileResult};
use crate::decompile::statement_graph::NodeId;
use crate::decompile::statements::{ends_with_jump, Statement};
use crate::decompile::types::JavaType;
use crate::decompile::values::{BinOp, JavaValue, Literal};
use crate::decompile::var_id::Symbols;

/// Fuse condition pairs produced by `&&` and `||` into single conditions.
///
/// A condition `b` reached only from condition `a` that shares one target
/// with `a` is folded into it:
///
/// * `a -> [t, b]`, `b -> [t, y]` becomes `a || b -> [t, y]`
/// * `a -> [b, f]`, `b -> [x, f]` becomes `a && b -> [x, f]`
///
/// plus the mirrored forms where `b` reaches the shared target on its other
/// edge, which negate `b`.
pub(super) fn merge_short_circuits(s: &mut Structurer, members: &BTreeSet<NodeId>) -> DecompileResult<()> {
    loop {
        let mut changed = false;
        for &a in members {
            if s.graph.is_removed(a) {
                continue;
            }
            if let Some(fusion) = fusable(s, a, members) {
                apply(s, a, fusion)?;
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

struct Fusion {
    inner: NodeId,
    op: BinOp,
    negate_inner: bool,
    next: [NodeId; 2],
}

fn plain_condition(s: &Structurer, node: NodeId) -> Option<[NodeId; 2]> {
    let n = s.graph.node(node);
    match (&n.statement, n.next.as_slice()) {
        (Statement::Condition { ternary: false, .. }, [t, f]) if t != f => Some([*t, *f]),
        _ => None,
    }
}

fn fusable(s: &Structurer, a: NodeId, members: &BTreeSet<NodeId>) -> Option<Fusion> {
    let [t, f] = plain_condition(s, a)?;
    for (b, b_is_true_edge) in [(f, false), (t, true)] {
        if b == a || !members.contains(&b) || s.graph.node(b).source.as_slice() != [a] {
            continue;
        }
        let Some([bt, bf]) = plain_condition(s, b) else {
            continue;
        };
        if bt == a || bf == a || bt == b || bf == b {
            continue;
        }
        let fusion = if b_is_true_edge {
            if bf == f {
                Some((BinOp::LogicalAnd, false, [bt, f]))
            } else if bt == f {
                Some((BinOp::LogicalAnd, true, [bf, f]))
            } else {
                None
            }
        } else if bt == t {
            Some((BinOp::LogicalOr, false, [t, bf]))
        } else if bf == t {
            Some((BinOp::LogicalOr, true, [t, bt]))
        } else {
            None
        };
        if let Some((op, negate_inner, next)) = fusion {
            return Some(Fusion {
                inner: b,
                op,
                negate_inner,
                next,
            });
        }
    }
    None
}

fn apply(s: &mut Structurer, a: NodeId, fusion: Fusion) -> DecompileResult<()> {
    let outer = condition_value(s, a)?;
    let mut inner = condition_value(s, fusion.inner)?;
    if fusion.negate_inner {
        inner = inner.negate();
    }
    s.graph.remove(fusion.inner);
    s.graph.node_mut(a).statement = Statement::condition(JavaValue::binary(fusion.op, outer, inner));
    s.graph.set_next(a, fusion.next.to_vec());
    Ok(())
}

/// Take the branch value out of the condition at `node`.
fn condition_value(s: &mut Structurer, node: NodeId) -> DecompileResult<JavaValue> {
    let id = s.graph.node(node).id;
    match &mut s.graph.node_mut(node).statement {
        Statement::Condition { value, .. } => Ok(std::mem::replace(value, JavaValue::custom(""))),
        _ => Err(DecompileError::InvalidShape { node: id, reason: "if" }),
    }
}

/// Collapse the condition at `node` and its two branch regions into an `if`.
pub(super) fn rewrite(
    s: &mut Structurer,
    node: NodeId,
    doms: &Dominators,
    members: &BTreeSet<NodeId>,
) -> DecompileResult<()> {
    let id = s.graph.node(node).id;
    let (t, f) = match s.graph.node(node).next.as_slice() {
        [t, f] => (*t, *f),
        _ => return Err(DecompileError::InvalidShape { node: id, reason: "if" }),
    };
    let ternary = matches!(s.graph.node(node).statement, Statement::Condition { ternary: true, .. });
    if ternary && t == f {
        // Both arms only produced a value; the condition lives on in it.
        s.graph.set_next(node, vec![t]);
        return s.bridge(node);
    }

    let (t_chain, t_exit) = if t == f {
        (Vec::new(), Some(t))
    } else {
        s.branch(node, t, doms, members)?
    };
    let (f_chain, f_exit) = if t == f {
        (Vec::new(), Some(f))
    } else {
        s.branch(node, f, doms, members)?
    };
    let merge = match (t_exit, f_exit) {
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
        _ => return Err(DecompileError::InvalidShape { node: id, reason: "if" }),
    };

    // Both arms terminate: keep the arm that returns or throws as the `if`
    // and let the other one follow it.
    let (mut t_chain, mut f_chain, mut merge, mut negate) = (t_chain, f_chain, merge, false);
    if merge.is_none() && !t_chain.is_empty() && !f_chain.is_empty() {
        if leaves_method(s, &f_chain) {
            merge = Some(t);
            t_chain = std::mem::take(&mut f_chain);
            negate = true;
        } else if leaves_method(s, &t_chain) {
            merge = Some(f);
            f_chain.clear();
        }
    }

    let mut condition = condition_value(s, node)?;
    if negate {
        condition = condition.negate();
    }
    let mut if_body = s.take_statements(&t_chain);
    let mut else_body = s.take_statements(&f_chain);
    if if_body.is_empty() && !else_body.is_empty() {
        condition = condition.negate();
        std::mem::swap(&mut if_body, &mut else_body);
    }
    let else_body = if else_body.is_empty() && ends_with_jump(&if_body) {
        None
    } else {
        Some(else_body)
    };
    let statement = if s.options.merge_conditions {
        merge_nested(condition, if_body, else_body)
    } else {
        Statement::If {
            condition,
            if_body,
            else_body,
        }
    };
    s.graph.node_mut(node).statement = statement;
    s.graph.set_next(node, merge.into_iter().collect());
    Ok(())
}

fn leaves_method(s: &Structurer, chain: &[NodeId]) -> bool {
    chain.last().map_or(false, |&n| {
        matches!(s.graph.node(n).statement, Statement::Return(_) | Statement::Throw(_))
    })
}

fn is_empty_else(else_body: &Option<Vec<Statement>>) -> bool {
    else_body.as_ref().map_or(true, Vec::is_empty)
}

/// `if (a) { if (b) { .. } }` with no else on either level becomes
/// `if (a && b) { .. }`.
fn merge_nested(condition: JavaValue, mut if_body: Vec<Statement>, else_body: Option<Vec<Statement>>) -> Statement {
    let mergeable = is_empty_else(&else_body)
        && if_body.len() == 1
        && matches!(&if_body[0], Statement::If { else_body: inner, .. } if is_empty_else(inner));
    if mergeable {
        if let Some(Statement::If {
            condition: inner,
            if_body: body,
            else_body: inner_else,
        }) = if_body.pop()
        {
            let else_body = if (else_body.is_none() && inner_else.is_none()) || ends_with_jump(&body) {
                None
            } else {
                Some(Vec::new())
            };
            return Statement::If {
                condition: JavaValue::binary(BinOp::LogicalAnd, condition, inner),
                if_body: body,
                else_body,
            };
        }
    }
    Statement::If {
        condition,
        if_body,
        else_body,
    }
}

/// Replace `c ? true : false` with `c` and `c ? false : true` with `!c`
/// once literal types are final.
pub fn collapse_boolean_ternaries(body: &mut [Statement], symbols: &Symbols) {
    for statement in body.iter_mut() {
        statement.rewrite_values(&mut |value| {
            let JavaValue::Ternary {
                if_true, if_false, ..
            } = value
            else {
                return;
            };
            let polarity = match (boolean_literal(if_true, symbols), boolean_literal(if_false, symbols)) {
                (Some(true), Some(false)) => true,
                (Some(false), Some(true)) => false,
                _ => return,
            };
            let taken = std::mem::replace(value, JavaValue::custom(""));
            if let JavaValue::Ternary { condition, .. } = taken {
                *value = if polarity { *condition } else { condition.negate() };
            }
        });
    }
}

fn boolean_literal(value: &JavaValue, symbols: &Symbols) -> Option<bool> {
    match value {
        JavaValue::Literal {
            value: Literal::Int(v @ (0 | 1)),
            ty,
        } if *symbols.types.get(*ty) == JavaType::boolean() => Some(*v == 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::rewriter::structure;
    use crate::decompile::statement_graph::StatementGraph;
    use pretty_assertions::assert_eq;

    fn cond(text: &str) -> Statement {
        Statement::condition(JavaValue::custom(text))
    }

    #[test]
    fn test_if_without_else_after_return() {
        let mut g = StatementGraph::new();
        let c = g.add(cond("c"));
        let r = g.add(Statement::Return(None));
        let after = g.add(Statement::custom("after"));
        g.link(c, r);
        g.link(c, after);
        let body = structure(&mut g).unwrap();
        assert_eq!(
            body,
            vec![
                Statement::If {
                    condition: JavaValue::custom("c"),
                    if_body: vec![Statement::Return(None)],
                    else_body: None,
                },
                Statement::custom("after"),
            ]
        );
    }

    #[test]
    fn test_empty_then_branch_is_negated() {
        let mut g = StatementGraph::new();
        let c = g.add(cond("c"));
        let a = g.add(Statement::custom("a"));
        let after = g.add(Statement::custom("after"));
        g.link(c, after);
        g.link(c, a);
        g.link(a, after);
        let body = structure(&mut g).unwrap();
        assert_eq!(
            body[0],
            Statement::If {
                condition: JavaValue::not(JavaValue::custom("c")),
                if_body: vec![Statement::custom("a")],
                else_body: Some(Vec::new()),
            }
        );
    }

    #[test]
    fn test_or_chain_is_fused() {
        // if (a || b) { x } y, as javac lays it out.
        let mut g = StatementGraph::new();
        let a = g.add(cond("a"));
        let b = g.add(cond("b"));
        let x = g.add(Statement::custom("x"));
        let y = g.add(Statement::custom("y"));
        g.link(a, x);
        g.link(a, b);
        g.link(b, x);
        g.link(b, y);
        g.link(x, y);
        let body = structure(&mut g).unwrap();
        assert_eq!(
            body[0],
            Statement::If {
                condition: JavaValue::binary(BinOp::LogicalOr, JavaValue::custom("a"), JavaValue::custom("b")),
                if_body: vec![Statement::custom("x")],
                else_body: Some(Vec::new()),
            }
        );
        assert_eq!(body[1], Statement::custom("y"));
    }

    #[test]
    fn test_nested_ifs_merge_into_and() {
        let mut g = StatementGraph::new();
        let a = g.add(cond("a"));
        let pad = g.add(Statement::custom("pad"));
        let b = g.add(cond("b"));
        let x = g.add(Statement::Return(None));
        let y = g.add(Statement::custom("y"));
        // a -> [pad, y]; pad -> b keeps the two conditions apart.
        g.link(a, pad);
        g.link(a, y);
        g.link(pad, b);
        g.link(b, x);
        g.link(b, y);
        let body = structure(&mut g).unwrap();
        assert_eq!(
            body[0],
            Statement::If {
                condition: JavaValue::custom("a"),
                if_body: vec![
                    Statement::custom("pad"),
                    Statement::If {
                        condition: JavaValue::custom("b"),
                        if_body: vec![Statement::Return(None)],
                        else_body: None,
                    }
                ],
                else_body: Some(Vec::new()),
            }
        );
        assert_eq!(
            merge_nested(
                JavaValue::custom("a"),
                vec![Statement::If {
                    condition: JavaValue::custom("b"),
                    if_body: vec![Statement::Return(None)],
                    else_body: None,
                }],
                None,
            ),
            Statement::If {
                condition: JavaValue::binary(BinOp::LogicalAnd, JavaValue::custom("a"), JavaValue::custom("b")),
                if_body: vec![Statement::Return(None)],
                else_body: None,
            }
        );
    }

    #[test]
    fn test_branch_on_non_condition_is_a_shape_error() {
        let mut g = StatementGraph::new();
        let node = g.add_with_id(4, Statement::custom("x"));
        let mut s = Structurer {
            graph: &mut g,
            options: Default::default(),
            next_loop: 0,
            redirects: Default::default(),
        };
        assert!(matches!(
            condition_value(&mut s, node),
            Err(DecompileError::InvalidShape { node: 4, reason: "if" })
        ));
        assert_eq!(s.graph.node(node).statement, Statement::custom("x"));
    }

    #[test]
    fn test_boolean_ternary_collapses() {
        let mut symbols = Symbols::new();
        let one = JavaValue::boolean(&mut symbols.types, true);
        let zero = JavaValue::boolean(&mut symbols.types, false);
        let ternary = |t: &JavaValue, f: &JavaValue| JavaValue::Ternary {
            condition: Box::new(JavaValue::custom("c")),
            if_true: Box::new(t.clone()),
            if_false: Box::new(f.clone()),
        };
        let mut body = vec![
            Statement::Return(Some(ternary(&one, &zero))),
            Statement::Return(Some(ternary(&zero, &one))),
        ];
        collapse_boolean_ternaries(&mut body, &symbols);
        assert_eq!(
            body,
            vec![
                Statement::Return(Some(JavaValue::custom("c"))),
                Statement::Return(Some(JavaValue::not(JavaValue::custom("c")))),
            ]
        );
    }
}
