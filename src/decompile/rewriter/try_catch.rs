//! `try`/`catch` collapse.

use std::collections::BTreeSet;

use super::Structurer;
use crate::decompile::dominator::Dominators;
use crate::decompile::error::{DecompileError, DecompileResult};
use crate::decompile::statement_graph::NodeId;
use crate::decompile::statements::{CatchClause, Marker, Statement};
use crate::decompile::types::JavaType;
use crate::decompile::values::JavaValue;
use crate::decompile::var_id::VarId;

/// How a handler takes the exception off the stack.
enum Binding {
    Store(VarId),
    Pop,
}

fn binding(statement: &Statement) -> Option<Binding> {
    match statement {
        Statement::Assign {
            left: JavaValue::Ref(var),
            value: JavaValue::CaughtException(_),
            ..
        } => Some(Binding::Store(*var)),
        Statement::Expression(JavaValue::CaughtException(_)) => Some(Binding::Pop),
        _ => None,
    }
}

pub(super) fn rewrite(
    s: &mut Structurer,
    node: NodeId,
    doms: &Dominators,
    members: &BTreeSet<NodeId>,
) -> DecompileResult<()> {
    let id = s.graph.node(node).id;
    let types = match &s.graph.node(node).statement {
        Statement::Middle(Marker::TryStart(types)) => types.clone(),
        _ => return Err(DecompileError::InvalidShape { node: id, reason: "try" }),
    };
    let next = s.graph.node(node).next.clone();
    let Some((&try_entry, handlers)) = next.split_first() else {
        return Err(DecompileError::InvalidShape { node: id, reason: "try" });
    };

    // The protected body ends at the first node past the exception table
    // range; that node is where control continues after the whole try.
    let protected = s.graph.node(node).protected.clone();
    let graph = &*s.graph;
    let outside = |n: NodeId| protected.as_ref().map_or(false, |r| !r.contains(&graph.node(n).id));
    let (try_chain, try_exit) = s.chain(try_entry, doms, members, &outside)?;
    let mut merge = try_exit;
    let mut regions = Vec::with_capacity(handlers.len());
    for (k, &handler) in handlers.iter().enumerate() {
        let (chain, exit) = s.chain(handler, doms, members, &|_| false)?;
        match (merge, exit) {
            (Some(a), Some(b)) if a != b => {
                return Err(DecompileError::InvalidShape { node: id, reason: "try" });
            }
            (None, Some(b)) => merge = Some(b),
            _ => {}
        }
        let exception = types.get(k).cloned().unwrap_or_else(|| JavaType::class("java/lang/Throwable"));
        regions.push((chain, exception));
    }

    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    for (chain, exception) in regions {
        let first = chain.first().map(|&n| &s.graph.node(n).statement);
        if first.and_then(binding).is_some() {
            kept.push((chain, exception));
        } else {
            log::warn!(
                "dropping handler for {} at node {}: exception is not bound on entry",
                exception.to_descriptor(),
                id
            );
            dropped.push(chain);
        }
    }
    for chain in &dropped {
        s.take_statements(chain);
    }

    if kept.is_empty() {
        s.graph.set_next(node, vec![try_entry]);
        return s.bridge(node);
    }

    let try_body = s.take_statements(&try_chain);
    let mut catches = Vec::with_capacity(kept.len());
    for (chain, exception) in kept {
        let mut body = s.take_statements(&chain);
        let var = match body.first().and_then(binding) {
            Some(Binding::Store(var)) => Some(var),
            _ => None,
        };
        if !body.is_empty() {
            body.remove(0);
        }
        catches.push(CatchClause { exception, var, body });
    }
    s.graph.node_mut(node).statement = Statement::TryCatch { try_body, catches };
    s.graph.set_next(node, merge.into_iter().collect());
    Ok(())
}
