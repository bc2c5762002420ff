//! Structuring: turns the statement graph into nested statements.
//!
//! Every region (the method body, then each loop body) is handled the same
//! way. Short-circuit conditions are fused first, loops are collapsed
//! outermost first, and the remaining `if`/`switch`/`try` heads are collapsed
//! in reverse topological order until the region is a single chain.

mod ifs;
mod labels;
mod loops;
mod switch;
mod synchronized;
mod try_catch;

use std::collections::{BTreeSet, HashMap};

pub use ifs::collapse_boolean_ternaries;

use super::dominator::{Dominators, PostDominators};
use super::error::{DecompileError, DecompileResult};
use super::statement_graph::{NodeId, StatementGraph};
use super::statements::{LoopId, Marker, Statement};

#[derive(Clone, Copy, Debug)]
pub struct StructureOptions {
    /// Fold `if (a) { if (b) { .. } }` into `if (a && b) { .. }`.
    pub merge_conditions: bool,
}

impl Default for StructureOptions {
    fn default() -> Self {
        Self {
            merge_conditions: true,
        }
    }
}

/// Structure the whole graph with default options.
pub fn structure(graph: &mut StatementGraph) -> DecompileResult<Vec<Statement>> {
    structure_with(graph, StructureOptions::default())
}

pub fn structure_with(graph: &mut StatementGraph, options: StructureOptions) -> DecompileResult<Vec<Statement>> {
    let Some(entry) = graph.entry else {
        return Ok(Vec::new());
    };
    let everything: BTreeSet<NodeId> = graph.live_nodes().collect();
    let members = graph.reachable(entry, &everything, &BTreeSet::new());
    let mut structurer = Structurer {
        graph,
        options,
        next_loop: 0,
        redirects: HashMap::new(),
    };
    let mut body = structurer.structure_region(entry, members)?;
    synchronized::rewrite_block(&mut body);
    labels::resolve(&mut body)?;
    log::debug!("structured {} top-level statements, {} loops", body.len(), structurer.next_loop);
    Ok(body)
}

pub(crate) struct Structurer<'g> {
    graph: &'g mut StatementGraph,
    options: StructureOptions,
    next_loop: usize,
    /// Removed node -> node that replaced it, for region entries that get
    /// bridged away.
    redirects: HashMap<NodeId, NodeId>,
}

impl<'g> Structurer<'g> {
    fn structure_region(&mut self, entry: NodeId, mut members: BTreeSet<NodeId>) -> DecompileResult<Vec<Statement>> {
        let mut entry = entry;
        ifs::merge_short_circuits(self, &members)?;
        loops::collapse_loops(self, &mut entry, &mut members)?;

        let doms = Dominators::compute(&*self.graph, entry, Some(&members));
        let live: BTreeSet<NodeId> = members.iter().copied().filter(|&n| !self.graph.is_removed(n)).collect();
        let post = PostDominators::compute(&*self.graph, &live);

        let order: Vec<NodeId> = doms.reverse_postorder().iter().rev().copied().collect();
        for node in order {
            if self.graph.is_removed(node) {
                continue;
            }
            match &self.graph.node(node).statement {
                Statement::Condition { .. } => ifs::rewrite(self, node, &doms, &members)?,
                Statement::Middle(Marker::Switch(_)) => switch::rewrite(self, node, &doms, &post, &members)?,
                Statement::Middle(Marker::TryStart(_)) => try_catch::rewrite(self, node, &doms, &members)?,
                _ => {}
            }
        }

        let entry = self.resolve(entry);
        self.flatten(entry, &members)
    }

    /// Walk the single-successor chain from `start`, staying on nodes that
    /// `start` dominates. Returns the chain and the node control leaves to.
    fn chain(
        &self,
        start: NodeId,
        doms: &Dominators,
        members: &BTreeSet<NodeId>,
        stop: &dyn Fn(NodeId) -> bool,
    ) -> DecompileResult<(Vec<NodeId>, Option<NodeId>)> {
        let mut chain = Vec::new();
        let mut cur = start;
        loop {
            chain.push(cur);
            match self.graph.node(cur).next.as_slice() {
                [] => return Ok((chain, None)),
                [next] => {
                    let next = *next;
                    if next == start
                        || stop(next)
                        || !members.contains(&next)
                        || !doms.dominates(start, next)
                        || chain.contains(&next)
                    {
                        return Ok((chain, Some(next)));
                    }
                    cur = next;
                }
                _ => {
                    return Err(DecompileError::InvalidShape {
                        node: self.graph.node(cur).id,
                        reason: "unstructured branch",
                    })
                }
            }
        }
    }

    /// A region for `target` entered from `owner`: the chain when `owner` is
    /// its only way in, otherwise empty and leaving straight to `target`.
    fn branch(
        &self,
        owner: NodeId,
        target: NodeId,
        doms: &Dominators,
        members: &BTreeSet<NodeId>,
    ) -> DecompileResult<(Vec<NodeId>, Option<NodeId>)> {
        let exclusive = self.graph.node(target).source.iter().all(|&p| p == owner);
        if target == owner || !exclusive || !members.contains(&target) {
            return Ok((Vec::new(), Some(target)));
        }
        self.chain(target, doms, members, &|_| false)
    }

    /// Move the statements out of `chain`, dropping transient ones, and
    /// remove its nodes from the graph.
    fn take_statements(&mut self, chain: &[NodeId]) -> Vec<Statement> {
        let mut out = Vec::with_capacity(chain.len());
        for &node in chain {
            let statement = self.graph.take_statement(node);
            if !is_transient(&statement) {
                out.push(statement);
            }
        }
        for &node in chain {
            self.graph.remove(node);
        }
        out
    }

    /// Bridge `node` out of the graph, remembering where it pointed.
    fn bridge(&mut self, node: NodeId) -> DecompileResult<()> {
        let target = self.graph.node(node).next.first().copied();
        self.graph.bridge(node)?;
        if let Some(target) = target {
            self.redirects.insert(node, target);
        }
        Ok(())
    }

    fn resolve(&self, mut node: NodeId) -> NodeId {
        while self.graph.is_removed(node) {
            match self.redirects.get(&node) {
                Some(&next) => node = next,
                None => break,
            }
        }
        node
    }

    fn new_loop(&mut self) -> LoopId {
        let id = LoopId(self.next_loop);
        self.next_loop += 1;
        id
    }

    /// Collapse a fully structured region into its statement list.
    fn flatten(&mut self, entry: NodeId, members: &BTreeSet<NodeId>) -> DecompileResult<Vec<Statement>> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cur = (!self.graph.is_removed(entry)).then_some(entry);
        while let Some(node) = cur {
            if !seen.insert(node) {
                return Err(DecompileError::InvalidShape {
                    node: self.graph.node(node).id,
                    reason: "cycle",
                });
            }
            chain.push(node);
            cur = match self.graph.node(node).next.as_slice() {
                [] => None,
                [next] if members.contains(next) => Some(*next),
                [_] => None,
                _ => {
                    return Err(DecompileError::InvalidShape {
                        node: self.graph.node(node).id,
                        reason: "unstructured branch",
                    })
                }
            };
        }
        if let Some(&left) = members
            .iter()
            .find(|&&n| !self.graph.is_removed(n) && !seen.contains(&n))
        {
            return Err(DecompileError::InvalidShape {
                node: self.graph.node(left).id,
                reason: "unreachable",
            });
        }
        Ok(self.take_statements(&chain))
    }
}

fn is_transient(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Goto | Statement::Middle(Marker::Start | Marker::End)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::values::JavaValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_graph() {
        let mut g = StatementGraph::new();
        assert_eq!(structure(&mut g).unwrap(), Vec::new());
    }

    #[test]
    fn test_straight_line_drops_markers() {
        let mut g = StatementGraph::new();
        let start = g.add(Statement::Middle(Marker::Start));
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::Return(None));
        g.link(start, a);
        g.link(a, b);
        assert_eq!(
            structure(&mut g).unwrap(),
            vec![Statement::custom("a"), Statement::Return(None)]
        );
    }

    #[test]
    fn test_irreducible_branch_is_rejected() {
        // c -> [a, b], a -> b, b -> a: two entries into one cycle.
        let mut g = StatementGraph::new();
        let c = g.add(Statement::condition(JavaValue::custom("c")));
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        g.link(c, a);
        g.link(c, b);
        g.link(a, b);
        g.link(b, a);
        assert!(structure(&mut g).is_err());
    }
}
