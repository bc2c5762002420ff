//! Arena graph of statements, the working structure of the rewriters.
//!
//! Nodes are addressed by [`NodeId`] (their arena index) and never move;
//! removed nodes stay in the arena, detached and flagged.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;
use std::ops::Range;

use crate::code_attribute::table::{END, START, TRY_START};

use super::dominator::FlowGraph;
use super::error::{DecompileError, DecompileResult};
use super::opcode_graph::OpcodeGraph;
use super::stack_sim::SimulatedMethod;
use super::statements::{CaseLabel, Marker, Statement};
use super::types::JavaType;

pub type NodeId = usize;

#[derive(Clone, Debug)]
pub struct StatementNode {
    /// Ordering id inherited from the opcode node.
    pub id: usize,
    pub statement: Statement,
    pub next: Vec<NodeId>,
    pub source: Vec<NodeId>,
    /// Switch nodes: case labels with their targets.
    pub cases: Vec<(CaseLabel, NodeId)>,
    /// Try nodes built from an exception table: ordering ids of the
    /// protected instructions.
    pub protected: Option<Range<usize>>,
    pub removed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StatementGraph {
    nodes: Vec<StatementNode>,
    pub entry: Option<NodeId>,
}

impl StatementGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose ordering id is its arena index.
    pub fn add(&mut self, statement: Statement) -> NodeId {
        let id = self.nodes.len();
        self.add_with_id(id, statement)
    }

    pub fn add_with_id(&mut self, id: usize, statement: Statement) -> NodeId {
        self.nodes.push(StatementNode {
            id,
            statement,
            next: Vec::new(),
            source: Vec::new(),
            cases: Vec::new(),
            protected: None,
            removed: false,
        });
        let node = self.nodes.len() - 1;
        if self.entry.is_none() {
            self.entry = Some(node);
        }
        node
    }

    pub fn link(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from].next.push(to);
        self.nodes[to].source.push(from);
    }

    pub fn node(&self, node: NodeId) -> &StatementNode {
        &self.nodes[node]
    }

    pub fn node_mut(&mut self, node: NodeId) -> &mut StatementNode {
        &mut self.nodes[node]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        self.nodes[node].removed
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |&n| !self.nodes[n].removed)
    }

    /// Replace every edge `from -> old` by `from -> new`, keeping edge order.
    pub fn retarget(&mut self, from: NodeId, old: NodeId, new: NodeId) {
        let mut moved = 0;
        for edge in self.nodes[from].next.iter_mut() {
            if *edge == old {
                *edge = new;
                moved += 1;
            }
        }
        for case in self.nodes[from].cases.iter_mut() {
            if case.1 == old {
                case.1 = new;
            }
        }
        if moved > 0 {
            self.nodes[old].source.retain(|&s| s != from);
            for _ in 0..moved {
                self.nodes[new].source.push(from);
            }
        }
    }

    /// Replace the successor list of `node`.
    pub fn set_next(&mut self, node: NodeId, next: Vec<NodeId>) {
        for old in std::mem::take(&mut self.nodes[node].next) {
            if let Some(pos) = self.nodes[old].source.iter().position(|&s| s == node) {
                self.nodes[old].source.remove(pos);
            }
        }
        for &to in &next {
            self.nodes[to].source.push(node);
        }
        self.nodes[node].next = next;
    }

    /// Detach `node` from the graph and flag it removed.
    pub fn remove(&mut self, node: NodeId) {
        for source in std::mem::take(&mut self.nodes[node].source) {
            self.nodes[source].next.retain(|&n| n != node);
        }
        for next in std::mem::take(&mut self.nodes[node].next) {
            self.nodes[next].source.retain(|&s| s != node);
        }
        self.nodes[node].removed = true;
        if self.entry == Some(node) {
            self.entry = None;
        }
    }

    /// Remove a single-successor node, connecting its predecessors to its
    /// successor.
    pub fn bridge(&mut self, node: NodeId) -> DecompileResult<()> {
        let target = match self.nodes[node].next.as_slice() {
            [target] if *target != node => *target,
            _ => {
                return Err(DecompileError::InvalidShape {
                    node: self.nodes[node].id,
                    reason: "goto",
                })
            }
        };
        for source in self.nodes[node].source.clone() {
            self.retarget(source, node, target);
        }
        if self.entry == Some(node) {
            self.entry = Some(target);
        }
        self.remove(node);
        Ok(())
    }

    /// Take the statement out of `node`, leaving a `Goto` behind.
    pub fn take_statement(&mut self, node: NodeId) -> Statement {
        std::mem::replace(&mut self.nodes[node].statement, Statement::Goto)
    }

    /// Nodes reachable from `from` without entering `stop`.
    pub fn reachable(&self, from: NodeId, within: &BTreeSet<NodeId>, stop: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![from];
        while let Some(n) = pending.pop() {
            if stop.contains(&n) || !within.contains(&n) || self.nodes[n].removed || !seen.insert(n) {
                continue;
            }
            pending.extend(self.nodes[n].next.iter().copied());
        }
        seen
    }

    /// Build the graph from simulated statements. Each opcode node that
    /// produced statements becomes a chain of statement nodes, stack
    /// temporaries first; edges skip over opcode nodes without statements.
    /// `Goto` statements are bridged out, except a `goto` to itself, which
    /// stays as an empty loop.
    pub fn from_simulation(graph: &OpcodeGraph, sim: SimulatedMethod) -> DecompileResult<Self> {
        let mut out = StatementGraph::new();
        let mut statements = sim.statements;
        let mut preceding = sim.preceding;
        let mut node_of = vec![None; graph.nodes.len()];
        let mut last_of = vec![None; graph.nodes.len()];

        for (index, opcode) in graph.nodes.iter().enumerate() {
            let statement = if opcode.info.opcode == START.opcode {
                Some(Statement::Middle(Marker::Start))
            } else if opcode.info.opcode == TRY_START.opcode {
                let types = opcode
                    .catch_types
                    .iter()
                    .map(|&index| sim.catch_types.get(&index).cloned().unwrap_or_else(|| JavaType::class("java/lang/Throwable")))
                    .collect();
                Some(Statement::Middle(Marker::TryStart(types)))
            } else {
                statements.remove(&index)
            };
            let chain: Vec<Statement> = preceding
                .remove(&index)
                .unwrap_or_default()
                .into_iter()
                .chain(statement)
                .collect();
            for statement in chain {
                let node = out.add_with_id(opcode.id, statement);
                if let Some(prev) = last_of[index] {
                    out.link(prev, node);
                } else {
                    node_of[index] = Some(node);
                }
                last_of[index] = Some(node);
            }
            if let Some(node) = last_of[index] {
                out.nodes[node].protected = opcode.protected.clone();
            }
        }
        out.entry = node_of[graph.entry];

        let resolve = |start: usize| -> DecompileResult<Option<NodeId>> {
            let mut seen = HashSet::new();
            let mut cur = start;
            loop {
                if let Some(node) = node_of[cur] {
                    return Ok(Some(node));
                }
                if graph.nodes[cur].info.opcode == END.opcode {
                    return Ok(None);
                }
                if !seen.insert(cur) {
                    return Err(DecompileError::InvalidShape {
                        node: graph.nodes[start].id,
                        reason: "empty loop",
                    });
                }
                match graph.nodes[cur].next.as_slice() {
                    [next] => cur = *next,
                    _ => {
                        return Err(DecompileError::InvalidShape {
                            node: graph.nodes[cur].id,
                            reason: "statement-less branch",
                        })
                    }
                }
            }
        };

        for (index, opcode) in graph.nodes.iter().enumerate() {
            let Some(from) = last_of[index] else {
                continue;
            };
            let mut targets = Vec::with_capacity(opcode.next.len());
            for &next in &opcode.next {
                targets.push((next, resolve(next)?));
            }
            for (_, target) in &targets {
                if let Some(to) = target {
                    out.link(from, *to);
                }
            }
            if let Some(switch) = opcode.switch_targets() {
                let target_of = |offset: u32| -> DecompileResult<Option<NodeId>> {
                    let opcode_index = graph.offsets.get(&offset).copied().ok_or(DecompileError::InvalidTarget {
                        offset: opcode.offset,
                        target: offset as i64,
                    })?;
                    resolve(opcode_index)
                };
                let mut cases = Vec::new();
                for (key, offset) in &switch.cases {
                    if let Some(node) = target_of(*offset)? {
                        cases.push((CaseLabel::Value(*key), node));
                    }
                }
                if let Some(node) = target_of(switch.default)? {
                    cases.push((CaseLabel::Default, node));
                }
                out.nodes[from].cases = cases;
            }
        }

        let gotos: Vec<NodeId> = out
            .live_nodes()
            .filter(|&n| matches!(out.nodes[n].statement, Statement::Goto) && out.nodes[n].next != [n])
            .collect();
        for node in gotos {
            out.bridge(node)?;
        }
        log::debug!("statement graph: {} nodes", out.live_nodes().count());
        Ok(out)
    }

    /// Graphviz rendering for debugging.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph statements {\n");
        for (index, node) in self.nodes.iter().enumerate() {
            if node.removed {
                continue;
            }
            let label = format!("{:?}", node.statement).replace('"', "\\\"");
            let _ = writeln!(out, "  s{} [label=\"{}: {}\"];", index, node.id, label);
            for &next in &node.next {
                let _ = writeln!(out, "  s{} -> s{};", index, next);
            }
        }
        out.push('}');
        out
    }
}

impl FlowGraph for StatementGraph {
    fn successors(&self, node: usize) -> &[usize] {
        &self.nodes[node].next
    }

    fn predecessors(&self, node: usize) -> &[usize] {
        &self.nodes[node].source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::values::JavaValue;

    #[test]
    fn test_bridge_keeps_edge_order() {
        let mut g = StatementGraph::new();
        let cond = g.add(Statement::condition(JavaValue::custom("c")));
        let goto = g.add(Statement::Goto);
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        g.link(cond, goto);
        g.link(cond, a);
        g.link(goto, b);
        g.link(a, b);
        g.bridge(goto).unwrap();
        assert_eq!(g.node(cond).next, vec![b, a]);
        assert!(g.is_removed(goto));
        let mut sources = g.node(b).source.clone();
        sources.sort();
        assert_eq!(sources, vec![cond, a]);
    }

    #[test]
    fn test_remove_detaches_edges() {
        let mut g = StatementGraph::new();
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        let c = g.add(Statement::custom("c"));
        g.link(a, b);
        g.link(b, c);
        g.remove(b);
        assert!(g.node(a).next.is_empty());
        assert!(g.node(c).source.is_empty());
        assert_eq!(g.live_nodes().collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn test_self_goto_cannot_be_bridged() {
        let mut g = StatementGraph::new();
        let goto = g.add(Statement::Goto);
        g.link(goto, goto);
        assert!(matches!(
            g.bridge(goto),
            Err(DecompileError::InvalidShape { reason: "goto", .. })
        ));
    }

    #[test]
    fn test_dot_lists_edges() {
        let mut g = StatementGraph::new();
        let a = g.add(Statement::custom("a"));
        let b = g.add(Statement::custom("b"));
        g.link(a, b);
        let dot = g.to_dot();
        assert!(dot.contains("s0 -> s1;"));
    }
}
