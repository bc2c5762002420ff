//! Jump graph over decoded instructions.
//!
//! Every instruction becomes a node. Edges follow fallthrough, branches,
//! switches and exits; a synthetic `start` node precedes the first
//! instruction, all returns and throws lead to a synthetic `end` node, and each
//! protected range of the exception table is entered through a `try_start`
//! node whose successors are `[protected code, handlers...]`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;
use std::ops::Range;

use crate::code_attribute::table::{END, START, TRY_START};
use crate::code_attribute::{ExceptionEntry, InstrInfo};

use super::decoder::{DecodedCode, Instruction, SwitchTargets};
use super::dominator::FlowGraph;
use super::error::{DecompileError, DecompileResult};

#[derive(Clone, Debug)]
pub struct OpcodeNode {
    /// Stable ordering id; instruction nodes keep `index + 1`.
    pub id: usize,
    pub offset: u32,
    pub info: &'static InstrInfo,
    /// `None` for synthetic nodes.
    pub instruction: Option<Instruction>,
    pub next: Vec<usize>,
    pub source: Vec<usize>,
    /// `try_start` only: catch-type constant index per handler successor.
    pub catch_types: Vec<u16>,
    /// `try_start` only: ordering ids of the protected instructions.
    pub protected: Option<Range<usize>>,
    /// Set on handler entry nodes.
    pub handler: bool,
    /// Operand-stack slot of the first value this node pushes.
    pub stack_slot: usize,
}

impl OpcodeNode {
    fn synthetic(id: usize, info: &'static InstrInfo, offset: u32) -> Self {
        OpcodeNode {
            id,
            offset,
            info,
            instruction: None,
            next: Vec::new(),
            source: Vec::new(),
            catch_types: Vec::new(),
            protected: None,
            handler: false,
            stack_slot: 0,
        }
    }

    pub fn switch_targets(&self) -> Option<&SwitchTargets> {
        self.instruction.as_ref().and_then(|i| i.switch.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct OpcodeGraph {
    pub nodes: Vec<OpcodeNode>,
    pub entry: usize,
    /// Instruction offset to node index, for live instruction nodes.
    pub offsets: BTreeMap<u32, usize>,
}

struct TryRange {
    start: u32,
    end: u32,
}

impl OpcodeGraph {
    pub fn build(decoded: DecodedCode, exception_table: &[ExceptionEntry]) -> DecompileResult<Self> {
        let count = decoded.nodes.len();
        let mut nodes: Vec<OpcodeNode> = Vec::with_capacity(count + 2);
        nodes.push(OpcodeNode::synthetic(0, &START, 0));
        for (i, instr) in decoded.nodes.iter().enumerate() {
            nodes.push(OpcodeNode {
                id: i + 1,
                offset: instr.offset,
                info: instr.info,
                instruction: Some(instr.clone()),
                next: Vec::new(),
                source: Vec::new(),
                catch_types: Vec::new(),
                protected: None,
                handler: false,
                stack_slot: 0,
            });
        }
        let code_end = decoded
            .nodes
            .last()
            .map(|i| i.offset + i.length)
            .unwrap_or(0);
        let end = nodes.len();
        nodes.push(OpcodeNode::synthetic(end, &END, code_end));

        let index_of = |offset: u32| decoded.index_of(offset).map(|i| i + 1);

        // --- Protected ranges ---
        let mut try_nodes: BTreeMap<usize, usize> = BTreeMap::new();
        let mut ranges: HashMap<usize, Vec<TryRange>> = HashMap::new();
        for entry in exception_table {
            if entry.start_pc == entry.handler_pc {
                continue;
            }
            let start = index_of(entry.start_pc as u32).ok_or(DecompileError::InvalidTarget {
                offset: entry.start_pc as u32,
                target: entry.start_pc as i64,
            })?;
            let handler = index_of(entry.handler_pc as u32).ok_or(DecompileError::InvalidTarget {
                offset: entry.start_pc as u32,
                target: entry.handler_pc as i64,
            })?;
            let try_index = *try_nodes.entry(start).or_insert_with(|| {
                let id = nodes.len();
                nodes.push(OpcodeNode::synthetic(id, &TRY_START, entry.start_pc as u32));
                id
            });
            nodes[handler].handler = true;
            let try_node = &mut nodes[try_index];
            if !try_node.next[..].contains(&handler) {
                try_node.catch_types.push(entry.catch_type);
                try_node.next.push(handler);
            }
            ranges.entry(start).or_default().push(TryRange {
                start: entry.start_pc as u32,
                end: entry.end_pc as u32,
            });
        }
        // Handlers were collected first; the protected code goes in front.
        for (&start, &try_index) in &try_nodes {
            nodes[try_index].next.insert(0, start);
            let end_pc = ranges[&start].iter().map(|r| r.end).max().unwrap_or(code_end);
            let last = if end_pc >= code_end {
                end
            } else {
                index_of(end_pc).ok_or(DecompileError::InvalidTarget {
                    offset: nodes[try_index].offset,
                    target: end_pc as i64,
                })?
            };
            nodes[try_index].protected = Some(start..last);
        }

        let mut graph = OpcodeGraph {
            nodes,
            entry: 0,
            offsets: BTreeMap::new(),
        };

        // --- Linking ---
        let redirect = |graph: &OpcodeGraph, from: usize, to: usize| -> usize {
            match try_nodes.get(&to) {
                Some(&try_index) if from != try_index => {
                    let from_offset = graph.nodes[from].offset;
                    let inside = !graph.nodes[from].info.is_pseudo()
                        && ranges[&to]
                            .iter()
                            .any(|r| from_offset >= r.start && from_offset < r.end);
                    if inside {
                        to
                    } else {
                        try_index
                    }
                }
                _ => to,
            }
        };

        let mut visited = vec![false; graph.nodes.len()];
        let mut pending = vec![0usize];
        while let Some(index) = pending.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;
            let targets = graph.successor_indices(index, end, &index_of)?;
            let mut linked = Vec::with_capacity(targets.len());
            for target in targets {
                let target = redirect(&graph, index, target);
                linked.push(target);
            }
            // Successors are pushed in reverse so the walk visits them in edge order.
            for &target in linked.iter().rev() {
                if !visited[target] {
                    pending.push(target);
                }
            }
            graph.nodes[index].next = linked;
        }
        for index in 0..graph.nodes.len() {
            if !visited[index] {
                graph.nodes[index].next.clear();
            }
        }
        graph.rebuild_sources();

        graph.remove_nops();
        graph.compact(&visited);
        graph.assign_stack_slots();
        log::debug!("jump graph: {} nodes", graph.nodes.len());
        Ok(graph)
    }

    /// Raw successor indices of `index` before try redirection.
    fn successor_indices(
        &self,
        index: usize,
        end: usize,
        index_of: &dyn Fn(u32) -> Option<usize>,
    ) -> DecompileResult<Vec<usize>> {
        let node = &self.nodes[index];
        if node.info.is_pseudo() {
            return Ok(match node.info.opcode {
                o if o == START.opcode => {
                    if end > 1 {
                        vec![1]
                    } else {
                        vec![end]
                    }
                }
                o if o == TRY_START.opcode => node.next.clone(),
                _ => Vec::new(),
            });
        }
        let Some(instr) = &node.instruction else {
            return Ok(Vec::new());
        };
        let resolve = |target: i64| -> DecompileResult<usize> {
            u32::try_from(target)
                .ok()
                .and_then(index_of)
                .ok_or(DecompileError::InvalidTarget {
                    offset: instr.offset,
                    target,
                })
        };
        let fallthrough = || -> DecompileResult<usize> {
            let next = index + 1;
            if next < end {
                Ok(next)
            } else {
                Err(DecompileError::InvalidTarget {
                    offset: instr.offset,
                    target: (instr.offset + instr.length) as i64,
                })
            }
        };

        if node.info.exits_method() {
            Ok(vec![end])
        } else if node.info.is_goto() {
            Ok(vec![resolve(instr.jump.unwrap_or(-1))?])
        } else if node.info.is_branch() {
            Ok(vec![resolve(instr.jump.unwrap_or(-1))?, fallthrough()?])
        } else if let Some(switch) = &instr.switch {
            switch
                .targets()
                .into_iter()
                .map(|t| resolve(t as i64))
                .collect()
        } else if let Some(jump) = instr.jump {
            // jsr: the simulator rejects subroutines, keep the edge for the dump.
            Ok(vec![resolve(jump)?])
        } else if node.info.name == "ret" {
            Ok(Vec::new())
        } else {
            Ok(vec![fallthrough()?])
        }
    }

    fn rebuild_sources(&mut self) {
        for node in &mut self.nodes {
            node.source.clear();
        }
        for index in 0..self.nodes.len() {
            let next = self.nodes[index].next.clone();
            for target in next {
                self.nodes[target].source.push(index);
            }
        }
    }

    /// Bridge predecessors of each reachable `nop` to its successors.
    fn remove_nops(&mut self) {
        for index in 0..self.nodes.len() {
            if !self.nodes[index].info.is_nop() || self.nodes[index].next.len() != 1 {
                continue;
            }
            let target = self.nodes[index].next[0];
            if target == index {
                continue;
            }
            let sources = std::mem::take(&mut self.nodes[index].source);
            for &source in &sources {
                for edge in self.nodes[source].next.iter_mut() {
                    if *edge == index {
                        *edge = target;
                    }
                }
            }
            self.nodes[index].next.clear();
            self.nodes[target].source.retain(|&s| s != index);
            self.nodes[target].source.extend(sources);
        }
    }

    /// Drop unreachable and bypassed nodes, renumbering edges.
    fn compact(&mut self, visited: &[bool]) {
        let live: Vec<bool> = (0..self.nodes.len())
            .map(|i| {
                let node = &self.nodes[i];
                i == self.entry
                    || (visited[i] && !node.source.is_empty())
                    || (node.info.opcode == END.opcode && !node.source.is_empty())
            })
            .collect();
        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut kept = Vec::new();
        for (i, node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if live[i] {
                remap[i] = kept.len();
                kept.push(node);
            }
        }
        for node in &mut kept {
            node.next = node.next.iter().map(|&n| remap[n]).filter(|&n| n != usize::MAX).collect();
            node.source = node.source.iter().map(|&n| remap[n]).filter(|&n| n != usize::MAX).collect();
        }
        self.entry = remap[self.entry];
        self.nodes = kept;
        self.offsets = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.instruction.is_some())
            .map(|(i, n)| (n.offset, i))
            .collect();
    }

    /// Operand-stack slot of each node, from its first predecessor in walk order.
    fn assign_stack_slots(&mut self) {
        let mut assigned = BTreeSet::new();
        assigned.insert(self.entry);
        let mut pending = vec![self.entry];
        while let Some(index) = pending.pop() {
            let base = self.nodes[index].stack_slot + self.nodes[index].info.push_count();
            let is_try = self.nodes[index].info.opcode == TRY_START.opcode;
            for (edge, target) in self.nodes[index].next.clone().into_iter().enumerate() {
                if assigned.insert(target) {
                    self.nodes[target].stack_slot = if is_try && edge > 0 { 0 } else { base };
                    pending.push(target);
                }
            }
        }
    }

    pub fn node(&self, index: usize) -> &OpcodeNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Graphviz rendering for debugging.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph opcodes {\n");
        for node in &self.nodes {
            let _ = writeln!(out, "  n{} [label=\"{}: {}\"];", node.id, node.offset, node.info.name);
            for &next in &node.next {
                let _ = writeln!(out, "  n{} -> n{};", node.id, self.nodes[next].id);
            }
        }
        out.push('}');
        out
    }
}

impl FlowGraph for OpcodeGraph {
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
    use crate::code_attribute::opcodes;
    use crate::decompile::decoder::decode;

    fn graph(code: &[u8], table: &[ExceptionEntry]) -> OpcodeGraph {
        OpcodeGraph::build(decode(code).unwrap(), table).unwrap()
    }

    fn names(graph: &OpcodeGraph, index: usize) -> Vec<&'static str> {
        graph.nodes[index]
            .next
            .iter()
            .map(|&n| graph.nodes[n].info.name)
            .collect()
    }

    #[test]
    fn test_branch_edges_jump_first() {
        // 0: iload_0; 1: ifeq -> 6; 4: iconst_1; 5: ireturn; 6: iconst_0; 7: ireturn
        let g = graph(&[0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac], &[]);
        let branch = g.offsets[&1];
        let next: Vec<u32> = g.nodes[branch].next.iter().map(|&n| g.nodes[n].offset).collect();
        assert_eq!(next, vec![6, 4]);
        let ret = g.offsets[&5];
        assert_eq!(names(&g, ret), vec!["end"]);
        assert_eq!(names(&g, g.entry), vec!["iload_0"]);
    }

    #[test]
    fn test_nops_and_dead_code_are_dropped() {
        // nop; return; iconst_0 (unreachable); ireturn
        let g = graph(&[0x00, 0xb1, 0x03, 0xac], &[]);
        let ops: Vec<u8> = g.nodes.iter().map(|n| n.info.opcode).collect();
        assert!(!ops.contains(&opcodes::NOP));
        assert!(!ops.contains(&opcodes::ICONST_0));
        assert_eq!(names(&g, g.entry), vec!["return"]);
        let ret = g.offsets[&1];
        assert_eq!(g.nodes[ret].source, vec![g.entry]);
    }

    #[test]
    fn test_try_start_precedes_protected_range() {
        // 0: aload_0; 1: invokevirtual #2; 4: return; 5: astore_1; 6: return
        let code = [0x2a, 0xb6, 0x00, 0x02, 0xb1, 0x4c, 0xb1];
        let table = [ExceptionEntry {
            start_pc: 0,
            end_pc: 4,
            handler_pc: 5,
            catch_type: 3,
        }];
        let g = graph(&code, &table);
        assert_eq!(names(&g, g.entry), vec!["try_start"]);
        let try_start = g.nodes[g.entry].next[0];
        assert_eq!(names(&g, try_start), vec!["aload_0", "astore_1"]);
        assert_eq!(g.nodes[try_start].catch_types, vec![3]);
        assert_eq!(g.nodes[try_start].protected, Some(1..3));
        let handler = g.offsets[&5];
        assert!(g.nodes[handler].handler);
        assert_eq!(g.nodes[handler].stack_slot, 0);
    }

    #[test]
    fn test_protected_range_runs_to_code_end() {
        // 0: invokestatic #5; 3: return; 4: astore_0; 5: return
        let code = [0xb8, 0x00, 0x05, 0xb1, 0x4b, 0xb1];
        let table = [ExceptionEntry {
            start_pc: 0,
            end_pc: 6,
            handler_pc: 4,
            catch_type: 0,
        }];
        let g = graph(&code, &table);
        let try_start = g.nodes[g.entry].next[0];
        assert_eq!(g.nodes[try_start].protected, Some(1..5));
    }

    #[test]
    fn test_self_covering_entry_is_ignored() {
        let code = [0x2a, 0xb6, 0x00, 0x02, 0xb1, 0x4c, 0xb1];
        let table = [ExceptionEntry {
            start_pc: 5,
            end_pc: 6,
            handler_pc: 5,
            catch_type: 0,
        }];
        let g = graph(&code, &table);
        assert!(g.nodes.iter().all(|n| n.info.name != "try_start"));
    }

    #[test]
    fn test_invalid_branch_target() {
        // goto +2 lands inside its own operands
        let err = OpcodeGraph::build(decode(&[0xa7, 0x00, 0x02, 0xb1]).unwrap(), &[]).unwrap_err();
        assert!(matches!(err, DecompileError::InvalidTarget { offset: 0, target: 2 }));
    }

    #[test]
    fn test_stack_slots() {
        // iconst_1; iconst_2; iadd; ireturn
        let g = graph(&[0x04, 0x05, 0x60, 0xac], &[]);
        let slots: Vec<usize> = [0u32, 1, 2, 3].iter().map(|o| g.nodes[g.offsets[o]].stack_slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dot_output() {
        let g = graph(&[0xb1], &[]);
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph opcodes {"));
        assert!(dot.contains("[label=\"0: return\"]"));
    }
}
