//! Dominator and post-dominator analysis over index-addressed graphs.
//!
//! Dominator sets are computed with the classic iterative data-flow
//! formulation in reverse postorder. The immediate dominator of a node is the
//! strict dominator that comes last in reverse postorder.

use std::collections::{BTreeSet, HashMap};

/// Anything with index-addressed successor and predecessor lists.
pub trait FlowGraph {
    fn successors(&self, node: usize) -> &[usize];
    fn predecessors(&self, node: usize) -> &[usize];
}

#[derive(Clone, Debug, Default)]
pub struct Dominators {
    entry: usize,
    order: Vec<usize>,
    rpo_index: HashMap<usize, usize>,
    dom: HashMap<usize, BTreeSet<usize>>,
    idom: HashMap<usize, usize>,
    children: HashMap<usize, Vec<usize>>,
}

impl Dominators {
    /// Dominators of every node reachable from `entry`. With `within`, only
    /// those nodes are visited and edges leaving the set are ignored.
    pub fn compute<G: FlowGraph + ?Sized>(graph: &G, entry: usize, within: Option<&BTreeSet<usize>>) -> Self {
        let allowed = |n: usize| within.map(|w| w.contains(&n)).unwrap_or(true);
        let order = reverse_postorder(graph, entry, &allowed);
        let rpo_index: HashMap<usize, usize> = order.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let all: BTreeSet<usize> = order.iter().copied().collect();
        let mut dom: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for &n in &order {
            if n == entry {
                dom.insert(n, BTreeSet::from([n]));
            } else {
                dom.insert(n, all.clone());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &n in order.iter().skip(1) {
                let mut new: Option<BTreeSet<usize>> = None;
                for &p in graph.predecessors(n) {
                    let Some(pdom) = dom.get(&p) else {
                        continue;
                    };
                    new = Some(match new {
                        None => pdom.clone(),
                        Some(acc) => acc.intersection(pdom).copied().collect(),
                    });
                }
                let mut new = new.unwrap_or_default();
                new.insert(n);
                if dom.get(&n) != Some(&new) {
                    dom.insert(n, new);
                    changed = true;
                }
            }
        }

        let mut idom = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        for &n in &order {
            if n == entry {
                continue;
            }
            let parent = dom[&n]
                .iter()
                .filter(|&&d| d != n)
                .max_by_key(|d| rpo_index[*d])
                .copied();
            if let Some(parent) = parent {
                idom.insert(n, parent);
                children.entry(parent).or_default().push(n);
            }
        }

        Dominators {
            entry,
            order,
            rpo_index,
            dom,
            idom,
            children,
        }
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn contains(&self, node: usize) -> bool {
        self.rpo_index.contains_key(&node)
    }

    /// `a` dominates `b` (reflexive).
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        self.dom.get(&b).map(|d| d.contains(&a)).unwrap_or(false)
    }

    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }

    pub fn idom(&self, node: usize) -> Option<usize> {
        self.idom.get(&node).copied()
    }

    /// Nodes whose immediate dominator is `node`.
    pub fn dominated_by(&self, node: usize) -> &[usize] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reverse_postorder(&self) -> &[usize] {
        &self.order
    }

    pub fn rpo_index(&self, node: usize) -> Option<usize> {
        self.rpo_index.get(&node).copied()
    }
}

fn reverse_postorder<G: FlowGraph + ?Sized>(graph: &G, entry: usize, allowed: &dyn Fn(usize) -> bool) -> Vec<usize> {
    let mut visited = BTreeSet::new();
    let mut post = Vec::new();
    // Explicit stack of (node, next successor position).
    let mut stack = vec![(entry, 0usize)];
    visited.insert(entry);
    while let Some((node, pos)) = stack.pop() {
        let succ = graph.successors(node);
        if pos < succ.len() {
            stack.push((node, pos + 1));
            let next = succ[pos];
            if allowed(next) && visited.insert(next) {
                stack.push((next, 0));
            }
        } else {
            post.push(node);
        }
    }
    post.reverse();
    post
}

/// Sentinel index of the virtual exit used for post-dominators.
pub const VIRTUAL_EXIT: usize = usize::MAX;

/// Reversed view of a node set with a virtual exit joined to every node that
/// has no successor inside the set.
struct Reversed {
    succ: HashMap<usize, Vec<usize>>,
    pred: HashMap<usize, Vec<usize>>,
}

impl FlowGraph for Reversed {
    fn successors(&self, node: usize) -> &[usize] {
        self.succ.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    fn predecessors(&self, node: usize) -> &[usize] {
        self.pred.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Clone, Debug)]
pub struct PostDominators {
    inner: Dominators,
}

impl PostDominators {
    pub fn compute<G: FlowGraph + ?Sized>(graph: &G, members: &BTreeSet<usize>) -> Self {
        let mut view = Reversed {
            succ: HashMap::new(),
            pred: HashMap::new(),
        };
        let mut link = |from: usize, to: usize| {
            view.succ.entry(from).or_default().push(to);
            view.pred.entry(to).or_default().push(from);
        };
        for &n in members {
            let inside: Vec<usize> = graph
                .successors(n)
                .iter()
                .copied()
                .filter(|s| members.contains(s))
                .collect();
            if inside.is_empty() {
                link(VIRTUAL_EXIT, n);
            }
            for s in inside {
                link(s, n);
            }
        }
        PostDominators {
            inner: Dominators::compute(&view, VIRTUAL_EXIT, None),
        }
    }

    /// Immediate post-dominator; `None` when it is the virtual exit.
    pub fn ipdom(&self, node: usize) -> Option<usize> {
        self.inner.idom(node).filter(|&n| n != VIRTUAL_EXIT)
    }

    pub fn post_dominates(&self, a: usize, b: usize) -> bool {
        self.inner.dominates(a, b)
    }
}
