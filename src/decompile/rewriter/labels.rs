//! `break`/`continue` resolution.
//!
//! Trailing `continue` statements of a loop body are dropped, then every jump
//! is checked against the enclosing loops and switches. A jump that does not
//! target the innermost construct it would bind to gets a label, and the
//! labelled loops are named `LOOP_1`, `LOOP_2`, ... in order of first use.

use std::collections::HashMap;

use crate::decompile::error::{DecompileError, DecompileResult};
use crate::decompile::statements::{ends_with_jump, LoopId, Statement};
use crate::decompile::values::JavaValue;

pub(super) fn resolve(block: &mut Vec<Statement>) -> DecompileResult<()> {
    let mut resolver = LabelResolver::default();
    resolver.walk(block)?;
    if !resolver.labels.is_empty() {
        apply_labels(block, &resolver.labels);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Scope {
    Loop(LoopId),
    Switch,
}

#[derive(Default)]
struct LabelResolver {
    scopes: Vec<Scope>,
    labels: HashMap<LoopId, String>,
}

impl LabelResolver {
    fn walk(&mut self, block: &mut Vec<Statement>) -> DecompileResult<()> {
        for statement in block.iter_mut() {
            match statement {
                Statement::While { id, body, .. } | Statement::DoWhile { id, body, .. } => {
                    strip_trailing_continue(body, *id);
                    self.scopes.push(Scope::Loop(*id));
                    self.walk(body)?;
                    self.scopes.pop();
                }
                Statement::Switch { cases, .. } => {
                    self.scopes.push(Scope::Switch);
                    for case in cases.iter_mut() {
                        self.walk(&mut case.body)?;
                    }
                    self.scopes.pop();
                }
                Statement::Break {
                    target: Some(target),
                    label,
                } => *label = self.label_for(*target, true)?,
                Statement::Continue { target, label } => *label = self.label_for(*target, false)?,
                other => {
                    for child in other.blocks_mut() {
                        self.walk(child)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn label_for(&mut self, target: LoopId, is_break: bool) -> DecompileResult<Option<String>> {
        let innermost = if is_break {
            self.scopes.last().copied()
        } else {
            self.scopes
                .iter()
                .rev()
                .find(|s| matches!(s, Scope::Loop(_)))
                .copied()
        };
        if innermost == Some(Scope::Loop(target)) {
            return Ok(None);
        }
        if !self.scopes.contains(&Scope::Loop(target)) {
            return Err(DecompileError::LoopEndConflict { target: target.0 });
        }
        let next = self.labels.len() + 1;
        let label = self
            .labels
            .entry(target)
            .or_insert_with(|| format!("LOOP_{}", next));
        Ok(Some(label.clone()))
    }
}

/// Drop a `continue` of loop `id` that is the last thing its body does,
/// including one at the end of either branch of a trailing `if`.
fn strip_trailing_continue(block: &mut Vec<Statement>, id: LoopId) {
    if matches!(block.last(), Some(Statement::Continue { target, .. }) if *target == id) {
        block.pop();
        return;
    }
    if let Some(Statement::If {
        condition,
        if_body,
        else_body,
    }) = block.last_mut()
    {
        strip_trailing_continue(if_body, id);
        if let Some(else_block) = else_body.as_mut() {
            strip_trailing_continue(else_block, id);
            if if_body.is_empty() && !else_block.is_empty() {
                *condition = std::mem::replace(condition, JavaValue::custom("")).negate();
                std::mem::swap(if_body, else_block);
                *else_body = None;
            } else if else_block.is_empty() && ends_with_jump(if_body) {
                *else_body = None;
            }
        }
    }
}

fn apply_labels(block: &mut [Statement], labels: &HashMap<LoopId, String>) {
    for statement in block.iter_mut() {
        if let Statement::While { id, label, .. } | Statement::DoWhile { id, label, .. } = statement {
            *label = labels.get(id).cloned();
        }
        for child in statement.blocks_mut() {
            apply_labels(child, labels);
        }
    }
}
