//! `synchronized` recovery from monitor markers.
//!
//! javac guards a synchronized body with a catch-all handler that releases the
//! monitor and rethrows. That shape, as well as a bare enter/exit pair, is
//! folded into a single `synchronized` statement.

use crate::decompile::statements::{Marker, Statement};
use crate::decompile::values::JavaValue;

pub(super) fn rewrite_block(block: &mut Vec<Statement>) {
    for statement in block.iter_mut() {
        for child in statement.blocks_mut() {
            rewrite_block(child);
        }
    }

    let mut i = 0;
    while i < block.len() {
        let Statement::Middle(Marker::MonitorEnter(lock)) = &block[i] else {
            i += 1;
            continue;
        };
        let lock = lock.clone();
        let replaced = if is_guarded_try(block.get(i + 1)) {
            if let Statement::TryCatch { mut try_body, .. } = block.remove(i + 1) {
                // The lock is held up to the last release on the normal path.
                let after = match try_body.iter().rposition(is_exit) {
                    Some(last) => try_body.split_off(last + 1),
                    None => Vec::new(),
                };
                strip_exits(&mut try_body);
                block[i] = Statement::Synchronized {
                    lock: lock.clone(),
                    body: try_body,
                };
                block.splice(i + 1..i + 1, after);
            }
            true
        } else if let Some(exit) = matching_exit(block, i) {
            let mut body: Vec<Statement> = block.drain(i + 1..=exit).collect();
            body.pop();
            block[i] = Statement::Synchronized {
                lock: lock.clone(),
                body,
            };
            true
        } else {
            log::warn!("monitorenter without a matching exit");
            false
        };
        if replaced && i > 0 && holds_lock_copy(&block[i - 1], &lock) {
            block.remove(i - 1);
            i -= 1;
        }
        i += 1;
    }
}

/// `try { ...; monitorexit } catch (any) { ...; monitorexit; throw }`
fn is_guarded_try(statement: Option<&Statement>) -> bool {
    let Some(Statement::TryCatch { try_body, catches }) = statement else {
        return false;
    };
    try_body.iter().any(is_exit)
        && !catches.is_empty()
        && catches.iter().all(|c| {
            matches!(c.body.last(), Some(Statement::Throw(_))) && c.body.iter().any(is_exit)
        })
}

fn is_exit(statement: &Statement) -> bool {
    matches!(statement, Statement::Middle(Marker::MonitorExit(_)))
}

/// Index of the exit pairing with the enter at `enter`, on the same level.
fn matching_exit(block: &[Statement], enter: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, statement) in block[enter + 1..].iter().enumerate() {
        match statement {
            Statement::Middle(Marker::MonitorEnter(_)) => depth += 1,
            Statement::Middle(Marker::MonitorExit(_)) if depth == 0 => return Some(enter + 1 + offset),
            Statement::Middle(Marker::MonitorExit(_)) => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Remove monitor exits from a guarded body, including the ones javac places
/// before each early return, without entering nested `synchronized` bodies.
fn strip_exits(block: &mut Vec<Statement>) {
    block.retain(|s| !is_exit(s));
    for statement in block.iter_mut() {
        if matches!(statement, Statement::Synchronized { .. }) {
            continue;
        }
        for child in statement.blocks_mut() {
            strip_exits(child);
        }
    }
}

/// The `astore` javac emits to keep the lock for the exit paths.
fn holds_lock_copy(statement: &Statement, lock: &JavaValue) -> bool {
    matches!(statement, Statement::Assign { left: JavaValue::Ref(_), value, .. } if value == lock)
}
