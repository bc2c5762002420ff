//! Declaration placement and variable naming.
//!
//! A statement's position is its path from the method body: statement index,
//! child block index, statement index, and so on. An assignment at path `p`
//! covers every later statement of its block, including everything nested in
//! them. A local whose occurrences are all covered by one of its assignments
//! is declared there; any other local gets a bare declaration at the top of
//! the innermost block that holds all of its occurrences.

use std::collections::{BTreeMap, HashSet};

use super::statements::Statement;
use super::values::{JavaValue, Lambda};
use super::var_id::{Symbols, VarId, VarKind};

type Path = Vec<usize>;

/// Place declarations, then hand out display names in source order.
pub fn assign_scopes(body: &mut Vec<Statement>, symbols: &mut Symbols, params: &[VarId]) {
    place_declarations(body, symbols);
    name_variables(body, symbols, params);
}

#[derive(Default)]
struct Occurrences {
    by_var: BTreeMap<VarId, Vec<(Path, bool)>>,
    /// Bound by a catch clause or already declared.
    skip: HashSet<VarId>,
}

impl Occurrences {
    fn record(&mut self, var: VarId, path: &Path, assign: bool) {
        self.by_var.entry(var).or_default().push((path.clone(), assign));
    }

    fn record_value(&mut self, value: &JavaValue, path: &Path, symbols: &Symbols) {
        let mut vars = Vec::new();
        value.collect_vars(&mut vars);
        captured_vars(value, symbols, &mut vars);
        for var in vars {
            self.record(var, path, false);
        }
    }

    fn collect(&mut self, block: &[Statement], path: &mut Path, symbols: &Symbols) {
        for (index, statement) in block.iter().enumerate() {
            path.push(index);
            match statement {
                Statement::Assign {
                    left: JavaValue::Ref(var),
                    value,
                    ..
                } => {
                    self.record(*var, path, true);
                    self.record_value(value, path, symbols);
                }
                Statement::Declare(var) => {
                    self.skip.insert(*var);
                }
                Statement::Increment { var, .. } => self.record(*var, path, false),
                Statement::TryCatch { catches, .. } => {
                    self.skip.extend(catches.iter().filter_map(|c| c.var));
                }
                other => {
                    for value in other.values() {
                        self.record_value(value, path, symbols);
                    }
                }
            }
            for (child, body) in statement.blocks().into_iter().enumerate() {
                path.push(child);
                self.collect(body, path, symbols);
                path.pop();
            }
            path.pop();
        }
    }
}

/// Outer variables whose values were captured by inlined lambda bodies.
fn captured_vars(value: &JavaValue, symbols: &Symbols, out: &mut Vec<VarId>) {
    if let JavaValue::Lambda { lambda, .. } = value {
        if let Lambda::Inline { body, .. } = lambda.as_ref() {
            let mut inner = Vec::new();
            for statement in body {
                statement_vars(statement, &mut inner);
            }
            for var in inner {
                if let VarKind::Captured(captured) = &symbols.vars.get(var).kind {
                    captured.collect_vars(out);
                }
            }
        }
    }
    for child in value.children() {
        captured_vars(child, symbols, out);
    }
}

fn statement_vars(statement: &Statement, out: &mut Vec<VarId>) {
    for value in statement.values() {
        value.collect_vars(out);
    }
    if let Statement::Increment { var, .. } = statement {
        out.push(*var);
    }
    for block in statement.blocks() {
        for inner in block {
            statement_vars(inner, out);
        }
    }
}

/// `at` runs before `other` on every path that reaches `other`, and `other`
/// is within the scope a declaration at `at` would open.
fn covers(at: &[usize], other: &[usize]) -> bool {
    let Some(k) = at.len().checked_sub(1) else {
        return false;
    };
    other.len() > k && other[..k] == at[..k] && other[k] > at[k]
}

/// Innermost block path containing every occurrence.
fn common_scope(occurrences: &[(Path, bool)]) -> Path {
    let mut prefix: Path = occurrences.first().map(|(p, _)| p.clone()).unwrap_or_default();
    for (path, _) in occurrences.iter().skip(1) {
        let shared = prefix.iter().zip(path).take_while(|(a, b)| a == b).count();
        prefix.truncate(shared);
    }
    let even = prefix.len() - prefix.len() % 2;
    prefix.truncate(even);
    prefix
}

fn is_local(symbols: &Symbols, var: VarId) -> bool {
    matches!(symbols.vars.get(var).kind, VarKind::Local | VarKind::Stack)
}

/// Set the `declares` flag of every local assignment and insert bare
/// declarations where no single assignment can introduce the variable.
pub fn place_declarations(body: &mut Vec<Statement>, symbols: &Symbols) {
    let mut occurrences = Occurrences::default();
    occurrences.collect(body, &mut Vec::new(), symbols);

    let mut declaring: HashSet<Path> = HashSet::new();
    let mut managed: HashSet<VarId> = HashSet::new();
    let mut bare: Vec<(Path, VarId)> = Vec::new();
    for (&var, list) in &occurrences.by_var {
        if occurrences.skip.contains(&var) || !is_local(symbols, var) {
            continue;
        }
        managed.insert(var);
        let candidate = list
            .iter()
            .enumerate()
            .filter(|(_, (_, assign))| *assign)
            .filter(|(i, (at, _))| {
                list.iter()
                    .enumerate()
                    .all(|(j, (other, _))| j == *i || covers(at, other))
            })
            .map(|(_, (at, _))| at)
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        match candidate {
            Some(at) => {
                declaring.insert(at.clone());
            }
            None => bare.push((common_scope(list), var)),
        }
    }

    set_declares(body, &mut Vec::new(), &declaring, &managed);

    bare.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| b.1.cmp(&a.1)));
    for (scope, var) in bare {
        if let Some(block) = block_at(body, &scope) {
            block.insert(0, Statement::Declare(var));
        }
    }
}

fn set_declares(block: &mut [Statement], path: &mut Path, declaring: &HashSet<Path>, managed: &HashSet<VarId>) {
    for (index, statement) in block.iter_mut().enumerate() {
        path.push(index);
        if let Statement::Assign {
            left: JavaValue::Ref(var),
            declares,
            ..
        } = statement
        {
            if managed.contains(var) {
                *declares = declaring.contains(path);
            }
        }
        for (child, body) in statement.blocks_mut().into_iter().enumerate() {
            path.push(child);
            set_declares(body, path, declaring, managed);
            path.pop();
        }
        path.pop();
    }
}

fn block_at<'a>(body: &'a mut Vec<Statement>, scope: &[usize]) -> Option<&'a mut Vec<Statement>> {
    let mut block = body;
    for step in scope.chunks(2) {
        let [index, child] = step else {
            return None;
        };
        block = block.get_mut(*index)?.blocks_mut().into_iter().nth(*child)?;
    }
    Some(block)
}

/// Name parameters first, then every variable in order of appearance.
/// Captured lambda parameters are displayed as their value and stay unnamed.
pub fn name_variables(body: &[Statement], symbols: &mut Symbols, params: &[VarId]) {
    for &param in params {
        name(symbols, param);
    }
    name_block(body, symbols);
}

fn name(symbols: &mut Symbols, var: VarId) {
    if !matches!(symbols.vars.get(var).kind, VarKind::Captured(_)) {
        symbols.name_var(var);
    }
}

fn name_block(block: &[Statement], symbols: &mut Symbols) {
    for statement in block {
        match statement {
            Statement::Declare(var)
            | Statement::Assign {
                left: JavaValue::Ref(var),
                declares: true,
                ..
            } => name(symbols, *var),
            Statement::Increment { var, .. } => name(symbols, *var),
            _ => {}
        }
        for value in statement.values() {
            name_value(value, symbols);
        }
        match statement {
            Statement::TryCatch { try_body, catches } => {
                name_block(try_body, symbols);
                for clause in catches {
                    if let Some(var) = clause.var {
                        name(symbols, var);
                    }
                    name_block(&clause.body, symbols);
                }
            }
            other => {
                for child in other.blocks() {
                    name_block(child, symbols);
                }
            }
        }
    }
}

fn name_value(value: &JavaValue, symbols: &mut Symbols) {
    match value {
        JavaValue::Ref(var) => name(symbols, *var),
        JavaValue::Lambda { lambda, .. } => {
            if let Lambda::Inline { params, body } = lambda.as_ref() {
                for &param in params {
                    name(symbols, param);
                }
                name_block(body, symbols);
            }
        }
        _ => {}
    }
    for child in value.children() {
        name_value(child, symbols);
    }
}
