use super::types::JavaType;
use super::values::JavaValue;
use super::var_id::VarId;

/// Identity of a structured loop, used by `break`/`continue` to name their
/// target independently of labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaseLabel {
    Value(i32),
    Default,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaseItem {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    pub exception: JavaType,
    pub var: Option<VarId>,
    pub body: Vec<Statement>,
}

/// Transient statements that only exist between simulation and structuring.
#[derive(Clone, Debug, PartialEq)]
pub enum Marker {
    Start,
    End,
    /// Head of a protected range; successors are `[try body, handlers...]`.
    TryStart(Vec<JavaType>),
    /// Raw `tableswitch`/`lookupswitch` on the given value.
    Switch(JavaValue),
    MonitorEnter(JavaValue),
    MonitorExit(JavaValue),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `left = value`; `declares` marks the assignment that introduces the
    /// variable in source.
    Assign {
        left: JavaValue,
        value: JavaValue,
        declares: bool,
    },
    Declare(VarId),
    /// Two-way branch; the first successor is taken when `value` holds.
    Condition {
        value: JavaValue,
        /// Consumed while building a ternary value.
        ternary: bool,
    },
    Goto,
    Return(Option<JavaValue>),
    Throw(JavaValue),
    Expression(JavaValue),
    /// `iinc`: `var++`, `var -= 3`, ...
    Increment {
        var: VarId,
        delta: i32,
    },
    If {
        condition: JavaValue,
        if_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    While {
        id: LoopId,
        label: Option<String>,
        condition: JavaValue,
        body: Vec<Statement>,
    },
    DoWhile {
        id: LoopId,
        label: Option<String>,
        condition: JavaValue,
        body: Vec<Statement>,
    },
    Switch {
        value: JavaValue,
        cases: Vec<CaseItem>,
    },
    TryCatch {
        try_body: Vec<Statement>,
        catches: Vec<CatchClause>,
    },
    Synchronized {
        lock: JavaValue,
        body: Vec<Statement>,
    },
    /// `target` is `None` for a `break` out of the innermost `switch`.
    Break {
        target: Option<LoopId>,
        label: Option<String>,
    },
    Continue {
        target: LoopId,
        label: Option<String>,
    },
    Middle(Marker),
    /// Opaque text rendered verbatim.
    Custom(String),
}

impl Statement {
    pub fn custom(text: impl Into<String>) -> Self {
        Statement::Custom(text.into())
    }

    pub fn condition(value: JavaValue) -> Self {
        Statement::Condition {
            value,
            ternary: false,
        }
    }

    /// Control never reaches the statement after this one.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Statement::Return(_)
                | Statement::Throw(_)
                | Statement::Break { .. }
                | Statement::Continue { .. }
        )
    }

    /// Child statement blocks, in source order.
    pub fn blocks(&self) -> Vec<&Vec<Statement>> {
        match self {
            Statement::If {
                if_body, else_body, ..
            } => std::iter::once(if_body).chain(else_body.iter()).collect(),
            Statement::While { body, .. }
            | Statement::DoWhile { body, .. }
            | Statement::Synchronized { body, .. } => vec![body],
            Statement::Switch { cases, .. } => cases.iter().map(|c| &c.body).collect(),
            Statement::TryCatch { try_body, catches } => std::iter::once(try_body)
                .chain(catches.iter().map(|c| &c.body))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<Statement>> {
        match self {
            Statement::If {
                if_body, else_body, ..
            } => std::iter::once(if_body).chain(else_body.iter_mut()).collect(),
            Statement::While { body, .. }
            | Statement::DoWhile { body, .. }
            | Statement::Synchronized { body, .. } => vec![body],
            Statement::Switch { cases, .. } => cases.iter_mut().map(|c| &mut c.body).collect(),
            Statement::TryCatch { try_body, catches } => std::iter::once(try_body)
                .chain(catches.iter_mut().map(|c| &mut c.body))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Values evaluated by the statement itself, excluding nested blocks.
    pub fn values(&self) -> Vec<&JavaValue> {
        match self {
            Statement::Assign { left, value, .. } => vec![left, value],
            Statement::Condition { value, .. }
            | Statement::Throw(value)
            | Statement::Expression(value)
            | Statement::Switch { value, .. } => vec![value],
            Statement::Return(value) => value.iter().collect(),
            Statement::If { condition, .. }
            | Statement::While { condition, .. }
            | Statement::DoWhile { condition, .. } => vec![condition],
            Statement::Synchronized { lock, .. } => vec![lock],
            Statement::Middle(
                Marker::Switch(value) | Marker::MonitorEnter(value) | Marker::MonitorExit(value),
            ) => vec![value],
            _ => Vec::new(),
        }
    }

    pub fn values_mut(&mut self) -> Vec<&mut JavaValue> {
        match self {
            Statement::Assign { left, value, .. } => vec![left, value],
            Statement::Condition { value, .. }
            | Statement::Throw(value)
            | Statement::Expression(value)
            | Statement::Switch { value, .. } => vec![value],
            Statement::Return(value) => value.iter_mut().collect(),
            Statement::If { condition, .. }
            | Statement::While { condition, .. }
            | Statement::DoWhile { condition, .. } => vec![condition],
            Statement::Synchronized { lock, .. } => vec![lock],
            Statement::Middle(
                Marker::Switch(value) | Marker::MonitorEnter(value) | Marker::MonitorExit(value),
            ) => vec![value],
            _ => Vec::new(),
        }
    }

    /// Apply `f` to every value in this statement and its nested blocks.
    pub fn rewrite_values(&mut self, f: &mut dyn FnMut(&mut JavaValue)) {
        for value in self.values_mut() {
            value.rewrite(f);
        }
        for block in self.blocks_mut() {
            for stmt in block.iter_mut() {
                stmt.rewrite_values(f);
            }
        }
    }
}

/// Whether the last statement of `block` transfers control away.
pub fn ends_with_jump(block: &[Statement]) -> bool {
    block.last().map(Statement::is_jump).unwrap_or(false)
}
