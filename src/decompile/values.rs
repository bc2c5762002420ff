use super::statements::Statement;
use super::types::{JavaType, MethodDescriptor, TypeArena, TypeId};
use super::var_id::{Symbols, VarId};

/// Arithmetic, bitwise and short-circuit operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, Rem,
    Shl, Shr, Ushr,
    And, Or, Xor,
    LogicalAnd, LogicalOr,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Ushr => ">>>",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::LogicalAnd => "&&",
            BinOp::LogicalOr => "||",
        }
    }

    /// Java operator precedence; larger binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Mul | BinOp::Div | BinOp::Rem => 12,
            BinOp::Add | BinOp::Sub => 11,
            BinOp::Shl | BinOp::Shr | BinOp::Ushr => 10,
            BinOp::And => 7,
            BinOp::Xor => 6,
            BinOp::Or => 5,
            BinOp::LogicalAnd => 4,
            BinOp::LogicalOr => 3,
        }
    }

    fn is_logical(self) -> bool {
        matches!(self, BinOp::LogicalAnd | BinOp::LogicalOr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq, Ne, Lt, Ge, Gt, Le,
}

impl CompareOp {
    /// Returns the negated comparison.
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
        }
    }

    pub const PRECEDENCE_RELATIONAL: u8 = 9;
    pub const PRECEDENCE_EQUALITY: u8 = 8;

    pub fn precedence(self) -> u8 {
        match self {
            CompareOp::Eq | CompareOp::Ne => Self::PRECEDENCE_EQUALITY,
            _ => Self::PRECEDENCE_RELATIONAL,
        }
    }
}

/// Compare instruction kinds (lcmp, fcmpl, ...), before the following branch
/// turns them into a [`CompareOp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpKind {
    LCmp,
    FCmpL,
    FCmpG,
    DCmpL,
    DCmpG,
}

/// Method invocation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// `Foo.class`
    Class(JavaType),
    Null,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub kind: InvokeKind,
    /// Internal name of the declaring class.
    pub owner: String,
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub receiver: Option<Box<JavaValue>>,
    pub args: Vec<JavaValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Lambda {
    /// `Owner::name` or `receiver::name`.
    MethodRef {
        owner: String,
        name: String,
        receiver: Option<Box<JavaValue>>,
    },
    /// Body decompiled from the synthetic implementation method.
    Inline {
        params: Vec<VarId>,
        body: Vec<Statement>,
    },
}

/// Expression tree node. Literal values carry a [`TypeId`] so that later
/// evidence (a boolean store, a `char` parameter) can retype them in place.
#[derive(Clone, Debug, PartialEq)]
pub enum JavaValue {
    // --- Literals and variables ---
    Literal { value: Literal, ty: TypeId },
    Ref(VarId),

    // --- Operations ---
    Binary { op: BinOp, lhs: Box<JavaValue>, rhs: Box<JavaValue> },
    Unary { op: UnaryOp, operand: Box<JavaValue> },
    Compare { op: CompareOp, lhs: Box<JavaValue>, rhs: Box<JavaValue> },
    /// Result of lcmp/fcmpl/...: -1, 0 or 1.
    RawCompare { kind: CmpKind, lhs: Box<JavaValue>, rhs: Box<JavaValue> },
    Cast { ty: JavaType, value: Box<JavaValue> },
    InstanceOf { value: Box<JavaValue>, ty: JavaType },
    Ternary { condition: Box<JavaValue>, if_true: Box<JavaValue>, if_false: Box<JavaValue> },

    // --- Objects and arrays ---
    New { class: String, descriptor: MethodDescriptor, args: Vec<JavaValue> },
    /// `ty` is the full array type; `dims` may be shorter than its depth.
    NewArray { ty: JavaType, dims: Vec<JavaValue> },
    ArrayLength(Box<JavaValue>),
    ArrayMember { array: Box<JavaValue>, index: Box<JavaValue> },
    Field { owner: String, name: String, ty: JavaType, object: Option<Box<JavaValue>> },
    Call(FunctionCall),
    Lambda { lambda: Box<Lambda>, ty: JavaType },

    // --- Simulation bookkeeping ---
    /// Placeholder for a value merged from several paths; replaced once the
    /// merge has been resolved.
    Slot { id: usize, ty: JavaType },
    /// Result of `new` before its constructor has run.
    UninitNew { class: String, site: usize },
    /// Exception object on entry to a handler.
    CaughtException(JavaType),

    // --- Fallback ---
    Custom { text: String, ty: Option<JavaType> },
}

impl JavaValue {
    pub fn int(types: &mut TypeArena, v: i32) -> Self {
        JavaValue::Literal {
            value: Literal::Int(v),
            ty: types.alloc(JavaType::int()),
        }
    }

    pub fn boolean(types: &mut TypeArena, v: bool) -> Self {
        JavaValue::Literal {
            value: Literal::Int(v as i32),
            ty: types.alloc(JavaType::boolean()),
        }
    }

    pub fn string(types: &mut TypeArena, s: &str) -> Self {
        JavaValue::Literal {
            value: Literal::String(s.to_string()),
            ty: types.alloc(JavaType::string()),
        }
    }

    pub fn null(types: &mut TypeArena) -> Self {
        JavaValue::Literal {
            value: Literal::Null,
            ty: types.alloc(JavaType::Null),
        }
    }

    pub fn custom(text: impl Into<String>) -> Self {
        JavaValue::Custom {
            text: text.into(),
            ty: None,
        }
    }

    pub fn binary(op: BinOp, lhs: JavaValue, rhs: JavaValue) -> Self {
        JavaValue::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn compare(op: CompareOp, lhs: JavaValue, rhs: JavaValue) -> Self {
        JavaValue::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(operand: JavaValue) -> Self {
        JavaValue::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    /// Logical negation, folding comparisons and double negation.
    pub fn negate(self) -> Self {
        match self {
            JavaValue::Compare { op, lhs, rhs } => JavaValue::Compare {
                op: op.negate(),
                lhs,
                rhs,
            },
            JavaValue::Unary {
                op: UnaryOp::Not,
                operand,
            } => *operand,
            JavaValue::Binary {
                op: op @ (BinOp::LogicalAnd | BinOp::LogicalOr),
                lhs,
                rhs,
            } => {
                let flipped = if op == BinOp::LogicalAnd {
                    BinOp::LogicalOr
                } else {
                    BinOp::LogicalAnd
                };
                JavaValue::binary(flipped, lhs.negate(), rhs.negate())
            }
            other => JavaValue::not(other),
        }
    }

    pub fn is_literal_int(&self, expected: i32) -> bool {
        matches!(self, JavaValue::Literal { value: Literal::Int(v), .. } if *v == expected)
    }

    /// Values that may not be dropped without changing behaviour when popped.
    pub fn has_side_effects(&self) -> bool {
        match self {
            JavaValue::Call(_) | JavaValue::New { .. } | JavaValue::Custom { .. } => true,
            JavaValue::Binary { lhs, rhs, .. }
            | JavaValue::Compare { lhs, rhs, .. }
            | JavaValue::RawCompare { lhs, rhs, .. } => lhs.has_side_effects() || rhs.has_side_effects(),
            JavaValue::Unary { operand: v, .. }
            | JavaValue::Cast { value: v, .. }
            | JavaValue::InstanceOf { value: v, .. }
            | JavaValue::ArrayLength(v) => v.has_side_effects(),
            _ => false,
        }
    }

    pub fn java_type(&self, symbols: &Symbols) -> JavaType {
        match self {
            JavaValue::Literal { ty, .. } => symbols.types.get(*ty).clone(),
            JavaValue::Ref(var) => symbols.var_type(*var).clone(),
            JavaValue::Binary { op, lhs, .. } => {
                if op.is_logical() {
                    JavaType::boolean()
                } else {
                    lhs.java_type(symbols)
                }
            }
            JavaValue::Unary { op: UnaryOp::Not, .. }
            | JavaValue::Compare { .. }
            | JavaValue::InstanceOf { .. } => JavaType::boolean(),
            JavaValue::Unary { operand, .. } => operand.java_type(symbols),
            JavaValue::RawCompare { .. } | JavaValue::ArrayLength(_) => JavaType::int(),
            JavaValue::Cast { ty, .. } => ty.clone(),
            JavaValue::Ternary { if_true, .. } => if_true.java_type(symbols),
            JavaValue::New { class, .. } | JavaValue::UninitNew { class, .. } => JavaType::class(class.clone()),
            JavaValue::NewArray { ty, .. } => ty.clone(),
            JavaValue::ArrayMember { array, .. } => match array.java_type(symbols) {
                JavaType::Array(inner) => *inner,
                _ => JavaType::object(),
            },
            JavaValue::Field { ty, .. } => ty.clone(),
            JavaValue::Call(call) => call.descriptor.ret.clone(),
            JavaValue::Lambda { ty, .. } => ty.clone(),
            JavaValue::Slot { ty, .. } => ty.clone(),
            JavaValue::CaughtException(ty) => ty.clone(),
            JavaValue::Custom { ty, .. } => ty.clone().unwrap_or_else(JavaType::object),
        }
    }

    /// Stack category: long and double values count twice for dup2/pop2.
    pub fn is_wide(&self, symbols: &Symbols) -> bool {
        self.java_type(symbols).is_wide()
    }

    /// Visit every direct child value.
    pub fn children(&self) -> Vec<&JavaValue> {
        match self {
            JavaValue::Binary { lhs, rhs, .. }
            | JavaValue::Compare { lhs, rhs, .. }
            | JavaValue::RawCompare { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            JavaValue::Unary { operand: v, .. }
            | JavaValue::Cast { value: v, .. }
            | JavaValue::InstanceOf { value: v, .. }
            | JavaValue::ArrayLength(v) => vec![&**v],
            JavaValue::Ternary {
                condition,
                if_true,
                if_false,
            } => vec![&**condition, &**if_true, &**if_false],
            JavaValue::New { args, .. } => args.iter().collect(),
            JavaValue::NewArray { dims, .. } => dims.iter().collect(),
            JavaValue::ArrayMember { array, index } => vec![&**array, &**index],
            JavaValue::Field { object, .. } => object.iter().map(|o| o.as_ref()).collect(),
            JavaValue::Call(call) => call
                .receiver
                .iter()
                .map(|r| r.as_ref())
                .chain(call.args.iter())
                .collect(),
            JavaValue::Lambda { lambda, .. } => match lambda.as_ref() {
                Lambda::MethodRef { receiver, .. } => receiver.iter().map(|r| r.as_ref()).collect(),
                Lambda::Inline { .. } => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`JavaValue::children`].
    pub fn children_mut(&mut self) -> Vec<&mut JavaValue> {
        match self {
            JavaValue::Binary { lhs, rhs, .. }
            | JavaValue::Compare { lhs, rhs, .. }
            | JavaValue::RawCompare { lhs, rhs, .. } => vec![lhs.as_mut(), rhs.as_mut()],
            JavaValue::Unary { operand: v, .. }
            | JavaValue::Cast { value: v, .. }
            | JavaValue::InstanceOf { value: v, .. }
            | JavaValue::ArrayLength(v) => vec![v.as_mut()],
            JavaValue::Ternary {
                condition,
                if_true,
                if_false,
            } => vec![condition.as_mut(), if_true.as_mut(), if_false.as_mut()],
            JavaValue::New { args, .. } => args.iter_mut().collect(),
            JavaValue::NewArray { dims, .. } => dims.iter_mut().collect(),
            JavaValue::ArrayMember { array, index } => vec![array.as_mut(), index.as_mut()],
            JavaValue::Field { object, .. } => object.iter_mut().map(|o| o.as_mut()).collect(),
            JavaValue::Call(call) => call
                .receiver
                .iter_mut()
                .map(|r| r.as_mut())
                .chain(call.args.iter_mut())
                .collect(),
            JavaValue::Lambda { lambda, .. } => match lambda.as_mut() {
                Lambda::MethodRef { receiver, .. } => receiver.iter_mut().map(|r| r.as_mut()).collect(),
                Lambda::Inline { .. } => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Collect every variable referenced by this value (not descending into
    /// inlined lambda bodies).
    pub fn collect_vars(&self, out: &mut Vec<VarId>) {
        if let JavaValue::Ref(var) = self {
            out.push(*var);
        }
        for child in self.children() {
            child.collect_vars(out);
        }
    }

    /// Apply `f` to this value and every nested value, children first.
    pub fn rewrite(&mut self, f: &mut dyn FnMut(&mut JavaValue)) {
        for child in self.children_mut() {
            child.rewrite(f);
        }
        f(self);
    }
}
