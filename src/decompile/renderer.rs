//! Java source rendering of structured statements.

use std::fmt::Write;

use super::resolver::FunctionContext;
use super::statements::{CaseLabel, Marker, Statement};
use super::types::{JavaType, Primitive};
use super::values::{CmpKind, CompareOp, FunctionCall, InvokeKind, JavaValue, Lambda, Literal, UnaryOp};
use super::var_id::{Symbols, VarId, VarKind};

const PRIMARY: u8 = 16;
const UNARY: u8 = 14;
const TERNARY: u8 = 2;
const LAMBDA: u8 = 1;

/// Configuration for rendering Java source code.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub indent: String,
    /// Terminate simple statements with `;`.
    pub semicolons: bool,
    /// Print simple class names instead of qualified ones.
    pub short_class_names: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent: "    ".into(),
            semicolons: true,
            short_class_names: true,
        }
    }
}

impl RenderConfig {
    /// One statement or brace per line, no indentation and no semicolons.
    pub fn compact() -> Self {
        Self {
            indent: String::new(),
            semicolons: false,
            short_class_names: true,
        }
    }
}

/// Java source code renderer.
pub struct JavaRenderer<'a> {
    config: &'a RenderConfig,
    context: &'a FunctionContext,
    symbols: &'a Symbols,
    output: String,
    indent_level: usize,
}

impl<'a> JavaRenderer<'a> {
    pub fn new(config: &'a RenderConfig, context: &'a FunctionContext, symbols: &'a Symbols) -> Self {
        Self {
            config,
            context,
            symbols,
            output: String::new(),
            indent_level: 0,
        }
    }

    /// Render a method body. Lines are joined by `\n` with no trailing newline.
    pub fn render_block(mut self, block: &[Statement]) -> String {
        self.write_statements(block);
        self.finish()
    }

    pub fn render_value(&self, value: &JavaValue) -> String {
        self.value(value)
    }

    fn finish(mut self) -> String {
        if self.output.ends_with('\n') {
            self.output.pop();
        }
        self.output
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn write_statements(&mut self, block: &[Statement]) {
        for statement in block {
            self.write_statement(statement);
        }
    }

    /// A child block one level deeper; an empty block is one empty line.
    fn write_nested(&mut self, block: &[Statement]) {
        self.indent_level += 1;
        if block.is_empty() {
            self.raw_newline();
        } else {
            self.write_statements(block);
        }
        self.indent_level -= 1;
    }

    fn write_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::If {
                condition,
                if_body,
                else_body,
            } => {
                self.writeln(&format!("if ({}){{", self.value(condition)));
                self.write_nested(if_body);
                if let Some(else_body) = else_body {
                    self.writeln("}else{");
                    self.write_nested(else_body);
                }
                self.writeln("}");
            }
            Statement::While {
                label,
                condition,
                body,
                ..
            } => {
                self.write_label(label);
                self.writeln(&format!("while ({}){{", self.value(condition)));
                self.write_nested(body);
                self.writeln("}");
            }
            Statement::DoWhile {
                label,
                condition,
                body,
                ..
            } => {
                self.write_label(label);
                self.writeln("do{");
                self.write_nested(body);
                let line = format!("}}while({})", self.value(condition));
                self.simple(line);
            }
            Statement::Switch { value, cases } => {
                self.writeln(&format!("switch ({}){{", self.value(value)));
                self.indent_level += 1;
                for case in cases {
                    for label in &case.labels {
                        match label {
                            CaseLabel::Value(v) => self.writeln(&format!("case {}:", v)),
                            CaseLabel::Default => self.writeln("default:"),
                        }
                    }
                    self.indent_level += 1;
                    self.write_statements(&case.body);
                    self.indent_level -= 1;
                }
                self.indent_level -= 1;
                self.writeln("}");
            }
            Statement::TryCatch { try_body, catches } => {
                self.writeln("try{");
                self.write_nested(try_body);
                for clause in catches {
                    let name = clause.var.map(|v| self.var(v)).unwrap_or_else(|| "ignored".into());
                    self.writeln(&format!("}}catch ({} {}){{", self.type_name(&clause.exception), name));
                    self.write_nested(&clause.body);
                }
                self.writeln("}");
            }
            Statement::Synchronized { lock, body } => {
                self.writeln(&format!("synchronized ({}){{", self.value(lock)));
                self.write_nested(body);
                self.writeln("}");
            }
            Statement::Custom(text) => self.writeln(text),
            Statement::Goto | Statement::Middle(Marker::Start | Marker::End | Marker::TryStart(_)) => {}
            other => {
                let line = self.simple_text(other);
                self.simple(line);
            }
        }
    }

    fn simple_text(&self, statement: &Statement) -> String {
        match statement {
            Statement::Assign {
                left: JavaValue::Ref(var),
                value,
                declares: true,
            } => format!("{} {} = {}", self.var_type(*var), self.var(*var), self.value(value)),
            Statement::Assign { left, value, .. } => format!("{} = {}", self.value(left), self.value(value)),
            Statement::Declare(var) => format!("{} {}", self.var_type(*var), self.var(*var)),
            Statement::Condition { value, .. } => format!("/* branch on {} */", self.value(value)),
            Statement::Return(None) => "return".into(),
            Statement::Return(Some(value)) => format!("return {}", self.value(value)),
            Statement::Throw(value) => format!("throw {}", self.value(value)),
            Statement::Expression(value) => self.value(value),
            Statement::Increment { var, delta } => {
                let name = self.var(*var);
                match *delta {
                    1 => format!("{}++", name),
                    -1 => format!("{}--", name),
                    d if d < 0 => format!("{} -= {}", name, -(d as i64)),
                    d => format!("{} += {}", name, d),
                }
            }
            Statement::Break { label, .. } => jump("break", label),
            Statement::Continue { label, .. } => jump("continue", label),
            Statement::Middle(Marker::Switch(value)) => format!("switch ({})", self.value(value)),
            Statement::Middle(Marker::MonitorEnter(value)) => format!("monitorenter({})", self.value(value)),
            Statement::Middle(Marker::MonitorExit(value)) => format!("monitorexit({})", self.value(value)),
            other => format!("/* {:?} */", other),
        }
    }

    fn write_label(&mut self, label: &Option<String>) {
        if let Some(label) = label {
            self.writeln(&format!("{}:", label));
        }
    }

    fn simple(&mut self, mut line: String) {
        if self.config.semicolons {
            line.push(';');
        }
        self.writeln(&line);
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    fn value(&self, value: &JavaValue) -> String {
        self.value_prec(value).0
    }

    /// `value`, parenthesised when it binds looser than `min`.
    fn operand(&self, value: &JavaValue, min: u8) -> String {
        let (text, prec) = self.value_prec(value);
        if prec < min {
            format!("({})", text)
        } else {
            text
        }
    }

    fn value_prec(&self, value: &JavaValue) -> (String, u8) {
        match value {
            JavaValue::Literal { value, ty } => {
                let text = self.literal(value, self.symbols.types.get(*ty));
                let prec = if text.starts_with('-') { UNARY } else { PRIMARY };
                (text, prec)
            }
            JavaValue::Ref(var) => (self.var(*var), PRIMARY),
            JavaValue::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                (
                    format!("{} {} {}", self.operand(lhs, p), op.as_str(), self.operand(rhs, p + 1)),
                    p,
                )
            }
            JavaValue::Unary { op, operand } => {
                let sign = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                (format!("{}{}", sign, self.operand(operand, UNARY + 1)), UNARY)
            }
            JavaValue::Compare { op, lhs, rhs } => {
                if let Some(truth) = self.boolean_literal(rhs) {
                    let positive = (*op == CompareOp::Eq) == truth;
                    if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                        return if positive {
                            self.value_prec(lhs)
                        } else {
                            (format!("!{}", self.operand(lhs, UNARY + 1)), UNARY)
                        };
                    }
                }
                let p = op.precedence();
                (
                    format!("{} {} {}", self.operand(lhs, p), op.as_str(), self.operand(rhs, p + 1)),
                    p,
                )
            }
            JavaValue::RawCompare { kind, lhs, rhs } => {
                let owner = match kind {
                    CmpKind::LCmp => "Long",
                    CmpKind::FCmpL | CmpKind::FCmpG => "Float",
                    CmpKind::DCmpL | CmpKind::DCmpG => "Double",
                };
                (format!("{}.compare({}, {})", owner, self.value(lhs), self.value(rhs)), PRIMARY)
            }
            JavaValue::Cast { ty, value } => (
                format!("({}) {}", self.type_name(ty), self.operand(value, UNARY)),
                UNARY,
            ),
            JavaValue::InstanceOf { value, ty } => (
                format!(
                    "{} instanceof {}",
                    self.operand(value, CompareOp::PRECEDENCE_RELATIONAL),
                    self.type_name(ty)
                ),
                CompareOp::PRECEDENCE_RELATIONAL,
            ),
            JavaValue::Ternary {
                condition,
                if_true,
                if_false,
            } => (
                format!(
                    "{} ? {} : {}",
                    self.operand(condition, TERNARY + 1),
                    self.operand(if_true, TERNARY + 1),
                    self.operand(if_false, TERNARY)
                ),
                TERNARY,
            ),
            JavaValue::New { class, args, .. } => (
                format!("new {}({})", self.class_name(class), self.args(args)),
                PRIMARY,
            ),
            JavaValue::NewArray { ty, dims } => (self.new_array(ty, dims), PRIMARY),
            JavaValue::ArrayLength(array) => (format!("{}.length", self.operand(array, PRIMARY)), PRIMARY),
            JavaValue::ArrayMember { array, index } => (
                format!("{}[{}]", self.operand(array, PRIMARY), self.value(index)),
                PRIMARY,
            ),
            JavaValue::Field {
                owner, name, object, ..
            } => {
                let text = match object {
                    Some(object) => format!("{}.{}", self.operand(object, PRIMARY), name),
                    None => format!("{}.{}", self.class_name(owner), name),
                };
                (text, PRIMARY)
            }
            JavaValue::Call(call) => (self.call(call), PRIMARY),
            JavaValue::Lambda { lambda, .. } => (self.lambda(lambda), LAMBDA),
            JavaValue::Slot { id, .. } => (format!("slot{}", id), PRIMARY),
            JavaValue::UninitNew { class, .. } => (format!("new {}", self.class_name(class)), PRIMARY),
            JavaValue::CaughtException(_) => ("caughtException".into(), PRIMARY),
            JavaValue::Custom { text, .. } => (text.clone(), PRIMARY),
        }
    }

    fn literal(&self, value: &Literal, ty: &JavaType) -> String {
        match value {
            Literal::Int(v) => match ty {
                JavaType::Primitive(Primitive::Boolean) => (*v != 0).to_string(),
                JavaType::Primitive(Primitive::Char) => char_literal(*v),
                _ => v.to_string(),
            },
            Literal::Long(v) => format!("{}L", v),
            Literal::Float(v) => float_literal(*v as f64, "Float", "f"),
            Literal::Double(v) => float_literal(*v, "Double", ""),
            Literal::String(s) => format!("\"{}\"", escape_java_string(s)),
            Literal::Class(ty) => format!("{}.class", self.type_name(ty)),
            Literal::Null => "null".into(),
        }
    }

    fn boolean_literal(&self, value: &JavaValue) -> Option<bool> {
        match value {
            JavaValue::Literal {
                value: Literal::Int(v),
                ty,
            } if self.symbols.types.get(*ty).is_boolean() => Some(*v != 0),
            _ => None,
        }
    }

    fn args(&self, args: &[JavaValue]) -> String {
        args.iter().map(|a| self.value(a)).collect::<Vec<_>>().join(", ")
    }

    fn call(&self, call: &FunctionCall) -> String {
        let args = self.args(&call.args);
        let own_class = self.context.is_own_class(&call.owner);
        match &call.receiver {
            Some(receiver) if call.name == "<init>" => {
                if own_class || !self.is_this(receiver) {
                    format!("this({})", args)
                } else {
                    format!("super({})", args)
                }
            }
            Some(receiver) if call.kind == InvokeKind::Special && !own_class && self.is_this(receiver) => {
                format!("super.{}({})", call.name, args)
            }
            Some(receiver) => format!("{}.{}({})", self.operand(receiver, PRIMARY), call.name, args),
            None => format!("{}.{}({})", self.class_name(&call.owner), call.name, args),
        }
    }

    fn is_this(&self, value: &JavaValue) -> bool {
        matches!(value, JavaValue::Ref(var) if self.symbols.vars.get(*var).kind == VarKind::This)
    }

    fn lambda(&self, lambda: &Lambda) -> String {
        match lambda {
            Lambda::MethodRef {
                name,
                receiver: Some(receiver),
                ..
            } => format!("{}::{}", self.operand(receiver, PRIMARY), name),
            Lambda::MethodRef { owner, name, .. } => format!("{}::{}", self.class_name(owner), name),
            Lambda::Inline { params, body } => {
                let params = params.iter().map(|p| self.var(*p)).collect::<Vec<_>>().join(", ");
                match body.as_slice() {
                    [Statement::Return(Some(value))] | [Statement::Expression(value)] => {
                        format!("({}) -> {}", params, self.value(value))
                    }
                    _ => {
                        let mut inner = JavaRenderer {
                            config: self.config,
                            context: self.context,
                            symbols: self.symbols,
                            output: String::new(),
                            indent_level: self.indent_level + 1,
                        };
                        inner.write_statements(body);
                        format!(
                            "({}) -> {{\n{}\n{}}}",
                            params,
                            inner.finish(),
                            self.config.indent.repeat(self.indent_level)
                        )
                    }
                }
            }
        }
    }

    fn new_array(&self, ty: &JavaType, dims: &[JavaValue]) -> String {
        let mut element = ty;
        let mut depth = 0;
        while let Some(inner) = element.element_type() {
            element = inner;
            depth += 1;
        }
        let mut text = format!("new {}", self.type_name(element));
        for dim in dims {
            let _ = write!(text, "[{}]", self.value(dim));
        }
        for _ in dims.len()..depth {
            text.push_str("[]");
        }
        text
    }

    fn var(&self, var: VarId) -> String {
        let info = self.symbols.vars.get(var);
        if let VarKind::Captured(value) = &info.kind {
            return self.value(value);
        }
        match &info.name {
            Some(name) => name.clone(),
            None => format!("slot{}_{}", info.slot, info.generation),
        }
    }

    fn var_type(&self, var: VarId) -> String {
        self.type_name(self.symbols.var_type(var))
    }

    fn type_name(&self, ty: &JavaType) -> String {
        ty.display_with(&|name| self.class_name(name))
    }

    fn class_name(&self, internal: &str) -> String {
        self.context.class_name(internal, self.config.short_class_names)
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.output.push_str(&self.config.indent);
        }
    }

    fn writeln(&mut self, text: &str) {
        self.write_indent();
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn raw_newline(&mut self) {
        self.output.push('\n');
    }
}

impl Statement {
    /// Render this statement (and its nested blocks) as source text.
    pub fn render(&self, config: &RenderConfig, context: &FunctionContext, symbols: &Symbols) -> String {
        let mut renderer = JavaRenderer::new(config, context, symbols);
        renderer.write_statement(self);
        renderer.finish()
    }
}

fn jump(keyword: &str, label: &Option<String>) -> String {
    match label {
        Some(label) => format!("{} {}", keyword, label),
        None => keyword.to_string(),
    }
}

fn float_literal(v: f64, boxed: &str, suffix: &str) -> String {
    if v.is_nan() {
        format!("{}.NaN", boxed)
    } else if v.is_infinite() {
        if v > 0.0 {
            format!("{}.POSITIVE_INFINITY", boxed)
        } else {
            format!("{}.NEGATIVE_INFINITY", boxed)
        }
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}{}", v, suffix)
    } else {
        format!("{}{}", v, suffix)
    }
}

fn char_literal(v: i32) -> String {
    let Some(c) = u32::try_from(v).ok().and_then(char::from_u32) else {
        return v.to_string();
    };
    match c {
        '\\' => "'\\\\'".into(),
        '\'' => "'\\''".into(),
        '\n' => "'\\n'".into(),
        '\r' => "'\\r'".into(),
        '\t' => "'\\t'".into(),
        c if c.is_ascii_graphic() || c == ' ' => format!("'{}'", c),
        c => format!("'\\u{:04x}'", c as u32),
    }
}

fn escape_java_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
