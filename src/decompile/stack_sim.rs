//! Operand-stack simulation over the jump graph.
//!
//! Nodes are visited in reverse postorder, so every forward predecessor of a
//! node has been simulated before the node itself. The entry stack of a node
//! is the exit stack of its predecessors; where they disagree a shared slot
//! value is pushed and later filled with a ternary built from the merge's
//! immediate dominator.

use std::collections::{BTreeMap, HashMap};

use crate::code_attribute::opcodes::*;
use crate::code_attribute::table::TRY_START;

use super::decoder::Instruction;
use super::dominator::Dominators;
use super::error::{DecompileError, DecompileResult};
use super::method_decompiler::MethodSource;
use super::opcode_graph::OpcodeGraph;
use super::resolver::{
    expect_class, expect_field, expect_method, BootstrapArgument, BootstrapInfo, ConstantPoolResolver,
    FunctionContext, HandleKind, PoolLiteral,
};
use super::statements::{Marker, Statement};
use super::types::{
    class_constant_type, newarray_type, parse_field_descriptor, parse_method_descriptor, JavaType,
    MethodDescriptor, Primitive,
};
use super::values::{BinOp, CmpKind, CompareOp, FunctionCall, InvokeKind, JavaValue, Lambda, Literal, UnaryOp};
use super::var_id::{LocalFrame, Symbols, VarId, VarKind};

const STRING_CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";
const LAMBDA_METAFACTORY: &str = "java/lang/invoke/LambdaMetafactory";
const THROWABLE: &str = "java/lang/Throwable";

/// Result of simulating one method.
#[derive(Clone, Debug, Default)]
pub struct SimulatedMethod {
    /// Statement produced by each opcode node, keyed by node index.
    pub statements: HashMap<usize, Statement>,
    /// Stack temporaries assigned by a node, in order, before its statement.
    pub preceding: HashMap<usize, Vec<Statement>>,
    /// Resolved catch types by constant-pool index (`0` is catch-all).
    pub catch_types: HashMap<u16, JavaType>,
    /// `this` and the declared parameters, in slot order. Captured lambda
    /// parameters are not listed.
    pub params: Vec<VarId>,
}

/// Decompiles the body of a lambda implementation method in place of a
/// method reference.
pub trait LambdaInliner {
    fn inline_lambda(
        &self,
        source: &MethodSource,
        captured: Vec<JavaValue>,
        symbols: &mut Symbols,
    ) -> DecompileResult<(Vec<VarId>, Vec<Statement>)>;
}

#[derive(Clone, Debug, Default)]
struct Frame {
    stack: Vec<JavaValue>,
    locals: LocalFrame,
}

/// A stack position whose value differs between predecessors of `node`.
#[derive(Clone, Copy, Debug)]
struct MergeSlot {
    id: usize,
    node: usize,
    position: usize,
}

pub struct StackSimulator<'a, R: ConstantPoolResolver + ?Sized> {
    graph: &'a OpcodeGraph,
    resolver: &'a R,
    context: &'a FunctionContext,
    symbols: &'a mut Symbols,
    inliner: Option<&'a dyn LambdaInliner>,
    captured: Vec<JavaValue>,
    lambda: bool,

    out_frames: HashMap<usize, Frame>,
    statements: HashMap<usize, Statement>,
    preceding: HashMap<usize, Vec<Statement>>,
    spilled: Vec<Statement>,
    slots: Vec<MergeSlot>,
    slot_refinements: Vec<(usize, JavaType)>,
    aliases: HashMap<VarId, VarId>,
    catch_types: HashMap<u16, JavaType>,
    params: Vec<VarId>,
}

impl<'a, R: ConstantPoolResolver + ?Sized> StackSimulator<'a, R> {
    pub fn new(graph: &'a OpcodeGraph, resolver: &'a R, context: &'a FunctionContext, symbols: &'a mut Symbols) -> Self {
        StackSimulator {
            graph,
            resolver,
            context,
            symbols,
            inliner: None,
            captured: Vec::new(),
            lambda: false,
            out_frames: HashMap::new(),
            statements: HashMap::new(),
            preceding: HashMap::new(),
            spilled: Vec::new(),
            slots: Vec::new(),
            slot_refinements: Vec::new(),
            aliases: HashMap::new(),
            catch_types: HashMap::new(),
            params: Vec::new(),
        }
    }

    pub fn with_inliner(mut self, inliner: &'a dyn LambdaInliner) -> Self {
        self.inliner = Some(inliner);
        self
    }

    /// Simulate a lambda implementation method. The leading parameters (and
    /// `this` for instance methods) receive the captured values.
    pub fn with_captures(mut self, captured: Vec<JavaValue>) -> Self {
        self.captured = captured;
        self.lambda = true;
        self
    }

    pub fn run(mut self) -> DecompileResult<SimulatedMethod> {
        let graph = self.graph;
        let doms = Dominators::compute(graph, graph.entry, None);
        for &index in doms.reverse_postorder() {
            let mut frame = if index == graph.entry {
                self.entry_frame()
            } else {
                self.input_frame(index)?
            };
            let node = &graph.nodes[index];
            if let Some(instr) = &node.instruction {
                log::trace!(
                    "{:>5}: {} depth {} (prepass {})",
                    instr.offset,
                    instr.info.name,
                    frame.stack.len(),
                    node.stack_slot
                );
                if let Some(statement) = self.step(instr, &mut frame)? {
                    self.statements.insert(index, statement);
                }
                if !self.spilled.is_empty() {
                    self.preceding.insert(index, std::mem::take(&mut self.spilled));
                }
            }
            self.out_frames.insert(index, frame);
        }
        self.fill_slots(&doms)?;
        self.apply_aliases();
        log::debug!(
            "simulated {}.{}: {} statements",
            self.context.class_name,
            self.context.method_name,
            self.statements.len()
        );
        Ok(SimulatedMethod {
            statements: self.statements,
            preceding: self.preceding,
            catch_types: self.catch_types,
            params: self.params,
        })
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    fn entry_frame(&mut self) -> Frame {
        let mut frame = Frame::default();
        let mut captured = std::mem::take(&mut self.captured).into_iter();
        let mut slot = 0u16;
        if !self.context.is_static {
            let ty = self.symbols.types.alloc(JavaType::class(self.context.class_name.clone()));
            let kind = match captured.next() {
                Some(value) => VarKind::Captured(value),
                None => VarKind::This,
            };
            let listed = kind == VarKind::This;
            let id = self.symbols.vars.mint(0, None, ty, kind);
            if listed {
                self.params.push(id);
            }
            frame.locals.set(0, id);
            slot = 1;
        }
        for (i, param) in self.context.descriptor.params.iter().enumerate() {
            let ty = self.symbols.types.alloc(param.clone());
            let kind = match captured.next() {
                Some(value) => VarKind::Captured(value),
                None if self.lambda => VarKind::LambdaParam,
                None => VarKind::Param(i),
            };
            let listed = !matches!(kind, VarKind::Captured(_));
            let id = self.symbols.vars.mint(slot, None, ty, kind);
            if listed {
                self.params.push(id);
            }
            frame.locals.set(slot, id);
            slot += if param.is_wide() { 2 } else { 1 };
        }
        frame
    }

    fn input_frame(&mut self, index: usize) -> DecompileResult<Frame> {
        let graph = self.graph;
        let node = &graph.nodes[index];
        let mut incoming: Vec<Frame> = Vec::new();
        for &pred in &node.source {
            let Some(out) = self.out_frames.get(&pred).cloned() else {
                // Back edge; the predecessor has not been simulated yet.
                continue;
            };
            let pred_node = &graph.nodes[pred];
            if pred_node.info.opcode == TRY_START.opcode {
                let edge = pred_node.next.iter().position(|&n| n == index).unwrap_or(0);
                if edge > 0 {
                    let pool_index = pred_node.catch_types.get(edge - 1).copied().unwrap_or(0);
                    let ty = self.catch_type(pool_index)?;
                    incoming.push(Frame {
                        stack: vec![JavaValue::CaughtException(ty)],
                        locals: out.locals,
                    });
                    continue;
                }
            }
            incoming.push(out);
        }

        let mut frames = incoming.into_iter();
        let Some(mut frame) = frames.next() else {
            return Ok(Frame::default());
        };
        let rest: Vec<Frame> = frames.collect();
        for other in &rest {
            self.merge_locals(&mut frame.locals, &other.locals);
        }
        if rest.is_empty() || node.handler {
            return Ok(frame);
        }
        for other in &rest {
            if other.stack.len() != frame.stack.len() {
                return Err(DecompileError::UnexpectedValue {
                    expected: "equal stack depth at merge",
                    found: format!("{} and {} at offset {}", frame.stack.len(), other.stack.len(), node.offset),
                });
            }
        }
        for position in 0..frame.stack.len() {
            if rest.iter().all(|o| o.stack[position] == frame.stack[position]) {
                continue;
            }
            let ty = frame.stack[position].java_type(self.symbols);
            let id = self.slots.len();
            self.slots.push(MergeSlot {
                id,
                node: index,
                position,
            });
            frame.stack[position] = JavaValue::Slot { id, ty };
        }
        Ok(frame)
    }

    /// Two paths that each introduced a variable of the same type in the same
    /// slot hold one source variable.
    fn merge_locals(&mut self, into: &mut LocalFrame, other: &LocalFrame) {
        for (slot, var) in other.iter() {
            let Some(current) = into.get(slot) else {
                into.set(slot, var);
                continue;
            };
            let a = self.alias_of(current);
            let b = self.alias_of(var);
            if a == b {
                continue;
            }
            let both_local = self.symbols.vars.get(a).kind == VarKind::Local
                && self.symbols.vars.get(b).kind == VarKind::Local;
            if both_local && self.symbols.var_type(a) == self.symbols.var_type(b) {
                let (ta, tb) = (self.symbols.vars.get(a).ty, self.symbols.vars.get(b).ty);
                self.symbols.types.unify(tb, ta);
                self.aliases.insert(b, a);
            }
        }
    }

    fn alias_of(&self, mut var: VarId) -> VarId {
        while let Some(&next) = self.aliases.get(&var) {
            var = next;
        }
        var
    }

    fn catch_type(&mut self, index: u16) -> DecompileResult<JavaType> {
        if let Some(ty) = self.catch_types.get(&index) {
            return Ok(ty.clone());
        }
        let ty = if index == 0 {
            JavaType::class(THROWABLE)
        } else {
            class_constant_type(&expect_class(self.resolver.resolve(index), index)?)?
        };
        self.catch_types.insert(index, ty.clone());
        Ok(ty)
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    fn step(&mut self, instr: &Instruction, frame: &mut Frame) -> DecompileResult<Option<Statement>> {
        let offset = instr.offset;
        let opcode = instr.info.opcode;
        match opcode {
            NOP => {}

            // ============================================================
            // Constants
            // ============================================================
            ACONST_NULL => frame.stack.push(JavaValue::null(&mut self.symbols.types)),
            ICONST_M1..=ICONST_5 => {
                let v = opcode as i32 - ICONST_0 as i32;
                frame.stack.push(JavaValue::int(&mut self.symbols.types, v));
            }
            LCONST_0 | LCONST_1 => {
                let v = Literal::Long((opcode - LCONST_0) as i64);
                frame.stack.push(self.literal(v, Primitive::Long));
            }
            FCONST_0..=FCONST_2 => {
                let v = Literal::Float((opcode - FCONST_0) as f32);
                frame.stack.push(self.literal(v, Primitive::Float));
            }
            DCONST_0 | DCONST_1 => {
                let v = Literal::Double((opcode - DCONST_0) as f64);
                frame.stack.push(self.literal(v, Primitive::Double));
            }
            BIPUSH | SIPUSH => frame.stack.push(JavaValue::int(&mut self.symbols.types, instr.immediate())),
            LDC => frame.stack.push(self.load_constant(instr.u8_operand() as u16)?),
            LDC_W | LDC2_W => frame.stack.push(self.load_constant(instr.u16_operand())?),

            // ============================================================
            // Loads and stores
            // ============================================================
            ILOAD..=ALOAD => self.load(frame, instr.local_index(), opcode - ILOAD),
            ILOAD_0..=ALOAD_3 => {
                let n = opcode - ILOAD_0;
                self.load(frame, (n % 4) as u16, n / 4);
            }
            ISTORE..=ASTORE => return self.store(frame, instr.local_index(), offset).map(Some),
            ISTORE_0..=ASTORE_3 => {
                let n = opcode - ISTORE_0;
                return self.store(frame, (n % 4) as u16, offset).map(Some);
            }
            IINC => {
                let slot = instr.local_index();
                let var = match frame.locals.get(slot) {
                    Some(var) => var,
                    None => self.fresh_local(frame, slot, JavaType::int()),
                };
                self.save_reads(frame, var);
                return Ok(Some(Statement::Increment {
                    var,
                    delta: instr.iinc_delta(),
                }));
            }

            // ============================================================
            // Arrays
            // ============================================================
            IALOAD..=SALOAD => {
                let index = pop(frame, offset)?;
                let array = pop(frame, offset)?;
                frame.stack.push(JavaValue::ArrayMember {
                    array: Box::new(array),
                    index: Box::new(index),
                });
            }
            IASTORE..=SASTORE => {
                let value = pop(frame, offset)?;
                let index = pop(frame, offset)?;
                let array = pop(frame, offset)?;
                if let Some(element) = array.java_type(self.symbols).element_type().cloned() {
                    self.refine(&value, &element);
                }
                return Ok(Some(Statement::Assign {
                    left: JavaValue::ArrayMember {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    value,
                    declares: false,
                }));
            }
            NEWARRAY => {
                let count = pop(frame, offset)?;
                let code = instr.u8_operand();
                let element = newarray_type(code).ok_or_else(|| DecompileError::UnexpectedValue {
                    expected: "newarray element code",
                    found: code.to_string(),
                })?;
                frame.stack.push(JavaValue::NewArray {
                    ty: JavaType::array_of(element),
                    dims: vec![count],
                });
            }
            ANEWARRAY => {
                let count = pop(frame, offset)?;
                let index = instr.u16_operand();
                let element = class_constant_type(&expect_class(self.resolver.resolve(index), index)?)?;
                frame.stack.push(JavaValue::NewArray {
                    ty: JavaType::array_of(element),
                    dims: vec![count],
                });
            }
            MULTIANEWARRAY => {
                let index = instr.u16_operand();
                let ty = class_constant_type(&expect_class(self.resolver.resolve(index), index)?)?;
                let count = instr.operands.get(2).copied().unwrap_or(1) as usize;
                let mut dims = Vec::with_capacity(count);
                for _ in 0..count {
                    dims.push(pop(frame, offset)?);
                }
                dims.reverse();
                frame.stack.push(JavaValue::NewArray { ty, dims });
            }
            ARRAYLENGTH => {
                let array = pop(frame, offset)?;
                frame.stack.push(JavaValue::ArrayLength(Box::new(array)));
            }

            // ============================================================
            // Stack manipulation
            // ============================================================
            POP => {
                let v = pop(frame, offset)?;
                if v.has_side_effects() {
                    return Ok(Some(Statement::Expression(v)));
                }
            }
            POP2 => {
                let v1 = pop(frame, offset)?;
                let v2 = if v1.is_wide(self.symbols) {
                    None
                } else {
                    Some(pop(frame, offset)?)
                };
                let effects: Vec<JavaValue> = v2
                    .into_iter()
                    .chain(std::iter::once(v1))
                    .filter(JavaValue::has_side_effects)
                    .collect();
                match effects.len() {
                    0 => {}
                    1 => return Ok(effects.into_iter().next().map(Statement::Expression)),
                    _ => {
                        return Err(DecompileError::NotSupported {
                            instruction: "pop2",
                            offset,
                        })
                    }
                }
            }
            DUP => {
                self.settle_copies(frame, 1);
                let v = frame.stack.last().cloned().ok_or(DecompileError::StackUnderflow { offset })?;
                frame.stack.push(v);
            }
            DUP_X1 => {
                self.settle_copies(frame, 1);
                let v1 = pop(frame, offset)?;
                let v2 = pop(frame, offset)?;
                frame.stack.extend([v1.clone(), v2, v1]);
            }
            DUP_X2 => {
                self.settle_copies(frame, 1);
                let v1 = pop(frame, offset)?;
                let v2 = pop(frame, offset)?;
                if v2.is_wide(self.symbols) {
                    frame.stack.extend([v1.clone(), v2, v1]);
                } else {
                    let v3 = pop(frame, offset)?;
                    frame.stack.extend([v1.clone(), v3, v2, v1]);
                }
            }
            DUP2 => {
                let copied = self.category_two_copies(frame);
                self.settle_copies(frame, copied);
                let v1 = pop(frame, offset)?;
                if v1.is_wide(self.symbols) {
                    frame.stack.extend([v1.clone(), v1]);
                } else {
                    let v2 = pop(frame, offset)?;
                    frame.stack.extend([v2.clone(), v1.clone(), v2, v1]);
                }
            }
            DUP2_X1 => {
                let copied = self.category_two_copies(frame);
                self.settle_copies(frame, copied);
                let v1 = pop(frame, offset)?;
                let v2 = pop(frame, offset)?;
                if v1.is_wide(self.symbols) {
                    frame.stack.extend([v1.clone(), v2, v1]);
                } else {
                    let v3 = pop(frame, offset)?;
                    frame.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
                }
            }
            DUP2_X2 => {
                let copied = self.category_two_copies(frame);
                self.settle_copies(frame, copied);
                let v1 = pop(frame, offset)?;
                let v2 = pop(frame, offset)?;
                match (v1.is_wide(self.symbols), v2.is_wide(self.symbols)) {
                    (true, true) => frame.stack.extend([v1.clone(), v2, v1]),
                    (true, false) => {
                        let v3 = pop(frame, offset)?;
                        frame.stack.extend([v1.clone(), v3, v2, v1]);
                    }
                    _ => {
                        let v3 = pop(frame, offset)?;
                        if v3.is_wide(self.symbols) {
                            frame.stack.extend([v2.clone(), v1.clone(), v3, v2, v1]);
                        } else {
                            let v4 = pop(frame, offset)?;
                            frame.stack.extend([v2.clone(), v1.clone(), v4, v3, v2, v1]);
                        }
                    }
                }
            }
            SWAP => {
                let v1 = pop(frame, offset)?;
                let v2 = pop(frame, offset)?;
                frame.stack.extend([v1, v2]);
            }

            // ============================================================
            // Arithmetic and conversions
            // ============================================================
            IADD..=DREM => {
                let op = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div, BinOp::Rem][((opcode - IADD) / 4) as usize];
                self.binary(frame, op, offset)?;
            }
            INEG..=DNEG => {
                let v = pop(frame, offset)?;
                frame.stack.push(JavaValue::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(v),
                });
            }
            ISHL..=LUSHR => {
                let op = [BinOp::Shl, BinOp::Shr, BinOp::Ushr][((opcode - ISHL) / 2) as usize];
                self.binary(frame, op, offset)?;
            }
            IAND | LAND => self.binary(frame, BinOp::And, offset)?,
            IOR | LOR => self.binary(frame, BinOp::Or, offset)?,
            IXOR | LXOR => self.binary(frame, BinOp::Xor, offset)?,
            I2L..=I2S => {
                let v = pop(frame, offset)?;
                frame.stack.push(JavaValue::Cast {
                    ty: JavaType::Primitive(conversion_target(opcode)),
                    value: Box::new(v),
                });
            }

            // ============================================================
            // Comparisons and branches
            // ============================================================
            LCMP..=DCMPG => {
                let kind = match opcode {
                    LCMP => CmpKind::LCmp,
                    FCMPL => CmpKind::FCmpL,
                    FCMPG => CmpKind::FCmpG,
                    DCMPL => CmpKind::DCmpL,
                    _ => CmpKind::DCmpG,
                };
                let rhs = pop(frame, offset)?;
                let lhs = pop(frame, offset)?;
                frame.stack.push(JavaValue::RawCompare {
                    kind,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                });
            }
            IFEQ..=IFLE => {
                let op = compare_op(opcode - IFEQ);
                let v = pop(frame, offset)?;
                let condition = match v {
                    JavaValue::RawCompare { lhs, rhs, .. } => JavaValue::Compare { op, lhs, rhs },
                    v if matches!(op, CompareOp::Eq | CompareOp::Ne) && v.java_type(self.symbols).is_boolean() => {
                        if op == CompareOp::Eq {
                            v.negate()
                        } else {
                            v
                        }
                    }
                    v => JavaValue::compare(op, v, JavaValue::int(&mut self.symbols.types, 0)),
                };
                return Ok(Some(Statement::condition(condition)));
            }
            IF_ICMPEQ..=IF_ACMPNE => {
                let op = if opcode >= IF_ACMPEQ {
                    compare_op(opcode - IF_ACMPEQ)
                } else {
                    compare_op(opcode - IF_ICMPEQ)
                };
                let rhs = pop(frame, offset)?;
                let lhs = pop(frame, offset)?;
                let (lt, rt) = (lhs.java_type(self.symbols), rhs.java_type(self.symbols));
                if lt.is_boolean() {
                    self.refine(&rhs, &lt);
                } else if rt.is_boolean() {
                    self.refine(&lhs, &rt);
                }
                return Ok(Some(Statement::condition(JavaValue::compare(op, lhs, rhs))));
            }
            IFNULL | IFNONNULL => {
                let op = if opcode == IFNULL { CompareOp::Eq } else { CompareOp::Ne };
                let v = pop(frame, offset)?;
                let null = JavaValue::null(&mut self.symbols.types);
                return Ok(Some(Statement::condition(JavaValue::compare(op, v, null))));
            }
            GOTO | GOTO_W => return Ok(Some(Statement::Goto)),
            TABLESWITCH | LOOKUPSWITCH => {
                let v = pop(frame, offset)?;
                return Ok(Some(Statement::Middle(Marker::Switch(v))));
            }
            IRETURN..=ARETURN => {
                let v = pop(frame, offset)?;
                let ret = self.context.descriptor.ret.clone();
                self.refine(&v, &ret);
                return Ok(Some(Statement::Return(Some(v))));
            }
            RETURN => return Ok(Some(Statement::Return(None))),
            ATHROW => {
                let v = pop(frame, offset)?;
                return Ok(Some(Statement::Throw(v)));
            }

            // ============================================================
            // Fields and invocations
            // ============================================================
            GETSTATIC..=PUTFIELD => return self.field(opcode, instr, frame),
            INVOKEVIRTUAL..=INVOKEINTERFACE => return self.invoke(opcode, instr, frame),
            INVOKEDYNAMIC => return self.invoke_dynamic(instr, frame),

            // ============================================================
            // Objects and monitors
            // ============================================================
            NEW => {
                let index = instr.u16_operand();
                let class = expect_class(self.resolver.resolve(index), index)?;
                frame.stack.push(JavaValue::UninitNew {
                    class,
                    site: offset as usize,
                });
            }
            CHECKCAST => {
                let index = instr.u16_operand();
                let ty = class_constant_type(&expect_class(self.resolver.resolve(index), index)?)?;
                let v = pop(frame, offset)?;
                frame.stack.push(JavaValue::Cast { ty, value: Box::new(v) });
            }
            INSTANCEOF => {
                let index = instr.u16_operand();
                let ty = class_constant_type(&expect_class(self.resolver.resolve(index), index)?)?;
                let v = pop(frame, offset)?;
                frame.stack.push(JavaValue::InstanceOf { value: Box::new(v), ty });
            }
            MONITORENTER => {
                let v = pop(frame, offset)?;
                return Ok(Some(Statement::Middle(Marker::MonitorEnter(v))));
            }
            MONITOREXIT => {
                let v = pop(frame, offset)?;
                return Ok(Some(Statement::Middle(Marker::MonitorExit(v))));
            }

            _ => {
                return Err(DecompileError::NotSupported {
                    instruction: instr.info.name,
                    offset,
                })
            }
        }
        Ok(None)
    }

    fn literal(&mut self, value: Literal, ty: Primitive) -> JavaValue {
        JavaValue::Literal {
            value,
            ty: self.symbols.types.alloc(JavaType::Primitive(ty)),
        }
    }

    fn load_constant(&mut self, index: u16) -> DecompileResult<JavaValue> {
        let literal = self
            .resolver
            .resolve_literal(index)
            .ok_or(DecompileError::UnresolvedConstant { index })?;
        self.pool_literal(literal)
    }

    fn pool_literal(&mut self, literal: PoolLiteral) -> DecompileResult<JavaValue> {
        let (value, ty) = match literal {
            PoolLiteral::Int(v) => (Literal::Int(v), JavaType::int()),
            PoolLiteral::Long(v) => (Literal::Long(v), JavaType::Primitive(Primitive::Long)),
            PoolLiteral::Float(v) => (Literal::Float(v), JavaType::Primitive(Primitive::Float)),
            PoolLiteral::Double(v) => (Literal::Double(v), JavaType::Primitive(Primitive::Double)),
            PoolLiteral::String(s) => (Literal::String(s), JavaType::string()),
            PoolLiteral::Class(name) => (
                Literal::Class(class_constant_type(&name)?),
                JavaType::class("java/lang/Class"),
            ),
        };
        Ok(JavaValue::Literal {
            value,
            ty: self.symbols.types.alloc(ty),
        })
    }

    /// `kind` indexes int, long, float, double, reference.
    fn load(&mut self, frame: &mut Frame, slot: u16, kind: u8) {
        let var = match frame.locals.get(slot) {
            Some(var) => var,
            None => self.fresh_local(frame, slot, local_type(kind)),
        };
        frame.stack.push(JavaValue::Ref(var));
    }

    fn fresh_local(&mut self, frame: &mut Frame, slot: u16, ty: JavaType) -> VarId {
        let ty = self.symbols.types.alloc(ty);
        let var = self.symbols.vars.mint(slot, None, ty, VarKind::Local);
        frame.locals.set(slot, var);
        var
    }

    fn store(&mut self, frame: &mut Frame, slot: u16, offset: u32) -> DecompileResult<Statement> {
        let value = pop(frame, offset)?;
        let previous = frame.locals.get(slot);
        let (var, minted) = self.symbols.assign_var(&mut frame.locals, slot, &value);
        if previous == Some(var) {
            self.save_reads(frame, var);
        }
        let var_ty = self.symbols.var_type(var).clone();
        self.refine(&value, &var_ty);
        Ok(Statement::Assign {
            left: JavaValue::Ref(var),
            value,
            declares: minted,
        })
    }

    fn binary(&mut self, frame: &mut Frame, op: BinOp, offset: u32) -> DecompileResult<()> {
        let rhs = pop(frame, offset)?;
        let lhs = pop(frame, offset)?;
        frame.stack.push(JavaValue::binary(op, lhs, rhs));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stack temporaries
    // ------------------------------------------------------------------

    /// Assign `value` to a fresh stack temporary emitted before the current
    /// statement and return a reference to it.
    fn spill(&mut self, value: JavaValue) -> JavaValue {
        let ty = value.java_type(self.symbols);
        let ty = self.symbols.types.alloc(ty);
        let var = self.symbols.vars.mint(u16::MAX, None, ty, VarKind::Stack);
        self.spilled.push(Statement::Assign {
            left: JavaValue::Ref(var),
            value,
            declares: true,
        });
        JavaValue::Ref(var)
    }

    /// Values copied by the `dup` family are evaluated once. When one of the
    /// top `copied` entries is a computed value, it moves into a temporary,
    /// and so does every side effect beneath it, bottom first.
    fn settle_copies(&mut self, frame: &mut Frame, copied: usize) {
        let start = frame.stack.len().saturating_sub(copied);
        if frame.stack[start..].iter().all(is_shareable) {
            return;
        }
        for position in 0..frame.stack.len() {
            let value = &frame.stack[position];
            if is_shareable(value) || (position < start && !value.has_side_effects()) {
                continue;
            }
            let value = std::mem::replace(&mut frame.stack[position], JavaValue::custom(""));
            frame.stack[position] = self.spill(value);
        }
    }

    /// Stack entries copied by `dup2` and its variants: one long or double,
    /// otherwise two single-slot values.
    fn category_two_copies(&self, frame: &Frame) -> usize {
        match frame.stack.last() {
            Some(top) if top.is_wide(self.symbols) => 1,
            _ => 2,
        }
    }

    /// Stack entries that read `var` keep the value from before a write.
    fn save_reads(&mut self, frame: &mut Frame, var: VarId) {
        for position in 0..frame.stack.len() {
            let mut vars = Vec::new();
            frame.stack[position].collect_vars(&mut vars);
            if !vars.contains(&var) {
                continue;
            }
            let value = std::mem::replace(&mut frame.stack[position], JavaValue::custom(""));
            frame.stack[position] = self.spill(value);
        }
    }

    /// Slots are typed once filled; refinements of a slot wait until then.
    fn refine(&mut self, value: &JavaValue, expected: &JavaType) {
        if let JavaValue::Slot { id, .. } = value {
            self.slot_refinements.push((*id, expected.clone()));
        } else {
            self.symbols.refine(value, expected);
        }
    }

    fn pop_args(&mut self, frame: &mut Frame, params: &[JavaType], offset: u32) -> DecompileResult<Vec<JavaValue>> {
        let mut args = Vec::with_capacity(params.len());
        for _ in params {
            args.push(pop(frame, offset)?);
        }
        args.reverse();
        for (arg, ty) in args.iter().zip(params) {
            self.refine(arg, ty);
        }
        Ok(args)
    }

    fn field(&mut self, opcode: u8, instr: &Instruction, frame: &mut Frame) -> DecompileResult<Option<Statement>> {
        let offset = instr.offset;
        let index = instr.u16_operand();
        let (owner, name, descriptor) = expect_field(self.resolver.resolve(index), index)?;
        let ty = parse_field_descriptor(&descriptor)?;
        let field = |object: Option<JavaValue>, ty: JavaType| JavaValue::Field {
            owner,
            name,
            ty,
            object: object.map(Box::new),
        };
        match opcode {
            GETSTATIC => frame.stack.push(field(None, ty)),
            GETFIELD => {
                let object = pop(frame, offset)?;
                frame.stack.push(field(Some(object), ty));
            }
            _ => {
                let value = pop(frame, offset)?;
                let object = if opcode == PUTFIELD {
                    Some(pop(frame, offset)?)
                } else {
                    None
                };
                self.refine(&value, &ty);
                return Ok(Some(Statement::Assign {
                    left: field(object, ty),
                    value,
                    declares: false,
                }));
            }
        }
        Ok(None)
    }

    fn invoke(&mut self, opcode: u8, instr: &Instruction, frame: &mut Frame) -> DecompileResult<Option<Statement>> {
        let offset = instr.offset;
        let index = instr.u16_operand();
        let (owner, name, descriptor) = expect_method(self.resolver.resolve(index), index)?;
        let descriptor = parse_method_descriptor(&descriptor)?;
        let args = self.pop_args(frame, &descriptor.params, offset)?;
        let kind = match opcode {
            INVOKEVIRTUAL => InvokeKind::Virtual,
            INVOKESPECIAL => InvokeKind::Special,
            INVOKESTATIC => InvokeKind::Static,
            _ => InvokeKind::Interface,
        };
        let receiver = if kind == InvokeKind::Static {
            None
        } else {
            Some(pop(frame, offset)?)
        };

        if name == "<init>" {
            if let Some(JavaValue::UninitNew { class, site }) = &receiver {
                let pending = JavaValue::UninitNew {
                    class: class.clone(),
                    site: *site,
                };
                let created = JavaValue::New {
                    class: class.clone(),
                    descriptor,
                    args,
                };
                let mut replaced = false;
                for value in frame.stack.iter_mut() {
                    if *value == pending {
                        *value = created.clone();
                        replaced = true;
                    }
                }
                return Ok(if replaced {
                    None
                } else {
                    Some(Statement::Expression(created))
                });
            }
        }

        let returns = !descriptor.ret.is_void();
        let call = JavaValue::Call(FunctionCall {
            kind,
            owner,
            name,
            descriptor,
            receiver: receiver.map(Box::new),
            args,
        });
        if returns {
            frame.stack.push(call);
            Ok(None)
        } else {
            Ok(Some(Statement::Expression(call)))
        }
    }

    fn invoke_dynamic(&mut self, instr: &Instruction, frame: &mut Frame) -> DecompileResult<Option<Statement>> {
        let index = instr.u16_operand();
        let site = self
            .resolver
            .resolve_dynamic(index)
            .ok_or(DecompileError::UnresolvedConstant { index })?;
        let descriptor = parse_method_descriptor(&site.descriptor)?;
        let args = self.pop_args(frame, &descriptor.params, instr.offset)?;
        let value = match (site.bootstrap_owner.as_str(), site.bootstrap_name.as_str()) {
            (STRING_CONCAT_FACTORY, "makeConcatWithConstants") => self.concat_with_constants(&site, args)?,
            (STRING_CONCAT_FACTORY, "makeConcat") => self.concat(args),
            (LAMBDA_METAFACTORY, "metafactory" | "altMetafactory") => self.lambda(&site, &descriptor, args)?,
            (owner, name) => {
                log::warn!("unrecognized bootstrap method {}.{}; emitting a placeholder", owner, name);
                JavaValue::Custom {
                    text: format!("{}#{}", name, site.name),
                    ty: Some(descriptor.ret.clone()),
                }
            }
        };
        if descriptor.ret.is_void() {
            Ok(Some(Statement::Expression(value)))
        } else {
            frame.stack.push(value);
            Ok(None)
        }
    }

    /// `\u{1}` takes the next argument, `\u{2}` the next bootstrap constant.
    fn concat_with_constants(&mut self, site: &BootstrapInfo, args: Vec<JavaValue>) -> DecompileResult<JavaValue> {
        let recipe = match site.arguments.first() {
            Some(BootstrapArgument::Literal(PoolLiteral::String(recipe))) => recipe.clone(),
            other => {
                return Err(DecompileError::UnexpectedValue {
                    expected: "string concatenation recipe",
                    found: format!("{:?}", other),
                })
            }
        };
        let mut constants = site.arguments.iter().skip(1);
        let mut args = args.into_iter();
        let mut pieces = Vec::new();
        let mut text = String::new();
        for ch in recipe.chars() {
            if ch != '\u{1}' && ch != '\u{2}' {
                text.push(ch);
                continue;
            }
            if !text.is_empty() {
                pieces.push(JavaValue::string(&mut self.symbols.types, &text));
                text.clear();
            }
            let piece = if ch == '\u{1}' {
                args.next().ok_or_else(|| DecompileError::UnexpectedValue {
                    expected: "concatenation argument",
                    found: format!("{:?}", recipe),
                })?
            } else {
                match constants.next() {
                    Some(BootstrapArgument::Literal(literal)) => self.pool_literal(literal.clone())?,
                    other => {
                        return Err(DecompileError::UnexpectedValue {
                            expected: "concatenation constant",
                            found: format!("{:?}", other),
                        })
                    }
                }
            };
            pieces.push(piece);
        }
        if !text.is_empty() {
            pieces.push(JavaValue::string(&mut self.symbols.types, &text));
        }
        Ok(self.concat(pieces))
    }

    /// Left-nested `+` chain; a leading `""` is added when neither of the
    /// first two operands is a string.
    fn concat(&mut self, mut pieces: Vec<JavaValue>) -> JavaValue {
        let string = JavaType::string();
        if !pieces.iter().take(2).any(|p| p.java_type(self.symbols) == string) {
            pieces.insert(0, JavaValue::string(&mut self.symbols.types, ""));
        }
        let mut pieces = pieces.into_iter();
        let first = pieces.next().unwrap_or_else(|| JavaValue::custom("\"\""));
        pieces.fold(first, |acc, piece| JavaValue::binary(BinOp::Add, acc, piece))
    }

    fn lambda(
        &mut self,
        site: &BootstrapInfo,
        descriptor: &MethodDescriptor,
        captured: Vec<JavaValue>,
    ) -> DecompileResult<JavaValue> {
        let handle = site
            .arguments
            .iter()
            .find_map(|a| match a {
                BootstrapArgument::MethodHandle(h) => Some(h),
                _ => None,
            })
            .ok_or_else(|| DecompileError::UnexpectedValue {
                expected: "lambda implementation handle",
                found: format!("{:?}", site.arguments),
            })?;
        let ty = descriptor.ret.clone();

        if let Some(inliner) = self.inliner {
            if self.context.is_own_class(&handle.owner) {
                if let Some(source) = self.resolver.method_code(&handle.owner, &handle.name, &handle.descriptor) {
                    match inliner.inline_lambda(&source, captured.clone(), self.symbols) {
                        Ok((params, body)) => {
                            return Ok(JavaValue::Lambda {
                                lambda: Box::new(Lambda::Inline { params, body }),
                                ty,
                            })
                        }
                        Err(err) => log::warn!(
                            "lambda body {} kept as a method reference: {}",
                            handle.name,
                            err
                        ),
                    }
                }
            }
        }

        let bound = matches!(
            handle.kind,
            HandleKind::InvokeVirtual | HandleKind::InvokeInterface | HandleKind::InvokeSpecial
        );
        let receiver = if bound {
            captured.into_iter().next().map(Box::new)
        } else {
            None
        };
        let name = if handle.kind == HandleKind::NewInvokeSpecial {
            "new".to_string()
        } else {
            handle.name.clone()
        };
        Ok(JavaValue::Lambda {
            lambda: Box::new(Lambda::MethodRef {
                owner: handle.owner.clone(),
                name,
                receiver,
            }),
            ty,
        })
    }

    // ------------------------------------------------------------------
    // Merge slots
    // ------------------------------------------------------------------

    fn fill_slots(&mut self, doms: &Dominators) -> DecompileResult<()> {
        let mut filled: BTreeMap<usize, JavaValue> = BTreeMap::new();
        for slot in std::mem::take(&mut self.slots) {
            let merge_id = self.graph.nodes[slot.node].id;
            let cond = doms.idom(slot.node).ok_or(DecompileError::InvalidShape {
                node: merge_id,
                reason: "ternary",
            })?;
            let mut value = self.ternary_at(cond, slot.node, slot.position)?;
            substitute_slots(&mut value, &filled);
            filled.insert(slot.id, value);
        }
        if filled.is_empty() {
            return Ok(());
        }
        for (id, expected) in std::mem::take(&mut self.slot_refinements) {
            if let Some(value) = filled.get(&id) {
                self.symbols.refine(value, &expected);
            }
        }
        let spilled = self.preceding.values_mut().flatten();
        for statement in self.statements.values_mut().chain(spilled) {
            statement.rewrite_values(&mut |v| substitute_slots(v, &filled));
        }
        Ok(())
    }

    fn ternary_at(&mut self, cond: usize, merge: usize, position: usize) -> DecompileResult<JavaValue> {
        let graph = self.graph;
        let node = &graph.nodes[cond];
        let condition = match self.statements.get_mut(&cond) {
            Some(Statement::Condition { value, ternary }) if node.next.len() == 2 => {
                *ternary = true;
                value.clone()
            }
            _ => {
                return Err(DecompileError::InvalidShape {
                    node: node.id,
                    reason: "ternary",
                })
            }
        };
        let if_true = self.value_along(cond, node.next[0], merge, position)?;
        let if_false = self.value_along(cond, node.next[1], merge, position)?;
        Ok(JavaValue::Ternary {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    /// Value at `position` when control reaches `merge` through `cur`.
    fn value_along(&mut self, mut prev: usize, mut cur: usize, merge: usize, position: usize) -> DecompileResult<JavaValue> {
        let graph = self.graph;
        for _ in 0..graph.nodes.len() {
            if cur == merge {
                return self
                    .out_frames
                    .get(&prev)
                    .and_then(|f| f.stack.get(position))
                    .cloned()
                    .ok_or(DecompileError::InvalidShape {
                        node: graph.nodes[merge].id,
                        reason: "ternary",
                    });
            }
            let node = &graph.nodes[cur];
            if node.next.len() == 2 && matches!(self.statements.get(&cur), Some(Statement::Condition { .. })) {
                return self.ternary_at(cur, merge, position);
            }
            match node.next.as_slice() {
                [next] => {
                    prev = cur;
                    cur = *next;
                }
                _ => break,
            }
        }
        Err(DecompileError::InvalidShape {
            node: graph.nodes[cur].id,
            reason: "ternary",
        })
    }

    fn apply_aliases(&mut self) {
        if self.aliases.is_empty() {
            return;
        }
        let aliases = &self.aliases;
        let resolve = |mut var: VarId| {
            while let Some(&next) = aliases.get(&var) {
                var = next;
            }
            var
        };
        let spilled = self.preceding.values_mut().flatten();
        for statement in self.statements.values_mut().chain(spilled) {
            statement.rewrite_values(&mut |v| {
                if let JavaValue::Ref(var) = v {
                    *var = resolve(*var);
                }
            });
            if let Statement::Increment { var, .. } = statement {
                *var = resolve(*var);
            }
        }
    }
}

/// Copies of these values read the same thing as the original.
fn is_shareable(value: &JavaValue) -> bool {
    matches!(
        value,
        JavaValue::Ref(_) | JavaValue::Literal { .. } | JavaValue::UninitNew { .. } | JavaValue::CaughtException(_)
    )
}

fn pop(frame: &mut Frame, offset: u32) -> DecompileResult<JavaValue> {
    frame.stack.pop().ok_or(DecompileError::StackUnderflow { offset })
}

fn substitute_slots(value: &mut JavaValue, filled: &BTreeMap<usize, JavaValue>) {
    value.rewrite(&mut |v| {
        if let JavaValue::Slot { id, .. } = v {
            if let Some(replacement) = filled.get(id) {
                *v = replacement.clone();
            }
        }
    });
}

fn local_type(kind: u8) -> JavaType {
    match kind {
        0 => JavaType::int(),
        1 => JavaType::Primitive(Primitive::Long),
        2 => JavaType::Primitive(Primitive::Float),
        3 => JavaType::Primitive(Primitive::Double),
        _ => JavaType::object(),
    }
}

/// Operator of `ifeq`-ordered comparison opcodes.
fn compare_op(index: u8) -> CompareOp {
    match index {
        0 => CompareOp::Eq,
        1 => CompareOp::Ne,
        2 => CompareOp::Lt,
        3 => CompareOp::Ge,
        4 => CompareOp::Gt,
        _ => CompareOp::Le,
    }
}

fn conversion_target(opcode: u8) -> Primitive {
    match opcode {
        I2L | F2L | D2L => Primitive::Long,
        I2F | L2F | D2F => Primitive::Float,
        I2D | L2D | F2D => Primitive::Double,
        I2B => Primitive::Byte,
        I2C => Primitive::Char,
        I2S => Primitive::Short,
        _ => Primitive::Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::decoder::decode;
    use crate::decompile::resolver::{PoolEntry, TableResolver};

    fn simulate(code: &[u8], descriptor: &str, resolver: &TableResolver) -> (OpcodeGraph, SimulatedMethod, Symbols) {
        let graph = OpcodeGraph::build(decode(code).unwrap(), &[]).unwrap();
        let context = FunctionContext::new("demo/Sample", "run", descriptor, true).unwrap();
        let mut symbols = Symbols::new();
        let sim = StackSimulator::new(&graph, resolver, &context, &mut symbols).run().unwrap();
        (graph, sim, symbols)
    }

    fn statement_at<'s>(graph: &OpcodeGraph, sim: &'s SimulatedMethod, offset: u32) -> &'s Statement {
        &sim.statements[&graph.offsets[&offset]]
    }

    #[test]
    fn test_store_then_return() {
        // iconst_1; istore_1; iload_1; ireturn
        let (graph, sim, symbols) = simulate(&[0x04, 0x3c, 0x1b, 0xac], "()I", &TableResolver::new());
        let Statement::Assign { left: JavaValue::Ref(var), declares, .. } = statement_at(&graph, &sim, 1) else {
            panic!("expected assignment");
        };
        assert!(*declares);
        assert_eq!(symbols.var_type(*var), &JavaType::int());
        assert_eq!(statement_at(&graph, &sim, 3), &Statement::Return(Some(JavaValue::Ref(*var))));
        assert_eq!(sim.statements.len(), 2);
    }

    #[test]
    fn test_slot_reuse_with_new_type_mints_generation() {
        // iconst_0; istore_1; ldc #2; astore_1; return
        let resolver = TableResolver::new().with_literal(2, PoolLiteral::String("s".into()));
        let (graph, sim, symbols) = simulate(&[0x03, 0x3c, 0x12, 0x02, 0x4c, 0xb1], "()V", &resolver);
        let var_at = |offset| match statement_at(&graph, &sim, offset) {
            Statement::Assign { left: JavaValue::Ref(var), .. } => *var,
            other => panic!("unexpected {:?}", other),
        };
        let (first, second) = (var_at(1), var_at(4));
        assert_ne!(first, second);
        assert!(symbols.vars.shares_lineage(first, second));
    }

    #[test]
    fn test_boolean_return_becomes_ternary() {
        // 0: iload_0; 1: ifeq -> 8; 4: iconst_1; 5: goto -> 9; 8: iconst_0; 9: ireturn
        let code = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];
        let (graph, sim, symbols) = simulate(&code, "(Z)Z", &TableResolver::new());
        assert!(matches!(
            statement_at(&graph, &sim, 1),
            Statement::Condition { ternary: true, .. }
        ));
        let Statement::Return(Some(JavaValue::Ternary { if_true, if_false, .. })) = statement_at(&graph, &sim, 9) else {
            panic!("expected ternary return");
        };
        assert!(if_true.is_literal_int(0));
        assert!(if_false.is_literal_int(1));
        assert_eq!(if_true.java_type(&symbols), JavaType::boolean());
    }

    #[test]
    fn test_constructor_call_replaces_pending_object() {
        // new #1; dup; invokespecial #2; areturn
        let resolver = TableResolver::new()
            .with_entry(1, PoolEntry::Class("java/lang/StringBuilder".into()))
            .with_entry(
                2,
                PoolEntry::Method {
                    owner: "java/lang/StringBuilder".into(),
                    name: "<init>".into(),
                    descriptor: "()V".into(),
                },
            );
        let code = [0xbb, 0x00, 0x01, 0x59, 0xb7, 0x00, 0x02, 0xb0];
        let (graph, sim, _) = simulate(&code, "()Ljava/lang/Object;", &resolver);
        assert_eq!(sim.statements.len(), 1);
        assert!(matches!(
            statement_at(&graph, &sim, 7),
            Statement::Return(Some(JavaValue::New { class, .. })) if class == "java/lang/StringBuilder"
        ));
    }

    #[test]
    fn test_dup2_x1_ordering() {
        // iconst_1; iconst_2; iconst_3; dup2_x1; pop; pop; pop; pop; ireturn
        let code = [0x04, 0x05, 0x06, 0x5d, 0x57, 0x57, 0x57, 0x57, 0xac];
        let (graph, sim, _) = simulate(&code, "()I", &TableResolver::new());
        // Stack after dup2_x1 is 2,3,1,2,3; four pops leave 2.
        let Statement::Return(Some(value)) = statement_at(&graph, &sim, 8) else {
            panic!("expected return");
        };
        assert!(value.is_literal_int(2));
    }

    #[test]
    fn test_duplicated_array_is_held_in_a_temporary() {
        // iconst_1; newarray int; dup; iconst_0; bipush 7; iastore; areturn
        let code = [0x04, 0xbc, 0x0a, 0x59, 0x03, 0x10, 0x07, 0x4f, 0xb0];
        let (graph, sim, symbols) = simulate(&code, "()[I", &TableResolver::new());
        let Statement::Assign {
            left: JavaValue::Ref(tmp),
            value: JavaValue::NewArray { .. },
            declares: true,
        } = &sim.preceding[&graph.offsets[&3]][0]
        else {
            panic!("expected a temporary for the array");
        };
        assert_eq!(symbols.vars.get(*tmp).kind, VarKind::Stack);
        assert!(matches!(
            statement_at(&graph, &sim, 7),
            Statement::Assign { left: JavaValue::ArrayMember { array, .. }, .. } if **array == JavaValue::Ref(*tmp)
        ));
        assert_eq!(statement_at(&graph, &sim, 8), &Statement::Return(Some(JavaValue::Ref(*tmp))));
    }

    #[test]
    fn test_subroutines_are_rejected() {
        let graph = OpcodeGraph::build(decode(&[0xa8, 0x00, 0x03, 0xb1]).unwrap(), &[]).unwrap();
        let context = FunctionContext::new("demo/Sample", "run", "()V", true).unwrap();
        let mut symbols = Symbols::new();
        let resolver = TableResolver::new();
        let err = StackSimulator::new(&graph, &resolver, &context, &mut symbols)
            .run()
            .unwrap_err();
        assert!(matches!(err, DecompileError::NotSupported { instruction: "jsr", .. }));
    }

    #[test]
    fn test_string_concat_recipe() {
        use crate::decompile::resolver::BootstrapInfo;
        let resolver = TableResolver::new().with_dynamic(
            4,
            BootstrapInfo {
                bootstrap_owner: STRING_CONCAT_FACTORY.into(),
                bootstrap_name: "makeConcatWithConstants".into(),
                name: "makeConcatWithConstants".into(),
                descriptor: "(I)Ljava/lang/String;".into(),
                arguments: vec![BootstrapArgument::Literal(PoolLiteral::String("n=\u{1}".into()))],
            },
        );
        // iload_0; invokedynamic #4; areturn
        let code = [0x1a, 0xba, 0x00, 0x04, 0x00, 0x00, 0xb0];
        let (graph, sim, _) = simulate(&code, "(I)Ljava/lang/String;", &resolver);
        let Statement::Return(Some(JavaValue::Binary { op: BinOp::Add, lhs, rhs })) = statement_at(&graph, &sim, 6) else {
            panic!("expected concatenation");
        };
        assert!(matches!(lhs.as_ref(), JavaValue::Literal { value: Literal::String(s), .. } if s == "n="));
        assert!(matches!(rhs.as_ref(), JavaValue::Ref(_)));
    }
}
