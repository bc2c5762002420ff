//! Per-method decompilation pipeline.
//!
//! `decode -> OpcodeGraph -> StackSimulator -> StatementGraph -> structure
//! -> assign_scopes`, with rendering left to the caller.

use std::cell::Cell;

use crate::code_attribute::{CodeAttribute, ExceptionEntry};

use super::decoder::decode;
use super::error::{DecompileError, DecompileResult};
use super::opcode_graph::OpcodeGraph;
use super::renderer::{JavaRenderer, RenderConfig};
use super::resolver::{ConstantPoolResolver, FunctionContext};
use super::rewriter::{collapse_boolean_ternaries, structure_with, StructureOptions};
use super::scoping::{assign_scopes, place_declarations};
use super::stack_sim::{LambdaInliner, StackSimulator};
use super::statement_graph::StatementGraph;
use super::statements::Statement;
use super::values::JavaValue;
use super::var_id::{Symbols, VarId, VarKind};

/// Lambdas nested deeper than this stay method references.
const MAX_LAMBDA_DEPTH: usize = 8;

/// Options controlling the decompilation pipeline.
#[derive(Clone, Debug)]
pub struct DecompileOptions {
    pub render: RenderConfig,
    /// Decompile lambda implementation methods of the same class in place.
    pub inline_lambdas: bool,
    /// Merge nested else-less ifs into `&&` conditions.
    pub merge_conditions: bool,
    /// Rewrite `c ? true : false` as `c`.
    pub collapse_ternaries: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            inline_lambdas: true,
            merge_conditions: true,
            collapse_ternaries: true,
        }
    }
}

/// Bytecode of one method together with its context.
#[derive(Clone, Debug)]
pub struct MethodSource {
    pub context: FunctionContext,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
}

impl MethodSource {
    pub fn new(context: FunctionContext, code: Vec<u8>, exception_table: Vec<ExceptionEntry>) -> Self {
        Self {
            context,
            code,
            exception_table,
        }
    }

    /// Build from the raw body of a `Code` attribute.
    pub fn from_code_attribute(context: FunctionContext, info: &[u8]) -> DecompileResult<Self> {
        let attribute = CodeAttribute::parse(info).map_err(|source| DecompileError::Operands { offset: 0, source })?;
        Ok(Self::new(context, attribute.code, attribute.exception_table))
    }
}

/// Structured body of a decompiled method.
#[derive(Clone, Debug)]
pub struct DecompiledMethod {
    pub context: FunctionContext,
    pub statements: Vec<Statement>,
    pub symbols: Symbols,
    /// `this` (for instance methods) and the declared parameters.
    pub params: Vec<VarId>,
}

impl DecompiledMethod {
    pub fn render(&self, config: &RenderConfig) -> String {
        JavaRenderer::new(config, &self.context, &self.symbols).render_block(&self.statements)
    }

    /// Display names of the declared parameters, `this` excluded.
    pub fn param_names(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|&&p| self.symbols.vars.get(p).kind != VarKind::This)
            .filter_map(|&p| self.symbols.var_name(p).map(str::to_string))
            .collect()
    }
}

/// Decompiles methods of one class against its constant pool.
pub struct Decompiler<'r, R: ConstantPoolResolver + ?Sized> {
    resolver: &'r R,
    options: DecompileOptions,
    lambda_depth: Cell<usize>,
}

impl<'r, R: ConstantPoolResolver + ?Sized> Decompiler<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self::with_options(resolver, DecompileOptions::default())
    }

    pub fn with_options(resolver: &'r R, options: DecompileOptions) -> Self {
        Self {
            resolver,
            options,
            lambda_depth: Cell::new(0),
        }
    }

    pub fn options(&self) -> &DecompileOptions {
        &self.options
    }

    pub fn decompile_method(&self, source: &MethodSource) -> DecompileResult<DecompiledMethod> {
        let mut symbols = Symbols::new();
        let (params, mut statements) = self.method_body(source, &mut symbols, None)?;
        assign_scopes(&mut statements, &mut symbols, &params);
        log::debug!(
            "decompiled {}.{}{}: {} top-level statements",
            source.context.class_name,
            source.context.method_name,
            source.context.descriptor_text,
            statements.len()
        );
        Ok(DecompiledMethod {
            context: source.context.clone(),
            statements,
            symbols,
            params,
        })
    }

    /// Decompile every method independently; a failing method does not stop
    /// the others.
    pub fn decompile_methods(&self, sources: &[MethodSource]) -> Vec<DecompileResult<DecompiledMethod>> {
        sources
            .iter()
            .map(|source| {
                let result = self.decompile_method(source);
                if let Err(err) = &result {
                    log::debug!("{}.{} failed: {}", source.context.class_name, source.context.method_name, err);
                }
                result
            })
            .collect()
    }

    /// Decompile and render with the configured [`RenderConfig`].
    pub fn decompile_to_string(&self, source: &MethodSource) -> DecompileResult<String> {
        Ok(self.decompile_method(source)?.render(&self.options.render))
    }

    fn method_body(
        &self,
        source: &MethodSource,
        symbols: &mut Symbols,
        captured: Option<Vec<JavaValue>>,
    ) -> DecompileResult<(Vec<VarId>, Vec<Statement>)> {
        let decoded = decode(&source.code)?;
        log::debug!("{}: decoded {} instructions", source.context.method_name, decoded.nodes.len());
        let graph = OpcodeGraph::build(decoded, &source.exception_table)?;

        let mut simulator = StackSimulator::new(&graph, self.resolver, &source.context, symbols);
        if self.options.inline_lambdas {
            simulator = simulator.with_inliner(self);
        }
        if let Some(captured) = captured {
            simulator = simulator.with_captures(captured);
        }
        let simulated = simulator.run()?;
        let params = simulated.params.clone();

        let mut statements = StatementGraph::from_simulation(&graph, simulated)?;
        let options = StructureOptions {
            merge_conditions: self.options.merge_conditions,
        };
        let mut body = structure_with(&mut statements, options)?;
        if self.options.collapse_ternaries {
            collapse_boolean_ternaries(&mut body, symbols);
        }
        Ok((params, body))
    }
}

impl<'r, R: ConstantPoolResolver + ?Sized> LambdaInliner for Decompiler<'r, R> {
    fn inline_lambda(
        &self,
        source: &MethodSource,
        captured: Vec<JavaValue>,
        symbols: &mut Symbols,
    ) -> DecompileResult<(Vec<VarId>, Vec<Statement>)> {
        let depth = self.lambda_depth.get();
        if depth >= MAX_LAMBDA_DEPTH {
            return Err(DecompileError::UnexpectedValue {
                expected: "lambda nesting within limit",
                found: depth.to_string(),
            });
        }
        self.lambda_depth.set(depth + 1);
        let result = self.method_body(source, symbols, Some(captured));
        self.lambda_depth.set(depth);

        let (params, mut body) = result?;
        if matches!(body.last(), Some(Statement::Return(None))) {
            body.pop();
        }
        // Names are assigned with the enclosing method; declarations are
        // placed within the lambda body only.
        place_declarations(&mut body, symbols);
        let params = params
            .into_iter()
            .filter(|&p| symbols.vars.get(p).kind == VarKind::LambdaParam)
            .collect();
        Ok((params, body))
    }
}
