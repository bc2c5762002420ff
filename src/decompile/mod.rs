//! Method-body decompilation: bytecode in, structured Java statements out.

pub mod decoder;
pub mod dominator;
pub mod error;
pub mod method_decompiler;
pub mod opcode_graph;
pub mod renderer;
pub mod resolver;
pub mod rewriter;
pub mod scoping;
pub mod stack_sim;
pub mod statement_graph;
pub mod statements;
pub mod types;
pub mod values;
pub mod var_id;

pub use error::{DecompileError, DecompileResult};
pub use method_decompiler::{DecompileOptions, DecompiledMethod, Decompiler, MethodSource};
pub use renderer::{JavaRenderer, RenderConfig};
pub use resolver::{ConstantPoolResolver, FunctionContext, TableResolver};
