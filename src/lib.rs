//! A decompiler backend for [JVM method bytecode](https://docs.oracle.com/javase/specs/jvms/se10/html/jvms-6.html).
//!
//! Given the code of one method, its exception table and a
//! [`ConstantPoolResolver`] for the enclosing class, the decompiler rebuilds
//! structured Java statements (`if`/`else`, loops, `switch`, `try`/`catch`,
//! `synchronized`) and renders them as source text.
//!
//! ```rust
//! use classfile_decompiler::{Decompiler, FunctionContext, MethodSource, TableResolver};
//!
//! // iload_0; iconst_1; iadd; ireturn
//! let context = FunctionContext::new("com/example/Counter", "next", "(I)I", true).unwrap();
//! let source = MethodSource::new(context, vec![0x1a, 0x04, 0x60, 0xac], Vec::new());
//! let resolver = TableResolver::new();
//! let text = Decompiler::new(&resolver).decompile_to_string(&source).unwrap();
//! assert_eq!(text, "return var0 + 1;");
//! ```

pub mod code_attribute;
pub mod decompile;

pub use decompile::{
    ConstantPoolResolver, DecompileError, DecompileOptions, DecompileResult, DecompiledMethod, Decompiler,
    FunctionContext, JavaRenderer, MethodSource, RenderConfig, TableResolver,
};
