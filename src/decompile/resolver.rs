//! Constant-pool access for the decompiler.
//!
//! The decompiler never reads a constant pool directly. Callers provide a
//! [`ConstantPoolResolver`] that turns instruction operands into typed
//! references, which keeps class-file parsing out of this crate.

use std::collections::HashMap;

use super::error::{DecompileError, DecompileResult};
use super::method_decompiler::MethodSource;
use super::types::{self, parse_method_descriptor, MethodDescriptor};

/// A symbolic reference found in the constant pool.
#[derive(Clone, Debug, PartialEq)]
pub enum PoolEntry {
    /// Internal class name, or an array descriptor such as `[I`.
    Class(String),
    Field {
        owner: String,
        name: String,
        descriptor: String,
    },
    Method {
        owner: String,
        name: String,
        descriptor: String,
    },
}

/// A loadable constant (`ldc` family).
#[derive(Clone, Debug, PartialEq)]
pub enum PoolLiteral {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Class(String),
}

/// `CONSTANT_MethodHandle` reference kinds used by lambda bootstraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl HandleKind {
    pub fn from_reference_kind(kind: u8) -> Option<Self> {
        Some(match kind {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodHandle {
    pub kind: HandleKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BootstrapArgument {
    Literal(PoolLiteral),
    MethodHandle(MethodHandle),
    MethodType(String),
}

/// Resolved `invokedynamic` call site.
#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapInfo {
    /// Internal name of the class declaring the bootstrap method.
    pub bootstrap_owner: String,
    pub bootstrap_name: String,
    /// Call-site method name, e.g. `apply` or `makeConcatWithConstants`.
    pub name: String,
    /// Call-site descriptor: captured values in, functional interface out.
    pub descriptor: String,
    pub arguments: Vec<BootstrapArgument>,
}

pub trait ConstantPoolResolver {
    /// Class, field and method references (`new`, `getfield`, `invoke*`, ...).
    fn resolve(&self, index: u16) -> Option<PoolEntry>;

    /// Constants pushed by `ldc`, `ldc_w` and `ldc2_w`.
    fn resolve_literal(&self, index: u16) -> Option<PoolLiteral>;

    fn resolve_dynamic(&self, index: u16) -> Option<BootstrapInfo>;

    /// Code of a method declared by the class being decompiled, used to inline
    /// lambda bodies. The default declines, which keeps lambdas as method
    /// references.
    fn method_code(&self, _owner: &str, _name: &str, _descriptor: &str) -> Option<MethodSource> {
        None
    }
}

/// [`ConstantPoolResolver`] backed by in-memory tables.
#[derive(Clone, Debug, Default)]
pub struct TableResolver {
    pub entries: HashMap<u16, PoolEntry>,
    pub literals: HashMap<u16, PoolLiteral>,
    pub dynamics: HashMap<u16, BootstrapInfo>,
    pub methods: HashMap<(String, String, String), MethodSource>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, index: u16, entry: PoolEntry) -> Self {
        self.entries.insert(index, entry);
        self
    }

    pub fn with_literal(mut self, index: u16, literal: PoolLiteral) -> Self {
        self.literals.insert(index, literal);
        self
    }

    pub fn with_dynamic(mut self, index: u16, info: BootstrapInfo) -> Self {
        self.dynamics.insert(index, info);
        self
    }

    pub fn with_method(mut self, source: MethodSource) -> Self {
        let key = (
            source.context.class_name.clone(),
            source.context.method_name.clone(),
            source.context.descriptor_text.clone(),
        );
        self.methods.insert(key, source);
        self
    }
}

impl ConstantPoolResolver for TableResolver {
    fn resolve(&self, index: u16) -> Option<PoolEntry> {
        self.entries.get(&index).cloned()
    }

    fn resolve_literal(&self, index: u16) -> Option<PoolLiteral> {
        self.literals.get(&index).cloned()
    }

    fn resolve_dynamic(&self, index: u16) -> Option<BootstrapInfo> {
        self.dynamics.get(&index).cloned()
    }

    fn method_code(&self, owner: &str, name: &str, descriptor: &str) -> Option<MethodSource> {
        self.methods
            .get(&(owner.to_string(), name.to_string(), descriptor.to_string()))
            .cloned()
    }
}

/// The method being decompiled.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionContext {
    /// Internal name of the declaring class.
    pub class_name: String,
    pub method_name: String,
    pub descriptor_text: String,
    pub descriptor: MethodDescriptor,
    pub is_static: bool,
}

impl FunctionContext {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        descriptor: &str,
        is_static: bool,
    ) -> DecompileResult<Self> {
        Ok(Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            descriptor_text: descriptor.to_string(),
            descriptor: parse_method_descriptor(descriptor)?,
            is_static,
        })
    }

    /// Source spelling of a class: the simple name when `short` is set,
    /// otherwise the qualified name. Nested classes use `Outer.Inner`.
    pub fn class_name(&self, internal: &str, short: bool) -> String {
        let name = if short {
            types::simple_class_name(internal).to_string()
        } else {
            types::internal_to_source_name(internal)
        };
        name.replace('$', ".")
    }

    /// Whether `internal` names the class declaring this method.
    pub fn is_own_class(&self, internal: &str) -> bool {
        self.class_name == internal
    }
}

pub(crate) fn expect_method(entry: Option<PoolEntry>, index: u16) -> DecompileResult<(String, String, String)> {
    match entry {
        Some(PoolEntry::Method {
            owner,
            name,
            descriptor,
        }) => Ok((owner, name, descriptor)),
        Some(other) => Err(DecompileError::UnexpectedValue {
            expected: "method reference",
            found: format!("{:?}", other),
        }),
        None => Err(DecompileError::UnresolvedConstant { index }),
    }
}

pub(crate) fn expect_field(entry: Option<PoolEntry>, index: u16) -> DecompileResult<(String, String, String)> {
    match entry {
        Some(PoolEntry::Field {
            owner,
            name,
            descriptor,
        }) => Ok((owner, name, descriptor)),
        Some(other) => Err(DecompileError::UnexpectedValue {
            expected: "field reference",
            found: format!("{:?}", other),
        }),
        None => Err(DecompileError::UnresolvedConstant { index }),
    }
}

pub(crate) fn expect_class(entry: Option<PoolEntry>, index: u16) -> DecompileResult<String> {
    match entry {
        Some(PoolEntry::Class(name)) => Ok(name),
        Some(other) => Err(DecompileError::UnexpectedValue {
            expected: "class reference",
            found: format!("{:?}", other),
        }),
        None => Err(DecompileError::UnresolvedConstant { index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_resolver_lookups() {
        let resolver = TableResolver::new()
            .with_entry(3, PoolEntry::Class("java/util/List".into()))
            .with_literal(4, PoolLiteral::Int(70000));
        assert_eq!(resolver.resolve(3), Some(PoolEntry::Class("java/util/List".into())));
        assert_eq!(resolver.resolve(4), None);
        assert_eq!(resolver.resolve_literal(4), Some(PoolLiteral::Int(70000)));
        assert!(resolver.resolve_dynamic(1).is_none());
        assert!(resolver.method_code("A", "b", "()V").is_none());
    }

    #[test]
    fn test_expect_helpers() {
        let err = expect_class(None, 9).unwrap_err();
        assert!(matches!(err, DecompileError::UnresolvedConstant { index: 9 }));
        let err = expect_field(Some(PoolEntry::Class("A".into())), 2).unwrap_err();
        assert!(matches!(err, DecompileError::UnexpectedValue { .. }));
    }

    #[test]
    fn test_class_name_spelling() {
        let ctx = FunctionContext::new("com/example/Foo", "run", "()V", false).unwrap();
        assert_eq!(ctx.class_name("java/lang/String", true), "String");
        assert_eq!(ctx.class_name("com/example/Bar$Inner", true), "Bar.Inner");
        assert_eq!(ctx.class_name("java/util/List", false), "java.util.List");
        assert_eq!(ctx.descriptor.params.len(), 0);
    }
}
