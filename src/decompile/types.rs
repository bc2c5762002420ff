//! Java types, descriptor parsing, and the per-method arena of shared type records.

use super::error::{DecompileError, DecompileResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl Primitive {
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    fn descriptor_char(self) -> char {
        match self {
            Primitive::Boolean => 'Z',
            Primitive::Byte => 'B',
            Primitive::Char => 'C',
            Primitive::Short => 'S',
            Primitive::Int => 'I',
            Primitive::Long => 'J',
            Primitive::Float => 'F',
            Primitive::Double => 'D',
            Primitive::Void => 'V',
        }
    }
}

/// A Java type. Class names are kept in internal form (`java/lang/String`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JavaType {
    Primitive(Primitive),
    Class(String),
    Array(Box<JavaType>),
    Function {
        params: Vec<JavaType>,
        ret: Box<JavaType>,
    },
    Null,
}

impl JavaType {
    pub fn int() -> Self {
        JavaType::Primitive(Primitive::Int)
    }

    pub fn boolean() -> Self {
        JavaType::Primitive(Primitive::Boolean)
    }

    pub fn void() -> Self {
        JavaType::Primitive(Primitive::Void)
    }

    pub fn class(name: impl Into<String>) -> Self {
        JavaType::Class(name.into())
    }

    pub fn object() -> Self {
        JavaType::Class("java/lang/Object".into())
    }

    pub fn string() -> Self {
        JavaType::Class("java/lang/String".into())
    }

    pub fn array_of(element: JavaType) -> Self {
        JavaType::Array(Box::new(element))
    }

    /// Returns true if this type occupies two slots (long, double).
    pub fn is_wide(&self) -> bool {
        matches!(
            self,
            JavaType::Primitive(Primitive::Long) | JavaType::Primitive(Primitive::Double)
        )
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Primitive(Primitive::Void))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, JavaType::Primitive(Primitive::Boolean))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JavaType::Class(_) | JavaType::Array(_) | JavaType::Null)
    }

    pub fn element_type(&self) -> Option<&JavaType> {
        match self {
            JavaType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn to_descriptor(&self) -> String {
        match self {
            JavaType::Primitive(p) => p.descriptor_char().to_string(),
            JavaType::Class(name) => format!("L{};", name),
            JavaType::Array(inner) => format!("[{}", inner.to_descriptor()),
            JavaType::Function { params, ret } => {
                let params: String = params.iter().map(JavaType::to_descriptor).collect();
                format!("({}){}", params, ret.to_descriptor())
            }
            JavaType::Null => "Ljava/lang/Object;".into(),
        }
    }

    /// Source spelling, with class names passed through `class_name`.
    pub fn display_with(&self, class_name: &dyn Fn(&str) -> String) -> String {
        match self {
            JavaType::Primitive(p) => p.keyword().into(),
            JavaType::Class(name) => class_name(name),
            JavaType::Array(inner) => format!("{}[]", inner.display_with(class_name)),
            JavaType::Function { params, ret } => {
                let params: Vec<String> =
                    params.iter().map(|p| p.display_with(class_name)).collect();
                format!("({}) -> {}", params.join(", "), ret.display_with(class_name))
            }
            JavaType::Null => "Object".into(),
        }
    }
}

/// A parsed method descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    pub fn as_function(&self) -> JavaType {
        JavaType::Function {
            params: self.params.clone(),
            ret: Box::new(self.ret.clone()),
        }
    }
}

/// Parse a single type descriptor starting at byte `pos`; returns the type and
/// the position after it.
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(JavaType, usize)> {
    let bytes = desc.as_bytes();
    let prim = |p| Some((JavaType::Primitive(p), pos + 1));
    match *bytes.get(pos)? {
        b'B' => prim(Primitive::Byte),
        b'C' => prim(Primitive::Char),
        b'D' => prim(Primitive::Double),
        b'F' => prim(Primitive::Float),
        b'I' => prim(Primitive::Int),
        b'J' => prim(Primitive::Long),
        b'S' => prim(Primitive::Short),
        b'Z' => prim(Primitive::Boolean),
        b'V' => prim(Primitive::Void),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            Some((JavaType::Class(class_name.to_string()), pos + semi + 2))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            Some((JavaType::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a field descriptor such as `[Ljava/lang/String;`.
pub fn parse_field_descriptor(desc: &str) -> DecompileResult<JavaType> {
    match parse_type_at(desc, 0) {
        Some((ty, end)) if end == desc.len() => Ok(ty),
        _ => Err(DecompileError::InvalidDescriptor(desc.to_string())),
    }
}

/// Parse a method descriptor, e.g. `(II)V`.
pub fn parse_method_descriptor(desc: &str) -> DecompileResult<MethodDescriptor> {
    let invalid = || DecompileError::InvalidDescriptor(desc.to_string());
    if !desc.starts_with('(') {
        return Err(invalid());
    }
    let close = desc.find(')').ok_or_else(invalid)?;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos).ok_or_else(invalid)?;
        params.push(ty);
        pos = next;
    }
    let (ret, end) = parse_type_at(desc, close + 1).ok_or_else(invalid)?;
    if end != desc.len() {
        return Err(invalid());
    }
    Ok(MethodDescriptor { params, ret })
}

/// Convert an internal class name or a class-constant name to a type. Array
/// classes are spelled as descriptors (`[I`) in class constants.
pub fn class_constant_type(name: &str) -> DecompileResult<JavaType> {
    if name.starts_with('[') {
        parse_field_descriptor(name)
    } else {
        Ok(JavaType::Class(name.to_string()))
    }
}

pub fn internal_to_source_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Unqualified class name; nested classes keep their `Outer$Inner` spelling.
pub fn simple_class_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

pub fn package_name(name: &str) -> Option<&str> {
    name.rfind('/').map(|pos| &name[..pos])
}

/// Element type for a `newarray` type code.
pub fn newarray_type(atype: u8) -> Option<JavaType> {
    let p = match atype {
        4 => Primitive::Boolean,
        5 => Primitive::Char,
        6 => Primitive::Float,
        7 => Primitive::Double,
        8 => Primitive::Byte,
        9 => Primitive::Short,
        10 => Primitive::Int,
        11 => Primitive::Long,
        _ => return None,
    };
    Some(JavaType::Primitive(p))
}

/// Handle to a shared type record inside a [`TypeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

#[derive(Clone, Debug)]
enum TypeCell {
    Resolved(JavaType),
    Alias(TypeId),
}

/// Per-method store of type records. Several values may hold the same
/// [`TypeId`]; a record can be retyped in place (`reset`) or redirected to
/// another record (`unify`), and every holder observes the change.
#[derive(Clone, Debug, Default)]
pub struct TypeArena {
    cells: Vec<TypeCell>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, ty: JavaType) -> TypeId {
        self.cells.push(TypeCell::Resolved(ty));
        TypeId(self.cells.len() as u32 - 1)
    }

    /// Representative record of `id`'s equivalence class.
    pub fn find(&self, mut id: TypeId) -> TypeId {
        while let TypeCell::Alias(next) = &self.cells[id.0 as usize] {
            id = *next;
        }
        id
    }

    pub fn get(&self, id: TypeId) -> &JavaType {
        let root = self.find(id);
        match &self.cells[root.0 as usize] {
            TypeCell::Resolved(ty) => ty,
            TypeCell::Alias(_) => unreachable!("find returns a resolved cell"),
        }
    }

    /// Replace the type seen through `id` and all of its aliases.
    pub fn reset(&mut self, id: TypeId, ty: JavaType) {
        let root = self.find(id);
        self.cells[root.0 as usize] = TypeCell::Resolved(ty);
    }

    /// Make `id` share `target`'s record. The type of `target` wins.
    pub fn unify(&mut self, id: TypeId, target: TypeId) {
        let from = self.find(id);
        let to = self.find(target);
        if from != to {
            self.cells[from.0 as usize] = TypeCell::Alias(to);
        }
    }

    pub fn same_record(&self, a: TypeId, b: TypeId) -> bool {
        self.find(a) == self.find(b)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_field_descriptor("I").unwrap(), JavaType::int());
        assert_eq!(
            parse_field_descriptor("J").unwrap(),
            JavaType::Primitive(Primitive::Long)
        );
        assert_eq!(parse_field_descriptor("Z").unwrap(), JavaType::boolean());
        assert!(parse_field_descriptor("Q").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn test_parse_reference_and_array() {
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/Object;").unwrap(),
            JavaType::array_of(JavaType::array_of(JavaType::object()))
        );
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
    }

    #[test]
    fn test_parse_method_descriptor() {
        let desc = parse_method_descriptor("(Ljava/lang/String;J[I)Z").unwrap();
        assert_eq!(
            desc.params,
            vec![
                JavaType::string(),
                JavaType::Primitive(Primitive::Long),
                JavaType::array_of(JavaType::int())
            ]
        );
        assert_eq!(desc.ret, JavaType::boolean());
        assert_eq!(desc.as_function().to_descriptor(), "(Ljava/lang/String;J[I)Z");

        assert!(parse_method_descriptor("II)V").is_err());
        assert!(parse_method_descriptor("(I").is_err());
    }

    #[test]
    fn test_class_names() {
        assert_eq!(internal_to_source_name("java/util/Map$Entry"), "java.util.Map$Entry");
        assert_eq!(simple_class_name("java/lang/String"), "String");
        assert_eq!(package_name("java/lang/String"), Some("java/lang"));
        assert_eq!(package_name("NoPackage"), None);
        assert_eq!(
            class_constant_type("[I").unwrap(),
            JavaType::array_of(JavaType::int())
        );
    }

    #[test]
    fn test_reset_is_seen_by_aliases() {
        let mut arena = TypeArena::new();
        let var = arena.alloc(JavaType::int());
        let literal = arena.alloc(JavaType::int());
        arena.unify(literal, var);
        assert!(arena.same_record(literal, var));

        arena.reset(literal, JavaType::boolean());
        assert_eq!(arena.get(var), &JavaType::boolean());
        assert_eq!(arena.get(literal), &JavaType::boolean());
    }

    #[test]
    fn test_unify_keeps_target_type() {
        let mut arena = TypeArena::new();
        let a = arena.alloc(JavaType::int());
        let b = arena.alloc(JavaType::string());
        let c = arena.alloc(JavaType::object());
        arena.unify(a, b);
        arena.unify(b, c);
        assert_eq!(arena.get(a), &JavaType::object());
        assert_eq!(arena.find(a), arena.find(c));
        assert_eq!(arena.len(), 3);
    }
}
