//! Versioned variable identities.
//!
//! A bytecode local slot may hold several logical variables over the life of a
//! method. Each logical variable is a generation of the slot; generations of the
//! same slot are chained through `parent`, so two identities can share a
//! lineage while standing for different variables.

use std::collections::BTreeMap;

use super::types::{JavaType, TypeArena, TypeId};
use super::values::{JavaValue, Literal};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VarKind {
    This,
    Param(usize),
    Local,
    /// Bound by a `catch` clause.
    CatchParam,
    /// Holds an operand-stack value that is read more than once.
    Stack,
    /// Parameter of an inlined lambda body.
    LambdaParam,
    /// Lambda implementation parameter that receives a captured value; it is
    /// displayed as that value.
    Captured(JavaValue),
}

#[derive(Clone, Debug)]
pub struct VarInfo {
    pub slot: u16,
    pub parent: Option<VarId>,
    pub generation: u32,
    pub ty: TypeId,
    pub kind: VarKind,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct VarTable {
    vars: Vec<VarInfo>,
}

impl VarTable {
    pub fn mint(&mut self, slot: u16, parent: Option<VarId>, ty: TypeId, kind: VarKind) -> VarId {
        let generation = parent.map(|p| self.get(p).generation + 1).unwrap_or(0);
        self.vars.push(VarInfo {
            slot,
            parent,
            generation,
            ty,
            kind,
            name: None,
        });
        VarId(self.vars.len() as u32 - 1)
    }

    pub fn get(&self, id: VarId) -> &VarInfo {
        &self.vars[id.index()]
    }

    pub fn get_mut(&mut self, id: VarId) -> &mut VarInfo {
        &mut self.vars[id.index()]
    }

    /// First generation of the slot that `id` belongs to.
    pub fn root(&self, mut id: VarId) -> VarId {
        while let Some(parent) = self.get(id).parent {
            id = parent;
        }
        id
    }

    pub fn shares_lineage(&self, a: VarId, b: VarId) -> bool {
        self.root(a) == self.root(b)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.vars.len() as u32).map(VarId)
    }
}

/// Types, variables and display-name allocation for one method (and the lambda
/// bodies inlined into it).
#[derive(Clone, Debug, Default)]
pub struct Symbols {
    pub types: TypeArena,
    pub vars: VarTable,
    next_name: usize,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var_type(&self, id: VarId) -> &JavaType {
        self.types.get(self.vars.get(id).ty)
    }

    /// Give `id` the next sequential display name unless it already has one.
    pub fn name_var(&mut self, id: VarId) -> String {
        let info = self.vars.get_mut(id);
        if let Some(name) = &info.name {
            return name.clone();
        }
        let name = match info.kind {
            VarKind::This => "this".to_string(),
            _ => {
                let name = format!("var{}", self.next_name);
                self.next_name += 1;
                name
            }
        };
        info.name = Some(name.clone());
        name
    }

    pub fn var_name(&self, id: VarId) -> Option<&str> {
        self.vars.get(id).name.as_deref()
    }

    /// Bind `value` to local `slot`, returning the generation that holds it and
    /// whether that generation was minted by this store.
    ///
    /// A new generation is minted when the slot is empty or when the current
    /// generation's type differs from the value's type. An integer literal
    /// stored into a narrower int-family variable adopts the variable's type,
    /// and a variable that has only held `null` adopts the first reference
    /// type stored into it.
    pub fn assign_var(&mut self, frame: &mut LocalFrame, slot: u16, value: &JavaValue) -> (VarId, bool) {
        let value_ty = value.java_type(self);
        if let Some(current) = frame.get(slot) {
            let current_ty = self.var_type(current).clone();
            if current_ty == value_ty {
                if let JavaValue::Literal { ty, .. } = value {
                    self.types.unify(*ty, self.vars.get(current).ty);
                }
                return (current, false);
            }
            if current_ty == JavaType::Null && value_ty.is_reference() {
                let ty = self.vars.get(current).ty;
                self.types.reset(ty, value_ty);
                return (current, false);
            }
            if value_ty == JavaType::Null && current_ty.is_reference() {
                return (current, false);
            }
            if let JavaValue::Literal { value: Literal::Int(_), ty } = value {
                if value_ty == JavaType::int() && is_int_family(&current_ty) {
                    self.types.unify(*ty, self.vars.get(current).ty);
                    return (current, false);
                }
            }
            let ty = self.type_for_store(value, value_ty);
            let id = self.vars.mint(slot, Some(current), ty, VarKind::Local);
            frame.set(slot, id);
            return (id, true);
        }
        let ty = self.type_for_store(value, value_ty);
        let id = self.vars.mint(slot, None, ty, VarKind::Local);
        frame.set(slot, id);
        (id, true)
    }

    /// Literals share their type record with the variable they initialise, so a
    /// later refinement of either is seen by both.
    fn type_for_store(&mut self, value: &JavaValue, value_ty: JavaType) -> TypeId {
        match value {
            JavaValue::Literal { ty, .. } => *ty,
            _ => self.types.alloc(value_ty),
        }
    }

    /// Record that `value` is used where a `boolean` (or `char`, ...) is expected.
    pub fn refine(&mut self, value: &JavaValue, expected: &JavaType) {
        if !is_int_family(expected) || *expected == JavaType::int() {
            return;
        }
        match value {
            JavaValue::Literal {
                value: Literal::Int(_),
                ty,
            } => self.types.reset(*ty, expected.clone()),
            JavaValue::Ref(var) => {
                if *self.var_type(*var) == JavaType::int() {
                    let ty = self.vars.get(*var).ty;
                    self.types.reset(ty, expected.clone());
                }
            }
            JavaValue::Ternary {
                if_true, if_false, ..
            } => {
                self.refine(if_true, expected);
                self.refine(if_false, expected);
            }
            _ => {}
        }
    }
}

fn is_int_family(ty: &JavaType) -> bool {
    use super::types::Primitive::*;
    matches!(
        ty,
        JavaType::Primitive(Boolean | Byte | Char | Short | Int)
    )
}

/// Current generation of every local slot along one control-flow path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalFrame {
    current: BTreeMap<u16, VarId>,
}

impl LocalFrame {
    pub fn get(&self, slot: u16) -> Option<VarId> {
        self.current.get(&slot).copied()
    }

    pub fn set(&mut self, slot: u16, id: VarId) {
        self.current.insert(slot, id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, VarId)> + '_ {
        self.current.iter().map(|(slot, id)| (*slot, *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_literal(symbols: &mut Symbols, v: i32) -> JavaValue {
        JavaValue::int(&mut symbols.types, v)
    }

    #[test]
    fn test_same_type_keeps_generation() {
        let mut symbols = Symbols::new();
        let mut frame = LocalFrame::default();
        let one = int_literal(&mut symbols, 1);
        let two = int_literal(&mut symbols, 2);
        let (a, minted_a) = symbols.assign_var(&mut frame, 1, &one);
        let (b, minted_b) = symbols.assign_var(&mut frame, 1, &two);
        assert!(minted_a);
        assert!(!minted_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_type_change_mints_generation() {
        let mut symbols = Symbols::new();
        let mut frame = LocalFrame::default();
        let one = int_literal(&mut symbols, 1);
        let text = JavaValue::string(&mut symbols.types, "x");
        let (a, _) = symbols.assign_var(&mut frame, 2, &one);
        let (b, minted) = symbols.assign_var(&mut frame, 2, &text);
        assert!(minted);
        assert_ne!(a, b);
        assert!(symbols.vars.shares_lineage(a, b));
        assert_eq!(symbols.vars.get(b).generation, 1);
        assert_eq!(symbols.vars.get(b).parent, Some(a));
        assert_eq!(frame.get(2), Some(b));
    }

    #[test]
    fn test_boolean_refinement_reaches_literal() {
        let mut symbols = Symbols::new();
        let mut frame = LocalFrame::default();
        let one = int_literal(&mut symbols, 1);
        let (var, _) = symbols.assign_var(&mut frame, 1, &one);
        symbols.refine(&JavaValue::Ref(var), &JavaType::boolean());
        assert_eq!(symbols.var_type(var), &JavaType::boolean());
        assert_eq!(one.java_type(&symbols), JavaType::boolean());

        // A later int literal stored into the boolean variable keeps the generation.
        let zero = int_literal(&mut symbols, 0);
        let (again, minted) = symbols.assign_var(&mut frame, 1, &zero);
        assert_eq!(again, var);
        assert!(!minted);
        assert_eq!(zero.java_type(&symbols), JavaType::boolean());
    }

    #[test]
    fn test_names_are_sequential() {
        let mut symbols = Symbols::new();
        let t = symbols.types.alloc(JavaType::int());
        let a = symbols.vars.mint(0, None, t, VarKind::Local);
        let b = symbols.vars.mint(1, None, t, VarKind::Local);
        assert_eq!(symbols.name_var(b), "var0");
        assert_eq!(symbols.name_var(a), "var1");
        assert_eq!(symbols.name_var(b), "var0");
    }
}
