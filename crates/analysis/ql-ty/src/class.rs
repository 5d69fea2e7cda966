//! Class types: flattened field layout, vtable and static slots

use crate::ty::ClassTyId;
use ql_hir::{ClassDefId, FunctionId, MethodKind};
use ql_intern::Name;
use ql_ty_id::TyId;

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    /// Interned function type
    pub ty: TyId,
    /// Parameter types; a variadic signature ends in an array type
    pub params: Vec<TyId>,
    /// Return type
    pub ret: TyId,
    /// Parameters without a default value, rest excluded
    pub required: usize,
    /// Last parameter collects the remaining arguments
    pub variadic: bool,
}

/// Instance field; its position in [`ClassInfo::fields`] is its slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: Name,
    /// Field type
    pub ty: TyId,
    /// `readonly`
    pub readonly: bool,
    /// Class declaring the field
    pub declared_in: ClassTyId,
}

/// One vtable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSlot {
    /// Method name
    pub name: Name,
    /// Method, getter or setter
    pub kind: MethodKind,
    /// Function type of the method
    pub sig: TyId,
    /// Implementation used by instances of this class
    pub implementation: FunctionId,
    /// Class declaring the implementation
    pub declared_in: ClassTyId,
}

/// One static storage slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSlot {
    /// Field name
    pub name: Name,
    /// Field type
    pub ty: TyId,
    /// `readonly`
    pub readonly: bool,
    /// Class declaring the field
    pub declared_in: ClassTyId,
    /// Index into the declaring class's static field list
    pub field: usize,
}

/// Static method visible on a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMethod {
    /// Method name
    pub name: Name,
    /// Implementation
    pub function: FunctionId,
    /// Class declaring it
    pub declared_in: ClassTyId,
}

/// A class type
///
/// Fields are flattened: inherited fields first, own fields appended, so a
/// field keeps its slot in every subclass.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Class name
    pub name: Name,
    /// Declaration, `None` for object literal shapes
    pub def: Option<ClassDefId>,
    /// Single base class
    pub base: Option<ClassTyId>,
    /// Instance type
    pub instance: TyId,
    /// Type of the class used as a value
    pub object: TyId,
    /// Instance fields, inherited first
    pub fields: Vec<FieldInfo>,
    /// Method slots, inherited first
    pub vtable: Vec<MethodSlot>,
    /// Static slots, own first, then inherited ones that are not shadowed
    pub statics: Vec<StaticSlot>,
    /// Static methods, own first
    pub static_methods: Vec<StaticMethod>,
    /// Constructor function
    pub constructor: Option<FunctionId>,
    /// Constructor parameters as seen by `new`
    pub ctor: Option<FnSig>,
    /// Layout has been computed
    pub laid_out: bool,
}

impl ClassInfo {
    /// Fresh class without members
    #[must_use]
    pub const fn new(name: Name, def: Option<ClassDefId>, instance: TyId, object: TyId) -> Self {
        Self {
            name,
            def,
            base: None,
            instance,
            object,
            fields: Vec::new(),
            vtable: Vec::new(),
            statics: Vec::new(),
            static_methods: Vec::new(),
            constructor: None,
            ctor: None,
            laid_out: false,
        }
    }

    /// Field named `name`, own declarations before inherited ones
    pub fn field(&self, name: Name) -> Option<(usize, &FieldInfo)> {
        let index = self.fields.iter().rposition(|field| field.name == name)?;
        Some((index, &self.fields[index]))
    }

    /// Vtable slot of a method or accessor half
    pub fn method(&self, name: Name, kind: MethodKind) -> Option<(usize, &MethodSlot)> {
        let index = self
            .vtable
            .iter()
            .rposition(|slot| slot.name == name && slot.kind == kind)?;
        Some((index, &self.vtable[index]))
    }

    /// Getter and setter slots of an accessor
    pub fn accessor(&self, name: Name) -> (Option<usize>, Option<usize>) {
        (
            self.method(name, MethodKind::Getter).map(|(slot, _)| slot),
            self.method(name, MethodKind::Setter).map(|(slot, _)| slot),
        )
    }

    /// Static slot named `name`
    pub fn static_slot(&self, name: Name) -> Option<(usize, &StaticSlot)> {
        let index = self.statics.iter().position(|slot| slot.name == name)?;
        Some((index, &self.statics[index]))
    }

    /// Static method named `name`
    pub fn static_method(&self, name: Name) -> Option<&StaticMethod> {
        self.static_methods.iter().find(|method| method.name == name)
    }

    /// Place a method in the vtable
    ///
    /// An inherited slot with the same name, kind and signature is taken over;
    /// anything else appends a new slot. Returns the slot index.
    pub fn assign_slot(&mut self, slot: MethodSlot) -> usize {
        if let Some(index) = self.vtable.iter().position(|existing| {
            existing.name == slot.name && existing.kind == slot.kind && existing.sig == slot.sig
        }) {
            self.vtable[index] = slot;
            return index;
        }
        self.vtable.push(slot);
        self.vtable.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_arena::{idx_from_usize, Arena};
    use ql_intern::Interner;

    fn slot(name: Name, kind: MethodKind, sig: u32, implementation: usize, owner: usize) -> MethodSlot {
        MethodSlot {
            name,
            kind,
            sig: TyId::from_index(sig),
            implementation: idx_from_usize(implementation),
            declared_in: idx_from_usize(owner),
        }
    }

    #[test]
    fn test_override_takes_over_inherited_slot() {
        let mut interner = Interner::new();
        let speak = interner.intern("speak");
        let name = interner.intern("name");
        let mut classes: Arena<ClassInfo> = Arena::new();
        let base = classes.alloc(ClassInfo::new(
            interner.intern("Base"),
            None,
            TyId::from_index(10),
            TyId::from_index(11),
        ));

        let mut derived = classes[base].clone();
        assert_eq!(derived.assign_slot(slot(speak, MethodKind::Method, 7, 0, 0)), 0);
        assert_eq!(derived.assign_slot(slot(name, MethodKind::Getter, 8, 1, 0)), 1);

        assert_eq!(derived.assign_slot(slot(speak, MethodKind::Method, 7, 2, 1)), 0);
        assert_eq!(derived.vtable[0].implementation, idx_from_usize(2));
        // different kind or signature appends
        assert_eq!(derived.assign_slot(slot(name, MethodKind::Setter, 9, 3, 1)), 2);
        assert_eq!(derived.assign_slot(slot(speak, MethodKind::Method, 5, 4, 1)), 3);
        assert_eq!(derived.method(speak, MethodKind::Method).map(|(index, _)| index), Some(3));
        assert_eq!(derived.accessor(name), (Some(1), Some(2)));
    }
}
