//! Assignability: nominal for classes, structural for interfaces

use crate::context::TyContext;
use crate::interface::MemberShape;
use crate::ty::{ClassTyId, InterfaceTyId, TyKind};
use ql_hir::MethodKind;
use ql_intern::Name;
use ql_ty_id::TyId;
use rustc_hash::FxHashSet;

/// Pairs currently being compared; a pair seen again is assumed to hold
type InProgress = FxHashSet<(TyId, TyId)>;

impl TyContext {
    /// Whether a value of type `source` may be stored in a slot of type `target`
    ///
    /// Primitives, functions and arrays need identical types. Class targets
    /// accept the class and its subclasses. Interface targets accept any type
    /// that has every required member with a matching shape.
    pub fn is_assignable(&self, source: TyId, target: TyId) -> bool {
        self.assignable(source, target, &mut InProgress::default())
    }

    /// Whether two types are interchangeable (assignable both ways)
    pub fn same_type(&self, left: TyId, right: TyId) -> bool {
        let mut in_progress = InProgress::default();
        self.assignable(left, right, &mut in_progress) && self.assignable(right, left, &mut in_progress)
    }

    fn assignable(&self, source: TyId, target: TyId, in_progress: &mut InProgress) -> bool {
        if source == target {
            return true;
        }
        match (self.kind(source), self.kind(target)) {
            (TyKind::Class(source), TyKind::Class(target)) => self.is_subclass(*source, *target),
            (_, TyKind::Interface(interface)) => {
                if !in_progress.insert((source, target)) {
                    return true;
                }
                let satisfied = self.satisfies(source, *interface, in_progress);
                in_progress.remove(&(source, target));
                satisfied
            }
            _ => false,
        }
    }

    fn satisfies(&self, source: TyId, interface: InterfaceTyId, in_progress: &mut InProgress) -> bool {
        self.interfaces[interface]
            .members
            .iter()
            .all(|(name, required)| match self.member_shape(source, *name) {
                Some(found) => self.shape_matches(found, *required, in_progress),
                None => false,
            })
    }

    /// Shape of member `name` on a class, object literal or interface type
    pub fn member_shape(&self, ty: TyId, name: Name) -> Option<MemberShape> {
        match self.kind(ty) {
            TyKind::Class(class) => self.class_member_shape(*class, name),
            TyKind::Interface(interface) => self.interfaces[*interface].member(name),
            _ => None,
        }
    }

    fn class_member_shape(&self, class: ClassTyId, name: Name) -> Option<MemberShape> {
        let info = &self.classes[class];
        if let Some((_, field)) = info.field(name) {
            return Some(MemberShape::Field(field.ty));
        }
        if let Some((_, method)) = info.method(name, MethodKind::Method) {
            return Some(MemberShape::Method(method.sig));
        }
        let getter = info
            .method(name, MethodKind::Getter)
            .and_then(|(_, slot)| self.function_ret(slot.sig));
        let setter = info
            .method(name, MethodKind::Setter)
            .and_then(|(_, slot)| self.function_params(slot.sig).first().copied());
        (getter.is_some() || setter.is_some()).then_some(MemberShape::Accessor { getter, setter })
    }

    fn shape_matches(&self, found: MemberShape, required: MemberShape, in_progress: &mut InProgress) -> bool {
        match (found, required) {
            (MemberShape::Field(found), MemberShape::Field(required)) => {
                self.assignable(found, required, in_progress)
            }
            (MemberShape::Method(found), MemberShape::Method(required)) => {
                self.method_matches(found, required, in_progress)
            }
            (
                MemberShape::Accessor { getter, setter },
                MemberShape::Accessor {
                    getter: want_get,
                    setter: want_set,
                },
            ) => {
                let half = |found: Option<TyId>, wanted: Option<TyId>, in_progress: &mut InProgress| match (found, wanted) {
                    (_, None) => true,
                    (Some(found), Some(wanted)) => self.invariant(found, wanted, in_progress),
                    (None, Some(_)) => false,
                };
                half(getter, want_get, in_progress) && half(setter, want_set, in_progress)
            }
            _ => false,
        }
    }

    /// Methods match by arity, parameter types and return type, invariantly
    fn method_matches(&self, found: TyId, required: TyId, in_progress: &mut InProgress) -> bool {
        match (self.kind(found), self.kind(required)) {
            (
                TyKind::Function {
                    params: found_params,
                    ret: found_ret,
                    variadic: found_variadic,
                },
                TyKind::Function {
                    params: want_params,
                    ret: want_ret,
                    variadic: want_variadic,
                },
            ) => {
                found_params.len() == want_params.len()
                    && found_variadic == want_variadic
                    && found_params
                        .iter()
                        .zip(want_params)
                        .all(|(found, wanted)| self.invariant(*found, *wanted, in_progress))
                    && self.invariant(*found_ret, *want_ret, in_progress)
            }
            _ => false,
        }
    }

    fn invariant(&self, left: TyId, right: TyId, in_progress: &mut InProgress) -> bool {
        self.assignable(left, right, in_progress) && self.assignable(right, left, in_progress)
    }

    /// Return type of a function type
    pub fn function_ret(&self, ty: TyId) -> Option<TyId> {
        match self.kind(ty) {
            TyKind::Function { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// Parameter types of a function type
    pub fn function_params(&self, ty: TyId) -> &[TyId] {
        match self.kind(ty) {
            TyKind::Function { params, .. } => params,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{FieldInfo, MethodSlot};
    use crate::interface::InterfaceInfo;
    use crate::ty::TyTable;
    use ql_arena::idx_from_usize;
    use ql_intern::Interner;

    fn interface(ctx: &mut TyContext, name: Name, members: Vec<(Name, MemberShape)>) -> TyId {
        ctx.alloc_interface(InterfaceInfo {
            name,
            def: None,
            members,
            builtin: None,
        })
        .1
    }

    fn class_with_field(ctx: &mut TyContext, name: Name, field: Name, ty: TyId) -> ClassTyId {
        let class = ctx.alloc_class(name, None);
        ctx.classes[class].fields.push(FieldInfo {
            name: field,
            ty,
            readonly: false,
            declared_in: class,
        });
        class
    }

    #[test]
    fn test_primitives_do_not_widen() {
        let ctx = TyContext::new();
        assert!(ctx.is_assignable(TyTable::NUMBER, TyTable::NUMBER));
        assert!(!ctx.is_assignable(TyTable::NULL, TyTable::NUMBER));
        assert!(!ctx.is_assignable(TyTable::NUMBER, TyTable::ANY));
    }

    #[test]
    fn test_classes_are_nominal() {
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let mut ctx = TyContext::new();
        let first = class_with_field(&mut ctx, interner.intern("A"), x, TyTable::NUMBER);
        let second = class_with_field(&mut ctx, interner.intern("B"), x, TyTable::NUMBER);
        let child = class_with_field(&mut ctx, interner.intern("C"), x, TyTable::NUMBER);
        ctx.classes[child].base = Some(first);

        let [first, second, child] = [first, second, child].map(|class| ctx.classes[class].instance);
        assert!(!ctx.is_assignable(second, first));
        assert!(ctx.is_assignable(child, first));
        assert!(!ctx.is_assignable(first, child));
    }

    #[test]
    fn test_interface_superset_satisfies_subset() {
        let mut interner = Interner::new();
        let [x, y, area] = ["x", "y", "area"].map(|name| interner.intern(name));
        let mut ctx = TyContext::new();
        let area_sig = ctx.types.function(vec![], TyTable::NUMBER, false);

        let small = interface(&mut ctx, interner.intern("HasX"), vec![(x, MemberShape::Field(TyTable::NUMBER))]);
        let large = interface(
            &mut ctx,
            interner.intern("Shape"),
            vec![
                (x, MemberShape::Field(TyTable::NUMBER)),
                (y, MemberShape::Field(TyTable::NUMBER)),
                (area, MemberShape::Method(area_sig)),
            ],
        );

        let class = class_with_field(&mut ctx, interner.intern("Point"), x, TyTable::NUMBER);
        ctx.classes[class].fields.push(FieldInfo {
            name: y,
            ty: TyTable::NUMBER,
            readonly: false,
            declared_in: class,
        });
        ctx.classes[class].vtable.push(MethodSlot {
            name: area,
            kind: MethodKind::Method,
            sig: area_sig,
            implementation: idx_from_usize(0),
            declared_in: class,
        });
        let point = ctx.classes[class].instance;

        assert!(ctx.is_assignable(point, large));
        assert!(ctx.is_assignable(point, small));
        assert!(ctx.is_assignable(large, small));
        assert!(!ctx.is_assignable(small, large));
    }

    #[test]
    fn test_method_shapes_are_invariant() {
        let mut interner = Interner::new();
        let [run, base_name] = ["run", "Base"].map(|name| interner.intern(name));
        let mut ctx = TyContext::new();
        let base = ctx.alloc_class(base_name, None);
        let derived = ctx.alloc_class(interner.intern("Derived"), None);
        ctx.classes[derived].base = Some(base);
        let [base_ty, derived_ty] = [base, derived].map(|class| ctx.classes[class].instance);

        let wants_base = ctx.types.function(vec![base_ty], TyTable::VOID, false);
        let takes_derived = ctx.types.function(vec![derived_ty], TyTable::VOID, false);
        let required = interface(&mut ctx, interner.intern("Runner"), vec![(run, MemberShape::Method(wants_base))]);
        let provider = interface(&mut ctx, interner.intern("Impl"), vec![(run, MemberShape::Method(takes_derived))]);

        assert!(!ctx.is_assignable(provider, required));
    }

    #[test]
    fn test_recursive_interfaces_terminate() {
        let mut interner = Interner::new();
        let [next, value] = ["next", "value"].map(|name| interner.intern(name));
        let mut ctx = TyContext::new();
        let (list_id, list) = ctx.alloc_interface(InterfaceInfo {
            name: interner.intern("List"),
            def: None,
            members: Vec::new(),
            builtin: None,
        });
        ctx.interfaces[list_id].members = vec![
            (value, MemberShape::Field(TyTable::NUMBER)),
            (next, MemberShape::Field(list)),
        ];
        let (node_id, node) = ctx.alloc_interface(InterfaceInfo {
            name: interner.intern("Node"),
            def: None,
            members: Vec::new(),
            builtin: None,
        });
        ctx.interfaces[node_id].members = vec![
            (value, MemberShape::Field(TyTable::NUMBER)),
            (next, MemberShape::Field(node)),
        ];

        assert!(ctx.is_assignable(node, list));
        assert!(ctx.is_assignable(list, node));
    }

    #[test]
    fn test_accessor_presence() {
        let mut interner = Interner::new();
        let size = interner.intern("size");
        let mut ctx = TyContext::new();
        let read_only = interface(
            &mut ctx,
            interner.intern("ReadSize"),
            vec![(size, MemberShape::Accessor { getter: Some(TyTable::NUMBER), setter: None })],
        );
        let read_write = interface(
            &mut ctx,
            interner.intern("WriteSize"),
            vec![(
                size,
                MemberShape::Accessor {
                    getter: Some(TyTable::NUMBER),
                    setter: Some(TyTable::NUMBER),
                },
            )],
        );
        assert!(ctx.is_assignable(read_write, read_only));
        assert!(!ctx.is_assignable(read_only, read_write));
    }
}
