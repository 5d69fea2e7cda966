//! Coercions between static types and `any`

use crate::value::DynTag;
use ql_ty_id::TyId;

/// View of the static type system needed by the dynamic model
pub trait TypeRelation {
    /// Static assignability of `source` to `target`
    fn is_assignable(&self, source: TyId, target: TyId) -> bool;

    /// Whether `ty` is `any`
    fn is_any(&self, ty: TyId) -> bool;

    /// Whether `ty` is `null` or `undefined`
    fn is_nullish(&self, ty: TyId) -> bool;

    /// Whether values of `ty` are references (class, interface, array or function)
    fn is_reference(&self, ty: TyId) -> bool;

    /// Dynamic tag carried by values of a primitive type
    fn primitive_tag(&self, ty: TyId) -> Option<DynTag>;
}

/// Conversion applied where a value flows into a typed slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coercion {
    /// The value is used as is
    Identity,
    /// Static value into `any`
    Box,
    /// `any` into a static type, checked at runtime
    Unbox(TyId),
    /// `null` or `undefined` into a reference slot
    NullRef,
}

/// Decide how a value of type `source` enters a slot of type `target`
///
/// Returns `None` when the flow is a type mismatch.
pub fn decide_coercion(relation: &impl TypeRelation, source: TyId, target: TyId) -> Option<Coercion> {
    if relation.is_assignable(source, target) {
        Some(Coercion::Identity)
    } else if relation.is_any(target) {
        Some(Coercion::Box)
    } else if relation.is_any(source) {
        Some(Coercion::Unbox(target))
    } else if relation.is_nullish(source) && relation.is_reference(target) {
        Some(Coercion::NullRef)
    } else {
        None
    }
}
