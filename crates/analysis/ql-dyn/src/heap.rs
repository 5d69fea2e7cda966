//! Dynamic object storage and the extref table

use crate::error::{DynError, UnboxError};
use crate::relation::TypeRelation;
use crate::value::{
    number_to_string, ArrayId, DynTag, DynValue, ExtRef, ExtRefId, ExtRefKind, HostHandle,
    ObjectId, StaticValue,
};
use indexmap::IndexMap;
use ql_ty_id::TyId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;
use tracing::trace;

/// Largest length an array may grow to through an element write
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Access to static values boxed as extrefs
pub trait ExtRefHost {
    /// Read member `name` of a static value, boxing the result into `heap`
    ///
    /// # Errors
    ///
    /// Returns `DynError::UnknownHostMember` when the static type has no such member.
    fn read_member(&mut self, heap: &mut DynHeap, extref: ExtRef, name: &str) -> Result<DynValue, DynError>;

    /// Write member `name` of a static value, unboxing `value` to the member type
    ///
    /// # Errors
    ///
    /// Returns `DynError::UnknownHostMember` for a missing member and
    /// `DynError::Unbox` when `value` does not fit the member type.
    fn write_member(&mut self, heap: &mut DynHeap, extref: ExtRef, name: &str, value: DynValue) -> Result<(), DynError>;
}

/// Result of a successful narrowing
#[derive(Debug, Clone, PartialEq)]
pub enum Unboxed {
    /// Statically typed value
    Static(StaticValue),
    /// The target was `any`; the dynamic value is kept
    Dynamic(DynValue),
}

/// An open dynamic object
#[derive(Debug, Clone, Default)]
struct DynObject {
    properties: IndexMap<Rc<str>, DynValue>,
    proto: Option<ObjectId>,
}

/// Heap of dynamic objects and arrays, plus the extref table
#[derive(Debug, Default)]
pub struct DynHeap {
    objects: Vec<DynObject>,
    arrays: Vec<Vec<DynValue>>,
    extrefs: Vec<ExtRef>,
    extref_ids: FxHashMap<(HostHandle, TyId), ExtRefId>,
}

impl DynHeap {
    /// Create an empty heap
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `{}`
    pub fn new_object(&mut self) -> DynValue {
        DynValue::Object(self.alloc_object(None))
    }

    /// Allocate `{}` whose prototype is `proto`
    ///
    /// # Errors
    ///
    /// Returns `DynError::NotAnObject` if `proto` is not a dynamic object or `null`.
    pub fn new_object_with_proto(&mut self, proto: &DynValue) -> Result<DynValue, DynError> {
        let proto = self.proto_target(proto)?;
        Ok(DynValue::Object(self.alloc_object(proto)))
    }

    /// Allocate an array holding `elements`
    pub fn new_array(&mut self, elements: Vec<DynValue>) -> DynValue {
        let id = ArrayId(self.arrays.len() as u32);
        self.arrays.push(elements);
        DynValue::Array(id)
    }

    fn alloc_object(&mut self, proto: Option<ObjectId>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(DynObject {
            properties: IndexMap::new(),
            proto,
        });
        id
    }

    fn object(&self, id: ObjectId) -> Result<&DynObject, DynError> {
        self.objects.get(id.0 as usize).ok_or(DynError::Dangling)
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut DynObject, DynError> {
        self.objects.get_mut(id.0 as usize).ok_or(DynError::Dangling)
    }

    fn array(&self, id: ArrayId) -> Result<&Vec<DynValue>, DynError> {
        self.arrays.get(id.0 as usize).ok_or(DynError::Dangling)
    }

    /// Elements of a dynamic array
    ///
    /// # Errors
    ///
    /// Returns `DynError::Dangling` for a stale handle.
    pub fn array_elements(&self, id: ArrayId) -> Result<&[DynValue], DynError> {
        self.array(id).map(Vec::as_slice)
    }

    /// Extref table entry
    ///
    /// # Errors
    ///
    /// Returns `DynError::Dangling` for a stale handle.
    pub fn extref(&self, id: ExtRefId) -> Result<ExtRef, DynError> {
        self.extrefs.get(id.0 as usize).copied().ok_or(DynError::Dangling)
    }

    /// Number of extref table entries
    pub fn extref_count(&self) -> usize {
        self.extrefs.len()
    }

    // Boxing

    /// Box a static value of type `ty`
    ///
    /// Boxing the same handle with the same type twice yields the same extref.
    pub fn box_value(&mut self, value: StaticValue, ty: TyId) -> DynValue {
        match value {
            StaticValue::Number(value) => DynValue::Number(value),
            StaticValue::Boolean(value) => DynValue::Boolean(value),
            StaticValue::String(value) => DynValue::String(value),
            StaticValue::Null => DynValue::Null,
            StaticValue::Undefined => DynValue::Undefined,
            StaticValue::Ref { handle, kind } => {
                if let Some(id) = self.extref_ids.get(&(handle, ty)) {
                    return DynValue::ExtRef(*id);
                }
                let id = ExtRefId(self.extrefs.len() as u32);
                self.extrefs.push(ExtRef { handle, ty, kind });
                self.extref_ids.insert((handle, ty), id);
                trace!(handle = handle.0, ty = ty.index(), ?kind, "new extref");
                DynValue::ExtRef(id)
            }
        }
    }

    /// Narrow a dynamic value to `expected`
    ///
    /// Primitives must carry the matching tag. An extref narrows when its
    /// boxed static type is assignable to `expected` and returns the original
    /// handle. `null` and `undefined` narrow to any reference type.
    ///
    /// # Errors
    ///
    /// Returns `UnboxError` for any other combination.
    pub fn unbox(&self, value: &DynValue, expected: TyId, relation: &impl TypeRelation) -> Result<Unboxed, UnboxError> {
        if relation.is_any(expected) {
            return Ok(Unboxed::Dynamic(value.clone()));
        }
        let found = self.tag(value);
        let mismatch = UnboxError { found, expected };
        let wanted = relation.primitive_tag(expected);
        let unboxed = match value {
            DynValue::Number(number) if wanted == Some(DynTag::Number) => StaticValue::Number(*number),
            DynValue::Boolean(flag) if wanted == Some(DynTag::Boolean) => StaticValue::Boolean(*flag),
            DynValue::String(text) if wanted == Some(DynTag::String) => StaticValue::String(Rc::clone(text)),
            DynValue::Null if wanted == Some(DynTag::Null) || relation.is_reference(expected) => StaticValue::Null,
            DynValue::Undefined if wanted == Some(DynTag::Undefined) || relation.is_reference(expected) => {
                StaticValue::Undefined
            }
            DynValue::ExtRef(id) => {
                let entry = self.extref(*id).map_err(|_| mismatch.clone())?;
                if !relation.is_assignable(entry.ty, expected) {
                    return Err(mismatch);
                }
                StaticValue::Ref {
                    handle: entry.handle,
                    kind: entry.kind,
                }
            }
            _ => return Err(mismatch),
        };
        Ok(Unboxed::Static(unboxed))
    }

    // Inspection

    /// Runtime tag; an extref to a closure reports `Function`
    pub fn tag(&self, value: &DynValue) -> DynTag {
        match value {
            DynValue::Number(_) => DynTag::Number,
            DynValue::Boolean(_) => DynTag::Boolean,
            DynValue::String(_) => DynTag::String,
            DynValue::Null => DynTag::Null,
            DynValue::Undefined => DynTag::Undefined,
            DynValue::Object(_) => DynTag::Object,
            DynValue::Array(_) => DynTag::Array,
            DynValue::ExtRef(id) => match self.extref(*id) {
                Ok(ExtRef {
                    kind: ExtRefKind::Function,
                    ..
                }) => DynTag::Function,
                _ => DynTag::ExtRef,
            },
        }
    }

    /// Result of `typeof value`
    pub fn type_of(&self, value: &DynValue) -> &'static str {
        match self.tag(value) {
            DynTag::Number => "number",
            DynTag::Boolean => "boolean",
            DynTag::String => "string",
            DynTag::Undefined => "undefined",
            DynTag::Function => "function",
            DynTag::Null | DynTag::Object | DynTag::Array | DynTag::ExtRef => "object",
        }
    }

    /// Whether two values carry the same tag; extrefs must also agree on kind
    pub fn type_eq(&self, lhs: &DynValue, rhs: &DynValue) -> bool {
        if self.tag(lhs) != self.tag(rhs) {
            return false;
        }
        match (lhs, rhs) {
            (DynValue::ExtRef(left), DynValue::ExtRef(right)) => {
                matches!((self.extref(*left), self.extref(*right)), (Ok(left), Ok(right)) if left.kind == right.kind)
            }
            _ => true,
        }
    }

    /// `value instanceof class`, decided on the boxed static type
    pub fn instance_of(&self, value: &DynValue, class: TyId, relation: &impl TypeRelation) -> bool {
        match value {
            DynValue::ExtRef(id) => self
                .extref(*id)
                .is_ok_and(|entry| relation.is_assignable(entry.ty, class)),
            _ => false,
        }
    }

    /// Logical-context coercion
    pub fn truthy(&self, value: &DynValue) -> bool {
        match value {
            DynValue::Number(number) => *number != 0.0 && !number.is_nan(),
            DynValue::Boolean(flag) => *flag,
            DynValue::String(text) => !text.is_empty(),
            DynValue::Null | DynValue::Undefined => false,
            DynValue::Object(_) | DynValue::Array(_) | DynValue::ExtRef(_) => true,
        }
    }

    /// Numeric coercion: strings parse, `null` is 0, `undefined` and objects are NaN
    pub fn to_number(&self, value: &DynValue) -> f64 {
        match value {
            DynValue::Number(number) => *number,
            DynValue::Boolean(flag) => f64::from(u8::from(*flag)),
            DynValue::String(text) => parse_number(text),
            DynValue::Null => 0.0,
            DynValue::Undefined | DynValue::Object(_) | DynValue::Array(_) | DynValue::ExtRef(_) => f64::NAN,
        }
    }

    /// String coercion used by `+` and by printing
    pub fn to_display(&self, value: &DynValue) -> String {
        match value {
            DynValue::Number(number) => number_to_string(*number),
            DynValue::Boolean(flag) => flag.to_string(),
            DynValue::String(text) => text.to_string(),
            DynValue::Null => "null".to_string(),
            DynValue::Undefined => "undefined".to_string(),
            DynValue::Array(id) => self.array(*id).map_or_else(
                |_| String::new(),
                |elements| {
                    elements
                        .iter()
                        .map(|element| match element {
                            DynValue::Null | DynValue::Undefined => String::new(),
                            other => self.to_display(other),
                        })
                        .collect::<Vec<_>>()
                        .join(",")
                },
            ),
            DynValue::Object(_) => "[object Object]".to_string(),
            DynValue::ExtRef(_) => match self.tag(value) {
                DynTag::Function => "function".to_string(),
                _ => "[object Object]".to_string(),
            },
        }
    }

    // Properties

    /// Read `value[name]`
    ///
    /// Missing properties of dynamic objects are `undefined` after the
    /// prototype link is consulted. Extref reads go to the host.
    ///
    /// # Errors
    ///
    /// Returns `DynError::NotAnObject` for `null` and `undefined` receivers.
    pub fn get_property(&mut self, host: &mut dyn ExtRefHost, value: &DynValue, name: &str) -> Result<DynValue, DynError> {
        match value {
            DynValue::Object(id) => self.lookup(*id, name),
            DynValue::Array(id) => {
                let elements = self.array(*id)?;
                if name == "length" {
                    return Ok(DynValue::Number(elements.len() as f64));
                }
                Ok(array_index(name)
                    .and_then(|index| elements.get(index).cloned())
                    .unwrap_or(DynValue::Undefined))
            }
            DynValue::String(text) if name == "length" => Ok(DynValue::Number(text.chars().count() as f64)),
            DynValue::ExtRef(id) => {
                let entry = self.extref(*id)?;
                host.read_member(self, entry, name)
            }
            DynValue::Null | DynValue::Undefined => Err(DynError::NotAnObject {
                property: name.to_string(),
                found: self.tag(value),
            }),
            DynValue::Number(_) | DynValue::Boolean(_) | DynValue::String(_) => Ok(DynValue::Undefined),
        }
    }

    fn lookup(&self, id: ObjectId, name: &str) -> Result<DynValue, DynError> {
        let mut visited = FxHashSet::default();
        let mut current = Some(id);
        while let Some(object_id) = current {
            if !visited.insert(object_id) {
                return Err(DynError::PrototypeCycle);
            }
            let object = self.object(object_id)?;
            if let Some(found) = object.properties.get(name) {
                return Ok(found.clone());
            }
            current = object.proto;
        }
        Ok(DynValue::Undefined)
    }

    /// Write `value[name] = new_value`, creating the property if absent
    ///
    /// # Errors
    ///
    /// Returns `DynError::NotAnObject` for primitive receivers.
    pub fn set_property(
        &mut self,
        host: &mut dyn ExtRefHost,
        value: &DynValue,
        name: &str,
        new_value: DynValue,
    ) -> Result<(), DynError> {
        match value {
            DynValue::Object(id) => {
                self.object_mut(*id)?.properties.insert(Rc::from(name), new_value);
                Ok(())
            }
            DynValue::Array(id) => match array_index(name) {
                Some(index) => self.set_element(*id, index, new_value),
                None => Err(DynError::NotAnObject {
                    property: name.to_string(),
                    found: DynTag::Array,
                }),
            },
            DynValue::ExtRef(id) => {
                let entry = self.extref(*id)?;
                host.write_member(self, entry, name, new_value)
            }
            _ => Err(DynError::NotAnObject {
                property: name.to_string(),
                found: self.tag(value),
            }),
        }
    }

    fn set_element(&mut self, id: ArrayId, index: usize, new_value: DynValue) -> Result<(), DynError> {
        if index >= MAX_ARRAY_LENGTH {
            return Err(DynError::IndexOutOfRange {
                index,
                limit: MAX_ARRAY_LENGTH,
            });
        }
        let elements = self.arrays.get_mut(id.0 as usize).ok_or(DynError::Dangling)?;
        if index >= elements.len() {
            elements.resize(index + 1, DynValue::Undefined);
        }
        elements[index] = new_value;
        Ok(())
    }

    /// Read `value[index]` with a dynamic key
    ///
    /// # Errors
    ///
    /// Same as [`DynHeap::get_property`].
    pub fn get_elem(&mut self, host: &mut dyn ExtRefHost, value: &DynValue, key: &DynValue) -> Result<DynValue, DynError> {
        let name = self.to_display(key);
        self.get_property(host, value, &name)
    }

    /// Write `value[index]` with a dynamic key
    ///
    /// # Errors
    ///
    /// Same as [`DynHeap::set_property`].
    pub fn set_elem(
        &mut self,
        host: &mut dyn ExtRefHost,
        value: &DynValue,
        key: &DynValue,
        new_value: DynValue,
    ) -> Result<(), DynError> {
        let name = self.to_display(key);
        self.set_property(host, value, &name, new_value)
    }

    /// Whether `name` exists on the object or its prototype
    pub fn has_property(&self, value: &DynValue, name: &str) -> bool {
        match value {
            DynValue::Object(id) => {
                let mut visited = FxHashSet::default();
                let mut current = Some(*id);
                while let Some(object_id) = current {
                    let Ok(object) = self.object(object_id) else {
                        return false;
                    };
                    if !visited.insert(object_id) {
                        return false;
                    }
                    if object.properties.contains_key(name) {
                        return true;
                    }
                    current = object.proto;
                }
                false
            }
            DynValue::Array(id) => {
                name == "length"
                    || self
                        .array(*id)
                        .is_ok_and(|elements| array_index(name).is_some_and(|index| index < elements.len()))
            }
            _ => false,
        }
    }

    /// Remove an own property; returns whether it existed
    pub fn delete_property(&mut self, value: &DynValue, name: &str) -> bool {
        match value {
            DynValue::Object(id) => self
                .object_mut(*id)
                .is_ok_and(|object| object.properties.shift_remove(name).is_some()),
            _ => false,
        }
    }

    /// Prototype of a dynamic object, `null` when it has none
    ///
    /// # Errors
    ///
    /// Returns `DynError::NotAnObject` for values that are not dynamic objects.
    pub fn get_prototype(&self, value: &DynValue) -> Result<DynValue, DynError> {
        match value {
            DynValue::Object(id) => Ok(self.object(*id)?.proto.map_or(DynValue::Null, DynValue::Object)),
            _ => Err(DynError::NotAnObject {
                property: "__proto__".to_string(),
                found: self.tag(value),
            }),
        }
    }

    /// Replace the prototype link of a dynamic object
    ///
    /// # Errors
    ///
    /// Returns `DynError::PrototypeCycle` if the object would become its own
    /// ancestor and `DynError::NotAnObject` for non-object operands.
    pub fn set_prototype(&mut self, value: &DynValue, proto: &DynValue) -> Result<(), DynError> {
        let DynValue::Object(id) = value else {
            return Err(DynError::NotAnObject {
                property: "__proto__".to_string(),
                found: self.tag(value),
            });
        };
        let proto = self.proto_target(proto)?;
        let mut current = proto;
        while let Some(ancestor) = current {
            if ancestor == *id {
                return Err(DynError::PrototypeCycle);
            }
            current = self.object(ancestor)?.proto;
        }
        self.object_mut(*id)?.proto = proto;
        Ok(())
    }

    fn proto_target(&self, proto: &DynValue) -> Result<Option<ObjectId>, DynError> {
        match proto {
            DynValue::Object(id) => Ok(Some(*id)),
            DynValue::Null => Ok(None),
            other => Err(DynError::NotAnObject {
                property: "__proto__".to_string(),
                found: self.tag(other),
            }),
        }
    }
}

fn array_index(name: &str) -> Option<usize> {
    name.parse().ok()
}

/// Script-language string to number: blank is 0, garbage is NaN
fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 = any, 1 = number, 2 = boolean, 3 = Base, 4 = Derived, 5 = string
    struct Types;

    impl TypeRelation for Types {
        fn is_assignable(&self, source: TyId, target: TyId) -> bool {
            source == target || (source.index() == 4 && target.index() == 3)
        }

        fn is_any(&self, ty: TyId) -> bool {
            ty.index() == 0
        }

        fn is_nullish(&self, _ty: TyId) -> bool {
            false
        }

        fn is_reference(&self, ty: TyId) -> bool {
            matches!(ty.index(), 3 | 4)
        }

        fn primitive_tag(&self, ty: TyId) -> Option<DynTag> {
            match ty.index() {
                1 => Some(DynTag::Number),
                2 => Some(DynTag::Boolean),
                5 => Some(DynTag::String),
                _ => None,
            }
        }
    }

    /// Host with one static object holding field `x`
    struct Host {
        x: f64,
    }

    impl ExtRefHost for Host {
        fn read_member(&mut self, _heap: &mut DynHeap, _extref: ExtRef, name: &str) -> Result<DynValue, DynError> {
            match name {
                "x" => Ok(DynValue::Number(self.x)),
                _ => Err(DynError::UnknownHostMember {
                    property: name.to_string(),
                }),
            }
        }

        fn write_member(&mut self, _heap: &mut DynHeap, _extref: ExtRef, name: &str, value: DynValue) -> Result<(), DynError> {
            match (name, value) {
                ("x", DynValue::Number(number)) => {
                    self.x = number;
                    Ok(())
                }
                _ => Err(DynError::UnknownHostMember {
                    property: name.to_string(),
                }),
            }
        }
    }

    fn ty(index: u32) -> TyId {
        TyId::from_index(index)
    }

    fn derived_instance(heap: &mut DynHeap) -> DynValue {
        heap.box_value(
            StaticValue::Ref {
                handle: HostHandle(7),
                kind: ExtRefKind::Object,
            },
            ty(4),
        )
    }

    #[test]
    fn test_primitive_boxing_round_trip() {
        let mut heap = DynHeap::new();
        let boxed = heap.box_value(StaticValue::Number(3.5), ty(1));
        assert_eq!(
            heap.unbox(&boxed, ty(1), &Types),
            Ok(Unboxed::Static(StaticValue::Number(3.5)))
        );
        let flag = heap.box_value(StaticValue::Boolean(true), ty(2));
        assert_eq!(
            heap.unbox(&flag, ty(2), &Types),
            Ok(Unboxed::Static(StaticValue::Boolean(true)))
        );
        let text = heap.box_value(StaticValue::String(Rc::from("hi")), ty(5));
        assert_eq!(
            heap.unbox(&text, ty(5), &Types),
            Ok(Unboxed::Static(StaticValue::String(Rc::from("hi"))))
        );
    }

    #[test]
    fn test_mismatched_narrowing_is_an_unbox_error() {
        let mut heap = DynHeap::new();
        let boxed = heap.box_value(StaticValue::Number(1.0), ty(1));
        let err = heap.unbox(&boxed, ty(2), &Types).unwrap_err();
        assert_eq!(err.found, DynTag::Number);
        assert_eq!(err.expected, ty(2));

        let object = heap.new_object();
        assert!(heap.unbox(&object, ty(3), &Types).is_err());
    }

    #[test]
    fn test_extref_narrowing_keeps_identity() {
        let mut heap = DynHeap::new();
        let boxed = derived_instance(&mut heap);
        let again = derived_instance(&mut heap);
        assert_eq!(boxed, again);
        assert_eq!(heap.extref_count(), 1);

        let as_base = heap.unbox(&boxed, ty(3), &Types).unwrap();
        let as_derived = heap.unbox(&boxed, ty(4), &Types).unwrap();
        assert_eq!(as_base, as_derived);
        assert!(heap.unbox(&boxed, ty(1), &Types).is_err());
    }

    #[test]
    fn test_extref_property_access_goes_through_host() {
        let mut heap = DynHeap::new();
        let mut host = Host { x: 1.0 };
        let boxed = derived_instance(&mut heap);
        heap.set_property(&mut host, &boxed, "x", DynValue::Number(5.0)).unwrap();
        assert_eq!(host.x, 5.0);
        assert_eq!(
            heap.get_property(&mut host, &boxed, "x").unwrap(),
            DynValue::Number(5.0)
        );
        assert!(heap.get_property(&mut host, &boxed, "y").is_err());
    }

    #[test]
    fn test_open_objects_and_proto_fallback() {
        let mut heap = DynHeap::new();
        let mut host = Host { x: 0.0 };
        let proto = heap.new_object();
        heap.set_property(&mut host, &proto, "greeting", DynValue::string("hi")).unwrap();
        let object = heap.new_object_with_proto(&proto).unwrap();

        assert_eq!(
            heap.get_property(&mut host, &object, "greeting").unwrap(),
            DynValue::string("hi")
        );
        assert_eq!(
            heap.get_property(&mut host, &object, "missing").unwrap(),
            DynValue::Undefined
        );
        assert!(heap.has_property(&object, "greeting"));
        assert!(!heap.delete_property(&object, "greeting"));
        assert!(heap.delete_property(&proto, "greeting"));
        assert!(!heap.has_property(&object, "greeting"));

        assert_eq!(heap.set_prototype(&proto, &object), Err(DynError::PrototypeCycle));
        assert_eq!(heap.get_prototype(&object).unwrap(), proto);
    }

    #[test]
    fn test_arrays_expose_length() {
        let mut heap = DynHeap::new();
        let mut host = Host { x: 0.0 };
        let array = heap.new_array(vec![DynValue::Number(1.0)]);
        heap.set_elem(&mut host, &array, &DynValue::Number(2.0), DynValue::Boolean(true))
            .unwrap();
        assert_eq!(
            heap.get_property(&mut host, &array, "length").unwrap(),
            DynValue::Number(3.0)
        );
        assert_eq!(
            heap.get_elem(&mut host, &array, &DynValue::Number(1.0)).unwrap(),
            DynValue::Undefined
        );
        assert_eq!(heap.to_display(&array), "1,,true");
    }

    #[test]
    fn test_huge_index_write_is_rejected() {
        let mut heap = DynHeap::new();
        let mut host = Host { x: 0.0 };
        let array = heap.new_array(vec![DynValue::Number(1.0)]);
        let error = heap
            .set_elem(&mut host, &array, &DynValue::Number(1e15), DynValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(error, DynError::IndexOutOfRange { limit: MAX_ARRAY_LENGTH, .. }), "{error:?}");
        assert_eq!(
            heap.get_property(&mut host, &array, "length").unwrap(),
            DynValue::Number(1.0)
        );
    }

    #[test]
    fn test_typeof_each_tag() {
        let mut heap = DynHeap::new();
        let closure = heap.box_value(
            StaticValue::Ref {
                handle: HostHandle(1),
                kind: ExtRefKind::Function,
            },
            ty(6),
        );
        let object = heap.new_object();
        let array = heap.new_array(Vec::new());
        let instance = derived_instance(&mut heap);
        let cases = [
            (DynValue::Number(1.0), "number"),
            (DynValue::Boolean(false), "boolean"),
            (DynValue::string("s"), "string"),
            (DynValue::Undefined, "undefined"),
            (DynValue::Null, "object"),
            (object, "object"),
            (array, "object"),
            (instance, "object"),
            (closure, "function"),
        ];
        for (value, expected) in cases {
            assert_eq!(heap.type_of(&value), expected, "{value:?}");
        }
    }

    #[test]
    fn test_instanceof_uses_static_type() {
        let mut heap = DynHeap::new();
        let instance = derived_instance(&mut heap);
        assert!(heap.instance_of(&instance, ty(3), &Types));
        assert!(heap.instance_of(&instance, ty(4), &Types));
        let object = heap.new_object();
        assert!(!heap.instance_of(&object, ty(3), &Types));
    }

    #[test]
    fn test_type_eq_compares_extref_kind() {
        let mut heap = DynHeap::new();
        let instance = derived_instance(&mut heap);
        let array = heap.box_value(
            StaticValue::Ref {
                handle: HostHandle(9),
                kind: ExtRefKind::Array,
            },
            ty(8),
        );
        assert!(heap.type_eq(&DynValue::Number(1.0), &DynValue::Number(2.0)));
        assert!(!heap.type_eq(&DynValue::Number(1.0), &DynValue::Null));
        assert!(!heap.type_eq(&instance, &array));
    }
}
