//! Static objects, arrays, closures and contexts, and their extref view

use crate::value::{ArrayRef, ClosureRef, ContextRef, ObjectRef, Value};
use ql_dyn::{DynError, DynHeap, DynValue, ExtRef, ExtRefHost, ExtRefKind, HostHandle, StaticValue, Unboxed};
use ql_hir::FunctionId;
use ql_lower::{ClassPlan, IrType};
use ql_scope::ScopeTree;
use ql_ty::{ClassTyId, TyContext, TyTable};
use ql_ty_id::TyId;

/// An object laid out by its class plan
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// Runtime class, used for dispatch
    pub class: ClassTyId,
    /// Field values by field index
    pub fields: Vec<Value>,
}

/// A function value
#[derive(Debug, Clone, Copy)]
pub struct ClosureData {
    /// Function
    pub function: FunctionId,
    /// Context the function was created in
    pub env: Option<ContextRef>,
}

/// Storage of everything the static world allocates
#[derive(Debug, Default)]
pub struct Store {
    /// Objects
    pub objects: Vec<ObjectData>,
    /// Arrays
    pub arrays: Vec<Vec<Value>>,
    /// Function values
    pub closures: Vec<ClosureData>,
    /// Contexts; field 0 links to the parent context
    pub contexts: Vec<Vec<Value>>,
}

impl Store {
    /// Allocate an object of `class` with zeroed fields
    pub fn alloc_object(&mut self, class: &ClassPlan) -> ObjectRef {
        let fields = class.fields.iter().map(|field| zero(field.ty)).collect();
        self.objects.push(ObjectData {
            class: class.class,
            fields,
        });
        ObjectRef(self.objects.len() - 1)
    }

    /// Allocate an array
    pub fn alloc_array(&mut self, elements: Vec<Value>) -> ArrayRef {
        self.arrays.push(elements);
        ArrayRef(self.arrays.len() - 1)
    }

    /// Allocate a function value
    pub fn alloc_closure(&mut self, function: FunctionId, env: Option<ContextRef>) -> ClosureRef {
        self.closures.push(ClosureData { function, env });
        ClosureRef(self.closures.len() - 1)
    }

    /// Allocate a context with `fields` slots linked to `parent`
    pub fn alloc_context(&mut self, fields: &[IrType], parent: Option<ContextRef>) -> ContextRef {
        let mut values: Vec<Value> = fields.iter().map(|ty| zero(*ty)).collect();
        if let Some(link) = values.first_mut() {
            *link = parent.map_or(Value::Null, Value::Context);
        }
        self.contexts.push(values);
        ContextRef(self.contexts.len() - 1)
    }

    /// Parent of a context
    pub fn parent(&self, context: ContextRef) -> Option<ContextRef> {
        match self.contexts.get(context.0)?.first()? {
            Value::Context(parent) => Some(*parent),
            _ => None,
        }
    }
}

/// Initial value of a slot of storage type `ty`
pub const fn zero(ty: IrType) -> Value {
    match ty {
        IrType::F64 => Value::Number(0.0),
        IrType::I32 => Value::Bool(false),
        IrType::Ref => Value::Null,
        IrType::Dyn => Value::Dyn(DynValue::Undefined),
        IrType::Void => Value::Undefined,
    }
}

/// Handle under which a static value is boxed
pub fn handle_of(value: &Value) -> Option<(HostHandle, ExtRefKind)> {
    Some(match value {
        Value::Object(object) => (HostHandle(object.0 as u64), ExtRefKind::Object),
        Value::Array(array) => (HostHandle(array.0 as u64), ExtRefKind::Array),
        Value::Closure(closure) => (HostHandle(closure.0 as u64), ExtRefKind::Function),
        _ => return None,
    })
}

/// Static value behind a handle
pub fn value_of_handle(handle: HostHandle, kind: ExtRefKind) -> Value {
    let index = handle.0 as usize;
    match kind {
        ExtRefKind::Object | ExtRefKind::Interface => Value::Object(ObjectRef(index)),
        ExtRefKind::Array => Value::Array(ArrayRef(index)),
        ExtRefKind::Function => Value::Closure(ClosureRef(index)),
    }
}

/// Convert a value for boxing; `None` for values that have no dynamic form
pub fn to_static(value: &Value) -> Option<StaticValue> {
    Some(match value {
        Value::Undefined => StaticValue::Undefined,
        Value::Null => StaticValue::Null,
        Value::Number(number) => StaticValue::Number(*number),
        Value::Bool(flag) => StaticValue::Boolean(*flag),
        Value::String(text) => StaticValue::String(text.clone()),
        other => {
            let (handle, kind) = handle_of(other)?;
            StaticValue::Ref { handle, kind }
        }
    })
}

/// Convert the result of a narrowing back into a value
pub fn from_unboxed(unboxed: Unboxed) -> Value {
    match unboxed {
        Unboxed::Dynamic(value) => Value::Dyn(value),
        Unboxed::Static(StaticValue::Undefined) => Value::Undefined,
        Unboxed::Static(StaticValue::Null) => Value::Null,
        Unboxed::Static(StaticValue::Number(number)) => Value::Number(number),
        Unboxed::Static(StaticValue::Boolean(flag)) => Value::Bool(flag),
        Unboxed::Static(StaticValue::String(text)) => Value::String(text),
        Unboxed::Static(StaticValue::Ref { handle, kind }) => value_of_handle(handle, kind),
    }
}

/// Box `value` of static type `ty`; values already dynamic pass through
pub fn box_value(heap: &mut DynHeap, value: &Value, ty: TyId) -> Option<DynValue> {
    if let Value::Dyn(value) = value {
        return Some(value.clone());
    }
    Some(heap.box_value(to_static(value)?, ty))
}

/// [`ExtRefHost`] over the store
pub struct Host<'s> {
    /// Static storage
    pub store: &'s mut Store,
    /// Types
    pub ctx: &'s TyContext,
    /// Names
    pub scopes: &'s ScopeTree,
}

impl Host<'_> {
    fn field(&self, extref: ExtRef, name: &str) -> Result<(usize, usize, TyId), DynError> {
        let unknown = || DynError::UnknownHostMember {
            property: name.to_string(),
        };
        let Value::Object(object) = value_of_handle(extref.handle, extref.kind) else {
            return Err(unknown());
        };
        let data = self.store.objects.get(object.0).ok_or(DynError::Dangling)?;
        let info = &self.ctx.classes[data.class];
        let (index, field) = info
            .fields
            .iter()
            .enumerate()
            .rev()
            .find(|(_, field)| self.scopes.name(field.name) == name)
            .ok_or_else(unknown)?;
        Ok((object.0, index, field.ty))
    }
}

impl ExtRefHost for Host<'_> {
    fn read_member(&mut self, heap: &mut DynHeap, extref: ExtRef, name: &str) -> Result<DynValue, DynError> {
        if extref.kind == ExtRefKind::Array {
            let elements = self.store.arrays.get(extref.handle.0 as usize).ok_or(DynError::Dangling)?;
            if name == "length" {
                return Ok(DynValue::Number(elements.len() as f64));
            }
            let element_ty = self.ctx.types.element(extref.ty).unwrap_or(TyTable::ANY);
            let element = name
                .parse::<usize>()
                .ok()
                .and_then(|index| elements.get(index))
                .cloned()
                .unwrap_or(Value::Undefined);
            return box_value(heap, &element, element_ty).ok_or(DynError::UnknownHostMember {
                property: name.to_string(),
            });
        }
        let (object, index, ty) = self.field(extref, name)?;
        let value = self.store.objects[object].fields[index].clone();
        box_value(heap, &value, ty).ok_or(DynError::UnknownHostMember {
            property: name.to_string(),
        })
    }

    fn write_member(&mut self, heap: &mut DynHeap, extref: ExtRef, name: &str, value: DynValue) -> Result<(), DynError> {
        let (object, index, ty) = self.field(extref, name)?;
        let unboxed = heap.unbox(&value, ty, self.ctx)?;
        self.store.objects[object].fields[index] = from_unboxed(unboxed);
        Ok(())
    }
}
