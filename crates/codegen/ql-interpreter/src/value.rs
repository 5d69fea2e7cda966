//! Runtime value representation

use ql_dyn::{number_to_string, DynValue};
use std::fmt;
use std::rc::Rc;

/// Index of an object in the interpreter's store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub usize);

/// Index of a static array in the interpreter's store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayRef(pub usize);

/// Index of a closure value in the interpreter's store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClosureRef(pub usize);

/// Index of an allocated closure context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextRef(pub usize);

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `undefined`, also the result of `void` functions
    Undefined,
    /// `null`
    Null,
    /// `number`
    Number(f64),
    /// `boolean`
    Bool(bool),
    /// `string`
    String(Rc<str>),
    /// Class instance or object literal
    Object(ObjectRef),
    /// Static array
    Array(ArrayRef),
    /// Function value
    Closure(ClosureRef),
    /// Class object, the receiver of static members
    Class(ql_ty::ClassTyId),
    /// Builtin namespace object
    Builtin,
    /// Closure context, only ever held by the context slot of a frame
    Context(ContextRef),
    /// Value of type `any`
    Dyn(DynValue),
}

impl Value {
    /// String value
    pub fn string(text: &str) -> Self {
        Self::String(Rc::from(text))
    }

    /// Get the value as a number, if possible
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the value as a boolean, if possible
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Get the dynamic payload, if the value has type `any`
    #[must_use]
    pub const fn as_dyn(&self) -> Option<&DynValue> {
        match self {
            Self::Dyn(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Number(value) => f.write_str(&number_to_string(*value)),
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(text) => f.write_str(text),
            Self::Object(_) | Self::Builtin => f.write_str("[object Object]"),
            Self::Array(array) => write!(f, "[array #{}]", array.0),
            Self::Closure(_) | Self::Class(_) => f.write_str("function"),
            Self::Context(context) => write!(f, "[context #{}]", context.0),
            Self::Dyn(value) => write!(f, "{value:?}"),
        }
    }
}
