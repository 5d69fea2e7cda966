//! Tagged dynamic values

use ql_ty_id::TyId;
use std::fmt;
use std::rc::Rc;

/// Dynamic object handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

/// Dynamic array handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(pub u32);

/// Index into the extref table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtRefId(pub u32);

/// Opaque handle to a value owned by the static world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u64);

/// What kind of static value an extref points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtRefKind {
    /// Class instance or object literal
    Object,
    /// Closure
    Function,
    /// Value seen through an interface type
    Interface,
    /// Static array
    Array,
}

/// Entry of the extref table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtRef {
    /// Handle of the static value
    pub handle: HostHandle,
    /// Static type the value had when it was boxed
    pub ty: TyId,
    /// Kind of the static value
    pub kind: ExtRefKind,
}

/// Runtime tag of a dynamic value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynTag {
    /// IEEE double
    Number,
    /// `true` / `false`
    Boolean,
    /// Immutable string
    String,
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Open dynamic object
    Object,
    /// Dynamic array
    Array,
    /// Closure reached through an extref
    Function,
    /// Static object or array reached through an extref
    ExtRef,
}

impl DynTag {
    /// Lowercase name used in diagnostics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Object => "object",
            Self::Array => "array",
            Self::Function => "function",
            Self::ExtRef => "extref",
        }
    }
}

impl fmt::Display for DynTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value of type `any`
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Number
    Number(f64),
    /// Boolean
    Boolean(bool),
    /// String
    String(Rc<str>),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Dynamic object
    Object(ObjectId),
    /// Dynamic array
    Array(ArrayId),
    /// Static value
    ExtRef(ExtRefId),
}

impl DynValue {
    /// String value
    pub fn string(text: &str) -> Self {
        Self::String(Rc::from(text))
    }

    /// Payload of a number value
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// A statically typed value handed to [`crate::DynHeap::box_value`]
#[derive(Debug, Clone, PartialEq)]
pub enum StaticValue {
    /// `number`
    Number(f64),
    /// `boolean`
    Boolean(bool),
    /// `string`
    String(Rc<str>),
    /// `null`
    Null,
    /// `undefined` or `void`
    Undefined,
    /// Object, array or closure owned by the static world
    Ref {
        /// Host handle
        handle: HostHandle,
        /// Kind of the referenced value
        kind: ExtRefKind,
    },
}

/// Format a number the way the script language prints it
///
/// Magnitudes in `[1e-6, 1e21)` print as plain decimals, everything else
/// in exponent form with an explicit sign; `NaN` and the infinities print
/// by name.
#[must_use]
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&value.abs()) {
        return format!("{value}");
    }
    let text = format!("{value:e}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
        _ => text,
    }
}
