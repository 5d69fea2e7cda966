//! Dynamic runtime errors

use crate::value::DynTag;
use ql_ty_id::TyId;
use thiserror::Error;

/// Narrowing a dynamic value to a static type failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot unbox a dynamic {found} as type #{}", expected.index())]
pub struct UnboxError {
    /// Tag of the dynamic value
    pub found: DynTag,
    /// Requested static type
    pub expected: TyId,
}

/// Errors raised by dynamic operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DynError {
    /// Failed narrowing
    #[error(transparent)]
    Unbox(#[from] UnboxError),

    /// Property access on a value that has no properties
    #[error("cannot read property `{property}` of {found}")]
    NotAnObject {
        /// Property name
        property: String,
        /// Tag of the receiver
        found: DynTag,
    },

    /// A prototype link would close a cycle
    #[error("prototype chain cycle")]
    PrototypeCycle,

    /// The static host has no member with this name
    #[error("static value has no member `{property}`")]
    UnknownHostMember {
        /// Property name
        property: String,
    },

    /// Element write past the largest supported array length
    #[error("array index {index} exceeds the maximum length {limit}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Maximum array length
        limit: usize,
    },

    /// Stale handle
    #[error("dangling dynamic handle")]
    Dangling,
}
