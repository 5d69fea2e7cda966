//! Dynamic (`any`) value model
//!
//! Values typed `any` live in a [`DynHeap`] as tagged [`DynValue`]s. Dynamic
//! objects are open property bags with a single prototype link. Statically
//! typed objects, arrays and closures cross into the dynamic world as
//! `extref` handles: the heap remembers the handle together with its static
//! type, so narrowing back with `as T` returns the very same object.
//!
//! The static type system is reached through the [`TypeRelation`] trait and
//! static object storage through [`ExtRefHost`]; this crate depends on
//! neither.

pub mod abi;
pub mod error;
pub mod heap;
pub mod ops;
pub mod relation;
pub mod value;

pub use abi::{AbiType, DynOp};
pub use error::{DynError, UnboxError};
pub use heap::{DynHeap, ExtRefHost, Unboxed, MAX_ARRAY_LENGTH};
pub use ops::{ArithOp, CompareOp};
pub use relation::{decide_coercion, Coercion, TypeRelation};
pub use value::{
    number_to_string, ArrayId, DynTag, DynValue, ExtRef, ExtRefId, ExtRefKind, HostHandle,
    ObjectId, StaticValue,
};
