//! Static types and type checking
//!
//! This crate handles:
//! - Type representation, interned per structure in a [`TyTable`]
//! - Class layouts: fields, vtables and per-class static slots
//! - Assignability: nominal for classes, structural for interfaces
//! - Checking every body and recording coercions into and out of `any`
#![allow(
    clippy::min_ident_chars,
    reason = "Ty and TyId are conventional names in type system implementations"
)]

pub mod assign;
pub mod builtins;
pub mod check;
pub mod class;
pub mod context;
pub mod error;
pub mod interface;
pub mod ty;

pub use builtins::{BuiltinFn, BuiltinMethod, BuiltinTable, BuiltinTy, BUILTINS};
pub use check::{check_program, CallTarget, CheckOptions, MemberAccess, TypeckResults};
pub use class::{ClassInfo, FieldInfo, FnSig, MethodSlot, StaticMethod, StaticSlot};
pub use context::TyContext;
pub use error::TypeError;
pub use interface::{InterfaceInfo, MemberShape};
pub use ty::{ClassTyId, InterfaceTyId, Primitive, TyKind, TyTable};
