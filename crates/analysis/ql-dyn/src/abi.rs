//! Runtime imports backing dynamic operations

/// Value types of the runtime ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiType {
    /// Reference to a dynamic value or the dynamic context
    Ref,
    /// 32-bit integer: booleans, string pointers, handles
    I32,
    /// Double
    F64,
}

/// One imported dynamic-runtime function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynOp {
    /// Create the dynamic context
    ContextInit,
    /// Box a number
    NewNumber,
    /// Box a boolean
    NewBoolean,
    /// Box a string from a data pointer
    NewString,
    /// `undefined`
    NewUndefined,
    /// `null`
    NewNull,
    /// `{}`
    NewObject,
    /// `{}` with a prototype
    NewObjectWithProto,
    /// `[]`
    NewArray,
    /// Wrap a static reference
    NewExtRef,
    /// Property write
    SetProperty,
    /// Property read
    GetProperty,
    /// `in`-style check
    HasProperty,
    /// `delete`
    DeleteProperty,
    /// Element read
    GetElem,
    /// Element write
    SetElem,
    /// Tag test for `undefined`
    IsUndefined,
    /// Tag test for `null`
    IsNull,
    /// Tag test for booleans
    IsBool,
    /// Tag test for numbers
    IsNumber,
    /// Tag test for strings
    IsString,
    /// Tag test for objects
    IsObject,
    /// Tag test for arrays
    IsArray,
    /// Tag test for extrefs
    IsExtRef,
    /// Unbox a boolean
    ToBool,
    /// Unbox a number
    ToNumber,
    /// Unbox a string
    ToCString,
    /// Unbox an extref handle
    ToExtRef,
    /// `typeof`
    TypeOf,
    /// Tag equality
    TypeEq,
    /// `instanceof` against a static class
    InstanceOf,
    /// Read the prototype link
    GetPrototype,
    /// Replace the prototype link
    SetPrototype,
}

impl DynOp {
    /// Every operation, in declaration order
    pub const ALL: [Self; 33] = [
        Self::ContextInit,
        Self::NewNumber,
        Self::NewBoolean,
        Self::NewString,
        Self::NewUndefined,
        Self::NewNull,
        Self::NewObject,
        Self::NewObjectWithProto,
        Self::NewArray,
        Self::NewExtRef,
        Self::SetProperty,
        Self::GetProperty,
        Self::HasProperty,
        Self::DeleteProperty,
        Self::GetElem,
        Self::SetElem,
        Self::IsUndefined,
        Self::IsNull,
        Self::IsBool,
        Self::IsNumber,
        Self::IsString,
        Self::IsObject,
        Self::IsArray,
        Self::IsExtRef,
        Self::ToBool,
        Self::ToNumber,
        Self::ToCString,
        Self::ToExtRef,
        Self::TypeOf,
        Self::TypeEq,
        Self::InstanceOf,
        Self::GetPrototype,
        Self::SetPrototype,
    ];

    /// Import name of the runtime function
    #[must_use]
    pub const fn import_name(self) -> &'static str {
        match self {
            Self::ContextInit => "dyntype_context_init",
            Self::NewNumber => "dyntype_new_number",
            Self::NewBoolean => "dyntype_new_boolean",
            Self::NewString => "dyntype_new_string",
            Self::NewUndefined => "dyntype_new_undefined",
            Self::NewNull => "dyntype_new_null",
            Self::NewObject => "dyntype_new_object",
            Self::NewObjectWithProto => "dyntype_new_object_with_proto",
            Self::NewArray => "dyntype_new_array",
            Self::NewExtRef => "dyntype_new_extref",
            Self::SetProperty => "dyntype_set_property",
            Self::GetProperty => "dyntype_get_property",
            Self::HasProperty => "dyntype_has_property",
            Self::DeleteProperty => "dyntype_delete_property",
            Self::GetElem => "dyntype_get_elem",
            Self::SetElem => "dyntype_set_elem",
            Self::IsUndefined => "dyntype_is_undefined",
            Self::IsNull => "dyntype_is_null",
            Self::IsBool => "dyntype_is_bool",
            Self::IsNumber => "dyntype_is_number",
            Self::IsString => "dyntype_is_string",
            Self::IsObject => "dyntype_is_object",
            Self::IsArray => "dyntype_is_array",
            Self::IsExtRef => "dyntype_is_extref",
            Self::ToBool => "dyntype_to_bool",
            Self::ToNumber => "dyntype_to_number",
            Self::ToCString => "dyntype_to_cstring",
            Self::ToExtRef => "dyntype_to_extref",
            Self::TypeOf => "dyntype_typeof",
            Self::TypeEq => "dyntype_type_eq",
            Self::InstanceOf => "dyntype_instanceof",
            Self::GetPrototype => "dyntype_get_prototype",
            Self::SetPrototype => "dyntype_set_prototype",
        }
    }

    /// Parameter types; the dynamic context comes first except for `ContextInit`
    #[must_use]
    pub const fn params(self) -> &'static [AbiType] {
        use AbiType::{I32, Ref, F64};
        match self {
            Self::ContextInit => &[],
            Self::NewNumber => &[Ref, F64],
            Self::NewBoolean | Self::NewString => &[Ref, I32],
            Self::NewUndefined | Self::NewNull | Self::NewObject | Self::NewArray => &[Ref],
            Self::NewObjectWithProto
            | Self::IsUndefined
            | Self::IsNull
            | Self::IsBool
            | Self::IsNumber
            | Self::IsString
            | Self::IsObject
            | Self::IsArray
            | Self::IsExtRef
            | Self::ToBool
            | Self::ToNumber
            | Self::ToCString
            | Self::ToExtRef
            | Self::TypeOf
            | Self::GetPrototype => &[Ref, Ref],
            Self::NewExtRef => &[Ref, I32, I32],
            Self::SetProperty | Self::SetElem => &[Ref, Ref, I32, Ref],
            Self::GetProperty | Self::HasProperty | Self::DeleteProperty | Self::GetElem | Self::InstanceOf => {
                &[Ref, Ref, I32]
            }
            Self::TypeEq | Self::SetPrototype => &[Ref, Ref, Ref],
        }
    }

    /// Result type
    #[must_use]
    pub const fn result(self) -> AbiType {
        match self {
            Self::ToNumber => AbiType::F64,
            Self::SetProperty
            | Self::SetElem
            | Self::HasProperty
            | Self::DeleteProperty
            | Self::IsUndefined
            | Self::IsNull
            | Self::IsBool
            | Self::IsNumber
            | Self::IsString
            | Self::IsObject
            | Self::IsArray
            | Self::IsExtRef
            | Self::ToBool
            | Self::ToCString
            | Self::ToExtRef
            | Self::TypeEq
            | Self::InstanceOf
            | Self::SetPrototype => AbiType::I32,
            _ => AbiType::Ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_import_names_are_unique() {
        let names: FxHashSet<_> = DynOp::ALL.iter().map(|op| op.import_name()).collect();
        assert_eq!(names.len(), DynOp::ALL.len());
        assert!(names.iter().all(|name| name.starts_with("dyntype_")));
        assert_eq!(DynOp::NewNumber.params(), &[AbiType::Ref, AbiType::F64]);
    }
}
