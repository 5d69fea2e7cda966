//! Type representation and the interning table

use crate::class::ClassInfo;
use crate::interface::InterfaceInfo;
use ql_arena::Idx;
use ql_ty_id::TyId;
use rustc_hash::FxHashMap;

/// Class type ID (user classes and object literal shapes)
pub type ClassTyId = Idx<ClassInfo>;
/// Interface type ID (user interfaces and builtin namespaces)
pub type InterfaceTyId = Idx<InterfaceInfo>;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `number`
    Number,
    /// `string`
    String,
    /// `boolean`
    Boolean,
    /// `any`
    Any,
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `void`
    Void,
}

impl Primitive {
    /// Primitive named by a type keyword
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "number" => Self::Number,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "any" => Self::Any,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            "void" => Self::Void,
            _ => return None,
        })
    }

    /// Type keyword
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Any => "any",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Void => "void",
        }
    }
}

/// Kind of type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TyKind {
    /// Primitive type
    Primitive(Primitive),
    /// Instance of a class
    Class(ClassTyId),
    /// The class itself used as a value (its static side)
    ClassObject(ClassTyId),
    /// Interface
    Interface(InterfaceTyId),
    /// Function type
    Function {
        /// Parameter types; a variadic function ends in an array type
        params: Vec<TyId>,
        /// Return type
        ret: TyId,
        /// Last parameter collects the remaining arguments
        variadic: bool,
    },
    /// Array type
    Array(TyId),
    /// Closure context layout: parent context, then captured cells
    Struct(Vec<TyId>),
}

/// Interning table; structurally identical kinds share one `TyId`
#[derive(Debug, Clone)]
pub struct TyTable {
    kinds: Vec<TyKind>,
    ids: FxHashMap<TyKind, TyId>,
}

impl TyTable {
    /// `number`
    pub const NUMBER: TyId = TyId::from_index(0);
    /// `string`
    pub const STRING: TyId = TyId::from_index(1);
    /// `boolean`
    pub const BOOLEAN: TyId = TyId::from_index(2);
    /// `any`
    pub const ANY: TyId = TyId::from_index(3);
    /// `null`
    pub const NULL: TyId = TyId::from_index(4);
    /// `undefined`
    pub const UNDEFINED: TyId = TyId::from_index(5);
    /// `void`
    pub const VOID: TyId = TyId::from_index(6);

    /// Create a table holding the primitives at their fixed ids
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            kinds: Vec::new(),
            ids: FxHashMap::default(),
        };
        for primitive in [
            Primitive::Number,
            Primitive::String,
            Primitive::Boolean,
            Primitive::Any,
            Primitive::Null,
            Primitive::Undefined,
            Primitive::Void,
        ] {
            table.intern(TyKind::Primitive(primitive));
        }
        table
    }

    /// Intern a type kind
    pub fn intern(&mut self, kind: TyKind) -> TyId {
        if let Some(id) = self.ids.get(&kind) {
            return *id;
        }
        let id = TyId::from_index(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.ids.insert(kind, id);
        id
    }

    /// Kind of an interned type
    pub fn kind(&self, id: TyId) -> &TyKind {
        &self.kinds[id.index()]
    }

    /// Number of distinct types
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false: the primitives are interned up front
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// `element[]`
    pub fn array(&mut self, element: TyId) -> TyId {
        self.intern(TyKind::Array(element))
    }

    /// Function type
    pub fn function(&mut self, params: Vec<TyId>, ret: TyId, variadic: bool) -> TyId {
        self.intern(TyKind::Function {
            params,
            ret,
            variadic,
        })
    }

    /// Primitive of `id`, if it is one
    pub fn primitive(&self, id: TyId) -> Option<Primitive> {
        match self.kind(id) {
            TyKind::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }

    /// Element type of an array type
    pub fn element(&self, id: TyId) -> Option<TyId> {
        match self.kind(id) {
            TyKind::Array(element) => Some(*element),
            _ => None,
        }
    }

    /// Class of an instance type
    pub fn class(&self, id: TyId) -> Option<ClassTyId> {
        match self.kind(id) {
            TyKind::Class(class) => Some(*class),
            _ => None,
        }
    }

    /// Whether values of `id` are heap references
    pub fn is_reference(&self, id: TyId) -> bool {
        matches!(
            self.kind(id),
            TyKind::Class(_) | TyKind::ClassObject(_) | TyKind::Interface(_) | TyKind::Function { .. } | TyKind::Array(_)
        )
    }
}

impl Default for TyTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_have_fixed_ids() {
        let table = TyTable::new();
        assert_eq!(table.primitive(TyTable::NUMBER), Some(Primitive::Number));
        assert_eq!(table.primitive(TyTable::VOID), Some(Primitive::Void));
        assert_eq!(table.len(), 7);
    }

    #[test]
    fn test_structural_dedup() {
        let mut table = TyTable::new();
        let first = table.function(vec![TyTable::NUMBER], TyTable::STRING, false);
        let second = table.function(vec![TyTable::NUMBER], TyTable::STRING, false);
        let variadic = table.function(vec![TyTable::NUMBER], TyTable::STRING, true);
        assert_eq!(first, second);
        assert_ne!(first, variadic);
        assert_eq!(table.array(TyTable::BOOLEAN), table.array(TyTable::BOOLEAN));
    }
}
