//! Type context: the interned type table plus class and interface data

use crate::class::ClassInfo;
use crate::interface::InterfaceInfo;
use crate::ty::{ClassTyId, InterfaceTyId, Primitive, TyKind, TyTable};
use ql_arena::Arena;
use ql_dyn::{DynTag, TypeRelation};
use ql_hir::{ClassDefId, InterfaceDefId};
use ql_intern::{Interner, Name};
use ql_ty_id::TyId;
use rustc_hash::FxHashMap;
use std::fmt::Write as _;

/// Every type of one compilation unit
#[derive(Debug, Clone, Default)]
pub struct TyContext {
    /// Interned types
    pub types: TyTable,
    /// Class data, including object literal shapes
    pub classes: Arena<ClassInfo>,
    /// Interface data, including builtin namespaces
    pub interfaces: Arena<InterfaceInfo>,
    /// Class type of each class declaration
    pub class_of_def: FxHashMap<ClassDefId, ClassTyId>,
    /// Interface type of each interface declaration
    pub interface_of_def: FxHashMap<InterfaceDefId, InterfaceTyId>,
    object_shapes: FxHashMap<Vec<(Name, TyId)>, ClassTyId>,
}

impl TyContext {
    /// Create a context holding only the primitives
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind of `ty`
    pub fn kind(&self, ty: TyId) -> &TyKind {
        self.types.kind(ty)
    }

    /// Allocate a class and intern its instance and static-side types
    pub fn alloc_class(&mut self, name: Name, def: Option<ClassDefId>) -> ClassTyId {
        let placeholder = TyTable::VOID;
        let id = self
            .classes
            .alloc(ClassInfo::new(name, def, placeholder, placeholder));
        let instance = self.types.intern(TyKind::Class(id));
        let object = self.types.intern(TyKind::ClassObject(id));
        let class = &mut self.classes[id];
        class.instance = instance;
        class.object = object;
        if let Some(def) = def {
            self.class_of_def.insert(def, id);
        }
        id
    }

    /// Allocate an interface and intern its type
    pub fn alloc_interface(&mut self, info: InterfaceInfo) -> (InterfaceTyId, TyId) {
        let def = info.def;
        let id = self.interfaces.alloc(info);
        if let Some(def) = def {
            self.interface_of_def.insert(def, id);
        }
        (id, self.types.intern(TyKind::Interface(id)))
    }

    /// Anonymous class of an object literal, shared by every literal with
    /// the same field names and types in the same order
    pub fn object_literal_class(&mut self, label: Name, fields: Vec<(Name, TyId)>) -> ClassTyId {
        if let Some(class) = self.object_shapes.get(&fields) {
            return *class;
        }
        let id = self.alloc_class(label, None);
        let class = &mut self.classes[id];
        class.fields = fields
            .iter()
            .map(|(name, ty)| crate::class::FieldInfo {
                name: *name,
                ty: *ty,
                readonly: false,
                declared_in: id,
            })
            .collect();
        class.laid_out = true;
        self.object_shapes.insert(fields, id);
        id
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub fn is_subclass(&self, class: ClassTyId, ancestor: ClassTyId) -> bool {
        let mut current = Some(class);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            // guards against cycles before layout has rejected them
            steps += 1;
            if steps > self.classes.len() {
                return false;
            }
            current = self.classes[id].base;
        }
        false
    }

    /// Whether `ty` is `any`
    pub fn is_any(&self, ty: TyId) -> bool {
        ty == TyTable::ANY
    }

    /// Render a type for diagnostics
    pub fn display(&self, ty: TyId, interner: &Interner) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty, interner, 0);
        out
    }

    fn write_type(&self, out: &mut String, ty: TyId, interner: &Interner, depth: usize) {
        if depth > 8 {
            out.push_str("...");
            return;
        }
        let name = |name: Name| interner.try_resolve(name).unwrap_or("?").to_string();
        match self.kind(ty) {
            TyKind::Primitive(primitive) => out.push_str(primitive.keyword()),
            TyKind::Class(class) => {
                let info = &self.classes[*class];
                if info.def.is_some() {
                    out.push_str(&name(info.name));
                } else {
                    out.push('{');
                    for (index, field) in info.fields.iter().enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{}: ", name(field.name));
                        self.write_type(out, field.ty, interner, depth + 1);
                    }
                    out.push('}');
                }
            }
            TyKind::ClassObject(class) => {
                let _ = write!(out, "typeof {}", name(self.classes[*class].name));
            }
            TyKind::Interface(interface) => out.push_str(&name(self.interfaces[*interface].name)),
            TyKind::Function {
                params,
                ret,
                variadic,
            } => {
                out.push('(');
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    if *variadic && index + 1 == params.len() {
                        out.push_str("...");
                    }
                    self.write_type(out, *param, interner, depth + 1);
                }
                out.push_str(") => ");
                self.write_type(out, *ret, interner, depth + 1);
            }
            TyKind::Array(element) => {
                let nested = matches!(self.kind(*element), TyKind::Function { .. });
                if nested {
                    out.push('(');
                }
                self.write_type(out, *element, interner, depth + 1);
                if nested {
                    out.push(')');
                }
                out.push_str("[]");
            }
            TyKind::Struct(fields) => {
                let _ = write!(out, "context<{}>", fields.len());
            }
        }
    }
}

impl TypeRelation for TyContext {
    fn is_assignable(&self, source: TyId, target: TyId) -> bool {
        Self::is_assignable(self, source, target)
    }

    fn is_any(&self, ty: TyId) -> bool {
        Self::is_any(self, ty)
    }

    fn is_nullish(&self, ty: TyId) -> bool {
        ty == TyTable::NULL || ty == TyTable::UNDEFINED
    }

    fn is_reference(&self, ty: TyId) -> bool {
        self.types.is_reference(ty)
    }

    fn primitive_tag(&self, ty: TyId) -> Option<DynTag> {
        Some(match self.types.primitive(ty)? {
            Primitive::Number => DynTag::Number,
            Primitive::String => DynTag::String,
            Primitive::Boolean => DynTag::Boolean,
            Primitive::Null => DynTag::Null,
            Primitive::Undefined | Primitive::Void => DynTag::Undefined,
            Primitive::Any => return None,
        })
    }
}
