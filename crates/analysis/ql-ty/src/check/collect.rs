//! Declaration pass: everything that has a type before any body is checked

use super::Checker;
use crate::builtins::{BuiltinMethod, BuiltinTy};
use crate::class::{FieldInfo, FnSig, MethodSlot, StaticMethod, StaticSlot};
use crate::error::TypeError;
use crate::interface::{InterfaceInfo, MemberShape};
use crate::ty::{ClassTyId, Primitive, TyKind, TyTable};
use ql_hir::visitor::{walk_stmt, Visitor};
use ql_hir::{
    DefId, ExprId, ExprKind, FieldDef, FunctionId, FunctionKind, InterfaceMemberKind, Literal, MethodKind,
    Program, ScopeId, StmtId, StmtKind, TypeExpr, TypeRef, UnaryOp,
};
use ql_span::FileSpan;
use ql_ty_id::TyId;
use tracing::{debug, trace};

/// Finds `return value` statements outside nested functions
#[derive(Default)]
struct ReturnFinder {
    found: bool,
}

impl Visitor for ReturnFinder {
    fn visit_stmt(&mut self, program: &Program, stmt: StmtId) {
        if let StmtKind::Return(Some(_)) = program.stmts[stmt].kind {
            self.found = true;
        }
        walk_stmt(self, program, stmt);
    }
}

impl Checker<'_> {
    pub(super) fn collect(&mut self) -> Result<(), TypeError> {
        self.register_builtins();
        self.declare_classes();
        self.declare_interfaces()?;
        self.resolve_variable_annotations()?;
        self.compute_signatures()?;
        self.layout_classes()?;
        debug!(
            classes = self.results.ctx.classes.len(),
            interfaces = self.results.ctx.interfaces.len(),
            signatures = self.results.signatures.len(),
            "declarations typed"
        );
        Ok(())
    }

    /// Resolve a written annotation
    pub(super) fn canonicalize(&mut self, ty: &TypeRef, span: FileSpan) -> Result<TyId, TypeError> {
        self.resolve_type_expr(&ty.syntax, ty.scope, span)
    }

    fn resolve_type_expr(&mut self, syntax: &TypeExpr, scope: ScopeId, span: FileSpan) -> Result<TyId, TypeError> {
        match syntax {
            TypeExpr::Named(name) => {
                if let Some(primitive) = Primitive::from_keyword(name) {
                    if primitive == Primitive::Any && self.options.disable_any {
                        return Err(Self::dynamic_disabled(span));
                    }
                    return Ok(self.results.ctx.types.intern(TyKind::Primitive(primitive)));
                }
                let unknown = || TypeError::UnknownType {
                    name: name.clone(),
                    span,
                };
                let key = self.scopes.interner.get(name).ok_or_else(unknown)?;
                let symbol = self.scopes.lookup(scope, key).ok_or_else(unknown)?;
                let ctx = &mut self.results.ctx;
                match self.program.def_of(symbol) {
                    Some(DefId::Class(def)) => {
                        let class = ctx.class_of_def.get(&def).copied().ok_or_else(unknown)?;
                        Ok(ctx.classes[class].instance)
                    }
                    Some(DefId::Interface(def)) => {
                        let interface = ctx.interface_of_def.get(&def).copied().ok_or_else(unknown)?;
                        Ok(ctx.types.intern(TyKind::Interface(interface)))
                    }
                    _ => Err(unknown()),
                }
            }
            TypeExpr::Array(element) => {
                let element = self.resolve_type_expr(element, scope, span)?;
                Ok(self.results.ctx.types.array(element))
            }
            TypeExpr::Function {
                params,
                ret,
                variadic,
            } => {
                let params = params
                    .iter()
                    .map(|param| self.resolve_type_expr(param, scope, span))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = self.resolve_type_expr(ret, scope, span)?;
                Ok(self.results.ctx.types.function(params, ret, *variadic))
            }
        }
    }

    // Builtins

    fn register_builtins(&mut self) {
        let Some(scope) = self.program.builtin_scope else {
            return;
        };
        let builtins = self.builtins;
        let symbols: Vec<_> = self.scopes.scope(scope).symbols().collect();
        for (name, symbol) in symbols {
            let Some((index, namespace)) = builtins.namespace(self.scopes.name(name)) else {
                continue;
            };
            let mut info = InterfaceInfo {
                name,
                def: None,
                members: Vec::with_capacity(namespace.methods.len()),
                builtin: Some(index),
            };
            for method in &namespace.methods {
                let sig = self.builtin_signature(method);
                let member = self.scopes.intern(method.name);
                info.members.push((member, MemberShape::Method(sig.ty)));
            }
            let (_, ty) = self.results.ctx.alloc_interface(info);
            self.scopes.set_type(symbol, ty);
            trace!(namespace = namespace.name, "registered builtin namespace");
        }
    }

    const fn builtin_ty(ty: BuiltinTy) -> TyId {
        match ty {
            BuiltinTy::Number => TyTable::NUMBER,
            BuiltinTy::String => TyTable::STRING,
            BuiltinTy::Boolean => TyTable::BOOLEAN,
            BuiltinTy::Any => TyTable::ANY,
            BuiltinTy::Void => TyTable::VOID,
        }
    }

    pub(super) fn builtin_signature(&mut self, method: &BuiltinMethod) -> FnSig {
        let mut params: Vec<TyId> = method.params.iter().map(|ty| Self::builtin_ty(*ty)).collect();
        let required = params.len();
        if let Some(rest) = method.rest {
            params.push(self.results.ctx.types.array(Self::builtin_ty(rest)));
        }
        let ret = Self::builtin_ty(method.ret);
        let variadic = method.rest.is_some();
        FnSig {
            ty: self.results.ctx.types.function(params.clone(), ret, variadic),
            params,
            ret,
            required,
            variadic,
        }
    }

    // Classes and interfaces

    fn declare_classes(&mut self) {
        for (def, class) in self.program.classes.iter() {
            let id = self.results.ctx.alloc_class(class.name, Some(def));
            let object = self.results.ctx.classes[id].object;
            self.results.ctx.classes[id].constructor = Some(class.constructor);
            self.scopes.set_type(class.symbol, object);
        }
    }

    fn declare_interfaces(&mut self) -> Result<(), TypeError> {
        let program = self.program;
        let mut ids = Vec::with_capacity(program.interfaces.len());
        for (def, interface) in program.interfaces.iter() {
            let (id, _) = self.results.ctx.alloc_interface(InterfaceInfo {
                name: interface.name,
                def: Some(def),
                members: Vec::new(),
                builtin: None,
            });
            ids.push((id, def));
        }
        for (id, def) in ids {
            let interface = &program.interfaces[def];
            let span = self.scopes.symbol(interface.symbol).span;
            for member in &interface.members {
                let resolve = |checker: &mut Self, ty: &TypeExpr| checker.resolve_type_expr(ty, interface.scope, span);
                let shape = match &member.kind {
                    InterfaceMemberKind::Field(ty) => MemberShape::Field(resolve(self, ty)?),
                    InterfaceMemberKind::Method { params, ret } => {
                        let params = params
                            .iter()
                            .map(|param| resolve(self, param))
                            .collect::<Result<Vec<_>, _>>()?;
                        let ret = resolve(self, ret)?;
                        MemberShape::Method(self.results.ctx.types.function(params, ret, false))
                    }
                    InterfaceMemberKind::Getter(ty) => MemberShape::Accessor {
                        getter: Some(resolve(self, ty)?),
                        setter: None,
                    },
                    InterfaceMemberKind::Setter(ty) => MemberShape::Accessor {
                        getter: None,
                        setter: Some(resolve(self, ty)?),
                    },
                };
                self.results.ctx.interfaces[id].push_member(member.name, shape);
            }
        }
        Ok(())
    }

    // Variables and functions

    fn resolve_variable_annotations(&mut self) -> Result<(), TypeError> {
        for (_, stmt) in self.program.stmts.iter() {
            if let StmtKind::Let {
                symbol,
                ty: Some(annotation),
                ..
            } = &stmt.kind
            {
                let ty = self.canonicalize(annotation, stmt.span)?;
                self.scopes.set_type(*symbol, ty);
            }
        }
        Ok(())
    }

    fn compute_signatures(&mut self) -> Result<(), TypeError> {
        let program = self.program;
        for (id, function) in program.functions.iter() {
            match function.kind {
                FunctionKind::Expression | FunctionKind::Arrow => continue,
                FunctionKind::Method {
                    class,
                    is_static: false,
                    ..
                }
                | FunctionKind::Constructor { class } => {
                    if let (Some(this), Some(class)) = (function.this_param, self.results.class_of_def(class)) {
                        let instance = self.results.ctx.classes[class].instance;
                        self.scopes.set_type(this, instance);
                    }
                }
                FunctionKind::Declaration | FunctionKind::Method { .. } => {}
            }

            let (params, required, variadic) = self.param_types(id, None)?;
            let ret = match (function.kind, &function.ret) {
                (FunctionKind::Constructor { .. }, _)
                | (
                    FunctionKind::Method {
                        kind: MethodKind::Setter,
                        ..
                    },
                    None,
                ) => TyTable::VOID,
                (_, Some(ret)) => self.canonicalize(ret, function.span)?,
                (_, None) => {
                    let mut finder = ReturnFinder::default();
                    for stmt in &function.body {
                        finder.visit_stmt(program, *stmt);
                    }
                    if finder.found {
                        self.unannotated(function.span)?
                    } else {
                        TyTable::VOID
                    }
                }
            };
            let sig = FnSig {
                ty: self.results.ctx.types.function(params.clone(), ret, variadic),
                params,
                ret,
                required,
                variadic,
            };
            if let Some(symbol) = function.symbol {
                self.scopes.set_type(symbol, sig.ty);
            }
            self.results.signatures.insert(id, sig);
        }
        Ok(())
    }

    /// Type given to an unannotated slot
    pub(super) fn unannotated(&self, span: FileSpan) -> Result<TyId, TypeError> {
        if self.options.disable_any {
            return Err(Self::dynamic_disabled(span));
        }
        Ok(TyTable::ANY)
    }

    /// Parameter types of `function`, also written to the parameter symbols
    ///
    /// Unannotated parameters take the matching type of `expected` when one
    /// is given, `any` otherwise.
    pub(super) fn param_types(
        &mut self,
        function: FunctionId,
        expected: Option<&[TyId]>,
    ) -> Result<(Vec<TyId>, usize, bool), TypeError> {
        let def = &self.program.functions[function];
        let mut params = Vec::with_capacity(def.params.len());
        for (position, param) in def.params.iter().enumerate() {
            let ty = match (&param.ty, expected.and_then(|types| types.get(position))) {
                (Some(annotation), _) => self.canonicalize(annotation, def.span)?,
                (None, Some(ty)) => *ty,
                (None, None) if param.rest => {
                    let element = self.unannotated(def.span)?;
                    self.results.ctx.types.array(element)
                }
                (None, None) => self.unannotated(def.span)?,
            };
            if param.rest && self.results.ctx.types.element(ty).is_none() {
                return Err(TypeError::TypeMismatch {
                    expected: "an array type".to_string(),
                    found: self.display(ty),
                    span: def.span,
                });
            }
            self.scopes.set_type(param.symbol, ty);
            params.push(ty);
        }
        let required = def
            .params
            .iter()
            .take_while(|param| param.default.is_none() && !param.rest)
            .count();
        let variadic = def.params.last().is_some_and(|param| param.rest);
        Ok((params, required, variadic))
    }

    // Class layout

    fn layout_classes(&mut self) -> Result<(), TypeError> {
        let classes: Vec<ClassTyId> = self
            .program
            .classes
            .iter()
            .filter_map(|(def, _)| self.results.class_of_def(def))
            .collect();
        for class in classes {
            self.layout_class(class, &mut Vec::new())?;
        }
        Ok(())
    }

    fn layout_class(&mut self, class: ClassTyId, visiting: &mut Vec<ClassTyId>) -> Result<(), TypeError> {
        let program = self.program;
        let ctx = &self.results.ctx;
        if ctx.classes[class].laid_out {
            return Ok(());
        }
        let Some(def_id) = ctx.classes[class].def else {
            return Ok(());
        };
        let def = &program.classes[def_id];
        if visiting.contains(&class) {
            return Err(TypeError::InheritanceCycle {
                class: self.name(def.name),
                span: def.span,
            });
        }
        visiting.push(class);

        let base = match def.base {
            Some(symbol) => {
                let base = program
                    .class_of_symbol(symbol)
                    .and_then(|base| ctx.class_of_def.get(&base).copied())
                    .ok_or_else(|| TypeError::UnknownType {
                        name: self.scopes.symbol_name(symbol).to_string(),
                        span: def.span,
                    })?;
                self.layout_class(base, visiting)?;
                Some(base)
            }
            None => None,
        };

        let mut info = self.results.ctx.classes[class].clone();
        info.base = base;
        if let Some(base) = base {
            let parent = &self.results.ctx.classes[base];
            info.fields = parent.fields.clone();
            info.vtable = parent.vtable.clone();
        }

        for field in &def.fields {
            let ty = self.field_type(field)?;
            info.fields.push(FieldInfo {
                name: field.name,
                ty,
                readonly: field.readonly,
                declared_in: class,
            });
        }

        for method in &def.methods {
            let function = &program.functions[*method];
            let FunctionKind::Method { kind, .. } = function.kind else {
                continue;
            };
            let sig = self.signature_ty(*method);
            let slot = info.assign_slot(MethodSlot {
                name: function.name,
                kind,
                sig,
                implementation: *method,
                declared_in: class,
            });
            trace!(method = self.scopes.name(function.name), slot, "assigned vtable slot");
        }

        info.statics.clear();
        for (index, field) in def.statics.iter().enumerate() {
            let ty = self.field_type(field)?;
            info.statics.push(StaticSlot {
                name: field.name,
                ty,
                readonly: field.readonly,
                declared_in: class,
                field: index,
            });
        }
        info.static_methods = def
            .static_methods
            .iter()
            .map(|function| StaticMethod {
                name: program.functions[*function].name,
                function: *function,
                declared_in: class,
            })
            .collect();
        if let Some(base) = base {
            let parent = &self.results.ctx.classes[base];
            for slot in &parent.statics {
                if info.static_slot(slot.name).is_none() {
                    info.statics.push(slot.clone());
                }
            }
            for method in &parent.static_methods {
                if info.static_method(method.name).is_none() {
                    info.static_methods.push(method.clone());
                }
            }
        }

        info.ctor = match (def.synthesized_constructor, base) {
            (true, Some(base)) => self.results.ctx.classes[base].ctor.clone(),
            _ => self.results.signatures.get(&def.constructor).cloned(),
        };
        info.laid_out = true;
        debug!(
            class = self.scopes.name(def.name),
            fields = info.fields.len(),
            slots = info.vtable.len(),
            statics = info.statics.len(),
            "laid out class"
        );
        self.results.ctx.classes[class] = info;
        visiting.pop();
        Ok(())
    }

    fn signature_ty(&self, function: FunctionId) -> TyId {
        self.results
            .signatures
            .get(&function)
            .map_or(TyTable::ANY, |sig| sig.ty)
    }

    /// Annotation, or a type read off a literal initializer, or `any`
    fn field_type(&mut self, field: &FieldDef) -> Result<TyId, TypeError> {
        if let Some(annotation) = &field.ty {
            return self.canonicalize(annotation, field.span);
        }
        match field.init.and_then(|init| self.literal_type(init)) {
            Some(ty) => Ok(ty),
            None => self.unannotated(field.span),
        }
    }

    fn literal_type(&mut self, expr: ExprId) -> Option<TyId> {
        let program = self.program;
        match &program.exprs[expr].kind {
            ExprKind::Literal(Literal::Number(_)) => Some(TyTable::NUMBER),
            ExprKind::Literal(Literal::String(_)) => Some(TyTable::STRING),
            ExprKind::Literal(Literal::Bool(_)) => Some(TyTable::BOOLEAN),
            ExprKind::Unary {
                op: UnaryOp::Neg | UnaryOp::Plus,
                operand,
            } => (self.literal_type(*operand)? == TyTable::NUMBER).then_some(TyTable::NUMBER),
            ExprKind::Unary {
                op: UnaryOp::Not, ..
            } => Some(TyTable::BOOLEAN),
            ExprKind::New { class, .. } => {
                let def = program.class_of_symbol(*class)?;
                let class = self.results.class_of_def(def)?;
                Some(self.results.ctx.classes[class].instance)
            }
            ExprKind::Array(elements) => {
                let first = self.literal_type(*elements.first()?)?;
                for element in &elements[1..] {
                    if self.literal_type(*element)? != first {
                        return None;
                    }
                }
                Some(self.results.ctx.types.array(first))
            }
            _ => None,
        }
    }
}
