//! Expressions, member resolution and assignment targets

use super::{Checker, MemberAccess};
use crate::error::TypeError;
use crate::interface::MemberShape;
use crate::ty::{ClassTyId, Primitive, TyKind, TyTable};
use ql_dyn::{decide_coercion, Coercion};
use ql_hir::{BinaryOp, ExprId, ExprKind, Literal, MethodKind, SymbolId, TypeRef, UnaryOp};
use ql_intern::Name;
use ql_scope::DeclKind;
use ql_span::FileSpan;
use ql_ty_id::TyId;

impl Checker<'_> {
    /// Check an expression and record its type
    pub(super) fn check_expr(&mut self, expr: ExprId) -> Result<TyId, TypeError> {
        self.check_expr_with(expr, None)
    }

    /// Check an expression flowing into a slot of type `target`
    pub(super) fn check_expr_expecting(&mut self, expr: ExprId, target: TyId) -> Result<TyId, TypeError> {
        let ty = self.check_expr_with(expr, Some(target))?;
        self.coerce(expr, ty, target)?;
        Ok(ty)
    }

    fn check_expr_with(&mut self, expr: ExprId, expected: Option<TyId>) -> Result<TyId, TypeError> {
        let ty = self.infer_expr(expr, expected)?;
        self.results.expr_types.insert(expr, ty);
        Ok(ty)
    }

    fn infer_expr(&mut self, expr: ExprId, expected: Option<TyId>) -> Result<TyId, TypeError> {
        let program = self.program;
        let span = program.exprs[expr].span;
        match &program.exprs[expr].kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Number(_) => TyTable::NUMBER,
                Literal::String(_) => TyTable::STRING,
                Literal::Bool(_) => TyTable::BOOLEAN,
                Literal::Null => TyTable::NULL,
                Literal::Undefined => TyTable::UNDEFINED,
            }),
            ExprKind::Var(symbol) | ExprKind::This(symbol) => self.symbol_type(*symbol, span),
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.check_expr(*lhs)?;
                let right = self.check_expr(*rhs)?;
                self.binary_result(*op, (*lhs, left), (*rhs, right), span)
            }
            ExprKind::Unary { op, operand } => self.check_unary(*op, *operand, span),
            ExprKind::Assign { op, target, value } => self.check_assign(*op, *target, *value, span),
            ExprKind::Update { target, .. } => {
                let ty = self.check_place(*target)?;
                if ty != TyTable::NUMBER && ty != TyTable::ANY {
                    return Err(self.mismatch(TyTable::NUMBER, ty, span));
                }
                Ok(ty)
            }
            ExprKind::Call { callee, args } => self.check_call(expr, *callee, args, span),
            ExprKind::SuperCall { this, args } => self.check_super_call(expr, *this, args, span),
            ExprKind::SuperMember { .. } => Err(TypeError::Unimplemented {
                feature: "`super` member outside a call".to_string(),
                span,
            }),
            ExprKind::New { class, args } => self.check_new(*class, args, span),
            ExprKind::Member { object, name } => {
                let object_ty = self.check_expr(*object)?;
                let (access, ty) = self.resolve_member(object_ty, *name, span, false)?;
                self.results.members.insert(expr, access);
                Ok(ty)
            }
            ExprKind::Index { object, index } => self.check_index(*object, *index, span),
            ExprKind::Array(elements) => self.check_array(elements, expected),
            ExprKind::Object(fields) => self.check_object(fields),
            ExprKind::Closure(function) => Ok(self.check_function(*function, expected)?.ty),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.check_expr(*cond)?;
                let then_ty = self.check_expr_with(*then, expected)?;
                let otherwise_ty = self.check_expr_with(*otherwise, expected)?;
                self.join(&[(*then, then_ty), (*otherwise, otherwise_ty)])
            }
            ExprKind::As { expr: inner, ty } => self.check_as(*inner, ty, span),
            ExprKind::InstanceOf { expr: inner, .. } => {
                let ty = self.check_expr(*inner)?;
                if ty != TyTable::ANY && !matches!(self.ctx().kind(ty), TyKind::Class(_) | TyKind::Interface(_)) {
                    return Err(TypeError::TypeMismatch {
                        expected: "an object".to_string(),
                        found: self.display(ty),
                        span,
                    });
                }
                Ok(TyTable::BOOLEAN)
            }
        }
    }

    /// Type of a symbol read
    ///
    /// A variable read before its declaration has been checked becomes `any`
    /// for good; its initializer is then boxed.
    pub(super) fn symbol_type(&mut self, symbol: SymbolId, span: FileSpan) -> Result<TyId, TypeError> {
        let data = self.scopes.symbol(symbol);
        let (kind, name) = (data.kind, data.name);
        if let Some(ty) = data.ty {
            return Ok(ty);
        }
        match kind {
            DeclKind::Namespace(_) | DeclKind::Interface => Err(TypeError::Unimplemented {
                feature: format!("`{}` used as a value", self.name(name)),
                span,
            }),
            _ => {
                let ty = self.unannotated(span)?;
                self.scopes.set_type(symbol, ty);
                Ok(ty)
            }
        }
    }

    /// Result type of a binary operator over checked operands
    pub(super) fn binary_result(
        &mut self,
        op: BinaryOp,
        (lhs, left): (ExprId, TyId),
        (rhs, right): (ExprId, TyId),
        span: FileSpan,
    ) -> Result<TyId, TypeError> {
        if op.is_logical() {
            return self.join(&[(lhs, left), (rhs, right)]);
        }
        if left == TyTable::ANY || right == TyTable::ANY {
            self.box_operand(lhs, left)?;
            self.box_operand(rhs, right)?;
            return Ok(if op.is_comparison() {
                TyTable::BOOLEAN
            } else {
                TyTable::ANY
            });
        }
        let operands = (left, right);
        let fail = |checker: &Self| {
            let found = if left == TyTable::NUMBER { right } else { left };
            Err(checker.mismatch(TyTable::NUMBER, found, span))
        };
        match op {
            BinaryOp::Add => match operands {
                (TyTable::NUMBER, TyTable::NUMBER) => Ok(TyTable::NUMBER),
                (TyTable::STRING, TyTable::STRING | TyTable::NUMBER | TyTable::BOOLEAN)
                | (TyTable::NUMBER | TyTable::BOOLEAN, TyTable::STRING) => Ok(TyTable::STRING),
                _ => fail(self),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => match operands {
                (TyTable::NUMBER, TyTable::NUMBER) => Ok(TyTable::NUMBER),
                _ => fail(self),
            },
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => match operands {
                (TyTable::NUMBER, TyTable::NUMBER) | (TyTable::STRING, TyTable::STRING) => Ok(TyTable::BOOLEAN),
                _ => fail(self),
            },
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => Ok(TyTable::BOOLEAN),
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: ExprId, span: FileSpan) -> Result<TyId, TypeError> {
        let ty = self.check_expr(operand)?;
        match op {
            UnaryOp::Neg | UnaryOp::Plus => match ty {
                TyTable::NUMBER | TyTable::ANY => Ok(ty),
                _ => Err(self.mismatch(TyTable::NUMBER, ty, span)),
            },
            UnaryOp::Not => Ok(TyTable::BOOLEAN),
            UnaryOp::TypeOf => Ok(TyTable::STRING),
        }
    }

    fn check_assign(&mut self, op: Option<BinaryOp>, target: ExprId, value: ExprId, span: FileSpan) -> Result<TyId, TypeError> {
        let target_ty = self.check_place(target)?;
        match op {
            None => {
                self.check_expr_expecting(value, target_ty)?;
            }
            Some(op) => {
                let value_ty = self.check_expr(value)?;
                let result = self.binary_result(op, (target, target_ty), (value, value_ty), span)?;
                if !self.ctx().is_assignable(result, target_ty) {
                    return Err(self.mismatch(target_ty, result, span));
                }
            }
        }
        Ok(target_ty)
    }

    /// Check an assignment target
    pub(super) fn check_place(&mut self, target: ExprId) -> Result<TyId, TypeError> {
        let program = self.program;
        let span = program.exprs[target].span;
        let ty = match &program.exprs[target].kind {
            ExprKind::Var(symbol) => self.symbol_type(*symbol, span)?,
            ExprKind::Member { object, name } => {
                let object_ty = self.check_expr(*object)?;
                let (access, ty) = self.resolve_member(object_ty, *name, span, true)?;
                self.results.members.insert(target, access);
                ty
            }
            ExprKind::Index { object, index } => self.check_index(*object, *index, span)?,
            _ => {
                return Err(TypeError::Unimplemented {
                    feature: "assignment target".to_string(),
                    span,
                })
            }
        };
        self.results.expr_types.insert(target, ty);
        Ok(ty)
    }

    /// Resolve `object.name` on a value of type `object_ty`
    pub(super) fn resolve_member(
        &self,
        object_ty: TyId,
        name: Name,
        span: FileSpan,
        write: bool,
    ) -> Result<(MemberAccess, TyId), TypeError> {
        let ctx = self.ctx();
        let readonly = || TypeError::ReadonlyAssignment {
            name: self.name(name),
            span,
        };
        let method_value = || TypeError::Unimplemented {
            feature: format!("method `{}` used as a value", self.name(name)),
            span,
        };
        match ctx.kind(object_ty) {
            TyKind::Class(class) => {
                let info = &ctx.classes[*class];
                if let Some((index, field)) = info.field(name) {
                    if write && field.readonly && !self.in_constructor_of(field.declared_in) {
                        return Err(readonly());
                    }
                    return Ok((MemberAccess::Field { index }, field.ty));
                }
                let (getter, setter) = info.accessor(name);
                if getter.is_some() || setter.is_some() {
                    let ty = if write {
                        setter
                            .and_then(|slot| ctx.function_params(info.vtable[slot].sig).first().copied())
                            .ok_or_else(readonly)?
                    } else {
                        getter
                            .and_then(|slot| ctx.function_ret(info.vtable[slot].sig))
                            .ok_or_else(|| self.unknown_member(object_ty, name, span))?
                    };
                    return Ok((MemberAccess::Accessor { getter, setter }, ty));
                }
                if info.method(name, MethodKind::Method).is_some() {
                    return Err(method_value());
                }
            }
            TyKind::ClassObject(class) => {
                let info = &ctx.classes[*class];
                if let Some((slot, field)) = info.static_slot(name) {
                    if write && field.readonly {
                        return Err(readonly());
                    }
                    return Ok((MemberAccess::Static { class: *class, slot }, field.ty));
                }
                if info.static_method(name).is_some() {
                    return Err(method_value());
                }
            }
            TyKind::Interface(interface) => match ctx.interfaces[*interface].member(name) {
                Some(MemberShape::Field(ty)) => return Ok((MemberAccess::Interface { name }, ty)),
                Some(MemberShape::Accessor { getter, setter }) => {
                    let ty = if write { setter.ok_or_else(readonly)? } else {
                        getter.ok_or_else(|| self.unknown_member(object_ty, name, span))?
                    };
                    return Ok((MemberAccess::Interface { name }, ty));
                }
                Some(MemberShape::Method(_)) => return Err(method_value()),
                None => {}
            },
            TyKind::Array(_) | TyKind::Primitive(Primitive::String) if name == self.intrinsics.length => {
                if write {
                    return Err(readonly());
                }
                return Ok((MemberAccess::Length, TyTable::NUMBER));
            }
            TyKind::Primitive(Primitive::Any) => return Ok((MemberAccess::Dynamic { name }, TyTable::ANY)),
            _ => {}
        }
        Err(self.unknown_member(object_ty, name, span))
    }

    pub(super) fn unknown_member(&self, ty: TyId, name: Name, span: FileSpan) -> TypeError {
        TypeError::UnknownMember {
            ty: self.display(ty),
            name: self.name(name),
            span,
        }
    }

    fn in_constructor_of(&self, class: ClassTyId) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.constructor_of == Some(class))
    }

    fn check_index(&mut self, object: ExprId, index: ExprId, span: FileSpan) -> Result<TyId, TypeError> {
        let object_ty = self.check_expr(object)?;
        let index_ty = self.check_expr(index)?;
        if object_ty == TyTable::ANY {
            self.box_operand(index, index_ty)?;
            return Ok(TyTable::ANY);
        }
        let element = if object_ty == TyTable::STRING {
            TyTable::STRING
        } else if let Some(element) = self.ctx().types.element(object_ty) {
            element
        } else {
            return Err(TypeError::TypeMismatch {
                expected: "an array or string".to_string(),
                found: self.display(object_ty),
                span,
            });
        };
        self.coerce(index, index_ty, TyTable::NUMBER)?;
        Ok(element)
    }

    fn check_array(&mut self, elements: &[ExprId], expected: Option<TyId>) -> Result<TyId, TypeError> {
        if let Some(expected) = expected {
            if let Some(element) = self.ctx().types.element(expected) {
                for item in elements {
                    self.check_expr_expecting(*item, element)?;
                }
                return Ok(expected);
            }
        }
        let mut typed = Vec::with_capacity(elements.len());
        for item in elements {
            typed.push((*item, self.check_expr(*item)?));
        }
        let element = if typed.is_empty() {
            self.unannotated(FileSpan::default())?
        } else {
            self.join(&typed)?
        };
        Ok(self.results.ctx.types.array(element))
    }

    fn check_object(&mut self, fields: &[(Name, ExprId)]) -> Result<TyId, TypeError> {
        let mut shape = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let mut ty = self.check_expr(*value)?;
            if Self::is_nullish(ty) {
                self.box_operand(*value, ty)?;
                ty = TyTable::ANY;
            }
            shape.push((*name, ty));
        }
        let label = self.intrinsics.object_label;
        let class = self.results.ctx.object_literal_class(label, shape);
        Ok(self.results.ctx.classes[class].instance)
    }

    fn check_as(&mut self, inner: ExprId, target: &TypeRef, span: FileSpan) -> Result<TyId, TypeError> {
        let target = self.canonicalize(target, span)?;
        let source = self.check_expr_with(inner, Some(target))?;
        match decide_coercion(self.ctx(), source, target) {
            Some(Coercion::Identity) => return Ok(target),
            Some(coercion) => {
                if self.options.disable_any && matches!(coercion, Coercion::Box | Coercion::Unbox(_)) {
                    return Err(Self::dynamic_disabled(span));
                }
                self.results.coercions.insert(inner, coercion);
                return Ok(target);
            }
            None => {}
        }
        // Unchecked downcast, or an interface value viewed as a class
        let ctx = self.ctx();
        let downcast = match (ctx.kind(source), ctx.kind(target)) {
            (TyKind::Class(from), TyKind::Class(to)) => ctx.is_subclass(*to, *from),
            (TyKind::Interface(_), TyKind::Class(_)) => true,
            _ => false,
        };
        if downcast {
            Ok(target)
        } else {
            Err(self.mismatch(target, source, span))
        }
    }
}
