//! Statements, function bodies and class declarations

use super::{Checker, Frame};
use crate::class::FnSig;
use crate::error::TypeError;
use crate::ty::{TyKind, TyTable};
use crate::ty::ClassTyId;
use ql_hir::{ClassDefId, ExprId, FunctionId, FunctionKind, StmtId, StmtKind};
use ql_span::FileSpan;
use ql_ty_id::TyId;
use tracing::trace;

impl Checker<'_> {
    pub(super) fn check_stmts(&mut self, stmts: &[StmtId]) -> Result<(), TypeError> {
        for stmt in stmts {
            self.check_stmt(*stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: StmtId) -> Result<(), TypeError> {
        let program = self.program;
        let span = program.stmts[stmt].span;
        match &program.stmts[stmt].kind {
            StmtKind::Let { symbol, init, .. } => {
                let declared = self.scopes.symbol(*symbol).ty;
                match (declared, init) {
                    (Some(ty), Some(init)) => {
                        self.check_expr_expecting(*init, ty)?;
                    }
                    (Some(_), None) => {}
                    (None, Some(init)) => {
                        let ty = self.check_expr(*init)?;
                        let ty = if Self::is_nullish(ty) || ty == TyTable::VOID {
                            self.box_operand(*init, ty)?;
                            TyTable::ANY
                        } else {
                            ty
                        };
                        self.scopes.set_type(*symbol, ty);
                    }
                    (None, None) => {
                        let ty = self.unannotated(span)?;
                        self.scopes.set_type(*symbol, ty);
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.check_expr(*expr)?;
            }
            StmtKind::Return(value) => self.check_return(*value, span)?,
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.check_expr(*cond)?;
                self.check_stmt(*then)?;
                if let Some(otherwise) = otherwise {
                    self.check_stmt(*otherwise)?;
                }
            }
            StmtKind::While { cond, body } => {
                self.check_expr(*cond)?;
                self.check_stmt(*body)?;
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.check_stmt(*init)?;
                }
                if let Some(cond) = cond {
                    self.check_expr(*cond)?;
                }
                if let Some(update) = update {
                    self.check_expr(*update)?;
                }
                self.check_stmt(*body)?;
            }
            StmtKind::Block { stmts, .. } => self.check_stmts(stmts)?,
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Function(function) => {
                self.check_function(*function, None)?;
            }
            StmtKind::Class(class) => self.check_class(*class)?,
        }
        Ok(())
    }

    fn check_return(&mut self, value: Option<ExprId>, span: FileSpan) -> Result<(), TypeError> {
        let Some(frame) = self.frames.last() else {
            return Err(TypeError::Unimplemented {
                feature: "return outside a function".to_string(),
                span,
            });
        };
        match (frame.declared_ret, value) {
            (Some(ret), Some(value)) if ret == TyTable::VOID => {
                let ty = self.check_expr(value)?;
                if ty != TyTable::VOID && ty != TyTable::UNDEFINED {
                    return Err(self.mismatch(ret, ty, span));
                }
            }
            (Some(ret), Some(value)) => {
                self.check_expr_expecting(value, ret)?;
            }
            (Some(ret), None) => {
                if ret != TyTable::VOID && ret != TyTable::ANY {
                    return Err(self.mismatch(ret, TyTable::UNDEFINED, span));
                }
            }
            (None, Some(value)) => {
                let ty = self.check_expr(value)?;
                if let Some(frame) = self.frames.last_mut() {
                    frame.returns.push((value, ty));
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Check a function body once and return its signature
    ///
    /// `expected` is the function type a closure literal flows into; its
    /// parameter and return types stand in for missing annotations.
    pub(super) fn check_function(&mut self, function: FunctionId, expected: Option<TyId>) -> Result<FnSig, TypeError> {
        let program = self.program;
        let def = &program.functions[function];
        if !self.checked.insert(function) {
            if let Some(sig) = self.results.signatures.get(&function) {
                return Ok(sig.clone());
            }
        }
        trace!(function = self.scopes.name(def.name), "checking function");

        let is_closure = matches!(def.kind, FunctionKind::Expression | FunctionKind::Arrow);
        let (params, required, variadic, declared_ret) = if is_closure {
            let (expected_params, expected_ret) = match expected.map(|ty| self.ctx().kind(ty).clone()) {
                Some(TyKind::Function { params, ret, .. }) => (Some(params), Some(ret)),
                _ => (None, None),
            };
            let (params, required, variadic) = self.param_types(function, expected_params.as_deref())?;
            let ret = match &def.ret {
                Some(ret) => Some(self.canonicalize(ret, def.span)?),
                None => expected_ret,
            };
            (params, required, variadic, ret)
        } else {
            let Some(sig) = self.results.signatures.get(&function) else {
                return Err(TypeError::Unimplemented {
                    feature: "function without a signature".to_string(),
                    span: def.span,
                });
            };
            (sig.params.clone(), sig.required, sig.variadic, Some(sig.ret))
        };

        let constructor_of = match def.kind {
            FunctionKind::Constructor { class } => self.results.class_of_def(class),
            _ => None,
        };
        self.frames.push(Frame {
            declared_ret,
            returns: Vec::new(),
            constructor_of,
        });
        let checked = self.check_function_body(function, &params, constructor_of);
        let frame = self.frames.pop();
        checked?;

        let ret = match (declared_ret, frame) {
            (Some(ret), _) => ret,
            (None, Some(frame)) => self.join(&frame.returns)?,
            (None, None) => TyTable::VOID,
        };
        let sig = FnSig {
            ty: self.results.ctx.types.function(params.clone(), ret, variadic),
            params,
            ret,
            required,
            variadic,
        };
        if is_closure {
            self.results.signatures.insert(function, sig.clone());
        }
        Ok(sig)
    }

    fn check_function_body(
        &mut self,
        function: FunctionId,
        params: &[TyId],
        constructor_of: Option<ClassTyId>,
    ) -> Result<(), TypeError> {
        let program = self.program;
        let def = &program.functions[function];
        for (param, ty) in def.params.iter().zip(params) {
            if let Some(default) = param.default {
                self.check_expr_expecting(default, *ty)?;
            }
        }
        if let (FunctionKind::Constructor { class: def_id }, Some(class)) = (def.kind, constructor_of) {
            let own = &program.classes[def_id].fields;
            let info = &self.results.ctx.classes[class];
            let first_own = info.fields.len() - own.len();
            let slots: Vec<TyId> = info.fields[first_own..].iter().map(|field| field.ty).collect();
            for (field, ty) in own.iter().zip(slots) {
                if let Some(init) = field.init {
                    self.check_expr_expecting(init, ty)?;
                }
            }
        }
        self.check_stmts(&def.body)
    }

    fn check_class(&mut self, def_id: ClassDefId) -> Result<(), TypeError> {
        let program = self.program;
        let def = &program.classes[def_id];
        let Some(class) = self.results.class_of_def(def_id) else {
            return Ok(());
        };
        let slots: Vec<TyId> = self.results.ctx.classes[class]
            .statics
            .iter()
            .filter(|slot| slot.declared_in == class)
            .map(|slot| slot.ty)
            .collect();
        for (field, ty) in def.statics.iter().zip(slots) {
            if let Some(init) = field.init {
                self.check_expr_expecting(init, ty)?;
            }
        }
        self.check_function(def.constructor, None)?;
        for method in def.methods.iter().chain(&def.static_methods) {
            self.check_function(*method, None)?;
        }
        Ok(())
    }
}
