//! Calls: direct, virtual, interface, static, super, closure and builtin

use super::{CallTarget, Checker};
use crate::builtins::BuiltinFn;
use crate::class::FnSig;
use crate::error::TypeError;
use crate::interface::MemberShape;
use crate::ty::{Primitive, TyKind, TyTable};
use ql_hir::{DefId, ExprId, ExprKind, FunctionId, MethodKind, SymbolId};
use ql_intern::Name;
use ql_span::FileSpan;
use ql_ty_id::TyId;

impl Checker<'_> {
    pub(super) fn check_call(&mut self, expr: ExprId, callee: ExprId, args: &[ExprId], span: FileSpan) -> Result<TyId, TypeError> {
        let program = self.program;
        let (target, sig) = match &program.exprs[callee].kind {
            ExprKind::Member { object, name } => self.resolve_method_call(callee, *object, *name, span)?,
            ExprKind::SuperMember { this, name } => self.resolve_super_method(*this, *name, span)?,
            ExprKind::Var(symbol) => match self.direct_function(*symbol) {
                Some(function) => {
                    let sig = self.function_sig(function, span)?;
                    (CallTarget::Direct(function), sig)
                }
                None => {
                    let ty = self.check_expr(callee)?;
                    (CallTarget::Closure, self.callable(ty, span)?)
                }
            },
            _ => {
                let ty = self.check_expr(callee)?;
                (CallTarget::Closure, self.callable(ty, span)?)
            }
        };
        self.results.expr_types.entry(callee).or_insert(sig.ty);
        self.check_args(&sig, args, span)?;
        self.results.calls.insert(expr, target);
        Ok(sig.ret)
    }

    /// Module-level function declaration bound to `symbol`
    fn direct_function(&self, symbol: SymbolId) -> Option<FunctionId> {
        match self.program.def_of(symbol)? {
            DefId::Function(function) if self.program.functions[function].parent.is_none() => Some(function),
            _ => None,
        }
    }

    fn function_sig(&self, function: FunctionId, span: FileSpan) -> Result<FnSig, TypeError> {
        self.results
            .signatures
            .get(&function)
            .cloned()
            .ok_or_else(|| TypeError::Unimplemented {
                feature: "call to a function without a signature".to_string(),
                span,
            })
    }

    /// Call signature of a function-typed value
    fn callable(&self, ty: TyId, span: FileSpan) -> Result<FnSig, TypeError> {
        match self.ctx().kind(ty) {
            TyKind::Function {
                params,
                ret,
                variadic,
            } => Ok(FnSig {
                ty,
                params: params.clone(),
                ret: *ret,
                required: params.len() - usize::from(*variadic),
                variadic: *variadic,
            }),
            TyKind::Primitive(Primitive::Any) => Err(TypeError::Unimplemented {
                feature: "calling a value of type any".to_string(),
                span,
            }),
            _ => Err(TypeError::NotCallable {
                ty: self.display(ty),
                span,
            }),
        }
    }

    fn resolve_method_call(
        &mut self,
        callee: ExprId,
        object: ExprId,
        name: Name,
        span: FileSpan,
    ) -> Result<(CallTarget, FnSig), TypeError> {
        let object_ty = self.check_expr(object)?;
        let ctx = self.ctx();
        match ctx.kind(object_ty) {
            TyKind::Class(class) => {
                if let Some((slot, method)) = ctx.classes[*class].method(name, MethodKind::Method) {
                    let sig = self.function_sig(method.implementation, span)?;
                    return Ok((CallTarget::Virtual { slot }, sig));
                }
            }
            TyKind::ClassObject(class) => {
                if let Some(method) = ctx.classes[*class].static_method(name) {
                    let target = CallTarget::Static {
                        class: *class,
                        function: method.function,
                    };
                    return Ok((target, self.function_sig(method.function, span)?));
                }
            }
            TyKind::Interface(interface) => {
                let info = &ctx.interfaces[*interface];
                if let Some(index) = info.builtin {
                    let builtins = self.builtins;
                    let method = builtins.namespaces[index]
                        .method(self.scopes.name(name))
                        .ok_or_else(|| self.unknown_member(object_ty, name, span))?;
                    let sig = self.builtin_signature(method);
                    return Ok((CallTarget::Builtin(method.function), sig));
                }
                if let Some(MemberShape::Method(sig)) = info.member(name) {
                    return Ok((CallTarget::Interface { name }, self.callable(sig, span)?));
                }
            }
            TyKind::Array(element) => {
                let (element, array) = (*element, object_ty);
                if name == self.intrinsics.push {
                    let ty = self.results.ctx.types.function(vec![array], TyTable::NUMBER, true);
                    let sig = FnSig {
                        ty,
                        params: vec![array],
                        ret: TyTable::NUMBER,
                        required: 0,
                        variadic: true,
                    };
                    return Ok((CallTarget::Builtin(BuiltinFn::ArrayPush), sig));
                }
                if name == self.intrinsics.pop {
                    let ty = self.results.ctx.types.function(Vec::new(), element, false);
                    let sig = FnSig {
                        ty,
                        params: Vec::new(),
                        ret: element,
                        required: 0,
                        variadic: false,
                    };
                    return Ok((CallTarget::Builtin(BuiltinFn::ArrayPop), sig));
                }
            }
            TyKind::Primitive(Primitive::Any) => {
                return Err(TypeError::Unimplemented {
                    feature: "calling a value of type any".to_string(),
                    span,
                });
            }
            _ => {}
        }
        // A field or accessor holding a function value
        let (access, ty) = self.resolve_member(object_ty, name, span, false)?;
        self.results.members.insert(callee, access);
        self.results.expr_types.insert(callee, ty);
        Ok((CallTarget::Closure, self.callable(ty, span)?))
    }

    fn resolve_super_method(&mut self, this: SymbolId, name: Name, span: FileSpan) -> Result<(CallTarget, FnSig), TypeError> {
        let this_ty = self.symbol_type(this, span)?;
        let ctx = self.ctx();
        let base = ctx
            .types
            .class(this_ty)
            .and_then(|class| ctx.classes[class].base)
            .ok_or_else(|| TypeError::Unimplemented {
                feature: "`super` without a base class".to_string(),
                span,
            })?;
        let base_ty = ctx.classes[base].instance;
        let (_, method) = ctx.classes[base]
            .method(name, MethodKind::Method)
            .ok_or_else(|| self.unknown_member(base_ty, name, span))?;
        let function = method.implementation;
        Ok((CallTarget::SuperMethod { function }, self.function_sig(function, span)?))
    }

    pub(super) fn check_super_call(&mut self, expr: ExprId, this: SymbolId, args: &[ExprId], span: FileSpan) -> Result<TyId, TypeError> {
        let this_ty = self.symbol_type(this, span)?;
        let ctx = self.ctx();
        let base = ctx
            .types
            .class(this_ty)
            .and_then(|class| ctx.classes[class].base)
            .ok_or_else(|| TypeError::Unimplemented {
                feature: "`super` call without a base class".to_string(),
                span,
            })?;
        let sig = ctx.classes[base].ctor.clone().ok_or_else(|| TypeError::Unimplemented {
            feature: "base class without a constructor".to_string(),
            span,
        })?;
        self.check_args(&sig, args, span)?;
        self.results
            .calls
            .insert(expr, CallTarget::SuperConstructor { class: base });
        Ok(TyTable::VOID)
    }

    pub(super) fn check_new(&mut self, class: SymbolId, args: &[ExprId], span: FileSpan) -> Result<TyId, TypeError> {
        let not_a_class = || TypeError::Unimplemented {
            feature: "`new` on something that is not a class".to_string(),
            span,
        };
        let def = self.program.class_of_symbol(class).ok_or_else(not_a_class)?;
        let class = self.results.class_of_def(def).ok_or_else(not_a_class)?;
        let info = &self.results.ctx.classes[class];
        let instance = info.instance;
        let sig = info.ctor.clone().ok_or_else(not_a_class)?;
        self.check_args(&sig, args, span)?;
        Ok(instance)
    }

    /// Bind arguments to parameters, recording coercions
    fn check_args(&mut self, sig: &FnSig, args: &[ExprId], span: FileSpan) -> Result<(), TypeError> {
        let fixed = if sig.variadic {
            sig.params.len().saturating_sub(1)
        } else {
            sig.params.len()
        };
        if args.len() < sig.required || (!sig.variadic && args.len() > fixed) {
            let expected = if sig.variadic {
                format!("at least {}", sig.required)
            } else if sig.required == fixed {
                fixed.to_string()
            } else {
                format!("{}..{}", sig.required, fixed)
            };
            return Err(TypeError::ArgumentCount {
                expected,
                found: args.len(),
                span,
            });
        }
        let rest = sig
            .params
            .last()
            .filter(|_| sig.variadic)
            .and_then(|rest| self.ctx().types.element(*rest))
            .unwrap_or(TyTable::ANY);
        for (position, arg) in args.iter().enumerate() {
            let param = sig.params.get(position).copied().filter(|_| position < fixed).unwrap_or(rest);
            self.check_expr_expecting(*arg, param)?;
        }
        Ok(())
    }
}
