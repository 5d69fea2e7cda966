//! Body checking
//!
//! The checker runs in two passes. [`collect`] gives every declaration a
//! type first: builtin namespaces, classes and interfaces, annotated
//! variables, function signatures and finally the class layouts, base
//! before derived. Then every module body is checked in initialization
//! order. Function declarations, methods and constructors are checked where
//! they are declared; closures are checked at the expression that creates
//! them, so their return type can be inferred from the body.
//!
//! The result records a type for every expression, the coercion applied
//! where a value flows into a slot of another type, and how every call and
//! member access is dispatched.

mod call;
mod collect;
mod expr;
mod stmt;

use crate::builtins::{BuiltinFn, BuiltinTable};
use crate::class::FnSig;
use crate::context::TyContext;
use crate::error::TypeError;
use crate::ty::{ClassTyId, TyTable};
use ql_dyn::{decide_coercion, Coercion};
use ql_hir::{ClassDefId, ExprId, FunctionId, Program};
use ql_intern::Name;
use ql_scope::ScopeTree;
use ql_span::FileSpan;
use ql_ty_id::TyId;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

/// Checker switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Reject `any` and every dynamic coercion as unimplemented
    pub disable_any: bool,
}

/// How a call expression reaches its callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    /// Module-level function declaration, called by name
    Direct(FunctionId),
    /// Instance method, dispatched through the receiver's vtable
    Virtual {
        /// Vtable slot
        slot: usize,
    },
    /// Method of an interface-typed receiver, looked up by name
    Interface {
        /// Method name
        name: Name,
    },
    /// Static method
    Static {
        /// Class the method was found on
        class: ClassTyId,
        /// Implementation
        function: FunctionId,
    },
    /// `super.name(...)`, bound statically to the base implementation
    SuperMethod {
        /// Implementation in the base class
        function: FunctionId,
    },
    /// `super(...)` in a derived constructor
    SuperConstructor {
        /// Base class
        class: ClassTyId,
    },
    /// The callee evaluates to a closure value
    Closure,
    /// Builtin operation; array builtins take the callee's object as receiver
    Builtin(BuiltinFn),
}

/// How a member expression reads or writes its property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAccess {
    /// Instance field slot
    Field {
        /// Index into the class's flattened field list
        index: usize,
    },
    /// Static slot of the class the access names
    Static {
        /// Class named by the access
        class: ClassTyId,
        /// Index into that class's static slots
        slot: usize,
    },
    /// Accessor pair, called through the vtable
    Accessor {
        /// Getter slot
        getter: Option<usize>,
        /// Setter slot
        setter: Option<usize>,
    },
    /// Member of an interface-typed receiver, looked up by name
    Interface {
        /// Member name
        name: Name,
    },
    /// `length` of a string or array
    Length,
    /// Property of an `any` value
    Dynamic {
        /// Property name
        name: Name,
    },
}

/// Everything the checker derived
#[derive(Debug, Default)]
pub struct TypeckResults {
    /// Types, classes and interfaces
    pub ctx: TyContext,
    /// Type of every checked expression
    pub expr_types: FxHashMap<ExprId, TyId>,
    /// Non-identity coercions, keyed by the converted expression
    pub coercions: FxHashMap<ExprId, Coercion>,
    /// Dispatch of every call, `super(...)` included
    pub calls: FxHashMap<ExprId, CallTarget>,
    /// Resolution of every member expression that is not a method callee
    pub members: FxHashMap<ExprId, MemberAccess>,
    /// Signature of every function
    pub signatures: FxHashMap<FunctionId, FnSig>,
}

impl TypeckResults {
    /// Type of `expr`; unchecked expressions count as `any`
    pub fn type_of(&self, expr: ExprId) -> TyId {
        self.expr_types.get(&expr).copied().unwrap_or(TyTable::ANY)
    }

    /// Coercion applied to the value of `expr`
    pub fn coercion(&self, expr: ExprId) -> Coercion {
        self.coercions
            .get(&expr)
            .copied()
            .unwrap_or(Coercion::Identity)
    }

    /// Dispatch of a call
    pub fn call_target(&self, expr: ExprId) -> Option<CallTarget> {
        self.calls.get(&expr).copied()
    }

    /// Resolution of a member expression
    pub fn member(&self, expr: ExprId) -> Option<MemberAccess> {
        self.members.get(&expr).copied()
    }

    /// Signature of a function
    pub fn signature(&self, function: FunctionId) -> Option<&FnSig> {
        self.signatures.get(&function)
    }

    /// Class type of a class declaration
    pub fn class_of_def(&self, def: ClassDefId) -> Option<ClassTyId> {
        self.ctx.class_of_def.get(&def).copied()
    }
}

/// Per-function checking state
#[derive(Debug)]
struct Frame {
    /// Declared or expected return type; `None` infers it from the body
    declared_ret: Option<TyId>,
    /// Returned values, for inference
    returns: Vec<(ExprId, TyId)>,
    /// Class whose constructor is being checked
    constructor_of: Option<ClassTyId>,
}

/// Names of the intrinsic members, interned once
#[derive(Debug, Clone, Copy)]
struct Intrinsics {
    length: Name,
    push: Name,
    pop: Name,
    object_label: Name,
}

/// Type checker over one program
pub(crate) struct Checker<'a> {
    program: &'a Program,
    scopes: &'a mut ScopeTree,
    builtins: &'a BuiltinTable,
    options: CheckOptions,
    results: TypeckResults,
    frames: Vec<Frame>,
    checked: FxHashSet<FunctionId>,
    intrinsics: Intrinsics,
}

/// Type-check a lowered program
///
/// Symbol types are written back into the scope tree, so later stages can
/// read a variable's type from its symbol.
///
/// # Errors
///
/// Returns the first `TypeError`; the whole compilation unit is rejected.
#[instrument(skip_all, fields(modules = program.modules.len()))]
pub fn check_program(
    program: &Program,
    scopes: &mut ScopeTree,
    builtins: &BuiltinTable,
    options: &CheckOptions,
) -> Result<TypeckResults, TypeError> {
    let mut checker = Checker::new(program, scopes, builtins, *options);
    checker.collect()?;

    let mut order = program.init_order.clone();
    for module in &program.modules {
        if !order.contains(&module.id) {
            order.push(module.id);
        }
    }
    for module in order {
        checker.check_stmts(&program.module(module).body)?;
    }
    // Functions no statement reaches (none in well-formed input)
    for (function, _) in program.functions.iter() {
        if checker.results.signatures.contains_key(&function) && !checker.checked.contains(&function) {
            checker.check_function(function, None)?;
        }
    }

    debug!(
        types = checker.results.ctx.types.len(),
        classes = checker.results.ctx.classes.len(),
        coercions = checker.results.coercions.len(),
        "checked program"
    );
    Ok(checker.results)
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program, scopes: &'a mut ScopeTree, builtins: &'a BuiltinTable, options: CheckOptions) -> Self {
        let intrinsics = Intrinsics {
            length: scopes.intern("length"),
            push: scopes.intern("push"),
            pop: scopes.intern("pop"),
            object_label: scopes.intern("{object}"),
        };
        Self {
            program,
            scopes,
            builtins,
            options,
            results: TypeckResults::default(),
            frames: Vec::new(),
            checked: FxHashSet::default(),
            intrinsics,
        }
    }

    fn ctx(&self) -> &TyContext {
        &self.results.ctx
    }

    fn display(&self, ty: TyId) -> String {
        self.results.ctx.display(ty, &self.scopes.interner)
    }

    fn name(&self, name: Name) -> String {
        self.scopes.name(name).to_string()
    }

    fn expr_span(&self, expr: ExprId) -> FileSpan {
        self.program.exprs[expr].span
    }

    fn mismatch(&self, expected: TyId, found: TyId, span: FileSpan) -> TypeError {
        TypeError::TypeMismatch {
            expected: self.display(expected),
            found: self.display(found),
            span,
        }
    }

    fn dynamic_disabled(span: FileSpan) -> TypeError {
        TypeError::Unimplemented {
            feature: "dynamic typing is disabled".to_string(),
            span,
        }
    }

    /// Record how the value of `expr` enters a slot of type `target`
    fn coerce(&mut self, expr: ExprId, source: TyId, target: TyId) -> Result<(), TypeError> {
        let span = self.expr_span(expr);
        match decide_coercion(self.ctx(), source, target) {
            Some(Coercion::Identity) => Ok(()),
            Some(coercion @ (Coercion::Box | Coercion::Unbox(_))) if self.options.disable_any => {
                debug!(?coercion, "rejected dynamic coercion");
                Err(Self::dynamic_disabled(span))
            }
            Some(coercion) => {
                self.results.coercions.insert(expr, coercion);
                Ok(())
            }
            None => Err(self.mismatch(target, source, span)),
        }
    }

    /// Box a static operand of a dynamic operation
    fn box_operand(&mut self, expr: ExprId, ty: TyId) -> Result<(), TypeError> {
        if ty == TyTable::ANY {
            return Ok(());
        }
        if self.options.disable_any {
            return Err(Self::dynamic_disabled(self.expr_span(expr)));
        }
        self.results.coercions.insert(expr, Coercion::Box);
        Ok(())
    }

    fn is_nullish(ty: TyId) -> bool {
        ty == TyTable::NULL || ty == TyTable::UNDEFINED
    }

    /// Common type of several values flowing into one place
    ///
    /// Equal types stay. `null`/`undefined` next to one reference type take
    /// that type; anything else is boxed into `any`.
    fn join(&mut self, branches: &[(ExprId, TyId)]) -> Result<TyId, TypeError> {
        let Some(&(_, first)) = branches.first() else {
            return Ok(TyTable::VOID);
        };
        let candidate = branches
            .iter()
            .map(|(_, ty)| *ty)
            .find(|ty| !Self::is_nullish(*ty))
            .unwrap_or(first);
        if branches.iter().all(|(_, ty)| *ty == candidate) {
            return Ok(candidate);
        }
        let ctx = self.ctx();
        if ctx.types.is_reference(candidate)
            && branches
                .iter()
                .all(|(_, ty)| Self::is_nullish(*ty) || ctx.is_assignable(*ty, candidate))
        {
            for (expr, ty) in branches {
                if Self::is_nullish(*ty) {
                    self.results.coercions.insert(*expr, Coercion::NullRef);
                }
            }
            return Ok(candidate);
        }
        for (expr, ty) in branches {
            self.box_operand(*expr, *ty)?;
        }
        Ok(TyTable::ANY)
    }
}

#[cfg(test)]
mod tests;
