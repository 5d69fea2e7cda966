//! Reference evaluator
//!
//! Runs the HIR of a checked program with exactly the layout decisions of
//! its [`LoweringPlan`]: variables live where the plan put them (parameter
//! and local slots, context cells reached through parent links, globals),
//! fields are read at their planned offsets, methods are dispatched through
//! the planned vtables and static members through the per-class static
//! globals. Values of type `any` live in a [`DynHeap`].

use crate::store::{box_value, from_unboxed, zero, Host, Store};
use crate::value::{ClosureRef, ContextRef, ObjectRef, Value};
use ql_dyn::{Coercion, CompareOp, DynError, DynHeap, DynValue, ExtRefKind, UnboxError};
use ql_hir::{ClassDefId, FunctionId, FunctionKind, Program, StmtId, StmtKind, SymbolId};
use ql_lower::{ClassPlan, FunctionPlan, GlobalKind, IrType, LoweringPlan, VarStorage};
use ql_scope::ScopeTree;
use ql_ty::{ClassTyId, TyTable, TypeckResults};
use ql_ty_id::TyId;
use rustc_hash::FxHashMap;
use std::mem;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Nesting limit for calls
pub const MAX_CALL_DEPTH: usize = 256;

/// Interpreter error
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// A narrowing from `any` failed
    #[error(transparent)]
    Unbox(#[from] UnboxError),
    /// A dynamic operation failed
    #[error(transparent)]
    Dynamic(#[from] DynError),
    /// The plan has no storage for a variable
    #[error("no storage planned for `{name}`")]
    NoStorage {
        /// Variable name
        name: String,
    },
    /// The entry module exports nothing under this name
    #[error("no export named `{0}`")]
    UnknownExport(String),
    /// Called something that is not a function
    #[error("not callable: {0}")]
    NotCallable(String),
    /// A value of the wrong shape reached an operation
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected shape
        expected: String,
        /// Actual value
        got: String,
    },
    /// The plan or the type tables are missing an entry
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// Too many nested calls
    #[error("call depth exceeded {MAX_CALL_DEPTH}")]
    StackOverflow,
}

/// Control flow out of a statement
#[derive(Debug)]
pub(crate) enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

/// First slot of a call
#[derive(Debug, Clone)]
pub(crate) enum Receiver {
    /// Context a plain function was created in
    Env(Option<ContextRef>),
    /// `this` of a method or constructor
    This(Value),
    /// Static methods have no receiver slot
    None,
}

/// Slots of the running function
#[derive(Debug, Default)]
pub(crate) struct Frame {
    /// Running function; `None` for module initializers
    pub function: Option<FunctionId>,
    /// Parameter slots followed by local slots
    pub slots: Vec<Value>,
    /// Context allocated on entry
    pub context: Option<ContextRef>,
    /// Context the function was created in
    pub env: Option<ContextRef>,
}

/// Interpreter state
pub struct Interpreter<'a> {
    pub(crate) program: &'a Program,
    pub(crate) scopes: &'a ScopeTree,
    pub(crate) results: &'a TypeckResults,
    pub(crate) plan: &'a LoweringPlan,
    pub(crate) heap: DynHeap,
    pub(crate) store: Store,
    pub(crate) globals: Vec<Value>,
    pub(crate) frame: Frame,
    function_values: FxHashMap<FunctionId, ClosureRef>,
    output: Vec<String>,
    depth: usize,
    initialized: bool,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter over a planned program
    #[must_use]
    pub fn new(
        program: &'a Program,
        scopes: &'a ScopeTree,
        results: &'a TypeckResults,
        plan: &'a LoweringPlan,
    ) -> Self {
        Self {
            program,
            scopes,
            results,
            plan,
            heap: DynHeap::new(),
            store: Store::default(),
            globals: plan.globals.iter().map(|global| zero(global.ty)).collect(),
            frame: Frame::default(),
            function_values: FxHashMap::default(),
            output: Vec::new(),
            depth: 0,
            initialized: false,
        }
    }

    /// Run the module initializers in start order
    ///
    /// # Errors
    /// Returns `InterpreterError` if a module body fails
    #[instrument(skip_all)]
    pub fn initialize(&mut self) -> Result<(), InterpreterError> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        let plan = self.plan;
        let program = self.program;
        for init in &plan.inits {
            debug!(module = %init.name, "running initializer");
            let body = &program.module(init.module).body;
            let saved = mem::take(&mut self.frame);
            let flow = self.execute_block(body);
            self.frame = saved;
            flow?;
        }
        Ok(())
    }

    /// Call an export of the entry module
    ///
    /// The module initializers run first if they have not yet.
    ///
    /// # Errors
    /// Returns `InterpreterError` if the export is missing or execution fails
    pub fn call_export(&mut self, name: &str, args: Vec<Value>) -> Result<Value, InterpreterError> {
        self.initialize()?;
        let export = self
            .plan
            .exports
            .iter()
            .find(|export| export.name == name)
            .ok_or_else(|| InterpreterError::UnknownExport(name.to_string()))?;
        self.call_function(export.function, Receiver::Env(None), args)
    }

    /// Call a function value
    ///
    /// # Errors
    /// Returns `InterpreterError` if `callee` is not a function or execution fails
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, InterpreterError> {
        match callee {
            Value::Closure(closure) => {
                let data = self.store.closures[closure.0];
                self.call_function(data.function, Receiver::Env(data.env), args)
            }
            other => Err(InterpreterError::NotCallable(self.display(other))),
        }
    }

    /// Module variable `name` of `module`
    pub fn global(&self, module: &str, name: &str) -> Option<&Value> {
        let internal = format!("{module}|{name}");
        let index = self.plan.globals.iter().position(|global| {
            global.name == internal && matches!(global.kind, GlobalKind::Variable(_))
        })?;
        self.globals.get(index)
    }

    /// Static field `field` of class `class` declared in `module`
    pub fn static_field(&self, module: &str, class: &str, field: &str) -> Option<&Value> {
        let internal = format!("{module}|{class}|{field}");
        let index = self.plan.globals.iter().position(|global| global.name == internal)?;
        self.globals.get(index)
    }

    /// Elements of a static array
    pub fn array(&self, value: &Value) -> Option<&[Value]> {
        match value {
            Value::Array(array) => self.store.arrays.get(array.0).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Field `name` of an object, read at its planned offset
    pub fn field(&self, value: &Value, name: &str) -> Option<&Value> {
        let Value::Object(object) = value else {
            return None;
        };
        let data = self.store.objects.get(object.0)?;
        let offset = self.plan.class(data.class)?.offset_of(self.scopes.interner.get(name)?)?;
        data.fields.get(ClassPlan::field_index(offset))
    }

    /// Lines printed by `console.log`
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Dynamic heap
    pub const fn heap(&self) -> &DynHeap {
        &self.heap
    }

    /// String form used by `console.log` and string concatenation
    pub fn display(&self, value: &Value) -> String {
        match value {
            Value::Dyn(value) => self.heap.to_display(value),
            Value::Array(array) => self.store.arrays.get(array.0).map_or_else(String::new, |elements| {
                elements
                    .iter()
                    .map(|element| match element {
                        Value::Null | Value::Undefined => String::new(),
                        other => self.display(other),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }),
            other => other.to_string(),
        }
    }

    /// Result of `typeof value`
    pub fn type_of_value(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Closure(_) | Value::Class(_) => "function",
            Value::Null | Value::Object(_) | Value::Array(_) | Value::Builtin | Value::Context(_) => "object",
            Value::Dyn(value) => self.heap.type_of(value),
        }
    }

    // Calls

    pub(crate) fn call_function(
        &mut self,
        function: FunctionId,
        receiver: Receiver,
        args: Vec<Value>,
    ) -> Result<Value, InterpreterError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(InterpreterError::StackOverflow);
        }
        let plans = self.plan;
        let plan = plans
            .function(function)
            .ok_or_else(|| InterpreterError::InvalidOperation(format!("function {function:?} was not planned")))?;
        trace!(function = %plan.name, args = args.len(), "call");

        let mut slots = vec![Value::Undefined; plan.slot_count()];
        for (slot, ty) in plan.params.iter().chain(&plan.locals).enumerate() {
            if *ty == IrType::Dyn {
                slots[slot] = Value::Dyn(DynValue::Undefined);
            }
        }
        let env = match &receiver {
            Receiver::Env(env) => {
                slots[0] = env.map_or(Value::Null, Value::Context);
                *env
            }
            Receiver::This(this) => {
                slots[0] = this.clone();
                None
            }
            Receiver::None => None,
        };

        let saved = mem::replace(
            &mut self.frame,
            Frame {
                function: Some(function),
                slots,
                context: None,
                env,
            },
        );
        self.depth += 1;
        let result = self.enter(function, plan, args);
        self.depth -= 1;
        self.frame = saved;
        result
    }

    fn enter(&mut self, function: FunctionId, plan: &FunctionPlan, args: Vec<Value>) -> Result<Value, InterpreterError> {
        let program = self.program;
        let def = &program.functions[function];
        let first = FunctionPlan::first_param_slot(def.kind);
        let forwarded = args.clone();
        let mut args = args.into_iter();
        for (index, param) in def.params.iter().enumerate() {
            let slot = first + index;
            if param.rest {
                let rest = self.store.alloc_array(args.by_ref().collect());
                self.frame.slots[slot] = Value::Array(rest);
                continue;
            }
            match (args.next(), param.default) {
                (Some(value), _) => self.frame.slots[slot] = value,
                (None, Some(default)) => self.frame.slots[slot] = self.eval(default)?,
                (None, None) => {}
            }
        }

        if let Some(id) = plan.context {
            let shape = self
                .plan
                .context(id)
                .ok_or_else(|| InterpreterError::InvalidOperation(format!("context of {} was not planned", plan.name)))?;
            let context = self.store.alloc_context(&shape.fields, self.frame.env);
            for (slot, field) in &plan.prologue {
                self.store.contexts[context.0][*field] = self.frame.slots[*slot].clone();
            }
            self.frame.context = Some(context);
        }
        for nested in &plan.hoisted {
            let closure = self.store.alloc_closure(*nested, self.frame.context.or(self.frame.env));
            if let Some(symbol) = program.functions[*nested].symbol {
                self.write_var(symbol, Value::Closure(closure))?;
            }
        }

        if let FunctionKind::Constructor { class } = def.kind {
            let class_def = &program.classes[class];
            if class_def.base.is_none() {
                self.init_fields(class)?;
            } else if class_def.synthesized_constructor {
                let this = self.frame.slots[0].clone();
                let base = self.base_class(class)?;
                self.construct_base(base, this, forwarded)?;
                self.init_fields(class)?;
            }
        }

        match self.execute_block(&def.body)? {
            Flow::Return(value) => Ok(value),
            Flow::Next | Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    /// Instantiate a class
    pub(crate) fn instantiate(&mut self, class: ClassTyId, args: Vec<Value>) -> Result<Value, InterpreterError> {
        let class_plan = self.class_plan(class)?;
        let object = self.store.alloc_object(class_plan);
        let constructor = class_plan
            .constructor
            .ok_or_else(|| InterpreterError::InvalidOperation(format!("{} has no constructor", class_plan.name)))?;
        self.call_function(constructor, Receiver::This(Value::Object(object)), args)?;
        Ok(Value::Object(object))
    }

    /// Run the base constructor of a derived class on `this`
    pub(crate) fn construct_base(&mut self, base: ClassTyId, this: Value, args: Vec<Value>) -> Result<(), InterpreterError> {
        let class_plan = self.class_plan(base)?;
        let constructor = class_plan
            .constructor
            .ok_or_else(|| InterpreterError::InvalidOperation(format!("{} has no constructor", class_plan.name)))?;
        self.call_function(constructor, Receiver::This(this), args)?;
        Ok(())
    }

    fn base_class(&self, class: ClassDefId) -> Result<ClassTyId, InterpreterError> {
        self.results
            .class_of_def(class)
            .and_then(|class| self.results.ctx.classes[class].base)
            .ok_or_else(|| InterpreterError::InvalidOperation("derived class without a base".to_string()))
    }

    /// Run the instance field initializers of `class` on the constructor's `this`
    pub(crate) fn init_fields(&mut self, class: ClassDefId) -> Result<(), InterpreterError> {
        let program = self.program;
        let class_ty = self
            .results
            .class_of_def(class)
            .ok_or_else(|| InterpreterError::InvalidOperation("unchecked class".to_string()))?;
        let Value::Object(object) = self.frame.slots[0].clone() else {
            return Err(self.mismatch("an object", &self.frame.slots[0]));
        };
        for field in &program.classes[class].fields {
            let Some(init) = field.init else {
                continue;
            };
            let value = self.eval(init)?;
            let offset = self
                .class_plan(class_ty)?
                .offset_of(field.name)
                .ok_or_else(|| InterpreterError::InvalidOperation("field without an offset".to_string()))?;
            self.store.objects[object.0].fields[ClassPlan::field_index(offset)] = value;
        }
        Ok(())
    }

    pub(crate) fn class_plan(&self, class: ClassTyId) -> Result<&'a ClassPlan, InterpreterError> {
        let plan = self.plan;
        plan.class(class)
            .ok_or_else(|| InterpreterError::InvalidOperation(format!("class {class:?} was not planned")))
    }

    /// Function value of a module-level function declaration
    pub(crate) fn function_value(&mut self, function: FunctionId) -> ClosureRef {
        if let Some(closure) = self.function_values.get(&function) {
            return *closure;
        }
        let closure = self.store.alloc_closure(function, None);
        self.function_values.insert(function, closure);
        closure
    }

    // Variables

    fn storage(&self, symbol: SymbolId) -> Result<VarStorage, InterpreterError> {
        self.plan
            .storage(self.frame.function, symbol)
            .ok_or_else(|| InterpreterError::NoStorage {
                name: self.scopes.symbol_name(symbol).to_string(),
            })
    }

    fn cell_context(&self, hops: usize) -> Result<ContextRef, InterpreterError> {
        let mut current = self.frame.context.or(self.frame.env);
        for _ in 0..hops {
            current = current.and_then(|context| self.store.parent(context));
        }
        current.ok_or_else(|| InterpreterError::InvalidOperation("context chain ended early".to_string()))
    }

    pub(crate) fn read_var(&mut self, symbol: SymbolId) -> Result<Value, InterpreterError> {
        Ok(match self.storage(symbol)? {
            VarStorage::Param(slot) | VarStorage::Local(slot) | VarStorage::Dynamic(slot) => {
                self.frame.slots[slot].clone()
            }
            VarStorage::Cell { hops, field } => {
                let context = self.cell_context(hops)?;
                self.store.contexts[context.0][field].clone()
            }
            VarStorage::Global(index) => self.globals[index].clone(),
            VarStorage::Function(function) => Value::Closure(self.function_value(function)),
            VarStorage::Class(class) => Value::Class(class),
            VarStorage::Builtin => Value::Builtin,
        })
    }

    pub(crate) fn write_var(&mut self, symbol: SymbolId, value: Value) -> Result<(), InterpreterError> {
        match self.storage(symbol)? {
            VarStorage::Param(slot) | VarStorage::Local(slot) | VarStorage::Dynamic(slot) => {
                self.frame.slots[slot] = value;
            }
            VarStorage::Cell { hops, field } => {
                let context = self.cell_context(hops)?;
                self.store.contexts[context.0][field] = value;
            }
            VarStorage::Global(index) => self.globals[index] = value,
            VarStorage::Function(_) | VarStorage::Class(_) | VarStorage::Builtin => {
                return Err(InterpreterError::InvalidOperation(format!(
                    "`{}` is not assignable",
                    self.scopes.symbol_name(symbol)
                )));
            }
        }
        Ok(())
    }

    // Statements

    pub(crate) fn execute_block(&mut self, stmts: &[StmtId]) -> Result<Flow, InterpreterError> {
        for stmt in stmts {
            match self.execute_statement(*stmt)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn execute_statement(&mut self, stmt: StmtId) -> Result<Flow, InterpreterError> {
        let program = self.program;
        match &program.stmts[stmt].kind {
            StmtKind::Let { symbol, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(*init)?,
                    None => Value::Undefined,
                };
                let ty = self.scopes.symbol(*symbol).ty.unwrap_or(TyTable::ANY);
                let value = self.conform(value, ty)?;
                self.write_var(*symbol, value)?;
            }
            StmtKind::Expr(expr) => {
                self.eval(*expr)?;
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(*value)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { cond, then, otherwise } => {
                let cond = self.eval(*cond)?;
                if self.truthy(&cond) {
                    return self.execute_statement(*then);
                }
                if let Some(otherwise) = otherwise {
                    return self.execute_statement(*otherwise);
                }
            }
            StmtKind::While { cond, body } => loop {
                let value = self.eval(*cond)?;
                if !self.truthy(&value) {
                    break;
                }
                match self.execute_statement(*body)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Next | Flow::Continue => {}
                }
            },
            StmtKind::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.execute_statement(*init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let value = self.eval(*cond)?;
                        if !self.truthy(&value) {
                            break;
                        }
                    }
                    match self.execute_statement(*body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(*update)?;
                    }
                }
            }
            StmtKind::Block { stmts, .. } => return self.execute_block(stmts),
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            // bound on function entry
            StmtKind::Function(_) => {}
            StmtKind::Class(class) => self.init_statics(*class)?,
        }
        Ok(Flow::Next)
    }

    /// Initialize every static slot of a class, inherited ones included
    fn init_statics(&mut self, class: ClassDefId) -> Result<(), InterpreterError> {
        let Some(class_ty) = self.results.class_of_def(class) else {
            return Ok(());
        };
        let plan = self.plan;
        for global in &self.class_plan(class_ty)?.statics {
            if let GlobalKind::Static { init: Some(init), .. } = plan.globals[*global].kind {
                let value = self.eval(init)?;
                self.globals[*global] = value;
            }
        }
        Ok(())
    }

    // Values

    /// Apply the coercion the checker recorded for `expr`
    pub(crate) fn coerce(&mut self, expr: ql_hir::ExprId, value: Value) -> Result<Value, InterpreterError> {
        match self.results.coercion(expr) {
            Coercion::Identity | Coercion::NullRef => Ok(value),
            Coercion::Box => {
                let ty = self.results.type_of(expr);
                self.boxed(&value, ty).map(Value::Dyn)
            }
            Coercion::Unbox(ty) => self.unboxed(value, ty),
        }
    }

    /// Box `value`; objects are recorded under their runtime class
    pub(crate) fn boxed(&mut self, value: &Value, ty: TyId) -> Result<DynValue, InterpreterError> {
        let ty = match value {
            Value::Object(object) => {
                let class = self.store.objects[object.0].class;
                self.results.ctx.classes[class].instance
            }
            _ => ty,
        };
        box_value(&mut self.heap, value, ty).ok_or_else(|| self.mismatch("a boxable value", value))
    }

    pub(crate) fn unboxed(&mut self, value: Value, ty: TyId) -> Result<Value, InterpreterError> {
        match value {
            Value::Dyn(value) => Ok(from_unboxed(self.heap.unbox(&value, ty, &self.results.ctx)?)),
            other => Ok(other),
        }
    }

    /// Make `value` fit a slot of static type `ty`
    pub(crate) fn conform(&mut self, value: Value, ty: TyId) -> Result<Value, InterpreterError> {
        let is_any = self.results.ctx.is_any(ty);
        match value {
            Value::Dyn(_) if !is_any => self.unboxed(value, ty),
            Value::Dyn(_) => Ok(value),
            other if is_any => {
                let static_ty = match other {
                    Value::Number(_) => TyTable::NUMBER,
                    Value::Bool(_) => TyTable::BOOLEAN,
                    Value::String(_) => TyTable::STRING,
                    Value::Null => TyTable::NULL,
                    Value::Undefined => TyTable::UNDEFINED,
                    _ => TyTable::ANY,
                };
                self.boxed(&other, static_ty).map(Value::Dyn)
            }
            other => Ok(other),
        }
    }

    pub(crate) fn truthy(&self, value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Bool(flag) => *flag,
            Value::String(text) => !text.is_empty(),
            Value::Dyn(value) => self.heap.truthy(value),
            Value::Object(_)
            | Value::Array(_)
            | Value::Closure(_)
            | Value::Class(_)
            | Value::Builtin
            | Value::Context(_) => true,
        }
    }

    pub(crate) fn strict_equal(&self, lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            #[allow(clippy::float_cmp, reason = "strict equality compares payloads exactly")]
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::Dyn(left), Value::Dyn(right)) => self.heap.compare(CompareOp::StrictEq, left, right),
            (left, right) => left == right,
        }
    }

    pub(crate) fn host(&mut self) -> (Host<'_>, &mut DynHeap) {
        (
            Host {
                store: &mut self.store,
                ctx: &self.results.ctx,
                scopes: self.scopes,
            },
            &mut self.heap,
        )
    }

    pub(crate) fn is_extref_array(&self, value: &DynValue) -> bool {
        match value {
            DynValue::Array(_) => true,
            DynValue::ExtRef(id) => self.heap.extref(*id).is_ok_and(|entry| entry.kind == ExtRefKind::Array),
            _ => false,
        }
    }

    pub(crate) fn object_of(&self, value: &Value) -> Result<ObjectRef, InterpreterError> {
        match value {
            Value::Object(object) => Ok(*object),
            other => Err(self.mismatch("an object", other)),
        }
    }

    pub(crate) fn mismatch(&self, expected: &str, got: &Value) -> InterpreterError {
        InterpreterError::TypeMismatch {
            expected: expected.to_string(),
            got: self.display(got),
        }
    }

    pub(crate) fn print(&mut self, line: String) {
        debug!(%line, "console.log");
        self.output.push(line);
    }
}
