//! Expressions, assignment targets and calls

use crate::interpreter::{Interpreter, InterpreterError, Receiver};
use crate::value::{ArrayRef, ObjectRef, Value};
use ql_dyn::{ArithOp, CompareOp, DynError, DynValue, MAX_ARRAY_LENGTH};
use ql_hir::{BinaryOp, ExprId, ExprKind, FunctionId, FunctionKind, Literal, MethodKind, SymbolId, UnaryOp};
use ql_intern::Name;
use ql_ty::{BuiltinFn, CallTarget, ClassTyId, MemberAccess, TyTable};
use std::rc::Rc;

/// Something an expression can be assigned to
#[derive(Debug, Clone)]
enum Place {
    Var(SymbolId),
    Field(ObjectRef, usize),
    Global(usize),
    Accessor {
        this: Value,
        getter: Option<FunctionId>,
        setter: Option<FunctionId>,
    },
    Element(ArrayRef, f64),
    Char(Rc<str>, f64),
    Length(Value),
    DynProp(DynValue, Rc<str>),
    DynElem(DynValue, DynValue),
}

impl Interpreter<'_> {
    /// Evaluate an expression and apply its recorded coercion
    pub(crate) fn eval(&mut self, expr: ExprId) -> Result<Value, InterpreterError> {
        let value = self.eval_raw(expr)?;
        self.coerce(expr, value)
    }

    fn eval_all(&mut self, exprs: &[ExprId]) -> Result<Vec<Value>, InterpreterError> {
        exprs.iter().map(|expr| self.eval(*expr)).collect()
    }

    fn eval_raw(&mut self, expr: ExprId) -> Result<Value, InterpreterError> {
        let program = self.program;
        match &program.exprs[expr].kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Number(value) => Value::Number(*value),
                Literal::String(text) => Value::string(self.scopes.name(*text)),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            ExprKind::Var(symbol) | ExprKind::This(symbol) => self.read_var(*symbol),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, *lhs, *rhs),
            ExprKind::Unary { op, operand } => self.eval_unary(*op, *operand),
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, *target, *value),
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => self.eval_update(*increment, *prefix, *target),
            ExprKind::Call { callee, args } => self.eval_call(expr, *callee, args),
            ExprKind::SuperCall { this, args } => {
                let Some(CallTarget::SuperConstructor { class: base }) = self.results.call_target(expr) else {
                    return Err(InterpreterError::InvalidOperation("unchecked `super` call".to_string()));
                };
                let args = self.eval_all(args)?;
                let this = self.read_var(*this)?;
                self.construct_base(base, this, args)?;
                if let Some(FunctionKind::Constructor { class }) =
                    self.frame.function.map(|function| program.functions[function].kind)
                {
                    self.init_fields(class)?;
                }
                Ok(Value::Undefined)
            }
            ExprKind::SuperMember { .. } => Err(InterpreterError::InvalidOperation(
                "`super` member outside a call".to_string(),
            )),
            ExprKind::New { class, args } => {
                let class = self.class_of_symbol(*class)?;
                let args = self.eval_all(args)?;
                self.instantiate(class, args)
            }
            ExprKind::Member { .. } | ExprKind::Index { .. } => {
                let place = self.place(expr)?;
                self.read_place(place)
            }
            ExprKind::Array(elements) => {
                let elements = self.eval_all(elements)?;
                Ok(Value::Array(self.store.alloc_array(elements)))
            }
            ExprKind::Object(fields) => {
                let class = self
                    .results
                    .ctx
                    .types
                    .class(self.results.type_of(expr))
                    .ok_or_else(|| InterpreterError::InvalidOperation("object literal without a shape".to_string()))?;
                let class_plan = self.class_plan(class)?;
                let object = self.store.alloc_object(class_plan);
                for (name, value) in fields {
                    let value = self.eval(*value)?;
                    if let Some(offset) = class_plan.offset_of(*name) {
                        self.store.objects[object.0].fields[ql_lower::ClassPlan::field_index(offset)] = value;
                    }
                }
                Ok(Value::Object(object))
            }
            ExprKind::Closure(function) => {
                let env = self.frame.context.or(self.frame.env);
                Ok(Value::Closure(self.store.alloc_closure(*function, env)))
            }
            ExprKind::Conditional { cond, then, otherwise } => {
                let cond = self.eval(*cond)?;
                if self.truthy(&cond) {
                    self.eval(*then)
                } else {
                    self.eval(*otherwise)
                }
            }
            // the conversion is recorded on the operand
            ExprKind::As { expr: inner, .. } => self.eval(*inner),
            ExprKind::InstanceOf { expr: inner, class } => {
                let class = self.class_of_symbol(*class)?;
                let value = self.eval(*inner)?;
                Ok(Value::Bool(match &value {
                    Value::Object(object) => self.results.ctx.is_subclass(self.store.objects[object.0].class, class),
                    Value::Dyn(value) => {
                        let instance = self.results.ctx.classes[class].instance;
                        self.heap.instance_of(value, instance, &self.results.ctx)
                    }
                    _ => false,
                }))
            }
        }
    }

    fn class_of_symbol(&self, symbol: SymbolId) -> Result<ClassTyId, InterpreterError> {
        self.program
            .class_of_symbol(symbol)
            .and_then(|def| self.results.class_of_def(def))
            .ok_or_else(|| InterpreterError::InvalidOperation(format!("`{}` is not a class", self.scopes.symbol_name(symbol))))
    }

    fn number(&self, value: &Value) -> Result<f64, InterpreterError> {
        match value {
            Value::Number(number) => Ok(*number),
            Value::Dyn(value) => Ok(self.heap.to_number(value)),
            other => Err(self.mismatch("a number", other)),
        }
    }

    // Operators

    fn eval_binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Result<Value, InterpreterError> {
        let left = self.eval(lhs)?;
        match op {
            BinaryOp::And if !self.truthy(&left) => return Ok(left),
            BinaryOp::Or if self.truthy(&left) => return Ok(left),
            BinaryOp::And | BinaryOp::Or => return self.eval(rhs),
            _ => {}
        }
        let right = self.eval(rhs)?;
        self.binary_values(op, left, right)
    }

    fn binary_values(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value, InterpreterError> {
        if matches!(left, Value::Dyn(_)) || matches!(right, Value::Dyn(_)) {
            let left = self.conform(left, TyTable::ANY)?;
            let right = self.conform(right, TyTable::ANY)?;
            let (Value::Dyn(left), Value::Dyn(right)) = (&left, &right) else {
                return Err(InterpreterError::InvalidOperation("operand did not box".to_string()));
            };
            return Ok(match op {
                BinaryOp::Add => Value::Dyn(self.heap.arithmetic(ArithOp::Add, left, right)),
                BinaryOp::Sub => Value::Dyn(self.heap.arithmetic(ArithOp::Sub, left, right)),
                BinaryOp::Mul => Value::Dyn(self.heap.arithmetic(ArithOp::Mul, left, right)),
                BinaryOp::Div => Value::Dyn(self.heap.arithmetic(ArithOp::Div, left, right)),
                BinaryOp::Mod => Value::Dyn(self.heap.arithmetic(ArithOp::Mod, left, right)),
                BinaryOp::Lt => Value::Bool(self.heap.compare(CompareOp::Lt, left, right)),
                BinaryOp::Gt => Value::Bool(self.heap.compare(CompareOp::Gt, left, right)),
                BinaryOp::Le => Value::Bool(self.heap.compare(CompareOp::Le, left, right)),
                BinaryOp::Ge => Value::Bool(self.heap.compare(CompareOp::Ge, left, right)),
                BinaryOp::Eq => Value::Bool(self.heap.compare(CompareOp::StrictEq, left, right)),
                BinaryOp::Ne => Value::Bool(self.heap.compare(CompareOp::StrictNe, left, right)),
                BinaryOp::And if self.heap.truthy(left) => Value::Dyn(right.clone()),
                BinaryOp::Or if !self.heap.truthy(left) => Value::Dyn(right.clone()),
                BinaryOp::And | BinaryOp::Or => Value::Dyn(left.clone()),
            });
        }
        Ok(match op {
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(left), Value::Number(right)) => Value::Number(left + right),
                _ => {
                    let mut text = self.display(&left);
                    text.push_str(&self.display(&right));
                    Value::String(Rc::from(text))
                }
            },
            BinaryOp::Sub => Value::Number(self.number(&left)? - self.number(&right)?),
            BinaryOp::Mul => Value::Number(self.number(&left)? * self.number(&right)?),
            BinaryOp::Div => Value::Number(self.number(&left)? / self.number(&right)?),
            BinaryOp::Mod => Value::Number(self.number(&left)? % self.number(&right)?),
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::String(left), Value::String(right)) => left.partial_cmp(right),
                    _ => self.number(&left)?.partial_cmp(&self.number(&right)?),
                };
                Value::Bool(ordering.is_some_and(|ordering| match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Gt => ordering.is_gt(),
                    BinaryOp::Le => ordering.is_le(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Eq => Value::Bool(self.strict_equal(&left, &right)),
            BinaryOp::Ne => Value::Bool(!self.strict_equal(&left, &right)),
            BinaryOp::And if self.truthy(&left) => right,
            BinaryOp::Or if !self.truthy(&left) => right,
            BinaryOp::And | BinaryOp::Or => left,
        })
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: ExprId) -> Result<Value, InterpreterError> {
        let value = self.eval(operand)?;
        Ok(match (op, &value) {
            (UnaryOp::Neg, Value::Dyn(value)) => Value::Dyn(self.heap.negate(value)),
            (UnaryOp::Plus, Value::Dyn(value)) => Value::Dyn(DynValue::Number(self.heap.to_number(value))),
            (UnaryOp::Neg, other) => Value::Number(-self.number(other)?),
            (UnaryOp::Plus, other) => Value::Number(self.number(other)?),
            (UnaryOp::Not, other) => Value::Bool(!self.truthy(other)),
            (UnaryOp::TypeOf, other) => Value::string(self.type_of_value(other)),
        })
    }

    fn eval_assign(&mut self, op: Option<BinaryOp>, target: ExprId, value: ExprId) -> Result<Value, InterpreterError> {
        let place = self.place(target)?;
        let value = match op {
            None => self.eval(value)?,
            Some(op) => {
                let current = self.read_place(place.clone())?;
                let current = self.coerce(target, current)?;
                let operand = self.eval(value)?;
                let result = self.binary_values(op, current, operand)?;
                self.conform(result, self.results.type_of(target))?
            }
        };
        self.write_place(place, value.clone())?;
        Ok(value)
    }

    fn eval_update(&mut self, increment: bool, prefix: bool, target: ExprId) -> Result<Value, InterpreterError> {
        let place = self.place(target)?;
        let current = self.read_place(place.clone())?;
        let old = self.number(&current)?;
        let new = if increment { old + 1.0 } else { old - 1.0 };
        let (old, new) = match current {
            Value::Dyn(_) => (Value::Dyn(DynValue::Number(old)), Value::Dyn(DynValue::Number(new))),
            _ => (Value::Number(old), Value::Number(new)),
        };
        self.write_place(place, new.clone())?;
        Ok(if prefix { new } else { old })
    }

    // Places

    fn place(&mut self, expr: ExprId) -> Result<Place, InterpreterError> {
        let program = self.program;
        match &program.exprs[expr].kind {
            ExprKind::Var(symbol) | ExprKind::This(symbol) => Ok(Place::Var(*symbol)),
            ExprKind::Member { object, name } => {
                let access = self
                    .results
                    .member(expr)
                    .ok_or_else(|| InterpreterError::InvalidOperation("unchecked member access".to_string()))?;
                if let MemberAccess::Static { class, slot } = access {
                    let global = self.class_plan(class)?.statics.get(slot).copied();
                    return global
                        .map(Place::Global)
                        .ok_or_else(|| InterpreterError::InvalidOperation("static slot without a global".to_string()));
                }
                let object = self.eval(*object)?;
                self.member_place(object, access, *name)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(*object)?;
                let index = self.eval(*index)?;
                match (object, index) {
                    (Value::Dyn(object), key) => {
                        let Value::Dyn(key) = self.conform(key, TyTable::ANY)? else {
                            return Err(InterpreterError::InvalidOperation("key did not box".to_string()));
                        };
                        Ok(Place::DynElem(object, key))
                    }
                    (Value::Array(array), index) => Ok(Place::Element(array, self.number(&index)?)),
                    (Value::String(text), index) => Ok(Place::Char(text, self.number(&index)?)),
                    (other, _) => Err(self.mismatch("an array or string", &other)),
                }
            }
            _ => Err(InterpreterError::InvalidOperation("not an assignment target".to_string())),
        }
    }

    fn member_place(&mut self, object: Value, access: MemberAccess, name: Name) -> Result<Place, InterpreterError> {
        let (scopes, results) = (self.scopes, self.results);
        match access {
            MemberAccess::Field { index } => Ok(Place::Field(self.object_of(&object)?, index)),
            MemberAccess::Accessor { getter, setter } => {
                let vtable = &self.class_plan(self.runtime_class(&object)?)?.vtable;
                Ok(Place::Accessor {
                    getter: getter.and_then(|slot| vtable.get(slot)).map(|slot| slot.function),
                    setter: setter.and_then(|slot| vtable.get(slot)).map(|slot| slot.function),
                    this: object,
                })
            }
            MemberAccess::Interface { name } => {
                let class = self.runtime_class(&object)?;
                let info = &results.ctx.classes[class];
                if let Some((index, _)) = info.field(name) {
                    return Ok(Place::Field(self.object_of(&object)?, index));
                }
                let (getter, setter) = info.accessor(name);
                if getter.is_none() && setter.is_none() {
                    return Err(InterpreterError::InvalidOperation(format!(
                        "object has no member `{}`",
                        scopes.name(name)
                    )));
                }
                let vtable = &self.class_plan(class)?.vtable;
                Ok(Place::Accessor {
                    getter: getter.and_then(|slot| vtable.get(slot)).map(|slot| slot.function),
                    setter: setter.and_then(|slot| vtable.get(slot)).map(|slot| slot.function),
                    this: object,
                })
            }
            MemberAccess::Length => Ok(Place::Length(object)),
            MemberAccess::Dynamic { name } => match object {
                Value::Dyn(object) => Ok(Place::DynProp(object, Rc::from(scopes.name(name)))),
                other => Err(self.mismatch("a value of type any", &other)),
            },
            MemberAccess::Static { .. } => Err(InterpreterError::InvalidOperation(format!(
                "static member `{}` on an instance",
                scopes.name(name)
            ))),
        }
    }

    fn runtime_class(&self, value: &Value) -> Result<ClassTyId, InterpreterError> {
        let object = self.object_of(value)?;
        Ok(self.store.objects[object.0].class)
    }

    fn read_place(&mut self, place: Place) -> Result<Value, InterpreterError> {
        match place {
            Place::Var(symbol) => self.read_var(symbol),
            Place::Field(object, index) => Ok(self.store.objects[object.0].fields[index].clone()),
            Place::Global(index) => Ok(self.globals[index].clone()),
            Place::Accessor { this, getter, .. } => {
                let getter =
                    getter.ok_or_else(|| InterpreterError::InvalidOperation("property has no getter".to_string()))?;
                self.call_function(getter, Receiver::This(this), Vec::new())
            }
            Place::Element(array, index) => Ok(element_index(index)
                .and_then(|index| self.store.arrays[array.0].get(index))
                .cloned()
                .unwrap_or(Value::Undefined)),
            Place::Char(text, index) => Ok(element_index(index)
                .and_then(|index| text.chars().nth(index))
                .map_or(Value::Undefined, |ch| Value::String(Rc::from(ch.to_string())))),
            Place::Length(value) => match &value {
                Value::String(text) => Ok(Value::Number(text.chars().count() as f64)),
                Value::Array(array) => Ok(Value::Number(self.store.arrays[array.0].len() as f64)),
                other => Err(self.mismatch("an array or string", other)),
            },
            Place::DynProp(object, name) => self.dyn_get(&object, &name),
            Place::DynElem(object, key) => {
                let (mut host, heap) = self.host();
                Ok(Value::Dyn(heap.get_elem(&mut host, &object, &key)?))
            }
        }
    }

    fn dyn_get(&mut self, object: &DynValue, name: &str) -> Result<Value, InterpreterError> {
        let (mut host, heap) = self.host();
        Ok(Value::Dyn(heap.get_property(&mut host, object, name)?))
    }

    fn write_place(&mut self, place: Place, value: Value) -> Result<(), InterpreterError> {
        match place {
            Place::Var(symbol) => self.write_var(symbol, value)?,
            Place::Field(object, index) => self.store.objects[object.0].fields[index] = value,
            Place::Global(index) => self.globals[index] = value,
            Place::Accessor { this, setter, .. } => {
                let setter =
                    setter.ok_or_else(|| InterpreterError::InvalidOperation("property has no setter".to_string()))?;
                self.call_function(setter, Receiver::This(this), vec![value])?;
            }
            Place::Element(array, index) => {
                let index = element_index(index)
                    .ok_or_else(|| InterpreterError::InvalidOperation(format!("bad array index {index}")))?;
                if index >= MAX_ARRAY_LENGTH {
                    return Err(DynError::IndexOutOfRange {
                        index,
                        limit: MAX_ARRAY_LENGTH,
                    }
                    .into());
                }
                let elements = &mut self.store.arrays[array.0];
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
            }
            Place::Char(..) | Place::Length(_) => {
                return Err(InterpreterError::InvalidOperation("assignment to a read-only property".to_string()));
            }
            Place::DynProp(object, name) => self.dyn_set(&object, &name, value)?,
            Place::DynElem(object, key) => {
                let Value::Dyn(value) = self.conform(value, TyTable::ANY)? else {
                    return Err(InterpreterError::InvalidOperation("value did not box".to_string()));
                };
                let (mut host, heap) = self.host();
                heap.set_elem(&mut host, &object, &key, value)?;
            }
        }
        Ok(())
    }

    fn dyn_set(&mut self, object: &DynValue, name: &str, value: Value) -> Result<(), InterpreterError> {
        let Value::Dyn(value) = self.conform(value, TyTable::ANY)? else {
            return Err(InterpreterError::InvalidOperation("value did not box".to_string()));
        };
        let (mut host, heap) = self.host();
        heap.set_property(&mut host, object, name, value)?;
        Ok(())
    }

    // Calls

    fn eval_call(&mut self, expr: ExprId, callee: ExprId, args: &[ExprId]) -> Result<Value, InterpreterError> {
        let (program, results) = (self.program, self.results);
        let target = self
            .results
            .call_target(expr)
            .ok_or_else(|| InterpreterError::InvalidOperation("unchecked call".to_string()))?;
        let receiver = || match &program.exprs[callee].kind {
            ExprKind::Member { object, .. } => Ok(*object),
            _ => Err(InterpreterError::InvalidOperation("method call without a receiver".to_string())),
        };
        match target {
            CallTarget::Direct(function) => {
                let args = self.eval_all(args)?;
                self.call_function(function, Receiver::Env(None), args)
            }
            CallTarget::Virtual { slot } => {
                let this = self.eval(receiver()?)?;
                let args = self.eval_all(args)?;
                let function = self
                    .class_plan(self.runtime_class(&this)?)?
                    .vtable
                    .get(slot)
                    .map(|slot| slot.function)
                    .ok_or_else(|| InterpreterError::InvalidOperation(format!("vtable has no slot {slot}")))?;
                self.call_function(function, Receiver::This(this), args)
            }
            CallTarget::Interface { name } => {
                let this = self.eval(receiver()?)?;
                let args = self.eval_all(args)?;
                let class = self.runtime_class(&this)?;
                let info = &results.ctx.classes[class];
                if let Some((slot, _)) = info.method(name, MethodKind::Method) {
                    let function = self.class_plan(class)?.vtable[slot].function;
                    return self.call_function(function, Receiver::This(this), args);
                }
                if let Some((index, _)) = info.field(name) {
                    let object = self.object_of(&this)?;
                    let callee = self.store.objects[object.0].fields[index].clone();
                    return self.call_value(&callee, args);
                }
                Err(InterpreterError::NotCallable(self.scopes.name(name).to_string()))
            }
            CallTarget::Static { function, .. } => {
                let args = self.eval_all(args)?;
                self.call_function(function, Receiver::None, args)
            }
            CallTarget::SuperMethod { function } => {
                let ExprKind::SuperMember { this, .. } = &program.exprs[callee].kind else {
                    return Err(InterpreterError::InvalidOperation("`super` call without `super`".to_string()));
                };
                let this = self.read_var(*this)?;
                let args = self.eval_all(args)?;
                self.call_function(function, Receiver::This(this), args)
            }
            CallTarget::SuperConstructor { .. } => {
                Err(InterpreterError::InvalidOperation("`super(...)` reached a plain call".to_string()))
            }
            CallTarget::Closure => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                self.call_value(&callee, args)
            }
            CallTarget::Builtin(builtin) => {
                let this = match builtin {
                    BuiltinFn::ArrayPush | BuiltinFn::ArrayPop => Some(self.eval(receiver()?)?),
                    _ => None,
                };
                let args = self.eval_all(args)?;
                self.call_builtin(builtin, this, args)
            }
        }
    }

    fn call_builtin(&mut self, builtin: BuiltinFn, this: Option<Value>, args: Vec<Value>) -> Result<Value, InterpreterError> {
        match builtin {
            BuiltinFn::ConsoleLog => {
                let line = args.iter().map(|arg| self.display(arg)).collect::<Vec<_>>().join(" ");
                self.print(line);
                Ok(Value::Undefined)
            }
            BuiltinFn::ArrayIsArray => Ok(Value::Bool(match args.first() {
                Some(Value::Array(_)) => true,
                Some(Value::Dyn(value)) => self.is_extref_array(value),
                _ => false,
            })),
            BuiltinFn::NumberIsInteger => Ok(Value::Bool(match args.first() {
                Some(Value::Number(number) | Value::Dyn(DynValue::Number(number))) => {
                    number.is_finite() && number.fract() == 0.0
                }
                _ => false,
            })),
            BuiltinFn::ArrayPush | BuiltinFn::ArrayPop => {
                let Some(Value::Array(array)) = this else {
                    return Err(InterpreterError::InvalidOperation("array builtin without an array".to_string()));
                };
                let elements = &mut self.store.arrays[array.0];
                if builtin == BuiltinFn::ArrayPop {
                    return Ok(elements.pop().unwrap_or(Value::Undefined));
                }
                elements.extend(args);
                Ok(Value::Number(elements.len() as f64))
            }
            numeric => {
                let numbers = args.iter().map(|arg| self.number(arg)).collect::<Result<Vec<_>, _>>()?;
                numeric
                    .apply_numeric(&numbers)
                    .map(Value::Number)
                    .ok_or_else(|| InterpreterError::InvalidOperation(format!("{numeric:?} is not numeric")))
            }
        }
    }
}

/// Integral, in-range index
fn element_index(index: f64) -> Option<usize> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "checked integral and non-negative")]
    (index >= 0.0 && index.fract() == 0.0 && index < usize::MAX as f64).then_some(index as usize)
}
