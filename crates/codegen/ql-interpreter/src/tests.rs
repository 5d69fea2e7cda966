use crate::{Interpreter, InterpreterError, Value};
use ql_ast::build::*;
use ql_ast::{BinaryOp, Expr, Param, Stmt};
use ql_closure::analyze_program;
use ql_dyn::{DynError, DynTag, DynValue, UnboxError};
use ql_hir_lower::{lower_unit, LowerOptions, LoweredUnit};
use ql_lower::{plan_program, LoweringPlan, PlanOptions};
use ql_ty::{check_program, CheckOptions, TypeckResults, BUILTINS};

struct Compiled {
    unit: LoweredUnit,
    results: TypeckResults,
    plan: LoweringPlan,
}

impl Compiled {
    fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(&self.unit.program, &self.unit.scopes, &self.results, &self.plan)
    }
}

fn compile(items: Vec<Stmt>) -> Compiled {
    let modules = vec![module("main", items)];
    let options = LowerOptions {
        builtin_values: BUILTINS.namespace_names(),
        import_builtins: true,
    };
    let mut unit = lower_unit(&modules, "main", &options).unwrap();
    let mut results = check_program(&unit.program, &mut unit.scopes, &BUILTINS, &CheckOptions::default()).unwrap();
    let closures = analyze_program(&unit.program, &mut unit.scopes, &mut results.ctx.types).unwrap();
    let plan = plan_program(&unit.program, &unit.scopes, &results, &closures, &PlanOptions::default()).unwrap();
    Compiled { unit, results, plan }
}

fn run(items: Vec<Stmt>) -> Result<Value, InterpreterError> {
    let compiled = compile(items);
    compiled.interpreter().call_export("run", Vec::new())
}

fn runner(ret: &str, body: Vec<Stmt>) -> Stmt {
    function_stmt(function("run", vec![], Some(ty(ret)), body).exported())
}

fn number(name: &str) -> Param {
    param(name, Some(ty("number")))
}

fn this_member(name: &str) -> Expr {
    member(this(), name)
}

#[test]
fn test_override_through_base_typed_variable() {
    let base = class("A")
        .field("_a", Some(ty("number")), None)
        .constructor(vec![number("a")], vec![expr_stmt(assign(this_member("_a"), ident("a")))])
        .method(
            "test",
            vec![number("m")],
            Some(ty("number")),
            vec![return_(add(ident("m"), this_member("_a")))],
        );
    let derived = class("B")
        .extends("A")
        .field("_b", Some(ty("number")), None)
        .constructor(
            vec![number("a"), number("b")],
            vec![
                expr_stmt(call(super_(), vec![ident("a")])),
                expr_stmt(assign(this_member("_b"), ident("b"))),
            ],
        )
        .method(
            "test",
            vec![number("m")],
            Some(ty("number")),
            vec![return_(add(ident("m"), this_member("_b")))],
        );
    let result = run(vec![
        class_stmt(base),
        class_stmt(derived),
        runner(
            "number",
            vec![
                let_("a", Some(ty("A")), Some(new("B", vec![num(10.0), num(11.0)]))),
                return_(method_call(ident("a"), "test", vec![num(5.0)])),
            ],
        ),
    ])
    .unwrap();
    assert_eq!(result, Value::Number(16.0));
}

#[test]
fn test_closures_share_a_counter() {
    let counter = |name: &str, up: bool| {
        let update = if up {
            increment(ident("i"), false)
        } else {
            decrement(ident("i"), false)
        };
        function_stmt(function(
            name,
            vec![],
            Some(ty("number")),
            vec![expr_stmt(update), return_(ident("i"))],
        ))
    };
    let outer = function(
        "outer",
        vec![],
        Some(array_ty(fn_ty(vec![], ty("number")))),
        vec![
            let_("i", Some(ty("number")), Some(num(10.0))),
            counter("inc", true),
            counter("dec", false),
            return_(array(vec![ident("inc"), ident("dec")])),
        ],
    )
    .exported();
    let compiled = compile(vec![function_stmt(outer)]);
    let mut interpreter = compiled.interpreter();
    let pair = interpreter.call_export("outer", Vec::new()).unwrap();
    let functions = interpreter.array(&pair).unwrap().to_vec();
    assert_eq!(interpreter.call_value(&functions[0], Vec::new()).unwrap(), Value::Number(11.0));
    assert_eq!(interpreter.call_value(&functions[1], Vec::new()).unwrap(), Value::Number(10.0));
}

#[test]
fn test_literal_and_class_through_interface() {
    let shape = interface("I").field("x", ty("number")).field("y", ty("boolean"));
    let foo = class("Foo")
        .field("x", Some(ty("number")), Some(num(1.0)))
        .field("y", Some(ty("boolean")), Some(boolean(false)));
    let result = run(vec![
        interface_stmt(shape),
        class_stmt(foo),
        runner(
            "number",
            vec![
                let_("a", Some(ty("I")), Some(object(vec![("x", num(1.0)), ("y", boolean(true))]))),
                let_("b", Some(ty("I")), Some(new("Foo", vec![]))),
                return_(add(member(ident("a"), "x"), member(ident("b"), "x"))),
            ],
        ),
    ])
    .unwrap();
    assert_eq!(result, Value::Number(2.0));
}

#[test]
fn test_boxed_number_plus_boolean() {
    let result = run(vec![runner(
        "any",
        vec![
            let_("a", Some(ty("any")), Some(num(1.0))),
            return_(add(ident("a"), boolean(true))),
        ],
    )])
    .unwrap();
    assert_eq!(result, Value::Dyn(DynValue::Number(2.0)));
}

#[test]
fn test_typeof() {
    let result = run(vec![runner(
        "string",
        vec![
            let_("a", Some(ty("any")), Some(string("s"))),
            let_("n", Some(ty("number")), Some(num(3.0))),
            return_(add(type_of(ident("a")), type_of(ident("n")))),
        ],
    )])
    .unwrap();
    assert_eq!(result, Value::string("stringnumber"));
}

#[test]
fn test_narrowing_the_wrong_tag_fails() {
    let error = run(vec![runner(
        "number",
        vec![
            let_("a", Some(ty("any")), Some(string("x"))),
            return_(cast(ident("a"), ty("number"))),
        ],
    )])
    .unwrap_err();
    assert!(matches!(error, InterpreterError::Unbox(UnboxError { found: DynTag::String, .. })), "{error:?}");
}

#[test]
fn test_console_log_collects_output() {
    let compiled = compile(vec![runner(
        "void",
        vec![expr_stmt(method_call(
            ident("console"),
            "log",
            vec![string("n="), num(4.0), boolean(true)],
        ))],
    )]);
    let mut interpreter = compiled.interpreter();
    interpreter.call_export("run", Vec::new()).unwrap();
    assert_eq!(interpreter.output(), ["n= 4 true"]);
}

#[test]
fn test_statics_and_module_variables() {
    let counter = class("Counter")
        .static_field("count", Some(ty("number")), Some(num(0.0)))
        .static_method(
            "bump",
            vec![],
            Some(ty("number")),
            vec![
                expr_stmt(compound_assign(BinaryOp::Add, member(ident("Counter"), "count"), num(1.0))),
                return_(member(ident("Counter"), "count")),
            ],
        );
    let compiled = compile(vec![
        let_("total", Some(ty("number")), Some(num(5.0))),
        class_stmt(counter),
        runner(
            "number",
            vec![
                expr_stmt(method_call(ident("Counter"), "bump", vec![])),
                return_(add(method_call(ident("Counter"), "bump", vec![]), ident("total"))),
            ],
        ),
    ]);
    let mut interpreter = compiled.interpreter();
    assert_eq!(interpreter.call_export("run", Vec::new()).unwrap(), Value::Number(7.0));
    assert_eq!(interpreter.global("main", "total"), Some(&Value::Number(5.0)));
    assert_eq!(interpreter.static_field("main", "Counter", "count"), Some(&Value::Number(2.0)));
}

#[test]
fn test_accessors() {
    let temperature = class("Temp")
        .field("_c", Some(ty("number")), Some(num(0.0)))
        .getter(
            "f",
            ty("number"),
            vec![return_(binary(BinaryOp::Mul, this_member("_c"), num(2.0)))],
        )
        .setter(
            "f",
            number("v"),
            vec![expr_stmt(assign(this_member("_c"), binary(BinaryOp::Div, ident("v"), num(2.0))))],
        );
    let result = run(vec![
        class_stmt(temperature),
        runner(
            "number",
            vec![
                let_("t", None, Some(new("Temp", vec![]))),
                expr_stmt(assign(member(ident("t"), "f"), num(10.0))),
                return_(add(member(ident("t"), "f"), member(ident("t"), "_c"))),
            ],
        ),
    ])
    .unwrap();
    assert_eq!(result, Value::Number(15.0));
}

#[test]
fn test_loops_and_arrays() {
    let result = run(vec![runner(
        "number",
        vec![
            let_("xs", Some(array_ty(ty("number"))), Some(array(vec![]))),
            for_(
                Some(let_("i", Some(ty("number")), Some(num(0.0)))),
                Some(binary(BinaryOp::Lt, ident("i"), num(10.0))),
                Some(increment(ident("i"), false)),
                vec![
                    if_(binary(BinaryOp::Eq, ident("i"), num(2.0)), vec![continue_()], None),
                    if_(binary(BinaryOp::Eq, ident("i"), num(5.0)), vec![break_()], None),
                    expr_stmt(method_call(ident("xs"), "push", vec![ident("i")])),
                ],
            ),
            return_(add(member(ident("xs"), "length"), index(ident("xs"), num(2.0)))),
        ],
    )])
    .unwrap();
    // [0, 1, 3, 4]
    assert_eq!(result, Value::Number(7.0));
}

#[test]
fn test_dynamic_read_of_boxed_object() {
    let point = class("Point").field("x", Some(ty("number")), Some(num(3.0)));
    let result = run(vec![
        class_stmt(point),
        runner(
            "any",
            vec![
                let_("p", Some(ty("any")), Some(new("Point", vec![]))),
                return_(member(ident("p"), "x")),
            ],
        ),
    ])
    .unwrap();
    assert_eq!(result, Value::Dyn(DynValue::Number(3.0)));
}

fn base_and_derived() -> Vec<Stmt> {
    vec![
        class_stmt(class("A").field("a", Some(ty("number")), Some(num(1.0)))),
        class_stmt(
            class("B")
                .extends("A")
                .field("b", Some(ty("number")), Some(num(7.0))),
        ),
    ]
}

#[test]
fn test_downcast_through_any_uses_the_runtime_class() {
    let mut items = base_and_derived();
    items.push(runner(
        "number",
        vec![
            let_("a", Some(ty("A")), Some(new("B", vec![]))),
            let_("x", Some(ty("any")), Some(ident("a"))),
            return_(member(cast(ident("x"), ty("B")), "b")),
        ],
    ));
    assert_eq!(run(items).unwrap(), Value::Number(7.0));

    let mut items = base_and_derived();
    items.push(runner(
        "number",
        vec![
            let_("x", Some(ty("any")), Some(new("A", vec![]))),
            return_(member(cast(ident("x"), ty("B")), "b")),
        ],
    ));
    let error = run(items).unwrap_err();
    assert!(matches!(error, InterpreterError::Unbox(UnboxError { found: DynTag::ExtRef, .. })), "{error:?}");
}

#[test]
fn test_instanceof_on_boxed_subclass() {
    let mut items = base_and_derived();
    items.push(runner(
        "boolean",
        vec![
            let_("a", Some(ty("A")), Some(new("B", vec![]))),
            let_("x", Some(ty("any")), Some(ident("a"))),
            let_("y", Some(ty("any")), Some(new("A", vec![]))),
            return_(binary(
                BinaryOp::And,
                instance_of(ident("x"), "B"),
                unary(ql_ast::UnaryOp::Not, instance_of(ident("y"), "B")),
            )),
        ],
    ));
    assert_eq!(run(items).unwrap(), Value::Bool(true));
}

#[test]
fn test_huge_array_index_write_fails() {
    let error = run(vec![runner(
        "number",
        vec![
            let_("xs", Some(array_ty(ty("number"))), Some(array(vec![num(1.0)]))),
            expr_stmt(assign(index(ident("xs"), num(1e15)), num(2.0))),
            return_(member(ident("xs"), "length")),
        ],
    )])
    .unwrap_err();
    assert!(
        matches!(error, InterpreterError::Dynamic(DynError::IndexOutOfRange { .. })),
        "{error:?}"
    );
}

#[test]
fn test_unknown_export() {
    let error = run(vec![function_stmt(function("helper", vec![], None, vec![]))]).unwrap_err();
    assert!(matches!(error, InterpreterError::UnknownExport(name) if name == "run"));
}
