//! End-to-end behavior of compiled programs
//!
//! Every test compiles a unit from JSON modules on disk and runs one of its
//! exports in the reference interpreter.

use integration_tests::Project;
use ql_ast::build::*;
use ql_ast::{BinaryOp, Expr, Param, Stmt};
use ql_driver::{compile, CompileOptions};
use ql_dyn::DynValue;
use ql_interpreter::Value;

fn number(name: &str) -> Param {
    param(name, Some(ty("number")))
}

fn this_member(name: &str) -> Expr {
    member(this(), name)
}

fn run_fn(ret: &str, body: Vec<Stmt>) -> Stmt {
    function_stmt(function("run", vec![], Some(ty(ret)), body).exported())
}

fn single(name: &str, items: Vec<Stmt>) -> Project {
    Project::new(name).module(module("main", items))
}

/// Test 1: Override reached through a base-typed variable
///
/// `let a: A = new B(10, 11); a.test(5)` dispatches to `B.test`
#[test]
fn test_01_virtual_dispatch() {
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
    single(
        "01-virtual-dispatch",
        vec![
            class_stmt(base),
            class_stmt(derived),
            run_fn(
                "number",
                vec![
                    let_("a", Some(ty("A")), Some(new("B", vec![num(10.0), num(11.0)]))),
                    return_(method_call(ident("a"), "test", vec![num(5.0)])),
                ],
            ),
        ],
    )
    .expect_success("run", "16")
    .run()
    .assert_pass();
}

/// Test 2: Two closures over one counter
///
/// `inc()` then `dec()` on the pair returned by `outer()` yields 11 then 10
#[test]
fn test_02_shared_counter() {
    let step = |name: &str, up: bool| {
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
            step("inc", true),
            step("dec", false),
            return_(array(vec![ident("inc"), ident("dec")])),
        ],
    );
    let run = run_fn(
        "string",
        vec![
            const_("pair", None, call(ident("outer"), vec![])),
            let_("first", Some(ty("number")), Some(call(index(ident("pair"), num(0.0)), vec![]))),
            let_("second", Some(ty("number")), Some(call(index(ident("pair"), num(1.0)), vec![]))),
            return_(add(add(ident("first"), string(",")), ident("second"))),
        ],
    );
    single("02-shared-counter", vec![function_stmt(outer), run])
        .expect_success("run", "11,10")
        .run()
        .assert_pass();
}

/// Test 3: Object literal and class instance behind one interface
#[test]
fn test_03_structural_interface() {
    let shape = interface("I").field("x", ty("number")).field("y", ty("boolean"));
    let foo = class("Foo")
        .field("x", Some(ty("number")), Some(num(1.0)))
        .field("y", Some(ty("boolean")), Some(boolean(false)));
    single(
        "03-structural-interface",
        vec![
            interface_stmt(shape),
            class_stmt(foo),
            run_fn(
                "string",
                vec![
                    let_("a", Some(ty("I")), Some(object(vec![("x", num(1.0)), ("y", boolean(true))]))),
                    let_("b", Some(ty("I")), Some(new("Foo", vec![]))),
                    return_(add(add(member(ident("a"), "x"), string(",")), member(ident("b"), "x"))),
                ],
            ),
        ],
    )
    .expect_success("run", "1,1")
    .run()
    .assert_pass();
}

/// Test 4: Boxed number plus boolean stays dynamic
#[test]
fn test_04_dynamic_arithmetic() {
    let modules = vec![module(
        "main",
        vec![run_fn(
            "any",
            vec![
                let_("a", Some(ty("any")), Some(num(1.0))),
                return_(add(ident("a"), boolean(true))),
            ],
        )],
    )];
    let compilation = compile(&modules, &CompileOptions::default()).unwrap();
    let evaluation = compilation.run("run").unwrap();
    assert_eq!(evaluation.value, Value::Dyn(DynValue::Number(2.0)));
    assert_eq!(evaluation.type_of, "number");
}

/// Test 5: A class satisfying a wider interface satisfies a narrower one
#[test]
fn test_05_interface_superset() {
    let wide = interface("Wide").field("x", ty("number")).field("y", ty("number"));
    let narrow = interface("Narrow").field("x", ty("number"));
    let point = class("P")
        .field("x", Some(ty("number")), Some(num(3.0)))
        .field("y", Some(ty("number")), Some(num(4.0)));
    single(
        "05-interface-superset",
        vec![
            interface_stmt(wide),
            interface_stmt(narrow),
            class_stmt(point),
            run_fn(
                "number",
                vec![
                    let_("w", Some(ty("Wide")), Some(new("P", vec![]))),
                    let_("n", Some(ty("Narrow")), Some(ident("w"))),
                    return_(member(ident("n"), "x")),
                ],
            ),
        ],
    )
    .expect_success("run", "3")
    .run()
    .assert_pass();
}

/// Test 6: An inherited method keeps its slot and calls the override
#[test]
fn test_06_override_slot_preserved() {
    let base = class("Shape")
        .method("area", vec![], Some(ty("number")), vec![return_(num(0.0))])
        .method(
            "describe",
            vec![],
            Some(ty("string")),
            vec![return_(add(string("area "), method_call(this(), "area", vec![])))],
        );
    let square = class("Square")
        .extends("Shape")
        .method("area", vec![], Some(ty("number")), vec![return_(num(4.0))]);
    single(
        "06-override-slot",
        vec![
            class_stmt(base),
            class_stmt(square),
            run_fn(
                "string",
                vec![
                    let_("s", Some(ty("Shape")), Some(new("Square", vec![]))),
                    return_(method_call(ident("s"), "describe", vec![])),
                ],
            ),
        ],
    )
    .expect_success("run", "area 4")
    .run()
    .assert_pass();
}

/// Test 7: A closure sees writes made after it was created
#[test]
fn test_07_closure_aliasing() {
    single(
        "07-closure-aliasing",
        vec![run_fn(
            "number",
            vec![
                let_("n", Some(ty("number")), Some(num(1.0))),
                const_("get", None, arrow(vec![], vec![return_(ident("n"))])),
                expr_stmt(assign(ident("n"), num(5.0))),
                return_(call(ident("get"), vec![])),
            ],
        )],
    )
    .expect_success("run", "5")
    .run()
    .assert_pass();
}

/// Test 8: Each class owns its copy of an inherited static
#[test]
fn test_08_static_field_independence() {
    let base = class("Base").static_field("count", Some(ty("number")), Some(num(1.0)));
    let derived = class("Derived").extends("Base");
    single(
        "08-static-independence",
        vec![
            class_stmt(base),
            class_stmt(derived),
            run_fn(
                "string",
                vec![
                    expr_stmt(assign(member(ident("Derived"), "count"), num(5.0))),
                    return_(add(
                        add(member(ident("Base"), "count"), string(",")),
                        member(ident("Derived"), "count"),
                    )),
                ],
            ),
        ],
    )
    .expect_success("run", "1,5")
    .run()
    .assert_pass();
}

/// Test 9: Primitives and objects survive a trip through `any`
#[test]
fn test_09_boxing_round_trip() {
    let point = class("Point").field("x", Some(ty("number")), Some(num(2.0)));
    single(
        "09-boxing-round-trip",
        vec![
            class_stmt(point),
            run_fn(
                "string",
                vec![
                    let_("n", Some(ty("any")), Some(num(7.0))),
                    let_("s", Some(ty("any")), Some(string("seven"))),
                    let_("p", None, Some(new("Point", vec![]))),
                    let_("boxed", Some(ty("any")), Some(ident("p"))),
                    let_("back", Some(ty("Point")), Some(cast(ident("boxed"), ty("Point")))),
                    return_(add(
                        add(
                            add(cast(ident("n"), ty("number")), cast(ident("s"), ty("string"))),
                            string(","),
                        ),
                        binary(BinaryOp::Eq, ident("back"), ident("p")),
                    )),
                ],
            ),
        ],
    )
    .expect_success("run", "7seven,true")
    .run()
    .assert_pass();
}

/// Test 10: `typeof` over every tag
#[test]
fn test_10_typeof_tags() {
    let tags = [
        ("n", num(1.0)),
        ("s", string("s")),
        ("b", boolean(true)),
        ("z", null()),
        ("u", undefined()),
    ];
    let mut body: Vec<Stmt> = tags
        .iter()
        .map(|(name, value)| let_(name, Some(ty("any")), Some(value.clone())))
        .collect();
    let joined = tags.iter().skip(1).fold(type_of(ident("n")), |text, (name, _)| {
        add(add(text, string(" ")), type_of(ident(name)))
    });
    body.push(return_(joined));
    single("10-typeof", vec![run_fn("string", body)])
        .expect_success("run", "number string boolean object undefined")
        .run()
        .assert_pass();
}

/// Test 11: A failed narrowing surfaces as an unbox error
#[test]
fn test_11_unbox_error() {
    let modules = vec![module(
        "main",
        vec![run_fn(
            "number",
            vec![
                let_("a", Some(ty("any")), Some(string("x"))),
                return_(cast(ident("a"), ty("number"))),
            ],
        )],
    )];
    let compilation = compile(&modules, &CompileOptions::default()).unwrap();
    let error = compilation.run("run").unwrap_err();
    assert!(error.to_string().contains("cannot unbox a dynamic string"), "{error}");
}

/// Test 12: `console.log` output in call order
#[test]
fn test_12_console_output() {
    let body = vec![
        for_(
            Some(let_("i", Some(ty("number")), Some(num(0.0)))),
            Some(binary(BinaryOp::Lt, ident("i"), num(3.0))),
            Some(increment(ident("i"), false)),
            vec![expr_stmt(method_call(
                ident("console"),
                "log",
                vec![string("i ="), ident("i")],
            ))],
        ),
        return_(method_call(ident("Math"), "sqrt", vec![num(16.0)])),
    ];
    single("12-console", vec![run_fn("number", body)])
        .expect_success("run", "4")
        .expect_output(&["i = 0", "i = 1", "i = 2"])
        .run()
        .assert_pass();
}

/// Test 13: A redeclared static keeps separate storage in both directions
#[test]
fn test_13_redeclared_static_independence() {
    let base = class("Base").static_field("count", Some(ty("number")), Some(num(1.0)));
    let derived = class("Derived")
        .extends("Base")
        .static_field("count", Some(ty("number")), Some(num(7.0)));
    single(
        "13-redeclared-static",
        vec![
            class_stmt(base),
            class_stmt(derived),
            run_fn(
                "string",
                vec![
                    expr_stmt(assign(member(ident("Base"), "count"), num(5.0))),
                    let_("first", Some(ty("string")), Some(add(
                        add(member(ident("Base"), "count"), string(",")),
                        member(ident("Derived"), "count"),
                    ))),
                    expr_stmt(assign(member(ident("Derived"), "count"), num(9.0))),
                    return_(add(
                        add(ident("first"), string(";")),
                        member(ident("Base"), "count"),
                    )),
                ],
            ),
        ],
    )
    .expect_success("run", "5,7;5")
    .run()
    .assert_pass();
}
