//! Multi-module units: declarations, imports and initialization order

use integration_tests::Project;
use ql_ast::build::*;
use ql_ast::Stmt;

fn run_fn(ret: &str, body: Vec<Stmt>) -> Stmt {
    function_stmt(function("run", vec![], Some(ty(ret)), body).exported())
}

fn log(text: &str) -> Stmt {
    expr_stmt(method_call(ident("console"), "log", vec![string(text)]))
}

/// Test 1: `let` declared twice in one scope is rejected
#[test]
fn test_01_duplicate_let() {
    Project::new("01-duplicate-let")
        .module(module(
            "main",
            vec![
                let_("x", Some(ty("number")), Some(num(1.0))),
                let_("x", Some(ty("number")), Some(num(2.0))),
            ],
        ))
        .expect_errors(&["duplicate declaration", "`x`"])
        .run()
        .assert_pass();
}

/// Test 2: `var` may be redeclared
#[test]
fn test_02_var_redeclaration() {
    Project::new("02-var-redeclaration")
        .module(module(
            "main",
            vec![
                var("x", Some(ty("number")), Some(num(1.0))),
                var("x", Some(ty("number")), Some(num(2.0))),
                run_fn("number", vec![return_(ident("x"))]),
            ],
        ))
        .expect_success("run", "2")
        .run()
        .assert_pass();
}

/// Test 3: A default export re-exported under a name and imported renamed
#[test]
fn test_03_renamed_default_reexport() {
    Project::new("03-default-reexport")
        .module(module(
            "base",
            vec![function_stmt(
                function("answer", vec![], Some(ty("number")), vec![return_(num(42.0))]).default_export(),
            )],
        ))
        .module(module("middle", vec![export_named(&[("default", "answer")], Some("base"))]))
        .module(module(
            "main",
            vec![
                import_named("middle", &[("answer", "getAnswer")]),
                run_fn("number", vec![return_(call(ident("getAnswer"), vec![]))]),
            ],
        ))
        .expect_success("run", "42")
        .run()
        .assert_pass();
}

/// Test 4: Imported modules initialize before their importers
#[test]
fn test_04_initialization_order() {
    Project::new("04-init-order")
        .module(module(
            "main",
            vec![
                import_named("lib", &[("total", "total")]),
                log("main"),
                run_fn("number", vec![return_(ident("total"))]),
            ],
        ))
        .module(module(
            "lib",
            vec![log("lib"), export_let("total", Some(ty("number")), Some(num(3.0)))],
        ))
        .expect_success("run", "3")
        .expect_output(&["lib", "main"])
        .run()
        .assert_pass();
}

/// Test 5: Importing a name the module does not export
#[test]
fn test_05_unknown_import() {
    Project::new("05-unknown-import")
        .module(module("lib", vec![let_("hidden", Some(ty("number")), Some(num(1.0)))]))
        .module(module(
            "main",
            vec![
                import_named("lib", &[("hidden", "hidden")]),
                run_fn("number", vec![return_(ident("hidden"))]),
            ],
        ))
        .expect_errors(&["has no export `hidden`"])
        .run()
        .assert_pass();
}

/// Test 6: Classes and module variables shared across modules
#[test]
fn test_06_imported_class() {
    let counter = class("Counter")
        .field("value", Some(ty("number")), Some(num(0.0)))
        .method(
            "bump",
            vec![],
            Some(ty("number")),
            vec![return_(increment(member(this(), "value"), true))],
        )
        .exported();
    Project::new("06-imported-class")
        .module(module("counter", vec![class_stmt(counter)]))
        .module(module(
            "main",
            vec![
                import_named("counter", &[("Counter", "Counter")]),
                run_fn(
                    "number",
                    vec![
                        const_("c", None, new("Counter", vec![])),
                        expr_stmt(method_call(ident("c"), "bump", vec![])),
                        return_(method_call(ident("c"), "bump", vec![])),
                    ],
                ),
            ],
        ))
        .expect_success("run", "2")
        .run()
        .assert_pass();
}

/// Test 7: Only the entry module's exports are visible
#[test]
fn test_07_exports_of_entry_only() {
    Project::new("07-entry-exports")
        .module(module(
            "lib",
            vec![function_stmt(
                function("helper", vec![], Some(ty("number")), vec![return_(num(1.0))]).exported(),
            )],
        ))
        .module(module(
            "main",
            vec![
                import_named("lib", &[("helper", "helper")]),
                run_fn("number", vec![return_(call(ident("helper"), vec![]))]),
            ],
        ))
        .expect_success("helper", "1")
        .run()
        .assert_fail_contains("no export named `helper`");
}

/// Test 8: Modules that import from each other
#[test]
fn test_08_cyclic_imports() {
    Project::new("08-cyclic-imports")
        .module(module(
            "a",
            vec![
                import_named("b", &[("g", "g")]),
                function_stmt(function("f", vec![], Some(ty("number")), vec![return_(num(1.0))]).exported()),
                function_stmt(
                    function("run", vec![], Some(ty("number")), vec![return_(call(ident("g"), vec![]))]).exported(),
                ),
            ],
        ))
        .module(module(
            "b",
            vec![
                import_named("a", &[("f", "f")]),
                function_stmt(
                    function(
                        "g",
                        vec![],
                        Some(ty("number")),
                        vec![return_(add(call(ident("f"), vec![]), num(1.0)))],
                    )
                    .exported(),
                ),
            ],
        ))
        .entry("a")
        .expect_success("run", "2")
        .run()
        .assert_pass();
}
