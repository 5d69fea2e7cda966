//! Memory layout and emission through the driver

use expect_test::expect;
use ql_ast::build::*;
use ql_ast::Module;
use ql_driver::{compile, compile_files, CompileError, CompileOptions};
use ql_dyn::{DynTag, UnboxError};
use ql_interpreter::InterpreterError;
use ql_lower::align_up;
use std::fs;

fn greeter() -> Module {
    module(
        "main",
        vec![
            let_("total", Some(ty("number")), Some(num(0.0))),
            function_stmt(
                function(
                    "add",
                    vec![param("a", Some(ty("number"))), param("b", Some(ty("number")))],
                    Some(ty("number")),
                    vec![return_(add(ident("a"), ident("b")))],
                )
                .exported(),
            ),
            function_stmt(
                function("greet", vec![], Some(ty("string")), vec![return_(string("quill"))]).exported(),
            ),
        ],
    )
}

#[test]
fn test_default_memory_constants() {
    let compilation = compile(&[greeter()], &CompileOptions::default()).unwrap();
    let memory = compilation.plan.memory;
    let data_end = 1024 + "quill".len() as u32 + 1;
    assert_eq!(memory.data_end, data_end);
    assert_eq!(memory.stack_start, align_up(data_end, 8));
    assert_eq!(memory.heap_base, align_up(data_end, 8) + 32768);
    assert_eq!((memory.initial_pages, memory.maximum_pages), (1, 10));
    assert_eq!(compilation.plan.strings.offset("quill"), Some(1024));
}

#[test]
fn test_configured_emission_listing() {
    let dir = tempfile::tempdir().unwrap();
    let module_path = dir.path().join("main.json");
    fs::write(&module_path, serde_json::to_string(&greeter()).unwrap()).unwrap();
    let config_path = dir.path().join("quill.toml");
    fs::write(
        &config_path,
        "disable_any = true\n\n[layout]\nreserved_header = 2048\nstack_size = 4096\ninitial_pages = 2\n",
    )
    .unwrap();

    let compilation = compile_files(Some(&config_path), &[&module_path]).unwrap();
    expect![[r#"
        memory initial=2 maximum=10
        global ~lib/memory/__data_end: i32 = 2054
        global ~lib/memory/__stack_pointer: mut i32 = 6152
        global ~lib/memory/__heap_base: i32 = 6152
        global main|total: mut f64 = 0.0
        table extref_table initial=0 maximum=10
        data @2048 "quill\0"
        func main|add (ref, f64, f64) -> f64 locals []
        func main|greet (ref) -> ref locals []
        func main|~init () -> none locals []
        export add = main|add
        export greet = main|greet
        start ~start calls [main|~init]
    "#]]
    .assert_eq(&compilation.listing().unwrap());
    assert_eq!(compilation.run("greet").unwrap().display, "quill");
}

#[test]
fn test_unbox_failure_is_a_runtime_error() {
    let modules = vec![module(
        "main",
        vec![function_stmt(
            function(
                "run",
                vec![],
                Some(ty("boolean")),
                vec![
                    let_("value", Some(ty("any")), Some(num(1.0))),
                    return_(cast(ident("value"), ty("boolean"))),
                ],
            )
            .exported(),
        )],
    )];
    let compilation = compile(&modules, &CompileOptions::default()).unwrap();
    let error = compilation.run("run").unwrap_err();
    assert!(
        matches!(
            error,
            CompileError::Runtime(InterpreterError::Unbox(UnboxError {
                found: DynTag::Number,
                ..
            }))
        ),
        "{error:?}"
    );
}

#[test]
fn test_disable_any_rejects_dynamic_values() {
    let options = CompileOptions {
        disable_any: true,
        ..CompileOptions::default()
    };
    let modules = vec![module("main", vec![let_("value", Some(ty("any")), Some(num(1.0)))])];
    let error = compile(&modules, &options).err().unwrap();
    assert!(error.is_unimplemented(), "{error:?}");
}
