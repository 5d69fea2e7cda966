use super::*;
use crate::builtins::BUILTINS;
use crate::ty::TyKind;
use ql_ast::build::*;
use ql_ast::{BinaryOp, Stmt};
use ql_hir::{ExprKind, ModuleId, StmtKind};
use ql_hir_lower::{lower_unit, LowerOptions, LoweredUnit};

fn lower(items: Vec<Stmt>) -> LoweredUnit {
    let modules = vec![module("main", items)];
    let options = LowerOptions {
        builtin_values: BUILTINS.namespace_names(),
        import_builtins: true,
    };
    lower_unit(&modules, "main", &options).unwrap()
}

fn check_with(items: Vec<Stmt>, options: CheckOptions) -> (LoweredUnit, Result<TypeckResults, TypeError>) {
    let mut unit = lower(items);
    let results = check_program(&unit.program, &mut unit.scopes, &BUILTINS, &options);
    (unit, results)
}

fn check(items: Vec<Stmt>) -> (LoweredUnit, TypeckResults) {
    let (unit, results) = check_with(items, CheckOptions::default());
    (unit, results.unwrap())
}

/// Expression of the last module-level statement
fn last_expr(unit: &LoweredUnit) -> ExprId {
    let body = &unit.program.module(ModuleId(0)).body;
    match &unit.program.stmts[*body.last().unwrap()].kind {
        StmtKind::Expr(expr) => *expr,
        StmtKind::Let { init: Some(init), .. } => *init,
        other => panic!("expected an expression statement, got {other:?}"),
    }
}

fn display(unit: &LoweredUnit, results: &TypeckResults, ty: TyId) -> String {
    results.ctx.display(ty, &unit.scopes.interner)
}

#[test]
fn test_object_literal_and_class_satisfy_interface() {
    let (unit, results) = check(vec![
        interface_stmt(interface("I").field("x", ty("number")).field("y", ty("boolean"))),
        class_stmt(
            class("Foo")
                .field("x", None, Some(num(1.0)))
                .field("y", None, Some(boolean(false))),
        ),
        let_("a", Some(ty("I")), Some(object(vec![("x", num(1.0)), ("y", boolean(true))]))),
        let_("b", Some(ty("I")), Some(new("Foo", vec![]))),
        expr_stmt(add(member(ident("a"), "x"), member(ident("b"), "x"))),
    ]);
    let sum = last_expr(&unit);
    assert_eq!(results.type_of(sum), TyTable::NUMBER);
    let ExprKind::Binary { lhs, .. } = unit.program.exprs[sum].kind else {
        panic!("expected a binary expression");
    };
    assert!(matches!(results.member(lhs), Some(MemberAccess::Interface { .. })));
}

#[test]
fn test_nominal_classes_reject_lookalikes() {
    let (_, results) = check_with(
        vec![
            class_stmt(class("A").field("x", Some(ty("number")), None)),
            class_stmt(class("B").field("x", Some(ty("number")), None)),
            let_("a", Some(ty("A")), Some(new("B", vec![]))),
        ],
        CheckOptions::default(),
    );
    match results.unwrap_err() {
        TypeError::TypeMismatch { expected, found, .. } => {
            assert_eq!(expected, "A");
            assert_eq!(found, "B");
        }
        other => panic!("expected a mismatch, got {other:?}"),
    }
}

#[test]
fn test_primitive_mismatch() {
    let (_, results) = check_with(
        vec![let_("x", Some(ty("number")), Some(string("ten")))],
        CheckOptions::default(),
    );
    assert!(matches!(results, Err(TypeError::TypeMismatch { .. })));
}

#[test]
fn test_override_reuses_slot_and_new_method_appends() {
    let (unit, results) = check(vec![
        class_stmt(class("Animal").method("speak", vec![], Some(ty("string")), vec![return_(string("..."))])),
        class_stmt(
            class("Dog")
                .extends("Animal")
                .method("speak", vec![], Some(ty("string")), vec![return_(string("woof"))])
                .method("fetch", vec![], Some(ty("number")), vec![return_(num(1.0))]),
        ),
        let_("pet", Some(ty("Animal")), Some(new("Dog", vec![]))),
        expr_stmt(method_call(ident("pet"), "speak", vec![])),
    ]);
    let classes = &unit.program.module(ModuleId(0)).classes;
    let animal = results.class_of_def(classes[0]).unwrap();
    let dog = results.class_of_def(classes[1]).unwrap();
    let dog_info = &results.ctx.classes[dog];
    assert_eq!(dog_info.vtable.len(), 2);
    assert_eq!(dog_info.vtable[0].declared_in, dog);
    assert_eq!(results.ctx.classes[animal].vtable[0].declared_in, animal);
    assert_eq!(results.call_target(last_expr(&unit)), Some(CallTarget::Virtual { slot: 0 }));
}

#[test]
fn test_statics_get_a_slot_per_class() {
    let (unit, results) = check(vec![
        class_stmt(class("Base").static_field("count", Some(ty("number")), Some(num(0.0)))),
        class_stmt(class("Derived").extends("Base")),
        expr_stmt(assign(member(ident("Derived"), "count"), num(5.0))),
    ]);
    let classes = &unit.program.module(ModuleId(0)).classes;
    let base = results.class_of_def(classes[0]).unwrap();
    let derived = results.class_of_def(classes[1]).unwrap();
    assert_eq!(results.ctx.classes[derived].statics.len(), 1);
    assert_eq!(results.ctx.classes[derived].statics[0].declared_in, base);

    let ExprKind::Assign { target, .. } = unit.program.exprs[last_expr(&unit)].kind else {
        panic!("expected an assignment");
    };
    assert_eq!(
        results.member(target),
        Some(MemberAccess::Static { class: derived, slot: 0 })
    );
}

#[test]
fn test_calling_any_is_unimplemented() {
    let (_, results) = check_with(
        vec![
            let_("f", Some(ty("any")), Some(num(1.0))),
            expr_stmt(call(ident("f"), vec![])),
        ],
        CheckOptions::default(),
    );
    match results.unwrap_err() {
        TypeError::Unimplemented { feature, .. } => assert!(feature.contains("any")),
        other => panic!("expected unimplemented, got {other:?}"),
    }
}

#[test]
fn test_dynamic_addition_boxes_static_operand() {
    let (unit, results) = check(vec![
        let_("a", Some(ty("any")), Some(num(1.0))),
        expr_stmt(add(ident("a"), boolean(true))),
    ]);
    let sum = last_expr(&unit);
    assert_eq!(results.type_of(sum), TyTable::ANY);
    let ExprKind::Binary { lhs, rhs, .. } = unit.program.exprs[sum].kind else {
        panic!("expected a binary expression");
    };
    assert_eq!(results.coercion(lhs), Coercion::Identity);
    assert_eq!(results.coercion(rhs), Coercion::Box);

    let body = &unit.program.module(ModuleId(0)).body;
    let StmtKind::Let { init: Some(init), .. } = unit.program.stmts[body[0]].kind else {
        panic!("expected a let");
    };
    assert_eq!(results.coercion(init), Coercion::Box);
}

#[test]
fn test_narrowing_records_unbox() {
    let (unit, results) = check(vec![
        let_("a", Some(ty("any")), Some(num(1.0))),
        let_("n", Some(ty("number")), Some(ident("a"))),
    ]);
    let init = last_expr(&unit);
    assert_eq!(results.coercion(init), Coercion::Unbox(TyTable::NUMBER));
}

#[test]
fn test_disable_any_rejects_dynamic_values() {
    let (_, results) = check_with(
        vec![let_("a", Some(ty("any")), Some(num(1.0)))],
        CheckOptions { disable_any: true },
    );
    assert!(matches!(results, Err(TypeError::Unimplemented { .. })));
}

#[test]
fn test_closure_return_type_is_inferred() {
    let (unit, results) = check(vec![let_(
        "f",
        None,
        Some(arrow(vec![param("x", Some(ty("number")))], vec![return_(add(ident("x"), num(1.0)))])),
    )]);
    let closure = last_expr(&unit);
    assert_eq!(display(&unit, &results, results.type_of(closure)), "(number) => number");
}

#[test]
fn test_unannotated_declaration_returns() {
    let (unit, results) = check(vec![
        function_stmt(function("noop", vec![], None, vec![])),
        function_stmt(function("value", vec![param("x", None)], None, vec![return_(ident("x"))])),
    ]);
    let functions = &unit.program.module(ModuleId(0)).functions;
    assert_eq!(results.signature(functions[0]).unwrap().ret, TyTable::VOID);
    assert_eq!(results.signature(functions[1]).unwrap().ret, TyTable::ANY);
}

#[test]
fn test_counter_closures_typecheck() {
    let counter = fn_ty(vec![], ty("number"));
    let (unit, results) = check(vec![
        function_stmt(function(
            "outer",
            vec![],
            Some(array_ty(counter)),
            vec![
                let_("i", None, Some(num(10.0))),
                function_stmt(function("inc", vec![], Some(ty("number")), vec![
                    expr_stmt(increment(ident("i"), false)),
                    return_(ident("i")),
                ])),
                function_stmt(function("dec", vec![], Some(ty("number")), vec![
                    expr_stmt(decrement(ident("i"), false)),
                    return_(ident("i")),
                ])),
                return_(array(vec![ident("inc"), ident("dec")])),
            ],
        )),
        let_("pair", None, Some(call(ident("outer"), vec![]))),
        expr_stmt(call(index(ident("pair"), num(0.0)), vec![])),
    ]);
    let call_expr = last_expr(&unit);
    assert_eq!(results.type_of(call_expr), TyTable::NUMBER);
    assert_eq!(results.call_target(call_expr), Some(CallTarget::Closure));
}

#[test]
fn test_argument_count() {
    let (_, results) = check_with(
        vec![
            function_stmt(function("two", vec![param("a", Some(ty("number"))), param("b", Some(ty("number")))], None, vec![])),
            expr_stmt(call(ident("two"), vec![num(1.0)])),
        ],
        CheckOptions::default(),
    );
    match results.unwrap_err() {
        TypeError::ArgumentCount { expected, found, .. } => {
            assert_eq!(expected, "2");
            assert_eq!(found, 1);
        }
        other => panic!("expected an argument count error, got {other:?}"),
    }
}

#[test]
fn test_builtin_calls_resolve() {
    let (unit, results) = check(vec![
        expr_stmt(method_call(ident("console"), "log", vec![string("n"), num(1.0)])),
        expr_stmt(method_call(ident("Math"), "max", vec![num(1.0), num(2.0), num(3.0)])),
    ]);
    let max = last_expr(&unit);
    assert_eq!(results.call_target(max), Some(CallTarget::Builtin(BuiltinFn::MathMax)));
    assert_eq!(results.type_of(max), TyTable::NUMBER);
}

#[test]
fn test_inheritance_cycle() {
    let (_, results) = check_with(
        vec![
            class_stmt(class("A").extends("B")),
            class_stmt(class("B").extends("A")),
        ],
        CheckOptions::default(),
    );
    assert!(matches!(results, Err(TypeError::InheritanceCycle { .. })));
}

#[test]
fn test_string_concatenation_and_comparison() {
    let (unit, results) = check(vec![
        let_("label", None, Some(add(string("n="), num(3.0)))),
        expr_stmt(binary(BinaryOp::Lt, num(1.0), num(2.0))),
    ]);
    assert_eq!(results.type_of(last_expr(&unit)), TyTable::BOOLEAN);
    let label = unit.scopes.symbols().find(|(_, symbol)| unit.scopes.name(symbol.name) == "label");
    assert_eq!(label.and_then(|(_, symbol)| symbol.ty), Some(TyTable::STRING));
}

#[test]
fn test_array_literal_takes_expected_element_type() {
    let (unit, results) = check(vec![let_("xs", Some(array_ty(ty("any"))), Some(array(vec![num(1.0), string("a")])))]);
    let literal = last_expr(&unit);
    let ExprKind::Array(items) = &unit.program.exprs[literal].kind else {
        panic!("expected an array literal");
    };
    assert!(items.iter().all(|item| results.coercion(*item) == Coercion::Box));
    assert!(matches!(results.ctx.kind(results.type_of(literal)), TyKind::Array(_)));
}
