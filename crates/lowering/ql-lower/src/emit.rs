//! Driving an [`IrBuilder`] from a finished plan

use crate::builder::{GlobalInit, IrBuilder, IrType};
use crate::error::IrBuilderError;
use crate::layout::{DATA_END, EXTREF_TABLE, HEAP_BASE, STACK_POINTER};
use crate::plan::{GlobalKind, GlobalPlan, LoweringPlan, START_FUNCTION};
use tracing::{debug, instrument};

const fn zero(ty: IrType) -> GlobalInit {
    match ty {
        IrType::I32 => GlobalInit::I32(0),
        IrType::F64 => GlobalInit::F64(0.0),
        IrType::Ref | IrType::Dyn | IrType::Void => GlobalInit::Null,
    }
}

fn declare_global(builder: &mut impl IrBuilder, global: &GlobalPlan) -> Result<(), IrBuilderError> {
    builder.declare_global(&global.name, global.ty, global.mutable, zero(global.ty))
}

fn vtable_name(class: &str) -> String {
    format!("{class}|vtable")
}

/// Emit `plan` through `builder`
///
/// Declarations go out in a fixed order: memory, globals, the extref table
/// and data, struct types for classes, vtables and contexts, functions,
/// vtable instances bound to their implementing functions, runtime imports,
/// static globals, exports and finally the start function.
///
/// # Errors
///
/// Stops at the first error the builder reports.
#[instrument(skip_all)]
pub fn emit(plan: &LoweringPlan, builder: &mut impl IrBuilder) -> Result<(), IrBuilderError> {
    let memory = &plan.memory;
    builder.declare_memory(memory.initial_pages, memory.maximum_pages)?;

    builder.declare_global(DATA_END, IrType::I32, false, GlobalInit::I32(memory.data_end as i32))?;
    builder.declare_global(STACK_POINTER, IrType::I32, true, GlobalInit::I32(memory.heap_base as i32))?;
    builder.declare_global(HEAP_BASE, IrType::I32, false, GlobalInit::I32(memory.heap_base as i32))?;
    for global in &plan.globals {
        if matches!(global.kind, GlobalKind::Variable(_)) {
            declare_global(builder, global)?;
        }
    }

    builder.declare_table(EXTREF_TABLE, memory.table_initial, memory.table_maximum)?;
    if !plan.strings.is_empty() {
        builder.declare_data_segment(plan.strings.base(), &plan.strings.bytes())?;
    }

    for class in plan.classes.values() {
        let mut fields = Vec::with_capacity(class.fields.len() + 1);
        fields.push(IrType::Ref);
        fields.extend(class.fields.iter().map(|field| field.ty));
        builder.declare_struct(&class.name, &fields)?;
        if !class.vtable.is_empty() {
            builder.declare_struct(&vtable_name(&class.name), &vec![IrType::Ref; class.vtable.len()])?;
        }
    }
    for context in plan.contexts.values() {
        builder.declare_struct(&context.name, &context.fields)?;
    }

    for function in plan.functions.values() {
        builder.declare_function(&function.name, &function.params, function.result, &function.locals)?;
    }
    for init in &plan.inits {
        builder.declare_function(&init.name, &[], IrType::Void, &[])?;
    }
    for class in plan.classes.values() {
        if !class.vtable.is_empty() {
            let slots: Vec<String> = class.vtable.iter().map(|slot| slot.internal.clone()).collect();
            builder.declare_vtable(&vtable_name(&class.name), &slots)?;
        }
    }

    for import in &plan.imports {
        builder.declare_import(import.module, import.name, &import.params, import.result)?;
    }

    for global in &plan.globals {
        if matches!(global.kind, GlobalKind::Static { .. }) {
            declare_global(builder, global)?;
        }
    }

    for export in &plan.exports {
        builder.declare_export(&export.name, &export.internal)?;
    }
    builder.declare_start(START_FUNCTION, &plan.start_calls())?;
    debug!(functions = plan.functions.len(), "emitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordingBuilder;
    use crate::plan::{plan_program, PlanOptions};
    use expect_test::expect;
    use ql_ast::build::*;
    use ql_ast::Stmt;
    use ql_closure::analyze_program;
    use ql_dyn::DynOp;
    use ql_hir_lower::{lower_unit, LowerOptions};
    use ql_ty::{check_program, CheckOptions, BUILTINS};

    fn plan(items: Vec<Stmt>, disable_any: bool) -> LoweringPlan {
        let modules = vec![module("main", items)];
        let options = LowerOptions {
            builtin_values: BUILTINS.namespace_names(),
            import_builtins: true,
        };
        let mut unit = lower_unit(&modules, "main", &options).unwrap();
        let mut results = check_program(
            &unit.program,
            &mut unit.scopes,
            &BUILTINS,
            &CheckOptions { disable_any },
        )
        .unwrap();
        let closures = analyze_program(&unit.program, &mut unit.scopes, &mut results.ctx.types).unwrap();
        let options = PlanOptions {
            disable_any,
            ..PlanOptions::default()
        };
        plan_program(&unit.program, &unit.scopes, &results, &closures, &options).unwrap()
    }

    #[test]
    fn test_emission_order() {
        let plan = plan(
            vec![
                let_("greeting", Some(ty("string")), Some(string("hi"))),
                class_stmt(
                    class("Point")
                        .field("x", Some(ty("number")), Some(num(0.0)))
                        .static_field("count", Some(ty("number")), Some(num(0.0)))
                        .method(
                            "norm",
                            vec![],
                            Some(ty("number")),
                            vec![return_(member(this(), "x"))],
                        ),
                ),
                function_stmt(
                    function(
                        "run",
                        vec![],
                        Some(ty("number")),
                        vec![
                            let_("p", None, Some(new("Point", vec![]))),
                            return_(method_call(ident("p"), "norm", vec![])),
                        ],
                    )
                    .exported(),
                ),
            ],
            true,
        );
        let mut builder = RecordingBuilder::new();
        emit(&plan, &mut builder).unwrap();
        expect![[r#"
            memory initial=1 maximum=10
            global ~lib/memory/__data_end: i32 = 1027
            global ~lib/memory/__stack_pointer: mut i32 = 33800
            global ~lib/memory/__heap_base: i32 = 33800
            global main|greeting: mut ref = null
            table extref_table initial=0 maximum=10
            data @1024 "hi\0"
            struct main|Point {ref, f64}
            struct main|Point|vtable {ref}
            func main|Point|constructor (ref) -> none locals []
            func main|Point|norm (ref) -> f64 locals []
            func main|run (ref) -> f64 locals [ref]
            func main|~init () -> none locals []
            vtable main|Point|vtable = [main|Point|norm]
            global main|Point|count: mut f64 = 0.0
            export run = main|run
            start ~start calls [main|~init]
        "#]]
        .assert_eq(builder.output());
    }

    #[test]
    fn test_dynamic_runtime_and_default_export() {
        let plan = plan(
            vec![
                let_("value", Some(ty("any")), Some(num(1.0))),
                function_stmt(
                    function("main", vec![], None, vec![expr_stmt(method_call(ident("console"), "log", vec![ident("value")]))])
                        .default_export(),
                ),
            ],
            false,
        );
        let mut builder = RecordingBuilder::new();
        emit(&plan, &mut builder).unwrap();
        let output = builder.output();
        assert!(output.contains("import builtIn.console|log (ref) -> none\n"));
        assert!(output.contains("import env.dyntype_new_number (anyref, f64) -> anyref\n"));
        assert_eq!(
            output.lines().filter(|line| line.starts_with("import env.")).count(),
            DynOp::ALL.len()
        );
        assert!(output.contains("export default = main|main\n"));
    }
}
