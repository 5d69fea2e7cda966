//! The compilation pipeline
//!
//! Scope building, type checking, closure analysis and layout planning run
//! to completion for the whole unit before anything is emitted or evaluated.

use crate::config::CompileOptions;
use crate::error::CompileError;
use anyhow::{Context, Result};
use ql_ast::Module;
use ql_closure::{analyze_program, ClosureInfo};
use ql_hir_lower::{lower_unit, LowerOptions, LoweredUnit};
use ql_interpreter::{Interpreter, Value};
use ql_lower::{emit, plan_program, IrBuilder, LoweringPlan, PlanOptions, RecordingBuilder};
use ql_ty::{check_program, CheckOptions, TypeckResults, BUILTINS};
use std::path::Path;
use tracing::{debug, info, instrument};

/// A fully analyzed and planned compilation unit
pub struct Compilation {
    /// Resolved program and its scopes
    pub unit: LoweredUnit,
    /// Checker output
    pub results: TypeckResults,
    /// Captures and contexts
    pub closures: ClosureInfo,
    /// Layout decisions
    pub plan: LoweringPlan,
}

/// Result of running one export
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Returned value
    pub value: Value,
    /// Display form of the returned value
    pub display: String,
    /// `typeof` of the returned value
    pub type_of: &'static str,
    /// Lines printed by `console.log`
    pub output: Vec<String>,
}

/// Compile a set of modules
///
/// # Errors
/// Returns the first error of any stage; nothing is produced for a unit with errors
#[instrument(skip_all, fields(modules = modules.len(), entry = %options.entry))]
pub fn compile(modules: &[Module], options: &CompileOptions) -> Result<Compilation, CompileError> {
    let lower_options = LowerOptions {
        builtin_values: if options.disable_builtins {
            Vec::new()
        } else {
            BUILTINS.namespace_names()
        },
        import_builtins: !options.disable_builtins,
    };
    let mut unit = lower_unit(modules, &options.entry, &lower_options)?;
    debug!(functions = unit.program.functions.len(), "scopes built");

    let check_options = CheckOptions {
        disable_any: options.disable_any,
    };
    let mut results = check_program(&unit.program, &mut unit.scopes, &BUILTINS, &check_options)?;
    let closures = analyze_program(&unit.program, &mut unit.scopes, &mut results.ctx.types)?;

    let plan_options = PlanOptions {
        layout: options.layout,
        disable_any: options.disable_any,
    };
    let plan = plan_program(&unit.program, &unit.scopes, &results, &closures, &plan_options)?;
    info!(
        functions = plan.functions.len(),
        classes = plan.classes.len(),
        globals = plan.globals.len(),
        "unit planned"
    );
    Ok(Compilation {
        unit,
        results,
        closures,
        plan,
    })
}

impl Compilation {
    /// Drive an IR builder with the plan
    ///
    /// # Errors
    /// Returns `CompileError::Emit` if the builder rejects a declaration
    pub fn emit(&self, builder: &mut impl IrBuilder) -> Result<(), CompileError> {
        emit(&self.plan, builder)?;
        Ok(())
    }

    /// Textual listing of everything emission declares
    ///
    /// # Errors
    /// Returns `CompileError::Emit` if the plan declares a name twice
    pub fn listing(&self) -> Result<String, CompileError> {
        let mut builder = RecordingBuilder::new();
        self.emit(&mut builder)?;
        Ok(builder.output().to_string())
    }

    /// Evaluator over the planned program
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(&self.unit.program, &self.unit.scopes, &self.results, &self.plan)
    }

    /// Run the initializers, then call export `name` without arguments
    ///
    /// # Errors
    /// Returns `CompileError::Runtime` if the export is missing or fails
    pub fn run(&self, name: &str) -> Result<Evaluation, CompileError> {
        let mut interpreter = self.interpreter();
        let value = interpreter.call_export(name, Vec::new())?;
        Ok(Evaluation {
            display: interpreter.display(&value),
            type_of: interpreter.type_of_value(&value),
            output: interpreter.output().to_vec(),
            value,
        })
    }
}

/// Read one module from its JSON form
///
/// # Errors
/// Returns an error if the file cannot be read or is not a module
pub fn load_module(path: impl AsRef<Path>) -> Result<Module> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read module {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid module", path.display()))
}

/// Load the configuration and modules from disk and compile them
///
/// Logging is initialized from the configuration first.
///
/// # Errors
/// Returns an error if loading fails or the unit does not compile
pub fn compile_files(config: Option<&Path>, modules: &[impl AsRef<Path>]) -> Result<Compilation> {
    let options = match config {
        Some(path) => CompileOptions::load(path)?,
        None => CompileOptions::default(),
    };
    crate::logging::init_logging(&options.log);
    let modules = modules.iter().map(load_module).collect::<Result<Vec<_>>>()?;
    Ok(compile(&modules, &options)?)
}
