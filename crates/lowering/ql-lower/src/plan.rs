//! The lowering plan
//!
//! Every layout decision lives here: object field offsets, vtable slots,
//! per-class static globals, closure context shapes and the storage of every
//! variable as seen from every function. Emission and the reference
//! evaluator both read the plan; neither decides layout on its own.

use crate::builder::IrType;
use crate::error::LowerPlanError;
use crate::layout::{LayoutPolicy, MemoryPlan, StringPool, FIELD_SLOT_SIZE};
use indexmap::IndexMap;
use ql_closure::{owner, ClosureInfo, ContextId, VarAccess};
use ql_dyn::{AbiType, DynOp};
use ql_hir::visitor::{walk_expr, walk_function, Visitor};
use ql_hir::{
    ClassDefId, DefId, ExprId, ExprKind, FunctionId, FunctionKind, Literal, MethodKind, ModuleId,
    Program,
};
use ql_intern::Name;
use ql_scope::{DeclKind, ScopeId, ScopeKind, ScopeTree, SymbolId};
use ql_ty::{
    BuiltinFn, BuiltinTy, CallTarget, ClassTyId, MemberAccess, Primitive, TyKind, TyTable,
    TypeckResults, BUILTINS,
};
use ql_ty_id::TyId;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

/// Import module of builtin library functions
pub const BUILTIN_MODULE: &str = "builtIn";
/// Import module of the dynamic runtime
pub const RUNTIME_MODULE: &str = "env";
/// Name of the start function
pub const START_FUNCTION: &str = "~start";

/// Planner switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Memory and table sizing
    pub layout: LayoutPolicy,
    /// Skip the dynamic runtime imports
    pub disable_any: bool,
}

/// Where a variable lives, from the point of view of one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarStorage {
    /// Parameter slot
    Param(usize),
    /// Local slot
    Local(usize),
    /// Local slot holding a dynamic value
    Dynamic(usize),
    /// Context cell, `hops` parent links above the innermost context
    Cell {
        /// Parent links to follow
        hops: usize,
        /// Struct field
        field: usize,
    },
    /// Index into [`LoweringPlan::globals`]
    Global(usize),
    /// Module-level function declaration, called directly
    Function(FunctionId),
    /// Class object
    Class(ClassTyId),
    /// Builtin namespace
    Builtin,
}

/// One instance field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    /// Field name
    pub name: Name,
    /// Byte offset inside the object
    pub offset: u32,
    /// Storage type
    pub ty: IrType,
}

/// One vtable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    /// Method name
    pub name: Name,
    /// Method, getter or setter
    pub kind: MethodKind,
    /// Implementing function
    pub function: FunctionId,
    /// Internal name of the implementing function
    pub internal: String,
}

/// Object layout of one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPlan {
    /// Class
    pub class: ClassTyId,
    /// Internal struct name
    pub name: String,
    /// Base class
    pub base: Option<ClassTyId>,
    /// Fields, inherited ones first
    pub fields: Vec<FieldPlan>,
    /// Vtable, inherited slots first
    pub vtable: Vec<SlotPlan>,
    /// Static slots as indices into [`LoweringPlan::globals`]
    pub statics: Vec<usize>,
    /// Constructor, absent for object literal shapes
    pub constructor: Option<FunctionId>,
    /// Object size in bytes, vtable slot included
    pub size: u32,
}

impl ClassPlan {
    /// Byte offset of the field named `name`
    pub fn offset_of(&self, name: Name) -> Option<u32> {
        self.fields
            .iter()
            .rev()
            .find(|field| field.name == name)
            .map(|field| field.offset)
    }

    /// Field index stored at `offset`
    pub const fn field_index(offset: u32) -> usize {
        (offset / FIELD_SLOT_SIZE) as usize - 1
    }
}

/// What a global holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    /// Module-level variable
    Variable(SymbolId),
    /// Static field slot of a class
    Static {
        /// Owning class
        class: ClassTyId,
        /// Slot in the class's static table
        slot: usize,
        /// Initializer of the declaring class, run again for every class
        /// inheriting the slot
        init: Option<ExprId>,
    },
}

/// One global
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPlan {
    /// Internal name
    pub name: String,
    /// Storage type
    pub ty: IrType,
    /// Whether the global is assigned after initialization
    pub mutable: bool,
    /// Contents
    pub kind: GlobalKind,
}

/// Struct shape of one closure context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPlan {
    /// Context
    pub id: ContextId,
    /// Internal struct name
    pub name: String,
    /// Function owning the cells
    pub owner: FunctionId,
    /// Enclosing context
    pub parent: Option<ContextId>,
    /// Field types; field 0 is the parent link
    pub fields: Vec<IrType>,
}

/// Signature, slots and variable storage of one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPlan {
    /// Function
    pub id: FunctionId,
    /// Internal name
    pub name: String,
    /// Parameter types: the incoming context or `this` first, then the
    /// declared parameters
    pub params: Vec<IrType>,
    /// Result type
    pub result: IrType,
    /// Types of the local slots following the parameters
    pub locals: Vec<IrType>,
    /// Storage of every variable the function declares or mentions
    pub storage: FxHashMap<SymbolId, VarStorage>,
    /// Parameters copied into context cells on entry, as (slot, field)
    pub prologue: Vec<(usize, usize)>,
    /// Nested function declarations instantiated on entry
    pub hoisted: Vec<FunctionId>,
    /// Context allocated on entry
    pub context: Option<ContextId>,
    /// Context the closure value carries
    pub env: Option<ContextId>,
}

impl FunctionPlan {
    /// Total slot count, parameters included
    pub fn slot_count(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    /// Slot of the first declared parameter of a function of `kind`
    pub const fn first_param_slot(kind: FunctionKind) -> usize {
        if matches!(kind, FunctionKind::Method { is_static: true, .. }) { 0 } else { 1 }
    }
}

/// Module initializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPlan {
    /// Module
    pub module: ModuleId,
    /// Internal name
    pub name: String,
}

/// Exported function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    /// External name
    pub name: String,
    /// Function
    pub function: FunctionId,
    /// Internal name
    pub internal: String,
}

/// Imported host function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    /// Import module
    pub module: &'static str,
    /// Function name
    pub name: &'static str,
    /// Parameter types
    pub params: Vec<IrType>,
    /// Result type
    pub result: IrType,
}

/// Everything the emitter needs, decided up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringPlan {
    /// Memory regions
    pub memory: MemoryPlan,
    /// String literals and dynamic property names
    pub strings: StringPool,
    /// Class layouts in class creation order
    pub classes: IndexMap<ClassTyId, ClassPlan>,
    /// Context shapes
    pub contexts: IndexMap<ContextId, ContextPlan>,
    /// Functions in declaration order
    pub functions: IndexMap<FunctionId, FunctionPlan>,
    /// Globals: module variables, then static slots
    pub globals: Vec<GlobalPlan>,
    /// Storage of module-level names
    pub module_storage: FxHashMap<SymbolId, VarStorage>,
    /// Host imports: builtins, then the dynamic runtime
    pub imports: Vec<ImportPlan>,
    /// Exports of the entry module
    pub exports: Vec<ExportPlan>,
    /// Module initializers in import-dependency order
    pub inits: Vec<InitPlan>,
}

impl LoweringPlan {
    /// Storage of `symbol` as seen from `from`; `None` is module code
    pub fn storage(&self, from: Option<FunctionId>, symbol: SymbolId) -> Option<VarStorage> {
        match from {
            Some(function) => self
                .functions
                .get(&function)
                .and_then(|plan| plan.storage.get(&symbol))
                .copied(),
            None => self.module_storage.get(&symbol).copied(),
        }
    }

    /// Function plan
    pub fn function(&self, id: FunctionId) -> Option<&FunctionPlan> {
        self.functions.get(&id)
    }

    /// Class layout
    pub fn class(&self, id: ClassTyId) -> Option<&ClassPlan> {
        self.classes.get(&id)
    }

    /// Context shape
    pub fn context(&self, id: ContextId) -> Option<&ContextPlan> {
        self.contexts.get(&id)
    }

    /// Calls made by the start function, in order
    pub fn start_calls(&self) -> Vec<String> {
        self.inits.iter().map(|init| init.name.clone()).collect()
    }
}

/// Storage type of a static type
pub fn ir_type(types: &TyTable, ty: TyId) -> IrType {
    match types.kind(ty) {
        TyKind::Primitive(Primitive::Number) => IrType::F64,
        TyKind::Primitive(Primitive::Boolean) => IrType::I32,
        TyKind::Primitive(Primitive::Any) => IrType::Dyn,
        TyKind::Primitive(Primitive::Void) => IrType::Void,
        _ => IrType::Ref,
    }
}

const fn builtin_ir_type(ty: BuiltinTy) -> IrType {
    match ty {
        BuiltinTy::Number => IrType::F64,
        BuiltinTy::Boolean => IrType::I32,
        BuiltinTy::String => IrType::Ref,
        BuiltinTy::Any => IrType::Dyn,
        BuiltinTy::Void => IrType::Void,
    }
}

const fn abi_ir_type(ty: AbiType) -> IrType {
    match ty {
        AbiType::Ref => IrType::Dyn,
        AbiType::I32 => IrType::I32,
        AbiType::F64 => IrType::F64,
    }
}

/// Plan the layout of a checked, closure-analyzed program
///
/// # Errors
///
/// Fails when a function has no signature, a variable has no storage, or a
/// method captures variables of an enclosing function.
#[instrument(skip_all, fields(functions = program.functions.len()))]
pub fn plan_program(
    program: &Program,
    scopes: &ScopeTree,
    results: &TypeckResults,
    closures: &ClosureInfo,
    options: &PlanOptions,
) -> Result<LoweringPlan, LowerPlanError> {
    let mut planner = Planner {
        program,
        scopes,
        results,
        closures,
        names: FxHashMap::default(),
        used: FxHashSet::default(),
    };
    for (id, _) in program.functions.iter() {
        planner.function_name(id);
    }

    let strings = planner.strings(options.layout.reserved_header);
    let memory = MemoryPlan::new(&options.layout, strings.end());
    let mut globals = Vec::new();
    let module_storage = planner.module_storage(&mut globals)?;
    let classes = planner.classes(&mut globals);
    let contexts = planner.contexts();

    let mut functions = IndexMap::new();
    for (id, _) in program.functions.iter() {
        functions.insert(id, planner.function(id, &module_storage)?);
    }

    let plan = LoweringPlan {
        memory,
        strings,
        classes,
        contexts,
        functions,
        globals,
        module_storage,
        imports: planner.imports(options.disable_any),
        exports: planner.exports(),
        inits: program
            .init_order
            .iter()
            .map(|module| InitPlan {
                module: *module,
                name: format!("{}|~init", program.module(*module).name),
            })
            .collect(),
    };
    debug!(
        classes = plan.classes.len(),
        globals = plan.globals.len(),
        heap_base = plan.memory.heap_base,
        "lowering plan ready"
    );
    Ok(plan)
}

struct Planner<'a> {
    program: &'a Program,
    scopes: &'a ScopeTree,
    results: &'a TypeckResults,
    closures: &'a ClosureInfo,
    names: FxHashMap<FunctionId, String>,
    used: FxHashSet<String>,
}

impl Planner<'_> {
    fn types(&self) -> &TyTable {
        &self.results.ctx.types
    }

    fn unique(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut counter = 1;
        while !self.used.insert(name.clone()) {
            name = format!("{base}#{counter}");
            counter += 1;
        }
        name
    }

    fn class_name(&self, class: ClassDefId) -> String {
        let def = &self.program.classes[class];
        format!(
            "{}|{}",
            self.program.module(def.module).name,
            self.scopes.name(def.name)
        )
    }

    fn function_name(&mut self, id: FunctionId) -> String {
        if let Some(name) = self.names.get(&id) {
            return name.clone();
        }
        let def = &self.program.functions[id];
        let own = self.scopes.name(def.name).to_string();
        let base = match def.kind {
            FunctionKind::Method { class, kind, .. } => {
                let prefix = match kind {
                    MethodKind::Method => "",
                    MethodKind::Getter => "get_",
                    MethodKind::Setter => "set_",
                };
                format!("{}|{prefix}{own}", self.class_name(class))
            }
            FunctionKind::Constructor { class } => format!("{}|constructor", self.class_name(class)),
            FunctionKind::Declaration | FunctionKind::Expression | FunctionKind::Arrow => {
                match def.parent {
                    Some(parent) => format!("{}|{own}", self.function_name(parent)),
                    None => format!("{}|{own}", self.program.module(def.module).name),
                }
            }
        };
        let name = self.unique(base);
        self.names.insert(id, name.clone());
        name
    }

    fn strings(&self, base: u32) -> StringPool {
        let mut pool = StringPool::new(base);
        for (id, expr) in self.program.exprs.iter() {
            if let ExprKind::Literal(Literal::String(text)) = expr.kind {
                pool.intern(self.scopes.name(text));
            }
            if let Some(MemberAccess::Dynamic { name }) = self.results.member(id) {
                pool.intern(self.scopes.name(name));
            }
        }
        pool
    }

    /// Storage that does not depend on the accessing function
    fn fixed_storage(&self, symbol: SymbolId) -> Option<VarStorage> {
        let data = self.scopes.symbol(symbol);
        if Some(data.scope) == self.program.builtin_scope {
            return Some(VarStorage::Builtin);
        }
        match self.program.def_of(symbol) {
            Some(DefId::Class(class)) => self.results.class_of_def(class).map(VarStorage::Class),
            Some(DefId::Function(function)) if owner(self.program, self.scopes, symbol).is_none() => {
                Some(VarStorage::Function(function))
            }
            _ => None,
        }
    }

    fn module_storage(
        &mut self,
        globals: &mut Vec<GlobalPlan>,
    ) -> Result<FxHashMap<SymbolId, VarStorage>, LowerPlanError> {
        let scopes = self.scopes;
        let mut storage = FxHashMap::default();
        let mut variables = Vec::new();
        for (id, data) in scopes.symbols() {
            if let Some(fixed) = self.fixed_storage(id) {
                storage.insert(id, fixed);
                continue;
            }
            if owner(self.program, self.scopes, id).is_some() {
                continue;
            }
            match data.kind {
                DeclKind::Var | DeclKind::Let | DeclKind::Const => variables.push(id),
                DeclKind::Param | DeclKind::This => {
                    return Err(LowerPlanError::NoStorage {
                        name: self.scopes.symbol_name(id).to_string(),
                        span: data.span,
                    });
                }
                _ => {}
            }
        }
        for id in variables {
            let data = scopes.symbol(id);
            let module = scopes.scope(data.scope).module;
            let name = self.unique(format!(
                "{}|{}",
                self.program.module(module).name,
                scopes.name(data.name)
            ));
            storage.insert(id, VarStorage::Global(globals.len()));
            globals.push(GlobalPlan {
                name,
                ty: ir_type(self.types(), data.ty.unwrap_or(TyTable::ANY)),
                mutable: data.mutable,
                kind: GlobalKind::Variable(id),
            });
        }
        Ok(storage)
    }

    fn classes(&mut self, globals: &mut Vec<GlobalPlan>) -> IndexMap<ClassTyId, ClassPlan> {
        let results = self.results;
        let mut classes = IndexMap::new();
        let mut anonymous = 0;
        for (id, info) in results.ctx.classes.iter() {
            let name = match info.def {
                Some(def) => self.class_name(def),
                None => {
                    anonymous += 1;
                    format!("~object|{}", anonymous - 1)
                }
            };
            let name = self.unique(name);
            let fields = info
                .fields
                .iter()
                .enumerate()
                .map(|(index, field)| FieldPlan {
                    name: field.name,
                    offset: FIELD_SLOT_SIZE * (index as u32 + 1),
                    ty: ir_type(self.types(), field.ty),
                })
                .collect();
            let vtable = info
                .vtable
                .iter()
                .map(|slot| SlotPlan {
                    name: slot.name,
                    kind: slot.kind,
                    function: slot.implementation,
                    internal: self.names.get(&slot.implementation).cloned().unwrap_or_default(),
                })
                .collect();
            let mut statics = Vec::with_capacity(info.statics.len());
            for (slot, data) in info.statics.iter().enumerate() {
                let init = results.ctx.classes[data.declared_in]
                    .def
                    .and_then(|def| self.program.classes[def].statics.get(data.field))
                    .and_then(|field| field.init);
                statics.push(globals.len());
                globals.push(GlobalPlan {
                    name: self.unique(format!("{name}|{}", self.scopes.name(data.name))),
                    ty: ir_type(self.types(), data.ty),
                    mutable: !data.readonly,
                    kind: GlobalKind::Static { class: id, slot, init },
                });
            }
            classes.insert(
                id,
                ClassPlan {
                    class: id,
                    name,
                    base: info.base,
                    size: FIELD_SLOT_SIZE * (info.fields.len() as u32 + 1),
                    fields,
                    vtable,
                    statics,
                    constructor: info.constructor,
                },
            );
        }
        classes
    }

    fn contexts(&self) -> IndexMap<ContextId, ContextPlan> {
        self.closures
            .contexts
            .iter()
            .map(|(id, context)| {
                let fields = match self.types().kind(context.ty) {
                    TyKind::Struct(fields) => fields.iter().map(|ty| ir_type(self.types(), *ty)).collect(),
                    _ => vec![IrType::Ref],
                };
                let owner_name = self.names.get(&context.owner).cloned().unwrap_or_default();
                let plan = ContextPlan {
                    id,
                    name: format!("{owner_name}|~context"),
                    owner: context.owner,
                    parent: context.parent,
                    fields,
                };
                (id, plan)
            })
            .collect()
    }

    fn access(&self, function: FunctionId, symbol: SymbolId) -> Result<VarAccess, LowerPlanError> {
        Ok(self
            .closures
            .access(self.program, self.scopes, Some(function), symbol)?)
    }

    fn function(
        &self,
        id: FunctionId,
        module_storage: &FxHashMap<SymbolId, VarStorage>,
    ) -> Result<FunctionPlan, LowerPlanError> {
        let def = &self.program.functions[id];
        let name = self.names.get(&id).cloned().unwrap_or_default();
        let sig = self
            .results
            .signature(id)
            .ok_or_else(|| LowerPlanError::MissingSignature { function: name.clone() })?;
        let is_class_member = matches!(def.kind, FunctionKind::Method { .. } | FunctionKind::Constructor { .. });
        if is_class_member && !self.closures.free_variables(id).is_empty() {
            return Err(LowerPlanError::Unimplemented {
                feature: "class members using variables of an enclosing function".to_string(),
                span: def.span,
            });
        }

        let mut params = Vec::with_capacity(sig.params.len() + 1);
        let mut incoming = Vec::new();
        match def.kind {
            FunctionKind::Method { is_static: true, .. } => {}
            FunctionKind::Method { .. } | FunctionKind::Constructor { .. } => {
                if let Some(this) = def.this_param {
                    incoming.push((this, params.len()));
                }
                params.push(IrType::Ref);
            }
            FunctionKind::Declaration | FunctionKind::Expression | FunctionKind::Arrow => {
                params.push(IrType::Ref);
            }
        }
        for (param, ty) in def.params.iter().zip(&sig.params) {
            incoming.push((param.symbol, params.len()));
            params.push(ir_type(self.types(), *ty));
        }

        let mut storage = FxHashMap::default();
        let mut prologue = Vec::new();
        for (symbol, slot) in incoming {
            match self.access(id, symbol)? {
                VarAccess::Cell { hops, field } => {
                    prologue.push((slot, field));
                    storage.insert(symbol, VarStorage::Cell { hops, field });
                }
                _ => {
                    storage.insert(symbol, VarStorage::Param(slot));
                }
            }
        }

        let mut locals = Vec::new();
        let mut declared = Vec::new();
        self.declared_locals(def.scope, &mut declared);
        for symbol in declared {
            if storage.contains_key(&symbol) {
                continue;
            }
            let slot = params.len() + locals.len();
            let entry = match self.access(id, symbol)? {
                VarAccess::Cell { hops, field } => VarStorage::Cell { hops, field },
                VarAccess::Dynamic => {
                    locals.push(IrType::Dyn);
                    VarStorage::Dynamic(slot)
                }
                VarAccess::Local | VarAccess::Param | VarAccess::Global => {
                    let ty = self.scopes.symbol(symbol).ty.unwrap_or(TyTable::ANY);
                    locals.push(ir_type(self.types(), ty));
                    VarStorage::Local(slot)
                }
            };
            storage.insert(symbol, entry);
        }

        let mut references = References::default();
        walk_function(&mut references, self.program, id);
        for symbol in references.symbols {
            if storage.contains_key(&symbol) {
                continue;
            }
            let entry = if let Some(fixed) = self.fixed_storage(symbol) {
                fixed
            } else {
                match self.access(id, symbol)? {
                    VarAccess::Cell { hops, field } => VarStorage::Cell { hops, field },
                    VarAccess::Global => *module_storage.get(&symbol).ok_or_else(|| self.no_storage(symbol))?,
                    VarAccess::Local | VarAccess::Param | VarAccess::Dynamic => {
                        return Err(self.no_storage(symbol));
                    }
                }
            };
            storage.insert(symbol, entry);
        }

        let hoisted = self
            .program
            .functions
            .iter()
            .filter(|(_, nested)| {
                nested.parent == Some(id)
                    && nested.kind == FunctionKind::Declaration
                    && nested.symbol.is_some()
            })
            .map(|(nested, _)| nested)
            .collect();

        Ok(FunctionPlan {
            id,
            name,
            params,
            result: ir_type(self.types(), sig.ret),
            locals,
            storage,
            prologue,
            hoisted,
            context: self.closures.analyze(id),
            env: self.closures.env(id),
        })
    }

    fn no_storage(&self, symbol: SymbolId) -> LowerPlanError {
        LowerPlanError::NoStorage {
            name: self.scopes.symbol_name(symbol).to_string(),
            span: self.scopes.symbol(symbol).span,
        }
    }

    /// Value-holding symbols of a function body, nested functions excluded
    fn declared_locals(&self, scope: ScopeId, out: &mut Vec<SymbolId>) {
        let data = self.scopes.scope(scope);
        for (_, symbol) in data.symbols() {
            if matches!(
                self.scopes.symbol(symbol).kind,
                DeclKind::Var | DeclKind::Let | DeclKind::Const | DeclKind::Function
            ) {
                out.push(symbol);
            }
        }
        for child in &data.children {
            if self.scopes.scope(*child).kind == ScopeKind::Block {
                self.declared_locals(*child, out);
            }
        }
    }

    fn imports(&self, disable_any: bool) -> Vec<ImportPlan> {
        let mut imports = Vec::new();
        let mut seen = FxHashSet::default();
        for (id, _) in self.program.exprs.iter() {
            let Some(CallTarget::Builtin(function)) = self.results.call_target(id) else {
                continue;
            };
            if !seen.insert(function) {
                continue;
            }
            let (params, result) = match BUILTINS.method_of(function) {
                Some(method) => {
                    let mut params: Vec<_> = method.params.iter().map(|ty| builtin_ir_type(*ty)).collect();
                    if method.rest.is_some() {
                        params.push(IrType::Ref);
                    }
                    (params, builtin_ir_type(method.ret))
                }
                None if function == BuiltinFn::ArrayPush => (vec![IrType::Ref, IrType::Ref], IrType::F64),
                None => (vec![IrType::Ref], IrType::Dyn),
            };
            imports.push(ImportPlan {
                module: BUILTIN_MODULE,
                name: function.import_name(),
                params,
                result,
            });
        }
        if !disable_any {
            imports.extend(DynOp::ALL.iter().map(|op| ImportPlan {
                module: RUNTIME_MODULE,
                name: op.import_name(),
                params: op.params().iter().map(|ty| abi_ir_type(*ty)).collect(),
                result: abi_ir_type(op.result()),
            }));
        }
        imports
    }

    fn exports(&self) -> Vec<ExportPlan> {
        let Some(entry) = self.program.entry else {
            return Vec::new();
        };
        self.program
            .module(entry)
            .functions
            .iter()
            .filter_map(|function| {
                let def = &self.program.functions[*function];
                let name = if def.default_export {
                    "default".to_string()
                } else if def.exported {
                    self.scopes.name(def.name).to_string()
                } else {
                    return None;
                };
                Some(ExportPlan {
                    name,
                    function: *function,
                    internal: self.names.get(function).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Value symbols one body mentions
#[derive(Default)]
struct References {
    symbols: Vec<SymbolId>,
    seen: FxHashSet<SymbolId>,
}

impl Visitor for References {
    fn visit_expr(&mut self, program: &Program, expr: ExprId) {
        match &program.exprs[expr].kind {
            ExprKind::Var(symbol)
            | ExprKind::This(symbol)
            | ExprKind::SuperCall { this: symbol, .. }
            | ExprKind::SuperMember { this: symbol, .. } => {
                if self.seen.insert(*symbol) {
                    self.symbols.push(*symbol);
                }
            }
            _ => {}
        }
        walk_expr(self, program, expr);
    }
}
