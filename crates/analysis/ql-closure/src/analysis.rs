//! Free-variable analysis and context assignment
//!
//! Runs in two passes. The first walks every function bottom-up and
//! computes its free variables; a free variable of a nested function that
//! the current function owns becomes one of its cells. The second pass
//! walks top-down, allocates a context for every function with cells and
//! links it to the innermost context available from the enclosing
//! function.

use crate::context::{ClosureContext, ContextId, VarAccess};
use crate::error::ClosureError;
use ql_arena::Arena;
use ql_hir::visitor::{walk_expr, walk_function, Visitor};
use ql_hir::{ExprId, ExprKind, FunctionId, Program};
use ql_scope::{DeclKind, ScopeTree, StorageClass, SymbolId};
use ql_ty::{TyKind, TyTable};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument, trace};

/// Closure facts of one function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionClosure {
    /// Variables used here (or in nested functions) but owned by an
    /// enclosing function, in declaration order
    pub free: Vec<SymbolId>,
    /// Context holding this function's own captured variables
    pub context: Option<ContextId>,
    /// Context the function's closure value carries; the innermost
    /// context available where the function is created
    pub env: Option<ContextId>,
}

/// Closure analysis of a whole program
#[derive(Debug, Default)]
pub struct ClosureInfo {
    /// Every context
    pub contexts: Arena<ClosureContext>,
    functions: FxHashMap<FunctionId, FunctionClosure>,
    cells: FxHashMap<SymbolId, (ContextId, usize)>,
}

impl ClosureInfo {
    /// Context owned by `function`, or `None` when it captures nothing
    /// and keeps every variable in plain locals
    pub fn analyze(&self, function: FunctionId) -> Option<ContextId> {
        self.functions.get(&function).and_then(|info| info.context)
    }

    /// Closure facts of `function`
    pub fn function(&self, function: FunctionId) -> Option<&FunctionClosure> {
        self.functions.get(&function)
    }

    /// Context the closure value of `function` carries
    pub fn env(&self, function: FunctionId) -> Option<ContextId> {
        self.functions.get(&function).and_then(|info| info.env)
    }

    /// Innermost context reachable inside `function`: its own, else the
    /// one it was created with
    pub fn available(&self, function: FunctionId) -> Option<ContextId> {
        self.functions
            .get(&function)
            .and_then(|info| info.context.or(info.env))
    }

    /// Free variables of `function`
    pub fn free_variables(&self, function: FunctionId) -> &[SymbolId] {
        self.functions
            .get(&function)
            .map_or(&[], |info| info.free.as_slice())
    }

    /// Context and struct field holding a captured variable
    pub fn cell(&self, symbol: SymbolId) -> Option<(ContextId, usize)> {
        self.cells.get(&symbol).copied()
    }

    /// Context data
    pub fn context(&self, id: ContextId) -> &ClosureContext {
        &self.contexts[id]
    }

    /// How code of `from` reaches `symbol`; `None` is module-level code
    ///
    /// # Errors
    ///
    /// Fails when `symbol` belongs to another function and was never
    /// captured, or when the context chain of `from` misses its cell.
    pub fn access(
        &self,
        program: &Program,
        scopes: &ScopeTree,
        from: Option<FunctionId>,
        symbol: SymbolId,
    ) -> Result<VarAccess, ClosureError> {
        let data = scopes.symbol(symbol);
        if let Some((context, field)) = self.cell(symbol) {
            let mut current = from.and_then(|function| self.available(function));
            let mut hops = 0;
            while let Some(id) = current {
                if id == context {
                    return Ok(VarAccess::Cell { hops, field });
                }
                current = self.contexts[id].parent;
                hops += 1;
            }
            return Err(ClosureError::BrokenChain {
                name: scopes.symbol_name(symbol).to_string(),
                span: data.span,
            });
        }
        match owner(program, scopes, symbol) {
            None => Ok(VarAccess::Global),
            Some(owner) if Some(owner) == from => Ok(match data.kind {
                DeclKind::Param | DeclKind::This => VarAccess::Param,
                _ if data.ty == Some(TyTable::ANY) => VarAccess::Dynamic,
                _ => VarAccess::Local,
            }),
            Some(_) => Err(ClosureError::NotCaptured {
                name: scopes.symbol_name(symbol).to_string(),
                span: data.span,
            }),
        }
    }
}

/// Function owning `symbol`, `None` for module-level and builtin names
pub fn owner(program: &Program, scopes: &ScopeTree, symbol: SymbolId) -> Option<FunctionId> {
    scopes
        .nearest_function(scopes.symbol(symbol).scope)
        .and_then(|scope| program.function_of_scope(scope))
}

/// Analyze every function of `program`
///
/// Captured symbols are moved to [`StorageClass::ClosureCaptured`] and every
/// context gets a struct type interned in `types`.
///
/// # Errors
///
/// Fails when some free variable cannot be reached through the context
/// chain of a function that uses it.
#[instrument(skip_all, fields(functions = program.functions.len()))]
pub fn analyze_program(
    program: &Program,
    scopes: &mut ScopeTree,
    types: &mut TyTable,
) -> Result<ClosureInfo, ClosureError> {
    let mut children: FxHashMap<FunctionId, Vec<FunctionId>> = FxHashMap::default();
    let mut roots = Vec::new();
    for (id, function) in program.functions.iter() {
        match function.parent {
            Some(parent) => children.entry(parent).or_default().push(id),
            None => roots.push(id),
        }
    }

    let mut free_vars = FreeVars {
        program,
        scopes,
        children: &children,
        free: FxHashMap::default(),
        cells: FxHashMap::default(),
    };
    for root in &roots {
        free_vars.compute(*root);
    }
    let FreeVars { free, mut cells, .. } = free_vars;

    let mut info = ClosureInfo::default();
    let mut pending: Vec<(FunctionId, Option<ContextId>)> =
        roots.iter().map(|root| (*root, None)).collect();
    while let Some((function, env)) = pending.pop() {
        let own_cells = cells.remove(&function).unwrap_or_default();
        let context = if own_cells.is_empty() {
            None
        } else {
            Some(alloc_context(&mut info, scopes, types, function, env, own_cells))
        };
        let mut function_free = free.get(&function).cloned().unwrap_or_default();
        function_free.sort_unstable();
        info.functions.insert(
            function,
            FunctionClosure {
                free: function_free,
                context,
                env,
            },
        );
        if let Some(nested) = children.get(&function) {
            pending.extend(nested.iter().map(|child| (*child, context.or(env))));
        }
    }
    for (function, closure) in &info.functions {
        for symbol in &closure.free {
            info.access(program, scopes, Some(*function), *symbol)?;
        }
    }
    debug!(contexts = info.contexts.len(), captured = info.cells.len(), "closure analysis done");
    Ok(info)
}

fn alloc_context(
    info: &mut ClosureInfo,
    scopes: &mut ScopeTree,
    types: &mut TyTable,
    owner: FunctionId,
    parent: Option<ContextId>,
    mut cells: Vec<SymbolId>,
) -> ContextId {
    cells.sort_unstable();
    let parent_ty = parent.map_or(TyTable::NULL, |parent| info.contexts[parent].ty);
    let mut fields = Vec::with_capacity(cells.len() + 1);
    fields.push(parent_ty);
    fields.extend(
        cells
            .iter()
            .map(|cell| scopes.symbol(*cell).ty.unwrap_or(TyTable::ANY)),
    );
    let ty = types.intern(TyKind::Struct(fields));
    let id = info.contexts.alloc(ClosureContext {
        owner,
        parent,
        cells: cells.clone(),
        ty,
    });
    for (index, cell) in cells.into_iter().enumerate() {
        trace!(symbol = scopes.symbol_name(cell), field = index + 1, "captured");
        scopes.set_storage(cell, StorageClass::ClosureCaptured);
        info.cells.insert(cell, (id, index + 1));
    }
    id
}

/// Bottom-up free variable computation
struct FreeVars<'a> {
    program: &'a Program,
    scopes: &'a ScopeTree,
    children: &'a FxHashMap<FunctionId, Vec<FunctionId>>,
    free: FxHashMap<FunctionId, Vec<SymbolId>>,
    cells: FxHashMap<FunctionId, Vec<SymbolId>>,
}

impl FreeVars<'_> {
    fn compute(&mut self, function: FunctionId) -> Vec<SymbolId> {
        let mut references = References::default();
        walk_function(&mut references, self.program, function);

        let mut free = FxHashSet::default();
        for symbol in references.symbols {
            if self.owner(symbol).is_some_and(|owner| owner != function) {
                free.insert(symbol);
            }
        }

        let mut own_cells = FxHashSet::default();
        let nested = self.children.get(&function).cloned().unwrap_or_default();
        for child in nested {
            for symbol in self.compute(child) {
                if self.owner(symbol) == Some(function) {
                    own_cells.insert(symbol);
                } else {
                    free.insert(symbol);
                }
            }
        }

        if !own_cells.is_empty() {
            self.cells.insert(function, own_cells.into_iter().collect());
        }
        let free: Vec<_> = free.into_iter().collect();
        self.free.insert(function, free.clone());
        free
    }

    fn owner(&self, symbol: SymbolId) -> Option<FunctionId> {
        owner(self.program, self.scopes, symbol)
    }
}

/// Symbols holding runtime values that one body mentions
#[derive(Default)]
struct References {
    symbols: FxHashSet<SymbolId>,
}

impl Visitor for References {
    fn visit_expr(&mut self, program: &Program, expr: ExprId) {
        match &program.exprs[expr].kind {
            ExprKind::Var(symbol)
            | ExprKind::This(symbol)
            | ExprKind::SuperCall { this: symbol, .. }
            | ExprKind::SuperMember { this: symbol, .. } => {
                self.symbols.insert(*symbol);
            }
            _ => {}
        }
        walk_expr(self, program, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_ast::build::*;
    use ql_ast::Stmt;
    use ql_hir_lower::{lower_unit, LowerOptions, LoweredUnit};
    use ql_ty::{check_program, CheckOptions, TypeckResults, BUILTINS};

    struct Analyzed {
        unit: LoweredUnit,
        results: TypeckResults,
        info: ClosureInfo,
    }

    impl Analyzed {
        fn function(&self, name: &str) -> FunctionId {
            self.unit
                .program
                .functions
                .iter()
                .find(|(_, function)| self.unit.scopes.name(function.name) == name)
                .map(|(id, _)| id)
                .unwrap()
        }

        fn symbol(&self, name: &str) -> SymbolId {
            self.unit
                .scopes
                .symbols()
                .find(|(_, symbol)| self.unit.scopes.name(symbol.name) == name)
                .map(|(id, _)| id)
                .unwrap()
        }

        fn access(&self, from: &str, symbol: &str) -> VarAccess {
            let from = self.function(from);
            self.info
                .access(&self.unit.program, &self.unit.scopes, Some(from), self.symbol(symbol))
                .unwrap()
        }
    }

    fn analyze(items: Vec<Stmt>) -> Analyzed {
        let modules = vec![module("main", items)];
        let options = LowerOptions {
            builtin_values: BUILTINS.namespace_names(),
            import_builtins: true,
        };
        let mut unit = lower_unit(&modules, "main", &options).unwrap();
        let mut results =
            check_program(&unit.program, &mut unit.scopes, &BUILTINS, &CheckOptions::default()).unwrap();
        let info = analyze_program(&unit.program, &mut unit.scopes, &mut results.ctx.types).unwrap();
        Analyzed { unit, results, info }
    }

    fn counter() -> Stmt {
        function_stmt(function(
            "outer",
            vec![],
            None,
            vec![
                let_("i", Some(ty("number")), Some(num(10.0))),
                function_stmt(function(
                    "inc",
                    vec![],
                    Some(ty("number")),
                    vec![expr_stmt(increment(ident("i"), false)), return_(ident("i"))],
                )),
                function_stmt(function(
                    "dec",
                    vec![],
                    Some(ty("number")),
                    vec![expr_stmt(decrement(ident("i"), false)), return_(ident("i"))],
                )),
                return_(array(vec![ident("inc"), ident("dec")])),
            ],
        ))
    }

    #[test]
    fn test_sibling_closures_share_one_cell() {
        let analyzed = analyze(vec![counter()]);
        let outer = analyzed.function("outer");
        let context = analyzed.info.analyze(outer).unwrap();
        let i = analyzed.symbol("i");

        assert_eq!(analyzed.info.context(context).cells, vec![i]);
        assert!(analyzed.unit.scopes.symbol(i).is_captured());
        for closure in ["inc", "dec"] {
            let id = analyzed.function(closure);
            assert_eq!(analyzed.info.analyze(id), None);
            assert_eq!(analyzed.info.env(id), Some(context));
            assert_eq!(analyzed.info.free_variables(id), &[i]);
            assert_eq!(analyzed.access(closure, "i"), VarAccess::Cell { hops: 0, field: 1 });
        }
        // the declaring function goes through the cell as well
        assert_eq!(analyzed.access("outer", "i"), VarAccess::Cell { hops: 0, field: 1 });
        assert_eq!(analyzed.access("outer", "inc"), VarAccess::Local);
    }

    #[test]
    fn test_capture_propagates_through_intermediate_functions() {
        let analyzed = analyze(vec![function_stmt(function(
            "a",
            vec![],
            None,
            vec![
                let_("x", Some(ty("number")), Some(num(1.0))),
                function_stmt(function(
                    "b",
                    vec![],
                    None,
                    vec![
                        let_("y", Some(ty("number")), Some(num(2.0))),
                        function_stmt(function(
                            "c",
                            vec![],
                            Some(ty("number")),
                            vec![return_(add(ident("x"), ident("y")))],
                        )),
                        return_(ident("c")),
                    ],
                )),
                return_(ident("b")),
            ],
        ))]);
        let x = analyzed.symbol("x");
        let y = analyzed.symbol("y");
        let a_context = analyzed.info.analyze(analyzed.function("a")).unwrap();
        let b_context = analyzed.info.analyze(analyzed.function("b")).unwrap();

        assert_eq!(analyzed.info.free_variables(analyzed.function("b")), &[x]);
        assert_eq!(analyzed.info.context(b_context).parent, Some(a_context));
        assert_eq!(analyzed.access("c", "y"), VarAccess::Cell { hops: 0, field: 1 });
        assert_eq!(analyzed.access("c", "x"), VarAccess::Cell { hops: 1, field: 1 });
        assert_eq!(analyzed.access("b", "x"), VarAccess::Cell { hops: 1, field: 1 });

        let parent_ty = analyzed.info.context(a_context).ty;
        let TyKind::Struct(fields) = analyzed.results.ctx.kind(analyzed.info.context(b_context).ty) else {
            panic!("context type is not a struct");
        };
        assert_eq!(fields.as_slice(), &[parent_ty, TyTable::NUMBER]);
    }

    #[test]
    fn test_no_capture_keeps_plain_storage() {
        let analyzed = analyze(vec![
            let_("total", Some(ty("number")), Some(num(0.0))),
            function_stmt(function(
                "f",
                vec![param("n", Some(ty("number")))],
                None,
                vec![
                    let_("local", Some(ty("number")), Some(ident("n"))),
                    let_("loose", Some(ty("any")), Some(ident("n"))),
                    expr_stmt(assign(ident("total"), add(ident("local"), ident("n")))),
                ],
            )),
        ]);
        let f = analyzed.function("f");
        assert_eq!(analyzed.info.analyze(f), None);
        assert!(analyzed.info.free_variables(f).is_empty());
        assert_eq!(analyzed.access("f", "n"), VarAccess::Param);
        assert_eq!(analyzed.access("f", "local"), VarAccess::Local);
        assert_eq!(analyzed.access("f", "loose"), VarAccess::Dynamic);
        assert_eq!(analyzed.access("f", "total"), VarAccess::Global);
    }

    #[test]
    fn test_captured_parameter_becomes_cell() {
        let analyzed = analyze(vec![function_stmt(function(
            "adder",
            vec![param("step", Some(ty("number")))],
            None,
            vec![return_(arrow(
                vec![param("x", Some(ty("number")))],
                vec![return_(add(ident("x"), ident("step")))],
            ))],
        ))]);
        let adder = analyzed.function("adder");
        let context = analyzed.info.analyze(adder).unwrap();
        assert_eq!(analyzed.info.context(context).cells, vec![analyzed.symbol("step")]);
        assert_eq!(analyzed.access("adder", "step"), VarAccess::Cell { hops: 0, field: 1 });
    }

    #[test]
    fn test_arrow_captures_this() {
        let analyzed = analyze(vec![class_stmt(
            class("Counter")
                .field("count", Some(ty("number")), Some(num(0.0)))
                .method(
                    "bump",
                    vec![],
                    None,
                    vec![return_(arrow(
                        vec![],
                        vec![expr_stmt(increment(member(this(), "count"), false))],
                    ))],
                ),
        )]);
        let bump = analyzed.function("bump");
        let context = analyzed.info.analyze(bump).unwrap();
        let this_param = analyzed.unit.program.functions[bump].this_param.unwrap();
        assert_eq!(analyzed.info.context(context).cells, vec![this_param]);
    }
}
