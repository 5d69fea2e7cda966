//! AST → HIR lowering with name resolution

use ql_arena::idx_from_usize;
use ql_ast::{self as ast, ExprKind as AstExpr, StmtKind as AstStmt};
use ql_hir::{
    ClassDef, ClassDefId, DefId, Expr, ExprId, ExprKind, FieldDef, FunctionDef, FunctionId,
    FunctionKind, InterfaceDef, InterfaceDefId, InterfaceMemberDef, Literal, ModuleDef, ParamDef,
    Program, Stmt, StmtId, StmtKind, TypeRef,
};
use ql_intern::Name;
use ql_scope::{
    DeclKind, ExportKey, ExportTable, ExportTarget, ModuleId, ScopeError, ScopeId, ScopeKind,
    ScopeTree, SymbolId,
};
use ql_span::{FileId, FileSpan, Span};
use rustc_hash::FxHashSet;
use tracing::{debug, instrument};

/// Options for scope building
#[derive(Debug, Clone)]
pub struct LowerOptions {
    /// Names of builtin values declared in the builtin scope
    pub builtin_values: Vec<String>,
    /// Alias every builtin into each module scope
    pub import_builtins: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            builtin_values: Vec::new(),
            import_builtins: true,
        }
    }
}

/// Result of lowering a whole compilation unit
#[derive(Debug)]
pub struct LoweredUnit {
    /// Resolved program
    pub program: Program,
    /// Scopes and symbols
    pub scopes: ScopeTree,
    /// Module export tables
    pub exports: ExportTable,
}

/// Lower every module of a compilation unit
///
/// Modules are registered in the given order. Top-level names of all modules
/// are declared before any import is bound, so modules may import each other
/// in cycles.
///
/// # Errors
///
/// Returns the first `ScopeError` encountered; no partial program is returned.
#[instrument(skip_all, fields(modules = modules.len(), entry = entry))]
pub fn lower_unit(
    modules: &[ast::Module],
    entry: &str,
    options: &LowerOptions,
) -> Result<LoweredUnit, ScopeError> {
    let mut ctx = LoweringContext::new();
    ctx.declare_builtins(options)?;

    let mut ids = Vec::with_capacity(modules.len());
    for module in modules {
        ids.push(ctx.register_module(module)?);
    }
    for (id, module) in ids.iter().zip(modules) {
        ctx.predeclare(*id, module)?;
    }
    for (id, module) in ids.iter().zip(modules) {
        ctx.collect_imports(*id, module)?;
    }
    for (id, module) in ids.iter().zip(modules) {
        ctx.collect_exports(*id, module)?;
    }
    for id in &ids {
        ctx.bind_imports(*id, options)?;
    }
    for (id, module) in ids.iter().zip(modules) {
        ctx.lower_module_body(*id, module)?;
    }

    let entry_id = ctx
        .exports
        .find_module(entry)
        .ok_or_else(|| ScopeError::UnknownModule {
            specifier: entry.to_string(),
            use_site: FileSpan::default(),
        })?;
    ctx.program.entry = Some(entry_id);
    ctx.program.init_order = ctx.init_order();
    debug!(order = ?ctx.program.init_order, "module initialization order");

    Ok(LoweredUnit {
        program: ctx.program,
        scopes: ctx.tree,
        exports: ctx.exports,
    })
}

/// How an imported local name is bound, before resolution
#[derive(Debug, Clone, Copy)]
enum ImportBinding {
    Export { module: ModuleId, key: ExportKey },
    Namespace(ModuleId),
}

/// What `this` and `super` refer to at the current position
#[derive(Debug, Clone, Copy)]
struct ThisBinding {
    symbol: SymbolId,
    has_base: bool,
    in_constructor: bool,
}

/// Context for lowering AST to HIR
struct LoweringContext {
    tree: ScopeTree,
    exports: ExportTable,
    program: Program,
    /// Import bindings per module, in source order
    imports: Vec<Vec<(Name, ImportBinding, FileSpan)>>,
    module: ModuleId,
    file: FileId,
    /// Innermost function being lowered
    current_function: Option<FunctionId>,
    this_binding: Option<ThisBinding>,
    loop_depth: u32,
}

impl LoweringContext {
    fn new() -> Self {
        Self {
            tree: ScopeTree::new(),
            exports: ExportTable::new(),
            program: Program::default(),
            imports: Vec::new(),
            module: ModuleId::BUILTIN,
            file: FileId::default(),
            current_function: None,
            this_binding: None,
            loop_depth: 0,
        }
    }

    fn span(&self, span: Span) -> FileSpan {
        FileSpan::new(self.file, span)
    }

    fn syntax(&self, message: impl Into<String>, span: Span) -> ScopeError {
        ScopeError::Syntax {
            message: message.into(),
            span: self.span(span),
        }
    }

    // Module phases

    fn declare_builtins(&mut self, options: &LowerOptions) -> Result<(), ScopeError> {
        let scope = self.tree.create_root(ScopeKind::Global, ModuleId::BUILTIN);
        for name in &options.builtin_values {
            let name = self.tree.intern(name);
            self.tree
                .declare(scope, name, DeclKind::Const, FileSpan::default())?;
        }
        self.program.builtin_scope = Some(scope);
        Ok(())
    }

    fn register_module(&mut self, module: &ast::Module) -> Result<ModuleId, ScopeError> {
        if self.exports.find_module(&module.name).is_some() {
            return Err(ScopeError::Syntax {
                message: format!("module `{}` is defined twice", module.name),
                span: FileSpan::default(),
            });
        }
        let id = self.exports.add_module(&module.name);
        let scope = self.tree.create_root(ScopeKind::Module, id);
        self.program.modules.push(ModuleDef {
            id,
            name: module.name.clone(),
            scope,
            body: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            interfaces: Vec::new(),
            imports: Vec::new(),
        });
        self.imports.push(Vec::new());
        Ok(id)
    }

    fn enter_module(&mut self, id: ModuleId) -> ScopeId {
        self.module = id;
        self.file = FileId(id.0);
        self.program.modules[id.index()].scope
    }

    /// Declare every top-level name so other modules can import it
    fn predeclare(&mut self, id: ModuleId, module: &ast::Module) -> Result<(), ScopeError> {
        let scope = self.enter_module(id);
        for item in &module.items {
            let span = self.span(item.span);
            let (name, kind, exported, default_export) = match &item.kind {
                AstStmt::Var(decl) => (decl.name.clone(), var_kind(decl.kind), decl.exported, false),
                AstStmt::Function(decl) => (
                    self.function_decl_name(decl, item.span)?,
                    DeclKind::Function,
                    decl.exported,
                    decl.default_export,
                ),
                AstStmt::Class(decl) => (
                    decl.name.clone(),
                    DeclKind::Class,
                    decl.exported,
                    decl.default_export,
                ),
                AstStmt::Interface(decl) => {
                    (decl.name.clone(), DeclKind::Interface, decl.exported, false)
                }
                _ => continue,
            };
            let name = self.tree.intern(&name);
            let symbol = self.tree.declare(scope, name, kind, span)?;
            if exported {
                self.exports
                    .export(id, ExportKey::Named(name), ExportTarget::Local(symbol));
            }
            if default_export {
                self.exports
                    .export(id, ExportKey::Default, ExportTarget::Local(symbol));
            }
        }
        Ok(())
    }

    fn function_decl_name(&self, decl: &ast::FunctionDecl, span: Span) -> Result<String, ScopeError> {
        match (&decl.name, decl.default_export) {
            (Some(name), _) => Ok(name.clone()),
            (None, true) => Ok("default".to_string()),
            (None, false) => Err(self.syntax("function declaration requires a name", span)),
        }
    }

    fn collect_imports(&mut self, id: ModuleId, module: &ast::Module) -> Result<(), ScopeError> {
        self.enter_module(id);
        for item in &module.items {
            let AstStmt::Import(decl) = &item.kind else {
                continue;
            };
            let span = self.span(item.span);
            let source = self.import_source(id, &decl.from, span)?;
            for specifier in &decl.specifiers {
                let (local, binding) = match specifier {
                    ast::ImportSpecifier::Named { imported, local } => (
                        local,
                        ImportBinding::Export {
                            module: source,
                            key: self.export_key(imported),
                        },
                    ),
                    ast::ImportSpecifier::Default { local } => (
                        local,
                        ImportBinding::Export {
                            module: source,
                            key: ExportKey::Default,
                        },
                    ),
                    ast::ImportSpecifier::Namespace { local } => {
                        (local, ImportBinding::Namespace(source))
                    }
                };
                let local = self.tree.intern(local);
                self.imports[id.index()].push((local, binding, span));
            }
        }
        Ok(())
    }

    fn import_source(&mut self, id: ModuleId, specifier: &str, span: FileSpan) -> Result<ModuleId, ScopeError> {
        let source = self
            .exports
            .find_module(specifier)
            .ok_or_else(|| ScopeError::UnknownModule {
                specifier: specifier.to_string(),
                use_site: span,
            })?;
        let imports = &mut self.program.modules[id.index()].imports;
        if !imports.contains(&source) {
            imports.push(source);
        }
        Ok(source)
    }

    fn export_key(&mut self, name: &str) -> ExportKey {
        if name == "default" {
            ExportKey::Default
        } else {
            ExportKey::Named(self.tree.intern(name))
        }
    }

    fn collect_exports(&mut self, id: ModuleId, module: &ast::Module) -> Result<(), ScopeError> {
        let scope = self.enter_module(id);
        for item in &module.items {
            let AstStmt::Export(decl) = &item.kind else {
                continue;
            };
            let span = self.span(item.span);
            match decl {
                ast::ExportDecl::Named {
                    specifiers,
                    from: Some(from),
                } => {
                    let source = self.import_source(id, from, span)?;
                    for (local, exported) in specifiers {
                        let key = self.export_key(local);
                        let exported = self.export_key(exported);
                        self.exports.export(
                            id,
                            exported,
                            ExportTarget::ReExport {
                                module: source,
                                key,
                            },
                        );
                    }
                }
                ast::ExportDecl::Named {
                    specifiers,
                    from: None,
                } => {
                    for (local, exported) in specifiers {
                        let target = self.local_export_target(id, scope, local, span)?;
                        let exported = self.export_key(exported);
                        self.exports.export(id, exported, target);
                    }
                }
                ast::ExportDecl::Default(local) => {
                    let target = self.local_export_target(id, scope, local, span)?;
                    self.exports.export(id, ExportKey::Default, target);
                }
            }
        }
        Ok(())
    }

    /// Target of `export { local }`: an own declaration or a forwarded import
    fn local_export_target(
        &mut self,
        id: ModuleId,
        scope: ScopeId,
        local: &str,
        span: FileSpan,
    ) -> Result<ExportTarget, ScopeError> {
        let name = self.tree.intern(local);
        if let Some(symbol) = self.tree.lookup_local(scope, name) {
            return Ok(ExportTarget::Local(symbol));
        }
        let forwarded = self.imports[id.index()]
            .iter()
            .find(|(imported, _, _)| *imported == name)
            .map(|(_, binding, _)| *binding);
        match forwarded {
            Some(ImportBinding::Export { module, key }) => Ok(ExportTarget::ReExport { module, key }),
            Some(ImportBinding::Namespace(_)) => Err(ScopeError::Unimplemented {
                feature: "re-exporting a namespace import".to_string(),
                span,
            }),
            None => self.tree.resolve(scope, name, span).map(ExportTarget::Local),
        }
    }

    fn bind_imports(&mut self, id: ModuleId, options: &LowerOptions) -> Result<(), ScopeError> {
        let scope = self.enter_module(id);
        let bindings = self.imports[id.index()].clone();
        for (local, binding, span) in bindings {
            match binding {
                ImportBinding::Export { module, key } => {
                    let tree = &self.tree;
                    let symbol = self
                        .exports
                        .resolve(module, key, span, |key| describe_key(tree, key))?;
                    self.tree.add_alias(scope, local, symbol, span)?;
                }
                ImportBinding::Namespace(module) => {
                    self.tree
                        .declare(scope, local, DeclKind::Namespace(module), span)?;
                }
            }
        }

        if options.import_builtins {
            if let Some(builtin_scope) = self.program.builtin_scope {
                let builtins: Vec<_> = self.tree.scope(builtin_scope).symbols().collect();
                for (name, symbol) in builtins {
                    if self.tree.lookup_local(scope, name).is_none() {
                        self.tree
                            .add_alias(scope, name, symbol, FileSpan::default())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_module_body(&mut self, id: ModuleId, module: &ast::Module) -> Result<(), ScopeError> {
        let scope = self.enter_module(id);
        self.current_function = None;
        self.this_binding = None;
        self.loop_depth = 0;
        let body = self.lower_items(&module.items, scope, true)?;
        self.program.modules[id.index()].body = body;
        debug!(module = %module.name, "lowered module");
        Ok(())
    }

    /// Modules in dependency order; cycles are broken at the first revisit
    fn init_order(&self) -> Vec<ModuleId> {
        let mut order = Vec::with_capacity(self.program.modules.len());
        let mut visited = FxHashSet::default();
        for module in &self.program.modules {
            self.visit_module(module.id, &mut visited, &mut order);
        }
        order
    }

    fn visit_module(&self, id: ModuleId, visited: &mut FxHashSet<ModuleId>, order: &mut Vec<ModuleId>) {
        if !visited.insert(id) {
            return;
        }
        for import in &self.program.modules[id.index()].imports {
            self.visit_module(*import, visited, order);
        }
        order.push(id);
    }

    // Statements

    fn lower_items(&mut self, items: &[ast::Stmt], scope: ScopeId, top_level: bool) -> Result<Vec<StmtId>, ScopeError> {
        if !top_level {
            self.hoist(items, scope)?;
        }
        let mut stmts = Vec::with_capacity(items.len());
        for item in items {
            if let Some(stmt) = self.lower_stmt(item, scope, top_level)? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    /// Declare functions, classes and interfaces of a block before its statements
    fn hoist(&mut self, items: &[ast::Stmt], scope: ScopeId) -> Result<(), ScopeError> {
        for item in items {
            let (name, kind) = match &item.kind {
                AstStmt::Function(decl) => (self.function_decl_name(decl, item.span)?, DeclKind::Function),
                AstStmt::Class(decl) => (decl.name.clone(), DeclKind::Class),
                AstStmt::Interface(decl) => (decl.name.clone(), DeclKind::Interface),
                _ => continue,
            };
            let name = self.tree.intern(&name);
            let span = self.span(item.span);
            self.tree.declare(scope, name, kind, span)?;
        }
        Ok(())
    }

    fn hoisted_symbol(&mut self, scope: ScopeId, name: &str, kind: DeclKind, span: Span) -> Result<SymbolId, ScopeError> {
        let name = self.tree.intern(name);
        match self.tree.lookup_local(scope, name) {
            Some(symbol) => Ok(symbol),
            None => {
                let span = self.span(span);
                self.tree.declare(scope, name, kind, span)
            }
        }
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let span = self.span(span);
        self.program.stmts.alloc(Stmt { kind, span })
    }

    #[allow(clippy::too_many_lines, reason = "one arm per statement kind")]
    fn lower_stmt(&mut self, stmt: &ast::Stmt, scope: ScopeId, top_level: bool) -> Result<Option<StmtId>, ScopeError> {
        let kind = match &stmt.kind {
            AstStmt::Var(decl) => {
                let kind = var_kind(decl.kind);
                let name = self.tree.intern(&decl.name);
                let symbol = match (top_level, self.tree.lookup_local(scope, name)) {
                    (true, Some(symbol)) => symbol,
                    _ => {
                        let span = self.span(stmt.span);
                        self.tree.declare(scope, name, kind, span)?
                    }
                };
                let ty = decl.ty.clone().map(|syntax| TypeRef { syntax, scope });
                let init = decl
                    .init
                    .as_ref()
                    .map(|init| self.lower_expr(init, scope))
                    .transpose()?;
                StmtKind::Let { symbol, ty, init }
            }
            AstStmt::Function(decl) => {
                let name = self.function_decl_name(decl, stmt.span)?;
                let symbol = self.hoisted_symbol(scope, &name, DeclKind::Function, stmt.span)?;
                let function = self.lower_function(decl, FunctionKind::Declaration, scope, Some(symbol))?;
                self.program.symbol_defs.insert(symbol, DefId::Function(function));
                if top_level {
                    self.program.modules[self.module.index()].functions.push(function);
                }
                StmtKind::Function(function)
            }
            AstStmt::Class(decl) => {
                let symbol = self.hoisted_symbol(scope, &decl.name, DeclKind::Class, stmt.span)?;
                let class = self.lower_class(decl, scope, symbol)?;
                self.program.symbol_defs.insert(symbol, DefId::Class(class));
                if top_level {
                    self.program.modules[self.module.index()].classes.push(class);
                }
                StmtKind::Class(class)
            }
            AstStmt::Interface(decl) => {
                let symbol = self.hoisted_symbol(scope, &decl.name, DeclKind::Interface, stmt.span)?;
                let interface = self.lower_interface(decl, scope, symbol);
                self.program.symbol_defs.insert(symbol, DefId::Interface(interface));
                if top_level {
                    self.program.modules[self.module.index()].interfaces.push(interface);
                }
                return Ok(None);
            }
            AstStmt::Import(_) | AstStmt::Export(_) => {
                if top_level {
                    return Ok(None);
                }
                return Err(self.syntax("imports and exports are only allowed at module level", stmt.span));
            }
            AstStmt::Expr(expr) => StmtKind::Expr(self.lower_expr(expr, scope)?),
            AstStmt::Return(value) => {
                if self.current_function.is_none() {
                    return Err(self.syntax("`return` outside of a function", stmt.span));
                }
                let value = value
                    .as_ref()
                    .map(|value| self.lower_expr(value, scope))
                    .transpose()?;
                StmtKind::Return(value)
            }
            AstStmt::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(cond, scope)?;
                let then = self.lower_nested(then, scope)?;
                let otherwise = otherwise
                    .as_ref()
                    .map(|otherwise| self.lower_nested(otherwise, scope))
                    .transpose()?;
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            AstStmt::While { cond, body } => {
                let cond = self.lower_expr(cond, scope)?;
                self.loop_depth += 1;
                let body = self.lower_nested(body, scope);
                self.loop_depth -= 1;
                StmtKind::While { cond, body: body? }
            }
            AstStmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let header = self.tree.create_child(scope, ScopeKind::Block);
                let init = match init {
                    Some(init) => self.lower_stmt(init, header, false)?,
                    None => None,
                };
                let cond = cond
                    .as_ref()
                    .map(|cond| self.lower_expr(cond, header))
                    .transpose()?;
                let update = update
                    .as_ref()
                    .map(|update| self.lower_expr(update, header))
                    .transpose()?;
                self.loop_depth += 1;
                let body = self.lower_nested(body, header);
                self.loop_depth -= 1;
                StmtKind::For {
                    scope: header,
                    init,
                    cond,
                    update,
                    body: body?,
                }
            }
            AstStmt::Block(items) => {
                let block = self.tree.create_child(scope, ScopeKind::Block);
                let stmts = self.lower_items(items, block, false)?;
                StmtKind::Block {
                    scope: block,
                    stmts,
                }
            }
            AstStmt::Break | AstStmt::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.syntax("`break`/`continue` outside of a loop", stmt.span));
                }
                if matches!(stmt.kind, AstStmt::Break) {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            AstStmt::Unsupported { construct } => {
                return Err(self.syntax(format!("unsupported construct: {construct}"), stmt.span));
            }
        };
        Ok(Some(self.alloc_stmt(kind, stmt.span)))
    }

    /// Lower a branch or loop body; declarations without a block get an empty one
    fn lower_nested(&mut self, stmt: &ast::Stmt, scope: ScopeId) -> Result<StmtId, ScopeError> {
        match self.lower_stmt(stmt, scope, false)? {
            Some(lowered) => Ok(lowered),
            None => {
                let block = self.tree.create_child(scope, ScopeKind::Block);
                Ok(self.alloc_stmt(
                    StmtKind::Block {
                        scope: block,
                        stmts: Vec::new(),
                    },
                    stmt.span,
                ))
            }
        }
    }

    // Functions and classes

    /// Allocate a function with an empty body and make it the current function
    fn begin_function(
        &mut self,
        decl: &ast::FunctionDecl,
        kind: FunctionKind,
        parent_scope: ScopeId,
        symbol: Option<SymbolId>,
        has_base: bool,
    ) -> Result<(FunctionId, Saved), ScopeError> {
        let scope = self.tree.create_child(parent_scope, ScopeKind::Function);
        let saved = Saved {
            function: self.current_function,
            this_binding: self.this_binding,
            loop_depth: self.loop_depth,
        };

        let default_name = match kind {
            FunctionKind::Arrow => "arrow",
            FunctionKind::Constructor { .. } => "constructor",
            _ if decl.default_export => "default",
            _ => "anonymous",
        };
        let name = self
            .tree
            .intern(decl.name.as_deref().unwrap_or(default_name));

        let this_param = match kind {
            FunctionKind::Method {
                is_static: false, ..
            }
            | FunctionKind::Constructor { .. } => {
                let this = self.tree.intern("this");
                let span = self.span(decl.span);
                Some(self.tree.declare(scope, this, DeclKind::This, span)?)
            }
            _ => None,
        };
        self.this_binding = match (kind, this_param) {
            (_, Some(symbol)) => Some(ThisBinding {
                symbol,
                has_base,
                in_constructor: matches!(kind, FunctionKind::Constructor { .. }),
            }),
            (FunctionKind::Arrow, None) => self.this_binding.map(|binding| ThisBinding {
                in_constructor: false,
                ..binding
            }),
            _ => None,
        };

        let ret = decl.ret.clone().map(|syntax| TypeRef { syntax, scope });
        let span = self.span(decl.span);
        let id = self.program.functions.alloc(FunctionDef {
            name,
            symbol,
            kind,
            module: self.module,
            scope,
            parent: self.current_function,
            params: Vec::new(),
            this_param,
            ret,
            body: Vec::new(),
            nested: Vec::new(),
            exported: decl.exported,
            default_export: decl.default_export,
            declare: decl.declare,
            span,
        });
        self.program.scope_functions.insert(scope, id);
        if let Some(parent) = self.current_function {
            self.program.functions[parent].nested.push(id);
        }
        self.current_function = Some(id);
        self.loop_depth = 0;
        Ok((id, saved))
    }

    fn lower_params(&mut self, id: FunctionId, params: &[ast::Param], span: Span) -> Result<(), ScopeError> {
        let scope = self.program.functions[id].scope;
        let mut lowered = Vec::with_capacity(params.len());
        for (position, param) in params.iter().enumerate() {
            if param.rest && position + 1 != params.len() {
                return Err(self.syntax("a rest parameter must be last", span));
            }
            let name = self.tree.intern(&param.name);
            let param_span = self.span(span);
            let symbol = self.tree.declare(scope, name, DeclKind::Param, param_span)?;
            let default = param
                .default
                .as_ref()
                .map(|default| self.lower_expr(default, scope))
                .transpose()?;
            lowered.push(ParamDef {
                symbol,
                ty: param.ty.clone().map(|syntax| TypeRef { syntax, scope }),
                default,
                rest: param.rest,
            });
        }
        self.program.functions[id].params = lowered;
        Ok(())
    }

    fn end_function(&mut self, id: FunctionId, body: Vec<StmtId>, saved: Saved) {
        self.program.functions[id].body = body;
        self.current_function = saved.function;
        self.this_binding = saved.this_binding;
        self.loop_depth = saved.loop_depth;
    }

    fn lower_function(
        &mut self,
        decl: &ast::FunctionDecl,
        kind: FunctionKind,
        parent_scope: ScopeId,
        symbol: Option<SymbolId>,
    ) -> Result<FunctionId, ScopeError> {
        let has_base = self.this_binding.is_some_and(|binding| binding.has_base);
        let (id, saved) = self.begin_function(decl, kind, parent_scope, symbol, has_base)?;
        self.lower_params(id, &decl.params, decl.span)?;
        let scope = self.program.functions[id].scope;
        let body = self.lower_items(&decl.body, scope, false)?;
        self.end_function(id, body, saved);
        Ok(id)
    }

    #[allow(clippy::too_many_lines, reason = "constructor, fields and methods in one pass")]
    fn lower_class(&mut self, decl: &ast::ClassDecl, scope: ScopeId, symbol: SymbolId) -> Result<ClassDefId, ScopeError> {
        let base = decl
            .base
            .as_ref()
            .map(|base| self.class_symbol(scope, base, decl.span))
            .transpose()?;
        let has_base = base.is_some();
        let class_scope = self.tree.create_child(scope, ScopeKind::Class);

        let mut constructors = decl.members.iter().filter_map(|member| match member {
            ast::ClassMember::Constructor(function) => Some(function),
            _ => None,
        });
        let written_ctor = constructors.next();
        if constructors.next().is_some() {
            return Err(self.syntax("a class may only have one constructor", decl.span));
        }
        let synthesized = ast::FunctionDecl::new(None, Vec::new(), None, Vec::new());
        let ctor_decl = written_ctor.unwrap_or(&synthesized);

        // The constructor is allocated first; no class is allocated in between,
        // so the class id is known in advance.
        let class_id: ClassDefId = idx_from_usize(self.program.classes.len());
        let (constructor, saved) = self.begin_function(
            ctor_decl,
            FunctionKind::Constructor { class: class_id },
            class_scope,
            None,
            has_base,
        )?;
        let name = self.tree.intern(&decl.name);
        let span = self.span(decl.span);
        let allocated = self.program.classes.alloc(ClassDef {
            name,
            symbol,
            module: self.module,
            scope: class_scope,
            base,
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            constructor,
            synthesized_constructor: written_ctor.is_none(),
            exported: decl.exported,
            default_export: decl.default_export,
            span,
        });
        debug_assert_eq!(allocated, class_id);

        let mut instance_names = MemberNames::default();
        let mut static_names = MemberNames::default();

        // Constructor: parameters, then instance field initializers, then body
        self.lower_params(constructor, &ctor_decl.params, ctor_decl.span)?;
        let ctor_scope = self.program.functions[constructor].scope;
        let init_scope = self.tree.create_child(ctor_scope, ScopeKind::Block);
        let mut fields = Vec::new();
        for member in &decl.members {
            if let ast::ClassMember::Field {
                name,
                ty,
                init,
                is_static: false,
                readonly,
            } = member
            {
                let field = self.lower_field(name, ty.as_ref(), init.as_ref(), *readonly, class_scope, init_scope, decl.span)?;
                self.claim_member(&mut instance_names, field.name, ast::MethodKind::Method, decl.span)?;
                fields.push(field);
            }
        }
        let body = self.lower_items(&ctor_decl.body, ctor_scope, false)?;
        self.end_function(constructor, body, saved);

        // Methods and accessors
        let mut methods = Vec::new();
        let mut static_methods = Vec::new();
        for member in &decl.members {
            let ast::ClassMember::Method {
                kind,
                is_static,
                function,
            } = member
            else {
                continue;
            };
            let method_kind = FunctionKind::Method {
                class: class_id,
                kind: *kind,
                is_static: *is_static,
            };
            let method = self.lower_function_in_class(function, method_kind, class_scope, has_base)?;
            let method_name = self.program.functions[method].name;
            if *is_static {
                self.claim_member(&mut static_names, method_name, *kind, function.span)?;
                static_methods.push(method);
            } else {
                self.claim_member(&mut instance_names, method_name, *kind, function.span)?;
                methods.push(method);
            }
        }

        // Static fields run in the class scope without `this`
        let outer_this = self.this_binding.take();
        let statics = self.lower_static_fields(decl, class_scope, &mut static_names);
        self.this_binding = outer_this;
        let statics = statics?;

        let class = &mut self.program.classes[class_id];
        class.fields = fields;
        class.statics = statics;
        class.methods = methods;
        class.static_methods = static_methods;
        Ok(class_id)
    }

    fn lower_function_in_class(
        &mut self,
        decl: &ast::FunctionDecl,
        kind: FunctionKind,
        class_scope: ScopeId,
        has_base: bool,
    ) -> Result<FunctionId, ScopeError> {
        let (id, saved) = self.begin_function(decl, kind, class_scope, None, has_base)?;
        self.lower_params(id, &decl.params, decl.span)?;
        let scope = self.program.functions[id].scope;
        let body = self.lower_items(&decl.body, scope, false)?;
        self.end_function(id, body, saved);
        Ok(id)
    }

    #[allow(clippy::too_many_arguments, reason = "field parts are passed unpacked")]
    fn lower_field(
        &mut self,
        name: &str,
        ty: Option<&ast::TypeExpr>,
        init: Option<&ast::Expr>,
        readonly: bool,
        type_scope: ScopeId,
        init_scope: ScopeId,
        span: Span,
    ) -> Result<FieldDef, ScopeError> {
        let init = init.map(|init| self.lower_expr(init, init_scope)).transpose()?;
        Ok(FieldDef {
            name: self.tree.intern(name),
            ty: ty.cloned().map(|syntax| TypeRef {
                syntax,
                scope: type_scope,
            }),
            init,
            readonly,
            span: self.span(span),
        })
    }

    fn lower_static_fields(
        &mut self,
        decl: &ast::ClassDecl,
        class_scope: ScopeId,
        names: &mut MemberNames,
    ) -> Result<Vec<FieldDef>, ScopeError> {
        let mut statics = Vec::new();
        for member in &decl.members {
            if let ast::ClassMember::Field {
                name,
                ty,
                init,
                is_static: true,
                readonly,
            } = member
            {
                let field = self.lower_field(name, ty.as_ref(), init.as_ref(), *readonly, class_scope, class_scope, decl.span)?;
                self.claim_member(names, field.name, ast::MethodKind::Method, decl.span)?;
                statics.push(field);
            }
        }
        Ok(statics)
    }

    /// Record a member name; a getter and a setter may share one
    fn claim_member(&self, names: &mut MemberNames, name: Name, kind: ast::MethodKind, span: Span) -> Result<(), ScopeError> {
        let paired = match kind {
            ast::MethodKind::Method => false,
            ast::MethodKind::Getter => names.accessors.contains(&(name, ast::MethodKind::Setter)),
            ast::MethodKind::Setter => names.accessors.contains(&(name, ast::MethodKind::Getter)),
        };
        let fresh_accessor = kind == ast::MethodKind::Method || names.accessors.insert((name, kind));
        if fresh_accessor && (paired || names.plain.insert(name)) {
            return Ok(());
        }
        Err(self.duplicate_member(name, span))
    }

    fn duplicate_member(&self, name: Name, span: Span) -> ScopeError {
        ScopeError::DuplicateDeclaration {
            name: self.tree.name(name).to_string(),
            first: self.span(span),
            second: self.span(span),
        }
    }

    fn lower_interface(&mut self, decl: &ast::InterfaceDecl, scope: ScopeId, symbol: SymbolId) -> InterfaceDefId {
        let members = decl
            .members
            .iter()
            .map(|member| InterfaceMemberDef {
                name: self.tree.intern(&member.name),
                kind: member.kind.clone(),
            })
            .collect();
        let name = self.tree.intern(&decl.name);
        self.program.interfaces.alloc(InterfaceDef {
            name,
            symbol,
            module: self.module,
            scope,
            members,
        })
    }

    fn class_symbol(&mut self, scope: ScopeId, name: &str, span: Span) -> Result<SymbolId, ScopeError> {
        let interned = self.tree.intern(name);
        let symbol = self.tree.resolve(scope, interned, self.span(span))?;
        if self.tree.symbol(symbol).kind == DeclKind::Class {
            Ok(symbol)
        } else {
            Err(self.syntax(format!("`{name}` is not a class"), span))
        }
    }

    // Expressions

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let span = self.span(span);
        self.program.exprs.alloc(Expr { kind, span })
    }

    fn lower_exprs(&mut self, exprs: &[ast::Expr], scope: ScopeId) -> Result<Vec<ExprId>, ScopeError> {
        exprs.iter().map(|expr| self.lower_expr(expr, scope)).collect()
    }

    fn value_symbol(&mut self, scope: ScopeId, name: &str, span: Span) -> Result<SymbolId, ScopeError> {
        let interned = self.tree.intern(name);
        let symbol = self.tree.resolve(scope, interned, self.span(span))?;
        match self.tree.symbol(symbol).kind {
            DeclKind::Interface => Err(self.syntax(
                format!("`{name}` only refers to a type, but is used as a value"),
                span,
            )),
            DeclKind::Namespace(_) => Err(self.syntax(
                format!("namespace `{name}` cannot be used as a value"),
                span,
            )),
            _ => Ok(symbol),
        }
    }

    fn this_symbol(&self, span: Span) -> Result<ThisBinding, ScopeError> {
        self.this_binding
            .ok_or_else(|| self.syntax("`this` is only available inside class members", span))
    }

    #[allow(clippy::too_many_lines, reason = "one arm per expression kind")]
    fn lower_expr(&mut self, expr: &ast::Expr, scope: ScopeId) -> Result<ExprId, ScopeError> {
        let kind = match &expr.kind {
            AstExpr::Number(value) => ExprKind::Literal(Literal::Number(*value)),
            AstExpr::String(value) => ExprKind::Literal(Literal::String(self.tree.intern(value))),
            AstExpr::Bool(value) => ExprKind::Literal(Literal::Bool(*value)),
            AstExpr::Null => ExprKind::Literal(Literal::Null),
            AstExpr::Undefined => ExprKind::Literal(Literal::Undefined),
            AstExpr::Ident(name) => ExprKind::Var(self.value_symbol(scope, name, expr.span)?),
            AstExpr::This => ExprKind::This(self.this_symbol(expr.span)?.symbol),
            AstExpr::Super => {
                return Err(self.syntax("`super` must be called or accessed", expr.span));
            }
            AstExpr::Binary { op, lhs, rhs } => ExprKind::Binary {
                op: *op,
                lhs: self.lower_expr(lhs, scope)?,
                rhs: self.lower_expr(rhs, scope)?,
            },
            AstExpr::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: self.lower_expr(operand, scope)?,
            },
            AstExpr::Assign { op, target, value } => ExprKind::Assign {
                op: *op,
                target: self.lower_place(target, scope)?,
                value: self.lower_expr(value, scope)?,
            },
            AstExpr::Update {
                increment,
                prefix,
                target,
            } => ExprKind::Update {
                increment: *increment,
                prefix: *prefix,
                target: self.lower_place(target, scope)?,
            },
            AstExpr::Call { callee, args } => {
                if matches!(callee.kind, AstExpr::Super) {
                    let binding = self.this_symbol(expr.span)?;
                    if !(binding.in_constructor && binding.has_base) {
                        return Err(self.syntax(
                            "`super()` is only allowed in constructors of derived classes",
                            expr.span,
                        ));
                    }
                    ExprKind::SuperCall {
                        this: binding.symbol,
                        args: self.lower_exprs(args, scope)?,
                    }
                } else {
                    ExprKind::Call {
                        callee: self.lower_expr(callee, scope)?,
                        args: self.lower_exprs(args, scope)?,
                    }
                }
            }
            AstExpr::New { class, args } => ExprKind::New {
                class: self.class_symbol(scope, class, expr.span)?,
                args: self.lower_exprs(args, scope)?,
            },
            AstExpr::Member { object, property } => self.lower_member(object, property, scope, expr.span)?,
            AstExpr::Index { object, index } => ExprKind::Index {
                object: self.lower_expr(object, scope)?,
                index: self.lower_expr(index, scope)?,
            },
            AstExpr::Array(elements) => ExprKind::Array(self.lower_exprs(elements, scope)?),
            AstExpr::Object(fields) => {
                let mut seen = FxHashSet::default();
                let mut lowered = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    let key = self.tree.intern(key);
                    if !seen.insert(key) {
                        return Err(self.duplicate_member(key, expr.span));
                    }
                    lowered.push((key, self.lower_expr(value, scope)?));
                }
                ExprKind::Object(lowered)
            }
            AstExpr::Function(decl) => {
                let kind = if decl.is_arrow {
                    FunctionKind::Arrow
                } else {
                    FunctionKind::Expression
                };
                ExprKind::Closure(self.lower_function(decl, kind, scope, None)?)
            }
            AstExpr::Conditional {
                cond,
                then,
                otherwise,
            } => ExprKind::Conditional {
                cond: self.lower_expr(cond, scope)?,
                then: self.lower_expr(then, scope)?,
                otherwise: self.lower_expr(otherwise, scope)?,
            },
            AstExpr::As { expr: inner, ty } => ExprKind::As {
                expr: self.lower_expr(inner, scope)?,
                ty: TypeRef {
                    syntax: ty.clone(),
                    scope,
                },
            },
            AstExpr::InstanceOf { expr: inner, class } => ExprKind::InstanceOf {
                expr: self.lower_expr(inner, scope)?,
                class: self.class_symbol(scope, class, expr.span)?,
            },
        };
        Ok(self.alloc_expr(kind, expr.span))
    }

    fn lower_member(&mut self, object: &ast::Expr, property: &str, scope: ScopeId, span: Span) -> Result<ExprKind, ScopeError> {
        match &object.kind {
            AstExpr::Super => {
                let binding = self.this_symbol(span)?;
                if !binding.has_base {
                    return Err(self.syntax("`super` is only available in derived classes", span));
                }
                Ok(ExprKind::SuperMember {
                    this: binding.symbol,
                    name: self.tree.intern(property),
                })
            }
            AstExpr::Ident(name) => {
                let interned = self.tree.intern(name);
                let namespace = self
                    .tree
                    .lookup(scope, interned)
                    .and_then(|symbol| match self.tree.symbol(symbol).kind {
                        DeclKind::Namespace(module) => Some(module),
                        _ => None,
                    });
                if let Some(module) = namespace {
                    let key = self.export_key(property);
                    let use_site = self.span(span);
                    let tree = &self.tree;
                    let symbol = self
                        .exports
                        .resolve(module, key, use_site, |key| describe_key(tree, key))?;
                    return Ok(ExprKind::Var(symbol));
                }
                Ok(ExprKind::Member {
                    object: self.lower_expr(object, scope)?,
                    name: self.tree.intern(property),
                })
            }
            _ => Ok(ExprKind::Member {
                object: self.lower_expr(object, scope)?,
                name: self.tree.intern(property),
            }),
        }
    }

    /// Lower an assignment target
    fn lower_place(&mut self, target: &ast::Expr, scope: ScopeId) -> Result<ExprId, ScopeError> {
        match &target.kind {
            AstExpr::Ident(name) => {
                let symbol = self.value_symbol(scope, name, target.span)?;
                if !self.tree.symbol(symbol).mutable {
                    return Err(self.syntax(format!("cannot assign to `{name}`"), target.span));
                }
                Ok(self.alloc_expr(ExprKind::Var(symbol), target.span))
            }
            AstExpr::Member { object, .. } if matches!(object.kind, AstExpr::Super) => {
                Err(self.syntax("cannot assign through `super`", target.span))
            }
            AstExpr::Member { .. } | AstExpr::Index { .. } => self.lower_expr(target, scope),
            _ => Err(self.syntax("invalid assignment target", target.span)),
        }
    }
}

/// Member names already used in one class body (instance or static side)
#[derive(Debug, Default)]
struct MemberNames {
    plain: FxHashSet<Name>,
    accessors: FxHashSet<(Name, ast::MethodKind)>,
}

/// Context restored when leaving a function
#[derive(Debug, Clone, Copy)]
struct Saved {
    function: Option<FunctionId>,
    this_binding: Option<ThisBinding>,
    loop_depth: u32,
}

const fn var_kind(kind: ast::VarKind) -> DeclKind {
    match kind {
        ast::VarKind::Var => DeclKind::Var,
        ast::VarKind::Let => DeclKind::Let,
        ast::VarKind::Const => DeclKind::Const,
    }
}

fn describe_key(tree: &ScopeTree, key: ExportKey) -> String {
    match key {
        ExportKey::Named(name) => tree.name(name).to_string(),
        ExportKey::Default => "default".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_ast::build::*;

    fn lower(modules: Vec<ast::Module>) -> Result<LoweredUnit, ScopeError> {
        let entry = modules[0].name.clone();
        lower_unit(&modules, &entry, &LowerOptions::default())
    }

    fn syntax_message(err: ScopeError) -> String {
        match err {
            ScopeError::Syntax { message, .. } => message,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_let_in_one_scope() {
        let err = lower(vec![module(
            "main",
            vec![let_("x", None, Some(num(1.0))), let_("x", None, Some(num(2.0)))],
        )])
        .unwrap_err();
        assert!(matches!(err, ScopeError::DuplicateDeclaration { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_var_redeclaration_shares_symbol() {
        let body = vec![
            var("n", None, Some(num(1.0))),
            block(vec![var("n", None, Some(num(2.0)))]),
            return_(ident("n")),
        ];
        let unit = lower(vec![module(
            "main",
            vec![function_stmt(function("f", Vec::new(), Some(ty("number")), body))],
        )])
        .unwrap();

        let f = unit.program.module(ModuleId(0)).functions[0];
        let def = &unit.program.functions[f];
        let name = unit.scopes.interner.get("n").unwrap();
        let hoisted = unit.scopes.lookup_local(def.scope, name).unwrap();
        let StmtKind::Return(Some(value)) = unit.program.stmts[def.body[2]].kind else {
            panic!("expected return");
        };
        assert!(matches!(unit.program.exprs[value].kind, ExprKind::Var(symbol) if symbol == hoisted));
    }

    #[test]
    fn test_undefined_name_suggests_close_match() {
        let err = lower(vec![module(
            "main",
            vec![let_("counter", None, Some(num(0.0))), expr_stmt(ident("countr"))],
        )])
        .unwrap_err();
        assert!(matches!(
            err,
            ScopeError::UndefinedName { ref name, ref suggestion, .. }
                if name == "countr" && suggestion.as_deref() == Some("counter")
        ));
    }

    #[test]
    fn test_import_resolves_through_default_reexport() {
        let base = module(
            "base",
            vec![function_stmt(
                function("answer", Vec::new(), Some(ty("number")), vec![return_(num(42.0))]).default_export(),
            )],
        );
        let middle = module("middle", vec![export_named(&[("default", "answer")], Some("base"))]);
        let main = module(
            "main",
            vec![
                import_named("middle", &[("answer", "getAnswer")]),
                expr_stmt(call(ident("getAnswer"), Vec::new())),
            ],
        );
        let unit = lower_unit(&[base, middle, main], "main", &LowerOptions::default()).unwrap();

        let answer = unit.program.module(ModuleId(0)).functions[0];
        let answer_symbol = unit.program.functions[answer].symbol.unwrap();
        let main = unit.program.module(ModuleId(2));
        let StmtKind::Expr(call) = unit.program.stmts[main.body[0]].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { callee, .. } = unit.program.exprs[call].kind else {
            panic!("expected call");
        };
        assert!(matches!(unit.program.exprs[callee].kind, ExprKind::Var(symbol) if symbol == answer_symbol));
        assert_eq!(unit.program.init_order, vec![ModuleId(0), ModuleId(1), ModuleId(2)]);
    }

    #[test]
    fn test_namespace_member_is_the_exported_symbol() {
        let lib = module("lib", vec![export_let("version", Some(ty("number")), Some(num(3.0)))]);
        let main = module(
            "main",
            vec![import_namespace("lib", "L"), expr_stmt(member(ident("L"), "version"))],
        );
        let unit = lower_unit(&[lib, main], "main", &LowerOptions::default()).unwrap();

        let name = unit.scopes.interner.get("version").unwrap();
        let version = unit
            .scopes
            .lookup_local(unit.program.module(ModuleId(0)).scope, name)
            .unwrap();
        let StmtKind::Expr(expr) = unit.program.stmts[unit.program.module(ModuleId(1)).body[0]].kind else {
            panic!("expected expression statement");
        };
        assert!(matches!(unit.program.exprs[expr].kind, ExprKind::Var(symbol) if symbol == version));
    }

    #[test]
    fn test_unknown_export_is_reported() {
        let lib = module("lib", vec![let_("hidden", None, Some(num(1.0)))]);
        let main = module("main", vec![import_named("lib", &[("hidden", "hidden")])]);
        let err = lower_unit(&[lib, main], "main", &LowerOptions::default()).unwrap_err();
        assert!(matches!(err, ScopeError::UnknownExport { ref name, .. } if name == "hidden"));
    }

    #[test]
    fn test_super_outside_derived_class() {
        let shape = class("Shape").method(
            "area",
            Vec::new(),
            Some(ty("number")),
            vec![return_(method_call(super_(), "area", Vec::new()))],
        );
        let err = lower(vec![module("main", vec![class_stmt(shape)])]).unwrap_err();
        assert!(syntax_message(err).contains("derived"));
    }

    #[test]
    fn test_break_outside_loop() {
        let err = lower(vec![module(
            "main",
            vec![function_stmt(function("f", Vec::new(), None, vec![break_()]))],
        )])
        .unwrap_err();
        assert!(syntax_message(err).contains("outside of a loop"));
    }

    #[test]
    fn test_const_assignment_rejected() {
        let err = lower(vec![module(
            "main",
            vec![const_("limit", None, num(1.0)), expr_stmt(assign(ident("limit"), num(2.0)))],
        )])
        .unwrap_err();
        assert!(syntax_message(err).contains("limit"));
    }

    #[test]
    fn test_class_gets_synthesized_constructor_and_this() {
        let point = class("Point")
            .field("x", Some(ty("number")), Some(num(0.0)))
            .getter("size", ty("number"), vec![return_(member(this(), "x"))])
            .setter("size", param("value", Some(ty("number"))), Vec::new());
        let unit = lower(vec![module("main", vec![class_stmt(point)])]).unwrap();

        let class = &unit.program.classes[unit.program.module(ModuleId(0)).classes[0]];
        assert!(class.synthesized_constructor);
        assert_eq!(class.methods.len(), 2);
        let ctor = &unit.program.functions[class.constructor];
        assert!(ctor.this_param.is_some());
        assert_eq!(unit.program.class_of_symbol(class.symbol), Some(unit.program.module(ModuleId(0)).classes[0]));
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let widget = class("Widget")
            .method("draw", Vec::new(), None, Vec::new())
            .method("draw", Vec::new(), None, Vec::new());
        let err = lower(vec![module("main", vec![class_stmt(widget)])]).unwrap_err();
        assert!(matches!(err, ScopeError::DuplicateDeclaration { ref name, .. } if name == "draw"));
    }

    #[test]
    fn test_arrow_in_method_sees_this() {
        let counter = class("Counter").field("count", Some(ty("number")), Some(num(0.0))).method(
            "bump",
            Vec::new(),
            None,
            vec![
                let_("step", None, Some(arrow(Vec::new(), vec![expr_stmt(increment(member(this(), "count"), false))]))),
                expr_stmt(call(ident("step"), Vec::new())),
            ],
        );
        let unit = lower(vec![module("main", vec![class_stmt(counter)])]).unwrap();
        let class = &unit.program.classes[unit.program.module(ModuleId(0)).classes[0]];
        let method = &unit.program.functions[class.methods[0]];
        let arrow = method.nested[0];
        assert_eq!(unit.program.functions[arrow].kind, FunctionKind::Arrow);
        assert_eq!(unit.program.functions[arrow].parent, Some(class.methods[0]));
    }

    #[test]
    fn test_builtins_are_aliased_unless_shadowed() {
        let options = LowerOptions {
            builtin_values: vec!["console".to_string(), "Math".to_string()],
            import_builtins: true,
        };
        let main = module("main", vec![let_("Math", None, Some(num(1.0)))]);
        let unit = lower_unit(&[main], "main", &options).unwrap();

        let scope = unit.program.module(ModuleId(0)).scope;
        let console = unit.scopes.interner.get("console").unwrap();
        let math = unit.scopes.interner.get("Math").unwrap();
        let builtin_scope = unit.program.builtin_scope.unwrap();
        assert_eq!(
            unit.scopes.lookup_local(scope, console),
            unit.scopes.lookup_local(builtin_scope, console)
        );
        assert_ne!(
            unit.scopes.lookup_local(scope, math),
            unit.scopes.lookup_local(builtin_scope, math)
        );
    }
}
