//! Scope tree for name resolution

use crate::error::ScopeError;
use crate::symbol::{DeclKind, StorageClass, Symbol, SymbolId};
use crate::ModuleId;
use indexmap::IndexMap;
use ql_arena::{Arena, Idx};
use ql_intern::{Interner, Name};
use ql_span::FileSpan;
use ql_ty_id::TyId;
use tracing::trace;

/// Unique identifier for a scope
pub type ScopeId = Idx<ScopeData>;

/// Kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Root scope holding the builtin declarations
    Global,
    /// Root scope of one source module
    Module,
    /// Body of a function, method, constructor or arrow
    Function,
    /// `{ ... }` inside a function or module
    Block,
    /// Class body (static field initializers)
    Class,
}

/// A single scope
#[derive(Debug, Clone)]
pub struct ScopeData {
    /// Kind of scope
    pub kind: ScopeKind,
    /// Enclosing scope, `None` for root scopes
    pub parent: Option<ScopeId>,
    /// Nested scopes in creation order
    pub children: Vec<ScopeId>,
    /// Module the scope belongs to
    pub module: ModuleId,
    symbols: IndexMap<Name, SymbolId>,
    aliases: IndexMap<Name, Alias>,
}

#[derive(Debug, Clone, Copy)]
struct Alias {
    target: SymbolId,
    span: FileSpan,
}

impl ScopeData {
    /// Symbols declared directly in this scope, in declaration order
    pub fn symbols(&self) -> impl Iterator<Item = (Name, SymbolId)> + '_ {
        self.symbols.iter().map(|(name, id)| (*name, *id))
    }

    /// Alias entries (imports) of this scope
    pub fn aliases(&self) -> impl Iterator<Item = (Name, SymbolId)> + '_ {
        self.aliases.iter().map(|(name, alias)| (*name, alias.target))
    }

    /// Whether the scope starts a new function body
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.kind == ScopeKind::Function
    }

    /// Whether the scope is a module or builtin root
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self.kind, ScopeKind::Global | ScopeKind::Module)
    }
}

/// Every scope and symbol of one compilation unit
///
/// Parent links are arena indices, so the tree never holds reference cycles.
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Arena<ScopeData>,
    symbols: Arena<Symbol>,
    /// Interner for every identifier of the unit
    pub interner: Interner,
}

impl ScopeTree {
    /// Create an empty scope tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name
    pub fn intern(&mut self, text: &str) -> Name {
        self.interner.intern(text)
    }

    /// Text of an interned name
    pub fn name(&self, name: Name) -> &str {
        self.interner.resolve(name)
    }

    /// Create a root scope (the builtin scope or a module scope)
    pub fn create_root(&mut self, kind: ScopeKind, module: ModuleId) -> ScopeId {
        self.scopes.alloc(ScopeData {
            kind,
            parent: None,
            children: Vec::new(),
            module,
            symbols: IndexMap::new(),
            aliases: IndexMap::new(),
        })
    }

    /// Create a child scope
    pub fn create_child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let module = self.scopes[parent].module;
        let child = self.scopes.alloc(ScopeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            module,
            symbols: IndexMap::new(),
            aliases: IndexMap::new(),
        });
        self.scopes[parent].children.push(child);
        child
    }

    /// Scope data
    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id]
    }

    /// Symbol data
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    /// Name of a symbol as text
    pub fn symbol_name(&self, id: SymbolId) -> &str {
        self.name(self.symbols[id].name)
    }

    /// All symbols of the unit
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter()
    }

    /// Declare `name` in `scope`
    ///
    /// `var` declarations land in the nearest function or root scope and may
    /// be repeated; the repeat returns the first symbol.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::DuplicateDeclaration` if the name already exists
    /// directly in the target scope.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: Name,
        kind: DeclKind,
        span: FileSpan,
    ) -> Result<SymbolId, ScopeError> {
        let target = if kind == DeclKind::Var {
            self.var_scope(scope)
        } else {
            scope
        };

        if let Some(existing) = self.lookup_local(target, name) {
            let previous = &self.symbols[existing];
            if kind == DeclKind::Var && previous.kind == DeclKind::Var {
                return Ok(existing);
            }
            return Err(ScopeError::DuplicateDeclaration {
                name: self.name(name).to_string(),
                first: previous.span,
                second: span,
            });
        }

        let storage = match kind {
            DeclKind::Param | DeclKind::This => StorageClass::Parameter,
            _ if self.scopes[target].is_root() => StorageClass::Global,
            _ => StorageClass::Local,
        };
        let id = self.symbols.alloc(Symbol {
            name,
            kind,
            storage,
            mutable: kind.is_mutable(),
            ty: None,
            scope: target,
            span,
        });
        self.scopes[target].symbols.insert(name, id);
        trace!(name = self.name(name), ?kind, ?storage, "declared symbol");
        Ok(id)
    }

    /// Bind `name` in `scope` to a symbol owned elsewhere (an import)
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::DuplicateDeclaration` if `name` is already bound
    /// directly in `scope`, unless it is bound to the same symbol.
    pub fn add_alias(
        &mut self,
        scope: ScopeId,
        name: Name,
        target: SymbolId,
        span: FileSpan,
    ) -> Result<(), ScopeError> {
        if let Some(existing) = self.lookup_local(scope, name) {
            if existing == target {
                return Ok(());
            }
            let first = self.scopes[scope]
                .aliases
                .get(&name)
                .map_or(self.symbols[existing].span, |alias| alias.span);
            return Err(ScopeError::DuplicateDeclaration {
                name: self.name(name).to_string(),
                first,
                second: span,
            });
        }
        self.scopes[scope].aliases.insert(name, Alias { target, span });
        Ok(())
    }

    /// Find `name` directly in `scope`: own symbols first, then aliases
    pub fn lookup_local(&self, scope: ScopeId, name: Name) -> Option<SymbolId> {
        let data = &self.scopes[scope];
        data.symbols
            .get(&name)
            .or_else(|| data.aliases.get(&name).map(|alias| &alias.target))
            .copied()
    }

    /// Find `name` starting at `scope` and walking outwards
    pub fn lookup(&self, scope: ScopeId, name: Name) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            if let Some(found) = self.lookup_local(scope_id, name) {
                return Some(found);
            }
            current = self.scopes[scope_id].parent;
        }
        None
    }

    /// Like [`ScopeTree::lookup`], but reports a missing name
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::UndefinedName` with the closest visible name as a
    /// suggestion.
    pub fn resolve(&self, scope: ScopeId, name: Name, use_site: FileSpan) -> Result<SymbolId, ScopeError> {
        self.lookup(scope, name).ok_or_else(|| {
            let target = self.name(name);
            let visible = self.visible_names(scope);
            ScopeError::UndefinedName {
                name: target.to_string(),
                use_site,
                suggestion: ScopeError::closest_name(target, visible),
            }
        })
    }

    /// Every name visible from `scope`, innermost first
    pub fn visible_names(&self, scope: ScopeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            let data = &self.scopes[scope_id];
            names.extend(data.symbols.keys().map(|name| self.name(*name)));
            names.extend(data.aliases.keys().map(|name| self.name(*name)));
            current = data.parent;
        }
        names
    }

    /// The root scope above `scope`
    pub fn root_global(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(parent) = self.scopes[current].parent {
            current = parent;
        }
        current
    }

    /// Nearest enclosing function scope, including `scope` itself
    pub fn nearest_function(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(scope_id) = current {
            if self.scopes[scope_id].is_function() {
                return Some(scope_id);
            }
            current = self.scopes[scope_id].parent;
        }
        None
    }

    /// Scope a `var` declared in `scope` binds in
    pub fn var_scope(&self, scope: ScopeId) -> ScopeId {
        self.nearest_function(scope)
            .unwrap_or_else(|| self.root_global(scope))
    }

    /// Whether `ancestor` encloses `descendant` (or is the same scope)
    pub fn is_ancestor(&self, ancestor: ScopeId, descendant: ScopeId) -> bool {
        let mut current = Some(descendant);
        while let Some(scope_id) = current {
            if scope_id == ancestor {
                return true;
            }
            current = self.scopes[scope_id].parent;
        }
        false
    }

    /// Record the resolved type of a symbol
    pub fn set_type(&mut self, symbol: SymbolId, ty: TyId) {
        self.symbols[symbol].ty = Some(ty);
    }

    /// Change where a symbol lives
    pub fn set_storage(&mut self, symbol: SymbolId, storage: StorageClass) {
        self.symbols[symbol].storage = storage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_span::{FileId, Span};

    fn span(start: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::new(start, start + 1))
    }

    fn module_tree() -> (ScopeTree, ScopeId) {
        let mut tree = ScopeTree::new();
        let root = tree.create_root(ScopeKind::Module, ModuleId(0));
        (tree, root)
    }

    #[test]
    fn test_duplicate_let_rejected() {
        let (mut tree, root) = module_tree();
        let name = tree.intern("x");
        tree.declare(root, name, DeclKind::Let, span(0)).unwrap();

        let err = tree.declare(root, name, DeclKind::Let, span(5)).unwrap_err();
        assert_eq!(
            err,
            ScopeError::DuplicateDeclaration {
                name: "x".to_string(),
                first: span(0),
                second: span(5),
            }
        );
    }

    #[test]
    fn test_var_redeclaration_reuses_symbol() {
        let (mut tree, root) = module_tree();
        let name = tree.intern("total");
        let first = tree.declare(root, name, DeclKind::Var, span(0)).unwrap();
        let second = tree.declare(root, name, DeclKind::Var, span(3)).unwrap();
        assert_eq!(first, second);

        let err = tree.declare(root, name, DeclKind::Let, span(7));
        assert!(matches!(err, Err(ScopeError::DuplicateDeclaration { .. })));
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let (mut tree, root) = module_tree();
        let function = tree.create_child(root, ScopeKind::Function);
        let block = tree.create_child(function, ScopeKind::Block);
        let name = tree.intern("hoisted");

        let id = tree.declare(block, name, DeclKind::Var, span(0)).unwrap();
        assert_eq!(tree.symbol(id).scope, function);
        assert_eq!(tree.symbol(id).storage, StorageClass::Local);
        assert_eq!(tree.lookup(function, name), Some(id));
    }

    #[test]
    fn test_lookup_prefers_nearest() {
        let (mut tree, root) = module_tree();
        let function = tree.create_child(root, ScopeKind::Function);
        let name = tree.intern("value");
        let outer = tree.declare(root, name, DeclKind::Let, span(0)).unwrap();
        let inner = tree.declare(function, name, DeclKind::Param, span(4)).unwrap();

        assert_eq!(tree.lookup(function, name), Some(inner));
        assert_eq!(tree.lookup(root, name), Some(outer));
        assert_eq!(tree.symbol(outer).storage, StorageClass::Global);
        assert_eq!(tree.symbol(inner).storage, StorageClass::Parameter);
        assert_eq!(tree.root_global(function), root);
    }

    #[test]
    fn test_alias_resolves_to_foreign_symbol() {
        let mut tree = ScopeTree::new();
        let lib = tree.create_root(ScopeKind::Module, ModuleId(0));
        let main = tree.create_root(ScopeKind::Module, ModuleId(1));
        let helper = tree.intern("helper");
        let local = tree.intern("help");
        let owned = tree.declare(lib, helper, DeclKind::Function, span(0)).unwrap();

        tree.add_alias(main, local, owned, span(9)).unwrap();
        assert_eq!(tree.lookup(main, local), Some(owned));
        assert_eq!(tree.symbol(owned).scope, lib);
        assert!(tree.add_alias(main, local, owned, span(12)).is_ok());

        let clash = tree.declare(main, local, DeclKind::Let, span(14));
        assert!(matches!(clash, Err(ScopeError::DuplicateDeclaration { .. })));
    }

    #[test]
    fn test_undefined_name_suggests() {
        let (mut tree, root) = module_tree();
        let counter = tree.intern("counter");
        tree.declare(root, counter, DeclKind::Let, span(0)).unwrap();
        let typo = tree.intern("countr");

        match tree.resolve(root, typo, span(8)) {
            Err(ScopeError::UndefinedName { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("counter"));
            }
            other => panic!("expected undefined name, got {other:?}"),
        }
    }
}
