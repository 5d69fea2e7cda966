//! Per-module export tables and import resolution

use crate::error::ScopeError;
use crate::symbol::SymbolId;
use crate::ModuleId;
use indexmap::IndexMap;
use ql_intern::Name;
use ql_span::FileSpan;
use rustc_hash::FxHashSet;

/// Key under which a module exports something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKey {
    /// `export { x }` / `export function x`
    Named(Name),
    /// `export default x`
    Default,
}

/// What an export key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    /// A symbol owned by the exporting module
    Local(SymbolId),
    /// `export { name as key } from "module"`
    ReExport {
        /// Module the name comes from
        module: ModuleId,
        /// Key looked up in that module
        key: ExportKey,
    },
}

/// Exports of one module
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    /// Module specifier
    pub specifier: String,
    /// Exported keys in declaration order
    pub entries: IndexMap<ExportKey, ExportTarget>,
}

/// Export tables of every module in the unit
#[derive(Debug, Clone, Default)]
pub struct ExportTable {
    modules: Vec<ModuleExports>,
}

impl ExportTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module; ids are handed out in registration order
    pub fn add_module(&mut self, specifier: &str) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(ModuleExports {
            specifier: specifier.to_string(),
            entries: IndexMap::new(),
        });
        id
    }

    /// Look a module up by specifier
    pub fn find_module(&self, specifier: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|module| module.specifier == specifier)
            .map(|index| ModuleId(index as u32))
    }

    /// Exports of `module`
    pub fn module(&self, module: ModuleId) -> &ModuleExports {
        &self.modules[module.index()]
    }

    /// Record an export; a later export under the same key replaces it
    pub fn export(&mut self, module: ModuleId, key: ExportKey, target: ExportTarget) {
        self.modules[module.index()].entries.insert(key, target);
    }

    /// Follow `key` in `module` until it lands on a symbol
    ///
    /// Re-export chains are followed left to right. `describe` renders a key
    /// for error messages.
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::UnknownExport` if a link of the chain is missing
    /// or the chain loops back on itself.
    pub fn resolve(
        &self,
        module: ModuleId,
        key: ExportKey,
        use_site: FileSpan,
        describe: impl Fn(ExportKey) -> String,
    ) -> Result<SymbolId, ScopeError> {
        let mut visited = FxHashSet::default();
        let mut current = (module, key);

        loop {
            let (module_id, export_key) = current;
            let missing = || ScopeError::UnknownExport {
                module: self.modules[module_id.index()].specifier.clone(),
                name: describe(export_key),
                use_site,
            };
            if !visited.insert(current) {
                return Err(missing());
            }
            match self.modules[module_id.index()].entries.get(&export_key) {
                Some(ExportTarget::Local(symbol)) => return Ok(*symbol),
                Some(ExportTarget::ReExport { module, key }) => current = (*module, *key),
                None => return Err(missing()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeclKind, ScopeKind, ScopeTree};

    #[test]
    fn test_reexport_chain_resolves_left_to_right() {
        let mut tree = ScopeTree::new();
        let mut table = ExportTable::new();
        let base = table.add_module("base");
        let middle = table.add_module("middle");
        let base_scope = tree.create_root(ScopeKind::Module, base);
        let answer = tree.intern("answer");
        let renamed = tree.intern("renamed");
        let symbol = tree
            .declare(base_scope, answer, DeclKind::Function, FileSpan::default())
            .unwrap();

        table.export(base, ExportKey::Default, ExportTarget::Local(symbol));
        table.export(
            middle,
            ExportKey::Named(renamed),
            ExportTarget::ReExport {
                module: base,
                key: ExportKey::Default,
            },
        );

        let resolved = table
            .resolve(middle, ExportKey::Named(renamed), FileSpan::default(), |_| String::new())
            .unwrap();
        assert_eq!(resolved, symbol);
        assert_eq!(table.find_module("middle"), Some(middle));
    }

    #[test]
    fn test_reexport_cycle_is_an_error() {
        let mut tree = ScopeTree::new();
        let mut table = ExportTable::new();
        let left = table.add_module("left");
        let right = table.add_module("right");
        let name = tree.intern("loop");
        let key = ExportKey::Named(name);
        table.export(left, key, ExportTarget::ReExport { module: right, key });
        table.export(right, key, ExportTarget::ReExport { module: left, key });

        let err = table
            .resolve(left, key, FileSpan::default(), |_| "loop".to_string())
            .unwrap_err();
        assert!(matches!(err, ScopeError::UnknownExport { ref name, .. } if name == "loop"));
    }
}
