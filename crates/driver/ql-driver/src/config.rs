//! Compiler configuration, read from TOML

use anyhow::{Context, Result};
use ql_lower::LayoutPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for one compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Entry module; only its exports are exported
    pub entry: String,
    /// Memory and table sizing
    pub layout: LayoutPolicy,
    /// Reject `any` and dynamic coercions
    pub disable_any: bool,
    /// Do not declare the builtin namespaces
    pub disable_builtins: bool,
    /// Logging
    pub log: LogConfig,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            layout: LayoutPolicy::default(),
            disable_any: false,
            disable_builtins: false,
            log: LogConfig::default(),
        }
    }
}

fn default_entry() -> String {
    "main".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `"ql_ty=debug"`; falls back to `QUILL_LOG`
    pub filter: Option<String>,
}

impl CompileOptions {
    /// Parse options from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or has unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid compiler configuration")
    }

    /// Load options from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(CompileOptions::from_toml_str("").unwrap(), CompileOptions::default());
        assert_eq!(CompileOptions::default().layout, LayoutPolicy::default());
    }

    #[test]
    fn test_partial_config() {
        let options = CompileOptions::from_toml_str(
            r#"
entry = "app"
disable_any = true

[layout]
stack_size = 65536

[log]
filter = "ql_lower=trace"
"#,
        )
        .unwrap();
        assert_eq!(options.entry, "app");
        assert!(options.disable_any);
        assert!(!options.disable_builtins);
        assert_eq!(options.layout.stack_size, 65536);
        assert_eq!(options.layout.reserved_header, LayoutPolicy::default().reserved_header);
        assert_eq!(options.log.filter.as_deref(), Some("ql_lower=trace"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(CompileOptions::from_toml_str("optimize = true").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "entry = \"lib\"").unwrap();
        let options = CompileOptions::load(file.path()).unwrap();
        assert_eq!(options.entry, "lib");

        let missing = file.path().with_extension("missing");
        let error = CompileOptions::load(&missing).unwrap_err();
        assert!(error.to_string().contains("failed to read configuration"));
    }
}
