//! The IR Builder boundary
//!
//! Binary emission lives outside this workspace. The planner drives it
//! through [`IrBuilder`], one typed call per declaration; the builder
//! reports misuse through [`IrBuilderError`].

use crate::error::IrBuilderError;
use rustc_hash::FxHashSet;
use std::fmt;

/// Value types the planner hands to the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    /// 32-bit integer: booleans, pointers and handles
    I32,
    /// Double: every `number`
    F64,
    /// Reference to a managed struct, array, string or closure
    Ref,
    /// Reference to a dynamic value
    Dyn,
    /// No value
    Void,
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::F64 => "f64",
            Self::Ref => "ref",
            Self::Dyn => "anyref",
            Self::Void => "none",
        })
    }
}

/// Initial value of a global
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalInit {
    /// Integer constant
    I32(i32),
    /// Double constant
    F64(f64),
    /// Null reference, filled in by the module initializer
    Null,
}

impl fmt::Display for GlobalInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(value) => write!(f, "{value}"),
            Self::F64(value) => write!(f, "{value:?}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Construction interface of the external emission backend
pub trait IrBuilder {
    /// Linear memory, in pages
    fn declare_memory(&mut self, initial: u32, maximum: u32) -> Result<(), IrBuilderError>;

    /// Active data segment at `offset`
    fn declare_data_segment(&mut self, offset: u32, bytes: &[u8]) -> Result<(), IrBuilderError>;

    /// Named global
    fn declare_global(
        &mut self,
        name: &str,
        ty: IrType,
        mutable: bool,
        init: GlobalInit,
    ) -> Result<(), IrBuilderError>;

    /// Reference table
    fn declare_table(&mut self, name: &str, initial: u32, maximum: u32) -> Result<(), IrBuilderError>;

    /// Managed struct type
    fn declare_struct(&mut self, name: &str, fields: &[IrType]) -> Result<(), IrBuilderError>;

    /// Function with its parameter and local types
    fn declare_function(
        &mut self,
        name: &str,
        params: &[IrType],
        result: IrType,
        locals: &[IrType],
    ) -> Result<(), IrBuilderError>;

    /// Constant vtable instance of struct `name`, binding slot `i` to `slots[i]`
    fn declare_vtable(&mut self, name: &str, slots: &[String]) -> Result<(), IrBuilderError>;

    /// Imported host function
    fn declare_import(
        &mut self,
        module: &str,
        name: &str,
        params: &[IrType],
        result: IrType,
    ) -> Result<(), IrBuilderError>;

    /// Export of a declared function
    fn declare_export(&mut self, external: &str, internal: &str) -> Result<(), IrBuilderError>;

    /// Start function calling `calls` in order
    fn declare_start(&mut self, name: &str, calls: &[String]) -> Result<(), IrBuilderError>;
}

/// Builder that records every call as a line of text
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    out: String,
    names: FxHashSet<(&'static str, String)>,
}

impl RecordingBuilder {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn output(&self) -> &str {
        &self.out
    }

    fn claim(&mut self, kind: &'static str, name: &str) -> Result<(), IrBuilderError> {
        if self.names.insert((kind, name.to_string())) {
            Ok(())
        } else {
            Err(IrBuilderError::Duplicate {
                kind,
                name: name.to_string(),
            })
        }
    }

    fn require_functions(&self, names: &[String]) -> Result<(), IrBuilderError> {
        match names
            .iter()
            .find(|name| !self.names.contains(&("function", (*name).clone())))
        {
            Some(name) => Err(IrBuilderError::Unknown {
                kind: "function",
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        self.out.push_str(&fmt::format(args));
        self.out.push('\n');
    }
}

fn list(types: &[IrType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IrBuilder for RecordingBuilder {
    fn declare_memory(&mut self, initial: u32, maximum: u32) -> Result<(), IrBuilderError> {
        self.claim("memory", "memory")?;
        self.line(format_args!("memory initial={initial} maximum={maximum}"));
        Ok(())
    }

    fn declare_data_segment(&mut self, offset: u32, bytes: &[u8]) -> Result<(), IrBuilderError> {
        let text = String::from_utf8_lossy(bytes).replace('\0', "\\0");
        self.line(format_args!("data @{offset} \"{text}\""));
        Ok(())
    }

    fn declare_global(
        &mut self,
        name: &str,
        ty: IrType,
        mutable: bool,
        init: GlobalInit,
    ) -> Result<(), IrBuilderError> {
        self.claim("global", name)?;
        let mutability = if mutable { "mut " } else { "" };
        self.line(format_args!("global {name}: {mutability}{ty} = {init}"));
        Ok(())
    }

    fn declare_table(&mut self, name: &str, initial: u32, maximum: u32) -> Result<(), IrBuilderError> {
        self.claim("table", name)?;
        self.line(format_args!("table {name} initial={initial} maximum={maximum}"));
        Ok(())
    }

    fn declare_struct(&mut self, name: &str, fields: &[IrType]) -> Result<(), IrBuilderError> {
        self.claim("struct", name)?;
        self.line(format_args!("struct {name} {{{}}}", list(fields)));
        Ok(())
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[IrType],
        result: IrType,
        locals: &[IrType],
    ) -> Result<(), IrBuilderError> {
        self.claim("function", name)?;
        self.line(format_args!(
            "func {name} ({}) -> {result} locals [{}]",
            list(params),
            list(locals)
        ));
        Ok(())
    }

    fn declare_vtable(&mut self, name: &str, slots: &[String]) -> Result<(), IrBuilderError> {
        if !self.names.contains(&("struct", name.to_string())) {
            return Err(IrBuilderError::Unknown {
                kind: "struct",
                name: name.to_string(),
            });
        }
        self.require_functions(slots)?;
        self.claim("vtable", name)?;
        self.line(format_args!("vtable {name} = [{}]", slots.join(", ")));
        Ok(())
    }

    fn declare_import(
        &mut self,
        module: &str,
        name: &str,
        params: &[IrType],
        result: IrType,
    ) -> Result<(), IrBuilderError> {
        self.claim("function", name)?;
        self.line(format_args!("import {module}.{name} ({}) -> {result}", list(params)));
        Ok(())
    }

    fn declare_export(&mut self, external: &str, internal: &str) -> Result<(), IrBuilderError> {
        if !self.names.contains(&("function", internal.to_string())) {
            return Err(IrBuilderError::Unknown {
                kind: "function",
                name: internal.to_string(),
            });
        }
        self.claim("export", external)?;
        self.line(format_args!("export {external} = {internal}"));
        Ok(())
    }

    fn declare_start(&mut self, name: &str, calls: &[String]) -> Result<(), IrBuilderError> {
        self.require_functions(calls)?;
        self.claim("function", name)?;
        self.line(format_args!("start {name} calls [{}]", calls.join(", ")));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_declarations_fail() {
        let mut builder = RecordingBuilder::new();
        builder.declare_struct("main|Point", &[IrType::Ref, IrType::F64]).unwrap();
        let error = builder.declare_struct("main|Point", &[IrType::Ref]).unwrap_err();
        assert_eq!(
            error,
            IrBuilderError::Duplicate {
                kind: "struct",
                name: "main|Point".to_string()
            }
        );
    }

    #[test]
    fn test_export_needs_declared_function() {
        let mut builder = RecordingBuilder::new();
        assert!(builder.declare_export("run", "main|run").is_err());
        builder
            .declare_function("main|run", &[IrType::Ref], IrType::F64, &[])
            .unwrap();
        builder.declare_export("run", "main|run").unwrap();
        assert_eq!(
            builder.output(),
            "func main|run (ref) -> f64 locals []\nexport run = main|run\n"
        );
    }

    #[test]
    fn test_vtable_binds_declared_functions() {
        let mut builder = RecordingBuilder::new();
        let slots = vec!["main|Point|norm".to_string()];
        builder.declare_struct("main|Point|vtable", &[IrType::Ref]).unwrap();
        assert_eq!(
            builder.declare_vtable("main|Point|vtable", &slots).unwrap_err(),
            IrBuilderError::Unknown {
                kind: "function",
                name: "main|Point|norm".to_string()
            }
        );
        builder
            .declare_function("main|Point|norm", &[IrType::Ref], IrType::F64, &[])
            .unwrap();
        builder.declare_vtable("main|Point|vtable", &slots).unwrap();
        assert!(builder.declare_vtable("main|Point|vtable", &slots).is_err());
        assert!(builder.output().ends_with("vtable main|Point|vtable = [main|Point|norm]\n"));
    }
}
