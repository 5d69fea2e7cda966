//! Builtin surface: `console`, `Math`, `Array`, `Number` and the intrinsic
//! members of strings and arrays
//!
//! The table is built once per process and only read afterwards. Every
//! compilation registers each namespace as an interface type and gives the
//! matching global symbol that type.

use std::sync::LazyLock;

/// Parameter or result shape of a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTy {
    /// `number`
    Number,
    /// `string`
    String,
    /// `boolean`
    Boolean,
    /// `any`
    Any,
    /// `void`
    Void,
}

/// Builtin operation, resolved at call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFn {
    /// `console.log(...values)`
    ConsoleLog,
    /// `Math.sqrt(x)`
    MathSqrt,
    /// `Math.abs(x)`
    MathAbs,
    /// `Math.floor(x)`
    MathFloor,
    /// `Math.ceil(x)`
    MathCeil,
    /// `Math.max(...values)`
    MathMax,
    /// `Math.min(...values)`
    MathMin,
    /// `Math.pow(base, exponent)`
    MathPow,
    /// `Array.isArray(value)`
    ArrayIsArray,
    /// `Number.isInteger(value)`
    NumberIsInteger,
    /// `array.push(...items)`, returns the new length
    ArrayPush,
    /// `array.pop()`, `undefined` when empty
    ArrayPop,
}

/// One method of a builtin namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinMethod {
    /// Member name
    pub name: &'static str,
    /// Operation
    pub function: BuiltinFn,
    /// Fixed parameters
    pub params: &'static [BuiltinTy],
    /// Element type of the rest parameter
    pub rest: Option<BuiltinTy>,
    /// Result
    pub ret: BuiltinTy,
}

/// A global namespace object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinNamespace {
    /// Global name
    pub name: &'static str,
    /// Methods in declaration order
    pub methods: Vec<BuiltinMethod>,
}

impl BuiltinNamespace {
    /// Method named `name`
    pub fn method(&self, name: &str) -> Option<&BuiltinMethod> {
        self.methods.iter().find(|method| method.name == name)
    }
}

/// The builtin registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinTable {
    /// Namespaces in registration order
    pub namespaces: Vec<BuiltinNamespace>,
}

/// Process-wide builtin table
pub static BUILTINS: LazyLock<BuiltinTable> = LazyLock::new(BuiltinTable::standard);

const fn method(
    name: &'static str,
    function: BuiltinFn,
    params: &'static [BuiltinTy],
    rest: Option<BuiltinTy>,
    ret: BuiltinTy,
) -> BuiltinMethod {
    BuiltinMethod {
        name,
        function,
        params,
        rest,
        ret,
    }
}

impl BuiltinTable {
    /// The standard library surface
    #[must_use]
    pub fn standard() -> Self {
        use BuiltinTy::{Any, Boolean, Number, Void};

        let math_unary = |name, function| method(name, function, &[Number], None, Number);
        Self {
            namespaces: vec![
                BuiltinNamespace {
                    name: "console",
                    methods: vec![method("log", BuiltinFn::ConsoleLog, &[], Some(Any), Void)],
                },
                BuiltinNamespace {
                    name: "Math",
                    methods: vec![
                        math_unary("sqrt", BuiltinFn::MathSqrt),
                        math_unary("abs", BuiltinFn::MathAbs),
                        math_unary("floor", BuiltinFn::MathFloor),
                        math_unary("ceil", BuiltinFn::MathCeil),
                        method("max", BuiltinFn::MathMax, &[], Some(Number), Number),
                        method("min", BuiltinFn::MathMin, &[], Some(Number), Number),
                        method("pow", BuiltinFn::MathPow, &[Number, Number], None, Number),
                    ],
                },
                BuiltinNamespace {
                    name: "Array",
                    methods: vec![method("isArray", BuiltinFn::ArrayIsArray, &[Any], None, Boolean)],
                },
                BuiltinNamespace {
                    name: "Number",
                    methods: vec![method("isInteger", BuiltinFn::NumberIsInteger, &[Any], None, Boolean)],
                },
            ],
        }
    }

    /// Global names the scope builder declares
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .map(|namespace| namespace.name.to_string())
            .collect()
    }

    /// Namespace method implemented by `function`
    pub fn method_of(&self, function: BuiltinFn) -> Option<&BuiltinMethod> {
        self.namespaces
            .iter()
            .flat_map(|namespace| &namespace.methods)
            .find(|method| method.function == function)
    }

    /// Namespace with the given global name
    pub fn namespace(&self, name: &str) -> Option<(usize, &BuiltinNamespace)> {
        self.namespaces
            .iter()
            .enumerate()
            .find(|(_, namespace)| namespace.name == name)
    }
}

impl BuiltinFn {
    /// Name of the runtime function implementing the builtin
    #[must_use]
    pub const fn import_name(self) -> &'static str {
        match self {
            Self::ConsoleLog => "console|log",
            Self::MathSqrt => "Math|sqrt",
            Self::MathAbs => "Math|abs",
            Self::MathFloor => "Math|floor",
            Self::MathCeil => "Math|ceil",
            Self::MathMax => "Math|max",
            Self::MathMin => "Math|min",
            Self::MathPow => "Math|pow",
            Self::ArrayIsArray => "Array|isArray",
            Self::NumberIsInteger => "Number|isInteger",
            Self::ArrayPush => "Array|push",
            Self::ArrayPop => "Array|pop",
        }
    }

    /// Evaluate a numeric builtin
    ///
    /// Returns `None` for builtins that do not operate on numbers alone.
    #[must_use]
    pub fn apply_numeric(self, args: &[f64]) -> Option<f64> {
        let first = args.first().copied().unwrap_or(f64::NAN);
        Some(match self {
            Self::MathSqrt => first.sqrt(),
            Self::MathAbs => first.abs(),
            Self::MathFloor => first.floor(),
            Self::MathCeil => first.ceil(),
            Self::MathPow => first.powf(args.get(1).copied().unwrap_or(f64::NAN)),
            Self::MathMax => args.iter().copied().fold(f64::NEG_INFINITY, |acc, value| {
                if acc.is_nan() || value.is_nan() { f64::NAN } else { acc.max(value) }
            }),
            Self::MathMin => args.iter().copied().fold(f64::INFINITY, |acc, value| {
                if acc.is_nan() || value.is_nan() { f64::NAN } else { acc.min(value) }
            }),
            Self::ConsoleLog
            | Self::ArrayIsArray
            | Self::NumberIsInteger
            | Self::ArrayPush
            | Self::ArrayPop => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_shared() {
        assert_eq!(BUILTINS.namespace_names(), ["console", "Math", "Array", "Number"]);
        let (_, math) = BUILTINS.namespace("Math").unwrap();
        assert_eq!(math.method("pow").unwrap().params.len(), 2);
        assert!(BUILTINS.namespace("JSON").is_none());
    }

    #[test]
    fn test_numeric_builtins() {
        assert_eq!(BuiltinFn::MathSqrt.apply_numeric(&[16.0]), Some(4.0));
        assert_eq!(BuiltinFn::MathMax.apply_numeric(&[1.0, 7.0, 3.0]), Some(7.0));
        assert_eq!(BuiltinFn::MathMin.apply_numeric(&[]), Some(f64::INFINITY));
        assert_eq!(BuiltinFn::MathPow.apply_numeric(&[2.0, 10.0]), Some(1024.0));
        assert!(BuiltinFn::MathMax.apply_numeric(&[1.0, f64::NAN]).unwrap().is_nan());
        assert_eq!(BuiltinFn::ConsoleLog.apply_numeric(&[1.0]), None);
    }
}
