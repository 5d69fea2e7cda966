//! Syntax tree handed over by the upstream parser
//!
//! The parser itself lives outside this workspace. It produces one [`Module`]
//! per source file, serialized with serde, and every later stage starts from
//! these nodes. Names are plain strings here; interning happens in the scope
//! builder.

pub mod build;

use ql_span::Span;
use serde::{Deserialize, Serialize};

/// One parsed source module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module specifier other modules import it by (e.g. `"lib"`)
    pub name: String,
    /// Top-level statements and declarations in source order
    pub items: Vec<Stmt>,
}

/// A statement with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// What the statement is
    pub kind: StmtKind,
    /// Where it came from
    #[serde(default)]
    pub span: Span,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `var`/`let`/`const` declaration
    Var(VarDecl),
    /// Function declaration
    Function(FunctionDecl),
    /// Class declaration
    Class(ClassDecl),
    /// Interface declaration
    Interface(InterfaceDecl),
    /// `import ... from "..."`
    Import(ImportDecl),
    /// `export { ... }` or `export default name`
    Export(ExportDecl),
    /// Expression statement
    Expr(Expr),
    /// `return [expr]`
    Return(Option<Expr>),
    /// `if (cond) then else otherwise`
    If {
        /// Condition
        cond: Expr,
        /// Taken branch
        then: Box<Stmt>,
        /// Optional else branch
        otherwise: Option<Box<Stmt>>,
    },
    /// `while (cond) body`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `for (init; cond; update) body`
    For {
        /// Initializer statement
        init: Option<Box<Stmt>>,
        /// Condition, `true` when absent
        cond: Option<Expr>,
        /// Update expression
        update: Option<Expr>,
        /// Loop body
        body: Box<Stmt>,
    },
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// A construct the parser recognised but this compiler does not accept
    Unsupported {
        /// Human readable name of the construct (e.g. `"with statement"`)
        construct: String,
    },
}

/// Declaration keyword of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    /// Function scoped, redeclarable
    Var,
    /// Block scoped, mutable
    Let,
    /// Block scoped, immutable
    Const,
}

/// `var`/`let`/`const` declaration of a single binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    /// Declaration keyword
    pub kind: VarKind,
    /// Bound name
    pub name: String,
    /// Optional type annotation
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    /// Optional initializer
    #[serde(default)]
    pub init: Option<Expr>,
    /// `export let ...`
    #[serde(default)]
    pub exported: bool,
}

/// A function declaration, expression, arrow function or method body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// Name, absent for anonymous function expressions and arrows
    #[serde(default)]
    pub name: Option<String>,
    /// Parameters in order
    pub params: Vec<Param>,
    /// Declared return type
    #[serde(default)]
    pub ret: Option<TypeExpr>,
    /// Body statements
    pub body: Vec<Stmt>,
    /// Arrow functions never bind their own `this`
    #[serde(default)]
    pub is_arrow: bool,
    /// `export function ...`
    #[serde(default)]
    pub exported: bool,
    /// `export default function ...`
    #[serde(default)]
    pub default_export: bool,
    /// `declare function ...`: signature only, implemented by the host
    #[serde(default)]
    pub declare: bool,
    /// Span of the whole function
    #[serde(default)]
    pub span: Span,
}

/// A function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Type annotation
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    /// Default value
    #[serde(default)]
    pub default: Option<Expr>,
    /// `...rest` parameter
    #[serde(default)]
    pub rest: bool,
}

/// Class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Class name
    pub name: String,
    /// `extends Base`
    #[serde(default)]
    pub base: Option<String>,
    /// Members in declaration order
    pub members: Vec<ClassMember>,
    /// `export class ...`
    #[serde(default)]
    pub exported: bool,
    /// `export default class ...`
    #[serde(default)]
    pub default_export: bool,
    /// Span of the whole declaration
    #[serde(default)]
    pub span: Span,
}

/// Kind of a method-like member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Plain method
    Method,
    /// `get name()`
    Getter,
    /// `set name(value)`
    Setter,
}

/// One member of a class body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassMember {
    /// Field declaration, instance or static
    Field {
        /// Field name
        name: String,
        /// Type annotation
        #[serde(default)]
        ty: Option<TypeExpr>,
        /// Initializer
        #[serde(default)]
        init: Option<Expr>,
        /// `static`
        #[serde(default)]
        is_static: bool,
        /// `readonly`
        #[serde(default)]
        readonly: bool,
    },
    /// Method or accessor
    Method {
        /// Plain method, getter or setter
        kind: MethodKind,
        /// `static`
        #[serde(default)]
        is_static: bool,
        /// Name and body; `function.name` holds the member name
        function: FunctionDecl,
    },
    /// `constructor(...) { ... }`
    Constructor(FunctionDecl),
}

/// Interface declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    /// Interface name
    pub name: String,
    /// Required members
    pub members: Vec<InterfaceMember>,
    /// `export interface ...`
    #[serde(default)]
    pub exported: bool,
}

/// One required member of an interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMember {
    /// Member name
    pub name: String,
    /// Shape of the member
    pub kind: InterfaceMemberKind,
}

/// Shape of an interface member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterfaceMemberKind {
    /// `name: T`
    Field(TypeExpr),
    /// `name(params): R`
    Method {
        /// Parameter types
        params: Vec<TypeExpr>,
        /// Return type
        ret: TypeExpr,
    },
    /// `get name(): T`
    Getter(TypeExpr),
    /// `set name(value: T)`
    Setter(TypeExpr),
}

/// `import ... from "module"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// Module specifier
    pub from: String,
    /// Imported bindings
    pub specifiers: Vec<ImportSpecifier>,
}

/// One binding introduced by an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportSpecifier {
    /// `import { imported as local }`
    Named {
        /// Name exported by the other module
        imported: String,
        /// Local name
        local: String,
    },
    /// `import local from "m"`
    Default {
        /// Local name
        local: String,
    },
    /// `import * as local from "m"`
    Namespace {
        /// Local name
        local: String,
    },
}

/// Export statements that are not declaration modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportDecl {
    /// `export { local as exported, ... } [from "m"]`
    Named {
        /// `(local, exported)` pairs
        specifiers: Vec<(String, String)>,
        /// Re-export source module
        #[serde(default)]
        from: Option<String>,
    },
    /// `export default name`
    Default(String),
}

/// Written type annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Primitive keyword, class or interface name
    Named(String),
    /// `T[]`
    Array(Box<TypeExpr>),
    /// `(a: A, ...rest: R[]) => Ret`
    Function {
        /// Parameter types
        params: Vec<TypeExpr>,
        /// Return type
        ret: Box<TypeExpr>,
        /// Last parameter is a rest parameter
        #[serde(default)]
        variadic: bool,
    },
}

/// An expression with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// What the expression is
    pub kind: ExprKind,
    /// Where it came from
    #[serde(default)]
    pub span: Span,
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// `true`/`false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Identifier reference
    Ident(String),
    /// `this`
    This,
    /// `super`, only valid as a callee or member object
    Super,
    /// Binary operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Unary operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `target = value` or compound `target op= value`
    Assign {
        /// Compound operator, `None` for plain `=`
        #[serde(default)]
        op: Option<BinaryOp>,
        /// Assigned place
        target: Box<Expr>,
        /// Assigned value
        value: Box<Expr>,
    },
    /// `++x`, `x--`, ...
    Update {
        /// `true` for `++`
        increment: bool,
        /// `true` for prefix form
        prefix: bool,
        /// Updated place
        target: Box<Expr>,
    },
    /// Call expression
    Call {
        /// Callee
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `new Class(args)`
    New {
        /// Class name
        class: String,
        /// Constructor arguments
        args: Vec<Expr>,
    },
    /// `object.property`
    Member {
        /// Object expression
        object: Box<Expr>,
        /// Property name
        property: String,
    },
    /// `object[index]`
    Index {
        /// Indexed expression
        object: Box<Expr>,
        /// Index expression
        index: Box<Expr>,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>),
    /// `{ key: value, ... }`
    Object(Vec<(String, Expr)>),
    /// Function expression or arrow function
    Function(Box<FunctionDecl>),
    /// `cond ? then : otherwise`
    Conditional {
        /// Condition
        cond: Box<Expr>,
        /// Value when truthy
        then: Box<Expr>,
        /// Value when falsy
        otherwise: Box<Expr>,
    },
    /// `expr as T`
    As {
        /// Converted expression
        expr: Box<Expr>,
        /// Target type
        ty: TypeExpr,
    },
    /// `expr instanceof Class`
    InstanceOf {
        /// Tested expression
        expr: Box<Expr>,
        /// Class name
        class: String,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `===` (and `==`)
    Eq,
    /// `!==` (and `!=`)
    Ne,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Operators producing a boolean from two operands of any type
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Gt | Self::Le | Self::Ge | Self::Eq | Self::Ne
        )
    }

    /// `&&` and `||`
    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Source spelling, used in diagnostics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "===",
            Self::Ne => "!==",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `typeof x`
    TypeOf,
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn test_module_deserializes_from_json() {
        let json = r#"{
            "name": "main",
            "items": [
                { "kind": { "Var": { "kind": "Let", "name": "x", "init": { "kind": { "Number": 1.0 } } } } },
                { "kind": { "Return": null } }
            ]
        }"#;
        let module: Module = serde_json::from_str(json).unwrap();

        assert_eq!(module.name, "main");
        assert_eq!(module.items.len(), 2);
        assert_eq!(module.items[0], let_("x", None, Some(num(1.0))));
    }

    #[test]
    fn test_binary_op_classification() {
        assert!(BinaryOp::Le.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
        assert!(BinaryOp::Or.is_logical());
        assert_eq!(BinaryOp::Ne.as_str(), "!==");
    }
}
