//! High-level Intermediate Representation (HIR)
//!
//! The HIR is the name-resolved form of the input modules: every identifier
//! is a [`SymbolId`], every function literal is a [`FunctionDef`] linked to
//! its lexical parent, and every class has an explicit constructor. All nodes
//! of the compilation unit live in the arenas of one [`Program`].

pub mod visitor;

pub use ql_ast::{BinaryOp, InterfaceMemberKind, MethodKind, TypeExpr, UnaryOp};
pub use ql_scope::{ModuleId, ScopeId, SymbolId};

use ql_arena::{Arena, Idx};
use ql_intern::Name;
use ql_span::FileSpan;
use rustc_hash::FxHashMap;

/// HIR node IDs
pub type ExprId = Idx<Expr>;
/// Statement ID
pub type StmtId = Idx<Stmt>;
/// Function ID (declarations, expressions, arrows, methods, constructors)
pub type FunctionId = Idx<FunctionDef>;
/// Class declaration ID
pub type ClassDefId = Idx<ClassDef>;
/// Interface declaration ID
pub type InterfaceDefId = Idx<InterfaceDef>;

/// Declaration a symbol stands for, when it is not a plain variable
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum DefId {
    /// Function declaration
    Function(FunctionId),
    /// Class declaration
    Class(ClassDefId),
    /// Interface declaration
    Interface(InterfaceDefId),
}

/// The whole compilation unit after scope building
#[derive(Debug, Default)]
pub struct Program {
    /// Modules in registration order; `ModuleId` indexes this list
    pub modules: Vec<ModuleDef>,
    /// All functions
    pub functions: Arena<FunctionDef>,
    /// All classes
    pub classes: Arena<ClassDef>,
    /// All interfaces
    pub interfaces: Arena<InterfaceDef>,
    /// Expression arena
    pub exprs: Arena<Expr>,
    /// Statement arena
    pub stmts: Arena<Stmt>,
    /// Root scope holding the builtin declarations
    pub builtin_scope: Option<ScopeId>,
    /// Entry module
    pub entry: Option<ModuleId>,
    /// Modules ordered so that every module follows the modules it imports
    pub init_order: Vec<ModuleId>,
    /// Function owning each function scope
    pub scope_functions: FxHashMap<ScopeId, FunctionId>,
    /// Declaration behind function, class and interface symbols
    pub symbol_defs: FxHashMap<SymbolId, DefId>,
}

impl Program {
    /// Module data
    pub fn module(&self, id: ModuleId) -> &ModuleDef {
        &self.modules[id.index()]
    }

    /// Function owning `scope`, if `scope` is a function scope
    pub fn function_of_scope(&self, scope: ScopeId) -> Option<FunctionId> {
        self.scope_functions.get(&scope).copied()
    }

    /// Declaration behind `symbol`
    pub fn def_of(&self, symbol: SymbolId) -> Option<DefId> {
        self.symbol_defs.get(&symbol).copied()
    }

    /// Class declared by `symbol`
    pub fn class_of_symbol(&self, symbol: SymbolId) -> Option<ClassDefId> {
        match self.def_of(symbol) {
            Some(DefId::Class(class)) => Some(class),
            _ => None,
        }
    }
}

/// One source module
#[derive(Debug, Clone)]
pub struct ModuleDef {
    /// Module ID
    pub id: ModuleId,
    /// Module specifier
    pub name: String,
    /// Root scope of the module
    pub scope: ScopeId,
    /// Module-level statements, run by the module initializer
    pub body: Vec<StmtId>,
    /// Top-level function declarations
    pub functions: Vec<FunctionId>,
    /// Top-level classes
    pub classes: Vec<ClassDefId>,
    /// Top-level interfaces
    pub interfaces: Vec<InterfaceDefId>,
    /// Modules this module imports from
    pub imports: Vec<ModuleId>,
}

/// Written type annotation together with the scope it is resolved in
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Annotation as written
    pub syntax: TypeExpr,
    /// Scope used to resolve class and interface names
    pub scope: ScopeId,
}

/// What kind of function a [`FunctionDef`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function name() {}` declaration
    Declaration,
    /// `function () {}` expression
    Expression,
    /// `() => {}`
    Arrow,
    /// Method or accessor of a class
    Method {
        /// Owning class
        class: ClassDefId,
        /// Method, getter or setter
        kind: MethodKind,
        /// `static`
        is_static: bool,
    },
    /// Class constructor
    Constructor {
        /// Owning class
        class: ClassDefId,
    },
}

impl FunctionKind {
    /// Whether the function is an instance method or accessor
    #[must_use]
    pub const fn is_instance_method(self) -> bool {
        matches!(self, Self::Method { is_static: false, .. })
    }
}

/// A function of any kind
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Name; anonymous functions get a synthesized one
    pub name: Name,
    /// Symbol the declaration binds, for function declarations
    pub symbol: Option<SymbolId>,
    /// Function kind
    pub kind: FunctionKind,
    /// Defining module
    pub module: ModuleId,
    /// Function scope holding the parameters
    pub scope: ScopeId,
    /// Lexically enclosing function
    pub parent: Option<FunctionId>,
    /// Parameters
    pub params: Vec<ParamDef>,
    /// Implicit `this` parameter of methods and constructors
    pub this_param: Option<SymbolId>,
    /// Declared return type
    pub ret: Option<TypeRef>,
    /// Body statements
    pub body: Vec<StmtId>,
    /// Functions declared or written directly inside this one
    pub nested: Vec<FunctionId>,
    /// `export`
    pub exported: bool,
    /// `export default`
    pub default_export: bool,
    /// Host-provided, no body
    pub declare: bool,
    /// Source location
    pub span: FileSpan,
}

/// A function parameter
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Parameter symbol
    pub symbol: SymbolId,
    /// Type annotation
    pub ty: Option<TypeRef>,
    /// Default value, evaluated when the argument is missing
    pub default: Option<ExprId>,
    /// `...rest`
    pub rest: bool,
}

/// A class declaration
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class name
    pub name: Name,
    /// Symbol naming the class
    pub symbol: SymbolId,
    /// Defining module
    pub module: ModuleId,
    /// Class body scope
    pub scope: ScopeId,
    /// Resolved base class symbol
    pub base: Option<SymbolId>,
    /// Instance fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Static fields in declaration order
    pub statics: Vec<FieldDef>,
    /// Instance methods and accessors in declaration order
    pub methods: Vec<FunctionId>,
    /// Static methods
    pub static_methods: Vec<FunctionId>,
    /// Constructor, synthesized when the source has none
    pub constructor: FunctionId,
    /// The constructor was synthesized; a derived one forwards its
    /// arguments to the base constructor
    pub synthesized_constructor: bool,
    /// `export`
    pub exported: bool,
    /// `export default`
    pub default_export: bool,
    /// Source location
    pub span: FileSpan,
}

/// A class field
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: Name,
    /// Annotation
    pub ty: Option<TypeRef>,
    /// Initializer; instance initializers live in the constructor scope
    pub init: Option<ExprId>,
    /// `readonly`
    pub readonly: bool,
    /// Source location
    pub span: FileSpan,
}

/// An interface declaration
#[derive(Debug, Clone)]
pub struct InterfaceDef {
    /// Interface name
    pub name: Name,
    /// Symbol naming the interface
    pub symbol: SymbolId,
    /// Defining module
    pub module: ModuleId,
    /// Scope member types are resolved in
    pub scope: ScopeId,
    /// Required members
    pub members: Vec<InterfaceMemberDef>,
}

/// One required interface member
#[derive(Debug, Clone)]
pub struct InterfaceMemberDef {
    /// Member name
    pub name: Name,
    /// Shape as written
    pub kind: InterfaceMemberKind,
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Expression kind
    pub kind: ExprKind,
    /// Source location
    pub span: FileSpan,
}

/// Literal values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    /// Number
    Number(f64),
    /// Interned string
    String(Name),
    /// Boolean
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal
    Literal(Literal),
    /// Variable, parameter, function or class reference
    Var(SymbolId),
    /// `this`, bound to the enclosing method's implicit parameter
    This(SymbolId),
    /// Binary operator
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: ExprId,
        /// Right operand
        rhs: ExprId,
    },
    /// Unary operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: ExprId,
    },
    /// Plain or compound assignment
    Assign {
        /// Compound operator
        op: Option<BinaryOp>,
        /// Place
        target: ExprId,
        /// Value
        value: ExprId,
    },
    /// `++`/`--`
    Update {
        /// `++` when true
        increment: bool,
        /// Prefix form when true
        prefix: bool,
        /// Place
        target: ExprId,
    },
    /// Call
    Call {
        /// Callee expression
        callee: ExprId,
        /// Arguments
        args: Vec<ExprId>,
    },
    /// `super(args)` inside a derived constructor
    SuperCall {
        /// The constructor's `this`
        this: SymbolId,
        /// Arguments
        args: Vec<ExprId>,
    },
    /// `super.name`, only as a callee
    SuperMember {
        /// The method's `this`
        this: SymbolId,
        /// Member name
        name: Name,
    },
    /// `new Class(args)`
    New {
        /// Class symbol
        class: SymbolId,
        /// Arguments
        args: Vec<ExprId>,
    },
    /// `object.name`
    Member {
        /// Object
        object: ExprId,
        /// Property name
        name: Name,
    },
    /// `object[index]`
    Index {
        /// Object
        object: ExprId,
        /// Index
        index: ExprId,
    },
    /// Array literal
    Array(Vec<ExprId>),
    /// Object literal
    Object(Vec<(Name, ExprId)>),
    /// Function expression or arrow
    Closure(FunctionId),
    /// `cond ? then : otherwise`
    Conditional {
        /// Condition
        cond: ExprId,
        /// Truthy branch
        then: ExprId,
        /// Falsy branch
        otherwise: ExprId,
    },
    /// `expr as T`
    As {
        /// Converted expression
        expr: ExprId,
        /// Target type
        ty: TypeRef,
    },
    /// `expr instanceof Class`
    InstanceOf {
        /// Tested expression
        expr: ExprId,
        /// Class symbol
        class: SymbolId,
    },
}

/// A statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement kind
    pub kind: StmtKind,
    /// Source location
    pub span: FileSpan,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var`/`let`/`const`
    Let {
        /// Declared symbol
        symbol: SymbolId,
        /// Annotation
        ty: Option<TypeRef>,
        /// Initializer
        init: Option<ExprId>,
    },
    /// Expression statement
    Expr(ExprId),
    /// `return`
    Return(Option<ExprId>),
    /// `if`
    If {
        /// Condition
        cond: ExprId,
        /// Then branch
        then: StmtId,
        /// Else branch
        otherwise: Option<StmtId>,
    },
    /// `while`
    While {
        /// Condition
        cond: ExprId,
        /// Body
        body: StmtId,
    },
    /// `for`; the loop owns a block scope holding `init`'s bindings
    For {
        /// Scope of the loop header
        scope: ScopeId,
        /// Initializer
        init: Option<StmtId>,
        /// Condition
        cond: Option<ExprId>,
        /// Update
        update: Option<ExprId>,
        /// Body
        body: StmtId,
    },
    /// `{ ... }`
    Block {
        /// Block scope
        scope: ScopeId,
        /// Statements
        stmts: Vec<StmtId>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// Function declaration, bound when its block is entered
    Function(FunctionId),
    /// Class declaration, static fields initialized here
    Class(ClassDefId),
}
