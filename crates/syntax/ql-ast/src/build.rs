//! Constructors for building syntax trees by hand
//!
//! Tests and the builtin declarations use these instead of a parser. Every
//! node gets [`Span::DUMMY`].

use crate::{
    BinaryOp, ClassDecl, ClassMember, ExportDecl, Expr, ExprKind, FunctionDecl, ImportDecl,
    ImportSpecifier, InterfaceDecl, InterfaceMember, InterfaceMemberKind, MethodKind, Module,
    Param, Stmt, StmtKind, TypeExpr, UnaryOp, VarDecl, VarKind,
};
use ql_span::Span;

fn expr(kind: ExprKind) -> Expr {
    Expr {
        kind,
        span: Span::DUMMY,
    }
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::DUMMY,
    }
}

/// Module with the given items
#[must_use]
pub fn module(name: &str, items: Vec<Stmt>) -> Module {
    Module {
        name: name.to_string(),
        items,
    }
}

// Types

/// `name` as a type annotation
#[must_use]
pub fn ty(name: &str) -> TypeExpr {
    TypeExpr::Named(name.to_string())
}

/// `element[]`
#[must_use]
pub fn array_ty(element: TypeExpr) -> TypeExpr {
    TypeExpr::Array(Box::new(element))
}

/// `(params) => ret`
#[must_use]
pub fn fn_ty(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
    TypeExpr::Function {
        params,
        ret: Box::new(ret),
        variadic: false,
    }
}

// Expressions

/// Numeric literal
#[must_use]
pub fn num(value: f64) -> Expr {
    expr(ExprKind::Number(value))
}

/// String literal
#[must_use]
pub fn string(value: &str) -> Expr {
    expr(ExprKind::String(value.to_string()))
}

/// Boolean literal
#[must_use]
pub fn boolean(value: bool) -> Expr {
    expr(ExprKind::Bool(value))
}

/// `null`
#[must_use]
pub fn null() -> Expr {
    expr(ExprKind::Null)
}

/// `undefined`
#[must_use]
pub fn undefined() -> Expr {
    expr(ExprKind::Undefined)
}

/// Identifier reference
#[must_use]
pub fn ident(name: &str) -> Expr {
    expr(ExprKind::Ident(name.to_string()))
}

/// `this`
#[must_use]
pub fn this() -> Expr {
    expr(ExprKind::This)
}

/// `super`
#[must_use]
pub fn super_() -> Expr {
    expr(ExprKind::Super)
}

/// `lhs op rhs`
#[must_use]
pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

/// `lhs + rhs`
#[must_use]
pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinaryOp::Add, lhs, rhs)
}

/// `op operand`
#[must_use]
pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

/// `typeof operand`
#[must_use]
pub fn type_of(operand: Expr) -> Expr {
    unary(UnaryOp::TypeOf, operand)
}

/// `target = value`
#[must_use]
pub fn assign(target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        op: None,
        target: Box::new(target),
        value: Box::new(value),
    })
}

/// `target op= value`
#[must_use]
pub fn compound_assign(op: BinaryOp, target: Expr, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        op: Some(op),
        target: Box::new(target),
        value: Box::new(value),
    })
}

/// `target++` (postfix) or `++target` (prefix)
#[must_use]
pub fn increment(target: Expr, prefix: bool) -> Expr {
    expr(ExprKind::Update {
        increment: true,
        prefix,
        target: Box::new(target),
    })
}

/// `target--` (postfix) or `--target` (prefix)
#[must_use]
pub fn decrement(target: Expr, prefix: bool) -> Expr {
    expr(ExprKind::Update {
        increment: false,
        prefix,
        target: Box::new(target),
    })
}

/// `callee(args)`
#[must_use]
pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(callee),
        args,
    })
}

/// `object.method(args)`
#[must_use]
pub fn method_call(object: Expr, method: &str, args: Vec<Expr>) -> Expr {
    call(member(object, method), args)
}

/// `object.property`
#[must_use]
pub fn member(object: Expr, property: &str) -> Expr {
    expr(ExprKind::Member {
        object: Box::new(object),
        property: property.to_string(),
    })
}

/// `object[index]`
#[must_use]
pub fn index(object: Expr, index: Expr) -> Expr {
    expr(ExprKind::Index {
        object: Box::new(object),
        index: Box::new(index),
    })
}

/// `new class(args)`
#[must_use]
pub fn new(class: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::New {
        class: class.to_string(),
        args,
    })
}

/// `[elements]`
#[must_use]
pub fn array(elements: Vec<Expr>) -> Expr {
    expr(ExprKind::Array(elements))
}

/// `{ key: value, ... }`
#[must_use]
pub fn object(fields: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::Object(
        fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    ))
}

/// Function expression
#[must_use]
pub fn closure(function: FunctionDecl) -> Expr {
    expr(ExprKind::Function(Box::new(function)))
}

/// `(params) => { body }`
#[must_use]
pub fn arrow(params: Vec<Param>, body: Vec<Stmt>) -> Expr {
    let mut function = FunctionDecl::new(None, params, None, body);
    function.is_arrow = true;
    closure(function)
}

/// `cond ? then : otherwise`
#[must_use]
pub fn conditional(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    expr(ExprKind::Conditional {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

/// `value as ty`
#[must_use]
pub fn cast(value: Expr, target: TypeExpr) -> Expr {
    expr(ExprKind::As {
        expr: Box::new(value),
        ty: target,
    })
}

/// `value instanceof class`
#[must_use]
pub fn instance_of(value: Expr, class: &str) -> Expr {
    expr(ExprKind::InstanceOf {
        expr: Box::new(value),
        class: class.to_string(),
    })
}

// Statements

fn var_decl(kind: VarKind, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
    stmt(StmtKind::Var(VarDecl {
        kind,
        name: name.to_string(),
        ty,
        init,
        exported: false,
    }))
}

/// `let name: ty = init`
#[must_use]
pub fn let_(name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
    var_decl(VarKind::Let, name, ty, init)
}

/// `const name: ty = init`
#[must_use]
pub fn const_(name: &str, ty: Option<TypeExpr>, init: Expr) -> Stmt {
    var_decl(VarKind::Const, name, ty, Some(init))
}

/// `var name: ty = init`
#[must_use]
pub fn var(name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
    var_decl(VarKind::Var, name, ty, init)
}

/// `export let name: ty = init`
#[must_use]
pub fn export_let(name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Stmt {
    stmt(StmtKind::Var(VarDecl {
        kind: VarKind::Let,
        name: name.to_string(),
        ty,
        init,
        exported: true,
    }))
}

/// Expression statement
#[must_use]
pub fn expr_stmt(value: Expr) -> Stmt {
    stmt(StmtKind::Expr(value))
}

/// `return value`
#[must_use]
pub fn return_(value: Expr) -> Stmt {
    stmt(StmtKind::Return(Some(value)))
}

/// `return`
#[must_use]
pub fn return_void() -> Stmt {
    stmt(StmtKind::Return(None))
}

/// `if (cond) then else otherwise`
#[must_use]
pub fn if_(cond: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>>) -> Stmt {
    stmt(StmtKind::If {
        cond,
        then: Box::new(block(then)),
        otherwise: otherwise.map(|stmts| Box::new(block(stmts))),
    })
}

/// `while (cond) { body }`
#[must_use]
pub fn while_(cond: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::While {
        cond,
        body: Box::new(block(body)),
    })
}

/// `for (init; cond; update) { body }`
#[must_use]
pub fn for_(init: Option<Stmt>, cond: Option<Expr>, update: Option<Expr>, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::For {
        init: init.map(Box::new),
        cond,
        update,
        body: Box::new(block(body)),
    })
}

/// `{ stmts }`
#[must_use]
pub fn block(stmts: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Block(stmts))
}

/// `break`
#[must_use]
pub fn break_() -> Stmt {
    stmt(StmtKind::Break)
}

/// `continue`
#[must_use]
pub fn continue_() -> Stmt {
    stmt(StmtKind::Continue)
}

/// A construct rejected at the parser boundary
#[must_use]
pub fn unsupported(construct: &str) -> Stmt {
    stmt(StmtKind::Unsupported {
        construct: construct.to_string(),
    })
}

/// Function parameter with an optional annotation
#[must_use]
pub fn param(name: &str, ty: Option<TypeExpr>) -> Param {
    Param {
        name: name.to_string(),
        ty,
        default: None,
        rest: false,
    }
}

/// `...name: ty`
#[must_use]
pub fn rest_param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: name.to_string(),
        ty: Some(ty),
        default: None,
        rest: true,
    }
}

/// Named function declaration
#[must_use]
pub fn function(name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl::new(Some(name.to_string()), params, ret, body)
}

/// Wraps a function declaration as a statement
#[must_use]
pub fn function_stmt(function: FunctionDecl) -> Stmt {
    stmt(StmtKind::Function(function))
}

/// Wraps a class declaration as a statement
#[must_use]
pub fn class_stmt(class: ClassDecl) -> Stmt {
    stmt(StmtKind::Class(class))
}

/// Wraps an interface declaration as a statement
#[must_use]
pub fn interface_stmt(interface: InterfaceDecl) -> Stmt {
    stmt(StmtKind::Interface(interface))
}

/// `import { imported as local, ... } from "from"`
#[must_use]
pub fn import_named(from: &str, names: &[(&str, &str)]) -> Stmt {
    let specifiers = names
        .iter()
        .map(|(imported, local)| ImportSpecifier::Named {
            imported: (*imported).to_string(),
            local: (*local).to_string(),
        })
        .collect();
    stmt(StmtKind::Import(ImportDecl {
        from: from.to_string(),
        specifiers,
    }))
}

/// `import local from "from"`
#[must_use]
pub fn import_default(from: &str, local: &str) -> Stmt {
    stmt(StmtKind::Import(ImportDecl {
        from: from.to_string(),
        specifiers: vec![ImportSpecifier::Default {
            local: local.to_string(),
        }],
    }))
}

/// `import * as local from "from"`
#[must_use]
pub fn import_namespace(from: &str, local: &str) -> Stmt {
    stmt(StmtKind::Import(ImportDecl {
        from: from.to_string(),
        specifiers: vec![ImportSpecifier::Namespace {
            local: local.to_string(),
        }],
    }))
}

/// `export { local as exported, ... } [from "m"]`
#[must_use]
pub fn export_named(names: &[(&str, &str)], from: Option<&str>) -> Stmt {
    stmt(StmtKind::Export(ExportDecl::Named {
        specifiers: names
            .iter()
            .map(|(local, exported)| ((*local).to_string(), (*exported).to_string()))
            .collect(),
        from: from.map(str::to_string),
    }))
}

/// `export default name`
#[must_use]
pub fn export_default(name: &str) -> Stmt {
    stmt(StmtKind::Export(ExportDecl::Default(name.to_string())))
}

impl FunctionDecl {
    /// Function with the given signature and body and no modifiers
    #[must_use]
    pub fn new(name: Option<String>, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Self {
        Self {
            name,
            params,
            ret,
            body,
            is_arrow: false,
            exported: false,
            default_export: false,
            declare: false,
            span: Span::DUMMY,
        }
    }

    /// Marks the function `export`
    #[must_use]
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    /// Marks the function `export default`
    #[must_use]
    pub fn default_export(mut self) -> Self {
        self.default_export = true;
        self
    }

    /// Marks the function as a host-provided `declare function`
    #[must_use]
    pub fn declared(mut self) -> Self {
        self.declare = true;
        self
    }
}

/// Empty class declaration
#[must_use]
pub fn class(name: &str) -> ClassDecl {
    ClassDecl {
        name: name.to_string(),
        base: None,
        members: Vec::new(),
        exported: false,
        default_export: false,
        span: Span::DUMMY,
    }
}

impl ClassDecl {
    /// `extends base`
    #[must_use]
    pub fn extends(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    /// Instance field
    #[must_use]
    pub fn field(mut self, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Self {
        self.members.push(ClassMember::Field {
            name: name.to_string(),
            ty,
            init,
            is_static: false,
            readonly: false,
        });
        self
    }

    /// Static field
    #[must_use]
    pub fn static_field(mut self, name: &str, ty: Option<TypeExpr>, init: Option<Expr>) -> Self {
        self.members.push(ClassMember::Field {
            name: name.to_string(),
            ty,
            init,
            is_static: true,
            readonly: false,
        });
        self
    }

    /// Instance method
    #[must_use]
    pub fn method(self, name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Self {
        self.member_fn(MethodKind::Method, false, name, params, ret, body)
    }

    /// Static method
    #[must_use]
    pub fn static_method(self, name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Self {
        self.member_fn(MethodKind::Method, true, name, params, ret, body)
    }

    /// `get name(): ret { body }`
    #[must_use]
    pub fn getter(self, name: &str, ret: TypeExpr, body: Vec<Stmt>) -> Self {
        self.member_fn(MethodKind::Getter, false, name, Vec::new(), Some(ret), body)
    }

    /// `set name(value: ty) { body }`
    #[must_use]
    pub fn setter(self, name: &str, value: Param, body: Vec<Stmt>) -> Self {
        self.member_fn(MethodKind::Setter, false, name, vec![value], None, body)
    }

    /// `constructor(params) { body }`
    #[must_use]
    pub fn constructor(mut self, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        self.members.push(ClassMember::Constructor(FunctionDecl::new(
            Some("constructor".to_string()),
            params,
            None,
            body,
        )));
        self
    }

    /// Marks the class `export`
    #[must_use]
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    fn member_fn(
        mut self,
        kind: MethodKind,
        is_static: bool,
        name: &str,
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        body: Vec<Stmt>,
    ) -> Self {
        self.members.push(ClassMember::Method {
            kind,
            is_static,
            function: function(name, params, ret, body),
        });
        self
    }
}

/// Empty interface declaration
#[must_use]
pub fn interface(name: &str) -> InterfaceDecl {
    InterfaceDecl {
        name: name.to_string(),
        members: Vec::new(),
        exported: false,
    }
}

impl InterfaceDecl {
    /// `name: ty`
    #[must_use]
    pub fn field(mut self, name: &str, ty: TypeExpr) -> Self {
        self.push(name, InterfaceMemberKind::Field(ty));
        self
    }

    /// `name(params): ret`
    #[must_use]
    pub fn method(mut self, name: &str, params: Vec<TypeExpr>, ret: TypeExpr) -> Self {
        self.push(name, InterfaceMemberKind::Method { params, ret });
        self
    }

    /// `get name(): ty`
    #[must_use]
    pub fn getter(mut self, name: &str, ty: TypeExpr) -> Self {
        self.push(name, InterfaceMemberKind::Getter(ty));
        self
    }

    /// `set name(value: ty)`
    #[must_use]
    pub fn setter(mut self, name: &str, ty: TypeExpr) -> Self {
        self.push(name, InterfaceMemberKind::Setter(ty));
        self
    }

    /// Marks the interface `export`
    #[must_use]
    pub fn exported(mut self) -> Self {
        self.exported = true;
        self
    }

    fn push(&mut self, name: &str, kind: InterfaceMemberKind) {
        self.members.push(InterfaceMember {
            name: name.to_string(),
            kind,
        });
    }
}
