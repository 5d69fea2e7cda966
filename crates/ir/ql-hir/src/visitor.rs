//! HIR visitor infrastructure for traversing HIR nodes
//!
//! Walking never descends into nested functions on its own: it reports them
//! through [`Visitor::visit_function`] and leaves the decision to the caller.

use crate::{ExprId, ExprKind, FunctionId, FunctionKind, Program, StmtId, StmtKind};

/// Visitor over expressions and statements of one function body
pub trait Visitor {
    /// Visit an expression; the default recurses into its children
    fn visit_expr(&mut self, program: &Program, expr: ExprId) {
        walk_expr(self, program, expr);
    }

    /// Visit a statement; the default recurses into its children
    fn visit_stmt(&mut self, program: &Program, stmt: StmtId) {
        walk_stmt(self, program, stmt);
    }

    /// Called for every function literal, declaration, method and
    /// constructor nested directly in the walked code
    fn visit_function(&mut self, _program: &Program, _function: FunctionId) {}
}

/// Visit parameter defaults and body statements of `function`
pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, program: &Program, function: FunctionId) {
    let def = &program.functions[function];
    for param in &def.params {
        if let Some(default) = param.default {
            visitor.visit_expr(program, default);
        }
    }
    if let FunctionKind::Constructor { class } = def.kind {
        for field in &program.classes[class].fields {
            if let Some(init) = field.init {
                visitor.visit_expr(program, init);
            }
        }
    }
    for stmt in &def.body {
        visitor.visit_stmt(program, *stmt);
    }
}

/// Visit the children of `expr`
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, program: &Program, expr: ExprId) {
    match &program.exprs[expr].kind {
        ExprKind::Literal(_)
        | ExprKind::Var(_)
        | ExprKind::This(_)
        | ExprKind::SuperMember { .. } => {}
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(program, *lhs);
            visitor.visit_expr(program, *rhs);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(program, *operand),
        ExprKind::Assign { target, value, .. } => {
            visitor.visit_expr(program, *target);
            visitor.visit_expr(program, *value);
        }
        ExprKind::Update { target, .. } => visitor.visit_expr(program, *target),
        ExprKind::Call { callee, args } => {
            visitor.visit_expr(program, *callee);
            for arg in args {
                visitor.visit_expr(program, *arg);
            }
        }
        ExprKind::SuperCall { args, .. } | ExprKind::New { args, .. } | ExprKind::Array(args) => {
            for arg in args {
                visitor.visit_expr(program, *arg);
            }
        }
        ExprKind::Member { object, .. } => visitor.visit_expr(program, *object),
        ExprKind::Index { object, index } => {
            visitor.visit_expr(program, *object);
            visitor.visit_expr(program, *index);
        }
        ExprKind::Object(fields) => {
            for (_, value) in fields {
                visitor.visit_expr(program, *value);
            }
        }
        ExprKind::Closure(function) => visitor.visit_function(program, *function),
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            visitor.visit_expr(program, *cond);
            visitor.visit_expr(program, *then);
            visitor.visit_expr(program, *otherwise);
        }
        ExprKind::As { expr: inner, .. } | ExprKind::InstanceOf { expr: inner, .. } => {
            visitor.visit_expr(program, *inner);
        }
    }
}

/// Visit the children of `stmt`
pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, program: &Program, stmt: StmtId) {
    match &program.stmts[stmt].kind {
        StmtKind::Let { init, .. } => {
            if let Some(init) = init {
                visitor.visit_expr(program, *init);
            }
        }
        StmtKind::Expr(expr) => visitor.visit_expr(program, *expr),
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(program, *value);
            }
        }
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            visitor.visit_expr(program, *cond);
            visitor.visit_stmt(program, *then);
            if let Some(otherwise) = otherwise {
                visitor.visit_stmt(program, *otherwise);
            }
        }
        StmtKind::While { cond, body } => {
            visitor.visit_expr(program, *cond);
            visitor.visit_stmt(program, *body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(program, *init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(program, *cond);
            }
            if let Some(update) = update {
                visitor.visit_expr(program, *update);
            }
            visitor.visit_stmt(program, *body);
        }
        StmtKind::Block { stmts, .. } => {
            for inner in stmts {
                visitor.visit_stmt(program, *inner);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Function(function) => visitor.visit_function(program, *function),
        StmtKind::Class(class) => {
            let class = &program.classes[*class];
            for field in &class.statics {
                if let Some(init) = field.init {
                    visitor.visit_expr(program, init);
                }
            }
            visitor.visit_function(program, class.constructor);
            for method in class.methods.iter().chain(&class.static_methods) {
                visitor.visit_function(program, *method);
            }
        }
    }
}
