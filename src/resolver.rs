//! Static resolution pass.
//!
//! A single walk over the statement tree that:
//! 1. **Builds lexical scopes**: a stack of `HashMap<String, bool>` tracking
//!    declared (false) and fully defined (true) names per block or function.
//! 2. **Enforces static rules**: duplicate declarations, reading a variable
//!    in its own initializer, `return` outside a function, a value returned
//!    from an initializer, `this`/`super` outside their class contexts, and
//!    a class extending itself.
//! 3. **Records binding distances**: every `Variable`, `Assign`, `This` and
//!    `Super` occurrence is either noted in the interpreter's side-table at
//!    its lexical depth, or left out, meaning global.  The runtime then
//!    climbs exactly that many environment frames.
//!
//! Errors go to the reporting sink and the walk continues, so one pass
//! surfaces every static error in the program.

use std::collections::HashMap;
use std::io::Write;

use log::{debug, info};

use crate::expr::Expr;
use crate::interpreter::Interpreter;
use crate::reporting;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// What kind of function body the walk is currently inside.  Validates
/// `return` placement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp, W: Write> {
    interpreter: &'interp mut Interpreter<W>,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'interp, W: Write> Resolver<'interp, W> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter<W>) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare(name);
                self.define(name);

                if let Some(Expr::Variable {
                    name: super_name, ..
                }) = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        reporting::error(super_name.line, "A class can't inherit from itself.");
                    }
                }

                let enclosing_class = self.current_class;
                self.current_class = if superclass.is_some() {
                    ClassType::Subclass
                } else {
                    ClassType::Class
                };

                // methods of a subclass resolve 'super' in a dedicated scope
                // surrounding all of them
                if let Some(superclass) = superclass {
                    self.resolve_expr(superclass);

                    self.begin_scope();
                    self.scopes
                        .last_mut()
                        .expect("scope just pushed")
                        .insert("super".to_string(), true);
                }

                // the implicit 'this' scope for method bodies
                self.begin_scope();
                self.scopes
                    .last_mut()
                    .expect("scope just pushed")
                    .insert("this".to_string(), true);

                for method in methods {
                    let kind = if method.name.lexeme == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(method, kind);
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }

            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declaring before resolving the initializer is what makes
                // `let a = a;` an error instead of a silent outer-scope read
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(declaration) => {
                // declared and defined eagerly so the body can recurse
                self.declare(&declaration.name);
                self.define(&declaration.name);

                self.resolve_function(declaration, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    reporting::error(keyword.line, "'return' used outside of function");
                }

                if let Some(expr) = value {
                    // bare `return;` in an initializer is fine (it yields
                    // 'this'); returning a value is not
                    if self.current_function == FunctionType::Initializer {
                        reporting::error(
                            keyword.line,
                            "Can't return a value from an initializer.",
                        );
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { name, id } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        reporting::error(
                            name.line,
                            &format!(
                                "Can't read local variable '{}' in its own initializer",
                                name.lexeme
                            ),
                        );
                    }
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { name, value, id } => {
                // the value may itself reference variables; resolve it first
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    reporting::error(keyword.line, "Cannot use 'this' outside of a class");
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Get { object, .. } => {
                // properties are looked up dynamically; only the object
                // expression is resolved
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::Super { keyword, id, .. } => {
                if self.current_class == ClassType::None {
                    reporting::error(keyword.line, "Cannot use 'super' outside of a class.");
                } else if self.current_class == ClassType::Class {
                    reporting::error(
                        keyword.line,
                        "Cannot use 'super' in a class with no superclass.",
                    );
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` distinguishes plain functions, methods and initializers.
    fn resolve_function(&mut self, declaration: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();

        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }

        for stmt in &declaration.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                reporting::error(name.line, "Variable already declared in this scope");
            }

            // declared but not yet defined
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as a local at its depth.  A name not
    /// found in any scope is assumed global and gets no entry.
    fn resolve_local(&mut self, id: usize, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.resolve(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
