//! Static resolution pass for the Silt interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of per-scope maps tracking
//!    each name's state (declared, defined, used) in every nested block,
//!    function, or class body.
//! 2. **Enforce static rules**: reports redeclaration in the same scope,
//!    reading a variable in its own initializer, unused locals, invalid
//!    `return`/`break`/`continue` placement, illegal `this`/`super` use, and
//!    the `super(...)` initializer-chaining protocol.
//! 3. **Record binding distances**: for every variable occurrence
//!    (`Variable`, `Assign`, `This`, `Super`, `SuperCall`), calls back into
//!    the interpreter to note whether it is a local (and at what depth) or a
//!    global.  This lets the runtime climb exactly the right number of
//!    environment frames instead of searching the chain by name.
//!
//! # Workflow Overview
//!
//! 1. **Instantiation** (`Resolver::new`)
//!    - Captures a mutable reference to the `Interpreter`, where binding
//!      distances will be recorded.
//!    - Initializes the empty scope stack and the function/class/loop
//!      context flags.
//!
//! 2. **Resolution Entry Point** (`resolve(&[Stmt])`)
//!    - Walks each top-level statement via `resolve_stmt`.
//!    - Accumulates every static error it finds rather than stopping at the
//!      first, so one pass surfaces as much as possible; the driver refuses
//!      to execute a program that produced any.
//!
//! 3. **Statement Resolution** (`resolve_stmt`)
//!    - Declares and defines names for `var`, `fun`, and `class`
//!      declarations.
//!    - Opens nested scopes for blocks and function bodies; injects `this`
//!      (and `super`, for derived classes) in class scopes.
//!    - Tracks loop context for `break`/`continue` and function context for
//!      `return` and the `super(...)` rules.
//!
//! 4. **Expression Resolution** (`resolve_expr`)
//!    - Recursively descends into expression nodes; variable reads and
//!      writes are bound at their lexical depth via `resolve_local`, which
//!      also marks the binding used.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::SiltError;
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// What kind of function body are we inside?  Validates `return` and the
/// `super(...)` protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
    StaticInitializer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// Are we inside a loop body?  Validates `break`/`continue`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LoopType {
    None,
    While,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum VarState {
    Declared,
    Defined,
    Used,
}

#[derive(Debug)]
struct Binding {
    state: VarState,
    token: Token,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, Binding>>,
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopType,
    has_called_super: bool,
    errors: Vec<SiltError>,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopType::None,
            has_called_super: false,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements, collecting every static error.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<(), Vec<SiltError>> {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(decl) => {
                // Declared and defined up front so the body can recurse.
                self.declare(&decl.name);
                self.define(&decl.name);

                self.resolve_function(FunctionType::Function, &decl.params, &decl.body);
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

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition);

                let enclosing_loop = self.current_loop;
                self.current_loop = LoopType::While;

                self.resolve_stmt(body);

                self.current_loop = enclosing_loop;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if matches!(
                        self.current_function,
                        FunctionType::Initializer | FunctionType::StaticInitializer
                    ) {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }

            // The two share one message, matching the original.
            Stmt::Break { keyword } | Stmt::Continue { keyword } => {
                if self.current_loop == LoopType::None {
                    self.error(keyword, "Illegal continue statement.");
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                getters,
                static_methods,
                static_getters,
            } => {
                self.resolve_class(
                    name,
                    superclass.as_ref(),
                    methods,
                    getters,
                    static_methods,
                    static_getters,
                );
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[FunctionDecl],
        getters: &[FunctionDecl],
        static_methods: &[FunctionDecl],
        static_getters: &[FunctionDecl],
    ) {
        // 1. Declare & define the class name so members can refer to it.
        self.declare(name);
        self.define(name);

        // 2. Save and enter the class context.
        let enclosing_class = self.current_class;
        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        // 3. If there is a superclass, guard self-inheritance, resolve the
        //    superclass variable, and open a scope binding `super`.
        if let Some(superclass_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.");
                }
            }

            self.resolve_expr(superclass_expr);

            self.begin_scope();
            self.declare_implicit("super", name);
        }

        // 4. Open the implicit `this` scope for all members, static ones
        //    included (`this` in a static member is the class itself).
        self.begin_scope();
        self.declare_implicit("this", name);

        // 5. A name may appear in the method table or the getter table of
        //    each receiver kind, never both.
        self.check_duplicate_members(methods, getters);
        self.check_duplicate_members(static_methods, static_getters);

        // 6. Static members.  A static `init` is the static initializer:
        //    it runs at class construction with no arguments.
        for decl in static_methods {
            let kind = if decl.name.lexeme == "init" {
                FunctionType::StaticInitializer
            } else {
                FunctionType::Method
            };

            if kind == FunctionType::StaticInitializer && !decl.params.is_empty() {
                self.error(
                    &decl.name,
                    "Class static initializer can't have parameters.",
                );
            }

            self.resolve_function(kind, &decl.params, &decl.body);
        }

        for decl in static_getters {
            self.resolve_function(FunctionType::Method, &decl.params, &decl.body);
        }

        // 7. Instance members.  Initializers of derived classes carry the
        //    `super(...)` obligation.
        for decl in methods {
            let kind = if decl.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_method(kind, decl);
        }

        for decl in getters {
            self.resolve_function(FunctionType::Method, &decl.params, &decl.body);
        }

        // 8. Close the `this` scope, then the `super` scope if opened.
        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        // 9. Restore the outer class context.
        self.current_class = enclosing_class;
    }

    /// Resolve one instance method; a derived-class initializer must call
    /// `super(...)` exactly once somewhere in its body.
    fn resolve_method(&mut self, kind: FunctionType, decl: &FunctionDecl) {
        if kind == FunctionType::Initializer && self.current_class == ClassType::Subclass {
            let enclosing = self.has_called_super;
            self.has_called_super = false;

            self.resolve_function(kind, &decl.params, &decl.body);

            if !self.has_called_super {
                self.error(
                    &decl.name,
                    "Superclass was not initialized inside subclass initializer.",
                );
            }

            self.has_called_super = enclosing;
        } else {
            self.resolve_function(kind, &decl.params, &decl.body);
        }
    }

    fn check_duplicate_members(&mut self, methods: &[FunctionDecl], getters: &[FunctionDecl]) {
        let method_names: HashSet<&str> = methods
            .iter()
            .map(|decl| decl.name.lexeme.as_str())
            .collect();

        for decl in getters {
            if method_names.contains(decl.name.lexeme.as_str()) {
                self.error(&decl.name, "Duplicate method and getter name.");
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

            Expr::Variable { id, name } => {
                // Reading a local inside its own initializer, e.g.
                // `{ var a = a; }`.  Still resolved afterwards so the
                // binding does not also report as unused.
                let declared_here = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .map(|binding| binding.state == VarState::Declared)
                    .unwrap_or(false);

                if declared_here {
                    self.error(name, "Can't read local variable in its own initializer.");
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Can't use 'super' outside of a derived class.");
                } else if self.current_function == FunctionType::Initializer
                    && !self.has_called_super
                {
                    self.error(
                        keyword,
                        "Can't access property on superclass until 'super' has been called.",
                    );
                }

                self.resolve_local(*id, keyword);
            }

            Expr::SuperCall {
                id,
                keyword,
                arguments,
            } => {
                if self.current_class != ClassType::Subclass {
                    self.error(keyword, "Can't use 'super' outside of a derived class.");
                } else if self.current_function != FunctionType::Initializer {
                    // Covers static initializers, methods, top-level code,
                    // and functions nested inside an initializer alike.
                    self.error(keyword, "Can't call 'super' outside of class initializer.");
                } else if self.has_called_super {
                    self.error(
                        keyword,
                        "Can't call 'super' more than once inside class initializer.",
                    );
                } else {
                    self.has_called_super = true;
                }

                self.resolve_local(*id, keyword);

                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Function { params, body } => {
                self.resolve_function(FunctionType::Function, params, body);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `kind` selects the context rules that apply inside the body; loop
    /// context never crosses a function boundary.
    fn resolve_function(&mut self, kind: FunctionType, params: &[Token], body: &[Stmt]) {
        let enclosing_function = self.current_function;
        let enclosing_loop = self.current_loop;

        self.current_function = kind;
        self.current_loop = LoopType::None;

        self.begin_scope();

        for param in params {
            self.declare(param);
            self.define(param);
        }

        for stmt in body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_loop = enclosing_loop;
        self.current_function = enclosing_function;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope; every binding that never reached Used is
    /// reported.  Globals are not tracked, so they are exempt.
    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        let mut unused: Vec<Token> = scope
            .into_values()
            .filter(|binding| binding.state != VarState::Used)
            .map(|binding| binding.token)
            .collect();

        // Scope maps iterate in arbitrary order; report in source order.
        unused.sort_by(|a, b| (a.line, &a.lexeme).cmp(&(b.line, &b.lexeme)));

        for token in unused {
            let message = format!("Unused local variable '{}'.", token.lexeme);
            self.error(&token, message);
        }
    }

    fn declare(&mut self, name: &Token) {
        let duplicate = self
            .scopes
            .last()
            .map(|scope| scope.contains_key(&name.lexeme))
            .unwrap_or(false);

        if duplicate {
            self.error(name, "Already a variable with that name in this scope.");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.lexeme.clone(),
                Binding {
                    state: VarState::Declared,
                    token: name.clone(),
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                if binding.state == VarState::Declared {
                    binding.state = VarState::Defined;
                }
            }
        }
    }

    /// Bind an implicit name (`this`/`super`) into the top scope,
    /// pre-marked Used so it is never reported as unused.
    fn declare_implicit(&mut self, name: &str, at: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            let mut token = at.clone();
            token.lexeme = name.to_string();

            scope.insert(
                name.to_string(),
                Binding {
                    state: VarState::Used,
                    token,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either a local at some depth
    /// (marking the binding used) or a global if no scope holds it.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                binding.state = VarState::Used;

                debug!("Resolved '{}' at depth {}", name, depth);

                self.interpreter.note_local(id, depth);

                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }

    fn error<S: Into<String>>(&mut self, token: &Token, msg: S) {
        self.errors.push(SiltError::resolve(token, msg));
    }
}
