use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::class::Class;
use crate::environment::Environment;
use crate::error::{Result, SiltError};
use crate::expr::{Expr, ExprId};
use crate::function::{Function, NativeFunction};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local exits, carried in the evaluator's `Err` channel.
///
/// `Return` is consumed by the enclosing call frame, `Break` and
/// `Continue` by the nearest `while`; `Error` propagates all the way to
/// the driver.  Keeping each signal a distinct variant lets the matching
/// construct catch exactly the one it owns and pass the rest through.
#[derive(Debug)]
pub enum Interrupt {
    Error(SiltError),
    Return(Value),
    Break,
    Continue,
}

impl From<SiltError> for Interrupt {
    fn from(error: SiltError) -> Self {
        Interrupt::Error(error)
    }
}

impl Interrupt {
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        Interrupt::Error(SiltError::runtime(token.line, msg))
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Resolution side-table: variable-bearing node id → frame distance.
    /// Absent ids resolve from the globals frame.
    locals: HashMap<ExprId, usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new().shared();

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            })),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Record a resolved local binding.  Called back by the resolver.
    pub fn note_local(&mut self, id: ExprId, distance: usize) {
        debug!("Noting local {:?} at distance {}", id, distance);
        self.locals.insert(id, distance);
    }

    /// Run a resolved program.  The first runtime error aborts execution
    /// and is handed to the driver for reporting.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                return Err(match interrupt {
                    Interrupt::Error(error) => error,

                    // The resolver rejects top-level return/break/continue,
                    // so a stray signal here is an interpreter defect.
                    Interrupt::Return(_) | Interrupt::Break | Interrupt::Continue => {
                        SiltError::runtime(0, "Unexpected control-flow signal.")
                    }
                });
            }
        }

        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> std::result::Result<(), Interrupt> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                println!("{}", value);

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let frame = Environment::with_enclosing(self.environment.clone()).shared();

                self.execute_block(statements, frame)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While {
                condition,
                body,
                is_for,
                has_increment,
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}

                        Err(Interrupt::Break) => break,

                        Err(Interrupt::Continue) => {
                            if *is_for && *has_increment {
                                self.run_for_increment(body)?;
                            }
                        }

                        Err(other) => return Err(other),
                    }
                }

                Ok(())
            }

            Stmt::Function(decl) => {
                let function =
                    Function::from_decl(decl, self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = if let Some(expr) = value {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                Err(Interrupt::Return(value))
            }

            Stmt::Break { .. } => Err(Interrupt::Break),

            Stmt::Continue { .. } => Err(Interrupt::Continue),

            Stmt::Class {
                name,
                superclass,
                methods,
                getters,
                static_methods,
                static_getters,
            } => self.execute_class(
                name,
                superclass.as_ref(),
                methods,
                getters,
                static_methods,
                static_getters,
            ),
        }
    }

    /// Run `statements` in `frame`, restoring the previous frame on every
    /// exit path, signals and errors included.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        frame: Rc<RefCell<Environment>>,
    ) -> std::result::Result<(), Interrupt> {
        let previous = std::mem::replace(&mut self.environment, frame);

        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                self.environment = previous;

                return Err(interrupt);
            }
        }

        self.environment = previous;

        Ok(())
    }

    /// `continue` inside a desugared `for` must run the increment before
    /// the condition is re-tested.  The increment sits as the second
    /// statement of the while-body block and was resolved one scope below
    /// the loop frame, so it re-runs inside a fresh throwaway frame to
    /// restore that depth.
    fn run_for_increment(&mut self, body: &Stmt) -> std::result::Result<(), Interrupt> {
        if let Stmt::Block(statements) = body {
            if let Some(increment) = statements.get(1) {
                let frame = Environment::with_enclosing(self.environment.clone()).shared();

                return self.execute_block(std::slice::from_ref(increment), frame);
            }
        }

        Ok(())
    }

    /// Class declaration protocol: superclass check, name pre-defined to
    /// nil, an extra frame binding `super`, member tables closed over that
    /// frame, static initializer, final assignment.
    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[FunctionDecl],
        getters: &[FunctionDecl],
        static_methods: &[FunctionDecl],
        static_getters: &[FunctionDecl],
    ) -> std::result::Result<(), Interrupt> {
        let superclass_value: Option<Rc<Class>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let at = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(Interrupt::runtime(at, "Superclass must be a class."));
                }
            },

            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let previous = self.environment.clone();

        if let Some(class) = &superclass_value {
            let mut frame = Environment::with_enclosing(self.environment.clone());
            frame.define("super", Value::Class(Rc::clone(class)));

            self.environment = frame.shared();
        }

        let methods_table = self.member_table(methods, true);
        let getters_table = self.member_table(getters, false);
        let static_methods_table = self.member_table(static_methods, false);
        let static_getters_table = self.member_table(static_getters, false);

        self.environment = previous;

        let class = Rc::new(Class::new(
            name.lexeme.clone(),
            superclass_value,
            methods_table,
            getters_table,
            static_methods_table,
            static_getters_table,
        ));

        // Constructing the class triggers its own static initializer.
        if let Some(static_init) = class.static_initializer() {
            static_init
                .bind(Value::Class(Rc::clone(&class)))
                .call(self, &[])?;
        }

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(class))?;

        Ok(())
    }

    fn member_table(
        &self,
        decls: &[FunctionDecl],
        init_aware: bool,
    ) -> HashMap<String, Rc<Function>> {
        decls
            .iter()
            .map(|decl| {
                // Only the instance method named `init` is an initializer;
                // static `init` and getters return values normally.
                let is_initializer = init_aware && decl.name.lexeme == Class::INIT;

                let function =
                    Function::from_decl(decl, self.environment.clone(), is_initializer);

                (decl.name.lexeme.clone(), Rc::new(function))
            })
            .collect()
    }

    pub fn evaluate(&mut self, expr: &Expr) -> std::result::Result<Value, Interrupt> {
        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left)?;

                // Short-circuit: yield the operand that decided the result.
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),

                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),

                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    self.environment
                        .borrow_mut()
                        .assign_at(distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee_value, &args, paren)
            }

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                self.get_property(&object, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                let Value::Instance(instance) = object else {
                    return Err(Interrupt::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;

                instance.set_field(&name.lexeme, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                property,
            } => self.evaluate_super_property(*id, keyword, property),

            Expr::SuperCall {
                id,
                keyword,
                arguments,
            } => self.evaluate_super_call(*id, keyword, arguments),

            Expr::Function { params, body } => Ok(Value::Function(Rc::new(
                Function::from_expr(params, body, self.environment.clone()),
            ))),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> std::result::Result<Value, Interrupt> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),

            TokenType::STRING(s) => Ok(Value::String(s.clone())),

            TokenType::TRUE => Ok(Value::Bool(true)),

            TokenType::FALSE => Ok(Value::Bool(false)),

            TokenType::NIL => Ok(Value::Nil),

            _ => Err(Interrupt::runtime(token, "Invalid literal.")),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Interrupt> {
        let value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(Interrupt::runtime(operator, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(Interrupt::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> std::result::Result<Value, Interrupt> {
        let left_value = self.evaluate(left)?;
        let right_value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                // Either operand being a string turns `+` into
                // concatenation over the canonical renderings.
                (a, b) if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }

                _ => Err(Interrupt::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(Interrupt::runtime(operator, "Cannot divide by 0."))
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(Interrupt::runtime(operator, "Operands must be numbers.")),
            },

            _ => Err(Interrupt::runtime(operator, "Invalid binary operator.")),
        }
    }

    fn lookup_variable(
        &self,
        id: ExprId,
        name: &Token,
    ) -> std::result::Result<Value, Interrupt> {
        if let Some(&distance) = self.locals.get(&id) {
            self.environment
                .borrow()
                .get_at(distance, name)
                .map_err(Interrupt::Error)
        } else {
            self.globals.borrow().get(name).map_err(Interrupt::Error)
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        args: &[Value],
        paren: &Token,
    ) -> std::result::Result<Value, Interrupt> {
        match callee {
            Value::Native(native) => {
                self.check_arity(native.arity, args.len(), paren)?;

                (native.func)(args).map_err(|msg| Interrupt::runtime(paren, msg))
            }

            Value::Function(function) => {
                self.check_arity(function.arity(), args.len(), paren)?;

                function.call(self, args)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), args.len(), paren)?;

                Class::construct(class, self, args)
            }

            _ => Err(Interrupt::runtime(
                paren,
                "Can only call functions and classes.",
            )),
        }
    }

    fn check_arity(
        &self,
        expected: usize,
        got: usize,
        paren: &Token,
    ) -> std::result::Result<(), Interrupt> {
        if expected != got {
            return Err(Interrupt::runtime(
                paren,
                format!("Expected {} arguments but got {}.", expected, got),
            ));
        }

        Ok(())
    }

    fn get_property(
        &mut self,
        object: &Value,
        name: &Token,
    ) -> std::result::Result<Value, Interrupt> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.field(&name.lexeme) {
                    return Ok(value);
                }

                let this = Value::Instance(Rc::clone(instance));

                // Getters run immediately on access; methods come back
                // bound for later calls.
                if let Some(getter) = instance.class().find_getter(&name.lexeme) {
                    return getter.bind(this).call(self, &[]);
                }

                if let Some(method) = instance.class().find_method(&name.lexeme) {
                    return Ok(Value::Function(method.bind(this)));
                }

                Err(Interrupt::runtime(
                    name,
                    format!("Undefined property '{}'.", name.lexeme),
                ))
            }

            // Static lookup: the class value is its own receiver.
            Value::Class(class) => {
                let this = Value::Class(Rc::clone(class));

                if let Some(getter) = class.find_static_getter(&name.lexeme) {
                    return getter.bind(this).call(self, &[]);
                }

                if let Some(method) = class.find_static_method(&name.lexeme) {
                    return Ok(Value::Function(method.bind(this)));
                }

                Err(Interrupt::runtime(
                    name,
                    format!("Undefined property '{}'.", name.lexeme),
                ))
            }

            _ => Err(Interrupt::runtime(name, "Only instances have properties.")),
        }
    }

    /// `super.<property>`: the resolver pinned `super` at a known
    /// distance, with the bound receiver one frame closer.
    fn evaluate_super_property(
        &mut self,
        id: ExprId,
        keyword: &Token,
        property: &Token,
    ) -> std::result::Result<Value, Interrupt> {
        let (superclass, receiver) = self.super_and_receiver(id, keyword)?;

        let is_static = matches!(receiver, Value::Class(_));

        let getter = if is_static {
            superclass.find_static_getter(&property.lexeme)
        } else {
            superclass.find_getter(&property.lexeme)
        };

        if let Some(getter) = getter {
            return getter.bind(receiver).call(self, &[]);
        }

        let method = if is_static {
            superclass.find_static_method(&property.lexeme)
        } else {
            superclass.find_method(&property.lexeme)
        };

        if let Some(method) = method {
            return Ok(Value::Function(method.bind(receiver)));
        }

        Err(Interrupt::runtime(
            property,
            format!("Undefined property '{}'.", property.lexeme),
        ))
    }

    /// `super(...)`: run the superclass's instance initializer on the
    /// current `this`.  Yields nil to the surrounding expression.
    fn evaluate_super_call(
        &mut self,
        id: ExprId,
        keyword: &Token,
        arguments: &[Expr],
    ) -> std::result::Result<Value, Interrupt> {
        let (superclass, receiver) = self.super_and_receiver(id, keyword)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match superclass.find_method(Class::INIT) {
            Some(initializer) => {
                self.check_arity(initializer.arity(), args.len(), keyword)?;

                initializer.bind(receiver).call(self, &args)?;
            }

            None => {
                self.check_arity(0, args.len(), keyword)?;
            }
        }

        Ok(Value::Nil)
    }

    fn super_and_receiver(
        &self,
        id: ExprId,
        keyword: &Token,
    ) -> std::result::Result<(Rc<Class>, Value), Interrupt> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(Interrupt::runtime(keyword, "Undefined variable 'super'."));
        };

        let superclass = match self.environment.borrow().get_at(distance, keyword)? {
            Value::Class(class) => class,

            _ => {
                return Err(Interrupt::runtime(keyword, "Superclass must be a class."));
            }
        };

        let this = Token::new(TokenType::THIS, "this".to_string(), keyword.line);
        let receiver = self.environment.borrow().get_at(distance - 1, &this)?;

        Ok((superclass, receiver))
    }
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
