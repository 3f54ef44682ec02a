use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::interpreter::{Interpreter, Interrupt};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// A user function, method, or bound method.  Captures the frame in
/// effect at declaration time; calls execute the body in a fresh frame
/// enclosing that closure.
#[derive(Debug)]
pub struct Function {
    name: Option<Token>,
    params: Vec<Token>,
    body: Rc<Vec<Stmt>>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn from_decl(
        decl: &FunctionDecl,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Function {
            name: Some(decl.name.clone()),
            params: decl.params.clone(),
            body: Rc::clone(&decl.body),
            closure,
            is_initializer,
        }
    }

    /// Anonymous function expression; has no name to report.
    pub fn from_expr(
        params: &[Token],
        body: &Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
    ) -> Self {
        Function {
            name: None,
            params: params.to_vec(),
            body: Rc::clone(body),
            closure,
            is_initializer: false,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Produce a bound method: a copy whose closure is a fresh frame with
    /// `this` defined as the receiver.  The receiver may be an instance
    /// or, for static members, a class.
    pub fn bind(&self, this: Value) -> Rc<Function> {
        let mut frame = Environment::with_enclosing(self.closure.clone());
        frame.define("this", this);

        Rc::new(Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            closure: frame.shared(),
            is_initializer: self.is_initializer,
        })
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
    ) -> Result<Value, Interrupt> {
        // Every call gets its own frame; sharing one would let recursive
        // calls clobber each other's parameters.
        let mut frame = Environment::with_enclosing(self.closure.clone());

        for (param, argument) in self.params.iter().zip(arguments) {
            frame.define(&param.lexeme, argument.clone());
        }

        let result = interpreter.execute_block(&self.body, frame.shared());

        // Initializers always yield `this`, whether the body returned or
        // fell off the end; the returned value (if any) is discarded.
        if self.is_initializer
            && matches!(result, Ok(()) | Err(Interrupt::Return(_)))
        {
            let this = Token::new(TokenType::THIS, "this".to_string(), 0);

            return self
                .closure
                .borrow()
                .get_at(0, &this)
                .map_err(Interrupt::Error);
        }

        match result {
            Ok(()) => Ok(Value::Nil),

            Err(Interrupt::Return(value)) => Ok(value),

            Err(other) => Err(other),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name.lexeme),

            None => write!(f, "<fn>"),
        }
    }
}

/// A host function exposed to scripts.
#[derive(Debug)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}
