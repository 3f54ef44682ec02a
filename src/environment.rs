use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::SiltError;
use crate::token::Token;
use crate::value::Value;

/// One lexical frame: a name→value table plus a link to the enclosing
/// frame.  Frames are shared between closures, so the chain is held
/// through `Rc<RefCell<_>>`.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Read from this frame only.  Resolved locals never reach this path;
    /// it serves the globals frame, which has no chain to walk.
    pub fn get(&self, name: &Token) -> Result<Value, SiltError> {
        match self.values.get(&name.lexeme) {
            Some(value) => Ok(value.clone()),

            None => Err(SiltError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )),
        }
    }

    /// Write to the nearest frame that already holds `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), SiltError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);

            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(SiltError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links, then read `name` there.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value, SiltError> {
        if distance == 0 {
            return self.get(name);
        }

        match self.ancestor(distance) {
            Some(frame) => frame.borrow().get(name),

            None => Err(SiltError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )),
        }
    }

    /// Symmetric write at a known distance.
    pub fn assign_at(
        &mut self,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), SiltError> {
        if distance == 0 {
            self.values.insert(name.lexeme.clone(), value);

            return Ok(());
        }

        match self.ancestor(distance) {
            Some(frame) => {
                frame
                    .borrow_mut()
                    .values
                    .insert(name.lexeme.clone(), value);

                Ok(())
            }

            None => Err(SiltError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )),
        }
    }

    fn ancestor(&self, distance: usize) -> Option<Rc<RefCell<Environment>>> {
        let mut frame = self.enclosing.clone()?;

        for _ in 1..distance {
            let parent = frame.borrow().enclosing.clone()?;
            frame = parent;
        }

        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, lexeme.to_string(), 1)
    }

    #[test]
    fn define_then_get_in_same_frame() {
        let mut env = Environment::new();
        env.define("x", Value::Number(1.0));
        assert_eq!(env.get(&name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn get_does_not_walk_the_chain() {
        let outer = Environment::new().shared();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(outer);
        assert!(inner.get(&name("x")).is_err());
    }

    #[test]
    fn get_at_reads_the_exact_frame() {
        let globals = Environment::new().shared();
        globals.borrow_mut().define("x", Value::Number(1.0));

        let middle = Environment::with_enclosing(globals.clone()).shared();
        middle.borrow_mut().define("x", Value::Number(2.0));

        let inner = Environment::with_enclosing(middle);

        assert_eq!(inner.get_at(1, &name("x")).unwrap(), Value::Number(2.0));
        assert_eq!(inner.get_at(2, &name("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_at_writes_the_exact_frame() {
        let outer = Environment::new().shared();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(outer.clone());
        inner.assign_at(1, &name("x"), Value::Number(9.0)).unwrap();

        assert_eq!(outer.borrow().get(&name("x")).unwrap(), Value::Number(9.0));
    }

    #[test]
    fn assign_walks_to_the_defining_frame() {
        let outer = Environment::new().shared();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(outer.clone());
        inner.assign(&name("x"), Value::Number(5.0)).unwrap();

        assert_eq!(outer.borrow().get(&name("x")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn undefined_variable_reports_name_and_line() {
        let env = Environment::new();
        let err = env.get(&name("missing")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] RuntimeError: Undefined variable 'missing'."
        );
    }
}
