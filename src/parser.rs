use std::rc::Rc;

use log::debug;

use crate::error::SiltError;
use crate::expr::{Expr, NodeIds};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

type ParseResult<T> = Result<T, SiltError>;

/// Recursive-descent parser.  Syntax errors are recorded and the parser
/// synchronizes to the next statement boundary, so one pass surfaces as
/// many errors as possible; the driver refuses to execute when any were
/// recorded.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    ids: NodeIds,
    errors: Vec<SiltError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, ids: NodeIds) -> Self {
        Parser {
            tokens,
            current: 0,
            ids,
            errors: Vec::new(),
        }
    }

    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    /// Hand back the id counter (for the next REPL line) and whatever
    /// errors were collected.
    pub fn finish(self) -> (NodeIds, Vec<SiltError>) {
        (self.ids, self.errors)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_tokens(&[TokenType::CLASS]) {
            self.class_declaration()
        } else if self.check(&TokenType::FUN) && self.check_next(&TokenType::IDENTIFIER) {
            self.advance();
            self.function_declaration("function").map(Stmt::Function)
        } else if self.match_tokens(&[TokenType::VAR]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),

            Err(error) => {
                debug!("Parse error, synchronizing: {}", error);
                self.errors.push(error);
                self.synchronize();

                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(&TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.match_tokens(&[TokenType::LESS]) {
            let super_name = self.consume(&TokenType::IDENTIFIER, "Expect superclass name.")?;

            Some(Expr::Variable {
                id: self.ids.next(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut getters = Vec::new();
        let mut static_methods = Vec::new();
        let mut static_getters = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            // A leading `class` marks a static member.
            let is_static = self.match_tokens(&[TokenType::CLASS]);

            let member_name = self.consume(&TokenType::IDENTIFIER, "Expect method name.")?;

            if self.check(&TokenType::LEFT_PAREN) {
                let decl = self.finish_function(member_name, "method")?;

                if is_static {
                    static_methods.push(decl);
                } else {
                    methods.push(decl);
                }
            } else {
                // No parameter list: a getter, invoked on access.
                self.consume(&TokenType::LEFT_BRACE, "Expect '{' before getter body.")?;

                let body = Rc::new(self.block_statements()?);

                let decl = FunctionDecl {
                    name: member_name,
                    params: Vec::new(),
                    body,
                };

                if is_static {
                    static_getters.push(decl);
                } else {
                    getters.push(decl);
                }
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            getters,
            static_methods,
            static_getters,
        })
    }

    fn function_declaration(&mut self, kind: &str) -> ParseResult<FunctionDecl> {
        let name = self.consume(&TokenType::IDENTIFIER, format!("Expect {} name.", kind))?;

        self.finish_function(name, kind)
    }

    /// Parse `( params? ) block` after the name has been consumed.
    fn finish_function(&mut self, name: Token, kind: &str) -> ParseResult<FunctionDecl> {
        self.consume(
            &TokenType::LEFT_PAREN,
            format!("Expect '(' after {} name.", kind),
        )?;

        let params = self.parameters()?;

        self.consume(
            &TokenType::LEFT_BRACE,
            format!("Expect '{{' before {} body.", kind),
        )?;

        let body = Rc::new(self.block_statements()?);

        Ok(FunctionDecl { name, params, body })
    }

    fn parameters(&mut self) -> ParseResult<Vec<Token>> {
        let mut params = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let at = self.peek().clone();
                    self.errors.push(SiltError::parse(
                        &at,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(self.consume(&TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        Ok(params)
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(&TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::BREAK]) {
            let keyword = self.previous().clone();
            self.consume(&TokenType::SEMICOLON, "Expect ';' after 'break'.")?;

            return Ok(Stmt::Break { keyword });
        }

        if self.match_tokens(&[TokenType::CONTINUE]) {
            let keyword = self.previous().clone();
            self.consume(&TokenType::SEMICOLON, "Expect ';' after 'continue'.")?;

            return Ok(Stmt::Continue { keyword });
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    /// Desugar `for` into `{ init; while (cond) { body; increment; } }`.
    /// The increment is the second statement of the while-body block, so
    /// `continue` can find and run it before re-testing the condition.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let paren = self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        let has_increment = increment.is_some();

        let mut while_body = vec![body];
        if let Some(inc) = increment {
            while_body.push(Stmt::Expression(inc));
        }

        let condition = condition.unwrap_or_else(|| {
            Expr::Literal(Token::new(TokenType::TRUE, "true".to_string(), paren.line))
        });

        let while_stmt = Stmt::While {
            condition,
            body: Box::new(Stmt::Block(while_body)),
            is_for: true,
            has_increment,
        };

        Ok(match initializer {
            Some(init) => Stmt::Block(vec![init, while_stmt]),

            None => while_stmt,
        })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        let value = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(&TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While {
            condition,
            body,
            is_for: false,
            has_increment: false,
        })
    }

    /// Statements until the matching `}`; errors inside recover via
    /// `declaration` so one bad statement doesn't eat the whole block.
    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions, in precedence order
    // ─────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or_expression()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.ids.next(),
                    name,
                    value,
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value,
                }),

                _ => Err(SiltError::parse(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and_expression()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator = self.previous().clone();
            let right = self.and_expression()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator = self.previous().clone();
            let right = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator = self.previous().clone();
            let right = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator = self.previous().clone();
            let right = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator = self.previous().clone();
            let right = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call_expression()
    }

    fn call_expression(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                let (arguments, paren) = self.arguments()?;

                expr = Expr::Call {
                    callee: Box::new(expr),
                    paren,
                    arguments,
                };
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name =
                    self.consume(&TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Argument list after `(`; returns the closing paren for call-site
    /// line reporting.
    fn arguments(&mut self) -> ParseResult<(Vec<Expr>, Token)> {
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let at = self.peek().clone();
                    self.errors.push(SiltError::parse(
                        &at,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok((arguments, paren))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NIL,
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: self.ids.next(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword = self.previous().clone();

            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                let (arguments, _) = self.arguments()?;

                return Ok(Expr::SuperCall {
                    id: self.ids.next(),
                    keyword,
                    arguments,
                });
            }

            self.consume(&TokenType::DOT, "Expect '.' after 'super'.")?;
            let property =
                self.consume(&TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: self.ids.next(),
                keyword,
                property,
            });
        }

        if self.match_tokens(&[TokenType::FUN]) {
            self.consume(&TokenType::LEFT_PAREN, "Expect '(' after 'fun'.")?;
            let params = self.parameters()?;
            self.consume(&TokenType::LEFT_BRACE, "Expect '{' before function body.")?;
            let body = Rc::new(self.block_statements()?);

            return Ok(Expr::Function { params, body });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: self.ids.next(),
                name: self.previous().clone(),
            });
        }

        Err(SiltError::parse(self.peek(), "Expect expression."))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cursor helpers
    // ─────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();

                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        !self.is_at_end() && &self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: &TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .map(|token| &token.token_type == token_type)
            .unwrap_or(false)
    }

    fn consume<S: Into<String>>(&mut self, token_type: &TokenType, msg: S) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(SiltError::parse(self.peek(), msg))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Skip to the next likely statement boundary after a syntax error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::BREAK
                | TokenType::CONTINUE => return,

                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse_source(source: &str) -> (Vec<Stmt>, Vec<SiltError>) {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes().to_vec())
            .filter_map(Result::ok)
            .collect();

        let mut parser = Parser::new(tokens, NodeIds::new());
        let statements = parser.parse();
        let (_, errors) = parser.finish();

        (statements, errors)
    }

    #[test]
    fn parses_variable_declaration() {
        let (statements, errors) = parse_source("var a = 1;");
        assert!(errors.is_empty());
        assert!(matches!(&statements[0], Stmt::Var { .. }));
    }

    #[test]
    fn for_desugars_with_increment_second_in_body_block() {
        let (statements, errors) = parse_source("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errors.is_empty());

        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected outer block");
        };
        assert!(matches!(&outer[0], Stmt::Var { .. }));

        let Stmt::While {
            body,
            is_for,
            has_increment,
            ..
        } = &outer[1]
        else {
            panic!("expected while");
        };
        assert!(*is_for);
        assert!(*has_increment);

        let Stmt::Block(body) = body.as_ref() else {
            panic!("expected body block");
        };
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[1], Stmt::Expression(Expr::Assign { .. })));
    }

    #[test]
    fn for_without_increment_keeps_single_statement_body() {
        let (statements, errors) = parse_source("for (;;) break;");
        assert!(errors.is_empty());

        let Stmt::While {
            body,
            is_for,
            has_increment,
            condition,
            ..
        } = &statements[0]
        else {
            panic!("expected while");
        };
        assert!(*is_for);
        assert!(!*has_increment);
        assert!(matches!(condition, Expr::Literal(_)));

        let Stmt::Block(body) = body.as_ref() else {
            panic!("expected body block");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn class_members_sort_into_four_tables() {
        let source = "\
class Point {
  init(x) { this.x = x; }
  length { return this.x; }
  class origin() { return Point(0); }
  class axes { return 2; }
}";
        let (statements, errors) = parse_source(source);
        assert!(errors.is_empty());

        let Stmt::Class {
            methods,
            getters,
            static_methods,
            static_getters,
            ..
        } = &statements[0]
        else {
            panic!("expected class");
        };

        assert_eq!(methods.len(), 1);
        assert_eq!(getters.len(), 1);
        assert_eq!(static_methods.len(), 1);
        assert_eq!(static_getters.len(), 1);
    }

    #[test]
    fn super_call_and_super_property_parse() {
        let source = "\
class A { init() {} }
class B < A {
  init() { super(); }
  m() { return super.m; }
}";
        let (_, errors) = parse_source(source);
        assert!(errors.is_empty());
    }

    #[test]
    fn function_expression_parses_in_statement_position() {
        let (statements, errors) = parse_source("var f = fun (a, b) { return a + b; };");
        assert!(errors.is_empty());

        let Stmt::Var {
            initializer: Some(Expr::Function { params, .. }),
            ..
        } = &statements[0]
        else {
            panic!("expected function expression initializer");
        };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn syntax_errors_are_collected_and_parsing_continues() {
        let (statements, errors) = parse_source("var = 1;\nprint 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Expect variable name."));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let (_, errors) = parse_source("1 = 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("Invalid assignment target."));
    }
}
