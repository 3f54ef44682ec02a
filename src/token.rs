use log::debug;
use std::fmt;
use std::mem;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone)]
pub enum TokenType {
    // Single-character tokens.
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    DOT,
    MINUS,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,

    // One or two character tokens.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    // Literals.
    IDENTIFIER,
    STRING(String),
    NUMBER(f64),

    // Keywords.
    AND,
    BREAK,
    CLASS,
    CONTINUE,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,
    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,

    // Special Characters
    EOF,
}

impl PartialEq for TokenType {
    fn eq(&self, other: &Self) -> bool {
        // Kind equality only: the parser matches token kinds, so the
        // STRING/NUMBER payloads are ignored here.
        mem::discriminant(self) == mem::discriminant(other)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: usize) -> Self {
        debug!(
            "Creating new token: type={:?}, lexeme={}, line={}",
            token_type, lexeme, line
        );
        Self {
            token_type,
            lexeme,
            line,
        }
    }

    /// Position description used in parse/resolve diagnostics:
    /// `at end` for EOF, `at '<lexeme>'` everywhere else.
    pub fn location(&self) -> String {
        if self.token_type == TokenType::EOF {
            "at end".to_string()
        } else {
            format!("at '{}'", self.lexeme)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_equality_ignores_literal_payloads() {
        assert_eq!(TokenType::NUMBER(1.0), TokenType::NUMBER(2.5));
        assert_eq!(
            TokenType::STRING("a".to_string()),
            TokenType::STRING("b".to_string())
        );
        assert_ne!(TokenType::NUMBER(1.0), TokenType::STRING("1".to_string()));
        assert_eq!(TokenType::BREAK, TokenType::BREAK);
        assert_ne!(TokenType::BREAK, TokenType::CONTINUE);
    }

    #[test]
    fn location_reports_lexeme_or_end() {
        let ident = Token::new(TokenType::IDENTIFIER, "total".to_string(), 3);
        assert_eq!(ident.location(), "at 'total'");

        let eof = Token::new(TokenType::EOF, String::new(), 9);
        assert_eq!(eof.location(), "at end");
    }
}
