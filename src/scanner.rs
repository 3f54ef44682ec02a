//! Lexer for Silt source text.
//!
//! The scanner hands out tokens lazily: it implements
//! `Iterator<Item = Result<Token, SiltError>>`, yielding bad input inline
//! as `Err` and carrying on, so one pass reports every lexical problem.
//! The stream always ends with exactly one EOF token.  Whitespace and
//! `//` comments are consumed between tokens and never reach the parser.

use std::iter::FusedIterator;

use log::{debug, info};
use phf::phf_map;

use crate::error::SiltError;
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::AND,
    "break" => TokenType::BREAK,
    "class" => TokenType::CLASS,
    "continue" => TokenType::CONTINUE,
    "else" => TokenType::ELSE,
    "false" => TokenType::FALSE,
    "fun" => TokenType::FUN,
    "for" => TokenType::FOR,
    "if" => TokenType::IF,
    "nil" => TokenType::NIL,
    "or" => TokenType::OR,
    "print" => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super" => TokenType::SUPER,
    "this" => TokenType::THIS,
    "true" => TokenType::TRUE,
    "var" => TokenType::VAR,
    "while" => TokenType::WHILE,
};

#[derive(Debug, Clone)]
pub struct Scanner {
    source: Vec<u8>,
    cursor: usize,
    line: usize,
    eof_emitted: bool,
}

impl Scanner {
    pub fn new(source: Vec<u8>) -> Self {
        info!("Scanning {} bytes of source", source.len());
        Self {
            source,
            cursor: 0,
            line: 1,
            eof_emitted: false,
        }
    }

    /// Consume whitespace, newlines, and `//` comments so the next byte
    /// examined is the start of a token (or the end of input).
    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\r' | b'\t' => {
                    self.cursor += 1;
                }

                b'\n' => {
                    self.cursor += 1;
                    self.line += 1;
                }

                b'/' if self.second() == Some(b'/') => {
                    debug!("Skipping comment on line {}", self.line);

                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.cursor += 1;
                    }
                }

                _ => break,
            }
        }
    }

    /// Classify one token.  `byte` has already been consumed; `start` is
    /// its offset, kept so literal bodies can be sliced out.
    fn lex_token(&mut self, byte: u8, start: usize) -> Result<TokenType, SiltError> {
        match byte {
            b'(' => Ok(TokenType::LEFT_PAREN),

            b')' => Ok(TokenType::RIGHT_PAREN),

            b'{' => Ok(TokenType::LEFT_BRACE),

            b'}' => Ok(TokenType::RIGHT_BRACE),

            b',' => Ok(TokenType::COMMA),

            b'.' => Ok(TokenType::DOT),

            b'-' => Ok(TokenType::MINUS),

            b'+' => Ok(TokenType::PLUS),

            b';' => Ok(TokenType::SEMICOLON),

            b'*' => Ok(TokenType::STAR),

            // Comments were consumed as trivia, so a slash here is division.
            b'/' => Ok(TokenType::SLASH),

            b'!' => Ok(if self.eat(b'=') {
                TokenType::BANG_EQUAL
            } else {
                TokenType::BANG
            }),

            b'=' => Ok(if self.eat(b'=') {
                TokenType::EQUAL_EQUAL
            } else {
                TokenType::EQUAL
            }),

            b'<' => Ok(if self.eat(b'=') {
                TokenType::LESS_EQUAL
            } else {
                TokenType::LESS
            }),

            b'>' => Ok(if self.eat(b'=') {
                TokenType::GREATER_EQUAL
            } else {
                TokenType::GREATER
            }),

            b'"' => self.string_literal(),

            b'0'..=b'9' => Ok(self.number_literal(start)),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => Ok(self.identifier_or_keyword(start)),

            _ => Err(SiltError::lex(
                self.line,
                format!("Unexpected character: {}", byte as char),
            )),
        }
    }

    /// The opening quote is already consumed.  Strings may span lines;
    /// the token is attributed to the line the string closes on.
    fn string_literal(&mut self) -> Result<TokenType, SiltError> {
        let content_start = self.cursor;

        loop {
            match self.bump() {
                None => {
                    return Err(SiltError::lex(self.line, "Unterminated string."));
                }

                Some(b'"') => break,

                Some(b'\n') => self.line += 1,

                Some(_) => {}
            }
        }

        let content = &self.source[content_start..self.cursor - 1];
        let text = String::from_utf8_lossy(content).into_owned();

        Ok(TokenType::STRING(text))
    }

    fn number_literal(&mut self, start: usize) -> TokenType {
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.cursor += 1;
        }

        // A dot only belongs to the number when digits follow it, so
        // `7.abs` stays a property access on `7`.
        if self.peek() == Some(b'.') && self.second().is_some_and(|b| b.is_ascii_digit()) {
            self.cursor += 1;

            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.cursor += 1;
            }
        }

        let text = String::from_utf8_lossy(&self.source[start..self.cursor]);
        let value: f64 = text.parse().unwrap_or(0.0);

        TokenType::NUMBER(value)
    }

    fn identifier_or_keyword(&mut self, start: usize) -> TokenType {
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.cursor += 1;
        }

        let text = String::from_utf8_lossy(&self.source[start..self.cursor]);

        match KEYWORDS.get(text.as_ref()) {
            Some(keyword) => keyword.clone(),

            None => TokenType::IDENTIFIER,
        }
    }

    #[inline]
    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek();

        if byte.is_some() {
            self.cursor += 1;
        }

        byte
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.source.get(self.cursor).copied()
    }

    #[inline]
    fn second(&self) -> Option<u8> {
        self.source.get(self.cursor + 1).copied()
    }

    /// Consume the next byte only if it matches; drives the two-character
    /// operators.
    #[inline]
    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += 1;

            true
        } else {
            false
        }
    }
}

impl Iterator for Scanner {
    type Item = Result<Token, SiltError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();

        let start = self.cursor;

        let Some(byte) = self.bump() else {
            if self.eof_emitted {
                return None;
            }

            self.eof_emitted = true;

            debug!("Token stream complete at line {}", self.line);

            return Some(Ok(Token::new(TokenType::EOF, String::new(), self.line)));
        };

        match self.lex_token(byte, start) {
            Ok(token_type) => {
                let lexeme = String::from_utf8_lossy(&self.source[start..self.cursor]).into_owned();

                Some(Ok(Token::new(token_type, lexeme, self.line)))
            }

            Err(error) => {
                debug!("Lex error: {}", error);

                Some(Err(error))
            }
        }
    }
}

impl FusedIterator for Scanner {}
