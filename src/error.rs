//! Error types shared by every stage of the interpreter.
//!
//! Each stage gets its own `SiltError` variant so the driver can pick an
//! exit code (65 for anything static, 70 at runtime) without inspecting
//! message text.  The static variants remember where they happened: all
//! carry the source line, and parse/resolve errors additionally carry an
//! `at end` / `at '<lexeme>'` location taken from the offending token.
//! `Io` and `Utf8` wrap their std counterparts so `?` composes in the
//! driver, whose `main` hands the whole enum to `anyhow`.
//!
//! Nothing in this module writes to stderr.  Rendering diagnostics and
//! exiting belong to the driver; the interpreter core only constructs and
//! propagates values of these types.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SiltError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error, anchored to the offending token.
    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        message: String,
        /// `at end` or `at '<lexeme>'`.
        location: String,
        line: usize,
    },

    /// Static-analysis failure from the resolver pass.
    #[error("[line {line}] Error {location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("[line {line}] RuntimeError: {message}")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl SiltError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        SiltError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Parse error: line={}, loc={}, msg={}",
            token.line,
            token.location(),
            message
        );

        SiltError::Parse {
            message,
            location: token.location(),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, loc={}, msg={}",
            token.line,
            token.location(),
            message
        );

        SiltError::Resolve {
            message,
            location: token.location(),
            line: token.line,
        }
    }

    /// Helper constructor for **runtime** failures.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        SiltError::Runtime {
            message: msg.into(),
            line,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SiltError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn parse_error_formats_with_location() {
        let token = Token::new(TokenType::IDENTIFIER, "oops".to_string(), 4);
        let err = SiltError::parse(&token, "Expect ';' after value.");
        assert_eq!(
            err.to_string(),
            "[line 4] Error at 'oops': Expect ';' after value."
        );
    }

    #[test]
    fn parse_error_at_end() {
        let token = Token::new(TokenType::EOF, String::new(), 7);
        let err = SiltError::parse(&token, "Expect expression.");
        assert_eq!(err.to_string(), "[line 7] Error at end: Expect expression.");
    }

    #[test]
    fn runtime_error_format() {
        let err = SiltError::runtime(2, "Cannot divide by 0.");
        assert_eq!(err.to_string(), "[line 2] RuntimeError: Cannot divide by 0.");
    }
}
