use silt::scanner::Scanner;
use silt::token::{Token, TokenType};

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes().to_vec());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert_eq!(tokens.len(), expected.len());

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_including_loop_controls() {
    assert_token_sequence(
        "while break continue class super this fun",
        &[
            (TokenType::WHILE, "while"),
            (TokenType::BREAK, "break"),
            (TokenType::CONTINUE, "continue"),
            (TokenType::CLASS, "class"),
            (TokenType::SUPER, "super"),
            (TokenType::THIS, "this"),
            (TokenType::FUN, "fun"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_and_string_literals_carry_payloads() {
    let scanner = Scanner::new(b"12.5 \"twelve\"".to_vec());
    let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

    match &tokens[0].token_type {
        TokenType::NUMBER(n) => assert_eq!(*n, 12.5),
        other => panic!("expected NUMBER, got {:?}", other),
    }

    match &tokens[1].token_type {
        TokenType::STRING(s) => assert_eq!(s, "twelve"),
        other => panic!("expected STRING, got {:?}", other),
    }
}

#[test]
fn comments_and_whitespace_are_skipped() {
    assert_token_sequence(
        "1 // the rest is ignored\n+ 2",
        &[
            (TokenType::NUMBER(1.0), "1"),
            (TokenType::PLUS, "+"),
            (TokenType::NUMBER(2.0), "2"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn lines_are_tracked_across_newlines_and_strings() {
    let scanner = Scanner::new(b"1\n\"a\nb\"\n2".to_vec());
    let tokens: Vec<Token> = scanner.filter_map(Result::ok).collect();

    assert_eq!(tokens[0].line, 1);
    assert_eq!(tokens[1].line, 3); // the string closed on line 3
    assert_eq!(tokens[2].line, 4);
}

#[test]
fn unexpected_characters_are_reported_inline_and_scanning_continues() {
    let source = ",.$(#";
    let scanner = Scanner::new(source.as_bytes().to_vec());

    let results: Vec<_> = scanner.collect();

    // COMMA, DOT, error '$', LEFT_PAREN, error '#', EOF
    assert_eq!(results.len(), 6);

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2);

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            err.to_string().contains("Unexpected character"),
            "error message should contain 'Unexpected character', got: {}",
            err
        );
    }

    let kinds: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|t| t.token_type.clone())
        .collect();

    assert_eq!(
        kinds,
        vec![
            TokenType::COMMA,
            TokenType::DOT,
            TokenType::LEFT_PAREN,
            TokenType::EOF,
        ]
    );
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let scanner = Scanner::new(b"\"open".to_vec());
    let results: Vec<_> = scanner.collect();

    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("expected a lex error");

    assert_eq!(err.to_string(), "[line 1] Error: Unterminated string.");
}
