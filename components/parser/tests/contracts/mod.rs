//! Contract tests for the parser API
//!
//! These tests verify the parser component implements its contract correctly.

use core_types::{ErrorKind, JsError};
use parser::{Lexer, Parser, Program, Token};

// =============================================================================
// Lexer Contract Tests
// =============================================================================

/// Test Lexer contract: next_token() -> Result<Token, JsError>
#[test]
fn contract_lexer_next_token_returns_result() {
    let mut lexer = Lexer::new("let x = 42;");
    let result: Result<Token, JsError> = lexer.next_token();
    assert!(result.is_ok());
}

/// Test Lexer contract: peek_token() does not consume
#[test]
fn contract_lexer_peek_does_not_consume() {
    let mut lexer = Lexer::new("x");
    let peeked = lexer.peek_token().unwrap().clone();
    assert_eq!(lexer.next_token().unwrap(), peeked);
    assert_eq!(lexer.next_token().unwrap(), Token::EOF);
}

/// Test Lexer contract: errors are SyntaxError with a position
#[test]
fn contract_lexer_error_kind() {
    let mut lexer = Lexer::new("@");
    let err = lexer.next_token().unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert!(err.source_position.is_some());
}

// =============================================================================
// Parser Contract Tests
// =============================================================================

/// Test Parser contract: parse() -> Result<Program, JsError>
#[test]
fn contract_parser_parse_returns_program() {
    let result: Result<Program, JsError> = Parser::new("var a = 1;").parse();
    assert_eq!(result.unwrap().body.len(), 1);
}

/// Test Parser contract: empty source is an empty program
#[test]
fn contract_parser_empty_source() {
    assert!(Parser::new("").parse().unwrap().body.is_empty());
}

/// Test Parser contract: syntax errors carry line information
#[test]
fn contract_parser_error_has_line() {
    let err = Parser::new("var ok = 1;\nvar = 2;").parse().unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert_eq!(err.line(), Some(2));
}

/// Test Parser contract: every statement has a position
#[test]
fn contract_parser_statements_have_positions() {
    let program = Parser::new("a;\nb;\nif (a) { b; }").parse().unwrap();
    for statement in &program.body {
        assert!(statement.position().is_some());
    }
}
