//! Lexer - turns script source into tokens

use crate::error::syntax_error;
use core_types::{JsError, SourcePosition};

/// Reserved words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// let keyword
    Let,
    /// const keyword
    Const,
    /// var keyword
    Var,
    /// function keyword
    Function,
    /// return keyword
    Return,
    /// if keyword
    If,
    /// else keyword
    Else,
    /// while keyword
    While,
    /// do keyword
    Do,
    /// for keyword
    For,
    /// break keyword
    Break,
    /// continue keyword
    Continue,
    /// new keyword
    New,
    /// this keyword
    This,
    /// true keyword
    True,
    /// false keyword
    False,
    /// null keyword
    Null,
    /// typeof keyword
    Typeof,
    /// void keyword
    Void,
    /// instanceof keyword
    Instanceof,
    /// in keyword
    In,
    /// try keyword
    Try,
    /// catch keyword
    Catch,
    /// finally keyword
    Finally,
    /// throw keyword
    Throw,
    /// delete keyword
    Delete,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("let", Keyword::Let),
    ("const", Keyword::Const),
    ("var", Keyword::Var),
    ("function", Keyword::Function),
    ("return", Keyword::Return),
    ("if", Keyword::If),
    ("else", Keyword::Else),
    ("while", Keyword::While),
    ("do", Keyword::Do),
    ("for", Keyword::For),
    ("break", Keyword::Break),
    ("continue", Keyword::Continue),
    ("new", Keyword::New),
    ("this", Keyword::This),
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("null", Keyword::Null),
    ("typeof", Keyword::Typeof),
    ("void", Keyword::Void),
    ("instanceof", Keyword::Instanceof),
    ("in", Keyword::In),
    ("try", Keyword::Try),
    ("catch", Keyword::Catch),
    ("finally", Keyword::Finally),
    ("throw", Keyword::Throw),
    ("delete", Keyword::Delete),
];

impl Keyword {
    /// Look up a reserved word.
    pub fn from_word(word: &str) -> Option<Keyword> {
        KEYWORDS.iter().find(|(w, _)| *w == word).map(|(_, k)| *k)
    }

    /// Source spelling of the keyword.
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(w, _)| *w)
            .unwrap_or("")
    }
}

/// Operators and delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuator {
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// .
    Dot,
    /// :
    Colon,
    /// ?
    Question,
    /// =
    Assign,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ==
    EqEq,
    /// ===
    EqEqEq,
    /// !=
    NotEq,
    /// !==
    NotEqEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,
    /// &
    And,
    /// |
    Or,
    /// ^
    Xor,
    /// ~
    Tilde,
    /// <<
    LtLt,
    /// >>
    GtGt,
    /// >>>
    GtGtGt,
    /// +=
    PlusEq,
    /// -=
    MinusEq,
    /// *=
    StarEq,
    /// /=
    SlashEq,
    /// %=
    PercentEq,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
}

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier
    Identifier(String),
    /// Numeric literal
    Number(f64),
    /// String literal (escapes already processed)
    String(String),
    /// Keyword
    Keyword(Keyword),
    /// Punctuator/operator
    Punctuator(Punctuator),
    /// End of file
    EOF,
}

/// Streaming lexer with one token of lookahead.
///
/// # Examples
///
/// ```
/// use parser::{Lexer, Token, Punctuator};
///
/// let mut lexer = Lexer::new("x = 1");
/// assert_eq!(lexer.next_token().unwrap(), Token::Identifier("x".to_string()));
/// assert_eq!(lexer.next_token().unwrap(), Token::Punctuator(Punctuator::Assign));
/// assert_eq!(lexer.next_token().unwrap(), Token::Number(1.0));
/// assert_eq!(lexer.next_token().unwrap(), Token::EOF);
/// ```
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    current_token: Option<Token>,
    token_start: SourcePosition,
    /// Whether a line terminator preceded the most recently scanned token.
    /// Used for automatic semicolon insertion.
    pub line_terminator_before_token: bool,
}

impl Lexer {
    /// Create a lexer, skipping a leading `#!` line.
    pub fn new(source: &str) -> Self {
        let mut lexer = Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            current_token: None,
            token_start: SourcePosition::new(1, 1, 0),
            line_terminator_before_token: false,
        };
        lexer.skip_hashbang();
        lexer
    }

    fn skip_hashbang(&mut self) {
        if self.peek() == '#' && self.peek_next() == Some('!') {
            while !self.is_at_end() && !is_line_terminator(self.peek()) {
                self.advance();
            }
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<Token, JsError> {
        if let Some(token) = self.current_token.take() {
            return Ok(token);
        }
        self.scan_token()
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<&Token, JsError> {
        let token = match self.current_token.take() {
            Some(token) => token,
            None => self.scan_token()?,
        };
        Ok(self.current_token.insert(token))
    }

    /// Start of the most recently scanned token (the peeked one, if any).
    pub fn token_position(&self) -> SourcePosition {
        self.token_start.clone()
    }

    fn scan_token(&mut self) -> Result<Token, JsError> {
        self.line_terminator_before_token = false;
        self.skip_whitespace_and_comments()?;
        self.token_start = self.current_position();

        if self.is_at_end() {
            return Ok(Token::EOF);
        }

        let c = self.advance();
        let token = match c {
            '(' => Token::Punctuator(Punctuator::LParen),
            ')' => Token::Punctuator(Punctuator::RParen),
            '{' => Token::Punctuator(Punctuator::LBrace),
            '}' => Token::Punctuator(Punctuator::RBrace),
            '[' => Token::Punctuator(Punctuator::LBracket),
            ']' => Token::Punctuator(Punctuator::RBracket),
            ';' => Token::Punctuator(Punctuator::Semicolon),
            ',' => Token::Punctuator(Punctuator::Comma),
            ':' => Token::Punctuator(Punctuator::Colon),
            '?' => Token::Punctuator(Punctuator::Question),
            '~' => Token::Punctuator(Punctuator::Tilde),
            '^' => Token::Punctuator(Punctuator::Xor),
            '.' => {
                if self.peek().is_ascii_digit() {
                    return self.scan_number('.');
                }
                Token::Punctuator(Punctuator::Dot)
            }
            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        Token::Punctuator(Punctuator::EqEqEq)
                    } else {
                        Token::Punctuator(Punctuator::EqEq)
                    }
                } else {
                    Token::Punctuator(Punctuator::Assign)
                }
            }
            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        Token::Punctuator(Punctuator::NotEqEq)
                    } else {
                        Token::Punctuator(Punctuator::NotEq)
                    }
                } else {
                    Token::Punctuator(Punctuator::Not)
                }
            }
            '+' => {
                if self.match_char('+') {
                    Token::Punctuator(Punctuator::PlusPlus)
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::PlusEq)
                } else {
                    Token::Punctuator(Punctuator::Plus)
                }
            }
            '-' => {
                if self.match_char('-') {
                    Token::Punctuator(Punctuator::MinusMinus)
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::MinusEq)
                } else {
                    Token::Punctuator(Punctuator::Minus)
                }
            }
            '*' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::StarEq)
                } else {
                    Token::Punctuator(Punctuator::Star)
                }
            }
            '/' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::SlashEq)
                } else {
                    Token::Punctuator(Punctuator::Slash)
                }
            }
            '%' => {
                if self.match_char('=') {
                    Token::Punctuator(Punctuator::PercentEq)
                } else {
                    Token::Punctuator(Punctuator::Percent)
                }
            }
            '<' => {
                if self.match_char('<') {
                    Token::Punctuator(Punctuator::LtLt)
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::LtEq)
                } else {
                    Token::Punctuator(Punctuator::Lt)
                }
            }
            '>' => {
                if self.match_char('>') {
                    if self.match_char('>') {
                        Token::Punctuator(Punctuator::GtGtGt)
                    } else {
                        Token::Punctuator(Punctuator::GtGt)
                    }
                } else if self.match_char('=') {
                    Token::Punctuator(Punctuator::GtEq)
                } else {
                    Token::Punctuator(Punctuator::Gt)
                }
            }
            '&' => {
                if self.match_char('&') {
                    Token::Punctuator(Punctuator::AndAnd)
                } else {
                    Token::Punctuator(Punctuator::And)
                }
            }
            '|' => {
                if self.match_char('|') {
                    Token::Punctuator(Punctuator::OrOr)
                } else {
                    Token::Punctuator(Punctuator::Or)
                }
            }
            '"' | '\'' => return self.scan_string(c),
            c if c.is_ascii_digit() => return self.scan_number(c),
            c if is_id_start(c) => return Ok(self.scan_identifier(c)),
            other => {
                return Err(syntax_error(
                    format!("Unexpected character '{}'", other),
                    Some(self.token_start.clone()),
                ))
            }
        };
        Ok(token)
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, JsError> {
        let mut value = String::new();
        loop {
            if self.is_at_end() || is_line_terminator(self.peek()) {
                return Err(syntax_error(
                    "Unterminated string literal",
                    Some(self.token_start.clone()),
                ));
            }
            let c = self.advance();
            if c == quote {
                break;
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            if self.is_at_end() {
                continue;
            }
            let escaped = self.advance();
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'b' => value.push('\u{0008}'),
                'f' => value.push('\u{000C}'),
                'v' => value.push('\u{000B}'),
                '0' => value.push('\0'),
                'x' => {
                    let code = self.scan_hex_digits(2)?;
                    value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                'u' => {
                    let code = self.scan_hex_digits(4)?;
                    value.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                '\r' => {
                    self.match_char('\n');
                    self.line += 1;
                    self.column = 1;
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.line += 1;
                    self.column = 1;
                }
                other => value.push(other),
            }
        }
        Ok(Token::String(value))
    }

    fn scan_hex_digits(&mut self, count: usize) -> Result<u32, JsError> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self.peek().to_digit(16).ok_or_else(|| {
                syntax_error("Invalid hexadecimal escape sequence", Some(self.current_position()))
            })?;
            self.advance();
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn scan_number(&mut self, first: char) -> Result<Token, JsError> {
        if first == '0' && matches!(self.peek(), 'x' | 'X') {
            self.advance();
            let mut digits = String::new();
            while self.peek().is_ascii_hexdigit() {
                digits.push(self.advance());
            }
            if digits.is_empty() {
                return Err(syntax_error(
                    "Invalid hexadecimal literal",
                    Some(self.token_start.clone()),
                ));
            }
            let value = digits
                .chars()
                .filter_map(|c| c.to_digit(16))
                .fold(0.0, |acc, d| acc * 16.0 + d as f64);
            return self.finish_number(value);
        }

        let mut text = String::new();
        text.push(first);
        if first != '.' {
            while self.peek().is_ascii_digit() {
                text.push(self.advance());
            }
            if self.peek() == '.' {
                text.push(self.advance());
            }
        }
        while self.peek().is_ascii_digit() {
            text.push(self.advance());
        }
        if matches!(self.peek(), 'e' | 'E') {
            let sign = self.peek_next();
            let digit_after_sign = self.chars.get(self.position + 2).copied();
            let has_exponent = match sign {
                Some('+') | Some('-') => digit_after_sign.is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if has_exponent {
                text.push(self.advance());
                if matches!(self.peek(), '+' | '-') {
                    text.push(self.advance());
                }
                while self.peek().is_ascii_digit() {
                    text.push(self.advance());
                }
            }
        }
        let value: f64 = text.parse().map_err(|_| {
            syntax_error(
                format!("Invalid numeric literal '{}'", text),
                Some(self.token_start.clone()),
            )
        })?;
        self.finish_number(value)
    }

    fn finish_number(&mut self, value: f64) -> Result<Token, JsError> {
        if is_id_start(self.peek()) {
            return Err(syntax_error(
                "Identifier starts immediately after numeric literal",
                Some(self.current_position()),
            ));
        }
        Ok(Token::Number(value))
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut name = String::new();
        name.push(first);
        while is_id_continue(self.peek()) {
            name.push(self.advance());
        }
        match Keyword::from_word(&name) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Identifier(name),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), JsError> {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\t' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}' => {
                    self.advance();
                }
                '\r' => {
                    self.advance();
                    self.match_char('\n');
                    self.new_line();
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    self.advance();
                    self.new_line();
                }
                '/' if self.peek_next() == Some('/') => {
                    while !self.is_at_end() && !is_line_terminator(self.peek()) {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == Some('*') => {
                    let start = self.current_position();
                    self.advance();
                    self.advance();
                    loop {
                        if self.is_at_end() {
                            return Err(syntax_error("Unterminated multi-line comment", Some(start)));
                        }
                        if self.peek() == '*' && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        let c = self.advance();
                        if c == '\r' {
                            self.match_char('\n');
                            self.new_line();
                        } else if is_line_terminator(c) {
                            self.new_line();
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.column = 1;
        self.line_terminator_before_token = true;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars.get(self.position).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.peek();
        self.position += 1;
        self.column += 1;
        ch
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.position] != expected {
            false
        } else {
            self.position += 1;
            self.column += 1;
            true
        }
    }

    fn current_position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column, self.position)
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit() || c.is_alphanumeric()
}
