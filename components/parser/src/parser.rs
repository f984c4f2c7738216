//! Recursive descent parser

use crate::ast::*;
use crate::error::*;
use crate::lexer::{Keyword, Lexer, Punctuator, Token};
use core_types::{JsError, SourcePosition};
use std::rc::Rc;

/// Parser for script source.
///
/// # Examples
///
/// ```
/// use parser::{Parser, Statement};
///
/// let program = Parser::new("var x = 1 + 2;").parse().unwrap();
/// assert_eq!(program.body.len(), 1);
/// assert!(matches!(program.body[0], Statement::VariableDeclaration { .. }));
/// ```
pub struct Parser {
    lexer: Lexer,
    /// Track loop depth for break/continue validation
    loop_depth: usize,
    /// Track function depth for return validation
    function_depth: usize,
    /// Inside a for loop head, where `in` ends the initializer
    in_for_init: bool,
}

impl Parser {
    /// Create a new parser for the given source code
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
            loop_depth: 0,
            function_depth: 0,
            in_for_init: false,
        }
    }

    /// Parse the whole source as a program.
    pub fn parse(&mut self) -> Result<Program, JsError> {
        let mut body = Vec::new();
        while !self.is_at_end()? {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    /// Parse a function body (statements up to end of input) with
    /// `return` allowed, for functions compiled from source text.
    pub fn parse_function_body_source(&mut self) -> Result<Vec<Statement>, JsError> {
        self.function_depth += 1;
        let mut body = Vec::new();
        while !self.is_at_end()? {
            body.push(self.parse_statement()?);
        }
        self.function_depth -= 1;
        Ok(body)
    }

    fn is_at_end(&mut self) -> Result<bool, JsError> {
        Ok(matches!(self.lexer.peek_token()?, Token::EOF))
    }

    fn peek_position(&mut self) -> Result<SourcePosition, JsError> {
        self.lexer.peek_token()?;
        Ok(self.lexer.token_position())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        let position = self.peek_position()?;
        let token = self.lexer.peek_token()?.clone();
        match token {
            Token::Keyword(Keyword::Var) | Token::Keyword(Keyword::Let) | Token::Keyword(Keyword::Const) => {
                self.parse_variable_declaration(position)
            }
            Token::Keyword(Keyword::Function) => {
                let function = self.parse_function(true)?;
                Ok(Statement::FunctionDeclaration {
                    function,
                    position: Some(position),
                })
            }
            Token::Keyword(Keyword::Return) => self.parse_return_statement(position),
            Token::Keyword(Keyword::If) => self.parse_if_statement(position),
            Token::Keyword(Keyword::While) => self.parse_while_statement(position),
            Token::Keyword(Keyword::Do) => self.parse_do_while_statement(position),
            Token::Keyword(Keyword::For) => self.parse_for_statement(position),
            Token::Keyword(Keyword::Break) => self.parse_break_statement(position),
            Token::Keyword(Keyword::Continue) => self.parse_continue_statement(position),
            Token::Keyword(Keyword::Throw) => self.parse_throw_statement(position),
            Token::Keyword(Keyword::Try) => self.parse_try_statement(position),
            Token::Punctuator(Punctuator::LBrace) => {
                let body = self.parse_block_body()?;
                Ok(Statement::BlockStatement {
                    body,
                    position: Some(position),
                })
            }
            Token::Punctuator(Punctuator::Semicolon) => {
                self.lexer.next_token()?;
                Ok(Statement::EmptyStatement {
                    position: Some(position),
                })
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::ExpressionStatement {
                    expression,
                    position: Some(position),
                })
            }
        }
    }

    fn parse_variable_kind(&mut self) -> Result<VariableKind, JsError> {
        match self.lexer.next_token()? {
            Token::Keyword(Keyword::Var) => Ok(VariableKind::Var),
            Token::Keyword(Keyword::Let) => Ok(VariableKind::Let),
            Token::Keyword(Keyword::Const) => Ok(VariableKind::Const),
            other => Err(unexpected_token(
                "declaration",
                &describe_token(&other),
                Some(self.lexer.token_position()),
            )),
        }
    }

    fn parse_variable_declaration(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        let kind = self.parse_variable_kind()?;
        let first = self.expect_identifier()?;
        let declarations = self.parse_declarators_from(kind, first)?;
        self.consume_semicolon()?;
        Ok(Statement::VariableDeclaration {
            kind,
            declarations,
            position: Some(position),
        })
    }

    /// Parse declarators after the first bound name has been read.
    fn parse_declarators_from(
        &mut self,
        kind: VariableKind,
        first: String,
    ) -> Result<Vec<VariableDeclarator>, JsError> {
        let mut declarations = Vec::new();
        let mut name = first;
        loop {
            let init = if self.check_punctuator(Punctuator::Assign)? {
                self.lexer.next_token()?;
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            if kind == VariableKind::Const && init.is_none() {
                return Err(syntax_error(
                    "Missing initializer in const declaration",
                    Some(self.lexer.token_position()),
                ));
            }
            declarations.push(VariableDeclarator { name, init });
            if !self.check_punctuator(Punctuator::Comma)? {
                break;
            }
            self.lexer.next_token()?;
            name = self.expect_identifier()?;
        }
        Ok(declarations)
    }

    fn parse_return_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Return)?;
        if self.function_depth == 0 {
            return Err(syntax_error("Illegal return statement", Some(position)));
        }

        // Restricted production: a line break after `return` ends the statement
        let argument = if self.check_punctuator(Punctuator::Semicolon)?
            || self.check_punctuator(Punctuator::RBrace)?
            || self.is_at_end()?
            || self.lexer.line_terminator_before_token
        {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.consume_semicolon()?;
        Ok(Statement::ReturnStatement {
            argument,
            position: Some(position),
        })
    }

    fn parse_if_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::If)?;
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;

        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check_keyword(Keyword::Else)? {
            self.lexer.next_token()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::IfStatement {
            test,
            consequent,
            alternate,
            position: Some(position),
        })
    }

    fn parse_loop_body(&mut self) -> Result<Box<Statement>, JsError> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::While)?;
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::WhileStatement {
            test,
            body,
            position: Some(position),
        })
    }

    fn parse_do_while_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Do)?;
        let body = self.parse_loop_body()?;
        self.expect_keyword(Keyword::While)?;
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        // A semicolon is always inserted after the closing parenthesis
        if self.check_punctuator(Punctuator::Semicolon)? {
            self.lexer.next_token()?;
        }
        Ok(Statement::DoWhileStatement {
            body,
            test,
            position: Some(position),
        })
    }

    fn parse_for_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::For)?;
        self.expect_punctuator(Punctuator::LParen)?;

        let init = if self.check_punctuator(Punctuator::Semicolon)? {
            None
        } else if self.check_keyword(Keyword::Var)?
            || self.check_keyword(Keyword::Let)?
            || self.check_keyword(Keyword::Const)?
        {
            let kind = self.parse_variable_kind()?;
            let name = self.expect_identifier()?;
            if self.check_keyword(Keyword::In)? {
                self.lexer.next_token()?;
                return self.finish_for_in(ForInLeft::Declaration { kind, name }, position);
            }
            self.in_for_init = true;
            let declarations = self.parse_declarators_from(kind, name);
            self.in_for_init = false;
            Some(ForInit::VariableDeclaration {
                kind,
                declarations: declarations?,
            })
        } else {
            self.in_for_init = true;
            let expression = self.parse_expression();
            self.in_for_init = false;
            let expression = expression?;
            if self.check_keyword(Keyword::In)? {
                if !is_assignment_target(&expression) {
                    return Err(syntax_error(
                        "Invalid left-hand side in for-in loop",
                        Some(position),
                    ));
                }
                self.lexer.next_token()?;
                return self.finish_for_in(ForInLeft::Target(expression), position);
            }
            Some(ForInit::Expression(expression))
        };

        self.expect_punctuator(Punctuator::Semicolon)?;
        let test = if self.check_punctuator(Punctuator::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punctuator(Punctuator::Semicolon)?;
        let update = if self.check_punctuator(Punctuator::RParen)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punctuator(Punctuator::RParen)?;
        let body = self.parse_loop_body()?;

        Ok(Statement::ForStatement {
            init,
            test,
            update,
            body,
            position: Some(position),
        })
    }

    fn finish_for_in(&mut self, left: ForInLeft, position: SourcePosition) -> Result<Statement, JsError> {
        let right = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::ForInStatement {
            left,
            right,
            body,
            position: Some(position),
        })
    }

    fn parse_break_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Break)?;
        if self.loop_depth == 0 {
            return Err(syntax_error("Illegal break statement", Some(position)));
        }
        self.consume_semicolon()?;
        Ok(Statement::BreakStatement {
            position: Some(position),
        })
    }

    fn parse_continue_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Continue)?;
        if self.loop_depth == 0 {
            return Err(syntax_error("Illegal continue statement", Some(position)));
        }
        self.consume_semicolon()?;
        Ok(Statement::ContinueStatement {
            position: Some(position),
        })
    }

    fn parse_throw_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Throw)?;
        self.lexer.peek_token()?;
        if self.lexer.line_terminator_before_token {
            return Err(syntax_error("Illegal newline after throw", Some(position)));
        }
        let argument = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::ThrowStatement {
            argument,
            position: Some(position),
        })
    }

    fn parse_try_statement(&mut self, position: SourcePosition) -> Result<Statement, JsError> {
        self.expect_keyword(Keyword::Try)?;
        let block = self.parse_block_body()?;

        let handler = if self.check_keyword(Keyword::Catch)? {
            self.lexer.next_token()?;
            self.expect_punctuator(Punctuator::LParen)?;
            let param = self.expect_identifier()?;
            self.expect_punctuator(Punctuator::RParen)?;
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.check_keyword(Keyword::Finally)? {
            self.lexer.next_token()?;
            Some(self.parse_block_body()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(syntax_error("Missing catch or finally after try", Some(position)));
        }

        Ok(Statement::TryStatement {
            block,
            handler,
            finalizer,
            position: Some(position),
        })
    }

    fn parse_block_body(&mut self) -> Result<Vec<Statement>, JsError> {
        self.expect_punctuator(Punctuator::LBrace)?;
        let mut body = Vec::new();
        while !self.check_punctuator(Punctuator::RBrace)? {
            if self.is_at_end()? {
                return Err(unexpected_eof(Some(self.lexer.token_position())));
            }
            body.push(self.parse_statement()?);
        }
        self.lexer.next_token()?;
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn parse_function(&mut self, require_name: bool) -> Result<Rc<FunctionNode>, JsError> {
        let position = self.peek_position()?;
        self.expect_keyword(Keyword::Function)?;
        let name = if matches!(self.lexer.peek_token()?, Token::Identifier(_)) {
            Some(self.expect_identifier()?)
        } else if require_name {
            return Err(syntax_error("Function statements require a name", Some(position)));
        } else {
            None
        };
        self.parse_function_rest(name, position)
    }

    /// Parameters and body, shared by declarations, expressions and accessors.
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        position: SourcePosition,
    ) -> Result<Rc<FunctionNode>, JsError> {
        self.expect_punctuator(Punctuator::LParen)?;
        let mut params = Vec::new();
        if !self.check_punctuator(Punctuator::RParen)? {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check_punctuator(Punctuator::Comma)? {
                    break;
                }
                self.lexer.next_token()?;
            }
        }
        self.expect_punctuator(Punctuator::RParen)?;

        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let saved_for_init = std::mem::replace(&mut self.in_for_init, false);
        self.function_depth += 1;
        let body = self.parse_block_body();
        self.function_depth -= 1;
        self.loop_depth = saved_loop_depth;
        self.in_for_init = saved_for_init;

        Ok(Rc::new(FunctionNode {
            name,
            params,
            body: body?,
            position: Some(position),
        }))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn with_in_allowed<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        let saved = std::mem::replace(&mut self.in_for_init, false);
        let result = f(self);
        self.in_for_init = saved;
        result
    }

    fn parse_expression(&mut self) -> Result<Expression, JsError> {
        let first = self.parse_assignment_expression()?;
        if !self.check_punctuator(Punctuator::Comma)? {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.check_punctuator(Punctuator::Comma)? {
            self.lexer.next_token()?;
            expressions.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::SequenceExpression(expressions))
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, JsError> {
        let position = self.peek_position()?;
        let left = self.parse_conditional_expression()?;
        if let Some(operator) = self.check_assignment_operator()? {
            if !is_assignment_target(&left) {
                return Err(syntax_error("Invalid left-hand side in assignment", Some(position)));
            }
            self.lexer.next_token()?;
            let right = self.parse_assignment_expression()?;
            return Ok(Expression::AssignmentExpression {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn check_assignment_operator(&mut self) -> Result<Option<AssignmentOperator>, JsError> {
        Ok(match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::Assign) => Some(AssignmentOperator::Assign),
            Token::Punctuator(Punctuator::PlusEq) => Some(AssignmentOperator::AddAssign),
            Token::Punctuator(Punctuator::MinusEq) => Some(AssignmentOperator::SubAssign),
            Token::Punctuator(Punctuator::StarEq) => Some(AssignmentOperator::MulAssign),
            Token::Punctuator(Punctuator::SlashEq) => Some(AssignmentOperator::DivAssign),
            Token::Punctuator(Punctuator::PercentEq) => Some(AssignmentOperator::ModAssign),
            _ => None,
        })
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, JsError> {
        let test = self.parse_logical_or_expression()?;
        if !self.check_punctuator(Punctuator::Question)? {
            return Ok(test);
        }
        self.lexer.next_token()?;
        let consequent = self.with_in_allowed(|p| p.parse_assignment_expression())?;
        self.expect_punctuator(Punctuator::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn parse_logical_or_expression(&mut self) -> Result<Expression, JsError> {
        let mut left = self.parse_logical_and_expression()?;
        while self.check_punctuator(Punctuator::OrOr)? {
            self.lexer.next_token()?;
            let right = self.parse_logical_and_expression()?;
            left = Expression::LogicalExpression {
                left: Box::new(left),
                operator: LogicalOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_logical_and_expression(&mut self) -> Result<Expression, JsError> {
        let mut left = self.parse_binary_expression(0)?;
        while self.check_punctuator(Punctuator::AndAnd)? {
            self.lexer.next_token()?;
            let right = self.parse_binary_expression(0)?;
            left = Expression::LogicalExpression {
                left: Box::new(left),
                operator: LogicalOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Left-associative binary levels, loosest first: `|`, `^`, `&`,
    /// equality, relational, shift, additive, multiplicative.
    fn parse_binary_expression(&mut self, level: usize) -> Result<Expression, JsError> {
        const LEVELS: usize = 8;
        if level == LEVELS {
            return self.parse_unary_expression();
        }
        let mut left = self.parse_binary_expression(level + 1)?;
        while let Some(operator) = self.binary_operator_at(level)? {
            self.lexer.next_token()?;
            let right = self.parse_binary_expression(level + 1)?;
            left = Expression::BinaryExpression {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_operator_at(&mut self, level: usize) -> Result<Option<BinaryOperator>, JsError> {
        let in_for_init = self.in_for_init;
        let token = self.lexer.peek_token()?;
        let operator = match (level, token) {
            (0, Token::Punctuator(Punctuator::Or)) => BinaryOperator::BitwiseOr,
            (1, Token::Punctuator(Punctuator::Xor)) => BinaryOperator::BitwiseXor,
            (2, Token::Punctuator(Punctuator::And)) => BinaryOperator::BitwiseAnd,
            (3, Token::Punctuator(Punctuator::EqEq)) => BinaryOperator::Eq,
            (3, Token::Punctuator(Punctuator::NotEq)) => BinaryOperator::NotEq,
            (3, Token::Punctuator(Punctuator::EqEqEq)) => BinaryOperator::StrictEq,
            (3, Token::Punctuator(Punctuator::NotEqEq)) => BinaryOperator::StrictNotEq,
            (4, Token::Punctuator(Punctuator::Lt)) => BinaryOperator::Lt,
            (4, Token::Punctuator(Punctuator::LtEq)) => BinaryOperator::LtEq,
            (4, Token::Punctuator(Punctuator::Gt)) => BinaryOperator::Gt,
            (4, Token::Punctuator(Punctuator::GtEq)) => BinaryOperator::GtEq,
            (4, Token::Keyword(Keyword::Instanceof)) => BinaryOperator::Instanceof,
            (4, Token::Keyword(Keyword::In)) if !in_for_init => BinaryOperator::In,
            (5, Token::Punctuator(Punctuator::LtLt)) => BinaryOperator::LeftShift,
            (5, Token::Punctuator(Punctuator::GtGt)) => BinaryOperator::RightShift,
            (5, Token::Punctuator(Punctuator::GtGtGt)) => BinaryOperator::UnsignedRightShift,
            (6, Token::Punctuator(Punctuator::Plus)) => BinaryOperator::Add,
            (6, Token::Punctuator(Punctuator::Minus)) => BinaryOperator::Sub,
            (7, Token::Punctuator(Punctuator::Star)) => BinaryOperator::Mul,
            (7, Token::Punctuator(Punctuator::Slash)) => BinaryOperator::Div,
            (7, Token::Punctuator(Punctuator::Percent)) => BinaryOperator::Mod,
            _ => return Ok(None),
        };
        Ok(Some(operator))
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, JsError> {
        let position = self.peek_position()?;
        let operator = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::Minus) => Some(UnaryOperator::Minus),
            Token::Punctuator(Punctuator::Plus) => Some(UnaryOperator::Plus),
            Token::Punctuator(Punctuator::Not) => Some(UnaryOperator::Not),
            Token::Punctuator(Punctuator::Tilde) => Some(UnaryOperator::BitwiseNot),
            Token::Keyword(Keyword::Typeof) => Some(UnaryOperator::Typeof),
            Token::Keyword(Keyword::Void) => Some(UnaryOperator::Void),
            Token::Keyword(Keyword::Delete) => Some(UnaryOperator::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.lexer.next_token()?;
            let argument = self.parse_unary_expression()?;
            return Ok(Expression::UnaryExpression {
                operator,
                argument: Box::new(argument),
            });
        }

        let update = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::PlusPlus) => Some(UpdateOperator::Increment),
            Token::Punctuator(Punctuator::MinusMinus) => Some(UpdateOperator::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.lexer.next_token()?;
            let argument = self.parse_unary_expression()?;
            if !is_assignment_target(&argument) {
                return Err(syntax_error(
                    "Invalid left-hand side expression in prefix operation",
                    Some(position),
                ));
            }
            return Ok(Expression::UpdateExpression {
                operator,
                prefix: true,
                argument: Box::new(argument),
            });
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, JsError> {
        let position = self.peek_position()?;
        let expression = self.parse_call_expression()?;
        let operator = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::PlusPlus) => UpdateOperator::Increment,
            Token::Punctuator(Punctuator::MinusMinus) => UpdateOperator::Decrement,
            _ => return Ok(expression),
        };
        // No line terminator is allowed between the operand and a postfix operator
        if self.lexer.line_terminator_before_token {
            return Ok(expression);
        }
        if !is_assignment_target(&expression) {
            return Err(syntax_error(
                "Invalid left-hand side expression in postfix operation",
                Some(position),
            ));
        }
        self.lexer.next_token()?;
        Ok(Expression::UpdateExpression {
            operator,
            prefix: false,
            argument: Box::new(expression),
        })
    }

    fn parse_call_expression(&mut self) -> Result<Expression, JsError> {
        let mut expression = if self.check_keyword(Keyword::New)? {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        loop {
            if self.check_punctuator(Punctuator::LParen)? {
                let arguments = self.parse_arguments()?;
                expression = Expression::CallExpression {
                    callee: Box::new(expression),
                    arguments,
                };
            } else if self.check_member_suffix()? {
                expression = self.parse_member_suffix(expression)?;
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_new_expression(&mut self) -> Result<Expression, JsError> {
        self.expect_keyword(Keyword::New)?;
        let mut callee = if self.check_keyword(Keyword::New)? {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        while self.check_member_suffix()? {
            callee = self.parse_member_suffix(callee)?;
        }
        let arguments = if self.check_punctuator(Punctuator::LParen)? {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::NewExpression {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn check_member_suffix(&mut self) -> Result<bool, JsError> {
        Ok(self.check_punctuator(Punctuator::Dot)? || self.check_punctuator(Punctuator::LBracket)?)
    }

    /// Parse `.name` or `[expr]` applied to `object`.
    fn parse_member_suffix(&mut self, object: Expression) -> Result<Expression, JsError> {
        let (property, computed) = if self.check_punctuator(Punctuator::Dot)? {
            self.lexer.next_token()?;
            let name = self.expect_identifier_or_keyword()?;
            (Expression::Literal(Literal::String(name)), false)
        } else {
            self.expect_punctuator(Punctuator::LBracket)?;
            let property = self.with_in_allowed(|p| p.parse_expression())?;
            self.expect_punctuator(Punctuator::RBracket)?;
            (property, true)
        };
        Ok(Expression::MemberExpression {
            object: Box::new(object),
            property: Box::new(property),
            computed,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, JsError> {
        self.expect_punctuator(Punctuator::LParen)?;
        self.with_in_allowed(|p| {
            let mut arguments = Vec::new();
            if !p.check_punctuator(Punctuator::RParen)? {
                loop {
                    arguments.push(p.parse_assignment_expression()?);
                    if !p.check_punctuator(Punctuator::Comma)? {
                        break;
                    }
                    p.lexer.next_token()?;
                }
            }
            p.expect_punctuator(Punctuator::RParen)?;
            Ok(arguments)
        })
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, JsError> {
        let position = self.peek_position()?;
        let token = self.lexer.peek_token()?.clone();
        match token {
            Token::Keyword(Keyword::Function) => {
                return Ok(Expression::FunctionExpression(self.parse_function(false)?));
            }
            Token::Punctuator(Punctuator::LBracket) => return self.parse_array_literal(),
            Token::Punctuator(Punctuator::LBrace) => return self.parse_object_literal(),
            _ => {}
        }

        let token = self.lexer.next_token()?;
        match token {
            Token::Identifier(name) => Ok(Expression::Identifier(name)),
            Token::Number(n) => Ok(Expression::Literal(Literal::Number(n))),
            Token::String(s) => Ok(Expression::Literal(Literal::String(s))),
            Token::Keyword(Keyword::True) => Ok(Expression::Literal(Literal::Boolean(true))),
            Token::Keyword(Keyword::False) => Ok(Expression::Literal(Literal::Boolean(false))),
            Token::Keyword(Keyword::Null) => Ok(Expression::Literal(Literal::Null)),
            Token::Keyword(Keyword::This) => Ok(Expression::ThisExpression),
            Token::Punctuator(Punctuator::LParen) => {
                let expression = self.with_in_allowed(|p| p.parse_expression())?;
                self.expect_punctuator(Punctuator::RParen)?;
                Ok(expression)
            }
            Token::EOF => Err(unexpected_eof(Some(position))),
            other => Err(syntax_error(
                format!("Unexpected {}", describe_token(&other)),
                Some(position),
            )),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        self.expect_punctuator(Punctuator::LBracket)?;
        self.with_in_allowed(|p| {
            let mut elements = Vec::new();
            loop {
                if p.check_punctuator(Punctuator::RBracket)? {
                    break;
                }
                if p.check_punctuator(Punctuator::Comma)? {
                    p.lexer.next_token()?;
                    elements.push(None);
                    continue;
                }
                elements.push(Some(p.parse_assignment_expression()?));
                if !p.check_punctuator(Punctuator::RBracket)? {
                    p.expect_punctuator(Punctuator::Comma)?;
                }
            }
            p.expect_punctuator(Punctuator::RBracket)?;
            Ok(Expression::ArrayExpression(elements))
        })
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        self.expect_punctuator(Punctuator::LBrace)?;
        self.with_in_allowed(|p| {
            let mut properties = Vec::new();
            while !p.check_punctuator(Punctuator::RBrace)? {
                properties.push(p.parse_object_property()?);
                if !p.check_punctuator(Punctuator::RBrace)? {
                    p.expect_punctuator(Punctuator::Comma)?;
                }
            }
            p.expect_punctuator(Punctuator::RBrace)?;
            Ok(Expression::ObjectExpression(properties))
        })
    }

    fn parse_object_property(&mut self) -> Result<ObjectProperty, JsError> {
        let position = self.peek_position()?;
        let key = self.parse_property_name()?;

        if (key == "get" || key == "set")
            && !self.check_punctuator(Punctuator::Colon)?
            && !self.check_punctuator(Punctuator::Comma)?
            && !self.check_punctuator(Punctuator::RBrace)?
        {
            let kind = if key == "get" { PropertyKind::Get } else { PropertyKind::Set };
            let name = self.parse_property_name()?;
            let function = self.parse_function_rest(Some(name.clone()), position)?;
            let expected = if kind == PropertyKind::Get { 0 } else { 1 };
            if function.params.len() != expected {
                return Err(syntax_error(
                    format!("Accessor '{}' has the wrong number of parameters", name),
                    function.position.clone(),
                ));
            }
            return Ok(ObjectProperty {
                key: name,
                value: Expression::FunctionExpression(function),
                kind,
            });
        }

        self.expect_punctuator(Punctuator::Colon)?;
        let value = self.parse_assignment_expression()?;
        Ok(ObjectProperty {
            key,
            value,
            kind: PropertyKind::Init,
        })
    }

    fn parse_property_name(&mut self) -> Result<String, JsError> {
        let token = self.lexer.next_token()?;
        match token {
            Token::Identifier(name) | Token::String(name) => Ok(name),
            Token::Keyword(keyword) => Ok(keyword.as_str().to_string()),
            Token::Number(n) => Ok(number_key(n)),
            other => Err(unexpected_token(
                "property name",
                &describe_token(&other),
                Some(self.lexer.token_position()),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn check_punctuator(&mut self, p: Punctuator) -> Result<bool, JsError> {
        Ok(matches!(self.lexer.peek_token()?, Token::Punctuator(x) if *x == p))
    }

    fn check_keyword(&mut self, k: Keyword) -> Result<bool, JsError> {
        Ok(matches!(self.lexer.peek_token()?, Token::Keyword(x) if *x == k))
    }

    fn expect_punctuator(&mut self, p: Punctuator) -> Result<(), JsError> {
        let token = self.lexer.next_token()?;
        if token == Token::Punctuator(p) {
            return Ok(());
        }
        Err(self.expected(&format!("{:?}", p), &token))
    }

    fn expect_keyword(&mut self, k: Keyword) -> Result<(), JsError> {
        let token = self.lexer.next_token()?;
        if token == Token::Keyword(k) {
            return Ok(());
        }
        Err(self.expected(k.as_str(), &token))
    }

    fn expect_identifier(&mut self) -> Result<String, JsError> {
        let token = self.lexer.next_token()?;
        match token {
            Token::Identifier(name) => Ok(name),
            other => Err(self.expected("identifier", &other)),
        }
    }

    fn expect_identifier_or_keyword(&mut self) -> Result<String, JsError> {
        let token = self.lexer.next_token()?;
        match token {
            Token::Identifier(name) => Ok(name),
            Token::Keyword(keyword) => Ok(keyword.as_str().to_string()),
            other => Err(self.expected("property name", &other)),
        }
    }

    fn expected(&self, expected: &str, got: &Token) -> JsError {
        let position = Some(self.lexer.token_position());
        if *got == Token::EOF {
            unexpected_eof(position)
        } else {
            unexpected_token(expected, &describe_token(got), position)
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), JsError> {
        if self.check_punctuator(Punctuator::Semicolon)? {
            self.lexer.next_token()?;
            return Ok(());
        }
        if self.lexer.line_terminator_before_token
            || self.is_at_end()?
            || self.check_punctuator(Punctuator::RBrace)?
        {
            return Ok(());
        }
        let token = self.lexer.peek_token()?.clone();
        Err(syntax_error(
            format!("Unexpected {}", describe_token(&token)),
            Some(self.lexer.token_position()),
        ))
    }
}

fn is_assignment_target(expression: &Expression) -> bool {
    matches!(
        expression,
        Expression::Identifier(_) | Expression::MemberExpression { .. }
    )
}

fn number_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn describe_token(token: &Token) -> String {
    match token {
        Token::Identifier(name) => format!("identifier '{}'", name),
        Token::Number(n) => format!("number {}", n),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Keyword(k) => format!("keyword '{}'", k.as_str()),
        Token::Punctuator(p) => format!("token {:?}", p),
        Token::EOF => "end of input".to_string(),
    }
}
