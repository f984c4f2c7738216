//! Abstract Syntax Tree node definitions

use core_types::SourcePosition;
use std::rc::Rc;

/// A parsed script.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements
    pub body: Vec<Statement>,
}

/// A function literal: declaration or expression.
///
/// Shared behind `Rc` so the interpreter can keep compiled bodies alive
/// independently of the program they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    /// Function name, if any
    pub name: Option<String>,
    /// Parameter names
    pub params: Vec<String>,
    /// Function body
    pub body: Vec<Statement>,
    /// Source location of the `function` keyword
    pub position: Option<SourcePosition>,
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration {
        /// Declaration kind
        kind: VariableKind,
        /// List of declarators
        declarations: Vec<VariableDeclarator>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Function declaration
    FunctionDeclaration {
        /// The function
        function: Rc<FunctionNode>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Expression statement
    ExpressionStatement {
        /// The expression
        expression: Expression,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Return statement
    ReturnStatement {
        /// Return value
        argument: Option<Expression>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// If statement
    IfStatement {
        /// Condition
        test: Expression,
        /// Consequent
        consequent: Box<Statement>,
        /// Alternate
        alternate: Option<Box<Statement>>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// While loop
    WhileStatement {
        /// Loop condition
        test: Expression,
        /// Loop body
        body: Box<Statement>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Do-while loop
    DoWhileStatement {
        /// Loop body
        body: Box<Statement>,
        /// Loop condition
        test: Expression,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// For loop
    ForStatement {
        /// Initialization
        init: Option<ForInit>,
        /// Condition
        test: Option<Expression>,
        /// Update expression
        update: Option<Expression>,
        /// Loop body
        body: Box<Statement>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// For...in loop
    ForInStatement {
        /// Loop variable
        left: ForInLeft,
        /// Object to enumerate
        right: Expression,
        /// Loop body
        body: Box<Statement>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Block statement
    BlockStatement {
        /// Block body
        body: Vec<Statement>,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Empty statement (`;`)
    EmptyStatement {
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Break statement
    BreakStatement {
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Continue statement
    ContinueStatement {
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Throw statement
    ThrowStatement {
        /// Thrown value
        argument: Expression,
        /// Source location
        position: Option<SourcePosition>,
    },

    /// Try statement
    TryStatement {
        /// Protected block
        block: Vec<Statement>,
        /// Catch clause
        handler: Option<CatchClause>,
        /// Finally block
        finalizer: Option<Vec<Statement>>,
        /// Source location
        position: Option<SourcePosition>,
    },
}

impl Statement {
    /// Source location of the statement.
    pub fn position(&self) -> Option<&SourcePosition> {
        match self {
            Statement::VariableDeclaration { position, .. }
            | Statement::FunctionDeclaration { position, .. }
            | Statement::ExpressionStatement { position, .. }
            | Statement::ReturnStatement { position, .. }
            | Statement::IfStatement { position, .. }
            | Statement::WhileStatement { position, .. }
            | Statement::DoWhileStatement { position, .. }
            | Statement::ForStatement { position, .. }
            | Statement::ForInStatement { position, .. }
            | Statement::BlockStatement { position, .. }
            | Statement::EmptyStatement { position }
            | Statement::BreakStatement { position }
            | Statement::ContinueStatement { position }
            | Statement::ThrowStatement { position, .. }
            | Statement::TryStatement { position, .. } => position.as_ref(),
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Identifier reference
    Identifier(String),

    /// Literal value
    Literal(Literal),

    /// Array literal; `None` marks an elision
    ArrayExpression(Vec<Option<Expression>>),

    /// Object literal
    ObjectExpression(Vec<ObjectProperty>),

    /// Function expression
    FunctionExpression(Rc<FunctionNode>),

    /// Unary operation
    UnaryExpression {
        /// Operator
        operator: UnaryOperator,
        /// Operand
        argument: Box<Expression>,
    },

    /// Increment or decrement
    UpdateExpression {
        /// Operator
        operator: UpdateOperator,
        /// Prefix (`++x`) or postfix (`x++`)
        prefix: bool,
        /// Target
        argument: Box<Expression>,
    },

    /// Binary operation
    BinaryExpression {
        /// Left operand
        left: Box<Expression>,
        /// Operator
        operator: BinaryOperator,
        /// Right operand
        right: Box<Expression>,
    },

    /// Short-circuiting operation
    LogicalExpression {
        /// Left operand
        left: Box<Expression>,
        /// Operator
        operator: LogicalOperator,
        /// Right operand
        right: Box<Expression>,
    },

    /// Assignment
    AssignmentExpression {
        /// Operator
        operator: AssignmentOperator,
        /// Target (identifier or member expression)
        left: Box<Expression>,
        /// Assigned value
        right: Box<Expression>,
    },

    /// `test ? consequent : alternate`
    ConditionalExpression {
        /// Condition
        test: Box<Expression>,
        /// Value if true
        consequent: Box<Expression>,
        /// Value if false
        alternate: Box<Expression>,
    },

    /// Function call
    CallExpression {
        /// Callee
        callee: Box<Expression>,
        /// Arguments
        arguments: Vec<Expression>,
    },

    /// `new` expression
    NewExpression {
        /// Constructor
        callee: Box<Expression>,
        /// Arguments
        arguments: Vec<Expression>,
    },

    /// Property access
    MemberExpression {
        /// Object
        object: Box<Expression>,
        /// Property (identifier name as a string literal when not computed)
        property: Box<Expression>,
        /// `obj[prop]` rather than `obj.prop`
        computed: bool,
    },

    /// `this`
    ThisExpression,

    /// Comma-separated expressions
    SequenceExpression(Vec<Expression>),
}

/// Variable declaration kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

/// One `name = init` in a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// Bound name
    pub name: String,
    /// Initializer
    pub init: Option<Expression>,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Boolean
    Boolean(bool),
    /// `null`
    Null,
}

/// Object literal member
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    /// Property name
    pub key: String,
    /// Value, or the accessor function for getters/setters
    pub value: Expression,
    /// Plain value or accessor
    pub kind: PropertyKind,
}

/// Kind of object literal member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// `key: value`
    Init,
    /// `get key() {}`
    Get,
    /// `set key(v) {}`
    Set,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Sub,
    /// *
    Mul,
    /// /
    Div,
    /// %
    Mod,
    /// ==
    Eq,
    /// !=
    NotEq,
    /// ===
    StrictEq,
    /// !==
    StrictNotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// &
    BitwiseAnd,
    /// |
    BitwiseOr,
    /// ^
    BitwiseXor,
    /// <<
    LeftShift,
    /// >>
    RightShift,
    /// >>>
    UnsignedRightShift,
    /// instanceof
    Instanceof,
    /// in
    In,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// Update operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// +=
    AddAssign,
    /// -=
    SubAssign,
    /// *=
    MulAssign,
    /// /=
    DivAssign,
    /// %=
    ModAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Sub),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Mul),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Div),
            AssignmentOperator::ModAssign => Some(BinaryOperator::Mod),
        }
    }
}

/// For loop initializer
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// Variable declaration
    VariableDeclaration {
        /// Declaration kind
        kind: VariableKind,
        /// Declarators
        declarations: Vec<VariableDeclarator>,
    },
    /// Expression
    Expression(Expression),
}

/// Left side of a for...in loop
#[derive(Debug, Clone, PartialEq)]
pub enum ForInLeft {
    /// `for (var x in ...)`
    Declaration {
        /// Declaration kind
        kind: VariableKind,
        /// Bound name
        name: String,
    },
    /// `for (x in ...)` or `for (o.p in ...)`
    Target(Expression),
}

/// Catch clause
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Bound exception name
    pub param: String,
    /// Handler body
    pub body: Vec<Statement>,
}
