//! The syntax tree handed from the parser to the lowering engine. Every node
//! owns its children outright and is never mutated after construction.

use super::{SourceFile, intern::InternedSymbol};
use crate::frontend::lexer::Span;

#[derive(Debug)]
pub struct Module<'source> {
    pub source_file: &'source SourceFile,
    /// Top level items in program order
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub struct Item {
    pub span: Span,
    pub kind: ItemKind,
}

#[derive(Debug)]
pub enum ItemKind {
    /// `extern name(a, b)`
    Prototype(Box<FunctionPrototype>),
    /// `def name(a, b) body end`
    Function(Box<Function>),
    /// A bare expression evaluated in the implicit entry function
    TopLevelExpression(Box<Expression>),
}

#[derive(Debug)]
pub struct FunctionPrototype {
    pub span: Span,
    pub name: Identifier,
    pub parameters: Vec<Identifier>,
}

#[derive(Debug)]
pub struct Function {
    pub span: Span,
    pub prototype: FunctionPrototype,
    pub body: Expression,
}

#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    pub span: Span,
    pub symbol: InternedSymbol,
}

#[derive(Debug)]
pub struct Expression {
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    IntegerConstant(i32),
    Binary {
        lhs: Box<Expression>,
        operator: ArithmeticOperator,
        rhs: Box<Expression>,
    },
    Comparison {
        lhs: Box<Expression>,
        operator: ComparisonOperator,
        rhs: Box<Expression>,
    },
    Variable(Identifier),
    Assignment {
        target: Identifier,
        value: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        /// An empty arm evaluates to 0
        positive: Vec<Expression>,
        negative: Vec<Expression>,
    },
    For {
        initializer: Box<Expression>,
        condition: Box<Expression>,
        step: Box<Expression>,
        body: Vec<Expression>,
    },
    FunctionCall {
        callee: Identifier,
        arguments: Vec<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ArithmeticOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ComparisonOperator {
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
}
