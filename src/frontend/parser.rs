use thiserror::Error;

use super::{
    ast::{Item, ItemKind},
    intern::InternedSymbol,
};
use crate::frontend::{
    SourceFile,
    ast::{
        ArithmeticOperator, ComparisonOperator, Expression, ExpressionKind, Function,
        FunctionPrototype, Identifier, Module,
    },
    lexer::{Keyword, Lexer, Span, Token, TokenKind},
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected character `{character}`")]
    UnexpectedCharacter { character: char, span: Span },
    #[error("expected {expected} but found `{found}`")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("expected {expected} but reached end of file")]
    UnexpectedEof { expected: String, span: Span },
    #[error("integer literal `{literal}` does not fit in 32 bits")]
    IntegerOutOfRange { literal: String, span: Span },
    #[error("only variables can be assigned to")]
    InvalidAssignmentTarget { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedCharacter { span, .. }
            | Self::UnexpectedToken { span, .. }
            | Self::UnexpectedEof { span, .. }
            | Self::IntegerOutOfRange { span, .. }
            | Self::InvalidAssignmentTarget { span } => *span,
        }
    }
}

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
}

impl<'source> Parser<'source> {
    pub fn parse_module(source_file: &'source SourceFile) -> Result<Module<'source>, ParseError> {
        let mut parser = Self {
            lexer: Lexer::new(source_file),
        };

        let mut module = Module {
            source_file,
            items: Vec::new(),
        };

        loop {
            parser.skip_separators()?;

            if parser.lexer.peek()?.is_none() {
                break;
            }

            module.items.push(parser.parse_module_item()?);
        }

        Ok(module)
    }

    fn unexpected(&self, token: Token, expected: impl Into<String>) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: self.lexer.source().value_of_span(token.span).to_owned(),
            span: token.span,
        }
    }

    fn expect_peek(&mut self, expecting: &str) -> Result<Token, ParseError> {
        match self.lexer.peek()? {
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEof {
                expected: expecting.to_owned(),
                span: self.lexer.eof_span(),
            }),
        }
    }

    fn expect_next(&mut self, expecting: &str) -> Result<Token, ParseError> {
        match self.lexer.next()? {
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEof {
                expected: expecting.to_owned(),
                span: self.lexer.eof_span(),
            }),
        }
    }

    fn expect_next_to_be(&mut self, kind: TokenKind, expecting: &str) -> Result<Token, ParseError> {
        let token = self.expect_next(expecting)?;

        if token.kind != kind {
            return Err(self.unexpected(token, expecting));
        }

        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, ParseError> {
        self.expect_next_to_be(TokenKind::Keyword(keyword), &format!("`{keyword}`"))
    }

    fn next_is(&mut self, kind: TokenKind) -> Result<bool, ParseError> {
        Ok(self.lexer.peek()?.is_some_and(|t| t.kind == kind))
    }

    /// Consumes the next token only if it has the given kind
    fn eat(&mut self, kind: TokenKind) -> Result<Option<Token>, ParseError> {
        if self.next_is(kind)? {
            return self.lexer.next();
        }

        Ok(None)
    }

    fn skip_separators(&mut self) -> Result<(), ParseError> {
        while self.eat(TokenKind::Semicolon)?.is_some() {}

        Ok(())
    }

    fn parse_module_item(&mut self) -> Result<Item, ParseError> {
        let peeked = self.expect_peek("module item")?;

        match peeked.kind {
            TokenKind::Keyword(Keyword::Def) => {
                let function = self.parse_function_definition()?;

                Ok(Item {
                    span: function.span,
                    kind: ItemKind::Function(Box::new(function)),
                })
            }
            TokenKind::Keyword(Keyword::Extern) => {
                let extern_keyword = self.expect_keyword(Keyword::Extern)?;
                let prototype = self.parse_function_prototype()?;

                Ok(Item {
                    span: extern_keyword.span.to(prototype.span),
                    kind: ItemKind::Prototype(Box::new(prototype)),
                })
            }
            _ => {
                let expression = self.parse_expression()?;

                Ok(Item {
                    span: expression.span,
                    kind: ItemKind::TopLevelExpression(Box::new(expression)),
                })
            }
        }
    }

    /// def name(a, b) body end
    fn parse_function_definition(&mut self) -> Result<Function, ParseError> {
        let def_keyword = self.expect_keyword(Keyword::Def)?;

        let prototype = self.parse_function_prototype()?;
        let body = self.parse_expression()?;

        self.skip_separators()?;
        let end_keyword = self.expect_keyword(Keyword::End)?;

        Ok(Function {
            span: def_keyword.span.to(end_keyword.span),
            prototype,
            body,
        })
    }

    /// name(a, b)
    fn parse_function_prototype(&mut self) -> Result<FunctionPrototype, ParseError> {
        let name = self.parse_identifier()?;
        let mut parameters = Vec::new();

        self.expect_next_to_be(TokenKind::OpenParen, "`(`")?;

        // If the next token is not a closing paren then there MUST be at
        // least one parameter
        if !self.next_is(TokenKind::CloseParen)? {
            parameters.push(self.parse_identifier()?);

            while self.eat(TokenKind::Comma)?.is_some() {
                parameters.push(self.parse_identifier()?);
            }
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

        Ok(FunctionPrototype {
            span: name.span.to(close_paren.span),
            name,
            parameters,
        })
    }

    fn parse_identifier(&mut self) -> Result<Identifier, ParseError> {
        let token = self.expect_next_to_be(TokenKind::Identifier, "identifier")?;

        Ok(Identifier {
            span: token.span,
            symbol: InternedSymbol::new(self.lexer.source().value_of_span(token.span)),
        })
    }

    /// Parses expressions until one of `terminators` is the next token. The
    /// terminator itself is left in the stream.
    fn parse_sequence(&mut self, terminators: &[Keyword]) -> Result<Vec<Expression>, ParseError> {
        let mut expressions = Vec::new();

        loop {
            self.skip_separators()?;

            let peeked = self.expect_peek("`end`")?;

            if let TokenKind::Keyword(keyword) = peeked.kind
                && terminators.contains(&keyword)
            {
                return Ok(expressions);
            }

            expressions.push(self.parse_expression()?);
        }
    }

    /// expression     -> assignment
    /// assignment     -> IDENTIFIER "=" assignment | comparison
    /// comparison     -> term ( ( ">" | "<" | "==" | ">=" | "<=" ) term )?
    /// term           -> factor ( ( "+" | "-" ) factor )*
    /// factor         -> atom ( "*" atom )*
    /// atom           -> INTEGER | "-" INTEGER | IDENTIFIER | call
    ///                   | "(" expression ")" | if | for
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, ParseError> {
        let expression = self.parse_comparison_expression()?;

        let Some(equals) = self.eat(TokenKind::Equals)? else {
            return Ok(expression);
        };

        let span = expression.span;
        let ExpressionKind::Variable(target) = expression.kind else {
            return Err(ParseError::InvalidAssignmentTarget { span: equals.span });
        };

        // Assignment is right associative so `a = b = 1` assigns both
        let value = self.parse_assignment_expression()?;

        Ok(Expression {
            span: span.to(value.span),
            kind: ExpressionKind::Assignment {
                target,
                value: Box::new(value),
            },
        })
    }

    fn parse_comparison_expression(&mut self) -> Result<Expression, ParseError> {
        let lhs = self.parse_term_expression()?;

        let Some(peeked) = self.lexer.peek()? else {
            return Ok(lhs);
        };

        if !peeked.kind.is_comparison_operator() {
            return Ok(lhs);
        }

        let operator = self.parse_comparison_operator()?;
        let rhs = self.parse_term_expression()?;

        Ok(Expression {
            span: lhs.span.to(rhs.span),
            kind: ExpressionKind::Comparison {
                lhs: Box::new(lhs),
                operator,
                rhs: Box::new(rhs),
            },
        })
    }

    fn parse_comparison_operator(&mut self) -> Result<ComparisonOperator, ParseError> {
        let operator = self.expect_next("comparison operator")?;

        Ok(match operator.kind {
            TokenKind::GreaterThan => ComparisonOperator::GreaterThan,
            TokenKind::LessThan => ComparisonOperator::LessThan,
            TokenKind::DoubleEquals => ComparisonOperator::Equals,
            TokenKind::GreaterThanOrEqualTo => ComparisonOperator::GreaterThanOrEqualTo,
            TokenKind::LessThanOrEqualTo => ComparisonOperator::LessThanOrEqualTo,
            _ => return Err(self.unexpected(operator, "comparison operator")),
        })
    }

    fn parse_term_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expression = self.parse_factor_expression()?;

        while self
            .lexer
            .peek()?
            .is_some_and(|t| t.kind.is_term_operator())
        {
            let operator = match self.expect_next("term operator")?.kind {
                TokenKind::Plus => ArithmeticOperator::Add,
                _ => ArithmeticOperator::Subtract,
            };
            let rhs = self.parse_factor_expression()?;

            expression = Expression {
                span: expression.span.to(rhs.span),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator,
                    rhs: Box::new(rhs),
                },
            }
        }

        Ok(expression)
    }

    fn parse_factor_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expression = self.parse_atomic_expression()?;

        while self
            .lexer
            .peek()?
            .is_some_and(|t| t.kind.is_factor_operator())
        {
            self.expect_next("factor operator")?;
            let rhs = self.parse_atomic_expression()?;

            expression = Expression {
                span: expression.span.to(rhs.span),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator: ArithmeticOperator::Multiply,
                    rhs: Box::new(rhs),
                },
            }
        }

        Ok(expression)
    }

    fn parse_atomic_expression(&mut self) -> Result<Expression, ParseError> {
        let peeked = self.expect_peek("expression")?;

        match peeked.kind {
            TokenKind::IntegerLiteral | TokenKind::Minus => self.parse_integer_constant(),
            TokenKind::Identifier => {
                let identifier = self.parse_identifier()?;

                if self.next_is(TokenKind::OpenParen)? {
                    return self.parse_function_call(identifier);
                }

                Ok(Expression {
                    span: identifier.span,
                    kind: ExpressionKind::Variable(identifier),
                })
            }
            TokenKind::OpenParen => {
                let open_paren = self.expect_next_to_be(TokenKind::OpenParen, "`(`")?;
                let expression = self.parse_expression()?;
                let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`)`")?;

                Ok(Expression {
                    span: open_paren.span.to(close_paren.span),
                    kind: expression.kind,
                })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_expression(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_expression(),
            _ => Err(self.unexpected(peeked, "expression")),
        }
    }

    fn parse_integer_constant(&mut self) -> Result<Expression, ParseError> {
        let minus = self.eat(TokenKind::Minus)?;
        let literal = self.expect_next_to_be(TokenKind::IntegerLiteral, "integer literal")?;

        let span = match minus {
            Some(minus) => minus.span.to(literal.span),
            None => literal.span,
        };

        let digits = self.lexer.source().value_of_span(literal.span);
        let text = if minus.is_some() {
            format!("-{digits}")
        } else {
            digits.to_owned()
        };

        let Ok(value) = text.parse::<i32>() else {
            return Err(ParseError::IntegerOutOfRange {
                literal: text,
                span,
            });
        };

        Ok(Expression {
            span,
            kind: ExpressionKind::IntegerConstant(value),
        })
    }

    // callee(arg, arg)
    fn parse_function_call(&mut self, callee: Identifier) -> Result<Expression, ParseError> {
        let mut arguments = Vec::new();

        self.expect_next_to_be(TokenKind::OpenParen, "`(`")?;

        if !self.next_is(TokenKind::CloseParen)? {
            arguments.push(self.parse_expression()?);

            while self.eat(TokenKind::Comma)?.is_some() {
                arguments.push(self.parse_expression()?);
            }
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen, "`,` or `)`")?;

        Ok(Expression {
            span: callee.span.to(close_paren.span),
            kind: ExpressionKind::FunctionCall { callee, arguments },
        })
    }

    // if condition then ... else ... end
    fn parse_if_expression(&mut self) -> Result<Expression, ParseError> {
        let if_keyword = self.expect_keyword(Keyword::If)?;
        let condition = self.parse_expression()?;

        self.eat(TokenKind::Keyword(Keyword::Then))?;

        let positive = self.parse_sequence(&[Keyword::Else, Keyword::End])?;
        let negative = if self.eat(TokenKind::Keyword(Keyword::Else))?.is_some() {
            self.parse_sequence(&[Keyword::End])?
        } else {
            Vec::new()
        };

        let end_keyword = self.expect_keyword(Keyword::End)?;

        Ok(Expression {
            span: if_keyword.span.to(end_keyword.span),
            kind: ExpressionKind::If {
                condition: Box::new(condition),
                positive,
                negative,
            },
        })
    }

    // for initializer; condition; step do ... end
    fn parse_for_expression(&mut self) -> Result<Expression, ParseError> {
        let for_keyword = self.expect_keyword(Keyword::For)?;

        let initializer = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::Semicolon, "`;`")?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::Semicolon, "`;`")?;
        let step = self.parse_expression()?;

        self.eat(TokenKind::Keyword(Keyword::Do))?;

        let body = self.parse_sequence(&[Keyword::End])?;
        let end_keyword = self.expect_keyword(Keyword::End)?;

        Ok(Expression {
            span: for_keyword.span.to(end_keyword.span),
            kind: ExpressionKind::For {
                initializer: Box::new(initializer),
                condition: Box::new(condition),
                step: Box::new(step),
                body,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &SourceFile) -> Module<'_> {
        Parser::parse_module(source).expect("source should parse")
    }

    fn top_level(item: &Item) -> &Expression {
        match &item.kind {
            ItemKind::TopLevelExpression(expression) => expression,
            other => panic!("expected a top level expression, found {other:?}"),
        }
    }

    #[test]
    fn parses_function_definitions_and_prototypes() {
        let source = SourceFile::from_memory("extern twice(a)\ndef add(a, b) a + b end");
        let module = parse(&source);

        assert_eq!(module.items.len(), 2);

        let ItemKind::Prototype(prototype) = &module.items[0].kind else {
            panic!("expected a prototype");
        };
        assert_eq!(prototype.name.symbol.value(), "twice");
        assert_eq!(prototype.parameters.len(), 1);

        let ItemKind::Function(function) = &module.items[1].kind else {
            panic!("expected a function");
        };
        assert_eq!(function.prototype.name.symbol.value(), "add");
        assert!(matches!(
            function.body.kind,
            ExpressionKind::Binary {
                operator: ArithmeticOperator::Add,
                ..
            }
        ));
        assert_eq!(source.value_of_span(function.span), "def add(a, b) a + b end");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let source = SourceFile::from_memory("1 + 2 * 3");
        let module = parse(&source);

        let ExpressionKind::Binary { operator, rhs, .. } = &top_level(&module.items[0]).kind else {
            panic!("expected a binary expression");
        };

        assert_eq!(*operator, ArithmeticOperator::Add);
        assert!(matches!(
            rhs.kind,
            ExpressionKind::Binary {
                operator: ArithmeticOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let source = SourceFile::from_memory("x = y = 1");
        let module = parse(&source);

        let ExpressionKind::Assignment { target, value } = &top_level(&module.items[0]).kind else {
            panic!("expected an assignment");
        };

        assert_eq!(target.symbol.value(), "x");
        assert!(matches!(value.kind, ExpressionKind::Assignment { .. }));
    }

    #[test]
    fn parses_if_with_optional_else() {
        let source = SourceFile::from_memory("if x > 1 then puts(x); x end\nif 1 < 2 else 3 end");
        let module = parse(&source);

        let ExpressionKind::If {
            positive, negative, ..
        } = &top_level(&module.items[0]).kind
        else {
            panic!("expected an if expression");
        };
        assert_eq!(positive.len(), 2);
        assert!(negative.is_empty());

        let ExpressionKind::If {
            positive, negative, ..
        } = &top_level(&module.items[1]).kind
        else {
            panic!("expected an if expression");
        };
        assert!(positive.is_empty());
        assert_eq!(negative.len(), 1);
    }

    #[test]
    fn parses_for_loops() {
        let source = SourceFile::from_memory("for i = 0; i < 3; i = i + 1 do puts(1, i) end");
        let module = parse(&source);

        let ExpressionKind::For {
            condition, body, ..
        } = &top_level(&module.items[0]).kind
        else {
            panic!("expected a for expression");
        };

        assert!(matches!(
            condition.kind,
            ExpressionKind::Comparison {
                operator: ComparisonOperator::LessThan,
                ..
            }
        ));
        assert!(matches!(
            &body[0].kind,
            ExpressionKind::FunctionCall { arguments, .. } if arguments.len() == 2
        ));
    }

    #[test]
    fn negative_literals_cover_the_full_range() {
        let source = SourceFile::from_memory("-2147483648");
        let module = parse(&source);

        assert!(matches!(
            top_level(&module.items[0]).kind,
            ExpressionKind::IntegerConstant(i32::MIN)
        ));

        let source = SourceFile::from_memory("2147483648");
        assert!(matches!(
            Parser::parse_module(&source),
            Err(ParseError::IntegerOutOfRange { .. })
        ));
    }

    #[test]
    fn reports_invalid_assignment_targets() {
        let source = SourceFile::from_memory("1 = 2");

        assert!(matches!(
            Parser::parse_module(&source),
            Err(ParseError::InvalidAssignmentTarget { .. })
        ));
    }

    #[test]
    fn reports_missing_end() {
        let source = SourceFile::from_memory("def f(a) a");

        let error = Parser::parse_module(&source).unwrap_err();

        assert!(matches!(error, ParseError::UnexpectedEof { .. }));
        assert_eq!(error.to_string(), "expected `end` but reached end of file");
    }
}
