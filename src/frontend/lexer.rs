use std::{collections::BTreeMap, str::Chars};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::EnumString;

use super::parser::ParseError;
use crate::frontend::SourceFile;

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    chars: PeekNth<Chars<'source>>,
    /// At most one token of lookahead
    peeked: Option<Token>,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // def
    Identifier,       // main

    /* Literals */
    IntegerLiteral, // 1

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    Semicolon,  // ;
    Comma,      // ,

    /* Binary Ops */
    Plus,                 // +
    Minus,                // -
    Asterisk,             // *
    DoubleEquals,         // ==
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals, // =
}

impl TokenKind {
    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::DoubleEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Def,
    Extern,
    If,
    Then,
    Else,
    For,
    Do,
    End,
}

/// Single character tokens
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('+', TokenKind::Plus),
        ('-', TokenKind::Minus),
        ('*', TokenKind::Asterisk),
        ('=', TokenKind::Equals),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

/// Operators spelled with two characters, tried before [`SINGLE_TOKENS`]
const DOUBLE_TOKENS: [(char, char, TokenKind); 3] = [
    ('=', '=', TokenKind::DoubleEquals),
    ('<', '=', TokenKind::LessThanOrEqualTo),
    ('>', '=', TokenKind::GreaterThanOrEqualTo),
];

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
            peeked: None,
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    /// Span of the end of the input, used to report unexpected EOF
    pub fn eof_span(&self) -> Span {
        let end = self.source.contents.len();
        Span::new(end, end)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();

        Some(c)
    }

    /// Consumes characters while `predicate` holds and returns their span
    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) -> Span {
        let start = self.position;

        while self.chars.peek().is_some_and(|c| predicate(*c)) {
            self.advance();
        }

        Span::new(start, self.position)
    }

    fn consume_token(&mut self, kind: TokenKind, width: usize) -> Token {
        let start = self.position;

        for _ in 0..width {
            self.advance();
        }

        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    fn read_word(&mut self) -> Token {
        let span = self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');

        let kind = self
            .source
            .value_of_span(span)
            .parse()
            .map_or(TokenKind::Identifier, TokenKind::Keyword);

        Token { kind, span }
    }

    fn double_token(&mut self, first: char) -> Option<TokenKind> {
        let second = *self.chars.peek_nth(1)?;

        DOUBLE_TOKENS
            .iter()
            .find(|(a, b, _)| *a == first && *b == second)
            .map(|(_, _, kind)| *kind)
    }

    pub fn peek(&mut self) -> Result<Option<Token>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = self.next()?;
        }

        Ok(self.peeked)
    }

    pub fn next(&mut self) -> Result<Option<Token>, ParseError> {
        if let Some(token) = self.peeked.take() {
            return Ok(Some(token));
        }

        while let Some(c) = self.chars.peek().copied() {
            if c.is_ascii_whitespace() {
                self.consume_while(|c| c.is_ascii_whitespace());
                continue;
            }

            // Comments run to the end of the line
            if c == '#' {
                self.consume_while(|c| c != '\n');
                continue;
            }

            let token = if c.is_ascii_digit() {
                Token {
                    span: self.consume_while(|c| c.is_ascii_digit()),
                    kind: TokenKind::IntegerLiteral,
                }
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.read_word()
            } else if let Some(kind) = self.double_token(c) {
                self.consume_token(kind, 2)
            } else if let Some(kind) = SINGLE_TOKENS.get(&c).copied() {
                self.consume_token(kind, 1)
            } else {
                return Err(ParseError::UnexpectedCharacter {
                    character: c,
                    span: Span::new(self.position, self.position + c.len_utf8()),
                });
            };

            return Ok(Some(token));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let source = SourceFile::from_memory(source);
        let mut lexer = Lexer::new(&source);
        let mut kinds = Vec::new();

        while let Some(token) = lexer.next().unwrap() {
            kinds.push(token.kind);
        }

        kinds
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("def double(a) a * 2 end"),
            vec![
                TokenKind::Keyword(Keyword::Def),
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::CloseParen,
                TokenKind::Identifier,
                TokenKind::Asterisk,
                TokenKind::IntegerLiteral,
                TokenKind::Keyword(Keyword::End),
            ]
        );
    }

    #[test]
    fn prefers_two_character_comparisons() {
        assert_eq!(
            kinds("a <= b >= c == d < e > f = g"),
            vec![
                TokenKind::Identifier,
                TokenKind::LessThanOrEqualTo,
                TokenKind::Identifier,
                TokenKind::GreaterThanOrEqualTo,
                TokenKind::Identifier,
                TokenKind::DoubleEquals,
                TokenKind::Identifier,
                TokenKind::LessThan,
                TokenKind::Identifier,
                TokenKind::GreaterThan,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn skips_comments_and_tracks_spans() {
        let source = SourceFile::from_memory("# leading comment\n  endless");
        let mut lexer = Lexer::new(&source);

        let token = lexer.next().unwrap().unwrap();

        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(source.value_of_span(token.span), "endless");
        assert!(lexer.next().unwrap().is_none());
    }

    #[test]
    fn peek_does_not_consume() {
        let source = SourceFile::from_memory("x 1");
        let mut lexer = Lexer::new(&source);

        assert_eq!(lexer.peek().unwrap().unwrap().kind, TokenKind::Identifier);
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::Identifier);
        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::IntegerLiteral);
    }

    #[test]
    fn rejects_unknown_characters() {
        let source = SourceFile::from_memory("x != 1");
        let mut lexer = Lexer::new(&source);

        lexer.next().unwrap();

        assert!(matches!(
            lexer.next(),
            Err(ParseError::UnexpectedCharacter { character: '!', .. })
        ));
    }
}
