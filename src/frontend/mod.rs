use std::path::PathBuf;

use colored::Colorize;

use self::lexer::Span;

pub mod ast;
pub mod intern;
pub mod lexer;
pub mod parser;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn from_memory(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number of the byte at `position`
    pub fn row_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        self.contents[..position].matches('\n').count() + 1
    }

    /// 1-based column of the byte at `position`
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());
        let line_start = self.contents[..position]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);

        position - line_start + 1
    }

    /// Renders the line containing the start of `span` with the spanned
    /// characters underlined.
    pub fn render_highlight(&self, span: Span) -> String {
        let row = self.row_for_position(span.start);
        let column = self.column_for_position(span.start);
        let line = self.contents.lines().nth(row - 1).unwrap_or_default();

        // Only the part of the span on the first line gets underlined
        let width = span
            .end
            .saturating_sub(span.start)
            .clamp(1, (line.len() + 1).saturating_sub(column).max(1));

        let gutter = format!("{row} | ");

        format!(
            "{}{}\n{}{}",
            gutter.blue(),
            line,
            " ".repeat(gutter.len() + column - 1),
            "^".repeat(width).red()
        )
    }

    pub fn highlight_span(&self, span: Span) {
        eprintln!("{}", self.render_highlight(span));
    }

    pub fn location_of(&self, span: Span) -> String {
        format!(
            "{}:{}:{}",
            self.origin,
            self.row_for_position(span.start),
            self.column_for_position(span.start)
        )
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}
