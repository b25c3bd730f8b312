//! Local, non-fatal problems found while lowering. Each one is printed when
//! reported and kept so callers can count or inspect them afterwards.

use colored::Colorize;

use crate::frontend::{SourceFile, lexer::Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DiagnosticKind {
    UndefinedVariable,
    UndefinedFunction,
    ArgumentCountMismatch,
    FunctionRedefinition,
    DuplicateParameter,
    ReservedName,
    MalformedFunctionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub message: String,
}

#[derive(Debug)]
pub struct DiagnosticSink<'source> {
    source_file: &'source SourceFile,
    quiet: bool,
    diagnostics: Vec<Diagnostic>,
}

/// Name of the enclosing function
#[macro_export]
macro_rules! current_function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .expect("Short function name")
    }};
}

/// Reports a diagnostic through a [`DiagnosticSink`]. With the
/// `error-backtrace` feature the printed diagnostic names the compiler
/// function that raised it.
#[macro_export]
macro_rules! report_diagnostic {
    ($sink:expr, $kind:expr, $span:expr, $($message:tt)+) => {{
        let message = format!($($message)+);

        #[allow(unused_mut)]
        let mut backtrace: Option<String> = None;

        #[cfg(feature = "error-backtrace")]
        {
            backtrace = Some(format!(
                "{}::{} (at {}:{}:{})",
                module_path!(),
                $crate::current_function!(),
                file!(),
                line!(),
                column!()
            ));
        }

        $sink.report($kind, $span, message, backtrace)
    }};
}

impl<'source> DiagnosticSink<'source> {
    pub fn new(source_file: &'source SourceFile, quiet: bool) -> Self {
        Self {
            source_file,
            quiet,
            diagnostics: Vec::new(),
        }
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        span: Span,
        message: String,
        backtrace: Option<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            span,
            message,
        };

        if !self.quiet {
            if let Some(backtrace) = backtrace {
                eprintln!("{}: {}", "backtrace".blue(), backtrace);
            }

            eprintln!(
                "{}: {} {}",
                format!("error[{}]", diagnostic.kind).red(),
                diagnostic.message,
                format!("(at {})", self.source_file.location_of(span)).white()
            );
            self.source_file.highlight_span(span);
        }

        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
