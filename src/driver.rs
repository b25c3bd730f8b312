//! One shot compile and run: parse, lower every item, verify, execute `main`.

use std::path::{Path, PathBuf};

use colored::Colorize;
use thiserror::Error;

use crate::{
    backend::{
        Backend, BackendError, ExecutionError, Executable,
        runtime::{Runtime, StandardRuntime},
        ssa::{
            builder::SsaBackend,
            pretty_print::{pretty_print_module, render_module},
        },
    },
    config::Config,
    diagnostics::Diagnostic,
    frontend::{
        SourceFile, SourceFileOrigin,
        parser::{ParseError, Parser},
    },
    log_dbg,
    middle::lowering::{ENTRY_FUNCTION_NAME, Lowerer, LoweringOutput},
    phase_log, phase_ok,
};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to read `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug)]
pub struct RunSummary {
    /// Lowering diagnostics, in the order they were reported
    pub diagnostics: Vec<Diagnostic>,
    /// The module as it was handed to the executor, without colors
    pub ir: String,
}

pub fn run_source(
    source_file: &SourceFile,
    config: &Config,
    runtime: &mut dyn Runtime,
) -> Result<RunSummary, DriverError> {
    phase_log!(config, "Parsing {}", source_file.origin);

    let module = match Parser::parse_module(source_file) {
        Ok(module) => module,
        Err(error) => {
            if !config.quiet {
                source_file.highlight_span(error.span());
            }

            return Err(DriverError::Parse {
                location: source_file.location_of(error.span()),
                source: error,
            });
        }
    };

    if config.dump_ast {
        println!("{module:#?}");
    }

    phase_log!(config, "Lowering {} item(s)", module.items.len());

    let backend = SsaBackend::create_module(&source_file.origin.to_string());
    let mut lowerer = Lowerer::new(backend, source_file, config);
    let mut scope = lowerer.entry_scope();

    for item in &module.items {
        lowerer.lower_item(item, &mut scope);
    }

    let LoweringOutput {
        backend,
        diagnostics,
    } = lowerer.finish(scope);

    let ir = render_module(backend.module());

    if config.dump_ir {
        pretty_print_module(backend.module());
    }

    phase_log!(config, "Verifying and compiling");

    let program = match backend.finalize() {
        Ok(program) => program.with_call_depth_limit(config.max_call_depth),
        Err(error) => {
            let BackendError::Verification { errors, .. } = &error;

            if !config.quiet {
                for verify_error in errors {
                    eprintln!("{}: {verify_error}", "verify".red());
                }
            }

            return Err(error.into());
        }
    };

    log_dbg!(
        config,
        "compiled {} function(s)",
        program.module().functions.len()
    );

    phase_log!(config, "Running `{}`", ENTRY_FUNCTION_NAME);

    program.invoke(ENTRY_FUNCTION_NAME, runtime)?;

    phase_ok!(
        config,
        "Finished {} with {} diagnostic(s)",
        source_file.origin,
        diagnostics.len()
    );

    Ok(RunSummary { diagnostics, ir })
}

/// Reads and runs a source file, writing program output to stdout
pub fn run_file(path: &Path, config: &Config) -> Result<RunSummary, DriverError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let source_file = SourceFile {
        contents,
        origin: SourceFileOrigin::File(path.to_path_buf()),
    };

    run_source(&source_file, config, &mut StandardRuntime::stdout())
}
