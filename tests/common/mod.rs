#![allow(dead_code)]

use rubiee::{
    backend::runtime::StandardRuntime,
    config::Config,
    diagnostics::DiagnosticKind,
    driver::{DriverError, RunSummary, run_source},
    frontend::SourceFile,
};

pub struct Run {
    pub output: String,
    pub summary: RunSummary,
}

impl Run {
    pub fn diagnostic_kinds(&self) -> Vec<DiagnosticKind> {
        self.summary.diagnostics.iter().map(|d| d.kind).collect()
    }
}

pub fn quiet_config() -> Config {
    Config {
        quiet: true,
        ..Config::default()
    }
}

pub fn try_run_with(source: &str, config: &Config) -> Result<Run, DriverError> {
    let source_file = SourceFile::from_memory(source);
    let mut runtime = StandardRuntime::new(Vec::new());

    let summary = run_source(&source_file, config, &mut runtime)?;
    let output = String::from_utf8(runtime.into_output()).expect("program output is utf-8");

    Ok(Run { output, summary })
}

pub fn try_run(source: &str) -> Result<Run, DriverError> {
    try_run_with(source, &quiet_config())
}

/// Runs a program that is expected to compile and execute
pub fn run(source: &str) -> Run {
    match try_run(source) {
        Ok(run) => run,
        Err(error) => panic!("program failed: {error}\n{source}"),
    }
}
