use crate::backend::interpreter::DEFAULT_CALL_DEPTH_LIMIT;

/// Settings for a single compile and run
#[derive(Debug, Clone)]
pub struct Config {
    /// 0 = phase summaries off, 1 = phases, 2 = debug, 3 = trace
    pub verbose: u8,
    /// Silences logging and diagnostics output
    pub quiet: bool,
    pub dump_ast: bool,
    pub dump_ir: bool,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: 0,
            quiet: false,
            dump_ast: false,
            dump_ir: false,
            max_call_depth: DEFAULT_CALL_DEPTH_LIMIT,
        }
    }
}

impl Config {
    pub fn effective_verbose(&self) -> u8 {
        if self.quiet { 0 } else { self.verbose }
    }
}
