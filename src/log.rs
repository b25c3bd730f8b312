//! Logging macros. Everything goes to stderr so program output on stdout
//! stays clean.

use crate::config::Config;

pub fn log_phase(config: &Config) -> bool {
    config.effective_verbose() >= 1
}

pub fn log_debug(config: &Config) -> bool {
    config.effective_verbose() >= 2
}

pub fn log_trace(config: &Config) -> bool {
    config.effective_verbose() >= 3
}

/// Log the start of a compiler phase with an arrow prefix
///
/// ```ignore
/// phase_log!(&config, "Parsing {}", source_file.origin);
/// ```
#[macro_export]
macro_rules! phase_log {
    ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        if $crate::log::log_phase($config) {
            use colored::Colorize;
            eprintln!(
                "    {} {}",
                "-->".bright_green().bold(),
                format!($fmt $(, $arg)*)
            );
        }
    }};
}

/// Log a successful phase completion (green arrow, no indent)
#[macro_export]
macro_rules! phase_ok {
    ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        if $crate::log::log_phase($config) {
            use colored::Colorize;
            eprintln!("{} {}", "-->".bright_green().bold(), format!($fmt $(, $arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_dbg {
    ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        if $crate::log::log_debug($config) {
            eprintln!("debug: {}", format!($fmt $(, $arg)*));
        }
    }};
}

#[macro_export]
macro_rules! log_trc {
    ($config:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        if $crate::log::log_trace($config) {
            eprintln!("trace: {}", format!($fmt $(, $arg)*));
        }
    }};
}
