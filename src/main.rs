use std::{path::PathBuf, process::ExitCode};

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;
use rubiee::{
    backend::interpreter::DEFAULT_CALL_DEPTH_LIMIT, config::Config, driver::run_file,
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    source_file: PathBuf,

    /// Increase logging (-v phases, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress logging and diagnostics
    #[arg(short, long)]
    quiet: bool,

    /// Print the parsed syntax tree
    #[arg(long)]
    dump_ast: bool,

    /// Print the generated IR before running it
    #[arg(long)]
    dump_ir: bool,

    /// Maximum depth of nested calls in the running program
    #[arg(long, default_value_t = DEFAULT_CALL_DEPTH_LIMIT)]
    max_call_depth: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.source_file.exists() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Source file '{}' does not exist!", args.source_file.display()),
            )
            .exit()
    }

    if !args.source_file.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Input path '{}' is not a file!", args.source_file.display()),
            )
            .exit()
    }

    let config = Config {
        verbose: args.verbose,
        quiet: args.quiet,
        dump_ast: args.dump_ast,
        dump_ir: args.dump_ir,
        max_call_depth: args.max_call_depth,
    };

    match run_file(&args.source_file, &config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}: {error}", "error".red());
            ExitCode::FAILURE
        }
    }
}
