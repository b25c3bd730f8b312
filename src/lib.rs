//! Rubiee compiles a small expression language into SSA IR and runs it
//! straight away.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod frontend;
pub mod index;
pub mod log;
pub mod middle;
