//! Host functions callable from compiled programs

use std::{collections::BTreeMap, io::Write};

use itertools::Itertools;
use once_cell::sync::Lazy;

use crate::backend::{ExecutionError, Signature, Type};

#[derive(Debug)]
pub struct RuntimeFunction {
    /// Symbol the function is declared under in the module
    pub symbol: &'static str,
    pub signature: Signature,
}

/// Runtime functions keyed by the name programs call them by
pub static RUNTIME_FUNCTIONS: Lazy<BTreeMap<&'static str, RuntimeFunction>> = Lazy::new(|| {
    BTreeMap::from([(
        "puts",
        RuntimeFunction {
            symbol: "_puts",
            signature: Signature {
                parameters: vec![Type::I32],
                return_type: Type::Void,
                is_variadic: true,
            },
        },
    )])
});

/// Resolves calls to functions the module only declares
pub trait Runtime {
    fn call_external(
        &mut self,
        symbol: &str,
        arguments: &[i32],
    ) -> Result<Option<i32>, ExecutionError>;
}

/// Provides `_puts`, writing to any output
#[derive(Debug)]
pub struct StandardRuntime<W: Write> {
    output: W,
}

impl<W: Write> StandardRuntime<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// `_puts(count, ...)` prints `count` integers separated by spaces
    fn puts(&mut self, arguments: &[i32]) -> Result<(), ExecutionError> {
        let Some((&count, values)) = arguments.split_first() else {
            return Err(ExecutionError::ArgumentCountMismatch {
                name: "_puts".to_owned(),
                expected: 1,
                found: 0,
            });
        };

        if usize::try_from(count).ok() != Some(values.len()) {
            return Err(ExecutionError::ArgumentCountMismatch {
                name: "_puts".to_owned(),
                expected: count.max(0) as usize + 1,
                found: arguments.len(),
            });
        }

        writeln!(self.output, "{}", values.iter().join(" "))?;

        Ok(())
    }
}

impl StandardRuntime<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Runtime for StandardRuntime<W> {
    fn call_external(
        &mut self,
        symbol: &str,
        arguments: &[i32],
    ) -> Result<Option<i32>, ExecutionError> {
        match symbol {
            "_puts" => self.puts(arguments).map(|()| None),
            _ => Err(ExecutionError::UnresolvedExternal {
                name: symbol.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_of(arguments: &[i32]) -> String {
        let mut runtime = StandardRuntime::new(Vec::new());

        runtime
            .call_external("_puts", arguments)
            .expect("puts should succeed");

        String::from_utf8(runtime.into_output()).unwrap()
    }

    #[test]
    fn puts_joins_values_with_single_spaces() {
        assert_eq!(output_of(&[3, 1, -2, 30]), "1 -2 30\n");
        assert_eq!(output_of(&[0]), "\n");
    }

    #[test]
    fn puts_rejects_a_wrong_count() {
        let mut runtime = StandardRuntime::new(Vec::new());

        assert!(matches!(
            runtime.call_external("_puts", &[2, 1]),
            Err(ExecutionError::ArgumentCountMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn unknown_symbols_are_unresolved() {
        let mut runtime = StandardRuntime::new(Vec::new());

        assert!(matches!(
            runtime.call_external("missing", &[]),
            Err(ExecutionError::UnresolvedExternal { name }) if name == "missing"
        ));
    }
}
