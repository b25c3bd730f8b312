//! The code emission contract the lowering engine drives, plus the SSA
//! implementation of it and the executor that runs finished modules.

use std::fmt::Debug;

use thiserror::Error;

use crate::frontend::intern::InternedSymbol;

pub mod interpreter;
pub mod runtime;
pub mod ssa;

use self::{runtime::Runtime, ssa::verify::VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    I1,
    I32,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOp {
    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Subtract,
    #[strum(serialize = "mul")]
    Multiply,
}

impl BinaryOp {
    /// 32 bit two's complement arithmetic with wrap around
    pub fn evaluate(self, lhs: i32, rhs: i32) -> i32 {
        match self {
            Self::Add => lhs.wrapping_add(rhs),
            Self::Subtract => lhs.wrapping_sub(rhs),
            Self::Multiply => lhs.wrapping_mul(rhs),
        }
    }
}

/// Signed integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IntPredicate {
    Eq,
    Ne,
    Sgt,
    Slt,
    Sge,
    Sle,
}

impl IntPredicate {
    pub fn evaluate(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Sgt => lhs > rhs,
            Self::Slt => lhs < rhs,
            Self::Sge => lhs >= rhs,
            Self::Sle => lhs <= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub parameters: Vec<Type>,
    pub return_type: Type,
    /// Variadic functions take a synthesized argument count as their last
    /// fixed parameter, followed by that many extra arguments.
    pub is_variadic: bool,
}

impl Signature {
    /// `(i32, i32, ...) -> i32` with `arity` parameters
    pub fn integer_function(arity: usize) -> Self {
        Self {
            parameters: vec![Type::I32; arity],
            return_type: Type::I32,
            is_variadic: false,
        }
    }

    /// Number of arguments a caller writes before any variadic ones. The
    /// count parameter of a variadic function is not written by the caller.
    pub fn visible_arity(&self) -> usize {
        if self.is_variadic {
            self.parameters.len().saturating_sub(1)
        } else {
            self.parameters.len()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Linkage {
    /// Must be defined inside the module
    Local,
    /// May be left as a declaration, calls are then resolved by the runtime
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    Int(i32),
    Bool(bool),
}

impl Immediate {
    pub fn ty(&self) -> Type {
        match self {
            Immediate::Int(_) => Type::I32,
            Immediate::Bool(_) => Type::I1,
        }
    }

    /// Booleans widen to 0 or 1
    pub fn as_int(&self) -> i32 {
        match *self {
            Immediate::Int(value) => value,
            Immediate::Bool(value) => value as i32,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Immediate::Int(value) => value != 0,
            Immediate::Bool(value) => value,
        }
    }
}

impl core::fmt::Display for Immediate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Immediate::Int(value) => write!(f, "{value}"),
            Immediate::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("module `{module}` failed verification with {} error(s)", .errors.len())]
    Verification {
        module: String,
        errors: Vec<VerifyError>,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("function `{name}` does not exist")]
    UnknownFunction { name: String },
    #[error("function `{name}` has no definition")]
    UnresolvedExternal { name: String },
    #[error("function `{name}` expects {expected} argument(s) but was given {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("call depth exceeded the limit of {limit}")]
    CallDepthExceeded { limit: usize },
    #[error("register %{register} of `{function}` was read before being written")]
    UndefinedRegister { function: String, register: usize },
    #[error("no phi source in `{function}` for the incoming edge")]
    MissingPhiSource { function: String },
    #[error("failed to write program output")]
    Output(#[from] std::io::Error),
}

/// Something that can emit SSA style IR into a single module. The lowering
/// engine is written against this so the IR it produces can be consumed by
/// different executors.
///
/// Emitting operations append to the block selected by `set_insertion_point`.
pub trait Backend {
    type Value: Copy + Debug;
    type Block: Copy + Eq + Debug;
    type Function: Copy + Eq + Debug;
    type Slot: Copy + Debug;
    type Program: Executable;

    fn create_module(name: &str) -> Self
    where
        Self: Sized;

    fn declare_function(
        &mut self,
        name: InternedSymbol,
        signature: Signature,
        linkage: Linkage,
    ) -> Self::Function;
    fn lookup_function(&self, name: InternedSymbol) -> Option<Self::Function>;
    fn signature(&self, function: Self::Function) -> &Signature;
    fn has_body(&self, function: Self::Function) -> bool;
    /// Deletes the body of `function`. The declaration survives only if some
    /// call instruction in the module still refers to it.
    fn discard_function(&mut self, function: Self::Function);
    fn parameter(&self, function: Self::Function, index: usize) -> Self::Value;

    fn create_block(&mut self, function: Self::Function, label: &str) -> Self::Block;
    fn entry_block(&self, function: Self::Function) -> Option<Self::Block>;
    fn set_insertion_point(&mut self, block: Self::Block);
    fn insertion_block(&self) -> Self::Block;

    fn value_type(&self, value: Self::Value) -> Type;
    fn const_int(&mut self, value: i32) -> Self::Value;
    fn const_bool(&mut self, value: bool) -> Self::Value;
    fn binary(&mut self, operator: BinaryOp, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
    fn compare(
        &mut self,
        predicate: IntPredicate,
        lhs: Self::Value,
        rhs: Self::Value,
    ) -> Self::Value;
    fn zero_extend(&mut self, value: Self::Value, ty: Type) -> Self::Value;

    /// Reserves a stack slot at the top of `block`, after any slots already
    /// placed there, regardless of the current insertion point.
    fn alloca(&mut self, block: Self::Block, ty: Type, name: &str) -> Self::Slot;
    fn load(&mut self, slot: Self::Slot) -> Self::Value;
    fn store(&mut self, slot: Self::Slot, value: Self::Value);

    /// Returns `None` when the callee returns void
    fn call(&mut self, function: Self::Function, arguments: &[Self::Value])
    -> Option<Self::Value>;
    fn jump(&mut self, destination: Self::Block);
    fn branch(&mut self, condition: Self::Value, positive: Self::Block, negative: Self::Block);
    fn phi(&mut self, ty: Type, incoming: &[(Self::Value, Self::Block)]) -> Self::Value;
    fn ret(&mut self, value: Option<Self::Value>);

    /// Verifies the module and turns it into something runnable
    fn finalize(self) -> Result<Self::Program, BackendError>;
}

pub trait Executable {
    /// Runs the named function with no arguments to completion
    fn invoke(&self, name: &str, runtime: &mut dyn Runtime)
    -> Result<Option<i32>, ExecutionError>;
}
