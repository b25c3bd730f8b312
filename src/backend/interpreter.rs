//! Executes verified SSA modules. Guest calls push frames onto an explicit
//! stack instead of recursing on the host stack.

use hashbrown::HashMap;

use crate::{
    backend::{
        ExecutionError, Executable, Immediate,
        runtime::Runtime,
        ssa::{BlockId, FunctionDefinition, FunctionId, Instruction, Module, Operand, RegisterId},
    },
    index::{Index, IndexVec},
};

pub const DEFAULT_CALL_DEPTH_LIMIT: usize = 1024;

#[derive(Debug)]
pub struct CompiledModule {
    module: Module,
    symbols: HashMap<&'static str, FunctionId>,
    call_depth_limit: usize,
}

struct Frame<'module> {
    function: &'module FunctionDefinition,
    registers: IndexVec<RegisterId, Option<Immediate>>,
    slots: Vec<i32>,
    block: BlockId,
    previous_block: Option<BlockId>,
    position: usize,
    /// Register in the caller's frame receiving the return value
    return_destination: Option<RegisterId>,
}

enum Step<'module> {
    Continue,
    Call {
        callee: &'module FunctionDefinition,
        arguments: Vec<i32>,
        destination: Option<RegisterId>,
    },
    Return(Option<Immediate>),
}

impl<'module> Frame<'module> {
    fn new(
        function: &'module FunctionDefinition,
        arguments: &[i32],
        return_destination: Option<RegisterId>,
    ) -> Self {
        let mut registers = IndexVec::from_raw(vec![None; function.registers.len()]);

        for (register, argument) in function.parameters.iter().zip(arguments) {
            registers[*register] = Some(Immediate::Int(*argument));
        }

        Self {
            function,
            registers,
            slots: vec![0; function.slots.len()],
            block: BlockId::new(0),
            previous_block: None,
            position: 0,
            return_destination,
        }
    }

    fn read(&self, operand: Operand) -> Result<Immediate, ExecutionError> {
        match operand {
            Operand::Immediate(immediate) => Ok(immediate),
            Operand::Register(register) => self.registers[register].ok_or_else(|| {
                ExecutionError::UndefinedRegister {
                    function: self.function.symbol_name.value().to_owned(),
                    register: register.index(),
                }
            }),
        }
    }

    fn write(&mut self, register: RegisterId, value: Immediate) {
        self.registers[register] = Some(value);
    }

    fn enter(&mut self, block: BlockId) {
        self.previous_block = Some(self.block);
        self.block = block;
        self.position = 0;
    }
}

impl CompiledModule {
    pub fn new(module: Module) -> Self {
        let symbols = module
            .functions
            .values()
            .map(|f| (f.symbol_name.value(), f.id))
            .collect();

        Self {
            module,
            symbols,
            call_depth_limit: DEFAULT_CALL_DEPTH_LIMIT,
        }
    }

    pub fn with_call_depth_limit(mut self, limit: usize) -> Self {
        self.call_depth_limit = limit;
        self
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Runs `name` with the given arguments and returns its result
    pub fn call(
        &self,
        name: &str,
        arguments: &[i32],
        runtime: &mut dyn Runtime,
    ) -> Result<Option<i32>, ExecutionError> {
        let function = self
            .symbols
            .get(name)
            .and_then(|id| self.module.functions.get(id))
            .ok_or_else(|| ExecutionError::UnknownFunction {
                name: name.to_owned(),
            })?;

        if arguments.len() != function.parameters.len() {
            return Err(ExecutionError::ArgumentCountMismatch {
                name: name.to_owned(),
                expected: function.parameters.len(),
                found: arguments.len(),
            });
        }

        if function.is_declaration() {
            return runtime.call_external(name, arguments);
        }

        let mut stack = vec![Frame::new(function, arguments, None)];

        loop {
            let frame = stack
                .last_mut()
                .expect("the loop returns once the last frame is popped");

            match self.step(frame, runtime)? {
                Step::Continue => {}
                Step::Call {
                    callee,
                    arguments,
                    destination,
                } => {
                    if stack.len() >= self.call_depth_limit {
                        return Err(ExecutionError::CallDepthExceeded {
                            limit: self.call_depth_limit,
                        });
                    }

                    stack.push(Frame::new(callee, &arguments, destination));
                }
                Step::Return(value) => {
                    let finished = stack
                        .pop()
                        .expect("a frame was just executing so the stack is not empty");

                    let Some(caller) = stack.last_mut() else {
                        return Ok(value.map(|v| v.as_int()));
                    };

                    if let (Some(destination), Some(value)) = (finished.return_destination, value)
                    {
                        caller.write(destination, value);
                    }
                }
            }
        }
    }

    fn step<'module>(
        &'module self,
        frame: &mut Frame<'module>,
        runtime: &mut dyn Runtime,
    ) -> Result<Step<'module>, ExecutionError> {
        let function = frame.function;
        let instruction = &function.blocks[frame.block].instructions[frame.position];
        frame.position += 1;

        match instruction {
            Instruction::AllocStack { slot } => frame.slots[slot.index()] = 0,
            Instruction::Load { destination, slot } => {
                let value = frame.slots[slot.index()];
                frame.write(*destination, Immediate::Int(value));
            }
            Instruction::Store { slot, value } => {
                frame.slots[slot.index()] = frame.read(*value)?.as_int();
            }
            Instruction::BinaryOperation {
                operator,
                destination,
                lhs,
                rhs,
            } => {
                let value =
                    operator.evaluate(frame.read(*lhs)?.as_int(), frame.read(*rhs)?.as_int());
                frame.write(*destination, Immediate::Int(value));
            }
            Instruction::Compare {
                predicate,
                destination,
                lhs,
                rhs,
            } => {
                let value =
                    predicate.evaluate(frame.read(*lhs)?.as_int(), frame.read(*rhs)?.as_int());
                frame.write(*destination, Immediate::Bool(value));
            }
            Instruction::ZeroExtend {
                destination,
                operand,
                ..
            } => {
                let value = frame.read(*operand)?.as_int();
                frame.write(*destination, Immediate::Int(value));
            }
            Instruction::Call {
                function,
                arguments,
                destination,
            } => {
                let callee = self.module.functions.get(function).ok_or_else(|| {
                    ExecutionError::UnknownFunction {
                        name: format!("#{}", function.index()),
                    }
                })?;

                let arguments = arguments
                    .iter()
                    .map(|a| frame.read(*a).map(|v| v.as_int()))
                    .collect::<Result<Vec<_>, _>>()?;

                if !callee.is_declaration() {
                    return Ok(Step::Call {
                        callee,
                        arguments,
                        destination: *destination,
                    });
                }

                let result = runtime.call_external(callee.symbol_name.value(), &arguments)?;

                if let (Some(destination), Some(result)) = (destination, result) {
                    frame.write(*destination, Immediate::Int(result));
                }
            }
            Instruction::Phi {
                destination,
                sources,
            } => {
                let source = frame
                    .previous_block
                    .and_then(|block| sources.get(&block))
                    .ok_or_else(|| ExecutionError::MissingPhiSource {
                        function: frame.function.symbol_name.value().to_owned(),
                    })?;

                let value = frame.read(*source)?;
                frame.write(*destination, value);
            }
            Instruction::Jump { destination } => frame.enter(*destination),
            Instruction::Branch {
                condition,
                positive,
                negative,
            } => {
                if frame.read(*condition)?.as_bool() {
                    frame.enter(*positive);
                } else {
                    frame.enter(*negative);
                }
            }
            Instruction::Return { value } => {
                let value = value.map(|v| frame.read(v)).transpose()?;
                return Ok(Step::Return(value));
            }
        }

        Ok(Step::Continue)
    }
}

impl Executable for CompiledModule {
    fn invoke(
        &self,
        name: &str,
        runtime: &mut dyn Runtime,
    ) -> Result<Option<i32>, ExecutionError> {
        self.call(name, &[], runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            Backend, BinaryOp, IntPredicate, Linkage, Signature, runtime::StandardRuntime,
            ssa::builder::SsaBackend,
        },
        frontend::intern::InternedSymbol,
    };

    /// `countdown(n)` recursing until `n` reaches zero
    fn countdown_module() -> CompiledModule {
        let mut backend = SsaBackend::create_module("test");
        let countdown = backend.declare_function(
            InternedSymbol::new("countdown"),
            Signature::integer_function(1),
            Linkage::External,
        );

        let entry = backend.create_block(countdown, "entry");
        let recurse = backend.create_block(countdown, "recurse");
        let done = backend.create_block(countdown, "done");

        backend.set_insertion_point(entry);
        let n = backend.parameter(countdown, 0);
        let zero = backend.const_int(0);
        let finished = backend.compare(IntPredicate::Sle, n, zero);
        backend.branch(finished, done, recurse);

        backend.set_insertion_point(recurse);
        let one = backend.const_int(1);
        let next = backend.binary(BinaryOp::Subtract, n, one);
        let result = backend.call(countdown, &[next]);
        let incremented = backend.binary(BinaryOp::Add, result.unwrap(), one);
        backend.ret(Some(incremented));

        backend.set_insertion_point(done);
        backend.ret(Some(zero));

        backend.finalize().expect("module should verify")
    }

    #[test]
    fn recursion_uses_the_frame_stack() {
        let module = countdown_module();
        let mut runtime = StandardRuntime::new(Vec::new());

        assert_eq!(module.call("countdown", &[500], &mut runtime).unwrap(), Some(500));
    }

    #[test]
    fn call_depth_is_limited() {
        let module = countdown_module().with_call_depth_limit(10);
        let mut runtime = StandardRuntime::new(Vec::new());

        assert_eq!(module.call("countdown", &[9], &mut runtime).unwrap(), Some(9));
        assert!(matches!(
            module.call("countdown", &[10], &mut runtime),
            Err(ExecutionError::CallDepthExceeded { limit: 10 })
        ));
    }

    #[test]
    fn unknown_entry_points_are_reported() {
        let module = countdown_module();
        let mut runtime = StandardRuntime::new(Vec::new());

        assert!(matches!(
            module.invoke("main", &mut runtime),
            Err(ExecutionError::UnknownFunction { name }) if name == "main"
        ));
    }
}
