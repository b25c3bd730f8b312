use std::collections::BTreeSet;

use thiserror::Error;

use crate::{
    backend::{
        Linkage, Type,
        ssa::{Block, BlockId, FunctionDefinition, Instruction, Module, Operand},
    },
    index::Index,
};

/// Errors found during IR verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("`{function}` block {block} does not end in a terminator")]
    MissingTerminator { function: String, block: usize },

    #[error("`{function}` block {block} continues after a terminator")]
    InstructionAfterTerminator { function: String, block: usize },

    #[error("`{function}` block {block} refers to block {target} which does not exist")]
    InvalidBlockRef {
        function: String,
        block: usize,
        target: usize,
    },

    #[error("`{function}` block {block} refers to register %{register} which does not exist")]
    InvalidRegisterRef {
        function: String,
        block: usize,
        register: usize,
    },

    #[error("`{function}` block {block} refers to slot ${slot} which does not exist")]
    InvalidSlotRef {
        function: String,
        block: usize,
        slot: usize,
    },

    #[error("`{function}` block {block} calls a function which is not in the module")]
    InvalidFunctionRef { function: String, block: usize },

    #[error("`{function}` block {block} records predecessors {recorded:?} but is reached from {actual:?}")]
    PredecessorMismatch {
        function: String,
        block: usize,
        recorded: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("`{function}` block {block} has a phi after a non-phi instruction")]
    PhiNotAtBlockStart { function: String, block: usize },

    #[error("`{function}` block {block} has a phi over {sources:?} but predecessors {predecessors:?}")]
    PhiSourceMismatch {
        function: String,
        block: usize,
        sources: Vec<usize>,
        predecessors: Vec<usize>,
    },

    #[error("`{function}` block {block} mixes {expected} and {actual} operands")]
    OperandTypeMismatch {
        function: String,
        block: usize,
        expected: Type,
        actual: Type,
    },

    #[error("`{function}` block {block} branches on a {actual} condition")]
    NonBoolBranchCondition {
        function: String,
        block: usize,
        actual: Type,
    },

    #[error("`{function}` block {block} calls `{callee}` with {found} argument(s), expected {expected}")]
    CallArityMismatch {
        function: String,
        block: usize,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("`{function}` block {block} returns {actual} from a function returning {expected}")]
    ReturnTypeMismatch {
        function: String,
        block: usize,
        expected: Type,
        actual: Type,
    },

    #[error("`{function}` is local but has no body")]
    MissingBody { function: String },
}

pub type VerifyResult = Result<(), Vec<VerifyError>>;

pub struct ModuleVerifier<'module> {
    module: &'module Module,
    errors: Vec<VerifyError>,
}

impl<'module> ModuleVerifier<'module> {
    pub fn new(module: &'module Module) -> Self {
        Self {
            module,
            errors: Vec::new(),
        }
    }

    pub fn verify(mut self) -> VerifyResult {
        for function in self.module.functions.values() {
            if function.is_declaration() {
                if function.linkage == Linkage::Local {
                    self.errors.push(VerifyError::MissingBody {
                        function: function.symbol_name.value().to_owned(),
                    });
                }

                continue;
            }

            self.verify_function(function);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn verify_function(&mut self, function: &FunctionDefinition) {
        let name = function.symbol_name.value();

        for block in function.blocks.iter() {
            self.verify_block(function, name, block);
        }

        self.verify_predecessors(function, name);
    }

    fn verify_predecessors(&mut self, function: &FunctionDefinition, name: &str) {
        let mut actual = vec![BTreeSet::new(); function.blocks.len()];

        for block in function.blocks.iter() {
            for successor in block.successors() {
                if let Some(predecessors) = actual.get_mut(successor.index()) {
                    predecessors.insert(block.id);
                }
            }
        }

        for (block, actual) in function.blocks.iter().zip(actual) {
            if block.predecessors != actual {
                self.errors.push(VerifyError::PredecessorMismatch {
                    function: name.to_owned(),
                    block: block.id.index(),
                    recorded: block.predecessors.iter().map(|b| b.index()).collect(),
                    actual: actual.iter().map(|b| b.index()).collect(),
                });
            }
        }
    }

    fn verify_block(&mut self, function: &FunctionDefinition, name: &str, block: &Block) {
        let block_index = block.id.index();

        match block.instructions.last() {
            Some(last) if last.is_terminator() => {}
            _ => self.errors.push(VerifyError::MissingTerminator {
                function: name.to_owned(),
                block: block_index,
            }),
        }

        let body = block
            .instructions
            .split_last()
            .map(|(_, body)| body)
            .unwrap_or_default();

        if body.iter().any(|i| i.is_terminator()) {
            self.errors.push(VerifyError::InstructionAfterTerminator {
                function: name.to_owned(),
                block: block_index,
            });
        }

        let mut seen_non_phi = false;

        for instruction in &block.instructions {
            if matches!(instruction, Instruction::Phi { .. }) {
                if seen_non_phi {
                    self.errors.push(VerifyError::PhiNotAtBlockStart {
                        function: name.to_owned(),
                        block: block_index,
                    });
                }
            } else {
                seen_non_phi = true;
            }

            self.verify_instruction(function, name, block, instruction);
        }
    }

    fn verify_instruction(
        &mut self,
        function: &FunctionDefinition,
        name: &str,
        block: &Block,
        instruction: &Instruction,
    ) {
        let block_index = block.id.index();

        let valid_registers = instruction
            .operands()
            .into_iter()
            .chain(instruction.destination().map(Operand::Register))
            .all(|operand| self.check_operand(function, name, block_index, operand));

        match instruction {
            Instruction::AllocStack { slot }
            | Instruction::Load { slot, .. }
            | Instruction::Store { slot, .. } => {
                if !function.slots.contains_index(*slot) {
                    self.errors.push(VerifyError::InvalidSlotRef {
                        function: name.to_owned(),
                        block: block_index,
                        slot: slot.index(),
                    });
                }
            }
            _ => {}
        }

        let type_of = |operand: Operand| {
            function
                .operand_type(operand)
                .expect("operands were checked above")
        };

        match instruction {
            Instruction::BinaryOperation { lhs, rhs, .. } if valid_registers => {
                for operand in [lhs, rhs] {
                    self.expect_type(name, block_index, Type::I32, type_of(*operand));
                }
            }
            Instruction::Compare { lhs, rhs, .. } if valid_registers => {
                self.expect_type(name, block_index, type_of(*lhs), type_of(*rhs));
            }
            Instruction::Store { slot, value } if valid_registers => {
                if let Some(slot) = function.slots.get(*slot) {
                    self.expect_type(name, block_index, slot.ty, type_of(*value));
                }
            }
            Instruction::Branch {
                condition,
                positive,
                negative,
            } => {
                self.check_target(function, name, block_index, *positive);
                self.check_target(function, name, block_index, *negative);

                if valid_registers && type_of(*condition) != Type::I1 {
                    self.errors.push(VerifyError::NonBoolBranchCondition {
                        function: name.to_owned(),
                        block: block_index,
                        actual: type_of(*condition),
                    });
                }
            }
            Instruction::Jump { destination } => {
                self.check_target(function, name, block_index, *destination);
            }
            Instruction::Phi {
                destination,
                sources,
            } => {
                let sources_set = sources.keys().copied().collect::<BTreeSet<_>>();

                if sources_set != block.predecessors {
                    self.errors.push(VerifyError::PhiSourceMismatch {
                        function: name.to_owned(),
                        block: block_index,
                        sources: sources_set.iter().map(|b| b.index()).collect(),
                        predecessors: block.predecessors.iter().map(|b| b.index()).collect(),
                    });
                }

                if valid_registers {
                    let ty = type_of(Operand::Register(*destination));

                    for value in sources.values() {
                        self.expect_type(name, block_index, ty, type_of(*value));
                    }
                }
            }
            Instruction::Call {
                function: callee,
                arguments,
                ..
            } => {
                let Some(callee) = self.module.functions.get(callee) else {
                    self.errors.push(VerifyError::InvalidFunctionRef {
                        function: name.to_owned(),
                        block: block_index,
                    });
                    return;
                };

                let expected = callee.signature.parameters.len();
                let arity_matches = if callee.signature.is_variadic {
                    arguments.len() >= expected
                } else {
                    arguments.len() == expected
                };

                if !arity_matches {
                    self.errors.push(VerifyError::CallArityMismatch {
                        function: name.to_owned(),
                        block: block_index,
                        callee: callee.symbol_name.value().to_owned(),
                        expected,
                        found: arguments.len(),
                    });
                }
            }
            Instruction::Return { value } => {
                let expected = function.signature.return_type;
                let actual = match value {
                    Some(value) if valid_registers => type_of(*value),
                    Some(_) => return,
                    None => Type::Void,
                };

                if expected != actual {
                    self.errors.push(VerifyError::ReturnTypeMismatch {
                        function: name.to_owned(),
                        block: block_index,
                        expected,
                        actual,
                    });
                }
            }
            _ => {}
        }
    }

    fn check_operand(
        &mut self,
        function: &FunctionDefinition,
        name: &str,
        block: usize,
        operand: Operand,
    ) -> bool {
        let Operand::Register(register) = operand else {
            return true;
        };

        if function.registers.contains_index(register) {
            return true;
        }

        self.errors.push(VerifyError::InvalidRegisterRef {
            function: name.to_owned(),
            block,
            register: register.index(),
        });

        false
    }

    fn check_target(
        &mut self,
        function: &FunctionDefinition,
        name: &str,
        block: usize,
        target: BlockId,
    ) {
        if !function.blocks.contains_index(target) {
            self.errors.push(VerifyError::InvalidBlockRef {
                function: name.to_owned(),
                block,
                target: target.index(),
            });
        }
    }

    fn expect_type(&mut self, name: &str, block: usize, expected: Type, actual: Type) {
        if expected != actual {
            self.errors.push(VerifyError::OperandTypeMismatch {
                function: name.to_owned(),
                block,
                expected,
                actual,
            });
        }
    }
}
