//! SSA IR. Mutable variables live in stack slots accessed with explicit loads
//! and stores; every register is written by exactly one instruction.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    backend::{BinaryOp, Immediate, IntPredicate, Linkage, Signature, Type},
    frontend::intern::InternedSymbol,
    index::{IndexVec, simple_index},
};

pub mod builder;
pub mod pretty_print;
pub mod verify;

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub functions: BTreeMap<FunctionId, FunctionDefinition>,
}

impl Module {
    pub fn function_by_name(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions
            .values()
            .find(|f| f.symbol_name.value() == name)
    }

    /// Whether any call instruction in the module targets `function`
    pub fn is_referenced(&self, function: FunctionId) -> bool {
        self.functions
            .values()
            .flat_map(|f| f.blocks.iter())
            .flat_map(|b| b.instructions.iter())
            .any(|i| matches!(i, Instruction::Call { function: target, .. } if *target == function))
    }
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub id: FunctionId,
    pub symbol_name: InternedSymbol,
    pub signature: Signature,
    pub linkage: Linkage,
    pub registers: IndexVec<RegisterId, Register>,
    /// Registers holding the incoming arguments, in order
    pub parameters: Vec<RegisterId>,
    pub slots: IndexVec<SlotId, StackSlot>,
    /// Empty for declarations. The first block is the entry block.
    pub blocks: IndexVec<BlockId, Block>,
}

impl FunctionDefinition {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn operand_type(&self, operand: Operand) -> Option<Type> {
        match operand {
            Operand::Immediate(immediate) => Some(immediate.ty()),
            Operand::Register(register) => self.registers.get(register).map(|r| r.ty),
        }
    }
}

#[derive(Debug)]
pub struct Block {
    pub id: BlockId,
    /// Human readable hint such as `then` or `afterloop`, not unique
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub predecessors: BTreeSet<BlockId>,
}

impl Block {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self.terminator() {
            Some(Instruction::Jump { destination }) => vec![*destination],
            Some(Instruction::Branch {
                positive, negative, ..
            }) => vec![*positive, *negative],
            _ => Vec::new(),
        }
    }
}

simple_index! {
    /// Identifies a function within a module. Ids are never reused, even
    /// after a function is removed.
    pub struct FunctionId;
}

simple_index! {
    /// Identifies a block within its function
    pub struct BlockId;
}

simple_index! {
    /// Identifies a virtual register within its function
    pub struct RegisterId;
}

simple_index! {
    /// Identifies a stack slot within its function
    pub struct SlotId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub id: RegisterId,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackSlot {
    pub id: SlotId,
    pub ty: Type,
    /// Name of the variable the slot backs
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Register(RegisterId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Zeroes the slot
    AllocStack {
        slot: SlotId,
    },
    Load {
        destination: RegisterId,
        slot: SlotId,
    },
    Store {
        slot: SlotId,
        value: Operand,
    },
    BinaryOperation {
        operator: BinaryOp,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        predicate: IntPredicate,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    ZeroExtend {
        destination: RegisterId,
        operand: Operand,
        ty: Type,
    },
    Call {
        function: FunctionId,
        arguments: Vec<Operand>,
        destination: Option<RegisterId>,
    },
    Phi {
        destination: RegisterId,
        sources: BTreeMap<BlockId, Operand>,
    },
    Jump {
        destination: BlockId,
    },
    Branch {
        condition: Operand,
        positive: BlockId,
        negative: BlockId,
    },
    Return {
        value: Option<Operand>,
    },
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. }
        )
    }

    pub fn destination(&self) -> Option<RegisterId> {
        match self {
            Self::Load { destination, .. }
            | Self::BinaryOperation { destination, .. }
            | Self::Compare { destination, .. }
            | Self::ZeroExtend { destination, .. }
            | Self::Phi { destination, .. } => Some(*destination),
            Self::Call { destination, .. } => *destination,
            Self::AllocStack { .. }
            | Self::Store { .. }
            | Self::Jump { .. }
            | Self::Branch { .. }
            | Self::Return { .. } => None,
        }
    }

    /// Every operand read by the instruction
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Self::Store { value, .. } => vec![*value],
            Self::BinaryOperation { lhs, rhs, .. } | Self::Compare { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            Self::ZeroExtend { operand, .. } => vec![*operand],
            Self::Call { arguments, .. } => arguments.clone(),
            Self::Phi { sources, .. } => sources.values().copied().collect(),
            Self::Branch { condition, .. } => vec![*condition],
            Self::Return { value } => value.iter().copied().collect(),
            Self::AllocStack { .. } | Self::Load { .. } | Self::Jump { .. } => Vec::new(),
        }
    }
}

/// A block within a specific function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub function: FunctionId,
    pub block: BlockId,
}

/// A stack slot within a specific function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub function: FunctionId,
    pub slot: SlotId,
}
