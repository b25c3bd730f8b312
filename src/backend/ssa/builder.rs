use std::collections::{BTreeMap, BTreeSet};

use crate::{
    backend::{
        Backend, BackendError, BinaryOp, Immediate, IntPredicate, Linkage, Signature, Type,
        interpreter::CompiledModule,
        ssa::{
            Block, BlockId, BlockRef, FunctionDefinition, FunctionId, Instruction, Module,
            Operand, Register, RegisterId, SlotRef, StackSlot, verify::ModuleVerifier,
        },
    },
    frontend::intern::InternedSymbol,
    index::{Index, IndexVec},
};

/// Builds an [`ssa::Module`](Module) one instruction at a time
#[derive(Debug)]
pub struct SsaBackend {
    module: Module,
    next_function_id: FunctionId,
    cursor: Option<BlockRef>,
}

impl SsaBackend {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    fn function(&self, id: FunctionId) -> &FunctionDefinition {
        self.module
            .functions
            .get(&id)
            .expect("function handles should only refer to functions in the module")
    }

    fn function_mut(&mut self, id: FunctionId) -> &mut FunctionDefinition {
        self.module
            .functions
            .get_mut(&id)
            .expect("function handles should only refer to functions in the module")
    }

    fn cursor(&self) -> BlockRef {
        self.cursor
            .expect("an insertion point should be set before emitting instructions")
    }

    fn create_register(&mut self, ty: Type) -> RegisterId {
        let cursor = self.cursor();
        let function = self.function_mut(cursor.function);
        let id = function.registers.next_index();

        function.registers.push(Register { id, ty })
    }

    fn push_instruction(&mut self, instruction: Instruction) {
        let cursor = self.cursor();

        self.function_mut(cursor.function).blocks[cursor.block]
            .instructions
            .push(instruction);
    }

    /// Records the current block as a predecessor of `successor`
    fn add_edge(&mut self, successor: BlockId) {
        let cursor = self.cursor();

        self.function_mut(cursor.function).blocks[successor]
            .predecessors
            .insert(cursor.block);
    }

    fn block_in_current_function(&self, block: BlockRef) -> BlockId {
        assert_eq!(
            block.function,
            self.cursor().function,
            "control flow cannot cross function boundaries"
        );

        block.block
    }
}

impl Backend for SsaBackend {
    type Value = Operand;
    type Block = BlockRef;
    type Function = FunctionId;
    type Slot = SlotRef;
    type Program = CompiledModule;

    fn create_module(name: &str) -> Self {
        Self {
            module: Module {
                name: name.to_owned(),
                functions: BTreeMap::new(),
            },
            next_function_id: FunctionId::new(0),
            cursor: None,
        }
    }

    fn declare_function(
        &mut self,
        name: InternedSymbol,
        signature: Signature,
        linkage: Linkage,
    ) -> FunctionId {
        let id = self.next_function_id;
        self.next_function_id = id.successor();

        let mut registers = IndexVec::new();
        let parameters = signature
            .parameters
            .iter()
            .map(|ty| {
                let register = registers.next_index();
                registers.push(Register {
                    id: register,
                    ty: *ty,
                })
            })
            .collect();

        self.module.functions.insert(
            id,
            FunctionDefinition {
                id,
                symbol_name: name,
                signature,
                linkage,
                registers,
                parameters,
                slots: IndexVec::new(),
                blocks: IndexVec::new(),
            },
        );

        id
    }

    fn lookup_function(&self, name: InternedSymbol) -> Option<FunctionId> {
        self.module
            .functions
            .values()
            .find(|f| f.symbol_name == name)
            .map(|f| f.id)
    }

    fn signature(&self, function: FunctionId) -> &Signature {
        &self.function(function).signature
    }

    fn has_body(&self, function: FunctionId) -> bool {
        !self.function(function).is_declaration()
    }

    fn discard_function(&mut self, function: FunctionId) {
        if self.cursor.is_some_and(|c| c.function == function) {
            self.cursor = None;
        }

        let definition = self.function_mut(function);
        definition.blocks = IndexVec::new();
        definition.slots = IndexVec::new();
        definition
            .registers
            .raw
            .truncate(definition.parameters.len());

        // A body referring to itself was just deleted, so only outside callers
        // keep the declaration alive
        if !self.module.is_referenced(function) {
            self.module.functions.remove(&function);
        }
    }

    fn parameter(&self, function: FunctionId, index: usize) -> Operand {
        Operand::Register(self.function(function).parameters[index])
    }

    fn create_block(&mut self, function: FunctionId, label: &str) -> BlockRef {
        let definition = self.function_mut(function);
        let id = definition.blocks.next_index();

        definition.blocks.push(Block {
            id,
            label: label.to_owned(),
            instructions: Vec::new(),
            predecessors: BTreeSet::new(),
        });

        BlockRef {
            function,
            block: id,
        }
    }

    fn entry_block(&self, function: FunctionId) -> Option<BlockRef> {
        let definition = self.function(function);

        (!definition.is_declaration()).then_some(BlockRef {
            function,
            block: BlockId::new(0),
        })
    }

    fn set_insertion_point(&mut self, block: BlockRef) {
        self.cursor = Some(block);
    }

    fn insertion_block(&self) -> BlockRef {
        self.cursor()
    }

    fn value_type(&self, value: Operand) -> Type {
        self.function(self.cursor().function)
            .operand_type(value)
            .expect("values should only be used inside the function that produced them")
    }

    fn const_int(&mut self, value: i32) -> Operand {
        Operand::Immediate(Immediate::Int(value))
    }

    fn const_bool(&mut self, value: bool) -> Operand {
        Operand::Immediate(Immediate::Bool(value))
    }

    fn binary(&mut self, operator: BinaryOp, lhs: Operand, rhs: Operand) -> Operand {
        let destination = self.create_register(Type::I32);

        self.push_instruction(Instruction::BinaryOperation {
            operator,
            destination,
            lhs,
            rhs,
        });

        Operand::Register(destination)
    }

    fn compare(&mut self, predicate: IntPredicate, lhs: Operand, rhs: Operand) -> Operand {
        let destination = self.create_register(Type::I1);

        self.push_instruction(Instruction::Compare {
            predicate,
            destination,
            lhs,
            rhs,
        });

        Operand::Register(destination)
    }

    fn zero_extend(&mut self, value: Operand, ty: Type) -> Operand {
        let destination = self.create_register(ty);

        self.push_instruction(Instruction::ZeroExtend {
            destination,
            operand: value,
            ty,
        });

        Operand::Register(destination)
    }

    fn alloca(&mut self, block: BlockRef, ty: Type, name: &str) -> SlotRef {
        let definition = self.function_mut(block.function);

        let slot = definition.slots.next_index();
        definition.slots.push(StackSlot {
            id: slot,
            ty,
            name: name.to_owned(),
        });

        let instructions = &mut definition.blocks[block.block].instructions;
        let position = instructions
            .iter()
            .take_while(|i| matches!(i, Instruction::AllocStack { .. }))
            .count();

        instructions.insert(position, Instruction::AllocStack { slot });

        SlotRef {
            function: block.function,
            slot,
        }
    }

    fn load(&mut self, slot: SlotRef) -> Operand {
        let ty = self.function(slot.function).slots[slot.slot].ty;
        let destination = self.create_register(ty);

        self.push_instruction(Instruction::Load {
            destination,
            slot: slot.slot,
        });

        Operand::Register(destination)
    }

    fn store(&mut self, slot: SlotRef, value: Operand) {
        self.push_instruction(Instruction::Store {
            slot: slot.slot,
            value,
        });
    }

    fn call(&mut self, function: FunctionId, arguments: &[Operand]) -> Option<Operand> {
        let return_type = self.function(function).signature.return_type;

        let destination = (return_type != Type::Void).then(|| self.create_register(return_type));

        self.push_instruction(Instruction::Call {
            function,
            arguments: arguments.to_vec(),
            destination,
        });

        destination.map(Operand::Register)
    }

    fn jump(&mut self, destination: BlockRef) {
        let destination = self.block_in_current_function(destination);

        self.add_edge(destination);
        self.push_instruction(Instruction::Jump { destination });
    }

    fn branch(&mut self, condition: Operand, positive: BlockRef, negative: BlockRef) {
        let positive = self.block_in_current_function(positive);
        let negative = self.block_in_current_function(negative);

        self.add_edge(positive);
        self.add_edge(negative);
        self.push_instruction(Instruction::Branch {
            condition,
            positive,
            negative,
        });
    }

    fn phi(&mut self, ty: Type, incoming: &[(Operand, BlockRef)]) -> Operand {
        let destination = self.create_register(ty);

        let sources = incoming
            .iter()
            .map(|(value, block)| (self.block_in_current_function(*block), *value))
            .collect();

        self.push_instruction(Instruction::Phi {
            destination,
            sources,
        });

        Operand::Register(destination)
    }

    fn ret(&mut self, value: Option<Operand>) {
        self.push_instruction(Instruction::Return { value });
    }

    fn finalize(self) -> Result<CompiledModule, BackendError> {
        ModuleVerifier::new(&self.module)
            .verify()
            .map_err(|errors| BackendError::Verification {
                module: self.module.name.clone(),
                errors,
            })?;

        Ok(CompiledModule::new(self.module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ssa::Instruction;

    fn backend_with_function(arity: usize) -> (SsaBackend, FunctionId, BlockRef) {
        let mut backend = SsaBackend::create_module("test");
        let function = backend.declare_function(
            InternedSymbol::new("f"),
            Signature::integer_function(arity),
            Linkage::External,
        );
        let entry = backend.create_block(function, "entry");
        backend.set_insertion_point(entry);

        (backend, function, entry)
    }

    #[test]
    fn allocas_are_grouped_at_the_top_of_the_block() {
        let (mut backend, function, entry) = backend_with_function(0);

        let a = backend.alloca(entry, Type::I32, "a");
        let one = backend.const_int(1);
        backend.store(a, one);
        let b = backend.alloca(entry, Type::I32, "b");
        backend.ret(Some(one));

        let instructions = &backend.module().functions[&function].blocks[entry.block].instructions;

        assert_eq!(instructions[0], Instruction::AllocStack { slot: a.slot });
        assert_eq!(instructions[1], Instruction::AllocStack { slot: b.slot });
        assert!(matches!(instructions[2], Instruction::Store { .. }));
    }

    #[test]
    fn jumps_and_branches_record_predecessors() {
        let (mut backend, function, entry) = backend_with_function(1);

        let then_block = backend.create_block(function, "then");
        let else_block = backend.create_block(function, "else");

        let parameter = backend.parameter(function, 0);
        let zero = backend.const_int(0);
        let condition = backend.compare(IntPredicate::Ne, parameter, zero);
        backend.branch(condition, then_block, else_block);

        backend.set_insertion_point(then_block);
        backend.jump(else_block);

        let blocks = &backend.module().functions[&function].blocks;

        assert_eq!(backend.value_type(condition), Type::I1);
        assert!(blocks[then_block.block].predecessors.contains(&entry.block));
        assert_eq!(
            blocks[else_block.block]
                .predecessors
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![entry.block, then_block.block]
        );
    }

    #[test]
    fn void_calls_produce_no_value() {
        let (mut backend, _, _) = backend_with_function(0);

        let callee = backend.declare_function(
            InternedSymbol::new("_puts"),
            Signature {
                parameters: vec![Type::I32],
                return_type: Type::Void,
                is_variadic: true,
            },
            Linkage::External,
        );

        let count = backend.const_int(0);

        assert!(backend.call(callee, &[count]).is_none());
    }

    #[test]
    fn discarding_an_unreferenced_function_removes_it() {
        let (mut backend, function, _) = backend_with_function(0);

        backend.discard_function(function);

        assert!(backend.module().functions.is_empty());
        assert!(backend.lookup_function(InternedSymbol::new("f")).is_none());
    }

    #[test]
    fn discarding_a_referenced_function_keeps_its_declaration() {
        let mut backend = SsaBackend::create_module("test");
        let caller = backend.declare_function(
            InternedSymbol::new("caller"),
            Signature::integer_function(0),
            Linkage::External,
        );
        let callee = backend.declare_function(
            InternedSymbol::new("callee"),
            Signature::integer_function(0),
            Linkage::External,
        );

        let entry = backend.create_block(caller, "entry");
        backend.set_insertion_point(entry);
        let result = backend.call(callee, &[]);
        backend.ret(result);

        let callee_entry = backend.create_block(callee, "entry");
        backend.set_insertion_point(callee_entry);
        backend.discard_function(callee);

        assert_eq!(backend.lookup_function(InternedSymbol::new("callee")), Some(callee));
        assert!(!backend.has_body(callee));
        assert_eq!(backend.entry_block(callee), None);
    }
}
