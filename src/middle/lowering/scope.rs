use hashbrown::HashMap;

use crate::{backend::Backend, frontend::intern::InternedSymbol};

/// Variables visible while lowering the body of one function. Slots live in
/// the function's entry block so they are valid on every path through it.
pub struct Scope<B: Backend> {
    pub function: B::Function,
    pub entry_block: B::Block,
    /// Where the next top level expression continues. Only meaningful for
    /// the entry function, whose body is built up across many items.
    pub insertion_block: B::Block,
    pub variables: HashMap<InternedSymbol, B::Slot>,
}

impl<B: Backend> Scope<B> {
    pub fn new(function: B::Function, entry_block: B::Block) -> Self {
        Self {
            function,
            entry_block,
            insertion_block: entry_block,
            variables: HashMap::new(),
        }
    }

    pub fn lookup(&self, name: InternedSymbol) -> Option<B::Slot> {
        self.variables.get(&name).copied()
    }
}
