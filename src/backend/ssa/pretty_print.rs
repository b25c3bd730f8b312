use colored::Colorize;
use itertools::Itertools;

use crate::{
    backend::ssa::{
        BlockId, FunctionDefinition, Instruction, Module, Operand, RegisterId, SlotId,
    },
    index::Index,
};

pub fn pretty_print_module(module: &Module) {
    print!("{}", render_module_colored(module));
}

/// Renders the module without any terminal colors
pub fn render_module(module: &Module) -> String {
    strip_ansi_escapes::strip_str(render_module_colored(module))
}

pub fn render_module_colored(module: &Module) -> String {
    let mut output = format!("{} {}\n", "module".magenta(), module.name.blue());

    for function in module.functions.values() {
        output.push('\n');
        output.push_str(&render_function(module, function));
    }

    output
}

fn render_function(module: &Module, function: &FunctionDefinition) -> String {
    let keyword = if function.is_declaration() {
        "declare"
    } else {
        "define"
    };

    let mut parameters = function
        .parameters
        .iter()
        .map(|register| {
            format!(
                "{} {register}",
                function.registers[*register].ty.to_string().green()
            )
        })
        .collect::<Vec<_>>();

    if function.signature.is_variadic {
        parameters.push("...".to_owned());
    }

    let mut output = format!(
        "{} {} {} {}{}{}{}",
        keyword.magenta(),
        function.linkage.to_string().magenta(),
        function.signature.return_type.to_string().green(),
        "@".blue(),
        function.symbol_name.value().blue(),
        "(".white(),
        parameters.join(", "),
    );

    output.push_str(&")".white().to_string());

    if function.is_declaration() {
        output.push('\n');
        return output;
    }

    output.push_str(&" {\n".white().to_string());

    for block in function.blocks.iter() {
        let mut comment = format!("; {}", block.label);

        if !block.predecessors.is_empty() {
            comment.push_str(&format!(
                ", preds = {}",
                block.predecessors.iter().join(", ")
            ));
        }

        output.push_str(&format!(
            "{} {}\n",
            format!("{}:", block.id).bright_red(),
            comment.dimmed()
        ));

        for instruction in &block.instructions {
            output.push_str(&format!(
                "    {}\n",
                render_instruction(module, function, instruction)
            ));
        }
    }

    output.push_str(&"}\n".white().to_string());

    output
}

fn render_instruction(
    module: &Module,
    function: &FunctionDefinition,
    instruction: &Instruction,
) -> String {
    let assign = "=".white();

    match instruction {
        Instruction::AllocStack { slot } => {
            let stack_slot = &function.slots[*slot];

            format!(
                "{slot} {assign} {} {} {}",
                "alloca".cyan(),
                stack_slot.ty.to_string().green(),
                format!("; {}", stack_slot.name).dimmed()
            )
        }
        Instruction::Load { destination, slot } => {
            format!("{destination} {assign} {} {slot}", "load".cyan())
        }
        Instruction::Store { slot, value } => {
            format!("{} {slot}, {value}", "store".cyan())
        }
        Instruction::BinaryOperation {
            operator,
            destination,
            lhs,
            rhs,
        } => format!(
            "{destination} {assign} {} {lhs}, {rhs}",
            operator.to_string().cyan()
        ),
        Instruction::Compare {
            predicate,
            destination,
            lhs,
            rhs,
        } => format!(
            "{destination} {assign} {} {} {lhs}, {rhs}",
            "icmp".cyan(),
            predicate.to_string().cyan()
        ),
        Instruction::ZeroExtend {
            destination,
            operand,
            ty,
        } => format!(
            "{destination} {assign} {} {operand} {} {}",
            "zext".cyan(),
            "to".cyan(),
            ty.to_string().green()
        ),
        Instruction::Call {
            function: callee,
            arguments,
            destination,
        } => {
            let name = module
                .functions
                .get(callee)
                .map(|f| f.symbol_name.value())
                .unwrap_or("<removed>");

            let call = format!(
                "{} {}{}({})",
                "call".cyan(),
                "@".blue(),
                name.blue(),
                arguments.iter().join(", ")
            );

            match destination {
                Some(destination) => format!("{destination} {assign} {call}"),
                None => call,
            }
        }
        Instruction::Phi {
            destination,
            sources,
        } => format!(
            "{destination} {assign} {} {} {}",
            "phi".bright_green(),
            function.registers[*destination].ty.to_string().green(),
            sources
                .iter()
                .map(|(block, value)| format!("[{block}: {value}]"))
                .join(", ")
        ),
        Instruction::Jump { destination } => format!("{} {destination}", "jmp".cyan()),
        Instruction::Branch {
            condition,
            positive,
            negative,
        } => format!("{} {condition}, {positive}, {negative}", "br".cyan()),
        Instruction::Return { value: Some(value) } => format!("{} {value}", "ret".cyan()),
        Instruction::Return { value: None } => format!("{} {}", "ret".cyan(), "void".green()),
    }
}

impl core::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("%{}", self.index()).yellow())
    }
}

impl core::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("${}", self.index()).yellow())
    }
}

impl core::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.index())
    }
}

impl core::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Immediate(immediate) => write!(f, "{}", immediate.to_string().purple()),
            Operand::Register(register) => write!(f, "{register}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        backend::{Backend, Linkage, Signature, Type, ssa::builder::SsaBackend},
        frontend::intern::InternedSymbol,
    };

    #[test]
    fn renders_functions_and_declarations() {
        let mut backend = SsaBackend::create_module("demo");
        let puts = backend.declare_function(
            InternedSymbol::new("_puts"),
            Signature {
                parameters: vec![Type::I32],
                return_type: Type::Void,
                is_variadic: true,
            },
            Linkage::External,
        );
        let double = backend.declare_function(
            InternedSymbol::new("double"),
            Signature::integer_function(1),
            Linkage::External,
        );

        let entry = backend.create_block(double, "entry");
        backend.set_insertion_point(entry);
        let slot = backend.alloca(entry, Type::I32, "a");
        let parameter = backend.parameter(double, 0);
        backend.store(slot, parameter);
        let a = backend.load(slot);
        let two = backend.const_int(2);
        let product = backend.binary(crate::backend::BinaryOp::Multiply, a, two);
        let one = backend.const_int(1);
        backend.call(puts, &[one, product]);
        backend.ret(Some(product));

        let rendered = render_module(backend.module());

        assert_eq!(
            rendered,
            indoc! {"
                module demo

                declare external void @_puts(i32 %0, ...)

                define external i32 @double(i32 %0) {
                bb0: ; entry
                    $0 = alloca i32 ; a
                    store $0, %0
                    %1 = load $0
                    %2 = mul %1, 2
                    call @_puts(1, %2)
                    ret %2
                }
            "}
        );
    }
}
