//! Lowers the syntax tree into IR through a [`Backend`]. Every lowering
//! operation hands back the value it produced, with `None` meaning the
//! expression has no usable value (a diagnostic was reported somewhere
//! beneath it, or it is a loop).

use hashbrown::HashMap;

use crate::{
    backend::{Backend, BinaryOp, IntPredicate, Linkage, Signature, Type, runtime::RUNTIME_FUNCTIONS},
    config::Config,
    diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink},
    frontend::{
        SourceFile,
        ast::{
            ArithmeticOperator, ComparisonOperator, Expression, ExpressionKind, Function,
            FunctionPrototype, Identifier, Item, ItemKind,
        },
        intern::InternedSymbol,
    },
    log_dbg, log_trc, report_diagnostic,
};

pub mod control_flow;
pub mod scope;

use self::scope::Scope;

/// The implicit function hosting every top level expression
pub const ENTRY_FUNCTION_NAME: &str = "main";

pub struct Lowerer<'a, B: Backend> {
    backend: B,
    config: &'a Config,
    /// Functions callable by name, including runtime functions under the
    /// name programs use for them
    functions: HashMap<InternedSymbol, B::Function>,
    entry_function: B::Function,
    diagnostics: DiagnosticSink<'a>,
}

pub struct LoweringOutput<B> {
    pub backend: B,
    pub diagnostics: Vec<Diagnostic>,
}

fn is_reserved(name: &str) -> bool {
    name == ENTRY_FUNCTION_NAME
        || RUNTIME_FUNCTIONS
            .iter()
            .any(|(alias, function)| *alias == name || function.symbol == name)
}

impl<'a, B: Backend> Lowerer<'a, B> {
    /// Declares the runtime functions and opens the entry function
    pub fn new(mut backend: B, source_file: &'a SourceFile, config: &'a Config) -> Self {
        let mut functions = HashMap::new();

        for (alias, runtime_function) in RUNTIME_FUNCTIONS.iter() {
            let declared = backend.declare_function(
                InternedSymbol::new(runtime_function.symbol),
                runtime_function.signature.clone(),
                Linkage::External,
            );

            functions.insert(InternedSymbol::new(alias), declared);
        }

        let entry_function = backend.declare_function(
            InternedSymbol::new(ENTRY_FUNCTION_NAME),
            Signature {
                parameters: Vec::new(),
                return_type: Type::Void,
                is_variadic: false,
            },
            Linkage::Local,
        );

        let entry_block = backend.create_block(entry_function, "entry");
        backend.set_insertion_point(entry_block);

        Self {
            backend,
            config,
            functions,
            entry_function,
            diagnostics: DiagnosticSink::new(source_file, config.quiet),
        }
    }

    /// Scope of the entry function, to be threaded through every top level
    /// item and handed back to [`Lowerer::finish`]
    pub fn entry_scope(&self) -> Scope<B> {
        let entry_block = self
            .backend
            .entry_block(self.entry_function)
            .expect("the entry function is created with an entry block");

        Scope::new(self.entry_function, entry_block)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.diagnostics()
    }

    pub fn lower_item(&mut self, item: &Item, scope: &mut Scope<B>) {
        match &item.kind {
            ItemKind::Prototype(prototype) => {
                self.lower_prototype(prototype);
            }
            ItemKind::Function(function) => {
                self.lower_function(function);
            }
            ItemKind::TopLevelExpression(expression) => {
                self.backend.set_insertion_point(scope.insertion_block);
                let value = self.lower_expression(expression, scope);
                scope.insertion_block = self.backend.insertion_block();

                log_trc!(self.config, "top level expression produced {:?}", value);
            }
        }
    }

    /// Terminates the entry function and gives up the backend
    pub fn finish(mut self, entry_scope: Scope<B>) -> LoweringOutput<B> {
        self.backend.set_insertion_point(entry_scope.insertion_block);
        self.backend.ret(None);

        LoweringOutput {
            backend: self.backend,
            diagnostics: self.diagnostics.into_diagnostics(),
        }
    }

    fn lower_prototype(&mut self, prototype: &FunctionPrototype) -> Option<B::Function> {
        let name = prototype.name.symbol;

        if is_reserved(name.value()) {
            report_diagnostic!(
                self.diagnostics,
                DiagnosticKind::ReservedName,
                prototype.name.span,
                "`{}` is a reserved name",
                name
            );
            return None;
        }

        for (index, parameter) in prototype.parameters.iter().enumerate() {
            if prototype.parameters[..index]
                .iter()
                .any(|earlier| earlier.symbol == parameter.symbol)
            {
                report_diagnostic!(
                    self.diagnostics,
                    DiagnosticKind::DuplicateParameter,
                    parameter.span,
                    "parameter `{}` of function `{}` is declared more than once",
                    parameter.symbol,
                    name
                );
                return None;
            }
        }

        let arity = prototype.parameters.len();

        // A function discarded after being called is no longer in the table
        // but still declared in the module
        let existing = self
            .functions
            .get(&name)
            .copied()
            .or_else(|| self.backend.lookup_function(name));

        if let Some(existing) = existing {
            if self.backend.has_body(existing) {
                report_diagnostic!(
                    self.diagnostics,
                    DiagnosticKind::FunctionRedefinition,
                    prototype.name.span,
                    "function `{}` is already defined",
                    name
                );
                return None;
            }

            let declared_arity = self.backend.signature(existing).parameters.len();

            if declared_arity != arity {
                report_diagnostic!(
                    self.diagnostics,
                    DiagnosticKind::FunctionRedefinition,
                    prototype.span,
                    "function `{}` was declared with {} parameter(s) but is redeclared with {}",
                    name,
                    declared_arity,
                    arity
                );
                return None;
            }

            self.functions.insert(name, existing);
            return Some(existing);
        }

        let declared = self.backend.declare_function(
            name,
            Signature::integer_function(arity),
            Linkage::External,
        );
        self.functions.insert(name, declared);

        log_dbg!(self.config, "declared function `{}` with {} parameter(s)", name, arity);

        Some(declared)
    }

    fn lower_function(&mut self, function: &Function) -> Option<B::Function> {
        let prototype = &function.prototype;
        let declared = self.lower_prototype(prototype)?;

        let entry_block = self.backend.create_block(declared, "entry");
        self.backend.set_insertion_point(entry_block);

        let mut scope = Scope::new(declared, entry_block);

        for (index, parameter) in prototype.parameters.iter().enumerate() {
            let slot = self
                .backend
                .alloca(entry_block, Type::I32, parameter.symbol.value());
            let argument = self.backend.parameter(declared, index);

            self.backend.store(slot, argument);
            scope.variables.insert(parameter.symbol, slot);
        }

        let Some(value) = self.lower_expression(&function.body, &mut scope) else {
            report_diagnostic!(
                self.diagnostics,
                DiagnosticKind::MalformedFunctionBody,
                function.body.span,
                "body of function `{}` does not produce a value",
                prototype.name.symbol
            );

            self.functions.remove(&prototype.name.symbol);
            self.backend.discard_function(declared);

            return None;
        };

        let value = self.coerce_to_int(value);
        self.backend.ret(Some(value));

        log_dbg!(self.config, "lowered function `{}`", prototype.name.symbol);

        Some(declared)
    }

    pub fn lower_expression(
        &mut self,
        expression: &Expression,
        scope: &mut Scope<B>,
    ) -> Option<B::Value> {
        match &expression.kind {
            ExpressionKind::IntegerConstant(value) => Some(self.backend.const_int(*value)),
            ExpressionKind::Binary { lhs, operator, rhs } => {
                // Both sides are lowered even if the first is absent so each
                // reports its own diagnostics
                let lhs = self.lower_expression(lhs, scope);
                let rhs = self.lower_expression(rhs, scope);

                let lhs = self.coerce_to_int(lhs?);
                let rhs = self.coerce_to_int(rhs?);

                let operator = match operator {
                    ArithmeticOperator::Add => BinaryOp::Add,
                    ArithmeticOperator::Subtract => BinaryOp::Subtract,
                    ArithmeticOperator::Multiply => BinaryOp::Multiply,
                };

                Some(self.backend.binary(operator, lhs, rhs))
            }
            ExpressionKind::Comparison { lhs, operator, rhs } => {
                let lhs = self.lower_expression(lhs, scope);
                let rhs = self.lower_expression(rhs, scope);

                let lhs = self.coerce_to_int(lhs?);
                let rhs = self.coerce_to_int(rhs?);

                let predicate = match operator {
                    ComparisonOperator::GreaterThan => IntPredicate::Sgt,
                    ComparisonOperator::LessThan => IntPredicate::Slt,
                    ComparisonOperator::Equals => IntPredicate::Eq,
                    ComparisonOperator::GreaterThanOrEqualTo => IntPredicate::Sge,
                    ComparisonOperator::LessThanOrEqualTo => IntPredicate::Sle,
                };

                Some(self.backend.compare(predicate, lhs, rhs))
            }
            ExpressionKind::Variable(identifier) => self.lower_variable(*identifier, scope),
            ExpressionKind::Assignment { target, value } => {
                self.lower_assignment(*target, value, scope)
            }
            ExpressionKind::If {
                condition,
                positive,
                negative,
            } => self.lower_if(condition, positive, negative, scope),
            ExpressionKind::For {
                initializer,
                condition,
                step,
                body,
            } => self.lower_for(initializer, condition, step, body, scope),
            ExpressionKind::FunctionCall { callee, arguments } => {
                self.lower_function_call(*callee, arguments, scope)
            }
        }
    }

    fn coerce_to_int(&mut self, value: B::Value) -> B::Value {
        match self.backend.value_type(value) {
            Type::I1 => self.backend.zero_extend(value, Type::I32),
            _ => value,
        }
    }

    fn lower_variable(&mut self, identifier: Identifier, scope: &Scope<B>) -> Option<B::Value> {
        let Some(slot) = scope.lookup(identifier.symbol) else {
            report_diagnostic!(
                self.diagnostics,
                DiagnosticKind::UndefinedVariable,
                identifier.span,
                "variable `{}` is undefined",
                identifier.symbol
            );
            return None;
        };

        Some(self.backend.load(slot))
    }

    fn lower_assignment(
        &mut self,
        target: Identifier,
        value: &Expression,
        scope: &mut Scope<B>,
    ) -> Option<B::Value> {
        let slot = match scope.lookup(target.symbol) {
            Some(slot) => slot,
            None => {
                let slot =
                    self.backend
                        .alloca(scope.entry_block, Type::I32, target.symbol.value());
                scope.variables.insert(target.symbol, slot);
                slot
            }
        };

        let value = self.lower_expression(value, scope)?;
        let value = self.coerce_to_int(value);

        self.backend.store(slot, value);

        // The stored value itself, so `x = y = 1` chains without a reload
        Some(value)
    }

    fn lower_function_call(
        &mut self,
        callee: Identifier,
        arguments: &[Expression],
        scope: &mut Scope<B>,
    ) -> Option<B::Value> {
        let Some(function) = self.functions.get(&callee.symbol).copied() else {
            report_diagnostic!(
                self.diagnostics,
                DiagnosticKind::UndefinedFunction,
                callee.span,
                "function `{}` is undefined",
                callee.symbol
            );
            return None;
        };

        let mut values = Vec::with_capacity(arguments.len() + 1);
        let mut all_present = true;

        for argument in arguments {
            match self.lower_expression(argument, scope) {
                Some(value) => values.push(self.coerce_to_int(value)),
                None => all_present = false,
            }
        }

        if !all_present {
            return None;
        }

        let signature = self.backend.signature(function);
        let fixed = signature.visible_arity();
        let is_variadic = signature.is_variadic;

        let arity_matches = if is_variadic {
            values.len() >= fixed
        } else {
            values.len() == fixed
        };

        if !arity_matches {
            report_diagnostic!(
                self.diagnostics,
                DiagnosticKind::ArgumentCountMismatch,
                callee.span,
                "function `{}` expects {}{} argument(s) but was given {}",
                callee.symbol,
                if is_variadic { "at least " } else { "" },
                fixed,
                values.len()
            );
            return None;
        }

        if is_variadic {
            let count = self.backend.const_int((values.len() - fixed) as i32);
            values.insert(fixed, count);
        }

        self.backend.call(function, &values)
    }
}
