//! Branching and looping. Nested control flow moves the insertion point, so
//! every construct here re-reads the block it actually ended up in before
//! wiring it to a successor.

use super::{Lowerer, scope::Scope};
use crate::{
    backend::{Backend, IntPredicate, Type},
    frontend::ast::Expression,
};

impl<B: Backend> Lowerer<'_, B> {
    /// Value of the last expression, or 0 for an empty sequence
    fn lower_arm(&mut self, expressions: &[Expression], scope: &mut Scope<B>) -> Option<B::Value> {
        let mut value = Some(self.backend.const_int(0));

        for expression in expressions {
            value = self.lower_expression(expression, scope);
        }

        value
    }

    fn is_truthy(&mut self, value: B::Value) -> B::Value {
        match self.backend.value_type(value) {
            Type::I1 => {
                let false_value = self.backend.const_bool(false);
                self.backend.compare(IntPredicate::Ne, value, false_value)
            }
            _ => {
                let zero = self.backend.const_int(0);
                self.backend.compare(IntPredicate::Ne, value, zero)
            }
        }
    }

    fn is_true(&mut self, value: B::Value) -> B::Value {
        match self.backend.value_type(value) {
            Type::I1 => {
                let true_value = self.backend.const_bool(true);
                self.backend.compare(IntPredicate::Eq, value, true_value)
            }
            _ => self.is_truthy(value),
        }
    }

    pub(super) fn lower_if(
        &mut self,
        condition: &Expression,
        positive: &[Expression],
        negative: &[Expression],
        scope: &mut Scope<B>,
    ) -> Option<B::Value> {
        let condition = self.lower_expression(condition, scope)?;
        let condition = self.is_truthy(condition);

        let then_block = self.backend.create_block(scope.function, "then");
        let else_block = self.backend.create_block(scope.function, "else");

        self.backend.branch(condition, then_block, else_block);

        self.backend.set_insertion_point(then_block);
        let then_value = self.lower_arm(positive, scope);
        let then_exit = self.backend.insertion_block();

        self.backend.set_insertion_point(else_block);
        let else_value = self.lower_arm(negative, scope);
        let else_exit = self.backend.insertion_block();

        let merge_block = self.backend.create_block(scope.function, "ifcont");

        let incoming = match (then_value, else_value) {
            (Some(then_value), Some(else_value)) => {
                let mut then_value = then_value;
                let mut else_value = else_value;

                // Arms of different widths meet as i32, widened before leaving
                // their exit block
                if self.backend.value_type(then_value) != self.backend.value_type(else_value) {
                    self.backend.set_insertion_point(then_exit);
                    then_value = self.coerce_to_int(then_value);

                    self.backend.set_insertion_point(else_exit);
                    else_value = self.coerce_to_int(else_value);
                }

                Some([(then_value, then_exit), (else_value, else_exit)])
            }
            _ => None,
        };

        self.backend.set_insertion_point(then_exit);
        self.backend.jump(merge_block);

        self.backend.set_insertion_point(else_exit);
        self.backend.jump(merge_block);

        self.backend.set_insertion_point(merge_block);

        let incoming = incoming?;
        let ty = self.backend.value_type(incoming[0].0);

        Some(self.backend.phi(ty, &incoming))
    }

    /// Always yields no value
    pub(super) fn lower_for(
        &mut self,
        initializer: &Expression,
        condition: &Expression,
        step: &Expression,
        body: &[Expression],
        scope: &mut Scope<B>,
    ) -> Option<B::Value> {
        self.lower_expression(initializer, scope);

        let condition_block = self.backend.create_block(scope.function, "cond");
        let loop_block = self.backend.create_block(scope.function, "loop");
        let after_block = self.backend.create_block(scope.function, "afterloop");

        self.backend.jump(condition_block);
        self.backend.set_insertion_point(condition_block);

        match self.lower_expression(condition, scope) {
            Some(condition) => {
                let condition = self.is_true(condition);
                self.backend.branch(condition, loop_block, after_block);
            }
            None => self.backend.jump(after_block),
        }

        self.backend.set_insertion_point(loop_block);

        for expression in body {
            self.lower_expression(expression, scope);
        }

        self.lower_expression(step, scope);
        self.backend.jump(condition_block);

        self.backend.set_insertion_point(after_block);

        None
    }
}
