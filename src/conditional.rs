//! Conditional evaluator: the gate and loop test for one directive.
//!
//! One evaluator lives for the lifetime of a directive. It is asked once
//! before the first pass (for `if`, `while` and `unless`) and once after
//! every pass.

use crate::expr::{Context, Evaluator};
use crate::error::Result;
use crate::models::{Conditional, ConditionalType};

#[derive(Debug, Clone)]
pub struct ConditionalEvaluator {
    counter: u32,
    halt: bool,
    loop_limit: u32,
    dry_run: bool,
}

impl ConditionalEvaluator {
    pub fn new(loop_limit: u32, dry_run: bool) -> Self {
        ConditionalEvaluator {
            counter: 0,
            halt: false,
            loop_limit,
            dry_run,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Whether the directive should run (again).
    ///
    /// `if`/`unless` answer once and then always `false`; `while` stops once
    /// the counter exceeds the loop limit and `until` once it reaches it.
    /// Reaching the bound is a silent stop.
    pub fn evaluate(
        &mut self,
        conditional: &Conditional,
        evaluator: &dyn Evaluator,
        ctx: &mut Context<'_>,
    ) -> Result<bool> {
        let kind = conditional.kind;
        let single_shot = matches!(kind, ConditionalType::If | ConditionalType::Unless);
        if kind == ConditionalType::None || self.dry_run || (single_shot && self.halt) {
            return Ok(false);
        }
        if single_shot {
            self.halt = true;
        }
        self.counter += 1;
        match kind {
            ConditionalType::While if self.counter > self.loop_limit => return Ok(false),
            ConditionalType::Until if self.counter >= self.loop_limit => return Ok(false),
            _ => {}
        }
        let result = evaluator.evaluate_bool(&conditional.condition, ctx)?;
        Ok(match kind {
            ConditionalType::Until | ConditionalType::Unless => !result,
            _ => result,
        })
    }
}
