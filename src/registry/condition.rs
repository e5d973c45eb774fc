//! Guarantee condition predicates.
//!
//! A guarantee may declare a condition over the closed variable set
//! `{mode, phase, skill_id, loop_id}`. Conditions are a small typed
//! expression tree, not a general expression evaluator: the variable
//! surface is known in advance and never grows at runtime.

use serde::{Deserialize, Serialize};

/// The four variables a condition may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionVar {
    Mode,
    Phase,
    SkillId,
    LoopId,
}

/// Current values of the condition variables at validation time.
#[derive(Debug, Clone, Default)]
pub struct ConditionScope {
    pub mode: String,
    pub phase: String,
    pub skill_id: String,
    pub loop_id: String,
}

impl ConditionScope {
    fn get(&self, var: ConditionVar) -> &str {
        match var {
            ConditionVar::Mode => &self.mode,
            ConditionVar::Phase => &self.phase,
            ConditionVar::SkillId => &self.skill_id,
            ConditionVar::LoopId => &self.loop_id,
        }
    }
}

/// A boolean predicate over the condition scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Variable equals a literal value
    Eq { var: ConditionVar, value: String },
    /// Variable differs from a literal value
    Ne { var: ConditionVar, value: String },
    /// Variable is one of the listed values
    In { var: ConditionVar, values: Vec<String> },
    Not { inner: Box<Condition> },
    /// All sub-conditions hold (empty = true)
    All { conditions: Vec<Condition> },
    /// At least one sub-condition holds (empty = false)
    Any { conditions: Vec<Condition> },
}

impl Condition {
    pub fn evaluate(&self, scope: &ConditionScope) -> bool {
        match self {
            Condition::Eq { var, value } => scope.get(*var) == value,
            Condition::Ne { var, value } => scope.get(*var) != value,
            Condition::In { var, values } => values.iter().any(|v| scope.get(*var) == v),
            Condition::Not { inner } => !inner.evaluate(scope),
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(scope)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(scope)),
        }
    }

    /// Convenience constructor: `var == value`.
    pub fn eq(var: ConditionVar, value: impl Into<String>) -> Self {
        Condition::Eq { var, value: value.into() }
    }
}
