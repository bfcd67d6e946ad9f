//! Operation descriptors stored in a registry.
//!
//! Every name registered through `Registry::add_validator` or
//! `Registry::add_manipulator` maps to one [`Operation`]. Chains dispatch
//! through this table instead of carrying a method per operation.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// A predicate over the subject and the call arguments.
pub type PredicateFn = Arc<dyn Fn(&Value, &[Value]) -> bool + Send + Sync>;

/// A transform over the subject and the call arguments.
pub type TransformFn = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

/// Message used by manipulations that fail without a configured message.
pub const DEFAULT_MANIPULATION_MESSAGE: &str = "be able to be manipulated";

/// Names that can never be registered because chains or registries already
/// use them.
pub const RESERVED_NAMES: &[&str] = &[
    "a",
    "an",
    "and",
    "or",
    "not",
    "run",
    "property",
    "property_named",
    "manipulate",
    "manipulate_checked",
    "validate",
    "validate_with_message",
    "up",
    "root",
    "stop",
    "resume",
    "stop_if_invalid",
    "clear",
    "throw_if_invalid",
    "value",
    "final_value",
    "name",
    "valid",
    "error_count",
    "test_count",
    "error_list",
    "error_message",
    "error_format",
    "prop_format",
    "into_validation",
    "that",
    "new_chain",
    "add_validator",
    "add_manipulator",
    "check",
    "apply",
    "clear_all",
    "total_valid",
    "total_test_count",
    "total_error_count",
    "all_error_messages",
    "throw_if_any_invalid",
];

/// Returns true if `name` is claimed by the chain or registry surface.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Marks a manipulation result as a failed transform.
///
/// # Example
///
/// ```rust
/// use affirm::FailWhen;
/// use serde_json::{json, Value};
///
/// let sentinel = FailWhen::value(Value::Null);
/// assert!(sentinel.matches(&Value::Null));
/// assert!(!sentinel.matches(&json!(0)));
///
/// let negative = FailWhen::predicate(|v| v.as_f64().is_some_and(|n| n < 0.0));
/// assert!(negative.matches(&json!(-1)));
/// ```
#[derive(Clone)]
pub enum FailWhen {
    /// The result equals this exact value.
    Value(Value),
    /// The predicate returns true for the result.
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl FailWhen {
    /// Fails when the result equals `value`.
    pub fn value(value: impl Into<Value>) -> Self {
        FailWhen::Value(value.into())
    }

    /// Fails when `predicate` holds for the result.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        FailWhen::Predicate(Arc::new(predicate))
    }

    /// Returns true if `result` is a failed transform.
    pub fn matches(&self, result: &Value) -> bool {
        match self {
            FailWhen::Value(expected) => expected == result,
            FailWhen::Predicate(predicate) => predicate(result),
        }
    }
}

impl From<Value> for FailWhen {
    fn from(value: Value) -> Self {
        FailWhen::Value(value)
    }
}

impl fmt::Debug for FailWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailWhen::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FailWhen::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Registration options for a validator.
///
/// `arity` is the number of arguments the predicate takes after the subject.
/// A chain call that passes more arguments than that treats the last one as
/// an override message template.
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    pub(crate) arity: usize,
    pub(crate) fail_message: Option<String>,
}

impl ValidatorOptions {
    /// Creates options for a predicate taking `arity` arguments.
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            fail_message: None,
        }
    }

    /// Sets the default failure template (`{1}`, `{2}` refer to arguments).
    pub fn fail_message(mut self, message: impl Into<String>) -> Self {
        self.fail_message = Some(message.into());
        self
    }
}

/// Registration options for a manipulator.
#[derive(Debug, Clone, Default)]
pub struct ManipulatorOptions {
    pub(crate) fail_when: Option<FailWhen>,
    pub(crate) fail_message: Option<String>,
}

impl ManipulatorOptions {
    /// Creates options with no failure sentinel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sentinel marking a failed transform.
    pub fn fail_when(mut self, fail_when: impl Into<FailWhen>) -> Self {
        self.fail_when = Some(fail_when.into());
        self
    }

    /// Sets the message recorded when the sentinel matches.
    pub fn fail_message(mut self, message: impl Into<String>) -> Self {
        self.fail_message = Some(message.into());
        self
    }
}

/// A registered operation.
#[derive(Clone)]
pub enum Operation {
    /// A predicate with its failure template.
    Validator {
        predicate: PredicateFn,
        arity: usize,
        fail_message: String,
    },
    /// A transform with its optional failure sentinel.
    Manipulator {
        transform: TransformFn,
        fail_when: Option<FailWhen>,
        fail_message: String,
    },
}

impl Operation {
    pub(crate) fn validator(name: &str, predicate: PredicateFn, options: ValidatorOptions) -> Self {
        Operation::Validator {
            predicate,
            arity: options.arity,
            fail_message: options
                .fail_message
                .unwrap_or_else(|| format!("pass {} test", name)),
        }
    }

    pub(crate) fn manipulator(transform: TransformFn, options: ManipulatorOptions) -> Self {
        Operation::Manipulator {
            transform,
            fail_when: options.fail_when,
            fail_message: options
                .fail_message
                .unwrap_or_else(|| DEFAULT_MANIPULATION_MESSAGE.to_string()),
        }
    }

    /// Returns `"validator"` or `"manipulator"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Validator { .. } => "validator",
            Operation::Manipulator { .. } => "manipulator",
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Validator {
                arity,
                fail_message,
                ..
            } => f
                .debug_struct("Validator")
                .field("arity", arity)
                .field("fail_message", fail_message)
                .finish_non_exhaustive(),
            Operation::Manipulator {
                fail_when,
                fail_message,
                ..
            } => f
                .debug_struct("Manipulator")
                .field("fail_when", fail_when)
                .field("fail_message", fail_message)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("or"));
        assert!(is_reserved("and"));
        assert!(is_reserved("error_message"));
        assert!(!is_reserved("even"));
    }

    #[test]
    fn test_validator_default_message_uses_name() {
        let op = Operation::validator("even", Arc::new(|_: &Value, _: &[Value]| true), ValidatorOptions::default());
        match op {
            Operation::Validator { fail_message, arity, .. } => {
                assert_eq!(fail_message, "pass even test");
                assert_eq!(arity, 0);
            }
            _ => panic!("expected validator"),
        }
    }

    #[test]
    fn test_manipulator_options() {
        let op = Operation::manipulator(
            Arc::new(|v: &Value, _: &[Value]| v.clone()),
            ManipulatorOptions::new()
                .fail_when(Value::Null)
                .fail_message("be a number"),
        );
        assert_eq!(op.kind(), "manipulator");
        match op {
            Operation::Manipulator { fail_when, fail_message, .. } => {
                assert!(fail_when.unwrap().matches(&Value::Null));
                assert_eq!(fail_message, "be a number");
            }
            _ => panic!("expected manipulator"),
        }
    }

    #[test]
    fn test_fail_when_value_vs_predicate() {
        let exact = FailWhen::value(json!("nope"));
        assert!(exact.matches(&json!("nope")));
        assert!(!exact.matches(&json!("yes")));

        let empty = FailWhen::predicate(|v| v.as_str() == Some(""));
        assert!(empty.matches(&json!("")));
        assert!(!empty.matches(&json!("x")));
    }
}
