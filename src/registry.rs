//! Operation registry and open-chain aggregation.
//!
//! This module provides the [`Registry`] type. A registry holds the table of
//! named validators and manipulators every chain dispatches through, and it
//! tracks the top-level chains opened since the last [`Registry::clear_all`]
//! so a whole batch can be checked at once.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::chain::{Chain, SentenceFormats};
use crate::error::{ValidationError, ValidationErrors};
use crate::format::display_value;
use crate::operation::{
    is_reserved, ManipulatorOptions, Operation, PredicateFn, TransformFn, ValidatorOptions,
};

/// Shared, ordered table of registered operations.
pub(crate) type OperationTable = Arc<RwLock<IndexMap<String, Operation>>>;

/// A thread-safe registry of operations and open chains.
///
/// Every name registered with [`add_validator`](Registry::add_validator) or
/// [`add_manipulator`](Registry::add_manipulator) is available both as a
/// standalone call ([`check`](Registry::check) / [`apply`](Registry::apply))
/// and as a chain step through [`Chain::run`].
///
/// # Thread Safety
///
/// The registry uses `Arc` around `parking_lot` locks. Clones share the same
/// operations and open chains. A chain is still meant to be driven by one
/// owner at a time.
///
/// # Example
///
/// ```rust
/// use affirm::{Registry, ValidatorOptions};
/// use serde_json::json;
///
/// let is = Registry::new();
/// is.add_validator(
///     "even",
///     |v, _| v.as_i64().is_some_and(|n| n % 2 == 0),
///     ValidatorOptions::new(0).fail_message("be even"),
/// )
/// .unwrap();
///
/// is.that(json!(3), "count").run("even", &[]);
/// is.that(json!(4), "total").run("even", &[]);
///
/// assert!(!is.total_valid());
/// assert_eq!(is.all_error_messages(), vec!["count must be even"]);
/// ```
#[derive(Debug)]
pub struct Registry {
    operations: OperationTable,
    open_chains: Arc<Mutex<Vec<Chain>>>,
    formats: SentenceFormats,
}

impl Registry {
    /// Creates a registry with no operations.
    pub fn new() -> Self {
        Self {
            operations: Arc::new(RwLock::new(IndexMap::new())),
            open_chains: Arc::new(Mutex::new(Vec::new())),
            formats: SentenceFormats::default(),
        }
    }

    /// Creates a registry preloaded with the built-in validators and
    /// manipulators.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtins::install(&registry);
        registry
    }

    /// The process-wide default registry, preloaded with the built-ins.
    ///
    /// Created on first use. Independent registries come from
    /// [`create`](Registry::create).
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_builtins)
    }

    /// Creates an independent registry with the built-ins and this
    /// registry's sentence templates, sharing no operations or chains.
    pub fn create(&self) -> Self {
        let mut registry = Self::with_builtins();
        registry.formats = self.formats.clone();
        registry
    }

    /// Sets the top-level sentence template handed to new chains.
    ///
    /// The default is `"{0} must {1}"`, where `{0}` is the chain name and
    /// `{1}` the list of failures.
    pub fn with_error_format(mut self, template: impl Into<String>) -> Self {
        self.formats.error = template.into();
        self
    }

    /// Sets the child clause template handed to new chains.
    ///
    /// The default is `"have a {0} which must {1}"`.
    pub fn with_prop_format(mut self, template: impl Into<String>) -> Self {
        self.formats.prop = template.into();
        self
    }

    /// Opens a chain over `value` labelled `name`.
    pub fn that(&self, value: Value, name: &str) -> Chain {
        self.open(value, name.to_string())
    }

    /// Opens a chain over `value`, labelled `name` or the value's own text.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// let chain = is.new_chain(json!("abc"), None);
    /// chain.run("number", &[]);
    ///
    /// assert_eq!(chain.error_message().unwrap(), "abc must be numeric");
    /// ```
    pub fn new_chain(&self, value: Value, name: Option<&str>) -> Chain {
        let name = match name {
            Some(name) => name.to_string(),
            None => display_value(&value),
        };
        self.open(value, name)
    }

    fn open(&self, value: Value, name: String) -> Chain {
        tracing::trace!(chain = %name, "opening chain");
        let chain = Chain::new(
            value,
            name,
            Arc::clone(&self.operations),
            self.formats.clone(),
        );
        self.open_chains.lock().push(chain.clone());
        chain
    }

    /// Registers a validator under `name`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NamingConflict` if `name` is already registered
    /// or reserved by the chain/registry surface. Existing registrations are
    /// left untouched.
    pub fn add_validator<F>(
        &self,
        name: &str,
        predicate: F,
        options: ValidatorOptions,
    ) -> Result<&Self, RegistryError>
    where
        F: Fn(&Value, &[Value]) -> bool + Send + Sync + 'static,
    {
        let predicate: PredicateFn = Arc::new(predicate);
        self.insert(name, Operation::validator(name, predicate, options))
    }

    /// Registers a manipulator under `name`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NamingConflict` if `name` is already registered
    /// or reserved.
    pub fn add_manipulator<F>(
        &self,
        name: &str,
        transform: F,
        options: ManipulatorOptions,
    ) -> Result<&Self, RegistryError>
    where
        F: Fn(&Value, &[Value]) -> Value + Send + Sync + 'static,
    {
        let transform: TransformFn = Arc::new(transform);
        self.insert(name, Operation::manipulator(transform, options))
    }

    fn insert(&self, name: &str, operation: Operation) -> Result<&Self, RegistryError> {
        let mut operations = self.operations.write();

        if is_reserved(name) || operations.contains_key(name) {
            tracing::warn!(operation = name, "operation name already taken");
            return Err(RegistryError::NamingConflict(name.to_string()));
        }

        tracing::debug!(operation = name, kind = operation.kind(), "registered operation");
        operations.insert(name.to_string(), operation);
        Ok(self)
    }

    /// Returns the operation registered under `name`.
    pub fn get(&self, name: &str) -> Option<Operation> {
        self.operations.read().get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.read().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.read().keys().cloned().collect()
    }

    /// Runs validator `name` outside of any chain.
    ///
    /// Message templates play no part here; extra arguments are passed
    /// through to the predicate.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownOperation` for an unregistered name and
    /// `RegistryError::WrongKind` if `name` is a manipulator.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// assert!(is.check("less_than", &json!(3), &[json!(5)]).unwrap());
    /// assert!(is.check("missing", &json!(3), &[]).is_err());
    /// ```
    pub fn check(&self, name: &str, value: &Value, args: &[Value]) -> Result<bool, RegistryError> {
        match self.get(name) {
            Some(Operation::Validator { predicate, .. }) => Ok(predicate(value, args)),
            Some(Operation::Manipulator { .. }) => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "validator",
            }),
            None => Err(RegistryError::UnknownOperation(name.to_string())),
        }
    }

    /// Runs manipulator `name` outside of any chain and returns its result,
    /// failure sentinel included.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownOperation` for an unregistered name and
    /// `RegistryError::WrongKind` if `name` is a validator.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> Result<Value, RegistryError> {
        match self.get(name) {
            Some(Operation::Manipulator { transform, .. }) => Ok(transform(value, args)),
            Some(Operation::Validator { .. }) => Err(RegistryError::WrongKind {
                name: name.to_string(),
                expected: "manipulator",
            }),
            None => Err(RegistryError::UnknownOperation(name.to_string())),
        }
    }

    /// Forgets every open chain. Chains already handed out keep their state.
    pub fn clear_all(&self) -> &Self {
        let dropped = std::mem::take(&mut *self.open_chains.lock());
        tracing::debug!(chains = dropped.len(), "cleared open chains");
        self
    }

    fn snapshot(&self) -> Vec<Chain> {
        self.open_chains.lock().clone()
    }

    /// Number of chains opened since the last [`clear_all`](Registry::clear_all).
    pub fn open_chain_count(&self) -> usize {
        self.open_chains.lock().len()
    }

    /// Returns true if every open chain is valid.
    pub fn total_valid(&self) -> bool {
        self.snapshot().iter().all(Chain::valid)
    }

    /// Tests run across every open chain and its descendants.
    pub fn total_test_count(&self) -> usize {
        self.snapshot().iter().map(Chain::test_count).sum()
    }

    /// Failures recorded across every open chain and its descendants.
    pub fn total_error_count(&self) -> usize {
        self.snapshot().iter().map(Chain::error_count).sum()
    }

    /// One sentence per invalid open chain, in opening order.
    pub fn all_error_messages(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter_map(Chain::error_message)
            .collect()
    }

    /// Returns every failure as one error if any open chain is invalid.
    ///
    /// The open chains are cleared before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] with one entry per invalid chain.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// is.that(json!("abc"), "name").run("string", &[]);
    /// is.that(json!("abc"), "age").run("number", &[]);
    ///
    /// let errors = is.throw_if_any_invalid().unwrap_err();
    /// assert_eq!(errors.messages(), vec!["age must be numeric"]);
    /// assert_eq!(is.open_chain_count(), 0);
    /// ```
    pub fn throw_if_any_invalid(&self) -> Result<&Self, ValidationErrors> {
        if self.total_error_count() == 0 {
            return Ok(self);
        }

        let failures: Vec<ValidationError> = self
            .snapshot()
            .iter()
            .filter_map(|chain| {
                chain
                    .error_message()
                    .map(|message| ValidationError::new(chain.name(), message))
            })
            .collect();
        self.clear_all();

        tracing::debug!(failures = failures.len(), "open chains are invalid");
        match ValidationErrors::from_vec(failures) {
            Some(errors) => Err(errors),
            None => Ok(self),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            operations: Arc::clone(&self.operations),
            open_chains: Arc::clone(&self.open_chains),
            formats: self.formats.clone(),
        }
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Attempted to register a name that is taken or reserved.
    #[error("operation '{0}' conflicts with an existing name")]
    NamingConflict(String),

    /// Attempted to run a name that was never registered.
    #[error("operation '{0}' not found")]
    UnknownOperation(String),

    /// Attempted to run an operation as the wrong kind.
    #[error("operation '{name}' is not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn even(v: &Value, _: &[Value]) -> bool {
        v.as_i64().is_some_and(|n| n % 2 == 0)
    }

    #[test]
    fn test_naming_conflict_keeps_first() {
        let is = Registry::new();
        is.add_validator("even", even, ValidatorOptions::default())
            .unwrap();

        let result = is.add_validator("even", |_, _| true, ValidatorOptions::default());
        assert_eq!(result.err(), Some(RegistryError::NamingConflict("even".into())));

        assert!(!is.check("even", &json!(3), &[]).unwrap());
    }

    #[test]
    fn test_reserved_names_rejected() {
        let is = Registry::new();
        assert!(is
            .add_manipulator("and", |v, _| v.clone(), ManipulatorOptions::new())
            .is_err());
        assert!(is
            .add_validator("error_message", even, ValidatorOptions::default())
            .is_err());
        assert!(!is.has_operation("and"));
    }

    #[test]
    fn test_validator_and_manipulator_share_namespace() {
        let is = Registry::new();
        is.add_manipulator("squared", |v, _| json!(v.as_i64().unwrap_or(0).pow(2)), ManipulatorOptions::new())
            .unwrap();
        assert!(is
            .add_validator("squared", even, ValidatorOptions::default())
            .is_err());
        assert_eq!(is.apply("squared", &json!(5), &[]).unwrap(), json!(25));
    }

    #[test]
    fn test_wrong_kind() {
        let is = Registry::new();
        is.add_validator("even", even, ValidatorOptions::default())
            .unwrap();

        assert!(matches!(
            is.apply("even", &json!(2), &[]),
            Err(RegistryError::WrongKind { .. })
        ));
        assert_eq!(
            is.check("nope", &json!(2), &[]),
            Err(RegistryError::UnknownOperation("nope".into()))
        );
    }

    #[test]
    fn test_operation_names_keep_order() {
        let is = Registry::new();
        is.add_validator("b", even, ValidatorOptions::default())
            .unwrap()
            .add_validator("a", even, ValidatorOptions::default())
            .unwrap();
        assert_eq!(is.operation_names(), vec!["b", "a"]);
    }

    #[test]
    fn test_totals_across_open_chains() {
        let is = Registry::new();
        is.add_validator("even", even, ValidatorOptions::new(0).fail_message("be even"))
            .unwrap();

        is.that(json!(2), "a").run("even", &[]);
        is.that(json!(3), "b").run("even", &[]).run("even", &[]);
        is.that(json!({"c": 5}), "obj").property("c").run("even", &[]);

        assert!(!is.total_valid());
        assert_eq!(is.total_test_count(), 4);
        assert_eq!(is.total_error_count(), 3);
        assert_eq!(
            is.all_error_messages(),
            vec![
                "b must be even and be even",
                "obj must have a c which must be even"
            ]
        );
    }

    #[test]
    fn test_clear_all_does_not_touch_handed_out_chains() {
        let is = Registry::new();
        let chain = is.that(json!(1), "n");
        chain.validate(|_| false);

        is.clear_all();
        assert_eq!(is.open_chain_count(), 0);
        assert!(is.total_valid());
        assert_eq!(chain.error_count(), 1);
    }

    #[test]
    fn test_throw_if_any_invalid_ok_when_valid() {
        let is = Registry::new();
        is.that(json!(1), "n").validate(|_| true);
        assert!(is.throw_if_any_invalid().is_ok());
        assert_eq!(is.open_chain_count(), 1);
    }

    #[test]
    fn test_registry_formats_reach_chains() {
        let is = Registry::new()
            .with_error_format("{0} is wrong: {1}")
            .with_prop_format("its {0} should {1}");
        let chain = is.that(json!({"a": 1}), "obj");
        chain.property("a").validate_with_message(|_| false, "be text");

        assert_eq!(chain.error_message().unwrap(), "obj is wrong: its a should be text");
    }

    #[test]
    fn test_create_is_independent() {
        let first = Registry::new();
        first
            .add_validator("custom", even, ValidatorOptions::default())
            .unwrap();
        first.that(json!(1), "x");

        let second = first.create();
        assert!(!second.has_operation("custom"));
        assert!(second.has_operation("number"));
        assert_eq!(second.open_chain_count(), 0);
    }

    #[test]
    fn test_clone_shares_state() {
        let is = Registry::new();
        let shared = is.clone();
        shared
            .add_validator("even", even, ValidatorOptions::default())
            .unwrap();
        shared.that(json!(1), "n");

        assert!(is.has_operation("even"));
        assert_eq!(is.open_chain_count(), 1);
    }
}
