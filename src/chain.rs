//! Fluent validation chains.
//!
//! A [`Chain`] focuses on one value, runs validators and manipulators against
//! it, and keeps every failure as data. Property drill-down and ad hoc
//! manipulation create child chains owned by their parent, so a single
//! top-level chain renders one sentence covering the whole value graph.
//!
//! # Example
//!
//! ```rust
//! use affirm::Registry;
//! use serde_json::json;
//!
//! let is = Registry::with_builtins();
//! let user = is.that(json!({"name": "Ann", "age": "old"}), "user");
//!
//! user.property("age").run("number", &[]);
//! user.property("name").run("min_length", &[json!(5)]);
//!
//! assert_eq!(user.error_count(), 2);
//! assert_eq!(
//!     user.error_message().unwrap(),
//!     "user must have a age which must be numeric and have a name which must have a length of at least 5"
//! );
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use stillwater::Validation;

use crate::error::{ValidationError, ValidationErrors};
use crate::format::{display_value, format_template, join_list};
use crate::operation::{FailWhen, Operation, DEFAULT_MANIPULATION_MESSAGE};
use crate::registry::OperationTable;
use crate::ValidationResult;

/// Sentence template for a top-level chain: `{0}` is the name, `{1}` the list.
pub const DEFAULT_ERROR_FORMAT: &str = "{0} must {1}";

/// Sentence template for a child chain: `{0}` is the name, `{1}` the list.
pub const DEFAULT_PROP_FORMAT: &str = "have a {0} which must {1}";

const DEFAULT_VALIDATE_MESSAGE: &str = "pass a validation test";
const MANIPULATED_NAME: &str = "manipulated value";

/// The two sentence templates used when rendering failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentenceFormats {
    pub(crate) error: String,
    pub(crate) prop: String,
}

impl Default for SentenceFormats {
    fn default() -> Self {
        Self {
            error: DEFAULT_ERROR_FORMAT.to_string(),
            prop: DEFAULT_PROP_FORMAT.to_string(),
        }
    }
}

/// How a chain came to exist.
#[derive(Debug, Clone, PartialEq)]
enum Origin {
    Root,
    /// Drilled into `key` of the parent value. `missing` is set when the
    /// parent had no such key.
    Property { key: String, missing: bool },
    Manipulation,
}

struct ChainState {
    value: Value,
    name: String,
    origin: Origin,
    parent: Option<Weak<Mutex<ChainState>>>,
    errors: Vec<String>,
    test_count: usize,
    children: Vec<Chain>,
    formats: SentenceFormats,
    negate: bool,
    bypass: bool,
    after_or: bool,
    skip_next: bool,
    or_group: Option<Vec<String>>,
    last_passed: bool,
}

impl ChainState {
    fn reset(&mut self) {
        self.errors.clear();
        self.test_count = 0;
        self.children.clear();
        self.negate = false;
        self.bypass = false;
        self.after_or = false;
        self.skip_next = false;
        self.or_group = None;
        self.last_passed = false;
    }
}

/// A handle on one value under test.
///
/// `Chain` is a cheap, clonable handle; clones share the same state. Every
/// builder method takes `&self` and returns `&Self` so calls can be strung
/// together, except [`property`](Chain::property) and
/// [`manipulate`](Chain::manipulate) which return the new child chain.
///
/// Chains are created by a [`Registry`](crate::Registry), which also supplies
/// the table of named operations reachable through [`run`](Chain::run).
#[derive(Clone)]
pub struct Chain {
    state: Arc<Mutex<ChainState>>,
    operations: OperationTable,
}

impl Chain {
    pub(crate) fn new(
        value: Value,
        name: String,
        operations: OperationTable,
        formats: SentenceFormats,
    ) -> Self {
        Self::build(value, name, operations, formats, Origin::Root, None, false)
    }

    fn build(
        value: Value,
        name: String,
        operations: OperationTable,
        formats: SentenceFormats,
        origin: Origin,
        parent: Option<Weak<Mutex<ChainState>>>,
        bypass: bool,
    ) -> Self {
        let state = ChainState {
            value,
            name,
            origin,
            parent,
            errors: Vec::new(),
            test_count: 0,
            children: Vec::new(),
            formats,
            negate: false,
            bypass,
            after_or: false,
            skip_next: false,
            or_group: None,
            last_passed: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            operations,
        }
    }

    fn child(&self, value: Value, name: String, origin: Origin, bypass: bool) -> Chain {
        let mut state = self.state.lock();
        let child = Chain::build(
            value,
            name,
            Arc::clone(&self.operations),
            state.formats.clone(),
            origin,
            Some(Arc::downgrade(&self.state)),
            bypass,
        );
        state.children.push(child.clone());
        child
    }

    // ----- modifiers -----

    /// No-op, reads naturally: `chain.a().run("string", &[])`.
    pub fn a(&self) -> &Self {
        self
    }

    /// No-op, reads naturally: `chain.an().run("object", &[])`.
    pub fn an(&self) -> &Self {
        self
    }

    /// No-op, reads naturally between two tests.
    pub fn and(&self) -> &Self {
        self
    }

    /// Inverts the result of the next test.
    ///
    /// The flag is consumed by exactly one validator call, whatever its
    /// outcome. A failing negated test renders its message prefixed with
    /// `"not "`. Manipulators ignore the flag.
    pub fn not(&self) -> &Self {
        self.state.lock().negate = true;
        self
    }

    /// Groups the previous test with the next one as alternatives.
    ///
    /// If the previous test passed, the next test is skipped entirely. If it
    /// failed, its failure is taken back and held as the first alternative;
    /// every following failure in the group joins it, and the group records a
    /// single error `"x, y, or z"` unless one of its tests passes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// let chain = is.that(json!(true), "flag");
    /// chain.run("string", &[]).or().run("array", &[]).or().run("object", &[]);
    ///
    /// assert_eq!(chain.error_count(), 1);
    /// assert_eq!(chain.test_count(), 3);
    /// assert_eq!(
    ///     chain.error_message().unwrap(),
    ///     "flag must be a string, be an array, or be an object"
    /// );
    /// ```
    pub fn or(&self) -> &Self {
        let mut state = self.state.lock();
        if state.bypass {
            return self;
        }
        state.after_or = true;
        if state.last_passed {
            state.skip_next = true;
            return self;
        }
        // While a group is open the last entry is its joined error, and the
        // alternatives are already buffered.
        let taken = state.errors.pop();
        if state.or_group.is_none() {
            state.or_group = Some(taken.into_iter().collect());
        }
        self
    }

    /// Bypasses every following test and manipulation until [`resume`](Chain::resume).
    pub fn stop(&self) -> &Self {
        self.state.lock().bypass = true;
        self
    }

    /// Ends a bypass started by [`stop`](Chain::stop), a failed manipulation, or
    /// [`stop_if_invalid`](Chain::stop_if_invalid).
    pub fn resume(&self) -> &Self {
        self.state.lock().bypass = false;
        self
    }

    /// Stops the chain if it, or any descendant, has failed so far.
    pub fn stop_if_invalid(&self) -> &Self {
        if !self.valid() {
            self.stop();
        }
        self
    }

    /// Sets the top-level sentence template (`{0}` name, `{1}` failures).
    pub fn error_format(&self, template: impl Into<String>) -> &Self {
        self.state.lock().formats.error = template.into();
        self
    }

    /// Sets the template used for each failing child (`{0}` name, `{1}` failures).
    pub fn prop_format(&self, template: impl Into<String>) -> &Self {
        self.state.lock().formats.prop = template.into();
        self
    }

    // ----- tests and manipulations -----

    /// Runs the registered operation `name` against the current value.
    ///
    /// For a validator, passing one argument more than its declared arity
    /// makes the last argument the failure template for this call. For a
    /// manipulator, a result matching its failure sentinel records the
    /// failure and bypasses the rest of the chain; otherwise the result
    /// replaces the current value.
    ///
    /// An unregistered name is recorded as a failed test.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// let chain = is.that(json!(" 42 "), "count");
    ///
    /// chain
    ///     .run("trim", &[])
    ///     .run("to_integer", &[])
    ///     .run("greater_than", &[json!(50), json!("be over {1}")]);
    ///
    /// assert_eq!(chain.value(), json!(42));
    /// assert_eq!(chain.error_message().unwrap(), "count must be over 50");
    /// ```
    pub fn run(&self, name: &str, args: &[Value]) -> &Self {
        let operation = self.operations.read().get(name).cloned();

        match operation {
            Some(Operation::Validator {
                predicate,
                arity,
                fail_message,
            }) => {
                let (args, template) = match args.split_last() {
                    Some((last, rest)) if args.len() > arity => (rest, display_value(last)),
                    _ => (args, fail_message),
                };
                self.run_test(|value| predicate(value, args), &template, args)
            }
            Some(Operation::Manipulator {
                transform,
                fail_when,
                fail_message,
            }) => self.run_manipulation(
                |value| transform(value, args),
                fail_when.as_ref(),
                &fail_message,
                args,
            ),
            None => {
                tracing::warn!(operation = name, "running an unregistered operation");
                self.record_unknown(name)
            }
        }
    }

    /// Runs a single-use predicate, with the same accounting as a registered
    /// validator.
    pub fn validate<F>(&self, predicate: F) -> &Self
    where
        F: FnOnce(&Value) -> bool,
    {
        self.run_test(predicate, DEFAULT_VALIDATE_MESSAGE, &[])
    }

    /// Runs a single-use predicate with a failure template (`{0}` is the value).
    pub fn validate_with_message<F>(&self, predicate: F, fail_message: &str) -> &Self
    where
        F: FnOnce(&Value) -> bool,
    {
        self.run_test(predicate, fail_message, &[])
    }

    /// Creates a child chain over `key` of the current value, labelled `key`.
    ///
    /// Object keys are looked up by name and array elements by index. A
    /// missing key, or a parent that is not a container, yields a child over
    /// `null` that starts bypassed, so it never contributes tests or
    /// failures unless resumed.
    pub fn property(&self, key: &str) -> Chain {
        self.property_named(key, key)
    }

    /// Like [`property`](Chain::property) with a human-readable label.
    pub fn property_named(&self, key: &str, label: &str) -> Chain {
        let (found, bypass) = {
            let state = self.state.lock();
            (lookup(&state.value, key).cloned(), state.bypass)
        };
        let missing = found.is_none();
        self.child(
            found.unwrap_or(Value::Null),
            label.to_string(),
            Origin::Property {
                key: key.to_string(),
                missing,
            },
            bypass || missing,
        )
    }

    /// Creates a child chain over `transform(value)`.
    ///
    /// The parent keeps its own value; call [`up`](Chain::up) on the child to
    /// continue with the original. When the parent is bypassed the transform
    /// is not run and the child starts bypassed over a copy of the value.
    pub fn manipulate<F>(&self, transform: F) -> Chain
    where
        F: FnOnce(&Value) -> Value,
    {
        self.manipulate_inner(transform, None, None)
    }

    /// Like [`manipulate`](Chain::manipulate), but a result matching
    /// `fail_when` makes the child start bypassed with one recorded failure
    /// (`fail_message`, or `"be able to be manipulated"`).
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::{FailWhen, Registry};
    /// use serde_json::{json, Value};
    ///
    /// let is = Registry::new();
    /// let chain = is.that(json!("abc"), "id");
    /// let parsed = chain.manipulate_checked(
    ///     |v| v.as_str().and_then(|s| s.parse::<i64>().ok()).map_or(Value::Null, Value::from),
    ///     FailWhen::value(Value::Null),
    ///     Some("be an integer"),
    /// );
    ///
    /// assert!(parsed.is_bypassed());
    /// assert_eq!(chain.error_message().unwrap(), "id must have a manipulated value which must be an integer");
    /// ```
    pub fn manipulate_checked<F>(
        &self,
        transform: F,
        fail_when: impl Into<FailWhen>,
        fail_message: Option<&str>,
    ) -> Chain
    where
        F: FnOnce(&Value) -> Value,
    {
        self.manipulate_inner(transform, Some(fail_when.into()), fail_message)
    }

    fn manipulate_inner<F>(
        &self,
        transform: F,
        fail_when: Option<FailWhen>,
        fail_message: Option<&str>,
    ) -> Chain
    where
        F: FnOnce(&Value) -> Value,
    {
        let (value, bypass) = {
            let state = self.state.lock();
            if state.bypass {
                (state.value.clone(), true)
            } else {
                (transform(&state.value), false)
            }
        };

        let failed = !bypass && fail_when.is_some_and(|f| f.matches(&value));
        let child = self.child(
            value,
            MANIPULATED_NAME.to_string(),
            Origin::Manipulation,
            bypass || failed,
        );
        if failed {
            child
                .state
                .lock()
                .errors
                .push(fail_message.unwrap_or(DEFAULT_MANIPULATION_MESSAGE).to_string());
        }
        child
    }

    fn run_test<F>(&self, predicate: F, template: &str, args: &[Value]) -> &Self
    where
        F: FnOnce(&Value) -> bool,
    {
        self.evaluate(predicate, template, args, true)
    }

    /// Shared accounting for every test. With `negatable` unset a pending
    /// `not` is consumed without inverting the outcome.
    fn evaluate<F>(&self, predicate: F, template: &str, args: &[Value], negatable: bool) -> &Self
    where
        F: FnOnce(&Value) -> bool,
    {
        let mut state = self.state.lock();
        if state.bypass {
            return self;
        }
        if state.skip_next {
            // A passing alternative already satisfied this `or` group.
            state.skip_next = false;
            state.after_or = false;
            state.negate = false;
            return self;
        }

        let in_group = std::mem::take(&mut state.after_or);
        if !in_group {
            state.or_group = None;
        }

        let mut passed = predicate(&state.value);
        let mut template = Cow::Borrowed(template);
        if std::mem::take(&mut state.negate) && negatable {
            passed = !passed;
            template = Cow::Owned(format!("not {}", template));
        }

        state.test_count += 1;
        state.last_passed = passed;

        if passed {
            state.or_group = None;
            return self;
        }

        let message = render(&template, &state.value, args);
        let entry = match (in_group, state.or_group.as_mut()) {
            (true, Some(group)) => {
                group.push(message);
                join_list(group.as_slice(), "or")
            }
            _ => message,
        };
        state.errors.push(entry);
        self
    }

    fn run_manipulation<F>(
        &self,
        transform: F,
        fail_when: Option<&FailWhen>,
        fail_message: &str,
        args: &[Value],
    ) -> &Self
    where
        F: FnOnce(&Value) -> Value,
    {
        let mut state = self.state.lock();
        if state.bypass {
            return self;
        }

        let result = transform(&state.value);
        if fail_when.is_some_and(|f| f.matches(&result)) {
            let message = render(fail_message, &state.value, args);
            state.bypass = true;
            state.last_passed = false;
            state.errors.push(message);
        } else {
            state.value = result;
        }
        self
    }

    fn record_unknown(&self, name: &str) -> &Self {
        let template = format!("be checked by a registered `{}` operation", name);
        self.evaluate(|_| false, &template, &[], false)
    }

    // ----- navigation -----

    /// Returns the chain this one was produced from by
    /// [`property`](Chain::property) or [`manipulate`](Chain::manipulate).
    ///
    /// Returns `None` for a top-level chain, or when the parent has been
    /// dropped.
    pub fn up(&self) -> Option<Chain> {
        let parent = self.state.lock().parent.as_ref()?.upgrade()?;
        Some(Chain {
            state: parent,
            operations: Arc::clone(&self.operations),
        })
    }

    /// Walks [`up`](Chain::up) to the top-level chain.
    pub fn root(&self) -> Chain {
        let mut current = self.clone();
        while let Some(parent) = current.up() {
            current = parent;
        }
        current
    }

    // ----- reading -----

    /// The current value, after any in-place manipulation.
    ///
    /// Property children are not written back; see
    /// [`final_value`](Chain::final_value).
    pub fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    /// The current value with every property child's final value written
    /// back into it.
    ///
    /// Properties that were missing and still hold `null` are left out.
    ///
    /// # Example
    ///
    /// ```rust
    /// use affirm::Registry;
    /// use serde_json::json;
    ///
    /// let is = Registry::with_builtins();
    /// let form = is.that(json!({"a": "5"}), "form");
    /// form.property("a").run("to_integer", &[]);
    ///
    /// assert_eq!(form.value(), json!({"a": "5"}));
    /// assert_eq!(form.final_value(), json!({"a": 5}));
    /// ```
    pub fn final_value(&self) -> Value {
        let (mut value, children) = {
            let state = self.state.lock();
            (state.value.clone(), state.children.clone())
        };

        for child in &children {
            let origin = child.state.lock().origin.clone();
            if let Origin::Property { key, missing } = origin {
                let child_value = child.final_value();
                if missing && child_value.is_null() {
                    continue;
                }
                write_back(&mut value, &key, child_value);
            }
        }
        value
    }

    /// The label used in rendered sentences.
    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    /// Returns true while tests and manipulations are being skipped.
    pub fn is_bypassed(&self) -> bool {
        self.state.lock().bypass
    }

    /// Failures recorded on this chain and every invalid descendant.
    pub fn error_count(&self) -> usize {
        let (local, children) = {
            let state = self.state.lock();
            (state.errors.len(), state.children.clone())
        };
        local + children.iter().map(Chain::error_count).sum::<usize>()
    }

    /// Tests run on this chain and every descendant.
    pub fn test_count(&self) -> usize {
        let (local, children) = {
            let state = self.state.lock();
            (state.test_count, state.children.clone())
        };
        local + children.iter().map(Chain::test_count).sum::<usize>()
    }

    /// Returns true if neither this chain nor any descendant has failed.
    pub fn valid(&self) -> bool {
        self.error_count() == 0
    }

    /// The failures of this chain and its invalid descendants as one list,
    /// without the subject, e.g. `"be numeric and have a b which must be null"`.
    pub fn error_list(&self) -> String {
        let (mut items, children, prop_format) = {
            let state = self.state.lock();
            (
                state.errors.clone(),
                state.children.clone(),
                state.formats.prop.clone(),
            )
        };

        for child in children.iter().filter(|c| !c.valid()) {
            let args = [child.name(), child.error_list()];
            items.push(format_template(&prop_format, &args));
        }
        join_list(&items, "and")
    }

    /// The full sentence describing every failure, or `None` when valid.
    pub fn error_message(&self) -> Option<String> {
        if self.valid() {
            return None;
        }
        let (name, error_format) = {
            let state = self.state.lock();
            (state.name.clone(), state.formats.error.clone())
        };
        let args = [name, self.error_list()];
        Some(format_template(&error_format, &args))
    }

    // ----- lifecycle -----

    /// Resets failures, counters, children, and every modifier flag.
    ///
    /// The value, name, and sentence templates are kept.
    pub fn clear(&self) -> &Self {
        self.state.lock().reset();
        self
    }

    /// Returns the rendered failure as an error if the chain is invalid.
    ///
    /// The chain is cleared before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] carrying [`error_message`](Chain::error_message).
    pub fn throw_if_invalid(&self) -> Result<&Self, ValidationError> {
        match self.error_message() {
            None => Ok(self),
            Some(message) => {
                let name = self.name();
                tracing::debug!(chain = %name, %message, "chain is invalid");
                self.clear();
                Err(ValidationError::new(name, message))
            }
        }
    }

    /// Converts the chain outcome into a stillwater `Validation`.
    ///
    /// Succeeds with [`final_value`](Chain::final_value), or fails with the
    /// rendered sentence. The chain is left untouched.
    pub fn into_validation(&self) -> ValidationResult<Value> {
        match self.error_message() {
            None => Validation::Success(self.final_value()),
            Some(message) => {
                Validation::Failure(ValidationErrors::single(ValidationError::new(
                    self.name(),
                    message,
                )))
            }
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Chain")
            .field("name", &state.name)
            .field("value", &state.value)
            .field("errors", &state.errors)
            .field("test_count", &state.test_count)
            .field("children", &state.children.len())
            .field("bypass", &state.bypass)
            .finish_non_exhaustive()
    }
}

fn render(template: &str, subject: &Value, args: &[Value]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(display_value(subject));
    parts.extend(args.iter().map(display_value));
    format_template(template, &parts)
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn write_back(target: &mut Value, key: &str, value: Value) {
    match target {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
        }
        Value::Array(items) => {
            if let Some(slot) = key.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        _ => {}
    }
}
