//! # Affirm
//!
//! Fluent validation chains that accumulate ALL failures for a value and
//! render them as one readable sentence, rather than stopping at the first.
//!
//! ## Overview
//!
//! A [`Registry`] opens a [`Chain`] over a `serde_json::Value`. Each call on
//! the chain runs a validator or manipulator and records the outcome as data;
//! nothing fails until the caller explicitly asks with
//! [`Chain::throw_if_invalid`] or [`Registry::throw_if_any_invalid`].
//!
//! ## Core Types
//!
//! - [`Registry`]: Operation table, extension point, and aggregate over open chains
//! - [`Chain`]: One value under test with its nested property/manipulation chains
//! - [`ValidationError`]: The rendered failure of one chain
//! - [`ValidationErrors`]: A non-empty batch of chain failures
//! - [`RegistryError`]: Naming conflicts and unknown operations
//!
//! ## Example
//!
//! ```rust
//! use affirm::Registry;
//! use serde_json::json;
//!
//! let is = Registry::with_builtins();
//!
//! let age = is.that(json!("abc"), "Age");
//! age.run("number", &[]).run("greater_than", &[json!(10)]);
//!
//! assert_eq!(age.error_count(), 2);
//! assert_eq!(
//!     age.error_message().unwrap(),
//!     "Age must be numeric and be greater than 10"
//! );
//!
//! // Stop after the first failure instead.
//! age.clear();
//! age.run("number", &[]).stop_if_invalid().run("greater_than", &[json!(10)]);
//! assert_eq!(age.error_count(), 1);
//! ```

pub mod builtins;
pub mod chain;
pub mod error;
pub mod format;
pub mod operation;
pub mod registry;

pub use chain::{Chain, DEFAULT_ERROR_FORMAT, DEFAULT_PROP_FORMAT};
pub use error::{ValidationError, ValidationErrors};
pub use operation::{FailWhen, ManipulatorOptions, Operation, ValidatorOptions};
pub use registry::{Registry, RegistryError};

/// Type alias for chain outcomes converted to stillwater validations.
pub type ValidationResult<T> = stillwater::Validation<T, ValidationErrors>;
