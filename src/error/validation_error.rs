//! Validation error types.
//!
//! This module provides [`ValidationError`] for a single invalid chain and
//! [`ValidationErrors`] for a batch of invalid chains.

use std::fmt::{self, Display};

use stillwater::prelude::*;

/// The rendered failure of one chain.
///
/// `ValidationError` carries the chain's label and the full sentence
/// describing every way its value failed, e.g.
/// `"Age must be numeric and be greater than 10"`.
///
/// # Example
///
/// ```rust
/// use affirm::ValidationError;
///
/// let error = ValidationError::new("Age", "Age must be numeric");
///
/// assert_eq!(error.name, "Age");
/// assert_eq!(error.to_string(), "Age must be numeric");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Label of the chain that failed.
    pub name: String,
    /// The rendered sentence.
    pub message: String,
}

impl ValidationError {
    /// Creates a new error for the chain labelled `name`.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationError>();
    assert_sync::<ValidationError>();
};

/// A non-empty collection of chain failures.
///
/// `ValidationErrors` wraps a `NonEmptyVec<ValidationError>` so a batch
/// failure always carries at least one message. It is produced by
/// `Registry::throw_if_any_invalid`, one entry per invalid open chain.
///
/// # Combining Errors
///
/// `ValidationErrors` implements `Semigroup`, so batches from independent
/// registries can be merged:
///
/// ```rust
/// use affirm::{ValidationError, ValidationErrors};
/// use stillwater::prelude::*;
///
/// let first = ValidationErrors::single(ValidationError::new("name", "name must be a string"));
/// let second = ValidationErrors::single(ValidationError::new("age", "age must be numeric"));
///
/// let combined = first.combine(second);
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(NonEmptyVec<ValidationError>);

impl ValidationErrors {
    /// Creates a `ValidationErrors` containing a single error.
    pub fn single(error: ValidationError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Creates a `ValidationErrors` from a `NonEmptyVec` of errors.
    pub fn from_non_empty(errors: NonEmptyVec<ValidationError>) -> Self {
        Self(errors)
    }

    /// Creates a `ValidationErrors` from a `Vec`, or `None` when it is empty.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        let mut iter = errors.into_iter();
        let first = Self::single(iter.next()?);
        Some(iter.fold(first, |acc, error| acc.combine(Self::single(error))))
    }

    /// Returns the number of errors in this collection.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the collection is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over the contained errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns the rendered sentences in order.
    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.message.as_str()).collect()
    }

    /// Returns all errors raised by chains labelled `name`.
    pub fn named(&self, name: &str) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.name == name).collect()
    }

    /// Returns the first error in the collection.
    pub fn first(&self) -> &ValidationError {
        self.0.head()
    }

    /// Converts this collection into a `Vec<ValidationError>`.
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0.into_vec()
    }

    /// Returns a reference to the underlying `NonEmptyVec`.
    pub fn as_non_empty_vec(&self) -> &NonEmptyVec<ValidationError> {
        &self.0
    }
}

impl Semigroup for ValidationErrors {
    fn combine(self, other: Self) -> Self {
        ValidationErrors(self.0.combine(other.0))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} value(s) failed validation:", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = Box<dyn Iterator<Item = &'a ValidationError> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.0.iter())
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationErrors>();
    assert_sync::<ValidationErrors>();
};
