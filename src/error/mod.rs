//! Error types raised when accumulated failures are turned into errors.
//!
//! Failures recorded on a chain are plain data. They only become errors when
//! the caller asks for it through `Chain::throw_if_invalid` or
//! `Registry::throw_if_any_invalid`.

mod validation_error;

pub use validation_error::{ValidationError, ValidationErrors};
