//! Core values, persistent collections, and errors for synclog.
//!
//! This crate provides:
//! - [`Value`] - The tagged value type carried by every action field and binding
//! - [`Fields`] - Named-field records used for inputs, outputs, and arguments
//! - [`Error`] - Rich error types with context
//! - Persistent collections ([`SlVec`], [`SlMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod value;

pub use collections::{Fields, SlMap, SlVec};
pub use error::{Error, ErrorContext, ErrorKind, SemanticLimit};
pub use value::{Value, ValueKind};

/// Result alias used throughout synclog.
pub type Result<T> = std::result::Result<T, Error>;

/// Builds a [`Fields`] record from `name => value` pairs.
///
/// ```
/// use synclog_foundation::{fields, Value};
///
/// let record = fields! { "doc" => "R1", "count" => 2 };
/// assert_eq!(record.get("doc"), Some(&Value::from("R1")));
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Fields::new();
        $(
            record = record.insert(
                ::std::sync::Arc::<str>::from($name),
                $crate::Value::from($value),
            );
        )+
        record
    }};
}
