//! Typed value representation for ArrayFlow
//!
//! Native inputs arrive as `serde_json::Value`; before a target entity is
//! invoked they are translated into the engine's typed representation
//! against the entity's declared interface types. Outputs travel back the
//! same way for aggregation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod translate;

pub use translate::{collection_of, to_typed};

/// Declared type of an interface field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueType {
    /// 64-bit signed integer
    Integer,

    /// 64-bit float
    Float,

    /// Boolean
    Boolean,

    /// UTF-8 string
    String,

    /// Ordered collection of a single element type
    Collection(Box<ValueType>),

    /// A value that may be absent (the none-sentinel inhabits this)
    Optional(Box<ValueType>),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::String => write!(f, "string"),
            ValueType::Collection(inner) => write!(f, "collection<{}>", inner),
            ValueType::Optional(inner) => write!(f, "optional<{}>", inner),
        }
    }
}

/// A value in the engine's typed representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    /// Integer scalar
    Integer(i64),

    /// Float scalar
    Float(f64),

    /// Boolean scalar
    Boolean(bool),

    /// String scalar
    String(String),

    /// Ordered collection
    Collection(Vec<TypedValue>),

    /// The none-sentinel recorded for a tolerated failed sub-invocation
    None,
}

impl TypedValue {
    /// Short name of this value's shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::Integer(_) => "integer",
            TypedValue::Float(_) => "float",
            TypedValue::Boolean(_) => "boolean",
            TypedValue::String(_) => "string",
            TypedValue::Collection(_) => "collection",
            TypedValue::None => "none",
        }
    }

    /// True if this value is the none-sentinel
    pub fn is_none(&self) -> bool {
        matches!(self, TypedValue::None)
    }
}

/// Per-invocation typed input bundle, keyed by field name
pub type TypedInputs = HashMap<String, TypedValue>;

/// Input shape or type failure, raised before any sub-invocation runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputShapeError {
    /// A declared field was not supplied
    #[error("missing input field '{field}'")]
    MissingField {
        /// Field name
        field: String,
    },

    /// A mapped field's value is not a sequence
    #[error("mapped field '{field}' is not a sequence")]
    NotASequence {
        /// Field name
        field: String,
    },

    /// A mapped field's sequence is empty
    #[error("mapped field '{field}' is an empty sequence")]
    EmptySequence {
        /// Field name
        field: String,
    },

    /// A value does not conform to the declared type
    #[error("field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        /// Field name
        field: String,
        /// Declared type
        expected: ValueType,
        /// Shape of the value actually supplied
        found: String,
    },

    /// A mapped element does not conform to the declared element type
    #[error("mapped field '{field}' element {index}: expected {expected}, got {found}")]
    ElementType {
        /// Field name
        field: String,
        /// Element index
        index: usize,
        /// Declared element type
        expected: ValueType,
        /// Shape of the element actually supplied
        found: String,
    },

    /// A mapped field's length disagrees with the fan-out width
    #[error("mapped field '{field}' has length {found}, expected {expected}")]
    LengthMismatch {
        /// Field name
        field: String,
        /// Fan-out width taken from the first mapped field
        expected: usize,
        /// Actual length of this field's sequence
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_display() {
        assert_eq!(ValueType::Integer.to_string(), "integer");
        assert_eq!(
            ValueType::Collection(Box::new(ValueType::String)).to_string(),
            "collection<string>"
        );
        assert_eq!(
            ValueType::Collection(Box::new(ValueType::Optional(Box::new(ValueType::Integer))))
                .to_string(),
            "collection<optional<integer>>"
        );
    }

    #[test]
    fn test_typed_value_kind() {
        assert_eq!(TypedValue::Integer(1).kind(), "integer");
        assert_eq!(TypedValue::None.kind(), "none");
        assert!(TypedValue::None.is_none());
        assert!(!TypedValue::Integer(0).is_none());
    }

    #[test]
    fn test_input_shape_error_messages() {
        let err = InputShapeError::LengthMismatch {
            field: "x".to_string(),
            expected: 4,
            found: 2,
        };
        assert_eq!(err.to_string(), "mapped field 'x' has length 2, expected 4");
    }
}
