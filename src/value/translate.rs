//! Native-to-typed value translation
//!
//! Translation is purely functional: a native value either conforms to the
//! declared type and produces a [`TypedValue`], or the call fails with an
//! [`InputShapeError`]. Translation failures are input-shape failures and
//! are never counted against the execution budget.

use serde_json::Value;

use super::{InputShapeError, TypedValue, ValueType};

/// Translate a native value into the typed representation declared for
/// `field`.
pub fn to_typed(
    field: &str,
    native: &Value,
    declared: &ValueType,
) -> Result<TypedValue, InputShapeError> {
    match declared {
        ValueType::Integer => match native.as_i64() {
            Some(n) => Ok(TypedValue::Integer(n)),
            None => Err(mismatch(field, declared, native)),
        },
        ValueType::Float => match native.as_f64() {
            // as_f64 also accepts integral JSON numbers
            Some(n) => Ok(TypedValue::Float(n)),
            None => Err(mismatch(field, declared, native)),
        },
        ValueType::Boolean => match native.as_bool() {
            Some(b) => Ok(TypedValue::Boolean(b)),
            None => Err(mismatch(field, declared, native)),
        },
        ValueType::String => match native.as_str() {
            Some(s) => Ok(TypedValue::String(s.to_string())),
            None => Err(mismatch(field, declared, native)),
        },
        ValueType::Collection(element) => match native.as_array() {
            Some(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(to_typed(field, item, element)?);
                }
                Ok(TypedValue::Collection(out))
            }
            None => Err(mismatch(field, declared, native)),
        },
        ValueType::Optional(inner) => {
            if native.is_null() {
                Ok(TypedValue::None)
            } else {
                to_typed(field, native, inner)
            }
        }
    }
}

/// Build an ordered collection value from already-typed elements.
pub fn collection_of(values: Vec<TypedValue>) -> TypedValue {
    TypedValue::Collection(values)
}

/// Short name of a native value's JSON shape, used in error messages.
pub fn native_kind(native: &Value) -> &'static str {
    match native {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(field: &str, declared: &ValueType, native: &Value) -> InputShapeError {
    InputShapeError::TypeMismatch {
        field: field.to_string(),
        expected: declared.clone(),
        found: native_kind(native).to_string(),
    }
}
