//! Built-in codecs for the common PostgreSQL types.
//!
//! | Value        | Dumps as (text / binary)  | Loaded from                         |
//! |--------------|---------------------------|-------------------------------------|
//! | `Bool`       | bool / bool               | bool                                |
//! | `Int`        | int8 / int8               | int2, int4, int8, oid               |
//! | `Float`      | float8 / float8           | float4, float8                      |
//! | `Numeric`    | numeric / numeric         | numeric                             |
//! | `String`     | unknown / text            | text, varchar, bpchar, name, char   |
//! | `Bytes`      | bytea / bytea             | bytea                               |
//! | `Uuid`       | uuid / uuid               | uuid                                |
//! | `Json`       | jsonb / jsonb             | json, jsonb                         |
//! | `Date`       | date / date               | date                                |
//! | `Timestamp`  | timestamp / timestamp     | timestamp                           |
//! | `List`       | array of the element type | the array types in [`oid`]          |
//!
//! Unknown OIDs load as strings in text format and as raw bytes in binary.
//!
//! [`oid`]: crate::protocol::oid

pub mod array;
pub mod json;
pub mod numeric;
pub mod scalar;
pub mod temporal;
pub mod text;

pub use numeric::Numeric;

use crate::adapt::AdaptersMap;
use crate::error::{AdaptError, AdaptResult};
use crate::value::{Value, ValueType};

/// Register every built-in codec into `map`.
pub fn register_default_adapters(map: &AdaptersMap) {
    scalar::register(map);
    text::register(map);
    numeric::register(map);
    json::register(map);
    temporal::register(map);
    array::register(map);
}

pub(crate) fn utf8(data: &[u8]) -> AdaptResult<&str> {
    std::str::from_utf8(data).map_err(|e| AdaptError::Data(format!("Invalid UTF-8: {}", e)))
}

pub(crate) fn unexpected(expected: ValueType, got: &Value) -> AdaptError {
    AdaptError::Data(format!(
        "{} dumper cannot dump a {} value",
        expected,
        got.type_name()
    ))
}
