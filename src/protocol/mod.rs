//! PostgreSQL wire primitives (pure, sync).
//!
//! Format codes, type OIDs and the handful of backend messages needed to
//! build a result set. No I/O happens here.

pub mod format;
pub mod types;
pub mod wire;

pub use format::Format;
pub use types::{Oid, array_oid_of, element_oid_of, is_array_oid, name_to_oid, oid, oid_to_name};
pub use wire::{BackendMessage, FieldDescription};
