//! # qail-adapt: PostgreSQL type adaptation
//!
//! Converts application values to PostgreSQL wire bytes and back, in text
//! and binary format, keyed by value type on the way out and by type OID on
//! the way in.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use qail_adapt::prelude::*;
//!
//! let session = Session::new(Some(ConnectionInfo::new(160000)));
//! let mut tx = Transformer::new(Some(&session));
//!
//! // Parameters
//! let (params, oids) = tx.dump_sequence(
//!     &[Value::Int(5), Value::Null, Value::list([Value::from("a")])],
//!     &[Format::Binary, Format::Text, Format::Text],
//! )?;
//!
//! // Results
//! tx.set_pgresult(Some(Rc::new(ResultSet::decode(&wire_bytes)?)))?;
//! let rows = tx.load_rows(0, tx.ntuples())?;
//! ```
//!
//! ## Layers
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | [`protocol`]  | Formats, OIDs, result-set backend messages        |
//! | [`adapt`]     | `Dumper`/`Loader` contracts and their registry    |
//! | [`transform`] | Per-statement caches, row decode, parameter encode |
//! | [`types`]     | Built-in codecs                                   |

pub mod adapt;
pub mod config;
pub mod error;
pub mod protocol;
pub mod result;
pub mod transform;
pub mod types;
pub mod value;

pub mod prelude {
    pub use crate::adapt::{
        AdaptContext, AdaptersMap, ConnectionInfo, Dumped, Dumper, Loader, NewDumper, NewLoader,
        Session, dumper_factory, global_adapters, loader_factory, register_dumper,
        register_loader,
    };
    pub use crate::config::AdaptConfig;
    pub use crate::error::*;
    pub use crate::protocol::{Format, Oid, oid};
    pub use crate::result::{PgResult, ResultSet};
    pub use crate::transform::Transformer;
    pub use crate::types::Numeric;
    pub use crate::value::{List, Value, ValueType};
    pub use std::rc::Rc;
}

pub use error::{AdaptError, AdaptResult};
pub use transform::Transformer;
pub use value::Value;
