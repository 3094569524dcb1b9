//! Dumper and loader contracts, and how they are registered.
//!
//! A [`Dumper`] turns application values of one [`ValueType`] into wire
//! bytes for one [`Format`]; a [`Loader`] turns wire bytes of one OID back
//! into a [`Value`]. Both are built by factories held in an [`AdaptersMap`],
//! either the process-wide one ([`global_adapters`]) or a session map
//! layered on top of it.
//!
//! ```ignore
//! register_dumper(ValueType::Int, Format::Text, dumper_factory::<IntTextDumper>(), None);
//! register_loader(oid::INT8, Format::Text, |oid, ctx: &dyn AdaptContext| {
//!     Box::new(IntLoader::new(oid, ctx)) as Box<dyn Loader>
//! }, Some(&session));
//! ```

mod context;
mod registry;

pub use context::{AdaptContext, ConnectionInfo, Session};
pub use registry::{AdaptersMap, DumperFactory, LoaderFactory, global_adapters};

use crate::error::AdaptResult;
use crate::protocol::{Format, Oid};
use crate::value::{Value, ValueType};
use bytes::Bytes;
use std::rc::Rc;

/// Output of [`Dumper::dump`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dumped {
    pub data: Bytes,
    /// Overrides [`Dumper::oid`] for this one value.
    pub oid: Option<Oid>,
}

impl Dumped {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            oid: None,
        }
    }

    pub fn with_oid(data: impl Into<Bytes>, oid: Oid) -> Self {
        Self {
            data: data.into(),
            oid: Some(oid),
        }
    }
}

/// Converts values of one application type to wire bytes.
pub trait Dumper {
    /// Type this dumper was created for.
    fn src(&self) -> ValueType;

    /// OID the values are sent as. `oid::INVALID` lets the server infer it.
    fn oid(&self) -> Oid;

    fn dump(&self, value: &Value) -> AdaptResult<Dumped>;

    /// Attach the dumper used for the elements of a container.
    ///
    /// Called once, before the dumper is handed out. Scalar dumpers ignore it.
    fn set_sub_dumper(&mut self, _sub: Rc<dyn Dumper>) {}
}

/// Converts wire bytes of one OID to application values.
pub trait Loader {
    fn oid(&self) -> Oid;

    fn load(&self, data: &[u8]) -> AdaptResult<Value>;
}

/// Dumper types that can be registered directly, see [`dumper_factory`].
pub trait NewDumper: Dumper + Sized + 'static {
    fn new(src: ValueType, context: &dyn AdaptContext) -> Self;
}

/// Loader types that can be registered directly, see [`loader_factory`].
pub trait NewLoader: Loader + Sized + 'static {
    fn new(oid: Oid, context: &dyn AdaptContext) -> Self;
}

/// Factory building a `D` for every resolution.
pub fn dumper_factory<D: NewDumper>()
-> impl Fn(ValueType, &dyn AdaptContext) -> Box<dyn Dumper> + Send + Sync + 'static {
    |src: ValueType, context: &dyn AdaptContext| -> Box<dyn Dumper> {
        Box::new(D::new(src, context))
    }
}

/// Factory building an `L` for every resolution.
pub fn loader_factory<L: NewLoader>()
-> impl Fn(Oid, &dyn AdaptContext) -> Box<dyn Loader> + Send + Sync + 'static {
    |oid: Oid, context: &dyn AdaptContext| -> Box<dyn Loader> { Box::new(L::new(oid, context)) }
}

/// Register a dumper factory for `src` in `format`.
///
/// With a context the registration goes into that context's own map,
/// otherwise into the global one.
pub fn register_dumper<F>(
    src: ValueType,
    format: Format,
    factory: F,
    context: Option<&dyn AdaptContext>,
) where
    F: Fn(ValueType, &dyn AdaptContext) -> Box<dyn Dumper> + Send + Sync + 'static,
{
    match context {
        Some(ctx) => ctx.adapters().register_dumper(src, format, factory),
        None => global_adapters().register_dumper(src, format, factory),
    }
}

/// Register a loader factory for `oid` in `format`.
///
/// Registering under `oid::INVALID` installs the fallback used for OIDs
/// nothing else handles.
pub fn register_loader<F>(
    oid: Oid,
    format: Format,
    factory: F,
    context: Option<&dyn AdaptContext>,
) where
    F: Fn(Oid, &dyn AdaptContext) -> Box<dyn Loader> + Send + Sync + 'static,
{
    match context {
        Some(ctx) => ctx.adapters().register_loader(oid, format, factory),
        None => global_adapters().register_loader(oid, format, factory),
    }
}
