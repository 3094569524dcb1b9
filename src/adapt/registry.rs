//! Dumper and loader factory tables.

use super::{AdaptContext, Dumper, Loader};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid, oid_to_name};
use crate::value::ValueType;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Builds a dumper for a value type.
pub type DumperFactory = Arc<dyn Fn(ValueType, &dyn AdaptContext) -> Box<dyn Dumper> + Send + Sync>;

/// Builds a loader for an OID.
pub type LoaderFactory = Arc<dyn Fn(Oid, &dyn AdaptContext) -> Box<dyn Loader> + Send + Sync>;

static GLOBAL_ADAPTERS: LazyLock<Arc<AdaptersMap>> = LazyLock::new(|| {
    let map = AdaptersMap::new();
    crate::types::register_default_adapters(&map);
    Arc::new(map)
});

/// The process-wide map, holding the built-in codecs.
///
/// Registrations are expected at startup, before transformers are in use.
pub fn global_adapters() -> Arc<AdaptersMap> {
    Arc::clone(&GLOBAL_ADAPTERS)
}

#[derive(Default)]
struct Tables {
    dumpers: [HashMap<ValueType, DumperFactory>; 2],
    loaders: [HashMap<Oid, LoaderFactory>; 2],
}

/// Registry of dumper and loader factories, one table per format.
///
/// A map created with [`AdaptersMap::with_parent`] answers from its own
/// tables first and falls back to the parent's.
#[derive(Default)]
pub struct AdaptersMap {
    tables: RwLock<Tables>,
    parent: Option<Arc<AdaptersMap>>,
}

impl AdaptersMap {
    /// Empty map with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty map whose lookups fall back to `parent`.
    pub fn with_parent(parent: Arc<AdaptersMap>) -> Self {
        Self {
            tables: RwLock::default(),
            parent: Some(parent),
        }
    }

    pub fn parent(&self) -> Option<&Arc<AdaptersMap>> {
        self.parent.as_ref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_dumper<F>(&self, src: ValueType, format: Format, factory: F)
    where
        F: Fn(ValueType, &dyn AdaptContext) -> Box<dyn Dumper> + Send + Sync + 'static,
    {
        tracing::debug!("Registering {} dumper for {}", format, src);
        self.write().dumpers[format.index()].insert(src, Arc::new(factory));
    }

    pub fn register_loader<F>(&self, oid: Oid, format: Format, factory: F)
    where
        F: Fn(Oid, &dyn AdaptContext) -> Box<dyn Loader> + Send + Sync + 'static,
    {
        tracing::debug!("Registering {} loader for oid {} ({})", format, oid, oid_to_name(oid));
        self.write().loaders[format.index()].insert(oid, Arc::new(factory));
    }

    /// Factory for dumping `src` in `format`, if any.
    pub fn get_dumper(&self, src: ValueType, format: Format) -> Option<DumperFactory> {
        if let Some(factory) = self.read().dumpers[format.index()].get(&src) {
            return Some(Arc::clone(factory));
        }
        self.parent.as_ref()?.get_dumper(src, format)
    }

    /// Factory for loading `oid` in `format`, if any. No unknown-type fallback here.
    pub fn get_loader(&self, oid: Oid, format: Format) -> Option<LoaderFactory> {
        if let Some(factory) = self.read().loaders[format.index()].get(&oid) {
            return Some(Arc::clone(factory));
        }
        self.parent.as_ref()?.get_loader(oid, format)
    }

    /// Load `oid` the way `like` is loaded, in every format `like` supports.
    ///
    /// The aliases go into this map only; parents are untouched.
    pub fn alias_loader(&self, oid: Oid, like: Oid) -> AdaptResult<()> {
        let mut aliased = 0;
        for format in Format::ALL {
            if let Some(factory) = self.get_loader(like, format) {
                self.write().loaders[format.index()].insert(oid, factory);
                aliased += 1;
            }
        }

        if aliased == 0 {
            return Err(AdaptError::Registration(format!(
                "no loader registered for oid {} ({}) to alias oid {} to",
                like,
                oid_to_name(like),
                oid
            )));
        }
        tracing::debug!("Aliased oid {} to {} in {} format(s)", oid, like, aliased);
        Ok(())
    }

    /// OIDs with a loader in `format`, including the parent's, sorted.
    pub fn loader_oids(&self, format: Format) -> Vec<Oid> {
        let mut oids: Vec<Oid> = self.parent.as_ref().map(|p| p.loader_oids(format)).unwrap_or_default();
        oids.extend(self.read().loaders[format.index()].keys().copied());
        oids.sort_unstable();
        oids.dedup();
        oids
    }

    /// Whether unknown OIDs can be loaded in `format`.
    pub fn has_fallback_loader(&self, format: Format) -> bool {
        self.get_loader(oid::INVALID, format).is_some()
    }
}

impl fmt::Debug for AdaptersMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.read();
        f.debug_struct("AdaptersMap")
            .field("text_dumpers", &tables.dumpers[0].len())
            .field("binary_dumpers", &tables.dumpers[1].len())
            .field("text_loaders", &tables.loaders[0].len())
            .field("binary_loaders", &tables.loaders[1].len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::{Dumped, Session};
    use crate::value::Value;

    struct Fixed(ValueType, &'static [u8]);

    impl Dumper for Fixed {
        fn src(&self) -> ValueType {
            self.0
        }

        fn oid(&self) -> Oid {
            oid::INVALID
        }

        fn dump(&self, _value: &Value) -> AdaptResult<Dumped> {
            Ok(Dumped::new(self.1))
        }
    }

    struct Raw(Oid);

    impl Loader for Raw {
        fn oid(&self) -> Oid {
            self.0
        }

        fn load(&self, data: &[u8]) -> AdaptResult<Value> {
            Ok(Value::Bytes(data.to_vec()))
        }
    }

    fn raw_loader(oid: Oid, _: &dyn AdaptContext) -> Box<dyn Loader> {
        Box::new(Raw(oid))
    }

    #[test]
    fn test_missing_entries_are_none() {
        let map = AdaptersMap::new();
        assert!(map.get_dumper(ValueType::Int, Format::Text).is_none());
        assert!(map.get_loader(oid::INT4, Format::Binary).is_none());
        assert!(!map.has_fallback_loader(Format::Text));
    }

    #[test]
    fn test_formats_are_disjoint() {
        let map = AdaptersMap::new();
        map.register_dumper(ValueType::Int, Format::Text, |src, _: &dyn AdaptContext| {
            Box::new(Fixed(src, b"1")) as Box<dyn Dumper>
        });
        map.register_loader(oid::INT4, Format::Binary, raw_loader);

        assert!(map.get_dumper(ValueType::Int, Format::Text).is_some());
        assert!(map.get_dumper(ValueType::Int, Format::Binary).is_none());
        assert!(map.get_loader(oid::INT4, Format::Binary).is_some());
        assert!(map.get_loader(oid::INT4, Format::Text).is_none());
    }

    #[test]
    fn test_session_map_shadows_parent() {
        let parent = Arc::new(AdaptersMap::new());
        parent.register_dumper(ValueType::Int, Format::Text, |src, _: &dyn AdaptContext| {
            Box::new(Fixed(src, b"parent")) as Box<dyn Dumper>
        });
        parent.register_loader(oid::TEXT, Format::Text, raw_loader);

        let session = Session::with_parent(Arc::clone(&parent), None);
        session.adapters().register_dumper(ValueType::Int, Format::Text, |src, _: &dyn AdaptContext| {
            Box::new(Fixed(src, b"session")) as Box<dyn Dumper>
        });

        let factory = session.adapters().get_dumper(ValueType::Int, Format::Text).unwrap();
        let dumper = factory(ValueType::Int, &session);
        assert_eq!(dumper.dump(&Value::Int(1)).unwrap().data.as_ref(), b"session");

        // Parent is unaffected, and still serves what the session lacks.
        let factory = parent.get_dumper(ValueType::Int, Format::Text).unwrap();
        let dumper = factory(ValueType::Int, &session);
        assert_eq!(dumper.dump(&Value::Int(1)).unwrap().data.as_ref(), b"parent");
        assert!(session.adapters().get_loader(oid::TEXT, Format::Text).is_some());
    }

    #[test]
    fn test_alias_loader() {
        let map = AdaptersMap::new();
        map.register_loader(oid::TEXT, Format::Text, raw_loader);

        map.alias_loader(16385, oid::TEXT).unwrap();
        assert!(map.get_loader(16385, Format::Text).is_some());
        assert!(map.get_loader(16385, Format::Binary).is_none());
        assert_eq!(map.loader_oids(Format::Text), vec![oid::TEXT, 16385]);

        let err = map.alias_loader(16386, oid::UUID).unwrap_err();
        assert!(matches!(err, AdaptError::Registration(_)));
    }
}
