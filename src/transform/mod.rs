//! Per-statement adaptation: dumper and loader caches, row decoding and
//! parameter encoding.
//!
//! A [`Transformer`] is created for one executed statement and dropped with
//! it. It snapshots the adapters of the context it was created from and
//! caches every dumper and loader it resolves, per format.
//!
//! ```ignore
//! let mut tx = Transformer::new(Some(&session));
//! let (params, types) = tx.dump_sequence(&[Value::Null, Value::Int(5)], &[Format::Text; 2])?;
//! tx.set_pgresult(Some(Rc::new(ResultSet::decode(&bytes)?)))?;
//! let rows = tx.load_rows(0, tx.ntuples())?;
//! ```

mod element;

pub(crate) use element::find_list_element;

use crate::adapt::{AdaptContext, AdaptersMap, ConnectionInfo, Dumper, Loader, global_adapters};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::result::PgResult;
use crate::value::{Value, ValueType};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// First server version accepting unknown-typed parameters for output columns.
const UNKNOWN_OID_MIN_VERSION: i32 = 100_000;

/// Key of the dumper caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumperKey {
    /// A non-list type.
    Type(ValueType),
    /// A list whose first non-null leaf has this type.
    List(ValueType),
}

impl DumperKey {
    /// Type the dumper factory is registered under.
    pub fn src(self) -> ValueType {
        match self {
            DumperKey::Type(ty) => ty,
            DumperKey::List(_) => ValueType::List,
        }
    }
}

/// Statement-scoped dumper/loader cache and row codec.
pub struct Transformer {
    adapters: Arc<AdaptersMap>,
    connection: Option<ConnectionInfo>,
    unknown_oid: Oid,
    dumpers: [HashMap<DumperKey, Rc<dyn Dumper>>; 2],
    loaders: [HashMap<Oid, Rc<dyn Loader>>; 2],
    row_loaders: Vec<Rc<dyn Loader>>,
    pgresult: Option<Rc<dyn PgResult>>,
    ntuples: usize,
    nfields: usize,
}

impl Transformer {
    /// Transformer using the adapters and connection of `context`, or the
    /// global adapters without a connection.
    pub fn new(context: Option<&dyn AdaptContext>) -> Self {
        match context {
            Some(ctx) => Self::with_adapters(Arc::clone(ctx.adapters()), ctx.connection().cloned()),
            None => Self::with_adapters(global_adapters(), None),
        }
    }

    /// Transformer over an explicit map, e.g. an isolated one in tests.
    pub fn with_adapters(adapters: Arc<AdaptersMap>, connection: Option<ConnectionInfo>) -> Self {
        let unknown_oid = match &connection {
            Some(conn) if conn.server_version < UNKNOWN_OID_MIN_VERSION => oid::TEXT,
            _ => oid::INVALID,
        };

        Self {
            adapters,
            connection,
            unknown_oid,
            dumpers: Default::default(),
            loaders: Default::default(),
            row_loaders: Vec::new(),
            pgresult: None,
            ntuples: 0,
            nfields: 0,
        }
    }

    /// OID reported for null parameters and for dumpers leaving the type to the server.
    pub fn unknown_oid(&self) -> Oid {
        self.unknown_oid
    }

    pub fn pgresult(&self) -> Option<&Rc<dyn PgResult>> {
        self.pgresult.as_ref()
    }

    pub fn ntuples(&self) -> usize {
        self.ntuples
    }

    pub fn nfields(&self) -> usize {
        self.nfields
    }

    /// Bind a result, resolving one loader per column.
    ///
    /// `None` unbinds. If a column has no loader the previous binding is kept.
    pub fn set_pgresult(&mut self, result: Option<Rc<dyn PgResult>>) -> AdaptResult<()> {
        let Some(result) = result else {
            self.pgresult = None;
            self.row_loaders.clear();
            self.ntuples = 0;
            self.nfields = 0;
            return Ok(());
        };

        let nfields = result.nfields();
        let mut row_loaders = Vec::with_capacity(nfields);
        for col in 0..nfields {
            row_loaders.push(self.get_loader(result.ftype(col), result.fformat(col))?);
        }

        self.row_loaders = row_loaders;
        self.ntuples = result.ntuples();
        self.nfields = nfields;
        self.pgresult = Some(result);
        Ok(())
    }

    /// Resolve column loaders from explicit types, without a bound result.
    ///
    /// Used for data that does not come with a row description, such as COPY.
    /// Any bound result is unbound, since its columns no longer match the
    /// loaders; `nfields` becomes the number of types. On error nothing changes.
    pub fn set_row_types(&mut self, types: &[(Oid, Format)]) -> AdaptResult<()> {
        let row_loaders = types
            .iter()
            .map(|&(oid, format)| self.get_loader(oid, format))
            .collect::<AdaptResult<Vec<_>>>()?;
        self.pgresult = None;
        self.ntuples = 0;
        self.nfields = row_loaders.len();
        self.row_loaders = row_loaders;
        Ok(())
    }

    /// Dumper for `value` in `format`, cached per format.
    ///
    /// Lists are keyed by the type of their first non-null leaf (strings
    /// when there is none) and get a dumper for that type attached.
    pub fn get_dumper(&mut self, value: &Value, format: Format) -> AdaptResult<Rc<dyn Dumper>> {
        let key = match value {
            Value::Null => {
                return Err(AdaptError::CannotAdapt {
                    ty: value.type_name(),
                    format,
                });
            }
            Value::List(list) => {
                DumperKey::List(find_list_element(list)?.unwrap_or(ValueType::String))
            }
            other => match other.value_type() {
                Some(ty) => DumperKey::Type(ty),
                None => {
                    return Err(AdaptError::CannotAdapt {
                        ty: other.type_name(),
                        format,
                    });
                }
            },
        };
        self.dumper_for_key(key, format)
    }

    fn dumper_for_key(&mut self, key: DumperKey, format: Format) -> AdaptResult<Rc<dyn Dumper>> {
        if let Some(dumper) = self.dumpers[format.index()].get(&key) {
            return Ok(Rc::clone(dumper));
        }

        let src = key.src();
        let factory = self
            .adapters
            .get_dumper(src, format)
            .ok_or(AdaptError::CannotAdapt {
                ty: src.name(),
                format,
            })?;
        tracing::debug!("Resolved {} dumper for {:?}", format, key);

        let mut dumper = factory(src, &*self);
        if let DumperKey::List(element) = key {
            // Attached before caching so a failed lookup leaves no entry behind.
            let sub = self.dumper_for_key(DumperKey::Type(element), format)?;
            dumper.set_sub_dumper(sub);
        }

        let dumper: Rc<dyn Dumper> = Rc::from(dumper);
        self.dumpers[format.index()].insert(key, Rc::clone(&dumper));
        Ok(dumper)
    }

    /// Loader for `oid` in `format`, cached per format.
    ///
    /// OIDs without a loader use the one registered for `oid::INVALID`.
    pub fn get_loader(&mut self, oid: Oid, format: Format) -> AdaptResult<Rc<dyn Loader>> {
        if let Some(loader) = self.loaders[format.index()].get(&oid) {
            return Ok(Rc::clone(loader));
        }

        let factory = match self.adapters.get_loader(oid, format) {
            Some(factory) => factory,
            None => {
                let fallback = self
                    .adapters
                    .get_loader(oid::INVALID, format)
                    .ok_or(AdaptError::LoaderNotFound { oid, format })?;
                tracing::warn!(
                    "No {} loader for oid {}, loading it as an unknown type",
                    format,
                    oid
                );
                fallback
            }
        };
        tracing::debug!("Resolved {} loader for oid {}", format, oid);

        let loader: Rc<dyn Loader> = Rc::from(factory(oid, &*self));
        self.loaders[format.index()].insert(oid, Rc::clone(&loader));
        Ok(loader)
    }

    /// Decode rows `row0..row1` of the bound result.
    pub fn load_rows(&self, row0: usize, row1: usize) -> AdaptResult<Vec<Vec<Value>>> {
        let result = self.pgresult.as_deref().ok_or(AdaptError::ResultNotSet)?;
        if row0 > row1 || row1 > self.ntuples {
            return Err(AdaptError::RowRange {
                row0,
                row1,
                ntuples: self.ntuples,
            });
        }

        tracing::trace!("Loading rows {}..{}", row0, row1);
        (row0..row1).map(|row| self.decode_row(result, row)).collect()
    }

    /// Decode one row; `None` when no result is bound or `row` is past the end.
    pub fn load_row(&self, row: usize) -> AdaptResult<Option<Vec<Value>>> {
        match self.pgresult.as_deref() {
            Some(result) if row < self.ntuples => self.decode_row(result, row).map(Some),
            _ => Ok(None),
        }
    }

    fn decode_row(&self, result: &dyn PgResult, row: usize) -> AdaptResult<Vec<Value>> {
        self.row_loaders
            .iter()
            .enumerate()
            .map(|(col, loader)| match result.get_value(row, col) {
                Some(data) => loader.load(data),
                None => Ok(Value::Null),
            })
            .collect()
    }

    /// Decode a flat record with the current column loaders.
    pub fn load_sequence<B: AsRef<[u8]>>(&self, record: &[Option<B>]) -> AdaptResult<Vec<Value>> {
        if record.len() != self.row_loaders.len() {
            return Err(AdaptError::SequenceShape {
                got: record.len(),
                expected: self.row_loaders.len(),
            });
        }

        record
            .iter()
            .zip(&self.row_loaders)
            .map(|(cell, loader)| match cell {
                Some(data) => loader.load(data.as_ref()),
                None => Ok(Value::Null),
            })
            .collect()
    }

    /// Encode parameters, one format per parameter.
    ///
    /// Returns the encoded buffers (`None` for nulls) and the OID of each.
    pub fn dump_sequence(
        &mut self,
        params: &[Value],
        formats: &[Format],
    ) -> AdaptResult<(Vec<Option<Bytes>>, Vec<Oid>)> {
        if params.len() != formats.len() {
            return Err(AdaptError::FormatCount {
                params: params.len(),
                formats: formats.len(),
            });
        }

        tracing::trace!("Dumping {} parameters", params.len());
        let mut buffers = Vec::with_capacity(params.len());
        let mut oids = Vec::with_capacity(params.len());
        for (param, &format) in params.iter().zip(formats) {
            if param.is_null() {
                buffers.push(None);
                oids.push(self.unknown_oid);
                continue;
            }

            let dumper = self.get_dumper(param, format)?;
            let dumped = dumper.dump(param)?;
            let oid = match dumped.oid.unwrap_or_else(|| dumper.oid()) {
                oid::INVALID => self.unknown_oid,
                oid => oid,
            };
            buffers.push(Some(dumped.data));
            oids.push(oid);
        }
        Ok((buffers, oids))
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AdaptContext for Transformer {
    fn adapters(&self) -> &Arc<AdaptersMap> {
        &self.adapters
    }

    fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("connection", &self.connection)
            .field("unknown_oid", &self.unknown_oid)
            .field("cached_dumpers", &(self.dumpers[0].len() + self.dumpers[1].len()))
            .field("cached_loaders", &(self.loaders[0].len() + self.loaders[1].len()))
            .field("nfields", &self.nfields)
            .field("ntuples", &self.ntuples)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::{Dumped, NewDumper, dumper_factory};
    use crate::result::ResultSet;
    use crate::protocol::FieldDescription;
    use crate::types::register_default_adapters;

    fn defaults() -> Arc<AdaptersMap> {
        let map = AdaptersMap::new();
        register_default_adapters(&map);
        Arc::new(map)
    }

    fn result(rows: &[&[Option<&str>]]) -> Rc<dyn PgResult> {
        let mut result = ResultSet::new(vec![
            FieldDescription::new("a", oid::INT4, Format::Text),
            FieldDescription::new("b", oid::TEXT, Format::Text),
        ])
        .unwrap();
        for row in rows {
            result
                .push_row(row.iter().map(|c| c.map(|s| s.as_bytes().to_vec())).collect())
                .unwrap();
        }
        Rc::new(result)
    }

    #[test]
    fn test_unknown_oid_depends_on_server_version() {
        let tx = Transformer::with_adapters(defaults(), None);
        assert_eq!(tx.unknown_oid(), oid::INVALID);
        let tx = Transformer::with_adapters(defaults(), Some(ConnectionInfo::new(90624)));
        assert_eq!(tx.unknown_oid(), oid::TEXT);
        let tx = Transformer::with_adapters(defaults(), Some(ConnectionInfo::new(100000)));
        assert_eq!(tx.unknown_oid(), oid::INVALID);
    }

    #[test]
    fn test_dumper_cache_per_format() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let a = tx.get_dumper(&Value::Int(1), Format::Text).unwrap();
        let b = tx.get_dumper(&Value::Int(2), Format::Text).unwrap();
        let c = tx.get_dumper(&Value::Int(3), Format::Binary).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_list_dumpers_keyed_by_element() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let ints = tx.get_dumper(&Value::list([Value::Int(1)]), Format::Text).unwrap();
        let nested = tx
            .get_dumper(&Value::list([Value::list([Value::Null, Value::Int(2)])]), Format::Text)
            .unwrap();
        let strings = tx.get_dumper(&Value::list([Value::from("a")]), Format::Text).unwrap();
        let nulls = tx.get_dumper(&Value::list([Value::Null]), Format::Text).unwrap();
        assert!(Rc::ptr_eq(&ints, &nested));
        assert!(!Rc::ptr_eq(&ints, &strings));
        assert!(Rc::ptr_eq(&strings, &nulls));
        assert_eq!(ints.oid(), oid::INT8_ARRAY);
        assert_eq!(strings.oid(), oid::TEXT_ARRAY);
    }

    #[test]
    fn test_missing_dumper() {
        let mut tx = Transformer::with_adapters(Arc::new(AdaptersMap::new()), None);
        let err = tx.get_dumper(&Value::Bool(true), Format::Binary).err().unwrap();
        assert_eq!(err.to_string(), "cannot adapt type bool to format BINARY");
        assert!(tx.get_dumper(&Value::Null, Format::Text).is_err());
    }

    #[test]
    fn test_failed_sub_dumper_leaves_no_cache_entry() {
        let map = Arc::new(AdaptersMap::new());
        map.register_dumper(
            ValueType::List,
            Format::Text,
            dumper_factory::<crate::types::array::ListDumper>(),
        );
        let mut tx = Transformer::with_adapters(Arc::clone(&map), None);
        let list = Value::list([Value::Int(1)]);
        assert!(matches!(
            tx.get_dumper(&list, Format::Text),
            Err(AdaptError::CannotAdapt { ty: "int", .. })
        ));
        assert!(tx.dumpers[0].is_empty());

        map.register_dumper(
            ValueType::Int,
            Format::Text,
            dumper_factory::<crate::types::scalar::IntDumper>(),
        );
        let dumper = tx.get_dumper(&list, Format::Text).unwrap();
        assert_eq!(dumper.dump(&list).unwrap().data.as_ref(), b"{1}");
    }

    #[test]
    fn test_recursive_list() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let list = crate::value::List::new(vec![Value::Int(1)]);
        list.push(Value::List(list.clone()));
        assert!(matches!(
            tx.get_dumper(&Value::List(list), Format::Text),
            Err(AdaptError::RecursiveList)
        ));
    }

    #[test]
    fn test_loader_cache_and_fallback() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let a = tx.get_loader(oid::INT4, Format::Text).unwrap();
        let b = tx.get_loader(oid::INT4, Format::Text).unwrap();
        assert!(Rc::ptr_eq(&a, &b));

        let unknown = tx.get_loader(999_999, Format::Text).unwrap();
        assert_eq!(unknown.oid(), 999_999);
        assert_eq!(unknown.load(b"whatever").unwrap(), Value::from("whatever"));

        let mut empty = Transformer::with_adapters(Arc::new(AdaptersMap::new()), None);
        assert!(matches!(
            empty.get_loader(oid::INT4, Format::Binary),
            Err(AdaptError::LoaderNotFound { oid: oid::INT4, format: Format::Binary })
        ));
    }

    #[test]
    fn test_load_rows_and_ranges() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        assert!(matches!(tx.load_rows(0, 0), Err(AdaptError::ResultNotSet)));
        assert_eq!(tx.load_row(0).unwrap(), None);

        tx.set_pgresult(Some(result(&[
            &[Some("1"), Some("one")],
            &[Some("2"), None],
            &[None, Some("three")],
        ])))
        .unwrap();
        assert_eq!(tx.nfields(), 2);
        assert_eq!(tx.ntuples(), 3);

        let rows = tx.load_rows(1, 3).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(2), Value::Null],
                vec![Value::Null, Value::from("three")],
            ]
        );
        assert!(tx.load_rows(2, 2).unwrap().is_empty());
        assert!(matches!(tx.load_rows(2, 1), Err(AdaptError::RowRange { .. })));
        assert!(matches!(tx.load_rows(0, 4), Err(AdaptError::RowRange { .. })));

        assert_eq!(tx.load_row(0).unwrap(), Some(vec![Value::Int(1), Value::from("one")]));
        assert_eq!(tx.load_row(3).unwrap(), None);
    }

    #[test]
    fn test_rebind_keeps_old_binding_on_error() {
        use crate::adapt::loader_factory;
        use crate::types::{scalar::IntLoader, text::TextLoader};

        // No fallback loader for unknown OIDs.
        let map = Arc::new(AdaptersMap::new());
        map.register_loader(oid::INT4, Format::Text, loader_factory::<IntLoader>());
        map.register_loader(oid::TEXT, Format::Text, loader_factory::<TextLoader>());
        let mut tx = Transformer::with_adapters(map, None);
        tx.set_pgresult(Some(result(&[&[Some("1"), Some("x")]]))).unwrap();

        let mut unknown = ResultSet::new(vec![FieldDescription::new("c", 424242, Format::Text)]).unwrap();
        unknown.push_row(vec![None]).unwrap();
        assert!(matches!(
            tx.set_pgresult(Some(Rc::new(unknown))),
            Err(AdaptError::LoaderNotFound { oid: 424242, .. })
        ));
        assert_eq!(tx.nfields(), 2);
        assert_eq!(tx.load_row(0).unwrap(), Some(vec![Value::Int(1), Value::from("x")]));

        tx.set_pgresult(None).unwrap();
        assert_eq!(tx.nfields(), 0);
        assert!(matches!(tx.load_rows(0, 0), Err(AdaptError::ResultNotSet)));
    }

    #[test]
    fn test_row_types_replace_bound_result() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let bound = result(&[&[Some("1"), Some("x")]]);

        // More types than result columns.
        tx.set_pgresult(Some(Rc::clone(&bound))).unwrap();
        tx.set_row_types(&[
            (oid::INT4, Format::Text),
            (oid::TEXT, Format::Text),
            (oid::BOOL, Format::Text),
        ])
        .unwrap();
        assert_eq!(tx.nfields(), 3);
        assert_eq!(tx.ntuples(), 0);
        assert!(tx.pgresult().is_none());
        assert!(matches!(tx.load_rows(0, 1), Err(AdaptError::ResultNotSet)));
        assert_eq!(tx.load_row(0).unwrap(), None);

        // Fewer types than result columns.
        tx.set_pgresult(Some(bound)).unwrap();
        tx.set_row_types(&[(oid::INT4, Format::Text)]).unwrap();
        assert_eq!(tx.nfields(), 1);
        assert_eq!(tx.load_row(0).unwrap(), None);
        assert_eq!(tx.load_sequence(&[Some("7")]).unwrap(), vec![Value::Int(7)]);
    }

    #[test]
    fn test_load_sequence() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        tx.set_row_types(&[(oid::INT8, Format::Text), (oid::BOOL, Format::Text)]).unwrap();
        assert_eq!(
            tx.load_sequence(&[Some("10"), None]).unwrap(),
            vec![Value::Int(10), Value::Null]
        );
        assert!(matches!(
            tx.load_sequence(&[Some("10")]),
            Err(AdaptError::SequenceShape { got: 1, expected: 2 })
        ));
    }

    #[test]
    fn test_dump_sequence() {
        let mut tx = Transformer::with_adapters(defaults(), None);
        let (buffers, oids) = tx
            .dump_sequence(&[Value::Null, Value::Int(5)], &[Format::Text, Format::Text])
            .unwrap();
        assert_eq!(buffers, vec![None, Some(Bytes::from_static(b"5"))]);
        assert_eq!(oids, vec![oid::INVALID, oid::INT8]);

        assert!(matches!(
            tx.dump_sequence(&[Value::Int(5)], &[]),
            Err(AdaptError::FormatCount { params: 1, formats: 0 })
        ));
    }

    #[test]
    fn test_dump_sequence_on_old_server() {
        let mut tx = Transformer::with_adapters(defaults(), Some(ConnectionInfo::new(90600)));
        let (_, oids) = tx
            .dump_sequence(&[Value::Null, Value::from("x")], &[Format::Text, Format::Text])
            .unwrap();
        assert_eq!(oids, vec![oid::TEXT, oid::TEXT]);
    }

    struct TaggedDumper;

    impl NewDumper for TaggedDumper {
        fn new(_src: ValueType, _context: &dyn AdaptContext) -> Self {
            TaggedDumper
        }
    }

    impl Dumper for TaggedDumper {
        fn src(&self) -> ValueType {
            ValueType::Int
        }

        fn oid(&self) -> Oid {
            oid::INT8
        }

        fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
            match value {
                Value::Int(n) if i16::try_from(*n).is_ok() => {
                    Ok(Dumped::with_oid(n.to_string().into_bytes(), oid::INT2))
                }
                Value::Int(n) => Ok(Dumped::new(n.to_string().into_bytes())),
                _ => Err(AdaptError::data("not an int")),
            }
        }
    }

    #[test]
    fn test_per_value_oid_override() {
        let map = Arc::new(AdaptersMap::new());
        map.register_dumper(ValueType::Int, Format::Text, dumper_factory::<TaggedDumper>());
        let mut tx = Transformer::with_adapters(map, None);
        let (_, oids) = tx
            .dump_sequence(&[Value::Int(1), Value::Int(1 << 20)], &[Format::Text; 2])
            .unwrap();
        assert_eq!(oids, vec![oid::INT2, oid::INT8]);
    }
}
