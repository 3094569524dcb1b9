use pretty_assertions::assert_eq;
use qail_adapt::prelude::*;
use qail_adapt::types::register_default_adapters;
use std::sync::Arc;

/// Dumps integers as quoted strings, to tell it apart from the built-in one.
struct QuotedIntDumper {
    src: ValueType,
}

impl NewDumper for QuotedIntDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for QuotedIntDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::TEXT
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Int(n) => Ok(Dumped::new(format!("'{}'", n).into_bytes())),
            other => Err(AdaptError::data(format!("not an int: {}", other))),
        }
    }
}

/// Loads anything as its byte length, reading the encoding from the context.
struct LengthLoader {
    oid: Oid,
    encoding: String,
}

impl Loader for LengthLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        Ok(Value::String(format!("{} bytes ({})", data.len(), self.encoding)))
    }
}

fn defaults() -> Arc<AdaptersMap> {
    let map = AdaptersMap::new();
    register_default_adapters(&map);
    Arc::new(map)
}

#[test]
fn test_session_registration_shadows_parent() {
    let parent = defaults();
    let session = Session::with_parent(Arc::clone(&parent), None);
    register_dumper(
        ValueType::Int,
        Format::Text,
        dumper_factory::<QuotedIntDumper>(),
        Some(&session),
    );

    let mut tx = Transformer::new(Some(&session));
    let (buffers, oids) = tx.dump_sequence(&[Value::Int(3)], &[Format::Text]).unwrap();
    assert_eq!(buffers, vec![Some(bytes::Bytes::from_static(b"'3'"))]);
    assert_eq!(oids, vec![oid::TEXT]);

    // The parent map and other sessions still use the built-in dumper.
    let mut tx = Transformer::with_adapters(parent, None);
    let (buffers, _) = tx.dump_sequence(&[Value::Int(3)], &[Format::Text]).unwrap();
    assert_eq!(buffers, vec![Some(bytes::Bytes::from_static(b"3"))]);
}

#[test]
fn test_closure_loader_reads_connection() {
    let session = Session::with_parent(
        defaults(),
        Some(ConnectionInfo::new(160000).with_encoding("LATIN1")),
    );
    register_loader(
        oid::JSON,
        Format::Text,
        |oid, context: &dyn AdaptContext| -> Box<dyn Loader> {
            Box::new(LengthLoader {
                oid,
                encoding: context
                    .connection()
                    .map(|c| c.client_encoding.clone())
                    .unwrap_or_default(),
            })
        },
        Some(&session),
    );

    let mut tx = Transformer::new(Some(&session));
    tx.set_row_types(&[(oid::JSON, Format::Text)]).unwrap();
    assert_eq!(
        tx.load_sequence(&[Some("{}")]).unwrap(),
        vec![Value::from("2 bytes (LATIN1)")]
    );
}

#[test]
fn test_registration_after_transformer_creation_is_seen() {
    let session = Session::with_parent(defaults(), None);
    let mut tx = Transformer::new(Some(&session));

    // Not resolved yet, so the new registration is picked up.
    register_dumper(
        ValueType::Int,
        Format::Binary,
        dumper_factory::<QuotedIntDumper>(),
        Some(&session),
    );
    let dumper = tx.get_dumper(&Value::Int(1), Format::Binary).unwrap();
    assert_eq!(dumper.oid(), oid::TEXT);
}

#[test]
fn test_missing_dumper_and_loader() {
    let mut tx = Transformer::with_adapters(Arc::new(AdaptersMap::new()), None);
    let err = tx
        .dump_sequence(&[Value::Json(serde_json::json!([1]))], &[Format::Binary])
        .unwrap_err();
    assert_eq!(err.to_string(), "cannot adapt type json to format BINARY");

    let err = tx.set_row_types(&[(oid::UUID, Format::Text)]).unwrap_err();
    assert!(matches!(
        err,
        AdaptError::LoaderNotFound {
            oid: oid::UUID,
            format: Format::Text
        }
    ));
}

#[test]
fn test_global_map_has_builtins() {
    let global = global_adapters();
    for ty in ValueType::ALL {
        for format in Format::ALL {
            assert!(
                global.get_dumper(ty, format).is_some(),
                "no {} dumper for {}",
                format,
                ty
            );
        }
    }
    assert!(global.has_fallback_loader(Format::Text));
    assert!(global.has_fallback_loader(Format::Binary));
}

#[test]
fn test_config_alias_session() {
    let config = AdaptConfig::parse(
        r#"
        [connection]
        server_version = 120000

        [[alias]]
        oid = 70001
        like = "uuid"
        "#,
    )
    .unwrap();
    let session = config.to_session().unwrap();

    let mut tx = Transformer::new(Some(&session));
    tx.set_row_types(&[(70001, Format::Text)]).unwrap();
    let row = tx
        .load_sequence(&[Some("550e8400-e29b-41d4-a716-446655440000")])
        .unwrap();
    assert_eq!(
        row,
        vec![Value::Uuid(uuid::Uuid::from_u128(
            0x550e8400_e29b_41d4_a716_446655440000
        ))]
    );
}
