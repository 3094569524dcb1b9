use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use qail_adapt::prelude::*;

/// Dump `value` as a parameter, then load it back with the loader of the reported OID.
fn roundtrip(value: &Value, format: Format) -> Value {
    let mut tx = Transformer::new(None);
    let (buffers, oids) = tx
        .dump_sequence(std::slice::from_ref(value), &[format])
        .expect("Failed to dump");
    let oid = match oids[0] {
        oid::INVALID => oid::TEXT,
        oid => oid,
    };

    tx.set_row_types(&[(oid, format)]).expect("Failed to resolve loader");
    let mut row = tx.load_sequence(buffers.as_slice()).expect("Failed to load");
    row.remove(0)
}

fn samples() -> Vec<Value> {
    let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    vec![
        Value::Bool(false),
        Value::Int(-1),
        Value::Int(i64::MIN),
        Value::Float(3.25),
        Value::Numeric(Numeric::new("1234567890.0987654321")),
        Value::from("quote \" and \\ backslash"),
        Value::Bytes(b"\x00\x01binary".to_vec()),
        Value::Uuid(uuid::Uuid::nil()),
        Value::Json(serde_json::json!({"a": {"b": [true, null]}})),
        Value::Date(date),
        Value::Timestamp(date.and_hms_opt(23, 59, 59).unwrap()),
    ]
}

#[test]
fn test_scalars_roundtrip() {
    for format in Format::ALL {
        for value in samples() {
            assert_eq!(roundtrip(&value, format), value, "{} roundtrip", format);
        }
    }
}

#[test]
fn test_lists_roundtrip() {
    let lists = vec![
        Value::list([Value::Int(1), Value::Null, Value::Int(3)]),
        Value::list([
            Value::list([Value::from("a"), Value::from("b c")]),
            Value::list([Value::from("NULL"), Value::from("")]),
        ]),
        Value::list([Value::Float(0.5), Value::Float(-2.0)]),
        Value::list([Value::Bool(true), Value::Null]),
        Value::list([Value::Uuid(uuid::Uuid::from_u128(1))]),
        Value::list([Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())]),
    ];

    for format in Format::ALL {
        for list in &lists {
            assert_eq!(&roundtrip(list, format), list, "{} roundtrip", format);
        }
    }
}

#[test]
fn test_array_text_literal() {
    let mut tx = Transformer::new(None);
    let value = Value::list([
        Value::list([Value::from("x,y"), Value::Null]),
        Value::list([Value::from("{}"), Value::from("null")]),
    ]);
    let (buffers, oids) = tx.dump_sequence(&[value], &[Format::Text]).unwrap();
    assert_eq!(
        buffers[0].as_deref(),
        Some(&br#"{{"x,y",NULL},{"{}","null"}}"#[..])
    );
    assert_eq!(oids, vec![oid::TEXT_ARRAY]);
}

#[test]
fn test_ragged_binary_list_rejected() {
    let mut tx = Transformer::new(None);
    let ragged = Value::list([
        Value::list([Value::Int(1)]),
        Value::list([Value::Int(2), Value::Int(3)]),
    ]);
    assert!(matches!(
        tx.dump_sequence(&[ragged.clone()], &[Format::Binary]),
        Err(AdaptError::Data(_))
    ));

    // The text format has no such restriction.
    let (buffers, _) = tx.dump_sequence(&[ragged], &[Format::Text]).unwrap();
    assert_eq!(buffers[0].as_deref(), Some(&b"{{1},{2,3}}"[..]));
}
