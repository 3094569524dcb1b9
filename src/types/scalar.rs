//! Booleans, integers, floats and UUIDs.

use super::{unexpected, utf8};
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::value::{Value, ValueType};
use bytes::BytesMut;
use postgres_protocol::types as pg;
use uuid::Uuid;

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::Bool, Format::Text, dumper_factory::<BoolDumper>());
    map.register_dumper(ValueType::Bool, Format::Binary, dumper_factory::<BoolBinaryDumper>());
    map.register_loader(oid::BOOL, Format::Text, loader_factory::<BoolLoader>());
    map.register_loader(oid::BOOL, Format::Binary, loader_factory::<BoolBinaryLoader>());

    map.register_dumper(ValueType::Int, Format::Text, dumper_factory::<IntDumper>());
    map.register_dumper(ValueType::Int, Format::Binary, dumper_factory::<IntBinaryDumper>());
    for oid in [oid::INT2, oid::INT4, oid::INT8, oid::OID] {
        map.register_loader(oid, Format::Text, loader_factory::<IntLoader>());
        map.register_loader(oid, Format::Binary, loader_factory::<IntBinaryLoader>());
    }

    map.register_dumper(ValueType::Float, Format::Text, dumper_factory::<FloatDumper>());
    map.register_dumper(ValueType::Float, Format::Binary, dumper_factory::<FloatBinaryDumper>());
    for oid in [oid::FLOAT4, oid::FLOAT8] {
        map.register_loader(oid, Format::Text, loader_factory::<FloatLoader>());
        map.register_loader(oid, Format::Binary, loader_factory::<FloatBinaryLoader>());
    }

    map.register_dumper(ValueType::Uuid, Format::Text, dumper_factory::<UuidDumper>());
    map.register_dumper(ValueType::Uuid, Format::Binary, dumper_factory::<UuidBinaryDumper>());
    map.register_loader(oid::UUID, Format::Text, loader_factory::<UuidLoader>());
    map.register_loader(oid::UUID, Format::Binary, loader_factory::<UuidBinaryLoader>());
}

// ==================== Boolean ====================

pub struct BoolDumper {
    src: ValueType,
}

impl NewDumper for BoolDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for BoolDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::BOOL
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Bool(b) => Ok(Dumped::new(if *b { &b"t"[..] } else { &b"f"[..] })),
            other => Err(unexpected(ValueType::Bool, other)),
        }
    }
}

pub struct BoolBinaryDumper {
    src: ValueType,
}

impl NewDumper for BoolBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for BoolBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::BOOL
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Bool(b) => {
                let mut buf = BytesMut::with_capacity(1);
                pg::bool_to_sql(*b, &mut buf);
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::Bool, other)),
        }
    }
}

pub struct BoolLoader {
    oid: Oid,
}

impl NewLoader for BoolLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for BoolLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        // The server sends 't' or 'f'; the other spellings are what it accepts as input.
        match data.trim_ascii().to_ascii_lowercase().as_slice() {
            b"t" | b"true" | b"y" | b"yes" | b"on" | b"1" => Ok(Value::Bool(true)),
            b"f" | b"false" | b"n" | b"no" | b"off" | b"0" => Ok(Value::Bool(false)),
            _ => Err(AdaptError::Data(format!(
                "Invalid boolean: '{}'",
                String::from_utf8_lossy(data)
            ))),
        }
    }
}

pub struct BoolBinaryLoader {
    oid: Oid,
}

impl NewLoader for BoolBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for BoolBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        pg::bool_from_sql(data).map(Value::Bool).map_err(AdaptError::data)
    }
}

// ==================== Integer Types ====================

pub struct IntDumper {
    src: ValueType,
}

impl NewDumper for IntDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for IntDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::INT8
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Int(n) => {
                let mut tmp = itoa::Buffer::new();
                Ok(Dumped::new(bytes::Bytes::copy_from_slice(tmp.format(*n).as_bytes())))
            }
            other => Err(unexpected(ValueType::Int, other)),
        }
    }
}

pub struct IntBinaryDumper {
    src: ValueType,
}

impl NewDumper for IntBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for IntBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::INT8
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Int(n) => {
                let mut buf = BytesMut::with_capacity(8);
                pg::int8_to_sql(*n, &mut buf);
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::Int, other)),
        }
    }
}

/// Text integers of any width.
pub struct IntLoader {
    oid: Oid,
}

impl NewLoader for IntLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for IntLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        utf8(data)?
            .parse()
            .map(Value::Int)
            .map_err(|e| AdaptError::Data(format!("Invalid integer: {}", e)))
    }
}

/// Binary integers; the width follows the OID.
pub struct IntBinaryLoader {
    oid: Oid,
}

impl NewLoader for IntBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for IntBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        // Aliased OIDs only tell the width through the data length.
        let n = match (self.oid, data.len()) {
            (oid::OID, _) => pg::oid_from_sql(data).map(i64::from),
            (oid::INT2, _) | (_, 2) => pg::int2_from_sql(data).map(i64::from),
            (oid::INT4, _) | (_, 4) => pg::int4_from_sql(data).map(i64::from),
            _ => pg::int8_from_sql(data),
        };
        n.map(Value::Int).map_err(AdaptError::data)
    }
}

// ==================== Float Types ====================

pub struct FloatDumper {
    src: ValueType,
}

impl NewDumper for FloatDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for FloatDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::FLOAT8
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let f = match value {
            Value::Float(f) => *f,
            other => return Err(unexpected(ValueType::Float, other)),
        };

        let data: &'static [u8] = if f.is_nan() {
            b"NaN"
        } else if f == f64::INFINITY {
            b"Infinity"
        } else if f == f64::NEG_INFINITY {
            b"-Infinity"
        } else {
            let mut tmp = ryu::Buffer::new();
            return Ok(Dumped::new(bytes::Bytes::copy_from_slice(tmp.format_finite(f).as_bytes())));
        };
        Ok(Dumped::new(data))
    }
}

pub struct FloatBinaryDumper {
    src: ValueType,
}

impl NewDumper for FloatBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for FloatBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::FLOAT8
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Float(f) => {
                let mut buf = BytesMut::with_capacity(8);
                pg::float8_to_sql(*f, &mut buf);
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::Float, other)),
        }
    }
}

pub struct FloatLoader {
    oid: Oid,
}

impl NewLoader for FloatLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for FloatLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        // Accepts NaN, Infinity and -Infinity as the server spells them.
        utf8(data)?
            .parse()
            .map(Value::Float)
            .map_err(|e| AdaptError::Data(format!("Invalid float: {}", e)))
    }
}

pub struct FloatBinaryLoader {
    oid: Oid,
}

impl NewLoader for FloatBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for FloatBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let f = match (self.oid, data.len()) {
            (oid::FLOAT4, _) | (_, 4) => pg::float4_from_sql(data).map(f64::from),
            _ => pg::float8_from_sql(data),
        };
        f.map(Value::Float).map_err(AdaptError::data)
    }
}

// ==================== UUID ====================

pub struct UuidDumper {
    src: ValueType,
}

impl NewDumper for UuidDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for UuidDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::UUID
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Uuid(u) => {
                // UUID: 36-char hyphenated lowercase
                let mut uuid_buf = [0u8; 36];
                u.hyphenated().encode_lower(&mut uuid_buf);
                Ok(Dumped::new(bytes::Bytes::copy_from_slice(&uuid_buf)))
            }
            other => Err(unexpected(ValueType::Uuid, other)),
        }
    }
}

pub struct UuidBinaryDumper {
    src: ValueType,
}

impl NewDumper for UuidBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for UuidBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::UUID
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Uuid(u) => {
                let mut buf = BytesMut::with_capacity(16);
                pg::uuid_to_sql(*u.as_bytes(), &mut buf);
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::Uuid, other)),
        }
    }
}

pub struct UuidLoader {
    oid: Oid,
}

impl NewLoader for UuidLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for UuidLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        Uuid::parse_str(utf8(data)?)
            .map(Value::Uuid)
            .map_err(|e| AdaptError::Data(format!("Invalid UUID: {}", e)))
    }
}

pub struct UuidBinaryLoader {
    oid: Oid,
}

impl NewLoader for UuidBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for UuidBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        pg::uuid_from_sql(data)
            .map(|b| Value::Uuid(Uuid::from_bytes(b)))
            .map_err(AdaptError::data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::Session;

    fn ctx() -> Session {
        Session::with_parent(std::sync::Arc::new(AdaptersMap::new()), None)
    }

    #[test]
    fn test_int_text() {
        let dumper = IntDumper::new(ValueType::Int, &ctx());
        assert_eq!(dumper.dump(&Value::Int(-17)).unwrap().data.as_ref(), b"-17");
        assert_eq!(dumper.oid(), oid::INT8);

        let loader = IntLoader::new(oid::INT4, &ctx());
        assert_eq!(loader.load(b"42").unwrap(), Value::Int(42));
        assert!(loader.load(b"4x2").is_err());
    }

    #[test]
    fn test_int_binary_widths() {
        let loader = IntBinaryLoader::new(oid::INT2, &ctx());
        assert_eq!(loader.load(&(-3i16).to_be_bytes()).unwrap(), Value::Int(-3));

        let loader = IntBinaryLoader::new(oid::INT4, &ctx());
        assert_eq!(loader.load(&42i32.to_be_bytes()).unwrap(), Value::Int(42));
        assert!(loader.load(&42i64.to_be_bytes()).is_err());

        let aliased = IntBinaryLoader::new(16385, &ctx());
        assert_eq!(aliased.load(&7i32.to_be_bytes()).unwrap(), Value::Int(7));
        assert_eq!(aliased.load(&7i64.to_be_bytes()).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_bool_text() {
        let loader = BoolLoader::new(oid::BOOL, &ctx());
        assert_eq!(loader.load(b"t").unwrap(), Value::Bool(true));
        assert_eq!(loader.load(b"f").unwrap(), Value::Bool(false));
        assert_eq!(loader.load(b"TRUE").unwrap(), Value::Bool(true));
        assert_eq!(loader.load(b" off ").unwrap(), Value::Bool(false));
        assert!(loader.load(b"").is_err());
        assert!(loader.load(b"tx").is_err());
        assert!(loader.load(b"1junk").is_err());
        assert!(loader.load(b"fals").is_err());
    }

    #[test]
    fn test_float_special_values() {
        let dumper = FloatDumper::new(ValueType::Float, &ctx());
        let dump = |f: f64| dumper.dump(&Value::Float(f)).unwrap().data;
        assert_eq!(dump(f64::INFINITY).as_ref(), b"Infinity");
        assert_eq!(dump(f64::NEG_INFINITY).as_ref(), b"-Infinity");
        assert_eq!(dump(f64::NAN).as_ref(), b"NaN");
        assert_eq!(dump(0.25).as_ref(), b"0.25");

        let loader = FloatLoader::new(oid::FLOAT8, &ctx());
        assert_eq!(loader.load(b"-Infinity").unwrap(), Value::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_uuid_from_binary() {
        let uuid_bytes: [u8; 16] = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        let loader = UuidBinaryLoader::new(oid::UUID, &ctx());
        let value = loader.load(&uuid_bytes).unwrap();
        assert_eq!(value.to_string(), "'550e8400-e29b-41d4-a716-446655440000'");
    }
}
