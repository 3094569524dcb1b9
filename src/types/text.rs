//! Strings, bytea and the loaders for unknown types.

use super::{unexpected, utf8};
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::value::{Value, ValueType};
use bytes::{BufMut, Bytes, BytesMut};

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::String, Format::Text, dumper_factory::<StringDumper>());
    map.register_dumper(ValueType::String, Format::Binary, dumper_factory::<StringBinaryDumper>());
    for oid in [oid::TEXT, oid::VARCHAR, oid::BPCHAR, oid::NAME, oid::CHAR] {
        map.register_loader(oid, Format::Text, loader_factory::<TextLoader>());
        map.register_loader(oid, Format::Binary, loader_factory::<TextLoader>());
    }

    map.register_dumper(ValueType::Bytes, Format::Text, dumper_factory::<BytesDumper>());
    map.register_dumper(ValueType::Bytes, Format::Binary, dumper_factory::<BytesBinaryDumper>());
    map.register_loader(oid::BYTEA, Format::Text, loader_factory::<ByteaLoader>());
    map.register_loader(oid::BYTEA, Format::Binary, loader_factory::<ByteaBinaryLoader>());

    map.register_loader(oid::INVALID, Format::Text, loader_factory::<TextLoader>());
    map.register_loader(oid::INVALID, Format::Binary, loader_factory::<ByteaBinaryLoader>());
}

fn check_nul(s: &str) -> AdaptResult<()> {
    if s.as_bytes().contains(&0) {
        return Err(AdaptError::Data(
            "Value contains NULL byte (0x00) which is invalid in PostgreSQL".to_string(),
        ));
    }
    Ok(())
}

// ==================== String Types ====================

/// Text strings are sent untyped so the server can cast them to the target.
pub struct StringDumper {
    src: ValueType,
}

impl NewDumper for StringDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for StringDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::INVALID
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::String(s) => {
                check_nul(s)?;
                Ok(Dumped::new(Bytes::copy_from_slice(s.as_bytes())))
            }
            other => Err(unexpected(ValueType::String, other)),
        }
    }
}

pub struct StringBinaryDumper {
    src: ValueType,
}

impl NewDumper for StringBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for StringBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::TEXT
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::String(s) => {
                check_nul(s)?;
                let mut buf = BytesMut::with_capacity(s.len());
                postgres_protocol::types::text_to_sql(s, &mut buf);
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::String, other)),
        }
    }
}

/// Character types in either format; the bytes are the same.
pub struct TextLoader {
    oid: Oid,
}

impl NewLoader for TextLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for TextLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        Ok(Value::String(utf8(data)?.to_string()))
    }
}

// ==================== Bytes ====================

const HEX: &[u8; 16] = b"0123456789abcdef";

pub struct BytesDumper {
    src: ValueType,
}

impl NewDumper for BytesDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for BytesDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::BYTEA
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Bytes(bytes) => {
                // Hex format: \x followed by two digits per byte
                let mut buf = BytesMut::with_capacity(2 + bytes.len() * 2);
                buf.put_slice(b"\\x");
                for byte in bytes {
                    buf.put_u8(HEX[(byte >> 4) as usize]);
                    buf.put_u8(HEX[(byte & 0x0f) as usize]);
                }
                Ok(Dumped::new(buf.freeze()))
            }
            other => Err(unexpected(ValueType::Bytes, other)),
        }
    }
}

pub struct BytesBinaryDumper {
    src: ValueType,
}

impl NewDumper for BytesBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for BytesBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::BYTEA
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Bytes(bytes) => Ok(Dumped::new(Bytes::copy_from_slice(bytes))),
            other => Err(unexpected(ValueType::Bytes, other)),
        }
    }
}

/// Text bytea, in hex or in the older escape format.
pub struct ByteaLoader {
    oid: Oid,
}

impl NewLoader for ByteaLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for ByteaLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        match data.strip_prefix(b"\\x") {
            Some(hex) => decode_hex(hex).map(Value::Bytes),
            None => decode_escape(data).map(Value::Bytes),
        }
    }
}

fn hex_digit(c: u8) -> AdaptResult<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(AdaptError::Data(format!("Invalid hex digit '{}'", c as char))),
    }
}

fn decode_hex(hex: &[u8]) -> AdaptResult<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(AdaptError::Data("Odd number of hex digits in bytea".to_string()));
    }
    hex.chunks_exact(2)
        .map(|pair| Ok((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

fn decode_escape(data: &[u8]) -> AdaptResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'\\' {
            out.push(data[i]);
            i += 1;
        } else if data.get(i + 1) == Some(&b'\\') {
            out.push(b'\\');
            i += 2;
        } else {
            let octal = data
                .get(i + 1..i + 4)
                .filter(|d| d.iter().all(|c| (b'0'..=b'7').contains(c)))
                .ok_or_else(|| AdaptError::Data("Invalid escape in bytea".to_string()))?;
            let n = octal.iter().fold(0u16, |acc, c| acc * 8 + (c - b'0') as u16);
            let byte = u8::try_from(n)
                .map_err(|_| AdaptError::Data("Octal escape out of range in bytea".to_string()))?;
            out.push(byte);
            i += 4;
        }
    }
    Ok(out)
}

/// Raw bytes; also the binary loader for unknown types.
pub struct ByteaBinaryLoader {
    oid: Oid,
}

impl NewLoader for ByteaBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for ByteaBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        Ok(Value::Bytes(postgres_protocol::types::bytea_from_sql(data).to_vec()))
    }
}
