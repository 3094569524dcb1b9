//! JSON and JSONB.

use super::unexpected;
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::value::{Value, ValueType};

/// JSONB binary format version byte.
const JSONB_VERSION: u8 = 1;

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::Json, Format::Text, dumper_factory::<JsonDumper>());
    map.register_dumper(ValueType::Json, Format::Binary, dumper_factory::<JsonbBinaryDumper>());
    for oid in [oid::JSON, oid::JSONB] {
        map.register_loader(oid, Format::Text, loader_factory::<JsonLoader>());
        map.register_loader(oid, Format::Binary, loader_factory::<JsonBinaryLoader>());
    }
}

fn parse_json(data: &[u8]) -> AdaptResult<Value> {
    serde_json::from_slice(data)
        .map(Value::Json)
        .map_err(|e| AdaptError::Data(format!("Invalid JSON: {}", e)))
}

fn json_of(value: &Value) -> AdaptResult<&serde_json::Value> {
    match value {
        Value::Json(json) => Ok(json),
        other => Err(unexpected(ValueType::Json, other)),
    }
}

pub struct JsonDumper {
    src: ValueType,
}

impl NewDumper for JsonDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for JsonDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::JSONB
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let text = serde_json::to_vec(json_of(value)?).map_err(AdaptError::data)?;
        Ok(Dumped::new(text))
    }
}

/// Encodes as JSONB: version byte, then the JSON text.
pub struct JsonbBinaryDumper {
    src: ValueType,
}

impl NewDumper for JsonbBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for JsonbBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::JSONB
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let json = json_of(value)?;
        let mut buf = vec![JSONB_VERSION];
        serde_json::to_writer(&mut buf, json).map_err(AdaptError::data)?;
        Ok(Dumped::new(buf))
    }
}

pub struct JsonLoader {
    oid: Oid,
}

impl NewLoader for JsonLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for JsonLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        parse_json(data)
    }
}

/// Binary JSON is plain text; binary JSONB carries a version byte first.
pub struct JsonBinaryLoader {
    oid: Oid,
}

impl NewLoader for JsonBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for JsonBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        if self.oid != oid::JSONB {
            return parse_json(data);
        }
        match data.split_first() {
            Some((&JSONB_VERSION, rest)) => parse_json(rest),
            Some((version, _)) => Err(AdaptError::Data(format!(
                "Unsupported JSONB version: {}",
                version
            ))),
            None => Err(AdaptError::Data("Empty JSONB value".to_string())),
        }
    }
}
