//! NUMERIC/DECIMAL type support for PostgreSQL.
//!
//! PostgreSQL NUMERIC is a variable-precision type stored in a packed
//! base-10000 binary format. Values are kept in their decimal string form
//! and converted to and from the packed form at the wire.

use super::{unexpected, utf8};
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::value::{Value, ValueType};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const SIGN_POS: u16 = 0x0000;
const SIGN_NEG: u16 = 0x4000;
const SIGN_NAN: u16 = 0xC000;
const SIGN_PINF: u16 = 0xD000;
const SIGN_NINF: u16 = 0xF000;

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::Numeric, Format::Text, dumper_factory::<NumericDumper>());
    map.register_dumper(ValueType::Numeric, Format::Binary, dumper_factory::<NumericBinaryDumper>());
    map.register_loader(oid::NUMERIC, Format::Text, loader_factory::<NumericLoader>());
    map.register_loader(oid::NUMERIC, Format::Binary, loader_factory::<NumericBinaryLoader>());
}

/// NUMERIC/DECIMAL type (stored as string for precision)
#[derive(Debug, Clone, PartialEq)]
pub struct Numeric(pub String);

impl Numeric {
    /// Create from string representation
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse as f64 (may lose precision for very large numbers)
    pub fn to_f64(&self) -> Result<f64, std::num::ParseFloatError> {
        self.0.parse()
    }

    /// Parse as i64 (truncates decimal part)
    pub fn to_i64(&self) -> Result<i64, std::num::ParseIntError> {
        let int_part = self.0.split('.').next().unwrap_or("0");
        int_part.parse()
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct NumericDumper {
    src: ValueType,
}

impl NewDumper for NumericDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for NumericDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::NUMERIC
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Numeric(n) => Ok(Dumped::new(Bytes::copy_from_slice(n.as_str().as_bytes()))),
            other => Err(unexpected(ValueType::Numeric, other)),
        }
    }
}

pub struct NumericBinaryDumper {
    src: ValueType,
}

impl NewDumper for NumericBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for NumericBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::NUMERIC
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Numeric(n) => encode_numeric_binary(n.as_str()).map(Dumped::new),
            other => Err(unexpected(ValueType::Numeric, other)),
        }
    }
}

pub struct NumericLoader {
    oid: Oid,
}

impl NewLoader for NumericLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for NumericLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        Ok(Value::Numeric(Numeric::new(utf8(data)?)))
    }
}

pub struct NumericBinaryLoader {
    oid: Oid,
}

impl NewLoader for NumericBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for NumericBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        decode_numeric_binary(data).map(Value::Numeric)
    }
}

/// Encode a decimal string into the packed binary NUMERIC format.
fn encode_numeric_binary(s: &str) -> AdaptResult<Bytes> {
    let header = |ndigits: u16, weight: i16, sign: u16, dscale: u16, digits: &[u16]| {
        let mut buf = BytesMut::with_capacity(8 + digits.len() * 2);
        buf.put_u16(ndigits);
        buf.put_i16(weight);
        buf.put_u16(sign);
        buf.put_u16(dscale);
        for d in digits {
            buf.put_u16(*d);
        }
        buf.freeze()
    };

    match s.trim() {
        "NaN" | "nan" => return Ok(header(0, 0, SIGN_NAN, 0, &[])),
        "Infinity" | "+Infinity" => return Ok(header(0, 0, SIGN_PINF, 0, &[])),
        "-Infinity" => return Ok(header(0, 0, SIGN_NINF, 0, &[])),
        _ => {}
    }

    let invalid = || AdaptError::Data(format!("Invalid numeric: '{}'", s));
    let trimmed = s.trim();
    let (sign, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (SIGN_NEG, &trimmed[1..]),
        Some(b'+') => (SIGN_POS, &trimmed[1..]),
        _ => (SIGN_POS, trimmed),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if (int_part.is_empty() && frac_part.is_empty())
        || !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let dscale = u16::try_from(frac_part.len()).map_err(|_| invalid())?;

    // Align both parts on base-10000 group boundaries.
    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let mut aligned = String::with_capacity(int_pad + int_part.len() + frac_part.len() + frac_pad);
    aligned.extend(std::iter::repeat_n('0', int_pad));
    aligned.push_str(int_part);
    aligned.push_str(frac_part);
    aligned.extend(std::iter::repeat_n('0', frac_pad));

    let mut digits: Vec<u16> = aligned
        .as_bytes()
        .chunks(4)
        .map(|group| group.iter().fold(0u16, |acc, b| acc * 10 + (b - b'0') as u16))
        .collect();
    let mut weight = ((int_pad + int_part.len()) / 4) as i32 - 1;

    let leading = digits.iter().take_while(|d| **d == 0).count();
    digits.drain(..leading);
    weight -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        return Ok(header(0, 0, SIGN_POS, dscale, &[]));
    }

    let ndigits = u16::try_from(digits.len()).map_err(|_| invalid())?;
    let weight = i16::try_from(weight).map_err(|_| invalid())?;
    Ok(header(ndigits, weight, sign, dscale, &digits))
}

/// Decode PostgreSQL binary NUMERIC format
fn decode_numeric_binary(bytes: &[u8]) -> AdaptResult<Numeric> {
    if bytes.len() < 8 {
        return Err(AdaptError::Data("NUMERIC too short".to_string()));
    }

    // 2 bytes: ndigits (number of base-10000 digits)
    // 2 bytes: weight (position of first digit relative to decimal point)
    // 2 bytes: sign (0=pos, 0x4000=neg, 0xC000=NaN, 0xD000/0xF000=±Infinity)
    // 2 bytes: dscale (number of decimal digits after decimal point)
    // ndigits * 2 bytes: digits (each 0-9999)
    let mut buf = bytes;
    let ndigits = buf.get_u16() as usize;
    let weight = buf.get_i16() as i32;
    let sign = buf.get_u16();
    let dscale = buf.get_u16() as usize;

    if buf.remaining() < ndigits * 2 {
        return Err(AdaptError::Data("NUMERIC truncated".to_string()));
    }

    match sign {
        SIGN_NAN => return Ok(Numeric::new("NaN")),
        SIGN_PINF => return Ok(Numeric::new("Infinity")),
        SIGN_NINF => return Ok(Numeric::new("-Infinity")),
        SIGN_POS | SIGN_NEG => {}
        other => {
            return Err(AdaptError::Data(format!("Invalid NUMERIC sign 0x{:04x}", other)));
        }
    }

    let digits: Vec<u16> = (0..ndigits).map(|_| buf.get_u16()).collect();
    let digit_at = |i: i32| -> u16 {
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut result = String::new();
    if sign == SIGN_NEG {
        result.push('-');
    }

    // Integer part
    if weight < 0 {
        result.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                result.push_str(&digit_at(i).to_string());
            } else {
                result.push_str(&format!("{:04}", digit_at(i)));
            }
        }
    }

    // Decimal part
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(i)));
            i += 1;
        }
        frac.truncate(dscale);
        result.push('.');
        result.push_str(&frac);
    }

    Ok(Numeric(result))
}
