//! Dates and timestamps without time zone.
//!
//! Binary values count days (dates) or microseconds (timestamps) from
//! 2000-01-01, the PostgreSQL epoch.

use super::{unexpected, utf8};
use crate::adapt::{
    AdaptContext, AdaptersMap, Dumped, Dumper, Loader, NewDumper, NewLoader, dumper_factory,
    loader_factory,
};
use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{Format, Oid, oid};
use crate::value::{Value, ValueType};
use bytes::BytesMut;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use postgres_protocol::types as pg;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Days between the Unix epoch and the PostgreSQL epoch.
const PG_EPOCH_DAYS: i64 = 10_957;

pub(super) fn register(map: &AdaptersMap) {
    map.register_dumper(ValueType::Date, Format::Text, dumper_factory::<DateDumper>());
    map.register_dumper(ValueType::Date, Format::Binary, dumper_factory::<DateBinaryDumper>());
    map.register_loader(oid::DATE, Format::Text, loader_factory::<DateLoader>());
    map.register_loader(oid::DATE, Format::Binary, loader_factory::<DateBinaryLoader>());

    map.register_dumper(ValueType::Timestamp, Format::Text, dumper_factory::<TimestampDumper>());
    map.register_dumper(
        ValueType::Timestamp,
        Format::Binary,
        dumper_factory::<TimestampBinaryDumper>(),
    );
    map.register_loader(oid::TIMESTAMP, Format::Text, loader_factory::<TimestampLoader>());
    map.register_loader(oid::TIMESTAMP, Format::Binary, loader_factory::<TimestampBinaryLoader>());
}

fn pg_epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc() + Duration::days(PG_EPOCH_DAYS)
}

fn out_of_range(what: &str) -> AdaptError {
    AdaptError::Data(format!("{} out of range", what))
}

pub struct DateDumper {
    src: ValueType,
}

impl NewDumper for DateDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for DateDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::DATE
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Date(d) => Ok(Dumped::new(d.format(DATE_FORMAT).to_string())),
            other => Err(unexpected(ValueType::Date, other)),
        }
    }
}

pub struct DateBinaryDumper {
    src: ValueType,
}

impl NewDumper for DateBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for DateBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::DATE
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let date = match value {
            Value::Date(d) => *d,
            other => return Err(unexpected(ValueType::Date, other)),
        };
        let days = date.signed_duration_since(pg_epoch().date()).num_days();
        let days = i32::try_from(days).map_err(|_| out_of_range("date"))?;
        let mut buf = BytesMut::with_capacity(4);
        pg::date_to_sql(days, &mut buf);
        Ok(Dumped::new(buf.freeze()))
    }
}

pub struct DateLoader {
    oid: Oid,
}

impl NewLoader for DateLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for DateLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let s = utf8(data)?;
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|e| AdaptError::Data(format!("Invalid date '{}': {}", s, e)))
    }
}

pub struct DateBinaryLoader {
    oid: Oid,
}

impl NewLoader for DateBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for DateBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let days = pg::date_from_sql(data).map_err(AdaptError::data)?;
        // i32::MAX / i32::MIN stand for 'infinity' / '-infinity'
        if days == i32::MAX || days == i32::MIN {
            return Err(AdaptError::Data("infinite dates are not supported".to_string()));
        }
        pg_epoch()
            .date()
            .checked_add_signed(Duration::days(days as i64))
            .map(Value::Date)
            .ok_or_else(|| out_of_range("date"))
    }
}

pub struct TimestampDumper {
    src: ValueType,
}

impl NewDumper for TimestampDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for TimestampDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::TIMESTAMP
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        match value {
            Value::Timestamp(ts) => Ok(Dumped::new(ts.format(TIMESTAMP_FORMAT).to_string())),
            other => Err(unexpected(ValueType::Timestamp, other)),
        }
    }
}

/// Microsecond precision; sub-microsecond digits are dropped.
pub struct TimestampBinaryDumper {
    src: ValueType,
}

impl NewDumper for TimestampBinaryDumper {
    fn new(src: ValueType, _context: &dyn AdaptContext) -> Self {
        Self { src }
    }
}

impl Dumper for TimestampBinaryDumper {
    fn src(&self) -> ValueType {
        self.src
    }

    fn oid(&self) -> Oid {
        oid::TIMESTAMP
    }

    fn dump(&self, value: &Value) -> AdaptResult<Dumped> {
        let ts = match value {
            Value::Timestamp(ts) => *ts,
            other => return Err(unexpected(ValueType::Timestamp, other)),
        };
        let micros = ts
            .signed_duration_since(pg_epoch())
            .num_microseconds()
            .ok_or_else(|| out_of_range("timestamp"))?;
        let mut buf = BytesMut::with_capacity(8);
        pg::timestamp_to_sql(micros, &mut buf);
        Ok(Dumped::new(buf.freeze()))
    }
}

pub struct TimestampLoader {
    oid: Oid,
}

impl NewLoader for TimestampLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for TimestampLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let s = utf8(data)?;
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .map(Value::Timestamp)
            .map_err(|e| AdaptError::Data(format!("Invalid timestamp '{}': {}", s, e)))
    }
}

pub struct TimestampBinaryLoader {
    oid: Oid,
}

impl NewLoader for TimestampBinaryLoader {
    fn new(oid: Oid, _context: &dyn AdaptContext) -> Self {
        Self { oid }
    }
}

impl Loader for TimestampBinaryLoader {
    fn oid(&self) -> Oid {
        self.oid
    }

    fn load(&self, data: &[u8]) -> AdaptResult<Value> {
        let micros = pg::timestamp_from_sql(data).map_err(AdaptError::data)?;
        if micros == i64::MAX || micros == i64::MIN {
            return Err(AdaptError::Data("infinite timestamps are not supported".to_string()));
        }
        pg_epoch()
            .checked_add_signed(Duration::microseconds(micros))
            .map(Value::Timestamp)
            .ok_or_else(|| out_of_range("timestamp"))
    }
}
