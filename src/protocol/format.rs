//! Wire format codes.

use serde::Deserialize;
use std::fmt;

/// Encoding of a parameter or result column.
///
/// Text has format code zero, binary has format code one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Binary,
}

impl Format {
    /// Both formats, in code order.
    pub const ALL: [Format; 2] = [Format::Text, Format::Binary];

    /// Convert a protocol format code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Format::Text),
            1 => Some(Format::Binary),
            _ => None,
        }
    }

    /// Protocol format code (0 or 1).
    pub fn code(self) -> i16 {
        match self {
            Format::Text => 0,
            Format::Binary => 1,
        }
    }

    /// Slot used by per-format tables.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.code() as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Text => "TEXT",
            Format::Binary => "BINARY",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "t" | "0" => Ok(Format::Text),
            "binary" | "b" | "1" => Ok(Format::Binary),
            other => Err(format!("unknown format '{}': expected text or binary", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(Format::from_code(0), Some(Format::Text));
        assert_eq!(Format::from_code(1), Some(Format::Binary));
        assert_eq!(Format::from_code(2), None);
        assert_eq!(Format::Binary.code(), 1);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("TEXT".parse::<Format>().unwrap(), Format::Text);
        assert_eq!("binary".parse::<Format>().unwrap(), Format::Binary);
        assert!("csv".parse::<Format>().is_err());
    }
}
