//! Result handles the transformer decodes rows from.

use crate::error::{AdaptError, AdaptResult};
use crate::protocol::{BackendMessage, FieldDescription, Format, Oid};

/// Read access to a query result, as provided by the protocol client.
pub trait PgResult {
    /// Number of columns.
    fn nfields(&self) -> usize;

    /// Number of rows.
    fn ntuples(&self) -> usize;

    /// Type OID of column `col`.
    fn ftype(&self, col: usize) -> Oid;

    /// Format column `col` is transferred in.
    fn fformat(&self, col: usize) -> Format;

    /// Raw cell, `None` for SQL NULL or out-of-range indexes.
    fn get_value(&self, row: usize, col: usize) -> Option<&[u8]>;
}

/// In-memory result built from backend messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    fields: Vec<FieldDescription>,
    formats: Vec<Format>,
    rows: Vec<Vec<Option<Vec<u8>>>>,
    command_tag: Option<String>,
}

impl ResultSet {
    /// Empty result with the given columns.
    pub fn new(fields: Vec<FieldDescription>) -> AdaptResult<Self> {
        let formats = fields
            .iter()
            .map(|field| {
                Format::from_code(field.format).ok_or_else(|| {
                    AdaptError::Data(format!(
                        "invalid format code {} for column '{}'",
                        field.format, field.name
                    ))
                })
            })
            .collect::<AdaptResult<Vec<_>>>()?;

        Ok(Self {
            fields,
            formats,
            rows: Vec::new(),
            command_tag: None,
        })
    }

    /// Append a row; its width must match the columns.
    pub fn push_row(&mut self, row: Vec<Option<Vec<u8>>>) -> AdaptResult<()> {
        if row.len() != self.fields.len() {
            return Err(AdaptError::Data(format!(
                "row has {} columns, expected {}",
                row.len(),
                self.fields.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Build from a RowDescription, DataRows and an optional CommandComplete.
    pub fn from_messages(messages: impl IntoIterator<Item = BackendMessage>) -> AdaptResult<Self> {
        let mut messages = messages.into_iter();
        let mut result = match messages.next() {
            Some(BackendMessage::RowDescription(fields)) => Self::new(fields)?,
            Some(other) => {
                return Err(AdaptError::Data(format!(
                    "expected RowDescription, got {:?}",
                    other
                )));
            }
            None => return Err(AdaptError::Data("no RowDescription".to_string())),
        };

        for message in messages {
            if result.command_tag.is_some() {
                return Err(AdaptError::Data(
                    "message after CommandComplete".to_string(),
                ));
            }
            match message {
                BackendMessage::DataRow(row) => result.push_row(row)?,
                BackendMessage::CommandComplete(tag) => result.command_tag = Some(tag),
                BackendMessage::RowDescription(_) => {
                    return Err(AdaptError::Data("duplicate RowDescription".to_string()));
                }
            }
        }

        tracing::trace!("Built result set: {} rows x {} columns", result.rows.len(), result.fields.len());
        Ok(result)
    }

    /// Decode a buffer of consecutive backend messages.
    pub fn decode(mut buf: &[u8]) -> AdaptResult<Self> {
        let mut messages = Vec::new();
        while !buf.is_empty() {
            let (message, used) = BackendMessage::decode(buf)?;
            messages.push(message);
            buf = &buf[used..];
        }
        Self::from_messages(messages)
    }

    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Tag of the CommandComplete message, e.g. `SELECT 3`.
    pub fn command_tag(&self) -> Option<&str> {
        self.command_tag.as_deref()
    }
}

impl PgResult for ResultSet {
    fn nfields(&self) -> usize {
        self.fields.len()
    }

    fn ntuples(&self) -> usize {
        self.rows.len()
    }

    fn ftype(&self, col: usize) -> Oid {
        self.fields.get(col).map(|f| f.type_oid).unwrap_or(0)
    }

    fn fformat(&self, col: usize) -> Format {
        self.formats.get(col).copied().unwrap_or_default()
    }

    fn get_value(&self, row: usize, col: usize) -> Option<&[u8]> {
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::oid;

    fn sample() -> Vec<BackendMessage> {
        vec![
            BackendMessage::RowDescription(vec![
                FieldDescription::new("id", oid::INT4, Format::Text),
                FieldDescription::new("name", oid::TEXT, Format::Binary),
            ]),
            BackendMessage::DataRow(vec![Some(b"1".to_vec()), Some(b"alice".to_vec())]),
            BackendMessage::DataRow(vec![Some(b"2".to_vec()), None]),
            BackendMessage::CommandComplete("SELECT 2".to_string()),
        ]
    }

    #[test]
    fn test_from_messages() {
        let result = ResultSet::from_messages(sample()).unwrap();
        assert_eq!(result.nfields(), 2);
        assert_eq!(result.ntuples(), 2);
        assert_eq!(result.ftype(0), oid::INT4);
        assert_eq!(result.fformat(1), Format::Binary);
        assert_eq!(result.get_value(0, 1), Some(&b"alice"[..]));
        assert_eq!(result.get_value(1, 1), None);
        assert_eq!(result.get_value(5, 0), None);
        assert_eq!(result.command_tag(), Some("SELECT 2"));
    }

    #[test]
    fn test_decode_wire_bytes() {
        let bytes: Vec<u8> = sample().iter().flat_map(|m| m.encode()).collect();
        let result = ResultSet::decode(&bytes).unwrap();
        assert_eq!(result, ResultSet::from_messages(sample()).unwrap());
    }

    #[test]
    fn test_row_width_checked() {
        let mut result = ResultSet::new(vec![FieldDescription::new("a", oid::INT4, Format::Text)]).unwrap();
        assert!(result.push_row(vec![None, None]).is_err());
        assert!(result.push_row(vec![None]).is_ok());
    }

    #[test]
    fn test_invalid_format_code() {
        let mut field = FieldDescription::new("a", oid::INT4, Format::Text);
        field.format = 7;
        assert!(ResultSet::new(vec![field]).is_err());
    }

    #[test]
    fn test_data_row_first_rejected() {
        let messages = vec![BackendMessage::DataRow(vec![None])];
        assert!(ResultSet::from_messages(messages).is_err());
    }
}
