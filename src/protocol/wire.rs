//! PostgreSQL Backend Messages for result sets
//!
//! Only the messages that describe and carry query results are handled:
//! RowDescription ('T'), DataRow ('D') and CommandComplete ('C').
//! Reference: https://www.postgresql.org/docs/current/protocol-message-formats.html

use super::{Format, Oid};
use crate::error::{AdaptError, AdaptResult};

/// Backend (server → client) message types
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    RowDescription(Vec<FieldDescription>),
    DataRow(Vec<Option<Vec<u8>>>),
    CommandComplete(String),
}

/// Field description in RowDescription
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_attr: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: i16,
}

impl FieldDescription {
    /// Describe a computed column (no source table).
    pub fn new(name: impl Into<String>, type_oid: Oid, format: Format) -> Self {
        Self {
            name: name.into(),
            table_oid: 0,
            column_attr: 0,
            type_oid,
            type_size: -1,
            type_modifier: -1,
            format: format.code(),
        }
    }
}

fn truncated(what: &str) -> AdaptError {
    AdaptError::Data(format!("{} truncated", what))
}

fn read_i16(payload: &[u8], pos: usize, what: &str) -> AdaptResult<i16> {
    payload
        .get(pos..pos + 2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(what))
}

fn read_i32(payload: &[u8], pos: usize, what: &str) -> AdaptResult<i32> {
    payload
        .get(pos..pos + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated(what))
}

impl BackendMessage {
    /// Decode one message from the front of `buf`.
    ///
    /// Returns the message and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> AdaptResult<(Self, usize)> {
        if buf.len() < 5 {
            return Err(truncated("message header"));
        }

        let msg_type = buf[0];
        let len = read_i32(buf, 1, "message header")?;
        if len < 4 {
            return Err(AdaptError::Data(format!("invalid message length {}", len)));
        }
        let len = len as usize;
        if buf.len() < len + 1 {
            return Err(truncated("message body"));
        }

        let payload = &buf[5..len + 1];
        let message = match msg_type {
            b'T' => Self::decode_row_description(payload)?,
            b'D' => Self::decode_data_row(payload)?,
            b'C' => Self::decode_command_complete(payload),
            other => {
                return Err(AdaptError::Data(format!(
                    "unexpected backend message type '{}'",
                    other as char
                )));
            }
        };

        Ok((message, len + 1))
    }

    /// Encode the message as the server would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        let msg_type = match self {
            BackendMessage::RowDescription(fields) => {
                payload.extend_from_slice(&(fields.len() as i16).to_be_bytes());
                for field in fields {
                    payload.extend_from_slice(field.name.as_bytes());
                    payload.push(0);
                    payload.extend_from_slice(&field.table_oid.to_be_bytes());
                    payload.extend_from_slice(&field.column_attr.to_be_bytes());
                    payload.extend_from_slice(&field.type_oid.to_be_bytes());
                    payload.extend_from_slice(&field.type_size.to_be_bytes());
                    payload.extend_from_slice(&field.type_modifier.to_be_bytes());
                    payload.extend_from_slice(&field.format.to_be_bytes());
                }
                b'T'
            }
            BackendMessage::DataRow(columns) => {
                payload.extend_from_slice(&(columns.len() as i16).to_be_bytes());
                for column in columns {
                    match column {
                        Some(data) => {
                            payload.extend_from_slice(&(data.len() as i32).to_be_bytes());
                            payload.extend_from_slice(data);
                        }
                        None => payload.extend_from_slice(&(-1i32).to_be_bytes()),
                    }
                }
                b'D'
            }
            BackendMessage::CommandComplete(tag) => {
                payload.extend_from_slice(tag.as_bytes());
                payload.push(0);
                b'C'
            }
        };

        let mut buf = Vec::with_capacity(payload.len() + 5);
        buf.push(msg_type);
        buf.extend_from_slice(&((payload.len() + 4) as i32).to_be_bytes());
        buf.extend_from_slice(&payload);
        buf
    }

    fn decode_row_description(payload: &[u8]) -> AdaptResult<Self> {
        let field_count = read_i16(payload, 0, "RowDescription")?.max(0) as usize;
        let mut fields = Vec::with_capacity(field_count);
        let mut pos = 2;

        for _ in 0..field_count {
            // Field name (null-terminated string)
            let name_end = payload
                .get(pos..)
                .and_then(|rest| rest.iter().position(|&b| b == 0))
                .ok_or_else(|| AdaptError::Data("missing null terminator in field name".into()))?;
            let name = String::from_utf8_lossy(&payload[pos..pos + name_end]).to_string();
            pos += name_end + 1;

            if pos + 18 > payload.len() {
                return Err(truncated("RowDescription field"));
            }

            let table_oid = read_i32(payload, pos, "RowDescription field")? as u32;
            let column_attr = read_i16(payload, pos + 4, "RowDescription field")?;
            let type_oid = read_i32(payload, pos + 6, "RowDescription field")? as u32;
            let type_size = read_i16(payload, pos + 10, "RowDescription field")?;
            let type_modifier = read_i32(payload, pos + 12, "RowDescription field")?;
            let format = read_i16(payload, pos + 16, "RowDescription field")?;
            pos += 18;

            fields.push(FieldDescription {
                name,
                table_oid,
                column_attr,
                type_oid,
                type_size,
                type_modifier,
                format,
            });
        }

        Ok(BackendMessage::RowDescription(fields))
    }

    fn decode_data_row(payload: &[u8]) -> AdaptResult<Self> {
        let column_count = read_i16(payload, 0, "DataRow")?.max(0) as usize;
        let mut columns = Vec::with_capacity(column_count);
        let mut pos = 2;

        for _ in 0..column_count {
            let len = read_i32(payload, pos, "DataRow")?;
            pos += 4;

            if len == -1 {
                columns.push(None);
            } else {
                let len = len as usize;
                let data = payload
                    .get(pos..pos + len)
                    .ok_or_else(|| truncated("DataRow column data"))?;
                pos += len;
                columns.push(Some(data.to_vec()));
            }
        }

        Ok(BackendMessage::DataRow(columns))
    }

    fn decode_command_complete(payload: &[u8]) -> Self {
        let tag = String::from_utf8_lossy(payload)
            .trim_end_matches('\0')
            .to_string();
        BackendMessage::CommandComplete(tag)
    }
}
