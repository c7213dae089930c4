//! Backend message decoder.

use std::fmt;

use super::messages::{
    BackendMessage, ErrorFields, FieldDescription, TransactionStatus, auth_type, backend_type,
};

/// Failure to decode a backend frame.
#[derive(Debug)]
pub enum DecodeError {
    InvalidLength { length: i32 },
    MessageTooLarge { length: usize, max: usize },
    UnknownMessageType(u8),
    Utf8(std::string::FromUtf8Error),
    UnexpectedEof,
    InvalidField(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidLength { length } => write!(f, "invalid message length: {length}"),
            DecodeError::MessageTooLarge { length, max } => {
                write!(f, "message too large: {length} > {max}")
            }
            DecodeError::UnknownMessageType(ty) => write!(f, "unknown message type: 0x{ty:02x}"),
            DecodeError::Utf8(err) => write!(f, "utf-8 error: {err}"),
            DecodeError::UnexpectedEof => write!(f, "unexpected end of message"),
            DecodeError::InvalidField(msg) => write!(f, "invalid field: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DecodeError::Utf8(err)
    }
}

/// Buffers socket bytes and splits them into backend messages.
#[derive(Debug, Clone)]
pub struct MessageReader {
    buf: Vec<u8>,
    max_message_size: usize,
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageReader {
    pub fn new() -> Self {
        Self::with_max_size(64 * 1024 * 1024)
    }

    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_message_size,
        }
    }

    /// Append bytes read from the socket.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received data.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Decode the next complete message, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<BackendMessage>, DecodeError> {
        if self.buf.len() < 5 {
            return Ok(None);
        }

        let length = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        let Some(total_len) = usize::try_from(length)
            .ok()
            .filter(|l| *l >= 4)
            .map(|l| l + 1)
        else {
            return Err(DecodeError::InvalidLength { length });
        };
        if total_len > self.max_message_size {
            return Err(DecodeError::MessageTooLarge {
                length: total_len,
                max: self.max_message_size,
            });
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }

        let ty = self.buf[0];
        let msg = parse_body(ty, &self.buf[5..total_len]);
        self.buf.drain(..total_len);
        msg.map(Some)
    }
}

fn parse_body(ty: u8, payload: &[u8]) -> Result<BackendMessage, DecodeError> {
    let mut cur = Cursor::new(payload);
    match ty {
        backend_type::AUTHENTICATION => parse_authentication(&mut cur),
        backend_type::BACKEND_KEY_DATA => Ok(BackendMessage::BackendKeyData {
            process_id: cur.read_i32()?,
            secret_key: cur.read_i32()?,
        }),
        backend_type::PARAMETER_STATUS => Ok(BackendMessage::ParameterStatus {
            name: cur.read_cstring()?,
            value: cur.read_cstring()?,
        }),
        backend_type::READY_FOR_QUERY => {
            let status = TransactionStatus::from_byte(cur.read_u8()?)
                .ok_or(DecodeError::InvalidField("transaction status"))?;
            Ok(BackendMessage::ReadyForQuery(status))
        }
        backend_type::ROW_DESCRIPTION => parse_row_description(&mut cur),
        backend_type::DATA_ROW => parse_data_row(&mut cur),
        backend_type::COMMAND_COMPLETE => Ok(BackendMessage::CommandComplete(cur.read_cstring()?)),
        backend_type::EMPTY_QUERY => Ok(BackendMessage::EmptyQueryResponse),
        backend_type::PARSE_COMPLETE => Ok(BackendMessage::ParseComplete),
        backend_type::BIND_COMPLETE => Ok(BackendMessage::BindComplete),
        backend_type::CLOSE_COMPLETE => Ok(BackendMessage::CloseComplete),
        backend_type::PARAMETER_DESCRIPTION => {
            let count = cur.read_count()?;
            let mut oids = Vec::with_capacity(count);
            for _ in 0..count {
                oids.push(cur.read_u32()?);
            }
            Ok(BackendMessage::ParameterDescription(oids))
        }
        backend_type::NO_DATA => Ok(BackendMessage::NoData),
        backend_type::PORTAL_SUSPENDED => Ok(BackendMessage::PortalSuspended),
        backend_type::ERROR_RESPONSE => Ok(BackendMessage::ErrorResponse(parse_fields(&mut cur)?)),
        backend_type::NOTICE_RESPONSE => {
            Ok(BackendMessage::NoticeResponse(parse_fields(&mut cur)?))
        }
        backend_type::NEGOTIATE_PROTOCOL_VERSION => {
            let newest_minor = cur.read_i32()?;
            let count = usize::try_from(cur.read_i32()?)
                .map_err(|_| DecodeError::InvalidField("protocol option count"))?;
            let mut unrecognized = Vec::with_capacity(count);
            for _ in 0..count {
                unrecognized.push(cur.read_cstring()?);
            }
            Ok(BackendMessage::NegotiateProtocolVersion {
                newest_minor,
                unrecognized,
            })
        }
        other => Err(DecodeError::UnknownMessageType(other)),
    }
}

fn parse_authentication(cur: &mut Cursor<'_>) -> Result<BackendMessage, DecodeError> {
    match cur.read_i32()? {
        auth_type::OK => Ok(BackendMessage::AuthenticationOk),
        auth_type::CLEARTEXT_PASSWORD => Ok(BackendMessage::AuthenticationCleartextPassword),
        auth_type::MD5_PASSWORD => {
            let mut salt = [0_u8; 4];
            salt.copy_from_slice(cur.read_bytes(4)?);
            Ok(BackendMessage::AuthenticationMD5Password(salt))
        }
        auth_type::SASL => {
            let mut mechanisms = Vec::new();
            loop {
                let mech = cur.read_cstring()?;
                if mech.is_empty() {
                    break;
                }
                mechanisms.push(mech);
            }
            Ok(BackendMessage::AuthenticationSASL(mechanisms))
        }
        auth_type::SASL_CONTINUE => Ok(BackendMessage::AuthenticationSASLContinue(
            cur.take_remaining(),
        )),
        auth_type::SASL_FINAL => Ok(BackendMessage::AuthenticationSASLFinal(
            cur.take_remaining(),
        )),
        _ => Err(DecodeError::InvalidField("unsupported authentication method")),
    }
}

fn parse_row_description(cur: &mut Cursor<'_>) -> Result<BackendMessage, DecodeError> {
    let count = cur.read_count()?;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(FieldDescription {
            name: cur.read_cstring()?,
            table_oid: cur.read_u32()?,
            column_id: cur.read_i16()?,
            type_oid: cur.read_u32()?,
            type_size: cur.read_i16()?,
            type_modifier: cur.read_i32()?,
            format: cur.read_i16()?,
        });
    }
    Ok(BackendMessage::RowDescription(fields))
}

fn parse_data_row(cur: &mut Cursor<'_>) -> Result<BackendMessage, DecodeError> {
    let count = cur.read_count()?;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let len = cur.read_i32()?;
        if len == -1 {
            values.push(None);
            continue;
        }
        let len = usize::try_from(len).map_err(|_| DecodeError::InvalidField("data length"))?;
        values.push(Some(cur.read_bytes(len)?.to_vec()));
    }
    Ok(BackendMessage::DataRow(values))
}

fn parse_fields(cur: &mut Cursor<'_>) -> Result<ErrorFields, DecodeError> {
    let mut fields = ErrorFields::default();
    loop {
        let code = cur.read_u8()?;
        if code == 0 {
            break;
        }
        let value = cur.read_cstring()?;
        match code {
            b'S' => fields.severity = value,
            // The non-localized severity wins when present.
            b'V' => fields.severity = value,
            b'C' => fields.code = value,
            b'M' => fields.message = value,
            b'D' => fields.detail = Some(value),
            b'H' => fields.hint = Some(value),
            b'P' => fields.position = value.parse().ok(),
            b'W' => fields.where_ = Some(value),
            b't' => fields.table = Some(value),
            b'c' => fields.column = Some(value),
            b'n' => fields.constraint = Some(value),
            _ => {}
        }
    }
    Ok(fields)
}

#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// An i16 element count.
    fn read_count(&mut self) -> Result<usize, DecodeError> {
        usize::try_from(self.read_i16()?).map_err(|_| DecodeError::InvalidField("negative count"))
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::UnexpectedEof)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_cstring(&mut self) -> Result<String, DecodeError> {
        let rest = self.buf.get(self.pos..).ok_or(DecodeError::UnexpectedEof)?;
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(DecodeError::UnexpectedEof)?;
        let s = String::from_utf8(rest[..nul].to_vec())?;
        self.pos += nul + 1;
        Ok(s)
    }

    fn take_remaining(&mut self) -> Vec<u8> {
        let rest = self.buf.get(self.pos..).unwrap_or_default().to_vec();
        self.pos = self.buf.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ty: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![ty];
        let len = i32::try_from(payload.len() + 4).unwrap();
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn decode_one(bytes: &[u8]) -> BackendMessage {
        let mut reader = MessageReader::new();
        reader.push(bytes);
        reader.next_message().unwrap().expect("complete message")
    }

    #[test]
    fn test_parse_md5_request() {
        let mut payload = auth_type::MD5_PASSWORD.to_be_bytes().to_vec();
        payload.extend_from_slice(&[1, 2, 3, 4]);
        let msg = decode_one(&frame(backend_type::AUTHENTICATION, &payload));
        assert_eq!(msg, BackendMessage::AuthenticationMD5Password([1, 2, 3, 4]));
    }

    #[test]
    fn test_parse_sasl_mechanisms() {
        let mut payload = auth_type::SASL.to_be_bytes().to_vec();
        payload.extend_from_slice(b"SCRAM-SHA-256\0\0");
        let msg = decode_one(&frame(backend_type::AUTHENTICATION, &payload));
        assert_eq!(
            msg,
            BackendMessage::AuthenticationSASL(vec!["SCRAM-SHA-256".to_string()])
        );
    }

    #[test]
    fn test_parse_error_response_fields() {
        let payload = b"SERROR\0VERROR\0C23505\0Mduplicate key\0nusers_email_key\0\0";
        match decode_one(&frame(backend_type::ERROR_RESPONSE, payload)) {
            BackendMessage::ErrorResponse(fields) => {
                assert_eq!(fields.severity, "ERROR");
                assert_eq!(fields.code, "23505");
                assert_eq!(fields.message, "duplicate key");
                assert_eq!(fields.constraint.as_deref(), Some("users_email_key"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_data_row_with_null() {
        let mut payload = 2_i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&3_i32.to_be_bytes());
        payload.extend_from_slice(b"foo");
        payload.extend_from_slice(&(-1_i32).to_be_bytes());
        match decode_one(&frame(backend_type::DATA_ROW, &payload)) {
            BackendMessage::DataRow(values) => {
                assert_eq!(values, vec![Some(b"foo".to_vec()), None]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_partial_frames_are_buffered() {
        let mut bytes = frame(backend_type::PARSE_COMPLETE, &[]);
        bytes.extend(frame(
            backend_type::READY_FOR_QUERY,
            &[TransactionStatus::Transaction.as_byte()],
        ));
        let (left, right) = bytes.split_at(7);

        let mut reader = MessageReader::new();
        reader.push(left);
        assert_eq!(reader.next_message().unwrap(), Some(BackendMessage::ParseComplete));
        assert_eq!(reader.next_message().unwrap(), None);

        reader.push(right);
        assert_eq!(
            reader.next_message().unwrap(),
            Some(BackendMessage::ReadyForQuery(TransactionStatus::Transaction))
        );
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn test_rejects_bad_length_and_unknown_type() {
        let mut reader = MessageReader::new();
        reader.push(&[b'Z', 0, 0, 0, 2]);
        assert!(matches!(
            reader.next_message(),
            Err(DecodeError::InvalidLength { length: 2 })
        ));

        let mut reader = MessageReader::new();
        reader.push(&frame(b'A', b"x\0y\0"));
        assert!(matches!(
            reader.next_message(),
            Err(DecodeError::UnknownMessageType(b'A'))
        ));
    }

    #[test]
    fn test_message_size_limit() {
        let mut reader = MessageReader::with_max_size(16);
        reader.push(&frame(backend_type::COMMAND_COMPLETE, b"SELECT 100000000000000\0"));
        assert!(matches!(
            reader.next_message(),
            Err(DecodeError::MessageTooLarge { .. })
        ));
    }
}
