//! Frontend message encoder.
//!
//! Messages are appended to one buffer so a whole pipelined exchange
//! (Parse/Bind/Describe/Execute per statement, then a single Sync) goes out in
//! one write.

use std::fmt;

use super::messages::{FrontendMessage, PROTOCOL_VERSION, SSL_REQUEST_CODE, frontend_type};

/// A message that cannot be represented on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// More entries than an unsigned 16-bit count can hold.
    TooManyEntries { what: &'static str, count: usize },
    /// A field or message longer than a signed 32-bit length can hold.
    TooLong { length: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::TooManyEntries { what, count } => {
                write!(f, "too many {what}: {count} > {}", u16::MAX)
            }
            EncodeError::TooLong { length } => {
                write!(f, "message too long: {length} > {}", i32::MAX)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a single message, replacing anything buffered.
    pub fn write(&mut self, msg: &FrontendMessage) -> Result<&[u8], EncodeError> {
        self.buf.clear();
        self.push(msg)?;
        Ok(&self.buf)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append a message to the buffer.
    ///
    /// On error the buffer is left as it was before the call.
    pub fn push(&mut self, msg: &FrontendMessage) -> Result<(), EncodeError> {
        let mark = self.buf.len();
        let result = self.encode(msg);
        if result.is_err() {
            self.buf.truncate(mark);
        }
        result
    }

    fn encode(&mut self, msg: &FrontendMessage) -> Result<(), EncodeError> {
        match msg {
            FrontendMessage::Startup { version, params } => {
                let start = self.begin_untyped();
                self.put_i32(*version);
                for (name, value) in params {
                    self.put_cstr(name);
                    self.put_cstr(value);
                }
                self.buf.push(0);
                self.finish(start)?;
            }
            FrontendMessage::SSLRequest => {
                let start = self.begin_untyped();
                self.put_i32(SSL_REQUEST_CODE);
                self.finish(start)?;
            }
            FrontendMessage::PasswordMessage(password) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(password);
                self.finish(start)?;
            }
            FrontendMessage::SASLInitialResponse { mechanism, data } => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(mechanism);
                self.put_len(data.len())?;
                self.buf.extend_from_slice(data);
                self.finish(start)?;
            }
            FrontendMessage::SASLResponse(data) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.buf.extend_from_slice(data);
                self.finish(start)?;
            }
            FrontendMessage::Parse {
                name,
                query,
                param_types,
            } => {
                let start = self.begin(frontend_type::PARSE);
                self.put_cstr(name);
                self.put_cstr(query);
                self.put_count("parameter types", param_types.len())?;
                for oid in param_types {
                    self.buf.extend_from_slice(&oid.to_be_bytes());
                }
                self.finish(start)?;
            }
            FrontendMessage::Bind {
                portal,
                statement,
                param_formats,
                params,
                result_formats,
            } => {
                let start = self.begin(frontend_type::BIND);
                self.put_cstr(portal);
                self.put_cstr(statement);
                self.put_count("parameter formats", param_formats.len())?;
                for f in param_formats {
                    self.buf.extend_from_slice(&f.to_be_bytes());
                }
                self.put_count("parameters", params.len())?;
                for param in params {
                    match param {
                        Some(bytes) => {
                            self.put_len(bytes.len())?;
                            self.buf.extend_from_slice(bytes);
                        }
                        None => self.put_i32(-1),
                    }
                }
                self.put_count("result formats", result_formats.len())?;
                for f in result_formats {
                    self.buf.extend_from_slice(&f.to_be_bytes());
                }
                self.finish(start)?;
            }
            FrontendMessage::Describe { kind, name } => {
                let start = self.begin(frontend_type::DESCRIBE);
                self.buf.push(kind.as_byte());
                self.put_cstr(name);
                self.finish(start)?;
            }
            FrontendMessage::Execute { portal, max_rows } => {
                let start = self.begin(frontend_type::EXECUTE);
                self.put_cstr(portal);
                self.put_i32(*max_rows);
                self.finish(start)?;
            }
            FrontendMessage::Sync => {
                let start = self.begin(frontend_type::SYNC);
                self.finish(start)?;
            }
            FrontendMessage::Terminate => {
                let start = self.begin(frontend_type::TERMINATE);
                self.finish(start)?;
            }
        }
        Ok(())
    }

    /// Write the type byte and a length placeholder; returns the length offset.
    fn begin(&mut self, ty: u8) -> usize {
        self.buf.push(ty);
        self.begin_untyped()
    }

    fn begin_untyped(&mut self) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        start
    }

    /// Patch the length field; it counts itself but not the type byte.
    fn finish(&mut self, start: usize) -> Result<(), EncodeError> {
        let length = self.buf.len() - start;
        let len = i32::try_from(length).map_err(|_| EncodeError::TooLong { length })?;
        self.buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_len(&mut self, length: usize) -> Result<(), EncodeError> {
        let len = i32::try_from(length).map_err(|_| EncodeError::TooLong { length })?;
        self.put_i32(len);
        Ok(())
    }

    /// Counts go out as Int16 and the server reads them unsigned.
    fn put_count(&mut self, what: &'static str, count: usize) -> Result<(), EncodeError> {
        let count = u16::try_from(count).map_err(|_| EncodeError::TooManyEntries { what, count })?;
        self.buf.extend_from_slice(&count.to_be_bytes());
        Ok(())
    }

    fn put_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}

/// Startup message for the given parameters at protocol 3.0.
pub fn startup(params: Vec<(String, String)>) -> FrontendMessage {
    FrontendMessage::Startup {
        version: PROTOCOL_VERSION,
        params,
    }
}
