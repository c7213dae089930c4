//! Frontend and backend message types.

use std::fmt;

/// Protocol version 3.0.
pub const PROTOCOL_VERSION: i32 = 196_608; // 3 << 16

/// SSL request code.
pub const SSL_REQUEST_CODE: i32 = 80_877_103; // 1234 << 16 | 5679

// ==================== Frontend Messages (Client -> Server) ====================

/// Messages the driver sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    /// First message after connecting; carries no type byte.
    Startup {
        version: i32,
        params: Vec<(String, String)>,
    },
    /// Cleartext or MD5-hashed password.
    PasswordMessage(String),
    /// First SASL message: chosen mechanism plus client-first data.
    SASLInitialResponse { mechanism: String, data: Vec<u8> },
    /// Subsequent SASL data.
    SASLResponse(Vec<u8>),
    /// Parse into a (usually unnamed) prepared statement.
    Parse {
        name: String,
        query: String,
        /// Parameter type OIDs, 0 lets the server infer.
        param_types: Vec<u32>,
    },
    /// Bind parameter values to a prepared statement, producing a portal.
    Bind {
        portal: String,
        statement: String,
        param_formats: Vec<i16>,
        /// `None` encodes NULL.
        params: Vec<Option<Vec<u8>>>,
        result_formats: Vec<i16>,
    },
    Describe { kind: DescribeKind, name: String },
    /// Run a portal; `max_rows` 0 means all rows.
    Execute { portal: String, max_rows: i32 },
    /// End of an extended-protocol exchange; the server answers ReadyForQuery.
    Sync,
    Terminate,
    SSLRequest,
}

/// Target of a Describe message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeKind {
    Statement,
    Portal,
}

impl DescribeKind {
    pub const fn as_byte(self) -> u8 {
        match self {
            DescribeKind::Statement => b'S',
            DescribeKind::Portal => b'P',
        }
    }
}

// ==================== Backend Messages (Server -> Client) ====================

/// Messages the server sends to the driver.
///
/// COPY, LISTEN/NOTIFY and function-call traffic are never requested by the
/// driver and are rejected by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMD5Password([u8; 4]),
    /// Offered SASL mechanisms.
    AuthenticationSASL(Vec<String>),
    AuthenticationSASLContinue(Vec<u8>),
    AuthenticationSASLFinal(Vec<u8>),
    BackendKeyData {
        process_id: i32,
        secret_key: i32,
    },
    ParameterStatus {
        name: String,
        value: String,
    },
    ReadyForQuery(TransactionStatus),
    RowDescription(Vec<FieldDescription>),
    DataRow(Vec<Option<Vec<u8>>>),
    /// Command tag, e.g. `INSERT 0 3` or `UPDATE 2`.
    CommandComplete(String),
    EmptyQueryResponse,
    ParseComplete,
    BindComplete,
    CloseComplete,
    ParameterDescription(Vec<u32>),
    NoData,
    PortalSuspended,
    ErrorResponse(ErrorFields),
    NoticeResponse(ErrorFields),
    NegotiateProtocolVersion {
        newest_minor: i32,
        unrecognized: Vec<String>,
    },
}

/// Transaction status reported with ReadyForQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Idle,
    Transaction,
    /// Inside a transaction that already failed; only ROLLBACK is accepted.
    Error,
}

impl TransactionStatus {
    pub const fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::Transaction => b'T',
            TransactionStatus::Error => b'E',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'I' => Some(TransactionStatus::Idle),
            b'T' => Some(TransactionStatus::Transaction),
            b'E' => Some(TransactionStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Idle => write!(f, "idle"),
            TransactionStatus::Transaction => write!(f, "in transaction"),
            TransactionStatus::Error => write!(f, "in failed transaction"),
        }
    }
}

/// One column of a RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_id: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    /// 0 = text, 1 = binary
    pub format: i16,
}

/// Fields of an ErrorResponse or NoticeResponse.
///
/// Only the fields the driver surfaces are kept; the rest are skipped while
/// decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorFields {
    pub severity: String,
    /// SQLSTATE code, e.g. `23505`.
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based character offset into the statement text.
    pub position: Option<i32>,
    pub where_: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub constraint: Option<String>,
}

impl ErrorFields {
    pub fn is_fatal(&self) -> bool {
        self.severity == "FATAL" || self.severity == "PANIC"
    }

    /// SQLSTATE class (first two characters).
    pub fn error_class(&self) -> &str {
        self.code.get(..2).unwrap_or(&self.code)
    }
}

impl fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (SQLSTATE {})", self.severity, self.message, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

// ==================== Type Bytes ====================

pub mod frontend_type {
    pub const PASSWORD: u8 = b'p';
    pub const PARSE: u8 = b'P';
    pub const BIND: u8 = b'B';
    pub const DESCRIBE: u8 = b'D';
    pub const EXECUTE: u8 = b'E';
    pub const SYNC: u8 = b'S';
    pub const TERMINATE: u8 = b'X';
}

pub mod backend_type {
    pub const AUTHENTICATION: u8 = b'R';
    pub const BACKEND_KEY_DATA: u8 = b'K';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const READY_FOR_QUERY: u8 = b'Z';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const DATA_ROW: u8 = b'D';
    pub const COMMAND_COMPLETE: u8 = b'C';
    pub const EMPTY_QUERY: u8 = b'I';
    pub const PARSE_COMPLETE: u8 = b'1';
    pub const BIND_COMPLETE: u8 = b'2';
    pub const CLOSE_COMPLETE: u8 = b'3';
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    pub const NO_DATA: u8 = b'n';
    pub const PORTAL_SUSPENDED: u8 = b's';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const NOTICE_RESPONSE: u8 = b'N';
    pub const NEGOTIATE_PROTOCOL_VERSION: u8 = b'v';
}

/// Authentication request codes.
pub mod auth_type {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SASL: i32 = 10;
    pub const SASL_CONTINUE: i32 = 11;
    pub const SASL_FINAL: i32 = 12;
}
