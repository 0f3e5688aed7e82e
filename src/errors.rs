use crate::frames::context::RntbdContextException;
use crate::frames::tokens::RntbdTokenType;
use bb8::RunError;
use bytes::Bytes;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::string::FromUtf8Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RntbdError {
    /// Represents general error.
    #[error("RNTBD error: {0}")]
    Error(String),

    #[error(transparent)]
    CodecError(#[from] CodecError),

    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),

    #[error(transparent)]
    ConnectionPoolError(#[from] RunError<ConnectionError>),

    /// A response the service answered with a non-success status.
    #[error(transparent)]
    ServiceError(Box<ServiceError>),
}

impl RntbdError {
    /// The typed service error carried by this error, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            RntbdError::ServiceError(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Frame encoding/decoding error. Fatal to the connection that observes it.
#[derive(Error, Debug, PartialEq)]
pub enum CodecError {
    #[error("Codec error: {0}")]
    Error(String),

    /// Represents all cases of `std::io::Error`.
    #[error(transparent)]
    IoError(#[from] IoError),

    #[error(transparent)]
    StringDecodingError(#[from] FromUtf8Error),

    #[error("Unknown token type tag: {0:#04x}")]
    UnknownTokenType(u8),

    #[error("Token {name} (id {id:#06x}, type {token_type:?}) does not accept {value}")]
    InvalidTokenValue {
        id: u16,
        name: &'static str,
        token_type: RntbdTokenType,
        value: &'static str,
    },

    #[error("Required token not found on token stream: type={token_type:?}, identifier={id:#06x}")]
    MissingRequiredToken { id: u16, token_type: RntbdTokenType },

    #[error("Token stream truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLong { length: u32, limit: u32 },

    #[error("Frame of {length} bytes is shorter than the {minimum} byte prolog")]
    FrameTooShort { length: u32, minimum: u32 },
}

/// Host connection error. Any of these is fatal to the connection.
#[derive(Error, Debug, PartialEq)]
pub enum ConnectionError {
    /// Represents general error.
    #[error("Connection error: {0}")]
    Error(String),

    /// Represents all cases of `std::io::Error`.
    #[error(transparent)]
    IoError(#[from] IoError),

    /// Frames codec related error.
    #[error(transparent)]
    FrameError(#[from] CodecError),

    #[error(transparent)]
    SendError(#[from] SendError),

    /// The connection went away; the event names the exit path taken.
    #[error("Channel closed ({0})")]
    ChannelClosed(ClosedEvent),

    /// The server refused the RNTBD context handshake.
    #[error(transparent)]
    ContextFailed(#[from] RntbdContextException),

    /// The channel health check came back negative.
    #[error("health check failed")]
    Unhealthy,

    #[error("Pending request limit reached ({0} requests)")]
    PendingLimitExceeded(usize),

    #[error("Unexpected frame for connection state: {0}")]
    UnexpectedFrame(&'static str),
}

/// Distinct exit-path sentinels so observers can tell which way a
/// connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedEvent {
    OnClose,
    OnUnregister,
    OnDeregister,
}

impl Display for ClosedEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosedEvent::OnClose => f.write_str("close"),
            ClosedEvent::OnUnregister => f.write_str("unregister"),
            ClosedEvent::OnDeregister => f.write_str("deregister"),
        }
    }
}

/// Error body carried by non-success responses, either parsed from the
/// response payload or synthesized from the status line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_error_info: Option<String>,
}

impl ErrorBody {
    pub fn from_status(status: u32) -> ErrorBody {
        ErrorBody {
            code: status.to_string(),
            message: reason_phrase(status).to_owned(),
            additional_error_info: None,
        }
    }

    pub fn from_message<S: Into<String>>(status: u32, message: S) -> ErrorBody {
        ErrorBody {
            code: status.to_string(),
            message: message.into(),
            additional_error_info: None,
        }
    }

    pub(crate) fn from_payload(status: u32, payload: &Bytes) -> ErrorBody {
        serde_json::from_slice(payload).unwrap_or_else(|error| {
            warn!("Failed to parse error body: {}", error);
            ErrorBody::from_status(status)
        })
    }
}

/// Status codes mapped to a closed error taxonomy, selected by the
/// response status and sub-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    Conflict,
    InvalidPartition,
    PartitionKeyRangeGone,
    PartitionKeyRangeIsSplitting,
    PartitionIsMigrating,
    Gone,
    PreconditionFailed,
    RequestEntityTooLarge,
    Locked,
    RequestRateTooLarge,
    RetryWith,
    InternalServerError,
    ServiceUnavailable,
    GenericDocumentClient,
}

pub mod sub_status {
    pub const NAME_CACHE_IS_STALE: u32 = 1000;
    pub const PARTITION_KEY_RANGE_GONE: u32 = 1002;
    pub const COMPLETING_SPLIT: u32 = 1007;
    pub const COMPLETING_PARTITION_MIGRATION: u32 = 1008;
}

impl ServiceErrorKind {
    pub fn from_status(status: u32, sub_status_code: u32) -> ServiceErrorKind {
        match status {
            400 => ServiceErrorKind::BadRequest,
            401 => ServiceErrorKind::Unauthorized,
            403 => ServiceErrorKind::Forbidden,
            404 => ServiceErrorKind::NotFound,
            405 => ServiceErrorKind::MethodNotAllowed,
            408 => ServiceErrorKind::RequestTimeout,
            409 => ServiceErrorKind::Conflict,
            410 => match sub_status_code {
                sub_status::NAME_CACHE_IS_STALE => ServiceErrorKind::InvalidPartition,
                sub_status::PARTITION_KEY_RANGE_GONE => ServiceErrorKind::PartitionKeyRangeGone,
                sub_status::COMPLETING_SPLIT => ServiceErrorKind::PartitionKeyRangeIsSplitting,
                sub_status::COMPLETING_PARTITION_MIGRATION => {
                    ServiceErrorKind::PartitionIsMigrating
                }
                _ => ServiceErrorKind::Gone,
            },
            412 => ServiceErrorKind::PreconditionFailed,
            413 => ServiceErrorKind::RequestEntityTooLarge,
            423 => ServiceErrorKind::Locked,
            429 => ServiceErrorKind::RequestRateTooLarge,
            449 => ServiceErrorKind::RetryWith,
            500 => ServiceErrorKind::InternalServerError,
            503 => ServiceErrorKind::ServiceUnavailable,
            _ => ServiceErrorKind::GenericDocumentClient,
        }
    }
}

/// One flattened error type for every non-success service outcome,
/// sharing the fields the per-status variants all carry.
#[derive(Debug, PartialEq)]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub status: u32,
    pub sub_status: u32,
    pub error_body: ErrorBody,
    pub lsn: i64,
    pub partition_key_range_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub cause: Option<Arc<ConnectionError>>,
}

impl ServiceError {
    /// Synthetic `Gone` handed to every record still pending when the
    /// connection departs; carries the departure cause and the request's
    /// physical endpoint and headers.
    pub(crate) fn gone(
        message: String,
        cause: Arc<ConnectionError>,
        request_uri: &str,
        request_headers: HashMap<String, String>,
    ) -> ServiceError {
        ServiceError {
            kind: ServiceErrorKind::Gone,
            status: 410,
            sub_status: 0,
            error_body: ErrorBody::from_message(410, format!("{} ({})", message, request_uri)),
            lsn: -1,
            partition_key_range_id: None,
            headers: request_headers,
            cause: Some(cause),
        }
    }

    pub(crate) fn request_timeout(transport_request_id: u64, timeout: Duration) -> ServiceError {
        ServiceError {
            kind: ServiceErrorKind::RequestTimeout,
            status: 408,
            sub_status: 0,
            error_body: ErrorBody::from_message(
                408,
                format!(
                    "request {} timed out after {:?}",
                    transport_request_id, timeout
                ),
            ),
            lsn: -1,
            partition_key_range_id: None,
            headers: HashMap::new(),
            cause: None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} (status: {}, sub-status: {}): {}",
            self.kind, self.status, self.sub_status, self.error_body.message
        )
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<ServiceError> for RntbdError {
    fn from(error: ServiceError) -> Self {
        RntbdError::ServiceError(Box::new(error))
    }
}

/// Status line text for synthesized error bodies.
pub fn reason_phrase(status: u32) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        423 => "Locked",
        429 => "Too Many Requests",
        449 => "Retry With",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[derive(Error, Debug)]
pub struct SendError(tokio::sync::mpsc::error::SendError<Bytes>);

impl PartialEq for SendError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Error, Debug)]
pub struct IoError(std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Display for IoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::IoError(IoError(err))
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::IoError(IoError(err))
    }
}

impl From<tokio::sync::mpsc::error::SendError<Bytes>> for ConnectionError {
    fn from(err: tokio::sync::mpsc::error::SendError<Bytes>) -> Self {
        ConnectionError::SendError(SendError(err))
    }
}

impl From<String> for RntbdError {
    fn from(err: String) -> Self {
        RntbdError::Error(err)
    }
}

impl From<String> for ConnectionError {
    fn from(err: String) -> Self {
        ConnectionError::Error(err)
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        CodecError::Error(err)
    }
}
