use std::time::Duration;

use derive_more::{Display, From};

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ConnectionError {
    #[display("could not connect to {addr}: {reason}")]
    Unreachable { addr: String, reason: String },
    #[display("connecting to {addr} timed out after {}ms", after.as_millis())]
    TimedOut { addr: String, after: Duration },
    #[display("i/o failure: {_0}")]
    Io(String),
    #[display("connection is closed")]
    Closed,
}

impl std::error::Error for ConnectionError {}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum AuthError {
    #[display("authentication rejected (bad password)")]
    BadCredentials,
    #[display("no authentication response within {}ms", _0.as_millis())]
    TimedOut(Duration),
    #[display("unexpected authentication response: id {received_id}, expected {request_id}")]
    UnexpectedResponse { request_id: i32, received_id: i32 },
    #[display("handshake interrupted: {_0}")]
    Interrupted(String),
}

impl std::error::Error for AuthError {}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ProtocolError {
    #[display("truncated size header")]
    TruncatedHeader,
    #[display("invalid packet size {_0}")]
    InvalidSize(i32),
    #[display("truncated packet: declared {declared} bytes")]
    Truncated { declared: i32 },
    #[display("unknown packet type {value} for request {request_id}")]
    UnknownType {
        request_id: i32,
        value: i32,
        body: String,
    },
    #[display("no response for request {request_id}, received {received} unrelated packet(s)")]
    Unanswered { request_id: i32, received: usize },
    #[display("i/o failure: {_0}")]
    Io(String),
}

impl std::error::Error for ProtocolError {}

/// Coarse tag of an [`RconError`], kept for logs and for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    Connection,
    Auth,
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Display, From)]
pub enum RconError {
    #[display("connection error: {_0}")]
    Connection(ConnectionError),
    #[display("auth error: {_0}")]
    Auth(AuthError),
    #[display("protocol error: {_0}")]
    Protocol(ProtocolError),
}

impl RconError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RconError::Connection(_) => ErrorKind::Connection,
            RconError::Auth(_) => ErrorKind::Auth,
            RconError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

impl std::error::Error for RconError {}
