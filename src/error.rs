//! Error types for the relay core

use std::fmt;
use std::io;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Relay error types
///
/// Every variant except `Bind` and `InvalidState` is local to a single
/// connection: the handling task logs it and tears that connection down,
/// the listener and all other connections are unaffected.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying socket
    Io(io::Error),
    /// Listener could not be started (fatal to the server instance)
    Bind(io::Error),
    /// Unparsable HTTP request
    InvalidHttp(&'static str),
    /// Upgrade request missing a required header
    HandshakeFailed(&'static str),
    /// Malformed WebSocket frame header or unsupported opcode
    InvalidFrame(&'static str),
    /// Invalid UTF-8 in text payload
    InvalidUtf8,
    /// Announced payload length exceeds the configured maximum
    FrameTooLarge,
    /// Connection closed by the peer
    ConnectionClosed,
    /// Server lifecycle misuse (e.g. start while running)
    InvalidState(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Bind(e) => write!(f, "Bind failed: {}", e),
            Error::InvalidHttp(msg) => write!(f, "Invalid HTTP: {}", msg),
            Error::HandshakeFailed(msg) => write!(f, "Handshake failed: {}", msg),
            Error::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            Error::InvalidUtf8 => write!(f, "Invalid UTF-8 in text message"),
            Error::FrameTooLarge => write!(f, "Frame too large"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Bind(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => Error::ConnectionClosed,
            io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}
