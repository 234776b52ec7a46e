//! Error types for the MJPEG streaming library.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur in the streaming library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Frame store**: [`FileUnavailable`](Self::FileUnavailable),
///   [`NoFramesFound`](Self::NoFramesFound): SETUP fails with 404.
/// - **Media**: [`MalformedPacket`](Self::MalformedPacket): the datagram is
///   dropped, never fatal.
/// - **Resources**: [`ConnectionFailed`](Self::ConnectionFailed),
///   [`BindFailed`](Self::BindFailed): surfaced to the caller, no retry.
/// - **Protocol**: [`SequenceMismatch`](Self::SequenceMismatch),
///   [`SessionMismatch`](Self::SessionMismatch),
///   [`ProtocolState`](Self::ProtocolState), [`Parse`](Self::Parse):
///   recovered locally by discarding the offending message.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The motion-JPEG source could not be read.
    #[error("file unavailable: {}: {source}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source was readable but held no complete `FFD8 … FFD9` frame.
    #[error("no JPEG frames found in {}", path.display())]
    NoFramesFound { path: PathBuf },

    /// A datagram shorter than the 12-byte RTP header.
    #[error("malformed RTP packet: {len} bytes is shorter than the header")]
    MalformedPacket { len: usize },

    /// The control connection to the server could not be established.
    #[error("cannot connect to {addr}:{port}: {source}")]
    ConnectionFailed {
        addr: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The client media socket could not be bound.
    #[error("cannot bind media port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A reply echoed a CSeq other than the one outstanding.
    #[error("CSeq mismatch: expected {expected}, received {received}")]
    SequenceMismatch { expected: u32, received: u32 },

    /// A reply carried a session id other than the one learned at SETUP.
    #[error("session mismatch: expected {expected}, received {received}")]
    SessionMismatch { expected: String, received: String },

    /// A request or reply that the current state does not accept.
    #[error("{method} not valid in state {state}")]
    ProtocolState {
        method: &'static str,
        state: &'static str,
    },

    /// Failed to parse a control message.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// The client's control connection has already been closed.
    #[error("control connection closed")]
    NotConnected,
}

/// Specific kind of control-message parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no first line).
    EmptyMessage,
    /// Request line did not have the expected `Method Filename Version` format.
    InvalidRequestLine,
    /// Status line did not have the expected `Version Code Text` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator, or its value was not numeric.
    InvalidHeader,
    /// Method other than SETUP, PLAY, PAUSE or TEARDOWN.
    UnknownMethod,
    /// No `CSeq` header.
    MissingCSeq,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::UnknownMethod => write!(f, "unknown method"),
            Self::MissingCSeq => write!(f, "missing CSeq"),
        }
    }
}

impl StreamError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
