//! Control protocol, modeled on RTSP (RFC 2326).
//!
//! This module handles the text-based signaling: parsing requests, building
//! replies, and driving the server-side session state machine.
//!
//! ## Message format
//!
//! Messages are newline-separated lines terminated by a blank line:
//!
//! ```text
//! PLAY movie.mjpeg RTSP/1.0
//! CSeq: 2
//! Session: 123456
//!
//! ```
//!
//! Differences from RFC 2326:
//! - The request target is a bare filename, not an `rtsp://` URL.
//! - Only four methods exist, and a request the session state does not allow
//!   receives no reply at all.
//! - `Transport` names a single client port: `RTP/UDP; client_port=25000`.
//!
//! ## Supported methods
//!
//! | Method | Valid in | Result |
//! |--------|----------|--------|
//! | SETUP | Init | Ready |
//! | PLAY | Ready | Playing |
//! | PAUSE | Playing | Ready |
//! | TEARDOWN | Ready, Playing | Init |

pub mod handler;
pub mod request;
pub mod response;

pub use handler::MethodHandler;
pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
