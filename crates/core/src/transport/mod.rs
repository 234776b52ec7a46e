//! Network transport layer for control signaling and RTP media delivery.
//!
//! The system uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries control request/reply signaling. One TCP
//!   connection per client, with a thread per connection.
//!
//! - **UDP** ([`udp`]): carries RTP media packets. Each server session binds
//!   its own ephemeral sending socket; the client binds a fixed receive port.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;
