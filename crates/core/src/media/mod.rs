//! Media handling: MJPEG frame store and RTP packetization.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each JPEG frame is split into one or more RTP packets. Every RTP packet
//! carries a 12-byte fixed header ([`rtp::RtpPacket`]) containing:
//!
//! - **Sequence number** (16-bit, wrapping): one per packet.
//! - **Timestamp** (32-bit): the frame index, shared by all fragments of
//!   a frame. Used only to group fragments.
//! - **SSRC** (32-bit): randomly chosen per session.
//! - **Marker bit**: set on the last packet of a frame.
//!
//! The payload is raw JPEG bytes. Unlike RFC 2435 there is no JPEG-specific
//! payload header: the receiver concatenates payloads until the marker.
//!
//! | Direction | Module |
//! |-----------|--------|
//! | file → frames | [`mjpeg`] |
//! | frame → packets | [`packetizer`] |
//! | packets → frame | [`depacketizer`] |

pub mod depacketizer;
pub mod mjpeg;
pub mod packetizer;
pub mod rtp;

pub use depacketizer::Reassembler;
pub use mjpeg::FrameStore;
pub use packetizer::{Fragments, MAX_PAYLOAD, MjpegPacketizer};
pub use rtp::RtpPacket;
