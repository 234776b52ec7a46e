use crate::error::{Result, StreamError};

/// Size of the fixed RTP header in bytes.
pub const HEADER_SIZE: usize = 12;

/// RTP version written by [`RtpPacket::new`].
pub const RTP_VERSION: u8 = 2;

/// Static payload type for JPEG video (RFC 3551 §6).
pub const MJPEG_PAYLOAD_TYPE: u8 = 26;

/// A media packet: fixed RTP header (RFC 3550 §5.1) plus opaque payload.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// In this system the timestamp is a frame-grouping key (the frame index),
/// shared by every fragment of one frame, not a media clock.
///
/// [`decode`](Self::decode) performs no validation beyond the length check:
/// unknown versions and payload types pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// 2-bit version.
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    /// 4-bit contributing-source count. Always 0 here.
    pub csrc_count: u8,
    /// Set on the last fragment of a frame.
    pub marker: bool,
    /// 7-bit payload type.
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    /// Packet with version 2, no padding, no extension and no CSRCs.
    pub fn new(
        payload_type: u8,
        sequence_number: u16,
        timestamp: u32,
        ssrc: u32,
        marker: bool,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            payload,
        }
    }

    /// Serialize the 12-byte header followed by the payload.
    ///
    /// Sub-byte fields are masked to their widths; multi-byte fields are
    /// written big-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        packet.extend_from_slice(&self.header());
        packet.extend_from_slice(&self.payload);
        packet
    }

    fn header(&self) -> [u8; HEADER_SIZE] {
        let first_byte: u8 = ((self.version & 0x03) << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | (self.csrc_count & 0x0f);
        let second_byte: u8 = ((self.marker as u8) << 7) | (self.payload_type & 0x7f);

        let mut header = [0u8; HEADER_SIZE];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Split a datagram into header fields and payload.
    ///
    /// Returns [`StreamError::MalformedPacket`] if `data` is shorter than
    /// [`HEADER_SIZE`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(StreamError::MalformedPacket { len: data.len() });
        }

        Ok(Self {
            version: data[0] >> 6,
            padding: data[0] & 0x20 != 0,
            extension: data[0] & 0x10 != 0,
            csrc_count: data[0] & 0x0f,
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7f,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: data[HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_packet(marker: bool) -> RtpPacket {
        RtpPacket::new(
            MJPEG_PAYLOAD_TYPE,
            7,
            3,
            0xAABBCCDD,
            marker,
            vec![0xFF, 0xD8, 0x01],
        )
    }

    #[test]
    fn header_is_twelve_bytes() {
        let buf = make_packet(false).encode();
        assert_eq!(buf.len(), HEADER_SIZE + 3);
        assert_eq!(&buf[HEADER_SIZE..], &[0xFF, 0xD8, 0x01]);
    }

    #[test]
    fn version_is_2() {
        let buf = make_packet(false).encode();
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[0] & 0x3f, 0);
    }

    #[test]
    fn marker_bit() {
        assert_eq!(make_packet(false).encode()[1] & 0x80, 0);
        assert_eq!(make_packet(true).encode()[1] & 0x80, 0x80);
    }

    #[test]
    fn payload_type() {
        let buf = make_packet(true).encode();
        assert_eq!(buf[1] & 0x7f, MJPEG_PAYLOAD_TYPE);
    }

    #[test]
    fn big_endian_fields() {
        let pkt = RtpPacket::new(26, 0x0102, 0x03040506, 0x0708090A, false, Vec::new());
        let buf = pkt.encode();
        assert_eq!(&buf[2..4], &[0x01, 0x02]);
        assert_eq!(&buf[4..8], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&buf[8..12], &[0x07, 0x08, 0x09, 0x0A]);
    }

    #[test]
    fn oversized_sub_byte_fields_are_masked() {
        let mut pkt = make_packet(false);
        pkt.version = 0xFF;
        pkt.csrc_count = 0xFF;
        pkt.payload_type = 0xFF;
        let buf = pkt.encode();
        assert_eq!(buf[0], 0xCF);
        assert_eq!(buf[1], 0x7F);
    }

    #[test]
    fn decode_restores_boundary_values() {
        let pkt = RtpPacket::new(26, u16::MAX, u32::MAX, u32::MAX, true, vec![9; 20]);
        let decoded = RtpPacket::decode(&pkt.encode()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn decode_header_only_packet() {
        let pkt = RtpPacket::new(26, 0, 0, 1, false, Vec::new());
        let decoded = RtpPacket::decode(&pkt.encode()).unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.ssrc, 1);
    }

    #[test]
    fn decode_passes_unknown_values_through() {
        let mut raw = make_packet(true).encode();
        raw[0] = 0x5F; // version 1, extension, cc=15
        raw[1] = 0x80 | 99;
        let decoded = RtpPacket::decode(&raw).unwrap();
        assert_eq!(decoded.version, 1);
        assert!(!decoded.padding);
        assert!(decoded.extension);
        assert_eq!(decoded.csrc_count, 15);
        assert_eq!(decoded.payload_type, 99);
        assert!(decoded.marker);
    }

    #[test]
    fn decode_short_packet_fails() {
        let err = RtpPacket::decode(&[0x80; 11]).unwrap_err();
        assert!(matches!(err, StreamError::MalformedPacket { len: 11 }));
        assert!(RtpPacket::decode(&[]).is_err());
    }
}
