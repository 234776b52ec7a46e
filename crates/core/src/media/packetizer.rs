use std::slice::Chunks;

use super::rtp::{HEADER_SIZE, MJPEG_PAYLOAD_TYPE, RtpPacket};

/// Default payload budget per packet, leaving room for IP/UDP/RTP headers
/// inside a 1500-byte Ethernet MTU.
pub const DEFAULT_MAX_PAYLOAD: usize = 1400;

/// Largest payload that still fits one UDP datagram over IPv4 with the RTP header.
pub const MAX_PAYLOAD: usize = 65_507 - HEADER_SIZE;

/// Splits JPEG frames into RTP packets.
///
/// Holds the per-session constants (payload type, SSRC, payload budget).
/// Sequence state lives with the caller: each call to
/// [`fragment`](Self::fragment) takes the first sequence number to use and
/// the returned [`Fragments`] reports the one that follows.
#[derive(Debug, Clone)]
pub struct MjpegPacketizer {
    payload_type: u8,
    ssrc: u32,
    max_payload: usize,
}

impl MjpegPacketizer {
    /// Create with explicit SSRC and payload budget.
    ///
    /// The budget is clamped to `1..=`[`MAX_PAYLOAD`].
    pub fn new(ssrc: u32, max_payload: usize) -> Self {
        if max_payload > MAX_PAYLOAD {
            tracing::warn!(max_payload, limit = MAX_PAYLOAD, "payload budget clamped");
        }
        Self {
            payload_type: MJPEG_PAYLOAD_TYPE,
            ssrc,
            max_payload: max_payload.clamp(1, MAX_PAYLOAD),
        }
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(max_payload: usize) -> Self {
        let ssrc = rand::random::<u32>();
        tracing::debug!(
            ssrc = format_args!("{:#010X}", ssrc),
            max_payload,
            "packetizer created"
        );
        Self::new(ssrc, max_payload)
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Lazily split `frame` into packets of at most `max_payload` payload bytes.
    ///
    /// Every packet carries `timestamp`; sequence numbers count up from
    /// `start_sequence`, wrapping at 65536; only the final packet has the
    /// marker bit. An empty frame yields no packets.
    pub fn fragment<'a>(
        &self,
        frame: &'a [u8],
        timestamp: u32,
        start_sequence: u16,
    ) -> Fragments<'a> {
        Fragments {
            chunks: frame.chunks(self.max_payload),
            payload_type: self.payload_type,
            ssrc: self.ssrc,
            timestamp,
            sequence: start_sequence,
        }
    }
}

/// Iterator over the encoded packets of one frame, in fragment order.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    chunks: Chunks<'a, u8>,
    payload_type: u8,
    ssrc: u32,
    timestamp: u32,
    sequence: u16,
}

impl Fragments<'_> {
    /// Sequence number to use for the first packet after this frame.
    ///
    /// Valid before, during and after iteration.
    pub fn next_sequence(&self) -> u16 {
        self.sequence.wrapping_add(self.chunks.len() as u16)
    }
}

impl Iterator for Fragments<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let chunk = self.chunks.next()?;
        let marker = self.chunks.len() == 0;

        let packet = RtpPacket::new(
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            marker,
            chunk.to_vec(),
        )
        .encode();

        self.sequence = self.sequence.wrapping_add(1);
        Some(packet)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Fragments<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(fragments: Fragments<'_>) -> Vec<RtpPacket> {
        fragments.map(|p| RtpPacket::decode(&p).unwrap()).collect()
    }

    #[test]
    fn splits_into_bounded_chunks() {
        let p = MjpegPacketizer::new(0x1234, 1400);
        let frame = vec![0xAB; 4200];
        let packets = decode_all(p.fragment(&frame, 0, 1));

        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|pkt| pkt.payload.len() == 1400));
        let seqs: Vec<u16> = packets.iter().map(|pkt| pkt.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        let markers: Vec<bool> = packets.iter().map(|pkt| pkt.marker).collect();
        assert_eq!(markers, vec![false, false, true]);
    }

    #[test]
    fn shares_timestamp_and_ssrc() {
        let p = MjpegPacketizer::new(0xCAFE, 10);
        let packets = decode_all(p.fragment(&[1u8; 25], 42, 0));
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|pkt| pkt.timestamp == 42));
        assert!(packets.iter().all(|pkt| pkt.ssrc == 0xCAFE));
        assert!(packets.iter().all(|pkt| pkt.payload_type == MJPEG_PAYLOAD_TYPE));
        assert_eq!(packets[2].payload.len(), 5);
    }

    #[test]
    fn single_byte_frame() {
        let p = MjpegPacketizer::new(1, 1400);
        let fragments = p.fragment(&[7], 0, 9);
        assert_eq!(fragments.next_sequence(), 10);
        let packets = decode_all(fragments);
        assert_eq!(packets.len(), 1);
        assert!(packets[0].marker);
        assert_eq!(packets[0].payload, vec![7]);
    }

    #[test]
    fn empty_frame_yields_nothing() {
        let p = MjpegPacketizer::new(1, 1400);
        let fragments = p.fragment(&[], 0, 5);
        assert_eq!(fragments.next_sequence(), 5);
        assert_eq!(fragments.count(), 0);
    }

    #[test]
    fn sequence_wraps() {
        let p = MjpegPacketizer::new(1, 4);
        let fragments = p.fragment(&[0u8; 12], 0, u16::MAX);
        assert_eq!(fragments.next_sequence(), 2);
        let seqs: Vec<u16> = decode_all(fragments)
            .iter()
            .map(|pkt| pkt.sequence_number)
            .collect();
        assert_eq!(seqs, vec![u16::MAX, 0, 1]);
    }

    #[test]
    fn restartable() {
        let p = MjpegPacketizer::new(1, 3);
        let frame = [1, 2, 3, 4, 5];
        let first: Vec<Vec<u8>> = p.fragment(&frame, 0, 0).collect();
        let second: Vec<Vec<u8>> = p.fragment(&frame, 0, 0).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn next_sequence_stable_during_iteration() {
        let p = MjpegPacketizer::new(1, 2);
        let mut fragments = p.fragment(&[0u8; 6], 0, 100);
        assert_eq!(fragments.len(), 3);
        fragments.next();
        assert_eq!(fragments.next_sequence(), 103);
        fragments.by_ref().for_each(drop);
        assert_eq!(fragments.next_sequence(), 103);
    }

    #[test]
    fn zero_budget_is_clamped() {
        let p = MjpegPacketizer::new(1, 0);
        assert_eq!(p.max_payload(), 1);
        assert_eq!(p.fragment(&[1, 2], 0, 0).count(), 2);
    }

    #[test]
    fn oversized_budget_fits_one_datagram() {
        let p = MjpegPacketizer::new(1, 100_000);
        assert_eq!(p.max_payload(), MAX_PAYLOAD);

        let frame = vec![7u8; 70_000];
        let sizes: Vec<usize> = p.fragment(&frame, 0, 0).map(|packet| packet.len()).collect();
        assert_eq!(sizes, [65_507, 70_000 - MAX_PAYLOAD + HEADER_SIZE]);
    }

    #[test]
    fn random_ssrc_differs() {
        let a = MjpegPacketizer::with_random_ssrc(1400);
        let b = MjpegPacketizer::with_random_ssrc(1400);
        assert_ne!(a.ssrc(), b.ssrc());
    }
}
