use super::rtp::RtpPacket;
use crate::error::Result;

/// Rebuilds whole JPEG frames from arriving RTP packets.
///
/// Fragments of one frame share a timestamp; the marker bit closes the
/// frame. A packet with a different timestamp abandons whatever was being
/// assembled (its final fragment was lost) and starts over.
///
/// No reordering buffer is kept: packets must be pushed in arrival order and
/// are assumed to arrive contiguously per frame. Reordered fragments produce
/// a corrupted or abandoned frame.
///
/// Owned exclusively by the receiving task.
#[derive(Debug, Default)]
pub struct Reassembler {
    timestamp: Option<u32>,
    buffer: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `datagram` and fold it into the frame in progress.
    ///
    /// Returns the completed frame when the packet carries the marker bit.
    /// A datagram too short to decode leaves the scratch state untouched and
    /// returns [`StreamError::MalformedPacket`](crate::StreamError::MalformedPacket).
    pub fn push(&mut self, datagram: &[u8]) -> Result<Option<Vec<u8>>> {
        let packet = RtpPacket::decode(datagram)?;
        Ok(self.push_packet(packet))
    }

    /// Fold an already-decoded packet into the frame in progress.
    pub fn push_packet(&mut self, packet: RtpPacket) -> Option<Vec<u8>> {
        if self.timestamp != Some(packet.timestamp) {
            if !self.buffer.is_empty() {
                tracing::debug!(
                    abandoned = ?self.timestamp,
                    bytes = self.buffer.len(),
                    timestamp = packet.timestamp,
                    "incomplete frame dropped"
                );
            }
            self.timestamp = Some(packet.timestamp);
            self.buffer.clear();
        }

        self.buffer.extend_from_slice(&packet.payload);

        if !packet.marker {
            return None;
        }

        self.timestamp = None;
        Some(std::mem::take(&mut self.buffer))
    }

    /// Timestamp of the frame being assembled, if any.
    pub fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    /// Bytes accumulated for the frame in progress.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.buffer.is_empty()
    }
}
