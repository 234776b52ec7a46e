use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::Playback;
use crate::media::{FrameStore, MjpegPacketizer};
use crate::transport::UdpTransport;

/// Frame interval for 25 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// Everything the sender thread needs, moved into it at spawn.
pub(crate) struct SenderJob {
    pub socket: Arc<UdpTransport>,
    pub dest: SocketAddr,
    pub frames: Arc<FrameStore>,
    pub packetizer: MjpegPacketizer,
    pub playback: Arc<Mutex<Playback>>,
    pub interval: Duration,
}

/// Handle to the background task that streams frames while Playing.
///
/// Cancellation is cooperative: [`stop`](Self::stop) raises a flag that the
/// task observes once per frame interval. Dropping the handle also stops it.
#[derive(Debug)]
pub struct MediaSender {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MediaSender {
    pub(crate) fn spawn(job: SenderJob) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("media-sender".to_string())
            .spawn(move || send_loop(job, &flag))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the task and wait for it to exit (at most one frame interval).
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("media sender panicked");
        }
    }
}

impl Drop for MediaSender {
    fn drop(&mut self) {
        self.halt();
    }
}

fn send_loop(job: SenderJob, stop: &AtomicBool) {
    tracing::debug!(dest = %job.dest, frames = job.frames.len(), "sender started");

    loop {
        thread::sleep(job.interval);
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let Playback {
            frame_index,
            next_sequence,
        } = *job.playback.lock();

        let frame = job.frames.at(frame_index);
        let fragments = job
            .packetizer
            .fragment(frame, frame_index as u32, next_sequence);
        let count = fragments.len();

        // Sequence numbers are only consumed by packets that left the socket.
        let mut sent: u16 = 0;
        for packet in fragments {
            if let Err(e) = job.socket.send_to(&packet, job.dest) {
                tracing::warn!(error = %e, dest = %job.dest, "RTP send failed");
                break;
            }
            sent = sent.wrapping_add(1);
        }

        tracing::trace!(
            frame = frame_index,
            seq = next_sequence,
            packets = count,
            sent,
            bytes = frame.len(),
            "frame sent"
        );

        let mut playback = job.playback.lock();
        playback.frame_index = (frame_index + 1) % job.frames.len();
        playback.next_sequence = next_sequence.wrapping_add(sent);
    }

    tracing::debug!(dest = %job.dest, "sender stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::RtpPacket;
    use std::net::UdpSocket;
    use std::time::Instant;

    fn two_frame_store() -> Arc<FrameStore> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[1u8; 20]);
        data.extend_from_slice(&[0xFF, 0xD9, 0xFF, 0xD8, 2, 0xFF, 0xD9]);
        Arc::new(FrameStore::from_bytes(data).unwrap())
    }

    #[test]
    fn streams_frames_and_advances_cursor() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let playback = Arc::new(Mutex::new(Playback::default()));

        let sender = MediaSender::spawn(SenderJob {
            socket: Arc::new(UdpTransport::bind().unwrap()),
            dest: receiver.local_addr().unwrap(),
            frames: two_frame_store(),
            packetizer: MjpegPacketizer::new(7, 10),
            playback: playback.clone(),
            interval: Duration::from_millis(5),
        })
        .unwrap();

        let mut buf = [0u8; 1500];
        let mut packets = Vec::new();
        while packets.len() < 4 {
            let n = receiver.recv(&mut buf).unwrap();
            packets.push(RtpPacket::decode(&buf[..n]).unwrap());
        }
        sender.stop();

        // Frame 0 (24 bytes) in three packets, then frame 1 (5 bytes).
        assert_eq!(packets[0].sequence_number, 1);
        assert_eq!(packets[0].timestamp, 0);
        assert!(!packets[1].marker);
        assert!(packets[2].marker);
        assert_eq!(packets[3].sequence_number, 4);
        assert_eq!(packets[3].timestamp, 1);
        assert!(packets[3].marker);

        let cursor = *playback.lock();
        assert!(cursor.frame_index < 2);
        assert!(cursor.next_sequence >= 5);
    }

    #[test]
    fn failed_sends_consume_no_sequence_numbers() {
        // Broadcast without SO_BROADCAST is refused by the socket.
        let playback = Arc::new(Mutex::new(Playback::default()));
        let sender = MediaSender::spawn(SenderJob {
            socket: Arc::new(UdpTransport::bind().unwrap()),
            dest: "255.255.255.255:9".parse().unwrap(),
            frames: two_frame_store(),
            packetizer: MjpegPacketizer::new(7, 10),
            playback: playback.clone(),
            interval: Duration::from_millis(5),
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        sender.stop();

        assert_eq!(playback.lock().next_sequence, 1);
    }

    #[test]
    fn stop_is_prompt() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let sender = MediaSender::spawn(SenderJob {
            socket: Arc::new(UdpTransport::bind().unwrap()),
            dest: receiver.local_addr().unwrap(),
            frames: two_frame_store(),
            packetizer: MjpegPacketizer::new(7, 1400),
            playback: Arc::new(Mutex::new(Playback::default())),
            interval: DEFAULT_FRAME_INTERVAL,
        })
        .unwrap();

        let started = Instant::now();
        sender.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
