use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::Renderer;
use crate::media::Reassembler;
use crate::transport::UdpTransport;
use crate::transport::udp::is_timeout;

/// Largest datagram the receive loop accepts (the UDP maximum).
pub const RECV_BUFFER_SIZE: usize = 65_535;

const RUN: u8 = 0;
const STOP: u8 = 1;
const CLOSE: u8 = 2;

/// Handle to the background task that reassembles frames while Playing.
///
/// The task owns the media socket. [`pause`](Self::pause) stops it and hands
/// the socket back for the next PLAY; [`close`](Self::close) stops it and
/// closes the socket. Either takes effect within one receive timeout.
/// Dropping the handle closes.
pub struct MediaReceiver {
    signal: Arc<AtomicU8>,
    handle: Option<JoinHandle<Option<UdpTransport>>>,
}

impl MediaReceiver {
    pub(crate) fn spawn(
        socket: UdpTransport,
        renderer: Arc<dyn Renderer>,
        frames_received: Arc<AtomicU64>,
        backoff: Duration,
    ) -> std::io::Result<Self> {
        let signal = Arc::new(AtomicU8::new(RUN));
        let flag = signal.clone();
        let handle = thread::Builder::new()
            .name("media-receiver".to_string())
            .spawn(move || {
                receive_loop(socket, renderer.as_ref(), &frames_received, &flag, backoff)
            })?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Stop receiving and return the socket.
    pub fn pause(mut self) -> Option<UdpTransport> {
        self.halt(STOP)
    }

    /// Stop receiving and close the socket.
    pub fn close(mut self) {
        self.halt(CLOSE);
    }

    fn halt(&mut self, signal: u8) -> Option<UdpTransport> {
        self.signal.store(signal, Ordering::SeqCst);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(socket) => socket,
            Err(_) => {
                tracing::error!("media receiver panicked");
                None
            }
        }
    }
}

impl Drop for MediaReceiver {
    fn drop(&mut self) {
        self.halt(CLOSE);
    }
}

fn receive_loop(
    socket: UdpTransport,
    renderer: &dyn Renderer,
    frames_received: &AtomicU64,
    signal: &AtomicU8,
    backoff: Duration,
) -> Option<UdpTransport> {
    tracing::debug!("receiver started");

    let mut reassembler = Reassembler::default();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        match signal.load(Ordering::SeqCst) {
            STOP => {
                tracing::debug!("receiver paused");
                return Some(socket);
            }
            CLOSE => break,
            _ => {}
        }

        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                if recover(signal, &e, backoff) {
                    break;
                }
                continue;
            }
        };

        match reassembler.push(&buf[..len]) {
            Ok(Some(frame)) => {
                frames_received.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(bytes = frame.len(), "frame reassembled");
                renderer.on_frame_ready(&frame);
            }
            Ok(None) => {}
            Err(e) => tracing::trace!(error = %e, "datagram dropped"),
        }
    }

    tracing::debug!("receiver closed");
    drop(socket);
    None
}

/// Handle a socket failure. Returns `true` once the receiver is closing;
/// otherwise waits `backoff` so a persistent error cannot spin.
fn recover(signal: &AtomicU8, error: &std::io::Error, backoff: Duration) -> bool {
    if signal.load(Ordering::SeqCst) == CLOSE {
        return true;
    }
    tracing::warn!(%error, "RTP receive failed");
    thread::sleep(backoff);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MjpegPacketizer;
    use std::sync::mpsc;
    use std::time::Instant;

    struct ChannelRenderer(parking_lot::Mutex<mpsc::Sender<Vec<u8>>>);

    impl Renderer for ChannelRenderer {
        fn on_frame_ready(&self, frame: &[u8]) {
            let _ = self.0.lock().send(frame.to_vec());
        }
    }

    fn receiver() -> (MediaReceiver, u16, mpsc::Receiver<Vec<u8>>, Arc<AtomicU64>) {
        let socket = UdpTransport::bind_port(0, Duration::from_millis(20)).unwrap();
        let port = socket.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        let count = Arc::new(AtomicU64::new(0));
        let renderer = Arc::new(ChannelRenderer(parking_lot::Mutex::new(tx)));
        let handle =
            MediaReceiver::spawn(socket, renderer, count.clone(), Duration::from_millis(20))
                .unwrap();
        (handle, port, rx, count)
    }

    #[test]
    fn reassembles_fragmented_frame() {
        let (handle, port, frames, count) = receiver();
        let sender = UdpTransport::bind().unwrap();
        let dest = ([127, 0, 0, 1], port).into();

        let frame: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
        let packetizer = MjpegPacketizer::new(1, 1400);
        for packet in packetizer.fragment(&frame, 0, 1) {
            sender.send_to(&packet, dest).unwrap();
        }

        let got = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, frame);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        handle.close();
    }

    #[test]
    fn malformed_datagrams_are_skipped() {
        let (handle, port, frames, _) = receiver();
        let sender = UdpTransport::bind().unwrap();
        let dest = ([127, 0, 0, 1], port).into();

        sender.send_to(&[0x80, 26, 0], dest).unwrap();
        for packet in MjpegPacketizer::new(1, 1400).fragment(&[1, 2, 3], 5, 9) {
            sender.send_to(&packet, dest).unwrap();
        }

        assert_eq!(frames.recv_timeout(Duration::from_secs(2)).unwrap(), vec![1, 2, 3]);
        handle.close();
    }

    #[test]
    fn datagrams_up_to_udp_limit_arrive_whole() {
        let (handle, port, frames, _) = receiver();
        let sender = UdpTransport::bind().unwrap();
        let dest = ([127, 0, 0, 1], port).into();

        let frame: Vec<u8> = (0..30_000u32).map(|i| (i % 251) as u8).collect();
        let packetizer = MjpegPacketizer::new(1, 30_000);
        for packet in packetizer.fragment(&frame, 0, 1) {
            sender.send_to(&packet, dest).unwrap();
        }

        let got = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got.len(), 30_000);
        assert_eq!(got, frame);
        handle.close();
    }

    #[test]
    fn socket_errors_back_off_until_closed() {
        let error = std::io::Error::other("unreachable");
        let backoff = Duration::from_millis(30);

        let running = AtomicU8::new(RUN);
        let started = Instant::now();
        assert!(!recover(&running, &error, backoff));
        assert!(started.elapsed() >= backoff);

        let closing = AtomicU8::new(CLOSE);
        let started = Instant::now();
        assert!(recover(&closing, &error, backoff));
        assert!(started.elapsed() < backoff);
    }

    #[test]
    fn pause_returns_socket() {
        let (handle, port, _, _) = receiver();
        let socket = handle.pause().unwrap();
        assert_eq!(socket.local_addr().unwrap().port(), port);
    }
}
