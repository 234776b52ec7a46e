//! Streaming session state.
//!
//! A session is created by a successful SETUP and destroyed by TEARDOWN. One
//! control connection carries exactly one session. The server-side
//! [`Session`] tracks:
//!
//! - A random session id (six decimal digits, returned in the `Session` header).
//! - The playback state: Init -> Ready -> Playing <-> Ready -> Init.
//! - The loaded [`FrameStore`] and the client's media address.
//! - The shared [`Playback`] cursor (frame index, next packet sequence number)
//!   read and advanced by the [`sender::MediaSender`] task.
//!
//! ## Session lifecycle
//!
//! ```text
//! SETUP          Init    -> Ready
//! PLAY           Ready   -> Playing   (sender started)
//! PAUSE          Playing -> Ready     (sender stopped)
//! TEARDOWN       Ready | Playing -> Init (sender stopped, media socket closed)
//! ```

pub mod sender;
pub mod transport;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::media::{FrameStore, MjpegPacketizer};
use crate::transport::UdpTransport;
use sender::MediaSender;
pub use transport::TransportHeader;

/// Default client media port when SETUP carries no usable `Transport` header.
pub const DEFAULT_CLIENT_RTP_PORT: u16 = 25000;

/// Control-protocol state, shared by the server and client state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session; only SETUP is accepted.
    #[default]
    Init,
    /// Frames loaded and media port known, not streaming.
    Ready,
    /// Media is being delivered.
    Playing,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Ready => "READY",
            Self::Playing => "PLAYING",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback cursor shared between the control handler and the sender task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Playback {
    /// Index of the next frame to send, always `< frame count`.
    pub frame_index: usize,
    /// Sequence number of the next packet to send.
    pub next_sequence: u16,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            frame_index: 0,
            next_sequence: 1,
        }
    }
}

/// Generate a session id in the range 100000..=999999.
pub fn generate_session_id() -> String {
    rand::random_range(100_000u32..=999_999).to_string()
}

/// Server-side state of the single session carried by one connection.
///
/// Owned by the connection's [`MethodHandler`](crate::protocol::MethodHandler);
/// only [`Playback`] crosses into the sender thread, behind a mutex.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    id: Option<String>,
    frames: Option<Arc<FrameStore>>,
    packetizer: Option<MjpegPacketizer>,
    client_rtp_addr: Option<SocketAddr>,
    playback: Arc<Mutex<Playback>>,
    media_socket: Option<Arc<UdpTransport>>,
    sender: Option<MediaSender>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn client_rtp_addr(&self) -> Option<SocketAddr> {
        self.client_rtp_addr
    }

    pub fn frame_count(&self) -> usize {
        self.frames.as_ref().map_or(0, |f| f.len())
    }

    /// Snapshot of the playback cursor.
    pub fn playback(&self) -> Playback {
        *self.playback.lock()
    }

    pub fn is_sending(&self) -> bool {
        self.sender.is_some()
    }

    pub fn has_media_socket(&self) -> bool {
        self.media_socket.is_some()
    }

    /// Transition to a new state.
    pub fn set_state(&mut self, state: SessionState) {
        tracing::debug!(session_id = ?self.id, old_state = %self.state, new_state = %state, "state transition");
        self.state = state;
    }

    /// Record a successful SETUP and move to Ready.
    pub(crate) fn establish(
        &mut self,
        id: String,
        frames: FrameStore,
        packetizer: MjpegPacketizer,
        client_rtp_addr: SocketAddr,
    ) {
        self.id = Some(id);
        self.frames = Some(Arc::new(frames));
        self.packetizer = Some(packetizer);
        self.client_rtp_addr = Some(client_rtp_addr);
        *self.playback.lock() = Playback::default();
        self.set_state(SessionState::Ready);
    }

    /// The media socket, bound on first use and kept across PAUSE.
    pub(crate) fn media_socket(&mut self) -> Result<Arc<UdpTransport>> {
        if let Some(socket) = &self.media_socket {
            return Ok(socket.clone());
        }
        let socket = Arc::new(UdpTransport::bind()?);
        self.media_socket = Some(socket.clone());
        Ok(socket)
    }

    /// Spawn the sender task for the current frame store and client address.
    pub(crate) fn start_sender(
        &mut self,
        socket: Arc<UdpTransport>,
        interval: std::time::Duration,
    ) -> Result<()> {
        let (Some(frames), Some(packetizer), Some(dest)) = (
            self.frames.clone(),
            self.packetizer.clone(),
            self.client_rtp_addr,
        ) else {
            return Err(std::io::Error::other("session not set up").into());
        };

        let job = sender::SenderJob {
            socket,
            dest,
            frames,
            packetizer,
            playback: self.playback.clone(),
            interval,
        };
        self.sender = Some(MediaSender::spawn(job)?);
        Ok(())
    }

    /// Signal the sender task to stop and wait for it to exit.
    pub(crate) fn stop_sender(&mut self) {
        if let Some(sender) = self.sender.take() {
            sender.stop();
        }
    }

    /// Stop streaming, close the media socket and forget the session.
    pub(crate) fn release(&mut self) {
        self.stop_sender();
        if self.media_socket.take().is_some() {
            tracing::debug!(session_id = ?self.id, "media socket closed");
        }
        self.set_state(SessionState::Init);
        self.id = None;
        self.frames = None;
        self.packetizer = None;
        self.client_rtp_addr = None;
    }
}
