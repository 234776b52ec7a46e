//! Streaming client.
//!
//! A [`Client`] holds one control connection. Requests are sent from the
//! caller's thread; replies are read by a listener thread that validates them
//! against [`ClientSession`] and applies the resulting transition:
//!
//! ```text
//! SETUP    200  bind the media port                    -> Ready
//! PLAY     200  start the receiver                     -> Playing
//! PAUSE    200  stop the receiver, keep the socket     -> Ready
//! TEARDOWN 200  close the socket and the connection    -> Init
//! ```
//!
//! Reassembled frames and resource failures are reported through a
//! caller-supplied [`Renderer`].

pub mod receiver;
pub mod session;

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, StreamError};
use crate::protocol::{Method, RtspResponse};
use crate::session::{DEFAULT_CLIENT_RTP_PORT, SessionState};
use crate::transport::UdpTransport;
use crate::transport::tcp::read_message;
use receiver::MediaReceiver;
pub use session::{ClientSession, Transition};

/// Read timeout on the media socket; bounds how long stopping the receiver takes.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(500);

/// Sink for reassembled frames and resource failures.
///
/// Called from the client's background threads.
pub trait Renderer: Send + Sync {
    /// A complete JPEG frame arrived.
    fn on_frame_ready(&self, frame: &[u8]);

    /// The control connection could not be opened.
    fn on_connection_failed(&self, addr: &str, port: u16) {
        let _ = (addr, port);
    }

    /// The media port could not be bound after SETUP was acknowledged.
    fn on_bind_failed(&self, port: u16) {
        let _ = port;
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub server_port: u16,
    /// Local UDP port announced in SETUP and bound for media.
    pub rtp_port: u16,
    /// File requested from the server.
    pub filename: String,
    pub receive_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_addr: &str, server_port: u16, rtp_port: u16, filename: &str) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            server_port,
            rtp_port,
            filename: filename.to_string(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 8554, DEFAULT_CLIENT_RTP_PORT, "movie.mjpeg")
    }
}

#[derive(Default)]
struct Media {
    socket: Option<UdpTransport>,
    receiver: Option<MediaReceiver>,
}

/// State shared between the caller and the reply listener.
struct Inner {
    config: ClientConfig,
    renderer: Arc<dyn Renderer>,
    stream: TcpStream,
    session: Mutex<ClientSession>,
    media: Mutex<Media>,
    connected: AtomicBool,
    frames_received: Arc<AtomicU64>,
}

/// Control-connection client.
///
/// Each request method returns the CSeq it was sent with, or `None` when the
/// current state does not permit it (nothing is sent). Replies are applied
/// asynchronously; poll [`state`](Self::state) to observe them.
pub struct Client {
    inner: Arc<Inner>,
    listener: Option<JoinHandle<()>>,
}

impl Client {
    /// Open the control connection and start the reply listener.
    ///
    /// A refused connection is reported to the renderer and returned as
    /// [`StreamError::ConnectionFailed`].
    pub fn connect(config: ClientConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let stream = match TcpStream::connect((config.server_addr.as_str(), config.server_port)) {
            Ok(stream) => stream,
            Err(source) => {
                tracing::warn!(
                    addr = %config.server_addr,
                    port = config.server_port,
                    error = %source,
                    "connection failed"
                );
                renderer.on_connection_failed(&config.server_addr, config.server_port);
                return Err(StreamError::ConnectionFailed {
                    addr: config.server_addr,
                    port: config.server_port,
                    source,
                });
            }
        };
        let reader = stream.try_clone()?;

        tracing::info!(addr = %config.server_addr, port = config.server_port, "connected");

        let inner = Arc::new(Inner {
            session: Mutex::new(ClientSession::new(&config.filename, config.rtp_port)),
            config,
            renderer,
            stream,
            media: Mutex::new(Media::default()),
            connected: AtomicBool::new(true),
            frames_received: Arc::new(AtomicU64::new(0)),
        });

        let listener = {
            let inner = inner.clone();
            thread::Builder::new()
                .name("reply-listener".to_string())
                .spawn(move || inner.listen(reader))?
        };

        Ok(Self {
            inner,
            listener: Some(listener),
        })
    }

    pub fn setup(&self) -> Result<Option<u32>> {
        self.inner.send(Method::Setup)
    }

    pub fn play(&self) -> Result<Option<u32>> {
        self.inner.send(Method::Play)
    }

    pub fn pause(&self) -> Result<Option<u32>> {
        self.inner.send(Method::Pause)
    }

    pub fn teardown(&self) -> Result<Option<u32>> {
        self.inner.send(Method::Teardown)
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.lock().state()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session.lock().session_id().map(str::to_string)
    }

    pub fn teardown_acked(&self) -> bool {
        self.inner.session.lock().teardown_acked()
    }

    /// Whether the control connection is still open.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Frames delivered to the renderer so far.
    pub fn frames_received(&self) -> u64 {
        self.inner.frames_received.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Close the control connection and release the media socket.
    ///
    /// Sends nothing to the server. Called on drop.
    pub fn close(&mut self) {
        self.inner.disconnect();
        if let Some(handle) = self.listener.take()
            && handle.join().is_err()
        {
            tracing::error!("reply listener panicked");
        }
        self.inner.release_media();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn send(&self, method: Method) -> Result<Option<u32>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(StreamError::NotConnected);
        }

        // Held across the write so CSeq order matches wire order.
        let mut session = self.session.lock();
        let Some(request) = session.request(method) else {
            return Ok(None);
        };

        tracing::debug!(%method, cseq = request.cseq, "request");
        (&self.stream).write_all(request.serialize().as_bytes())?;
        Ok(Some(request.cseq))
    }

    fn listen(&self, reader: TcpStream) {
        let mut reader = BufReader::new(reader);
        let reason = loop {
            let text = match read_message(&mut reader) {
                Ok(Some(text)) => text,
                Ok(None) => break "connection closed by server",
                Err(_) if !self.connected.load(Ordering::SeqCst) => break "connection closed",
                Err(e) => {
                    tracing::warn!(error = %e, "control read failed");
                    break "read error";
                }
            };

            let reply = match RtspResponse::parse(&text) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable reply");
                    continue;
                }
            };

            if self.on_reply(&reply) == Some(Transition::TornDown) {
                break "session torn down";
            }
        };

        self.disconnect();
        tracing::info!(reason, "control connection closed");
    }

    fn on_reply(&self, reply: &RtspResponse) -> Option<Transition> {
        tracing::debug!(status = reply.status_code, cseq = reply.cseq, "reply");

        let transition = match self.session.lock().handle_reply(reply) {
            Ok(Some(transition)) => transition,
            Ok(None) => {
                tracing::warn!(
                    status = reply.status_code,
                    reason = %reply.status_text,
                    cseq = reply.cseq,
                    "request rejected by server"
                );
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "reply discarded");
                return None;
            }
        };

        match transition {
            Transition::Ready => self.bind_media(),
            Transition::Playing => self.start_receiver(),
            Transition::Paused => self.pause_receiver(),
            Transition::TornDown => self.release_media(),
        }
        Some(transition)
    }

    fn bind_media(&self) {
        let port = self.config.rtp_port;
        match UdpTransport::bind_port(port, self.config.receive_timeout) {
            Ok(socket) => self.media.lock().socket = Some(socket),
            Err(e) => {
                tracing::warn!(port, error = %e, "media bind failed");
                self.renderer.on_bind_failed(port);
            }
        }
    }

    fn start_receiver(&self) {
        let mut media = self.media.lock();
        if media.receiver.is_some() {
            return;
        }
        let Some(socket) = media.socket.take() else {
            tracing::warn!("no media socket, frames will not be received");
            return;
        };
        match MediaReceiver::spawn(
            socket,
            self.renderer.clone(),
            self.frames_received.clone(),
            self.config.receive_timeout,
        ) {
            Ok(receiver) => media.receiver = Some(receiver),
            Err(e) => tracing::error!(error = %e, "failed to start receiver"),
        }
    }

    fn pause_receiver(&self) {
        // Joined outside the lock; the renderer may call back into the client.
        let receiver = self.media.lock().receiver.take();
        if let Some(receiver) = receiver {
            let socket = receiver.pause();
            self.media.lock().socket = socket;
        }
    }

    fn release_media(&self) {
        let Media { socket, receiver } = std::mem::take(&mut *self.media.lock());
        if let Some(receiver) = receiver {
            receiver.close();
        }
        drop(socket);
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}
