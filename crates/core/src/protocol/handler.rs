use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::error::{Result, StreamError};
use crate::media::{FrameStore, MjpegPacketizer};
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::response::RtspResponse;
use crate::server::ServerConfig;
use crate::session::transport::TransportHeader;
use crate::session::{Session, SessionState, generate_session_id};

/// Server-side state machine for a single control connection.
///
/// Accepted method/state pairs:
///
/// | Method | From | To |
/// |--------|------|----|
/// | SETUP | Init | Ready (200) or Init (404) |
/// | PLAY | Ready | Playing (200) or Ready (500) |
/// | PAUSE | Playing | Ready |
/// | TEARDOWN | Ready, Playing | Init |
///
/// Any other pair is ignored: [`handle`](Self::handle) returns `None` and no
/// reply is written.
pub struct MethodHandler {
    session: Session,
    client_ip: IpAddr,
    config: Arc<ServerConfig>,
}

impl MethodHandler {
    pub fn new(client_addr: SocketAddr, config: Arc<ServerConfig>) -> Self {
        MethodHandler {
            session: Session::new(),
            client_ip: client_addr.ip(),
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Apply a request. Returns the reply to send, or `None` to stay silent.
    pub fn handle(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        match self.dispatch(request) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::debug!(cseq = request.cseq, error = %e, "request ignored");
                None
            }
        }
    }

    fn dispatch(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let cseq = request.cseq;

        match (request.method, self.session.state()) {
            (Method::Setup, SessionState::Init) => Ok(self.handle_setup(cseq, request)),
            (Method::Play, SessionState::Ready) => Ok(self.handle_play(cseq, request)),
            (Method::Pause, SessionState::Playing) => Ok(self.handle_pause(cseq, request)),
            (Method::Teardown, SessionState::Ready | SessionState::Playing) => {
                Ok(self.handle_teardown(cseq, request))
            }
            (method, state) => Err(StreamError::ProtocolState {
                method: method.as_str(),
                state: state.as_str(),
            }),
        }
    }

    fn handle_setup(&mut self, cseq: u32, request: &RtspRequest) -> RtspResponse {
        let path = self.config.resolve_media_path(&request.filename);

        let frames = match FrameStore::load(&path) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(%cseq, error = %e, "SETUP for unavailable file");
                return RtspResponse::not_found(cseq);
            }
        };

        let client_rtp_port = request
            .get_header("Transport")
            .and_then(TransportHeader::parse)
            .map(|t| t.client_rtp_port)
            .unwrap_or_else(|| {
                tracing::warn!(
                    %cseq,
                    default = self.config.default_client_port,
                    "SETUP without usable Transport header"
                );
                self.config.default_client_port
            });

        let session_id = generate_session_id();
        let client_rtp_addr = SocketAddr::new(self.client_ip, client_rtp_port);
        let packetizer = MjpegPacketizer::with_random_ssrc(self.config.max_payload);
        let frame_count = frames.len();

        self.session
            .establish(session_id.clone(), frames, packetizer, client_rtp_addr);

        tracing::info!(
            session_id,
            filename = %request.filename,
            frames = frame_count,
            client_rtp = %client_rtp_addr,
            "session created via SETUP"
        );

        RtspResponse::ok(cseq).add_header("Session", &session_id)
    }

    fn handle_play(&mut self, cseq: u32, request: &RtspRequest) -> RtspResponse {
        self.check_session(request);
        let session_id = self.session.id().unwrap_or_default().to_string();

        let started = self.session.media_socket().and_then(|socket| {
            self.session.set_state(SessionState::Playing);
            self.session
                .start_sender(socket, self.config.frame_interval)
        });

        if let Err(e) = started {
            tracing::error!(session_id, error = %e, "failed to start media delivery");
            self.session.set_state(SessionState::Ready);
            return RtspResponse::connection_error(cseq).add_header("Session", &session_id);
        }

        tracing::info!(session_id, "session started playing");
        RtspResponse::ok(cseq).add_header("Session", &session_id)
    }

    fn handle_pause(&mut self, cseq: u32, request: &RtspRequest) -> RtspResponse {
        self.check_session(request);
        self.session.stop_sender();
        self.session.set_state(SessionState::Ready);

        let session_id = self.session.id().unwrap_or_default();
        tracing::info!(
            session_id,
            frame = self.session.playback().frame_index,
            "session paused"
        );
        RtspResponse::ok(cseq).add_header("Session", session_id)
    }

    fn handle_teardown(&mut self, cseq: u32, request: &RtspRequest) -> RtspResponse {
        self.check_session(request);
        let session_id = self.session.id().unwrap_or_default().to_string();
        self.session.release();

        tracing::info!(session_id, "session terminated via TEARDOWN");
        RtspResponse::ok(cseq).add_header("Session", &session_id)
    }

    /// Stop streaming and release the media socket (connection closed).
    pub fn shutdown(&mut self) {
        if self.session.state() != SessionState::Init {
            tracing::info!(session_id = ?self.session.id(), "cleaning up session on disconnect");
            self.session.release();
        }
    }

    /// Session ids are not enforced, only reported.
    fn check_session(&self, request: &RtspRequest) {
        if let (Some(expected), Some(received)) = (self.session.id(), request.session())
            && expected != received
        {
            tracing::warn!(expected, received, method = %request.method, "Session header mismatch");
        }
    }
}

impl Drop for MethodHandler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
