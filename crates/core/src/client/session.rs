use crate::error::{Result, StreamError};
use crate::protocol::{Method, RtspRequest, RtspResponse};
use crate::session::{SessionState, TransportHeader};

/// State change caused by an accepted 200 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// SETUP acknowledged: bind the media socket.
    Ready,
    /// PLAY acknowledged: start receiving.
    Playing,
    /// PAUSE acknowledged: stop receiving, keep the socket.
    Paused,
    /// TEARDOWN acknowledged: close the media socket and the connection.
    TornDown,
}

/// Client-side control state machine, free of any I/O.
///
/// [`request`](Self::request) builds the next request if the local state
/// guard allows it; [`handle_reply`](Self::handle_reply) validates a reply
/// against the outstanding request and reports the resulting transition.
///
/// A reply is accepted only if its CSeq equals the last one sent and, once a
/// session id has been learned, its `Session` matches it. The first reply
/// that carries a session id defines it.
#[derive(Debug, Clone)]
pub struct ClientSession {
    filename: String,
    rtp_port: u16,
    state: SessionState,
    cseq: u32,
    session_id: Option<String>,
    pending: Option<Method>,
    teardown_acked: bool,
}

impl ClientSession {
    pub fn new(filename: &str, rtp_port: u16) -> Self {
        Self {
            filename: filename.to_string(),
            rtp_port,
            state: SessionState::Init,
            cseq: 0,
            session_id: None,
            pending: None,
            teardown_acked: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// CSeq of the most recently sent request (0 before the first).
    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Request still awaiting its reply.
    pub fn pending(&self) -> Option<Method> {
        self.pending
    }

    pub fn teardown_acked(&self) -> bool {
        self.teardown_acked
    }

    pub fn rtp_port(&self) -> u16 {
        self.rtp_port
    }

    /// Whether the current state lets `method` be sent.
    pub fn allows(&self, method: Method) -> bool {
        matches!(
            (method, self.state),
            (Method::Setup, SessionState::Init)
                | (Method::Play, SessionState::Ready)
                | (Method::Pause, SessionState::Playing)
                | (Method::Teardown, SessionState::Ready | SessionState::Playing)
        )
    }

    /// Build the next request, advancing the CSeq.
    ///
    /// Returns `None`, leaving all state untouched, if the guard refuses it.
    pub fn request(&mut self, method: Method) -> Option<RtspRequest> {
        if !self.allows(method) {
            tracing::debug!(%method, state = %self.state, "request refused by state guard");
            return None;
        }

        self.cseq += 1;
        self.pending = Some(method);

        let request = RtspRequest::new(method, &self.filename, self.cseq);
        let request = match method {
            Method::Setup => {
                let transport = TransportHeader {
                    client_rtp_port: self.rtp_port,
                };
                request.add_header("Transport", &transport.to_header_value())
            }
            _ => request.add_header("Session", self.session_id.as_deref().unwrap_or("0")),
        };
        Some(request)
    }

    /// Validate a reply and apply its transition.
    ///
    /// Errors are [`StreamError::SequenceMismatch`],
    /// [`StreamError::SessionMismatch`] and [`StreamError::ProtocolState`]
    /// (no request outstanding); the caller discards the reply. A matching
    /// non-200 reply consumes the outstanding request without a transition.
    pub fn handle_reply(&mut self, reply: &RtspResponse) -> Result<Option<Transition>> {
        if reply.cseq != self.cseq {
            return Err(StreamError::SequenceMismatch {
                expected: self.cseq,
                received: reply.cseq,
            });
        }

        match (&self.session_id, reply.session()) {
            (None, Some(received)) => {
                tracing::debug!(session_id = received, "session id learned");
                self.session_id = Some(received.to_string());
            }
            (Some(expected), received) if received != Some(expected.as_str()) => {
                return Err(StreamError::SessionMismatch {
                    expected: expected.clone(),
                    received: received.unwrap_or_default().to_string(),
                });
            }
            _ => {}
        }

        let Some(method) = self.pending.take() else {
            return Err(StreamError::ProtocolState {
                method: "reply",
                state: self.state.as_str(),
            });
        };

        if !reply.is_ok() {
            return Ok(None);
        }

        let (state, transition) = match method {
            Method::Setup => (SessionState::Ready, Transition::Ready),
            Method::Play => (SessionState::Playing, Transition::Playing),
            Method::Pause => (SessionState::Ready, Transition::Paused),
            Method::Teardown => {
                self.teardown_acked = true;
                (SessionState::Init, Transition::TornDown)
            }
        };

        tracing::debug!(%method, old_state = %self.state, new_state = %state, "state transition");
        self.state = state;
        Ok(Some(transition))
    }
}
