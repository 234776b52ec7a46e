use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::protocol::{Method, MethodHandler, RtspRequest};
use crate::server::ServerConfig;
use crate::session::SessionState;

/// Read one control message.
///
/// A message ends at a blank line, or as soon as everything the peer has
/// written so far is consumed, so peers that send one message per write
/// need no terminator. Leading blank lines are skipped. Returns `Ok(None)`
/// on end of stream with nothing buffered; a partial message cut off by end
/// of stream is returned as-is.
pub fn read_message<R: Read>(reader: &mut BufReader<R>) -> std::io::Result<Option<String>> {
    let mut message = Vec::new();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(into_message(message));
        }

        let (line, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        let len = line.len();
        let at_line_start = message.is_empty() || message.ends_with(b"\n");
        let blank = complete && at_line_start && line.iter().all(|&b| b == b'\r' || b == b'\n');

        if !blank {
            message.extend_from_slice(line);
        }
        reader.consume(len);

        if blank && !message.is_empty() {
            return Ok(into_message(message));
        }
        if reader.buffer().is_empty() && !message.is_empty() {
            return Ok(into_message(message));
        }
    }
}

fn into_message(message: Vec<u8>) -> Option<String> {
    (!message.is_empty()).then(|| String::from_utf8_lossy(&message).into_owned())
}

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(listener: TcpListener, config: Arc<ServerConfig>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let r = running.clone();
                let c = config.clone();
                thread::spawn(move || {
                    Connection::handle(stream, c, r);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single control connection carrying one streaming session.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    handler: MethodHandler,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    pub fn handle(stream: TcpStream, config: Arc<ServerConfig>, running: Arc<AtomicBool>) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::info!(%peer_addr, "client connected");

        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            handler: MethodHandler::new(peer_addr, config),
            peer_addr,
        };

        let reason = conn.run(&running);
        conn.handler.shutdown();

        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// Request/reply loop. Returns the reason for exiting.
    fn run(&mut self, running: &Arc<AtomicBool>) -> &'static str {
        while running.load(Ordering::SeqCst) {
            let request_text = match read_message(&mut self.reader) {
                Ok(Some(text)) => text,
                Ok(None) => return "connection closed by client",
                Err(_) => return "read error",
            };

            let request = match RtspRequest::parse(&request_text) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                    continue;
                }
            };

            tracing::debug!(
                peer = %self.peer_addr,
                method = %request.method,
                filename = %request.filename,
                cseq = request.cseq,
                "request"
            );

            let Some(response) = self.handler.handle(&request) else {
                continue;
            };

            tracing::debug!(
                peer = %self.peer_addr,
                status = response.status_code,
                cseq = response.cseq,
                "response"
            );

            if self
                .writer
                .write_all(response.serialize().as_bytes())
                .is_err()
            {
                return "write error";
            }

            if request.method == Method::Teardown && self.handler.state() == SessionState::Init {
                return "session torn down";
            }
        }

        "server shutting down"
    }
}
