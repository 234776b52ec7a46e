use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::media::packetizer::DEFAULT_MAX_PAYLOAD;
use crate::session::DEFAULT_CLIENT_RTP_PORT;
use crate::session::sender::DEFAULT_FRAME_INTERVAL;
use crate::transport::tcp;

/// Server-level configuration used by protocol handlers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Media port assumed when SETUP carries no usable `Transport` header.
    pub default_client_port: u16,
    /// Maximum RTP payload bytes per packet.
    pub max_payload: usize,
    /// Time between frames while playing (25 fps by default).
    pub frame_interval: Duration,
    /// Directory that relative SETUP filenames resolve against.
    /// When `None`, filenames are used as given.
    pub media_root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_client_port: DEFAULT_CLIENT_RTP_PORT,
            max_payload: DEFAULT_MAX_PAYLOAD,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            media_root: None,
        }
    }
}

impl ServerConfig {
    /// Path of the file a SETUP request names.
    pub fn resolve_media_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        match &self.media_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Streaming server orchestrator.
///
/// Accepts control connections and hands each one to its own thread with
/// its own session state machine
/// ([`MethodHandler`](crate::protocol::MethodHandler)). Media is sent from a
/// per-session sender thread started on PLAY.
pub struct Server {
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<()>>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    /// Create a server with custom streaming configuration.
    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            accept_thread: None,
            config: Arc::new(config),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let config = self.config.clone();

        tracing::info!(addr = %local_addr, "server listening");

        self.accept_thread = Some(thread::spawn(move || {
            tcp::accept_loop(listener, config, running);
        }));

        Ok(())
    }

    /// Stop accepting connections.
    ///
    /// Connections already open finish their current request and exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to, once started.
    ///
    /// Resolves port 0 to the port actually assigned.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the server's streaming configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}
