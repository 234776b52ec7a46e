use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mjpeg_rtsp::media::MAX_PAYLOAD;
use mjpeg_rtsp::{Client, ClientConfig, Renderer, Server, ServerConfig};
use parking_lot::Mutex;

#[derive(Parser)]
#[command(
    name = "mjpeg-rtsp",
    about = "Stream motion-JPEG files over an RTSP-style control channel"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MJPEG files to clients
    Serve {
        /// Bind address (host:port)
        #[arg(long, short, default_value = "0.0.0.0:8554")]
        bind: String,
        /// Directory that requested filenames resolve against
        #[arg(long)]
        media_root: Option<PathBuf>,
        /// Maximum RTP payload bytes per packet (at most one UDP datagram)
        #[arg(
            long,
            default_value_t = 1400,
            value_parser = clap::value_parser!(u16).range(1..=MAX_PAYLOAD as i64)
        )]
        max_payload: u16,
        /// Frames per second
        #[arg(long, default_value_t = 25)]
        fps: u32,
    },
    /// Connect to a server and control playback from stdin
    Play {
        server: String,
        port: u16,
        /// Local UDP port for media
        rtp_port: u16,
        file: String,
        /// Where to write the latest frame (default: cache-<session>.jpg)
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            bind,
            media_root,
            max_payload,
            fps,
        } => serve(&bind, media_root, max_payload, fps),
        Command::Play {
            server,
            port,
            rtp_port,
            file,
            cache,
        } => play(&server, port, rtp_port, &file, cache),
    }
}

fn serve(bind: &str, media_root: Option<PathBuf>, max_payload: u16, fps: u32) {
    let config = ServerConfig {
        max_payload: usize::from(max_payload),
        frame_interval: Duration::from_secs(1) / fps.max(1),
        media_root,
        ..ServerConfig::default()
    };
    let mut server = Server::with_config(bind, config);

    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {}", e);
        return;
    }

    println!("Streaming server on {}, press Enter to stop", bind);
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);

    server.stop();
}

/// Writes each completed frame over a single cache file.
struct FileRenderer {
    path: Mutex<Option<PathBuf>>,
    written: Mutex<Option<PathBuf>>,
}

impl FileRenderer {
    fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: Mutex::new(path),
            written: Mutex::new(None),
        }
    }

    fn set_path(&self, path: PathBuf) {
        self.path.lock().get_or_insert(path);
    }

    /// Delete the cache file, if a frame was ever written.
    fn remove_cache(&self) {
        let Some(path) = self.written.lock().take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "cache removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove cache"),
        }
    }
}

impl Renderer for FileRenderer {
    fn on_frame_ready(&self, frame: &[u8]) {
        let path = self
            .path
            .lock()
            .clone()
            .unwrap_or_else(|| PathBuf::from("cache.jpg"));
        match std::fs::write(&path, frame) {
            Ok(()) => *self.written.lock() = Some(path),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to write frame"),
        }
    }

    fn on_connection_failed(&self, addr: &str, port: u16) {
        eprintln!("Connection to {}:{} failed", addr, port);
    }

    fn on_bind_failed(&self, port: u16) {
        eprintln!("Unable to bind media port {}", port);
    }
}

fn play(server: &str, port: u16, rtp_port: u16, file: &str, cache: Option<PathBuf>) {
    let renderer = Arc::new(FileRenderer::new(cache));
    let mut client = match Client::connect(
        ClientConfig::new(server, port, rtp_port, file),
        renderer.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("Commands: setup, play, pause, teardown, quit");
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let result = match line.trim() {
            "setup" => client.setup(),
            "play" => client.play(),
            "pause" => client.pause(),
            "teardown" => client.teardown(),
            "quit" | "exit" => break,
            "" => continue,
            other => {
                println!("Unknown command: {}", other);
                continue;
            }
        };

        match result {
            Ok(Some(cseq)) => tracing::debug!(cseq, "request sent"),
            Ok(None) => println!("Not allowed in state {}", client.state()),
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }

        // Replies land asynchronously; give the listener a moment before reporting.
        std::thread::sleep(Duration::from_millis(100));
        if let Some(id) = client.session_id() {
            renderer.set_path(PathBuf::from(format!("cache-{}.jpg", id)));
        }
        println!("State: {}", client.state());

        if client.teardown_acked() {
            break;
        }
    }

    // Stops the receiver first so no frame lands after the cache is removed.
    client.close();
    renderer.remove_cache();
}
