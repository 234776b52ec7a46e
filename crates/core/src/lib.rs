pub mod client;
pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{Client, ClientConfig, Renderer};
pub use error::{Result, StreamError};
pub use media::{FrameStore, RtpPacket};
pub use server::{Server, ServerConfig};
pub use session::SessionState;
