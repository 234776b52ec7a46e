use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Result, StreamError};

/// UDP socket carrying RTP media.
///
/// The server binds an ephemeral socket (`0.0.0.0:0`) per session and sends
/// to the client address recorded at SETUP. The client binds its configured
/// port with a read timeout so its receive loop can observe stop signals.
///
/// This layer is address-only and knows nothing about sessions. The socket
/// is closed when the value is dropped.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral UDP socket for outbound RTP.
    pub fn bind() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self { socket })
    }

    /// Bind `port` on all interfaces for inbound RTP.
    ///
    /// Fails with [`StreamError::BindFailed`].
    pub fn bind_port(port: u16, read_timeout: Duration) -> Result<Self> {
        let bind = |port: u16| -> std::io::Result<UdpSocket> {
            let socket = UdpSocket::bind(("0.0.0.0", port))?;
            socket.set_read_timeout(Some(read_timeout))?;
            Ok(socket)
        };
        let socket = bind(port).map_err(|source| StreamError::BindFailed { port, source })?;
        tracing::debug!(port, "media socket bound");
        Ok(Self { socket })
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    /// Receive one datagram. Timeouts surface as `WouldBlock` or `TimedOut`.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.socket.recv(buf)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Whether an I/O error is a read timeout rather than a socket failure.
pub fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
