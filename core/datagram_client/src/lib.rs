//! UDP Query Client Core
//!
//! This crate provides the reusable datagram client for the UDP query
//! tools, handling:
//! - Ephemeral-port socket lifecycle (open/close, no reopen)
//! - Fire-and-forget request transmission to a host:port target
//! - Blocking single-datagram receive into a fixed response buffer
//!
//! One client owns one socket and issues at most one outstanding request
//! before reading the reply. Callers that need concurrent requests create
//! one client per request; there is no sharing and no locking.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

// ============================================================================
// Constants
// ============================================================================

/// Maximum reply payload returned by [`UdpClient::receive`], in bytes.
/// Anything beyond this in a single datagram is truncated by the transport,
/// not reported as an error (must match the query server's message buffer).
pub const MAX_RESPONSE_SIZE: usize = 256;

// ============================================================================
// Errors
// ============================================================================

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors reported by [`UdpClient`] operations.
///
/// Every failure surfaces synchronously to the immediate caller; nothing is
/// retried internally and nothing is logged-and-swallowed. The caller
/// decides whether to report or abort.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Datagram socket allocation or binding failed.
    #[error("failed to open datagram socket: {0}")]
    Open(#[source] io::Error),

    /// Operation attempted before `open()` succeeded or after `close()`.
    #[error("socket is not open")]
    NotOpen,

    /// `open()` called while the socket is already open.
    #[error("socket is already open")]
    AlreadyOpen,

    /// Hostname lookup produced no usable address.
    #[error("failed to resolve host '{host}': {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    /// The transport rejected the outgoing datagram.
    #[error("failed to send datagram: {0}")]
    Send(#[source] io::Error),

    /// Socket error while waiting for the reply datagram.
    #[error("failed to receive datagram: {0}")]
    Receive(#[source] io::Error),
}

// ============================================================================
// Client State
// ============================================================================

/// Lifecycle state of a [`UdpClient`].
///
/// The only transitions are `Unopened → Open → Closed`; a closed client
/// cannot be reopened (a new instance is required per exchange attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// `open()` has not been called yet.
    Unopened,
    /// The socket is bound to an ephemeral local port and usable.
    Open,
    /// `close()` released the socket.
    Closed,
}

// ============================================================================
// Client
// ============================================================================

/// A minimal blocking UDP request/response client.
///
/// The intended call sequence is strictly sequential:
///
/// ```ignore
/// let mut client = UdpClient::new();
/// client.open()?;
/// client.send(b"<echo>ping</echo>", "127.0.0.1", 9999)?;
/// let response = client.receive()?; // blocks until a reply arrives
/// UdpClient::print_response(&response);
/// client.close()?;
/// ```
///
/// `receive()` is the only suspension point and it blocks the calling
/// thread with no timeout; if no reply ever arrives the call never returns.
/// That is an accepted limitation of the protocol, not a defect here.
pub struct UdpClient {
    /// The socket handle; `Some` exactly while the state is `Open`.
    socket: Option<UdpSocket>,
    state: ClientState,
}

impl UdpClient {
    /// Create a client with no socket allocated yet.
    pub fn new() -> Self {
        UdpClient {
            socket: None,
            state: ClientState::Unopened,
        }
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Get the ephemeral local address after a successful `open()`.
    /// Returns `None` if the socket is not open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Allocate a connectionless datagram socket bound to an OS-chosen free
    /// local port.
    ///
    /// Fails with [`ClientError::Open`] on any allocation error (no retry),
    /// [`ClientError::AlreadyOpen`] if the client is already open, and
    /// [`ClientError::NotOpen`] on a closed client — there is no transition
    /// back from closed to open.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            ClientState::Open => return Err(ClientError::AlreadyOpen),
            ClientState::Closed => return Err(ClientError::NotOpen),
            ClientState::Unopened => {}
        }

        let socket =
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(ClientError::Open)?;

        if let Ok(addr) = socket.local_addr() {
            log::debug!("Datagram socket bound to {}", addr);
        }

        self.socket = Some(socket);
        self.state = ClientState::Open;
        Ok(())
    }

    /// Send one request datagram containing exactly the bytes of `request`
    /// to `host:port`.
    ///
    /// Fire-and-forget: this returns as soon as the OS accepts the datagram
    /// for transmission and does not wait for any acknowledgment, matching
    /// UDP's unreliable, unordered delivery semantics.
    ///
    /// Fails with [`ClientError::NotOpen`] before `open()` or after
    /// `close()`, [`ClientError::Resolution`] if `host` does not resolve,
    /// and [`ClientError::Send`] on any transport-level failure.
    pub fn send(&self, request: &[u8], host: &str, port: u16) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(ClientError::NotOpen)?;

        let target = resolve(host, port)?;
        let sent = socket.send_to(request, target).map_err(ClientError::Send)?;
        log::trace!("Sent {} bytes to {}", sent, target);

        Ok(())
    }

    /// Block until exactly one datagram arrives, then return its payload
    /// (up to [`MAX_RESPONSE_SIZE`] bytes) decoded lossily as UTF-8.
    ///
    /// There is no timeout: if no reply ever arrives this call blocks
    /// indefinitely. Datagrams larger than the response buffer are silently
    /// truncated by the transport.
    ///
    /// Fails with [`ClientError::NotOpen`] if the socket is not open and
    /// [`ClientError::Receive`] on any socket error during the wait.
    pub fn receive(&self) -> Result<String> {
        let socket = self.socket.as_ref().ok_or(ClientError::NotOpen)?;

        let mut buf = [0u8; MAX_RESPONSE_SIZE];
        let (len, from) = socket.recv_from(&mut buf).map_err(ClientError::Receive)?;
        log::trace!("Received {} bytes from {}", len, from);

        Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
    }

    /// Release the socket resource.
    ///
    /// Closing an already-closed or never-opened client is an error
    /// ([`ClientError::NotOpen`]), not a silent no-op. After a successful
    /// close all further `send`/`receive` calls fail.
    pub fn close(&mut self) -> Result<()> {
        if self.socket.take().is_none() {
            return Err(ClientError::NotOpen);
        }

        self.state = ClientState::Closed;
        log::debug!("Datagram socket closed");
        Ok(())
    }

    /// Print a server reply line to standard output.
    ///
    /// Pure presentation helper for the interactive harness; writing to
    /// stdout is assumed to always succeed.
    pub fn print_response(response: &str) {
        println!("Server response: {}", response);
    }
}

impl Default for UdpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UdpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpClient")
            .field("state", &self.state)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolve `host:port` to the first usable socket address.
fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| ClientError::Resolution {
            host: host.to_string(),
            source: e,
        })?;

    addrs.next().ok_or_else(|| ClientError::Resolution {
        host: host.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    /// Spawn a loopback listener that captures one datagram, replies with
    /// `reply`, and reports the captured request bytes on the channel.
    fn spawn_listener(reply: Vec<u8>) -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
        let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut buf = [0u8; 2048];
            let (len, src) = listener.recv_from(&mut buf).unwrap();
            tx.send(buf[..len].to_vec()).unwrap();
            listener.send_to(&reply, src).unwrap();
        });

        (addr, rx)
    }

    #[test]
    fn test_new_client_is_unopened() {
        let client = UdpClient::new();
        assert_eq!(client.state(), ClientState::Unopened);
        assert!(client.local_addr().is_none());
    }

    #[test]
    fn test_send_before_open_fails() {
        let client = UdpClient::new();
        let result = client.send(b"ping", "127.0.0.1", 9999);
        assert!(matches!(result, Err(ClientError::NotOpen)));
    }

    #[test]
    fn test_receive_before_open_fails() {
        let client = UdpClient::new();
        assert!(matches!(client.receive(), Err(ClientError::NotOpen)));
    }

    #[test]
    fn test_close_before_open_fails() {
        let mut client = UdpClient::new();
        assert!(matches!(client.close(), Err(ClientError::NotOpen)));
        // A failed close leaves the client unopened, not closed
        assert_eq!(client.state(), ClientState::Unopened);
    }

    #[test]
    fn test_open_binds_ephemeral_port() {
        let mut client = UdpClient::new();
        client.open().unwrap();
        assert_eq!(client.state(), ClientState::Open);

        let addr = client.local_addr().expect("open client has a local addr");
        assert_ne!(addr.port(), 0);

        client.close().unwrap();
    }

    #[test]
    fn test_open_twice_fails() {
        let mut client = UdpClient::new();
        client.open().unwrap();
        assert!(matches!(client.open(), Err(ClientError::AlreadyOpen)));
        client.close().unwrap();
    }

    #[test]
    fn test_reopen_after_close_fails() {
        let mut client = UdpClient::new();
        client.open().unwrap();
        client.close().unwrap();
        // No transition back from closed to open
        assert!(matches!(client.open(), Err(ClientError::NotOpen)));
    }

    #[test]
    fn test_close_twice_fails() {
        let mut client = UdpClient::new();
        client.open().unwrap();
        client.close().unwrap();
        assert!(matches!(client.close(), Err(ClientError::NotOpen)));
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[test]
    fn test_send_and_receive_after_close_fail() {
        let mut client = UdpClient::new();
        client.open().unwrap();
        client.close().unwrap();

        assert!(matches!(
            client.send(b"ping", "127.0.0.1", 9999),
            Err(ClientError::NotOpen)
        ));
        assert!(matches!(client.receive(), Err(ClientError::NotOpen)));
    }

    #[test]
    fn test_resolution_failure() {
        let mut client = UdpClient::new();
        client.open().unwrap();

        // ".invalid" is reserved (RFC 2606) and never resolves
        let result = client.send(b"ping", "no-such-host.invalid", 9999);
        assert!(matches!(result, Err(ClientError::Resolution { .. })));

        client.close().unwrap();
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        // Request bytes cross the wire untouched, including non-UTF-8
        let request = vec![0x00, 0xff, 0x7f, b'p', b'i', b'n', b'g', 0x80];
        let (addr, captured) = spawn_listener(b"pong".to_vec());

        let mut client = UdpClient::new();
        client.open().unwrap();
        client
            .send(&request, "127.0.0.1", addr.port())
            .unwrap();

        let on_wire = captured.recv().unwrap();
        assert_eq!(on_wire, request);

        let response = client.receive().unwrap();
        assert_eq!(response, "pong");

        client.close().unwrap();
    }

    #[test]
    fn test_receive_truncates_oversized_reply() {
        let (addr, _captured) = spawn_listener(vec![b'a'; 512]);

        let mut client = UdpClient::new();
        client.open().unwrap();
        client.send(b"ping", "127.0.0.1", addr.port()).unwrap();

        // 512-byte reply arrives; only the first 256 bytes survive
        let response = client.receive().unwrap();
        assert_eq!(response.len(), MAX_RESPONSE_SIZE);
        assert!(response.bytes().all(|b| b == b'a'));

        client.close().unwrap();
    }

    #[test]
    fn test_empty_reply_is_empty_string() {
        let (addr, _captured) = spawn_listener(Vec::new());

        let mut client = UdpClient::new();
        client.open().unwrap();
        client.send(b"ping", "127.0.0.1", addr.port()).unwrap();

        assert_eq!(client.receive().unwrap(), "");
        client.close().unwrap();
    }
}
