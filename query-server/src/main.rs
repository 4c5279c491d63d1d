//! UDP Diagnostic Query Server
//!
//! A single-socket UDP service that:
//! - Answers `<echo>BODY</echo>` queries with `<reply>BODY</reply>`
//! - Reports the host load average for `<loadavg/>`
//! - Wraps unrecognized queries in `<error>...</error>`
//! - Acknowledges `<shutdown/>`, then stops accepting queries
//!
//! All traffic is served on one thread by a mio event loop; each query is
//! answered synchronously to the datagram's source address. SIGTERM and
//! SIGINT drain the loop the same way `<shutdown/>` does.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};
use signal_hook::consts::{SIGINT, SIGTERM};

mod metrics;
mod protocol;
mod system;

use metrics::Metrics;
use protocol::Query;

// ============================================================================
// Constants
// ============================================================================

/// Maximum query/reply payload size (must match the client's response buffer)
const MAX_MESSAGE_SIZE: usize = 256;

/// Default server port (the port the client test scenarios use)
const DEFAULT_PORT: u16 = 9999;

/// mio token for the UDP socket
const SOCKET_TOKEN: Token = Token(0);

/// Poll timeout so shutdown flags are noticed between datagrams
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    // Parse command line arguments (port 0 binds dynamically)
    let args: Vec<String> = std::env::args().collect();
    let port = if args.len() > 1 {
        args[1].parse().unwrap_or(DEFAULT_PORT)
    } else {
        DEFAULT_PORT
    };

    log::info!("UDP query server starting...");
    log::info!(
        "  Host: {}",
        system::hostname().unwrap_or_else(|| "<unknown>".to_string())
    );
    log::info!("  Port: {}", port);

    // Create server and run
    let mut server = Server::new(port)?;
    server.run()
}

// ============================================================================
// Server Structure
// ============================================================================

struct Server {
    /// mio poll instance
    poll: Poll,
    /// UDP socket
    socket: UdpSocket,
    /// Query/reply counters
    metrics: Metrics,
    /// Receive buffer; longer datagrams are truncated by the transport
    recv_buf: [u8; MAX_MESSAGE_SIZE],
    /// Set by `<shutdown/>` or a termination signal
    shutdown: Arc<AtomicBool>,
}

impl Server {
    fn new(port: u16) -> Result<Self, Box<dyn std::error::Error>> {
        let poll = Poll::new()?;
        let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
        let mut socket = UdpSocket::bind(addr)?;

        // Register socket with poll
        poll.registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)?;

        // Termination signals set the shutdown flag; the bounded poll
        // timeout guarantees the loop sees it
        let shutdown = Arc::new(AtomicBool::new(false));
        for signal in [SIGTERM, SIGINT] {
            signal_hook::flag::register(signal, Arc::clone(&shutdown))?;
        }

        Ok(Server {
            poll,
            socket,
            metrics: Metrics::new(),
            recv_buf: [0u8; MAX_MESSAGE_SIZE],
            shutdown,
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Server listening on {}", self.socket.local_addr()?);

        let mut events = Events::with_capacity(64);

        while !self.shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            // Process socket events
            for event in events.iter() {
                if event.token() == SOCKET_TOKEN {
                    self.process_socket()?;
                }
            }
        }

        log::info!("Server shutting down");
        log::info!("Final metrics:\n{}", self.metrics.render());
        Ok(())
    }

    /// Drain and answer every pending datagram on the socket.
    fn process_socket(&mut self) -> io::Result<()> {
        loop {
            let (len, from) = match self.socket.recv_from(&mut self.recv_buf) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            };

            self.metrics
                .datagrams_received_total
                .fetch_add(1, Ordering::Relaxed);

            let text = protocol::decode(&self.recv_buf[..len]);
            self.handle_query(&text, from)?;
        }

        Ok(())
    }

    /// Answer a single decoded query; the reply goes back to `from`.
    fn handle_query(&mut self, text: &str, from: SocketAddr) -> io::Result<()> {
        log::info!("Incoming query from {}: {}", from, text);

        let reply = match protocol::parse(text) {
            Query::Echo(body) => {
                self.metrics
                    .echo_queries_total
                    .fetch_add(1, Ordering::Relaxed);
                protocol::echo_reply(&body)
            }
            Query::LoadAvg => {
                self.metrics
                    .loadavg_queries_total
                    .fetch_add(1, Ordering::Relaxed);
                match system::load_average() {
                    Some(load) => protocol::loadavg_reply(load),
                    None => {
                        // A failed platform query never kills the server
                        log::warn!("Load average unavailable on this host");
                        protocol::error_reply(text)
                    }
                }
            }
            Query::Shutdown => {
                log::info!("Shutdown requested by {}", from);
                self.shutdown.store(true, Ordering::Relaxed);
                // Acknowledged by echoing the command back before stopping
                text.to_string()
            }
            Query::Malformed(original) => {
                self.metrics
                    .malformed_queries_total
                    .fetch_add(1, Ordering::Relaxed);
                protocol::error_reply(&original)
            }
        };

        match self.socket.send_to(reply.as_bytes(), from) {
            Ok(_) => {
                self.metrics
                    .replies_sent_total
                    .fetch_add(1, Ordering::Relaxed);
                log::info!("Outgoing reply to {}: {}", from, reply);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.metrics
                    .replies_dropped_total
                    .fetch_add(1, Ordering::Relaxed);
                log::warn!("Socket not writable, dropping reply to {}", from);
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }
}
