//! UDP Query Client
//!
//! An interactive harness around the reusable datagram client that:
//! - Prompts for server host, port, and request text on stdin
//! - Opens a datagram socket on an ephemeral local port
//! - Sends the request and blocks for a single reply
//! - Prints the reply and closes the socket
//!
//! Errors from any step abort the exchange and surface on stderr; nothing
//! is retried.

use std::io::{self, BufRead, Write};

use datagram_client::UdpClient;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let host = prompt(&mut lines, "Server host")?;
    let port: u16 = prompt(&mut lines, "Port")?.parse()?;
    let request = prompt(&mut lines, "Request")?;

    log::info!("Querying {}:{}", host, port);

    let mut client = UdpClient::new();
    client.open()?;
    client.send(request.as_bytes(), &host, port)?;

    // Blocks until the server replies; there is no receive timeout, so a
    // silent server leaves this waiting indefinitely.
    let response = client.receive()?;

    UdpClient::print_response(&response);
    client.close()?;

    Ok(())
}

/// Print a prompt label and read one trimmed line from stdin.
fn prompt(
    lines: &mut io::Lines<io::StdinLock<'_>>,
    label: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let line = lines.next().ok_or("unexpected end of input")??;
    Ok(line.trim().to_string())
}
