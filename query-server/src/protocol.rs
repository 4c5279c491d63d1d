//! Query framing for the diagnostic service.
//!
//! Queries and replies are single datagrams of tag-framed text:
//! - `<echo>BODY</echo>` → `<reply>BODY</reply>`
//! - `<loadavg/>`        → `<replyLoadAvg>L1:L5:L15</replyLoadAvg>`
//! - `<shutdown/>`       → echoed back, then the server stops
//! - anything else       → `<error>ORIGINAL</error>`
//!
//! There is no length prefix and no checksum beyond what the transport
//! provides; one datagram carries one complete query or reply.

// ============================================================================
// Tags
// ============================================================================

/// Opening tag for echo queries
const ECHO_OPEN: &str = "<echo>";

/// Closing tag for echo queries
const ECHO_CLOSE: &str = "</echo>";

/// Load average query (exact match)
const LOADAVG_QUERY: &str = "<loadavg/>";

/// Shutdown command (exact match)
const SHUTDOWN_QUERY: &str = "<shutdown/>";

// ============================================================================
// Query Parsing
// ============================================================================

/// A parsed query datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `<echo>BODY</echo>` — body comes back in a `<reply>` wrapper
    Echo(String),
    /// `<loadavg/>` — host load average request
    LoadAvg,
    /// `<shutdown/>` — acknowledge, then stop the server
    Shutdown,
    /// Anything that does not match a known tag
    Malformed(String),
}

/// Decode a raw datagram into query text.
///
/// Sender framings differ: some clients NUL-terminate the payload, others
/// append a newline. Both are stripped here before parsing.
pub fn decode(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Parse decoded query text into a [`Query`].
pub fn parse(text: &str) -> Query {
    if text == LOADAVG_QUERY {
        return Query::LoadAvg;
    }
    if text == SHUTDOWN_QUERY {
        return Query::Shutdown;
    }
    if let Some(body) = text
        .strip_prefix(ECHO_OPEN)
        .and_then(|rest| rest.strip_suffix(ECHO_CLOSE))
    {
        return Query::Echo(body.to_string());
    }
    Query::Malformed(text.to_string())
}

// ============================================================================
// Reply Building
// ============================================================================

/// Build the `<reply>` wrapper for an echo body.
pub fn echo_reply(body: &str) -> String {
    format!("<reply>{}</reply>", body)
}

/// Build the load average reply.
///
/// Each value carries six fractional digits, colon-separated, in
/// 1/5/15-minute order.
pub fn loadavg_reply(load: [f64; 3]) -> String {
    format!(
        "<replyLoadAvg>{:.6}:{:.6}:{:.6}</replyLoadAvg>",
        load[0], load[1], load[2]
    )
}

/// Wrap an unrecognized or failed query in an `<error>` tag.
pub fn error_reply(original: &str) -> String {
    format!("<error>{}</error>", original)
}

// ============================================================================
// Tests
// ============================================================================
