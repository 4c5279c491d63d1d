//! Lightweight Prometheus-compatible metrics for the query server.
//!
//! Uses atomic counters for lock-free instrumentation. Renders metrics in
//! Prometheus text exposition format; the server writes the rendered block
//! to the log when it shuts down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lightweight Prometheus-compatible metrics for the query server.
pub struct Metrics {
    /// Total datagrams received (counter)
    pub datagrams_received_total: AtomicU64,
    /// Total replies sent (counter)
    pub replies_sent_total: AtomicU64,
    /// Total `<echo>` queries answered (counter)
    pub echo_queries_total: AtomicU64,
    /// Total `<loadavg/>` queries answered (counter)
    pub loadavg_queries_total: AtomicU64,
    /// Total malformed queries wrapped in `<error>` (counter)
    pub malformed_queries_total: AtomicU64,
    /// Total replies dropped because the socket was not writable (counter)
    pub replies_dropped_total: AtomicU64,
    /// Server start time (for uptime calculation)
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            datagrams_received_total: AtomicU64::new(0),
            replies_sent_total: AtomicU64::new(0),
            echo_queries_total: AtomicU64::new(0),
            loadavg_queries_total: AtomicU64::new(0),
            malformed_queries_total: AtomicU64::new(0),
            replies_dropped_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let uptime = self.start_time.elapsed().as_secs();
        format!(
            "# HELP udpq_datagrams_received_total Total datagrams received\n\
             # TYPE udpq_datagrams_received_total counter\n\
             udpq_datagrams_received_total {}\n\
             # HELP udpq_replies_sent_total Total replies sent\n\
             # TYPE udpq_replies_sent_total counter\n\
             udpq_replies_sent_total {}\n\
             # HELP udpq_echo_queries_total Total echo queries answered\n\
             # TYPE udpq_echo_queries_total counter\n\
             udpq_echo_queries_total {}\n\
             # HELP udpq_loadavg_queries_total Total load average queries answered\n\
             # TYPE udpq_loadavg_queries_total counter\n\
             udpq_loadavg_queries_total {}\n\
             # HELP udpq_malformed_queries_total Total malformed queries rejected\n\
             # TYPE udpq_malformed_queries_total counter\n\
             udpq_malformed_queries_total {}\n\
             # HELP udpq_replies_dropped_total Total replies dropped on a busy socket\n\
             # TYPE udpq_replies_dropped_total counter\n\
             udpq_replies_dropped_total {}\n\
             # HELP udpq_uptime_seconds Server uptime in seconds\n\
             # TYPE udpq_uptime_seconds gauge\n\
             udpq_uptime_seconds {}\n",
            self.datagrams_received_total.load(Ordering::Relaxed),
            self.replies_sent_total.load(Ordering::Relaxed),
            self.echo_queries_total.load(Ordering::Relaxed),
            self.loadavg_queries_total.load(Ordering::Relaxed),
            self.malformed_queries_total.load(Ordering::Relaxed),
            self.replies_dropped_total.load(Ordering::Relaxed),
            uptime,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default_zero() {
        let m = Metrics::new();
        assert_eq!(m.datagrams_received_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.replies_sent_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.echo_queries_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.loadavg_queries_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.malformed_queries_total.load(Ordering::Relaxed), 0);
        assert_eq!(m.replies_dropped_total.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_metrics_render_format() {
        let m = Metrics::new();
        m.datagrams_received_total.fetch_add(7, Ordering::Relaxed);
        m.echo_queries_total.fetch_add(5, Ordering::Relaxed);

        let output = m.render();
        assert!(output.contains("udpq_datagrams_received_total 7"));
        assert!(output.contains("udpq_echo_queries_total 5"));
        assert!(output.contains("udpq_replies_sent_total 0"));
        assert!(output.contains("# TYPE udpq_uptime_seconds gauge"));
    }

    #[test]
    fn test_metrics_counter_increments() {
        let m = Metrics::new();
        m.replies_sent_total.fetch_add(3, Ordering::Relaxed);
        m.malformed_queries_total.fetch_add(2, Ordering::Relaxed);
        m.replies_dropped_total.fetch_add(1, Ordering::Relaxed);

        let output = m.render();
        assert!(output.contains("udpq_replies_sent_total 3"));
        assert!(output.contains("udpq_malformed_queries_total 2"));
        assert!(output.contains("udpq_replies_dropped_total 1"));
    }

    #[test]
    fn test_metrics_uptime_present() {
        let m = Metrics::new();
        // Just created, uptime rounds down to zero
        assert!(m.render().contains("udpq_uptime_seconds 0"));
    }
}
