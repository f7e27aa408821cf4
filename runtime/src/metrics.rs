//! Prometheus metrics for the transaction runtime.
//!
//! The runtime reports how the optimistic store behaves under load: commits and
//! their latency, version conflicts (each one costs a re-run), and transactions
//! that gave up. Domain crates add their own descriptions through
//! [`MetricsServer::with_descriptions`].
//!
//! ```rust,no_run
//! use conference_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const COMMITTED: &str = "transactions_committed_total";
const CONFLICTS: &str = "transaction_conflicts_total";
const EXHAUSTED: &str = "transactions_exhausted_total";
const DURATION: &str = "transaction_duration_seconds";

/// Latency buckets in seconds; in-memory commits land in the first few.
const DURATION_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// The Prometheus exporter could not be set up.
#[derive(Error, Debug)]
#[error("Metrics exporter setup failed: {0}")]
pub struct MetricsError(String);

impl From<BuildError> for MetricsError {
    fn from(error: BuildError) -> Self {
        Self(error.to_string())
    }
}

/// Installs the global Prometheus recorder and renders snapshots.
pub struct MetricsServer {
    addr: SocketAddr,
    describers: Vec<fn()>,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// A server advertising `addr` as its scrape address.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            describers: vec![describe_transaction_metrics],
            handle: None,
        }
    }

    /// Also run `describe` when the recorder starts.
    #[must_use]
    pub fn with_descriptions(mut self, describe: fn()) -> Self {
        self.describers.push(describe);
        self
    }

    /// Install the recorder and publish every registered description.
    ///
    /// A recorder installed earlier in the process (common in tests) is left in
    /// place; this server then has nothing to render.
    ///
    /// # Errors
    ///
    /// [`MetricsError`] if the exporter cannot be built.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(DURATION.to_string()), DURATION_BUCKETS)?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
            }
            Err(BuildError::FailedToSetGlobalRecorder(_)) => {
                tracing::warn!("Metrics recorder already installed, reusing it");
            }
            Err(error) => return Err(error.into()),
        }

        for describe in &self.describers {
            describe();
        }
        Ok(())
    }

    /// Current metrics in the Prometheus text format, if this server owns the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_transaction_metrics() {
    describe_counter!(COMMITTED, "Transactions committed");
    describe_counter!(CONFLICTS, "Commits rejected by a version conflict");
    describe_counter!(EXHAUSTED, "Transactions that ran out of retry budget");
    describe_histogram!(DURATION, "Transaction latency including re-runs");
}

/// Counters and latency for [`crate::TransactionExecutor`], labelled by transaction name.
pub struct TransactionMetrics;

impl TransactionMetrics {
    /// A transaction committed after `elapsed`.
    pub fn record_commit(name: &'static str, elapsed: Duration) {
        counter!(COMMITTED, "transaction" => name).increment(1);
        histogram!(DURATION, "transaction" => name).record(elapsed.as_secs_f64());
    }

    /// A commit lost a version race.
    pub fn record_conflict(name: &'static str) {
        counter!(CONFLICTS, "transaction" => name).increment(1);
    }

    /// A transaction gave up.
    pub fn record_exhausted(name: &'static str) {
        counter!(EXHAUSTED, "transaction" => name).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unstarted_server_renders_nothing() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.render().is_none());
    }

    #[test]
    fn started_server_renders_transaction_counters() {
        fn describe_seats() {
            describe_counter!("seats_sample_total", "Sample counter");
        }

        let mut server =
            MetricsServer::new("127.0.0.1:0".parse().unwrap()).with_descriptions(describe_seats);
        server.start().unwrap();

        TransactionMetrics::record_commit("register", Duration::from_millis(3));
        TransactionMetrics::record_conflict("register");

        // Only the first server in the process owns the recorder.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains(COMMITTED));
            assert!(rendered.contains(CONFLICTS));
        }
    }
}
