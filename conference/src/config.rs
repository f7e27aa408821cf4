//! Configuration management for the registration core.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Missing or unparseable values fall back to the default.

use conference_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prometheus exporter configuration
    pub metrics: MetricsConfig,
    /// Optimistic transaction retry budget
    pub transactions: TransactionConfig,
    /// Nearly-sold-out announcement configuration
    pub announcements: AnnouncementConfig,
    /// Wishlist maintenance configuration
    pub wishlist: WishlistConfig,
    /// Log filter (trace, debug, info, warn, error or an `EnvFilter` directive)
    pub log_level: String,
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to start the exporter
    pub enabled: bool,
    /// Metrics server host (for Prometheus scraping)
    pub host: String,
    /// Metrics server port
    pub port: u16,
}

/// Retry budget for optimistic transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap, in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub multiplier: f64,
}

/// Nearly-sold-out announcement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    /// Conferences with `0 < seats_available <= seat_threshold` are announced
    pub seat_threshold: u32,
}

/// Wishlist maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistConfig {
    /// Profiles updated per sweep batch
    pub sweep_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig {
                enabled: true,
                host: "0.0.0.0".to_string(),
                port: 9090,
            },
            transactions: TransactionConfig {
                max_retries: 5,
                initial_delay_ms: 10,
                max_delay_ms: 1000,
                multiplier: 2.0,
            },
            announcements: AnnouncementConfig { seat_threshold: 5 },
            wishlist: WishlistConfig {
                sweep_batch_size: 100,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            metrics: MetricsConfig {
                enabled: env::var("METRICS_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.metrics.enabled),
                host: env::var("METRICS_HOST").unwrap_or(defaults.metrics.host),
                port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.metrics.port),
            },
            transactions: TransactionConfig {
                max_retries: env::var("TX_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.transactions.max_retries),
                initial_delay_ms: env::var("TX_INITIAL_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.transactions.initial_delay_ms),
                max_delay_ms: env::var("TX_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.transactions.max_delay_ms),
                multiplier: env::var("TX_BACKOFF_MULTIPLIER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.transactions.multiplier),
            },
            announcements: AnnouncementConfig {
                seat_threshold: env::var("ANNOUNCEMENT_SEAT_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.announcements.seat_threshold),
            },
            wishlist: WishlistConfig {
                sweep_batch_size: env::var("WISHLIST_SWEEP_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|&size| size > 0)
                    .unwrap_or(defaults.wishlist.sweep_batch_size),
            },
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Retry policy for the transaction executor.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.transactions.max_retries)
            .initial_delay(Duration::from_millis(self.transactions.initial_delay_ms))
            .max_delay(Duration::from_millis(self.transactions.max_delay_ms))
            .multiplier(self.transactions.multiplier)
            .build()
    }

    /// Socket address for the metrics exporter.
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.metrics.host, self.metrics.port)
    }
}
