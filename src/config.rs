//! Configuration management for Libros Reader

use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub reconcile: ReconcileConfig,
    pub visibility: VisibilityConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Observed positions are ignored this long after a direct navigation
    pub suppression_window: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityConfig {
    /// Minimum visible fraction a unit needs before it can become current
    pub threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Pages rendered before the current page in the immediate window
    pub window_before: u32,
    /// Pages rendered after the current page in the immediate window
    pub window_after: u32,
    /// Always keep page 1 materialized
    pub include_first_page: bool,
    /// Pages per background fill batch
    pub batch_size: usize,
    /// Yield between background batches
    pub batch_delay: Duration,
    /// Fraction of the viewport width a page occupies at 100%
    pub fit_width_ratio: f64,
    /// Placeholder height when the engine cannot report a page size
    pub placeholder_height: f64,
    /// Vertical gap between page units
    pub page_gap: f64,
    pub min_scale: u16,
    pub max_scale: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            reconcile: ReconcileConfig::default(),
            visibility: VisibilityConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "sqlite:./libros-reader.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            suppression_window: Duration::from_millis(1500),
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        VisibilityConfig { threshold: 0.4 }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            window_before: 1,
            window_after: 2,
            include_first_page: true,
            batch_size: 3,
            batch_delay: Duration::from_millis(500),
            fit_width_ratio: 0.8,
            placeholder_height: 500.0,
            page_gap: 0.0,
            min_scale: 50,
            max_scale: 200,
        }
    }
}

impl Config {
    /// Build configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            database: DatabaseConfig {
                url: env::var("READER_DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_var("READER_DB_MAX_CONNECTIONS")
                    .unwrap_or(defaults.database.max_connections),
            },
            reconcile: ReconcileConfig {
                suppression_window: parse_var("READER_SUPPRESSION_WINDOW_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reconcile.suppression_window),
            },
            visibility: VisibilityConfig {
                threshold: parse_var("READER_VISIBILITY_THRESHOLD")
                    .filter(|t: &f64| (0.0..1.0).contains(t))
                    .unwrap_or(defaults.visibility.threshold),
            },
            render: RenderConfig {
                window_before: parse_var("READER_WINDOW_BEFORE")
                    .unwrap_or(defaults.render.window_before),
                window_after: parse_var("READER_WINDOW_AFTER")
                    .unwrap_or(defaults.render.window_after),
                batch_size: parse_var("READER_BATCH_SIZE")
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(defaults.render.batch_size),
                batch_delay: parse_var("READER_BATCH_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.render.batch_delay),
                ..defaults.render
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
