use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

// httpq service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct HttpqConfig {
    // Public HTTP listener bind address.
    pub bind_addr: SocketAddr,
    // Metrics/probe HTTP listener bind address.
    pub metrics_bind: SocketAddr,
    // How long publish and consume wait for a counterpart.
    pub wait_timeout_ms: u64,
    // Per-topic queue bound; 0 means unbounded.
    pub max_queue_depth: usize,
    // Evict topics untouched for this long; 0 disables eviction.
    pub topic_idle_ttl_ms: u64,
    // How often the eviction sweep runs.
    pub topic_sweep_interval_ms: u64,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:24744";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 0;
pub const DEFAULT_TOPIC_IDLE_TTL_MS: u64 = 0;
pub const DEFAULT_TOPIC_SWEEP_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
struct HttpqConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    wait_timeout_ms: Option<u64>,
    max_queue_depth: Option<usize>,
    topic_idle_ttl_ms: Option<u64>,
    topic_sweep_interval_ms: Option<u64>,
}

impl Default for HttpqConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 24744)),
            metrics_bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            topic_idle_ttl_ms: DEFAULT_TOPIC_IDLE_TTL_MS,
            topic_sweep_interval_ms: DEFAULT_TOPIC_SWEEP_INTERVAL_MS,
        }
    }
}

impl HttpqConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("HTTPQ_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .with_context(|| "parse HTTPQ_BIND")?;
        let metrics_bind = std::env::var("HTTPQ_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse HTTPQ_METRICS_BIND")?;
        let wait_timeout_ms = std::env::var("HTTPQ_WAIT_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_WAIT_TIMEOUT_MS);
        let max_queue_depth = std::env::var("HTTPQ_MAX_QUEUE_DEPTH")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_QUEUE_DEPTH);
        let topic_idle_ttl_ms = std::env::var("HTTPQ_TOPIC_IDLE_TTL_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TOPIC_IDLE_TTL_MS);
        let topic_sweep_interval_ms = std::env::var("HTTPQ_TOPIC_SWEEP_INTERVAL_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_TOPIC_SWEEP_INTERVAL_MS);
        Ok(Self {
            bind_addr,
            metrics_bind,
            wait_timeout_ms,
            max_queue_depth,
            topic_idle_ttl_ms,
            topic_sweep_interval_ms,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("HTTPQ_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read HTTPQ_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: HttpqConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse httpq config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.wait_timeout_ms
            && value > 0
        {
            self.wait_timeout_ms = value;
        }
        if let Some(value) = override_cfg.max_queue_depth {
            self.max_queue_depth = value;
        }
        if let Some(value) = override_cfg.topic_idle_ttl_ms {
            self.topic_idle_ttl_ms = value;
        }
        if let Some(value) = override_cfg.topic_sweep_interval_ms
            && value > 0
        {
            self.topic_sweep_interval_ms = value;
        }
        Ok(())
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn topic_idle_ttl(&self) -> Option<Duration> {
        (self.topic_idle_ttl_ms > 0).then(|| Duration::from_millis(self.topic_idle_ttl_ms))
    }

    pub fn topic_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.topic_sweep_interval_ms)
    }
}
