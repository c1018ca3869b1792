// Resolved relay configuration handed to the core by the launcher.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    BASE_BACKOFF_MS, HEARTBEAT_INTERVAL_MS, MAX_BACKOFF_MS, MAX_QUEUE_SIZE,
    METRICS_LOG_INTERVAL_MS, PUBLISH_INTERVAL_MS, REQUEST_TIMEOUT_MS, STALENESS_TIMEOUT_MS,
    UDP_PORT,
};
use telemetry_core::channel::DEFAULT_CHANNEL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("backoff ceiling {ceiling:?} is below base {base:?}")]
    BackoffBounds { base: Duration, ceiling: Duration },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeConfig {
    pub base_url: String,
    pub api_key: String,
    pub channel: String,
    pub udp_bind: IpAddr,
    pub udp_port: u16,
    pub publish_interval: Duration,
    pub heartbeat_interval: Duration,
    pub staleness_timeout: Duration,
    pub metrics_interval: Duration,
    pub queue_capacity: usize,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            channel: DEFAULT_CHANNEL.to_string(),
            udp_bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            udp_port: UDP_PORT,
            publish_interval: Duration::from_millis(PUBLISH_INTERVAL_MS),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            staleness_timeout: Duration::from_millis(STALENESS_TIMEOUT_MS),
            metrics_interval: Duration::from_millis(METRICS_LOG_INTERVAL_MS),
            queue_capacity: MAX_QUEUE_SIZE,
            backoff_base: Duration::from_millis(BASE_BACKOFF_MS),
            backoff_ceiling: Duration::from_millis(MAX_BACKOFF_MS),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
        }
    }
}

impl BridgeConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.udp_bind, self.udp_port)
    }

    pub fn publish_rate_hz(&self) -> f64 {
        1.0 / self.publish_interval.as_secs_f64().max(f64::EPSILON)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base url"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api key"));
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Missing("channel"));
        }

        let durations = [
            ("publish interval", self.publish_interval),
            ("heartbeat interval", self.heartbeat_interval),
            ("staleness timeout", self.staleness_timeout),
            ("metrics interval", self.metrics_interval),
            ("backoff base", self.backoff_base),
            ("request timeout", self.request_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroDuration(*name));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.backoff_ceiling < self.backoff_base {
            return Err(ConfigError::BackoffBounds {
                base: self.backoff_base,
                ceiling: self.backoff_ceiling,
            });
        }
        Ok(())
    }
}
