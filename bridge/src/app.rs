// Relay lifecycle and the state shared between its loops.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::broadcast::{Broadcaster, TransportError};
use crate::buffers::LatestValueQueue;
use crate::config::{BridgeConfig, ConfigError};
use crate::metrics::MetricsAggregator;
use crate::utils::{lock, monotonic_ms};
use crate::{tasks, udp};
use telemetry_core::packet::TelemetryPacket;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind udp {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("bridge was stopped and cannot be restarted")]
    Stopped,
}

/// Last time a valid telemetry packet was ingested, in milliseconds since bridge start.
/// Written by the ingest loop only.
#[derive(Debug)]
pub struct LivenessState {
    start: Instant,
    last_seen_ms: Mutex<Option<u64>>,
}

impl LivenessState {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            last_seen_ms: Mutex::new(None),
        }
    }

    pub fn now_ms(&self) -> u64 {
        monotonic_ms(self.start)
    }

    pub fn mark_seen_at(&self, now_ms: u64) {
        *lock(&self.last_seen_ms) = Some(now_ms);
    }

    pub fn last_seen_ms(&self) -> Option<u64> {
        *lock(&self.last_seen_ms)
    }
}

pub struct BridgeState {
    pub queue: LatestValueQueue<TelemetryPacket>,
    pub metrics: MetricsAggregator,
    pub liveness: LivenessState,
}

impl BridgeState {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: LatestValueQueue::new(queue_capacity),
            metrics: MetricsAggregator::new(),
            liveness: LivenessState::new(Instant::now()),
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        local_addr: SocketAddr,
        handles: Vec<JoinHandle<()>>,
    },
    Joined,
}

pub struct Bridge {
    config: BridgeConfig,
    state: Arc<BridgeState>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let broadcaster = Broadcaster::new(
            &config.base_url,
            config.api_key.clone(),
            config.channel.clone(),
            config.request_timeout,
        )?;
        Ok(Self {
            state: Arc::new(BridgeState::new(config.queue_capacity)),
            broadcaster: Arc::new(broadcaster),
            cancel: CancellationToken::new(),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Idle),
            config,
        })
    }

    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Binds the UDP port and spawns the ingest, publish, heartbeat, and metrics loops.
    /// Calling it again while running returns the existing bound address.
    pub async fn start(&self) -> Result<SocketAddr, BridgeError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running { local_addr, .. } = &*lifecycle {
            return Ok(*local_addr);
        }
        if self.cancel.is_cancelled() || matches!(*lifecycle, Lifecycle::Joined) {
            return Err(BridgeError::Stopped);
        }

        let addr = self.config.udp_addr();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| BridgeError::Bind { addr, source })?;
        info!(addr = %local_addr, "udp ingest started");

        let handles = vec![
            tokio::spawn(udp::udp_loop(
                socket,
                self.state.clone(),
                self.cancel.clone(),
            )),
            tokio::spawn(tasks::publish_task(
                self.state.clone(),
                self.broadcaster.clone(),
                tasks::PublishSettings::from_config(&self.config),
                self.cancel.clone(),
            )),
            tokio::spawn(tasks::heartbeat_task(
                self.state.clone(),
                self.broadcaster.clone(),
                self.config.heartbeat_interval,
                self.config.staleness_timeout,
                self.cancel.clone(),
            )),
            tokio::spawn(tasks::metrics_task(
                self.state.clone(),
                self.config.metrics_interval,
                self.cancel.clone(),
            )),
        ];

        info!(channel = %self.config.channel, "publishing to channel");
        *lifecycle = Lifecycle::Running {
            local_addr,
            handles,
        };
        Ok(local_addr)
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    /// Signals every loop to exit. Does not wait for them.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the loops and waits until all of them have exited.
    pub async fn shutdown(&self) {
        self.stop();
        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running { handles, .. } =
            std::mem::replace(&mut *lifecycle, Lifecycle::Joined)
        {
            for handle in handles {
                if let Err(err) = handle.await {
                    warn!(?err, "bridge task ended abnormally");
                }
            }
            info!("bridge stopped");
        }
    }
}
