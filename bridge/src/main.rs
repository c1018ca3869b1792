// DCS telemetry bridge: relays UDP telemetry to a realtime broadcast channel.

use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use dcs_telemetry_bridge::constants::{
    BASE_BACKOFF_MS, HEARTBEAT_INTERVAL_MS, MAX_BACKOFF_MS, MAX_QUEUE_SIZE,
    METRICS_LOG_INTERVAL_MS, PUBLISH_INTERVAL_MS, STALENESS_TIMEOUT_MS, UDP_PORT,
};
use dcs_telemetry_bridge::{Bridge, BridgeConfig};
use telemetry_core::channel::{channel_name, normalize_pairing_code, DEFAULT_CHANNEL};

#[derive(Parser, Debug)]
#[command(name = "dcs-bridge", version, about = "Relay DCS telemetry (UDP) to a realtime broadcast channel")]
struct Cli {
    /// Realtime project base URL
    #[arg(long, env = "SUPABASE_URL")]
    url: Option<String>,

    /// API key sent with every broadcast
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Broadcast channel topic (takes precedence over --code)
    #[arg(long, short = 'c', env = "BRIDGE_CHANNEL")]
    channel: Option<String>,

    /// Pairing code; publishes to `session:<CODE>`
    #[arg(long)]
    code: Option<String>,

    #[arg(long, env = "BRIDGE_UDP_BIND", default_value = "0.0.0.0")]
    udp_bind: IpAddr,

    #[arg(long, env = "BRIDGE_UDP_PORT", default_value_t = UDP_PORT)]
    udp_port: u16,

    #[arg(long, default_value_t = PUBLISH_INTERVAL_MS)]
    publish_interval_ms: u64,

    #[arg(long, default_value_t = HEARTBEAT_INTERVAL_MS)]
    heartbeat_interval_ms: u64,

    #[arg(long, default_value_t = STALENESS_TIMEOUT_MS)]
    staleness_timeout_ms: u64,

    #[arg(long, default_value_t = METRICS_LOG_INTERVAL_MS)]
    metrics_interval_ms: u64,

    #[arg(long, default_value_t = MAX_QUEUE_SIZE)]
    queue_capacity: usize,

    #[arg(long, default_value_t = BASE_BACKOFF_MS)]
    backoff_base_ms: u64,

    #[arg(long, default_value_t = MAX_BACKOFF_MS)]
    backoff_max_ms: u64,
}

impl Cli {
    fn resolve_channel(&self) -> Result<String, String> {
        if let Some(channel) = &self.channel {
            return Ok(channel.clone());
        }
        if let Some(code) = &self.code {
            let code = normalize_pairing_code(code).map_err(|err| err.to_string())?;
            return Ok(channel_name(&code));
        }
        Ok(DEFAULT_CHANNEL.to_string())
    }

    fn into_config(self) -> Result<BridgeConfig, String> {
        let channel = self.resolve_channel()?;
        let base_url = self.url.ok_or("missing --url or SUPABASE_URL")?;
        let api_key = self.key.ok_or("missing --key or SUPABASE_KEY")?;

        let mut config = BridgeConfig::new(base_url, api_key, channel);
        config.udp_bind = self.udp_bind;
        config.udp_port = self.udp_port;
        config.publish_interval = Duration::from_millis(self.publish_interval_ms);
        config.heartbeat_interval = Duration::from_millis(self.heartbeat_interval_ms);
        config.staleness_timeout = Duration::from_millis(self.staleness_timeout_ms);
        config.metrics_interval = Duration::from_millis(self.metrics_interval_ms);
        config.queue_capacity = self.queue_capacity;
        config.backoff_base = Duration::from_millis(self.backoff_base_ms);
        config.backoff_ceiling = Duration::from_millis(self.backoff_max_ms);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            return ExitCode::from(2);
        }
    };

    info!(
        url = %config.base_url,
        channel = %config.channel,
        udp_port = config.udp_port,
        publish_hz = config.publish_rate_hz(),
        "DCS telemetry bridge"
    );

    let bridge = match Bridge::new(config) {
        Ok(bridge) => bridge,
        Err(err) => {
            error!(%err, "bridge setup failed");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = bridge.start().await {
        error!(%err, "bridge failed to start");
        return ExitCode::FAILURE;
    }
    info!("ready; waiting for DCS telemetry on UDP (Ctrl+C to stop)");

    if let Err(err) = wait_for_shutdown_signal().await {
        error!(?err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    bridge.shutdown().await;
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
