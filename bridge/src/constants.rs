// Shared constants for relay timing, transport, and queue limits.

pub const UDP_PORT: u16 = 7779;
pub const UDP_RECV_BUFFER: usize = 65_535;
pub const UDP_RECV_TIMEOUT_MS: u64 = 1_000;
pub const PUBLISH_INTERVAL_MS: u64 = 250;
pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;
pub const STALENESS_TIMEOUT_MS: u64 = 3_000;
pub const METRICS_LOG_INTERVAL_MS: u64 = 5_000;
pub const MAX_QUEUE_SIZE: usize = 100;
pub const BASE_BACKOFF_MS: u64 = 1_000;
pub const MAX_BACKOFF_MS: u64 = 30_000;
pub const REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const BROADCAST_PATH: &str = "/realtime/v1/api/broadcast";
pub const TELEMETRY_EVENT: &str = "telemetry";
pub const HEARTBEAT_EVENT: &str = "heartbeat";
