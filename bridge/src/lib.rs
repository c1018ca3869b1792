// Crate root for the DCS telemetry bridge: UDP ingest to realtime broadcast.

pub mod app;
pub mod broadcast;
pub mod buffers;
pub mod config;
pub mod constants;
pub mod metrics;
pub mod tasks;
pub mod udp;
pub mod utils;

pub use app::{Bridge, BridgeError, BridgeState};
pub use config::BridgeConfig;
