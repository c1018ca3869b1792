// Shared telemetry packet, channel, and pipeline state logic.

pub mod backoff;
pub mod channel;
pub mod liveness;
pub mod model;
pub mod packet;
