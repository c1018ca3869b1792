// Bridge heartbeat record broadcast alongside telemetry.

use serde::Serialize;

pub const HEARTBEAT_KIND: &str = "heartbeat";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub dcs_active: bool,
    pub packet_count: u64,
    pub queue_size: usize,
}

impl HeartbeatMessage {
    pub fn new(dcs_active: bool, packet_count: u64, queue_size: usize) -> Self {
        Self {
            message_type: HEARTBEAT_KIND,
            dcs_active,
            packet_count,
            queue_size,
        }
    }
}
