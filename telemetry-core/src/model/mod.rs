// Outbound message models.

mod heartbeat;

pub use heartbeat::{HeartbeatMessage, HEARTBEAT_KIND};
