// UDP ingest module.
// Invariants: malformed or foreign datagrams are dropped without counting; payloads are never logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::app::BridgeState;
use crate::constants::{UDP_RECV_BUFFER, UDP_RECV_TIMEOUT_MS};
use telemetry_core::packet;

const RECV_ERROR_PAUSE: Duration = Duration::from_millis(50);

pub async fn udp_loop(socket: UdpSocket, state: Arc<BridgeState>, cancel: CancellationToken) {
    let mut buf = vec![0u8; UDP_RECV_BUFFER];
    let recv_timeout = Duration::from_millis(UDP_RECV_TIMEOUT_MS);

    loop {
        let recv = tokio::select! {
            _ = cancel.cancelled() => break,
            recv = time::timeout(recv_timeout, socket.recv_from(&mut buf)) => recv,
        };

        match recv {
            Err(_elapsed) => continue,
            Ok(Ok((len, _source))) => {
                let now_ms = state.liveness.now_ms();
                handle_datagram(&state, &buf[..len], now_ms);
            }
            Ok(Err(err)) => {
                // ICMP port-unreachable is surfaced on some platforms as a recv error.
                warn!(?err, "udp receive failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(RECV_ERROR_PAUSE) => {}
                }
            }
        }
    }

    info!("udp ingest stopped");
}

/// Decodes one datagram and, if it is telemetry, records it. Returns whether it was accepted.
pub fn handle_datagram(state: &BridgeState, datagram: &[u8], now_ms: u64) -> bool {
    match packet::decode(datagram) {
        Ok(telemetry) => {
            state.metrics.record_received();
            state.liveness.mark_seen_at(now_ms);
            state.queue.push(telemetry);
            true
        }
        Err(err) => {
            trace!(%err, len = datagram.len(), "datagram dropped");
            false
        }
    }
}
