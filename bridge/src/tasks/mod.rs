// Background tasks for publishing, heartbeat, and metrics reporting.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::BridgeState;
use crate::broadcast::Broadcaster;
use crate::config::BridgeConfig;
use crate::constants::{HEARTBEAT_EVENT, TELEMETRY_EVENT};
use telemetry_core::backoff::BackoffState;
use telemetry_core::liveness::{LivenessReport, SilenceDetector};
use telemetry_core::model::HeartbeatMessage;

#[derive(Clone, Copy, Debug)]
pub struct PublishSettings {
    pub interval: Duration,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
}

impl PublishSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            interval: config.publish_interval,
            backoff_base: config.backoff_base,
            backoff_ceiling: config.backoff_ceiling,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Idle,
    Published,
    Failed { retry_in: Duration, requeued: bool },
}

fn ticker(period: Duration) -> time::Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

pub async fn publish_task(
    state: Arc<BridgeState>,
    broadcaster: Arc<Broadcaster>,
    settings: PublishSettings,
    cancel: CancellationToken,
) {
    let mut backoff = BackoffState::new(settings.backoff_base, settings.backoff_ceiling);
    let mut interval = ticker(settings.interval);
    info!(
        rate_hz = 1.0 / settings.interval.as_secs_f64(),
        "publish loop started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        // Backoff is tracked for reporting only; retries keep the tick cadence.
        // An in-flight send is abandoned on stop.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = publish_tick(&state, &broadcaster, &mut backoff) => {}
        }
    }

    debug!("publish loop stopped");
}

/// Drains the freshest packet and sends it once. On failure the packet is put back
/// behind anything newer and the backoff doubles.
pub async fn publish_tick(
    state: &BridgeState,
    broadcaster: &Broadcaster,
    backoff: &mut BackoffState,
) -> PublishOutcome {
    let Some(latest) = state.queue.take() else {
        return PublishOutcome::Idle;
    };

    match broadcaster.send(TELEMETRY_EVENT, &latest).await {
        Ok(()) => {
            state.metrics.record_published();
            backoff.reset();
            PublishOutcome::Published
        }
        Err(err) => {
            state.metrics.record_error();
            let retry_in = backoff.record_failure();
            warn!(
                error = %err,
                retry_in_s = retry_in.as_secs_f64(),
                "publish failed (retry in {})",
                format_delay(retry_in)
            );
            let requeued = state.queue.requeue(latest);
            PublishOutcome::Failed { retry_in, requeued }
        }
    }
}

fn format_delay(delay: Duration) -> String {
    format!("{:.1}s", delay.as_secs_f64())
}

pub async fn heartbeat_task(
    state: Arc<BridgeState>,
    broadcaster: Arc<Broadcaster>,
    period: Duration,
    staleness_timeout: Duration,
    cancel: CancellationToken,
) {
    let mut detector = SilenceDetector::new(staleness_timeout.as_millis() as u64);
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = heartbeat_tick(&state, &broadcaster, &mut detector) => {}
        }
    }

    debug!("heartbeat loop stopped");
}

pub async fn heartbeat_tick(
    state: &BridgeState,
    broadcaster: &Broadcaster,
    detector: &mut SilenceDetector,
) -> HeartbeatMessage {
    let now_ms = state.liveness.now_ms();
    let (heartbeat, _) = observe_liveness(state, detector, now_ms);
    if let Err(err) = broadcaster.send(HEARTBEAT_EVENT, &heartbeat).await {
        debug!(error = %err, "heartbeat not delivered");
    }
    heartbeat
}

/// Builds the heartbeat for `now_ms` and logs the silent notice on an active-to-silent transition.
pub fn observe_liveness(
    state: &BridgeState,
    detector: &mut SilenceDetector,
    now_ms: u64,
) -> (HeartbeatMessage, LivenessReport) {
    let report = detector.evaluate(state.liveness.last_seen_ms(), now_ms);
    if report.went_silent {
        info!(
            silent_for_ms = ?report.silent_for_ms,
            staleness_timeout_ms = detector.staleness_timeout_ms(),
            "telemetry source silent"
        );
    }

    let heartbeat = HeartbeatMessage::new(
        report.is_active(),
        state.metrics.received(),
        state.queue.size(),
    );
    (heartbeat, report)
}

pub async fn metrics_task(state: Arc<BridgeState>, period: Duration, cancel: CancellationToken) {
    let mut interval = ticker(period);
    // The first tick completes immediately; a window needs a full period.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                state.metrics.log_and_reset();
            }
        }
    }

    debug!("metrics loop stopped");
}
