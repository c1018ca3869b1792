// Realtime broadcast transport for outbound telemetry and heartbeat events.
// Invariants: one outbound request per attempt, bounded by the client timeout; the
// unverified-TLS fallback is entered at most once per process.

use std::error::Error as StdError;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::BROADCAST_PATH;
use crate::utils::lock;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broadcast request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("broadcast endpoint answered {status}")]
    Status { status: StatusCode },

    #[error("broadcast request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout(err);
        }
        match err.status() {
            Some(status) => TransportError::Status { status },
            None => TransportError::Request(err),
        }
    }

    pub fn is_certificate_failure(&self) -> bool {
        match self {
            TransportError::Request(err) => is_certificate_error(err),
            _ => false,
        }
    }
}

#[derive(Serialize)]
pub struct BroadcastMessage<'a, P: Serialize> {
    pub topic: &'a str,
    pub event: &'a str,
    pub payload: &'a P,
}

#[derive(Serialize)]
pub struct BroadcastEnvelope<'a, P: Serialize> {
    pub messages: [BroadcastMessage<'a, P>; 1],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrustMode {
    Verified,
    Unverified,
}

struct TrustState {
    mode: TrustMode,
    client: Client,
}

pub struct Broadcaster {
    endpoint: String,
    api_key: String,
    channel: String,
    timeout: Duration,
    trust: Mutex<TrustState>,
}

impl Broadcaster {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        channel: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = build_client(timeout, TrustMode::Verified)?;
        Ok(Self {
            endpoint: broadcast_endpoint(base_url),
            api_key: api_key.into(),
            channel: channel.into(),
            timeout,
            trust: Mutex::new(TrustState {
                mode: TrustMode::Verified,
                client,
            }),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn trust_mode(&self) -> TrustMode {
        lock(&self.trust).mode
    }

    pub async fn send<P: Serialize>(&self, event: &str, payload: &P) -> Result<(), TransportError> {
        let envelope = BroadcastEnvelope {
            messages: [BroadcastMessage {
                topic: &self.channel,
                event,
                payload,
            }],
        };

        let (mode, client) = self.current_client();
        match self.post(&client, &envelope).await {
            Err(err) if mode == TrustMode::Verified && err.is_certificate_failure() => {
                let client = self.downgrade_trust(&err)?;
                self.post(&client, &envelope).await
            }
            result => result,
        }
    }

    fn current_client(&self) -> (TrustMode, Client) {
        let state = lock(&self.trust);
        (state.mode, state.client.clone())
    }

    /// Switches every later call to an unverified client. A concurrent caller that already
    /// switched wins and its client is reused.
    fn downgrade_trust(&self, cause: &TransportError) -> Result<Client, TransportError> {
        let mut state = lock(&self.trust);
        if state.mode == TrustMode::Verified {
            state.client = build_client(self.timeout, TrustMode::Unverified)?;
            state.mode = TrustMode::Unverified;
            warn!(
                error = %cause,
                "certificate verification failed; falling back to unverified TLS for this process"
            );
        }
        Ok(state.client.clone())
    }

    async fn post<P: Serialize>(
        &self,
        client: &Client,
        envelope: &BroadcastEnvelope<'_, P>,
    ) -> Result<(), TransportError> {
        let response = client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .json(envelope)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { status });
        }
        debug!(%status, "broadcast accepted");
        Ok(())
    }
}

fn build_client(timeout: Duration, mode: TrustMode) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(mode == TrustMode::Unverified)
        .build()
        .map_err(TransportError::Client)
}

pub fn broadcast_endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), BROADCAST_PATH)
}

/// Walks the source chain looking for a TLS trust failure.
pub fn is_certificate_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("certificate") || message.contains("unknownissuer") {
            return true;
        }
        current = err.source();
    }
    false
}
