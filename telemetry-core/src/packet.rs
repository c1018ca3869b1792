// Telemetry packet decoding for inbound UDP datagrams.
// Invariants: only the `type` discriminator is inspected; every other field is relayed verbatim.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const TELEMETRY_KIND: &str = "telemetry";
pub const KIND_FIELD: &str = "type";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetryPacket(Map<String, Value>);

impl TelemetryPacket {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("datagram is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("datagram is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("datagram is not a json object")]
    NotAnObject,

    #[error("unsupported packet kind {kind:?}")]
    UnknownKind { kind: Option<String> },
}

pub fn decode(bytes: &[u8]) -> Result<TelemetryPacket, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    match fields.get(KIND_FIELD).and_then(Value::as_str) {
        Some(TELEMETRY_KIND) => Ok(TelemetryPacket(fields)),
        other => Err(DecodeError::UnknownKind {
            kind: other.map(str::to_owned),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_telemetry_object_verbatim() {
        let raw = br#"{"type":"telemetry","t_model":12.5,"pos":{"lat":41.1,"lon":41.6,"alt_m":1200}}"#;
        let packet = decode(raw).expect("telemetry packet");
        assert_eq!(packet.get("t_model"), Some(&json!(12.5)));
        assert_eq!(
            packet.into_value(),
            json!({"type":"telemetry","t_model":12.5,"pos":{"lat":41.1,"lon":41.6,"alt_m":1200}})
        );
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = decode(&[0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(matches!(err, DecodeError::Utf8(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = decode(br#"{"type":"telemetry","#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn rejects_non_object_payloads() {
        let err = decode(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject));
    }

    #[test]
    fn unknown_kinds_are_reported_not_accepted() {
        match decode(br#"{"type":"events","name":"takeoff"}"#) {
            Err(DecodeError::UnknownKind { kind }) => assert_eq!(kind.as_deref(), Some("events")),
            other => panic!("unexpected result: {other:?}"),
        }
        match decode(br#"{"t_model":1.0}"#) {
            Err(DecodeError::UnknownKind { kind }) => assert!(kind.is_none()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_string_discriminator_is_unknown() {
        let err = decode(br#"{"type":7}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind { kind: None }));
    }
}
