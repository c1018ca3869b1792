// Broadcast channel naming and pairing code validation.

use thiserror::Error;

pub const DEFAULT_CHANNEL: &str = "session:dev";
pub const PAIRING_CHARSET: &str = "ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const PAIRING_CODE_LENGTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingCodeError {
    #[error("pairing code must be {expected} characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("pairing code contains unsupported character {0:?}")]
    Charset(char),
}

pub fn channel_name(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Normalizes a user-typed pairing code to upper case and checks it against the
/// unambiguous charset (no 0/O or 1/I/L).
pub fn normalize_pairing_code(code: &str) -> Result<String, PairingCodeError> {
    let normalized = code.trim().to_ascii_uppercase();
    let actual = normalized.chars().count();
    if actual != PAIRING_CODE_LENGTH {
        return Err(PairingCodeError::Length {
            expected: PAIRING_CODE_LENGTH,
            actual,
        });
    }
    if let Some(bad) = normalized.chars().find(|c| !PAIRING_CHARSET.contains(*c)) {
        return Err(PairingCodeError::Charset(bad));
    }
    Ok(normalized)
}
