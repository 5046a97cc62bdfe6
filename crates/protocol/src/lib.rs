use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod event;
pub mod responses;

pub use event::{IntentEvent, ToolKind};
pub use responses::*;

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;

/// Wire-level error classification shared by every endpoint.
///
/// `Benign` never reaches a caller: ingest-side failures are swallowed and
/// counted, so the enum mostly exists to keep the mapping to HTTP status
/// codes in one place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    BadQuery,
    NotReady,
    Truncated,
    Internal,
    Benign,
}

impl ErrorCode {
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::BadRequest | ErrorCode::BadQuery => 400,
            ErrorCode::NotReady => 503,
            ErrorCode::Internal => 500,
            // Truncated responses are successful prefixes.
            ErrorCode::Truncated | ErrorCode::Benign => 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Set for `Internal` so a log line can be matched to the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            hint: None,
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Serialize a response payload to the compact JSON the service emits.
pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_codes_map_to_expected_statuses() {
        assert_eq!(ErrorCode::BadRequest.http_status(), 400);
        assert_eq!(ErrorCode::BadQuery.http_status(), 400);
        assert_eq!(ErrorCode::NotReady.http_status(), 503);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
        assert_eq!(ErrorCode::Truncated.http_status(), 200);
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = ErrorEnvelope::new(ErrorCode::BadQuery, "invalid regex")
            .with_hint("check the pattern syntax");
        let raw = serialize_json(&envelope).unwrap();
        let back: ErrorEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.code, ErrorCode::BadQuery);
        assert_eq!(back.message, "invalid regex");
        assert_eq!(back.hint.as_deref(), Some("check the pattern syntax"));
    }
}
