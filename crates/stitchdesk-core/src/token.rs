//! Bearer token inspection.
//!
//! Tokens are JWT-shaped (`header.payload.signature`); only the payload is
//! read, and the signature is never verified here. The server is the
//! authority on validity, this module only answers time-based questions
//! so the client can stop using a token before the server starts rejecting it.
//!
//! Every failure to read a token is fail-closed: the boolean helpers report
//! "expired" and the lookups report `None`, logging the cause.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::config::{Config, DEFAULT_EXPIRY_BUFFER_SECS, DEFAULT_WARNING_BUFFER_SECS};

const PADDING_INDIFFERENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Upper bound for either buffer; larger configured values are clamped.
const MAX_BUFFER_SECS: i64 = 365 * 24 * 60 * 60;

/// JWT payloads are base64url; some issuers emit the standard alphabet.
const URL_SAFE_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, PADDING_INDIFFERENT);
const STANDARD_ENGINE: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, PADDING_INDIFFERENT);

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no numeric exp claim")]
    MissingExpiry,
}

/// Decoded claims of a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    /// Expiry instant in seconds since the epoch.
    pub fn exp(&self) -> Option<f64> {
        self.0.get("exp").and_then(Value::as_f64)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp()
            .and_then(|exp| DateTime::from_timestamp_millis((exp * 1000.0) as i64))
    }

    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Result of one expiry check, recomputed from the token every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpiryCheck {
    pub is_expired: bool,
    pub is_expiring_soon: bool,
}

/// Decode the claims of `token` without any validation.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or(TokenError::MissingPayload)?;

    let engine = if segment.contains(|c: char| c == '+' || c == '/') {
        &STANDARD_ENGINE
    } else {
        &URL_SAFE_ENGINE
    };
    let bytes = engine.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn exp_seconds(token: &str) -> Result<f64, TokenError> {
    decode_claims(token)?.exp().ok_or(TokenError::MissingExpiry)
}

fn epoch_seconds(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64 / 1000.0
}

/// Time-based validity checks with configurable early-expiry margins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInspector {
    expiry_buffer: Duration,
    warning_buffer: Duration,
}

impl Default for TokenInspector {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_BUFFER_SECS, DEFAULT_WARNING_BUFFER_SECS)
    }
}

impl TokenInspector {
    /// Buffers are clamped to `0..=MAX_BUFFER_SECS`.
    pub fn new(expiry_buffer_secs: i64, warning_buffer_secs: i64) -> Self {
        Self {
            expiry_buffer: Self::buffer(expiry_buffer_secs),
            warning_buffer: Self::buffer(warning_buffer_secs),
        }
    }

    fn buffer(secs: i64) -> Duration {
        Duration::try_seconds(secs.clamp(0, MAX_BUFFER_SECS)).unwrap_or_else(Duration::zero)
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.expiry_buffer_secs, config.warning_buffer_secs)
    }

    /// True when the token is absent, unreadable, or expires within the
    /// expiry buffer (5 minutes by default).
    pub fn is_expired(&self, token: Option<&str>) -> bool {
        self.is_expired_at(token, Utc::now())
    }

    pub fn is_expired_at(&self, token: Option<&str>, now: DateTime<Utc>) -> bool {
        Self::expires_within(token, self.expiry_buffer, now)
    }

    /// The softer, non-forcing signal. Same predicate as [`Self::is_expired`]
    /// but with its own buffer, which defaults to the same 5 minutes.
    pub fn is_expiring_soon(&self, token: Option<&str>) -> bool {
        self.is_expiring_soon_at(token, Utc::now())
    }

    pub fn is_expiring_soon_at(&self, token: Option<&str>, now: DateTime<Utc>) -> bool {
        Self::expires_within(token, self.warning_buffer, now)
    }

    pub fn check_at(&self, token: Option<&str>, now: DateTime<Utc>) -> ExpiryCheck {
        ExpiryCheck {
            is_expired: self.is_expired_at(token, now),
            is_expiring_soon: self.is_expiring_soon_at(token, now),
        }
    }

    /// Expiry as a millisecond epoch timestamp.
    pub fn expiry_time(token: Option<&str>) -> Option<i64> {
        let token = token?;
        match exp_seconds(token) {
            Ok(exp) => Some((exp * 1000.0) as i64),
            Err(e) => {
                warn!(error = %e, "Failed to read token expiry");
                None
            }
        }
    }

    pub fn payload(token: Option<&str>) -> Option<TokenClaims> {
        let token = token?;
        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "Failed to decode token payload");
                None
            }
        }
    }

    /// Time left before the literal `exp`, ignoring the buffer.
    pub fn time_until_expiry(token: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
        let expiry_ms = Self::expiry_time(token)?;
        Duration::try_milliseconds(expiry_ms.saturating_sub(now.timestamp_millis()))
    }

    /// Minutes left before the literal `exp` (for display)
    pub fn minutes_until_expiry(token: Option<&str>, now: DateTime<Utc>) -> Option<i64> {
        Self::time_until_expiry(token, now).map(|d| d.num_minutes().max(0))
    }

    fn expires_within(token: Option<&str>, buffer: Duration, now: DateTime<Utc>) -> bool {
        let Some(token) = token else {
            return true;
        };
        let Some(horizon) = now.checked_add_signed(buffer) else {
            warn!("Expiry horizon out of range, treating token as expired");
            return true;
        };
        match exp_seconds(token) {
            Ok(exp) => exp < epoch_seconds(horizon),
            Err(e) => {
                warn!(error = %e, "Token unreadable, treating as expired");
                true
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    /// Build an unsigned JWT-shaped token around `payload`.
    pub(crate) fn make_token(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    pub(crate) fn token_expiring_at(exp: i64) -> String {
        make_token(&serde_json::json!({ "exp": exp, "user_id": 42 }))
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_scenario_expiring_within_buffer_is_expired() {
        let inspector = TokenInspector::default();
        let token = token_expiring_at(now().timestamp() + 100);
        assert!(inspector.is_expired_at(Some(&token), now()));
    }

    #[test]
    fn test_scenario_far_expiry_is_valid() {
        let inspector = TokenInspector::default();
        let token = token_expiring_at(now().timestamp() + 1000);
        assert!(!inspector.is_expired_at(Some(&token), now()));
    }

    #[test]
    fn test_buffer_boundary() {
        let inspector = TokenInspector::default();
        // exp == now + 300 is not strictly less, so still usable
        let at_boundary = token_expiring_at(now().timestamp() + 300);
        assert!(!inspector.is_expired_at(Some(&at_boundary), now()));

        let just_inside = token_expiring_at(now().timestamp() + 299);
        assert!(inspector.is_expired_at(Some(&just_inside), now()));

        let long_gone = token_expiring_at(now().timestamp() - 3600);
        assert!(inspector.is_expired_at(Some(&long_gone), now()));
    }

    #[test]
    fn test_expiring_soon_matches_expired_by_default() {
        let inspector = TokenInspector::default();
        for offset in [-10, 0, 100, 299, 300, 301, 1000, 86_400] {
            let token = token_expiring_at(now().timestamp() + offset);
            assert_eq!(
                inspector.is_expiring_soon_at(Some(&token), now()),
                inspector.is_expired_at(Some(&token), now()),
                "offset {offset}"
            );
        }
        assert!(inspector.is_expiring_soon_at(None, now()));
        assert!(inspector.is_expiring_soon_at(Some("garbage"), now()));
    }

    #[test]
    fn test_separate_warning_buffer() {
        let inspector = TokenInspector::new(300, 900);
        let token = token_expiring_at(now().timestamp() + 600);
        let check = inspector.check_at(Some(&token), now());
        assert_eq!(
            check,
            ExpiryCheck {
                is_expired: false,
                is_expiring_soon: true
            }
        );
    }

    #[test]
    fn test_out_of_range_buffers_are_clamped() {
        let token = token_expiring_at(now().timestamp() + 3600);

        let huge = TokenInspector::new(i64::MAX, i64::MAX);
        assert!(huge.is_expired_at(Some(&token), now()));
        assert!(huge.is_expiring_soon_at(Some(&token), now()));

        // Negative buffers act as no buffer at all
        let negative = TokenInspector::new(i64::MIN, -600);
        assert!(!negative.is_expired_at(Some(&token), now()));
        let past = token_expiring_at(now().timestamp() - 1);
        assert!(negative.is_expired_at(Some(&past), now()));
    }

    #[test]
    fn test_horizon_overflow_is_expired() {
        let token = token_expiring_at(now().timestamp() + 3600);
        let inspector = TokenInspector::default();
        assert!(inspector.is_expired_at(Some(&token), DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_unreadable_tokens_fail_closed() {
        let inspector = TokenInspector::default();
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        let array = format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"));
        let no_exp = make_token(&serde_json::json!({ "sub": "tailor" }));
        let string_exp = make_token(&serde_json::json!({ "exp": "tomorrow" }));

        for token in [
            "",
            "no-dots",
            "a..c",
            "a.!!!.c",
            not_json.as_str(),
            array.as_str(),
            no_exp.as_str(),
            string_exp.as_str(),
        ] {
            assert!(inspector.is_expired_at(Some(token), now()), "token {token:?}");
            assert_eq!(TokenInspector::expiry_time(Some(token)), None, "token {token:?}");
        }
        assert!(inspector.is_expired_at(None, now()));
        assert_eq!(TokenInspector::payload(None), None);
        assert_eq!(TokenInspector::payload(Some("a.!!!.c")), None);
        assert_eq!(TokenInspector::payload(Some(&not_json)), None);
    }

    #[test]
    fn test_payload_without_exp_is_still_decodable() {
        let token = make_token(&serde_json::json!({ "sub": "tailor" }));
        let claims = TokenInspector::payload(Some(&token)).unwrap();
        assert_eq!(claims.get("sub"), Some(&Value::from("tailor")));
        assert_eq!(claims.exp(), None);
    }

    #[test]
    fn test_expiry_time_in_millis() {
        let token = token_expiring_at(1_700_000_123);
        assert_eq!(TokenInspector::expiry_time(Some(&token)), Some(1_700_000_123_000));
        assert_eq!(TokenInspector::expiry_time(None), None);

        let claims = TokenInspector::payload(Some(&token)).unwrap();
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_700_000_123);
        assert_eq!(claims.get("user_id"), Some(&Value::from(42)));
    }

    #[test]
    fn test_padded_and_standard_alphabet_payloads() {
        // "?>" forces '/' into the standard encoding
        let payload = serde_json::json!({ "exp": 1_800_000_000i64, "note": "??>>" });
        let padded = format!("h.{}.s", STANDARD.encode(payload.to_string()));
        assert!(padded.contains('=') || padded.contains('/') || padded.contains('+'));

        let claims = decode_claims(&padded).unwrap();
        assert_eq!(claims.exp(), Some(1_800_000_000.0));
    }

    #[test]
    fn test_decode_errors_are_typed() {
        assert!(matches!(decode_claims("only"), Err(TokenError::MissingPayload)));
        assert!(matches!(decode_claims("a.%%%.c"), Err(TokenError::Base64(_))));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("{oops"));
        assert!(matches!(decode_claims(&not_json), Err(TokenError::Json(_))));
    }

    #[test]
    fn test_minutes_until_expiry() {
        let token = token_expiring_at(now().timestamp() + 600);
        assert_eq!(TokenInspector::minutes_until_expiry(Some(&token), now()), Some(10));

        let past = token_expiring_at(now().timestamp() - 600);
        assert_eq!(TokenInspector::minutes_until_expiry(Some(&past), now()), Some(0));
    }
}
