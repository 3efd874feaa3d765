//! Verified token claims.
//!
//! Cognito ID and access tokens share most registered claims but differ in
//! how they name the client: ID tokens carry `aud`, access tokens carry
//! `client_id`. Provider-specific fields not modelled here are kept in
//! `extra` so the claims round-trip to the original payload.
//!
//! `sub`, `cognito:username` and `email` identify a person and are redacted
//! in Debug output.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// The `aud` claim, which may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience value.
    Single(String),

    /// Several audience values.
    Multiple(Vec<String>),
}

impl Audience {
    /// Check whether `audience` is one of the values.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(value) => value == audience,
            Audience::Multiple(values) => values.iter().any(|v| v == audience),
        }
    }
}

/// Claims from a token whose signature, expiry and audience were verified.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user pool user id) - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Cognito username (ID tokens) - redacted in Debug output.
    #[serde(
        rename = "cognito:username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// Audience (app client id for ID tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration timestamp (Unix epoch seconds, fractions floored).
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds, fractions floored).
    #[serde(
        default,
        deserialize_with = "optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Issuer URL of the user pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// "id" or "access".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// App client id (access tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// User email - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Every other payload field, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whole seconds of a NumericDate, which may carry a fractional part.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_seconds(value: &Number) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }

    let seconds = value.as_f64()?.floor();
    (seconds.is_finite() && seconds >= i64::MIN as f64 && seconds < i64::MAX as f64)
        .then_some(seconds as i64)
}

fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Number::deserialize(deserializer)?;
    whole_seconds(&value)
        .ok_or_else(|| de::Error::custom(format!("NumericDate out of range: {value}")))
}

fn optional_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<Number>::deserialize(deserializer)?
        .map(|value| {
            whole_seconds(&value)
                .ok_or_else(|| de::Error::custom(format!("NumericDate out of range: {value}")))
        })
        .transpose()
}

/// Custom Debug implementation that redacts identifying fields.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("iss", &self.iss)
            .field("token_use", &self.token_use)
            .field("client_id", &self.client_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("extra_fields", &self.extra.len())
            .finish()
    }
}

impl Claims {
    /// Check whether the token was issued for `audience`.
    ///
    /// Uses `aud` when present; access tokens without `aud` fall back to
    /// `client_id`.
    #[must_use]
    pub fn audience_contains(&self, audience: &str) -> bool {
        match (&self.aud, &self.client_id) {
            (Some(aud), _) => aud.contains(audience),
            (None, Some(client_id)) => client_id == audience,
            (None, None) => false,
        }
    }

    /// The user's name as presented by either token type.
    ///
    /// ID tokens use `cognito:username`, access tokens use `username`.
    #[must_use]
    pub fn display_username(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or_else(|| self.extra.get("username").and_then(Value::as_str))
    }

    /// Group memberships from `cognito:groups`.
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        self.extra
            .get("cognito:groups")
            .and_then(Value::as_array)
            .map(|groups| groups.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}
