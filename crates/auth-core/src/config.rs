//! Issuer parameters for token verification.
//!
//! A Cognito user pool is identified by its region and pool id. The expected
//! audience (the app client id) is optional; when it is absent the audience
//! check is skipped.

use crate::error::AuthError;

/// Build the Cognito issuer URL for a user pool.
///
/// This is both the expected `iss` claim and the base of the JWKS endpoint.
#[must_use]
pub fn cognito_issuer_url(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// Validated issuer parameters for one user pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfig {
    region: String,
    user_pool_id: String,
    audience: Option<String>,
}

impl IssuerConfig {
    /// Create issuer parameters, rejecting missing or malformed values.
    ///
    /// An empty audience is treated as "no audience configured".
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the region or user pool id is
    /// empty or contains characters that cannot appear in the JWKS URL path.
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        audience: Option<String>,
    ) -> Result<Self, AuthError> {
        let region = region.into().trim().to_string();
        let user_pool_id = user_pool_id.into().trim().to_string();

        validate_component("region", &region)?;
        validate_component("user pool id", &user_pool_id)?;

        let audience = audience
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Ok(Self {
            region,
            user_pool_id,
            audience,
        })
    }

    /// Identity provider region (e.g. `us-east-1`).
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// User pool identifier (e.g. `us-east-1_AbCdEf123`).
    #[must_use]
    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }

    /// Expected audience (app client id), if configured.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// Expected `iss` claim for tokens from this pool.
    #[must_use]
    pub fn issuer_url(&self) -> String {
        cognito_issuer_url(&self.region, &self.user_pool_id)
    }
}

/// Reject empty values and anything that would escape the URL path segment.
pub(crate) fn validate_component(name: &str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        tracing::error!(target: "nb.auth.config", field = name, "Missing issuer parameter");
        return Err(AuthError::Configuration(format!("missing {name}")));
    }

    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        tracing::error!(target: "nb.auth.config", field = name, "Invalid issuer parameter");
        return Err(AuthError::Configuration(format!(
            "{name} contains invalid characters"
        )));
    }

    Ok(())
}
