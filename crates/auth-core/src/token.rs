//! Compact JWT parsing.
//!
//! Splits a token into its three base64url segments and decodes the header.
//! Nothing here verifies a signature; the parsed header only tells the
//! verifier which key to look up.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (denial-of-service prevention)
//! - Every segment must be valid unpadded base64url
//! - The `kid` must be a non-empty string

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::AuthError;

/// Maximum allowed token size in bytes (8KB).
///
/// Cognito ID tokens are typically 1-2KB. Anything above this is rejected
/// before base64 decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// The only signing algorithm accepted for user pool tokens.
pub const SUPPORTED_ALGORITHM: &str = "RS256";

/// Decoded JOSE header fields used for key selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signing algorithm named by the token.
    pub alg: String,

    /// Key identifier naming the JWKS entry that signed the token.
    pub kid: String,

    /// Optional media type (usually "JWT").
    pub typ: Option<String>,
}

/// A token split into its parts, with header and payload decoded.
#[derive(Debug, Clone)]
pub struct ParsedToken<'a> {
    /// Decoded header.
    pub header: TokenHeader,

    /// Decoded payload bytes (JSON, not yet parsed).
    pub payload: Vec<u8>,

    /// `base64url(header).base64url(payload)`, the bytes covered by the signature.
    pub signing_input: &'a str,

    /// Signature segment, still base64url-encoded.
    pub signature: &'a str,
}

/// Parse a compact token into header, payload and signature.
///
/// # Errors
///
/// Returns `AuthError::MalformedToken` if the token is too large, does not
/// have exactly three segments, any segment is not valid base64url, the
/// header is not a JSON object, or `alg`/`kid` are missing.
pub fn parse_token(token: &str) -> Result<ParsedToken<'_>, AuthError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "nb.auth.token",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::MalformedToken("token too large".to_string()));
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
        tracing::debug!(
            target: "nb.auth.token",
            segments = segments.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(AuthError::MalformedToken(
            "expected three segments".to_string(),
        ));
    };

    let header_bytes = decode_segment("header", header_b64)?;
    let payload = decode_segment("payload", payload_b64)?;
    // Decoded only to validate the encoding; verification works on the text form
    decode_segment("signature", signature_b64)?;

    let header = decode_header(&header_bytes)?;

    let (signing_input, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| AuthError::MalformedToken("expected three segments".to_string()))?;

    Ok(ParsedToken {
        header,
        payload,
        signing_input,
        signature,
    })
}

fn decode_segment(name: &'static str, segment: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "nb.auth.token", segment = name, error = %e, "Failed to decode token segment");
        AuthError::MalformedToken(format!("{name} is not valid base64url"))
    })
}

fn decode_header(header_bytes: &[u8]) -> Result<TokenHeader, AuthError> {
    let header: serde_json::Value = serde_json::from_slice(header_bytes).map_err(|e| {
        tracing::debug!(target: "nb.auth.token", error = %e, "Failed to parse token header JSON");
        AuthError::MalformedToken("header is not valid JSON".to_string())
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| AuthError::MalformedToken("header missing alg".to_string()))?;

    // Empty kid is rejected as well; it can never match a published key
    let kid = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| AuthError::MalformedToken("header missing kid".to_string()))?;

    let typ = header
        .get("typ")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    Ok(TokenHeader { alg, kid, typ })
}
