//! Authentication of a frame's auth section.
//!
//! Two strategies sit behind the [`Authenticator`] trait:
//! - [`NilAuthenticator`] accepts everything and yields no identity
//! - [`TokenAuthenticator`] verifies an HMAC-signed JWT and requires a
//!   string `conn_id` claim
//!
//! Tokens are checked in order: text, segment structure, header algorithm,
//! signature (constant-time), time claims, then `conn_id`. Claims are only
//! trusted after the signature checks out.

use crate::error::{constants, AuthError, ProtocolError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

/// Claim carrying the connection identity
pub const CONN_ID_CLAIM: &str = "conn_id";

/// Identity established for a frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthInfo {
    pub conn_id: String,
    pub claims: Map<String, Value>,
}

/// Validates an auth blob and returns the sender's identity.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, blob: &[u8]) -> Result<AuthInfo, AuthError>;
}

/// Accepts every auth blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilAuthenticator;

impl Authenticator for NilAuthenticator {
    fn authenticate(&self, _blob: &[u8]) -> Result<AuthInfo, AuthError> {
        Ok(AuthInfo::default())
    }
}

/// HMAC family accepted for token signatures
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    /// Name used in the token's `alg` header
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::HS384 => "HS384",
            SigningAlgorithm::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "HS384" => Ok(SigningAlgorithm::HS384),
            "HS512" => Ok(SigningAlgorithm::HS512),
            _ => Err(ProtocolError::ConfigError(format!(
                "Unsupported signing algorithm: '{s}' (expected HS256, HS384 or HS512)"
            ))),
        }
    }
}

// Binds `$mac` to a fresh HMAC keyed with `$secret` for the chosen digest
macro_rules! with_mac {
    ($algorithm:expr, $secret:expr, |$mac:ident| $body:expr) => {
        match $algorithm {
            SigningAlgorithm::HS256 => {
                Hmac::<Sha256>::new_from_slice($secret).map(|mut $mac| $body)
            }
            SigningAlgorithm::HS384 => {
                Hmac::<Sha384>::new_from_slice($secret).map(|mut $mac| $body)
            }
            SigningAlgorithm::HS512 => {
                Hmac::<Sha512>::new_from_slice($secret).map(|mut $mac| $body)
            }
        }
    };
}

/// Verifies HMAC-signed JWTs.
#[derive(Clone)]
pub struct TokenAuthenticator {
    algorithm: SigningAlgorithm,
    secret: Vec<u8>,
    leeway: Duration,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("algorithm", &self.algorithm)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

fn unauthorized(reason: &str) -> AuthError {
    AuthError::Unauthorized(reason.to_string())
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| unauthorized(constants::ERR_TOKEN_ENCODING))
}

fn decode_object(segment: &str, reason: &str) -> Result<Map<String, Value>, AuthError> {
    serde_json::from_slice(&decode_segment(segment)?).map_err(|_| unauthorized(reason))
}

fn now_seconds() -> Result<f64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .map_err(|_| unauthorized(constants::ERR_SYSTEM_TIME))
}

fn time_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<f64>, AuthError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| unauthorized(constants::ERR_INVALID_TIME_CLAIM)),
    }
}

impl TokenAuthenticator {
    pub fn new(algorithm: SigningAlgorithm, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            secret: secret.into(),
            leeway: Duration::ZERO,
        }
    }

    /// Tolerate this much clock skew on `exp`, `nbf` and `iat`
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AuthError> {
        with_mac!(self.algorithm, &self.secret, |mac| {
            mac.update(input);
            mac.finalize().into_bytes().to_vec()
        })
        .map_err(|_| unauthorized(constants::ERR_BAD_SIGNATURE))
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        with_mac!(self.algorithm, &self.secret, |mac| {
            mac.update(input);
            mac.verify_slice(signature).is_ok()
        })
        .unwrap_or(false)
    }

    /// Sign `claims` into a compact token with this authenticator's key
    pub fn issue(&self, claims: &Map<String, Value>) -> Result<String, AuthError> {
        let header = serde_json::json!({ "alg": self.algorithm.as_str(), "typ": "JWT" });
        let header = serde_json::to_vec(&header).map_err(|_| unauthorized(constants::ERR_TOKEN_HEADER))?;
        let payload = serde_json::to_vec(claims).map_err(|_| unauthorized(constants::ERR_TOKEN_CLAIMS))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify `token` and return its claims
    fn verify_token(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(unauthorized(constants::ERR_TOKEN_SEGMENTS));
        };

        let header = decode_object(header, constants::ERR_TOKEN_HEADER)?;
        if header.get("alg").and_then(Value::as_str) != Some(self.algorithm.as_str()) {
            return Err(unauthorized(constants::ERR_ALGORITHM_MISMATCH));
        }

        let signing_input_len = token.len() - signature.len() - 1;
        let signature = decode_segment(signature)?;
        if !self.verify(&token.as_bytes()[..signing_input_len], &signature) {
            return Err(unauthorized(constants::ERR_BAD_SIGNATURE));
        }

        let claims = decode_object(payload, constants::ERR_TOKEN_CLAIMS)?;
        self.check_time_claims(&claims)?;
        Ok(claims)
    }

    fn check_time_claims(&self, claims: &Map<String, Value>) -> Result<(), AuthError> {
        let now = now_seconds()?;
        let leeway = self.leeway.as_secs_f64();

        if let Some(exp) = time_claim(claims, "exp")? {
            if now > exp + leeway {
                return Err(unauthorized(constants::ERR_TOKEN_EXPIRED));
            }
        }
        if let Some(nbf) = time_claim(claims, "nbf")? {
            if now + leeway < nbf {
                return Err(unauthorized(constants::ERR_TOKEN_NOT_YET_VALID));
            }
        }
        if let Some(iat) = time_claim(claims, "iat")? {
            if now + leeway < iat {
                return Err(unauthorized(constants::ERR_TOKEN_ISSUED_IN_FUTURE));
            }
        }
        Ok(())
    }
}

impl Authenticator for TokenAuthenticator {
    #[instrument(skip(self, blob), fields(len = blob.len()), level = "debug")]
    fn authenticate(&self, blob: &[u8]) -> Result<AuthInfo, AuthError> {
        let token =
            std::str::from_utf8(blob).map_err(|_| unauthorized(constants::ERR_TOKEN_NOT_TEXT))?;

        let claims = self.verify_token(token).inspect_err(|e| {
            debug!(error = %e, "Token rejected");
        })?;

        let conn_id = match claims.get(CONN_ID_CLAIM) {
            None => return Err(AuthError::MissingConnId),
            Some(Value::String(id)) => id.clone(),
            Some(_) => return Err(AuthError::InvalidConnId),
        };

        debug!(conn_id = %conn_id, "Token accepted");
        Ok(AuthInfo { conn_id, claims })
    }
}
