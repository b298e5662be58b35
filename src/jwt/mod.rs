//! JWT token handling

use crate::config::JwtConfig;
use crate::domain::{MembershipInfo, Role};
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SSO access-token claims.
///
/// Self-contained: a remote verifier can re-derive role and scope without
/// querying this service. The same shape is returned by the introspection
/// endpoint, freshly recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer (originating service tag)
    pub iss: String,
    /// Token type discriminator (prevents token confusion attacks)
    #[serde(default)]
    pub token_type: String,
    /// Core identity
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Permission flags
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    /// Primary role: highest-rank membership, `super_user` for superusers,
    /// absent when the user holds no memberships
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Every membership with its scope, group nested where present
    pub memberships: Vec<MembershipInfo>,
    /// App context, when one was resolved at issue time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_slug: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iss: String,
    /// Token type discriminator (prevents token confusion attacks)
    #[serde(default)]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let algorithm = if config.private_key_pem.is_some() {
            Algorithm::RS256
        } else {
            Algorithm::HS256
        };
        let encoding_key = match config.private_key_pem.as_ref() {
            Some(private_key) => EncodingKey::from_rsa_pem(private_key.as_bytes())
                .expect("Failed to load JWT private key"),
            None => EncodingKey::from_secret(config.secret.as_bytes()),
        };
        let decoding_key = match config.public_key_pem.as_ref() {
            Some(public_key) => DecodingKey::from_rsa_pem(public_key.as_bytes())
                .expect("Failed to load JWT public key"),
            None => match config.private_key_pem.as_ref() {
                Some(private_key) => DecodingKey::from_rsa_pem(private_key.as_bytes())
                    .expect("Failed to load JWT private key"),
                None => DecodingKey::from_secret(config.secret.as_bytes()),
            },
        };
        Self {
            config,
            encoding_key,
            decoding_key,
            algorithm,
        }
    }

    /// Create a Validation with a strict leeway (5 seconds) instead of the
    /// default 60 seconds, so tokens expire promptly under minor clock skew.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(self.algorithm);
        v.leeway = 5;
        v.validate_aud = false;
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    /// Sign access-token claims built by the claim builder, stamping
    /// issuer, type, and timestamps.
    pub fn sign_access_token(&self, mut claims: SsoClaims) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);

        claims.iss = self.config.issuer.clone();
        claims.token_type = "access".to_string();
        claims.iat = now.timestamp();
        claims.exp = exp.timestamp();

        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Create a refresh token for a user (and the app context, if any)
    pub fn create_refresh_token(&self, user_id: Uuid, app_id: Option<Uuid>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.refresh_token_ttl_secs);

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            token_type: "refresh".to_string(),
            app_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Verify and decode an access token
    pub fn verify_access_token(&self, token: &str) -> Result<SsoClaims> {
        let mut validation = self.strict_validation();
        validation.set_required_spec_claims(&["exp", "iss"]);

        let token_data = decode::<SsoClaims>(token, &self.decoding_key, &validation)?;
        if token_data.claims.token_type != "access" {
            return Err(AppError::Unauthorized("Not an access token".to_string()));
        }
        Ok(token_data.claims)
    }

    /// Verify and decode a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        let validation = self.strict_validation();

        let token_data = decode::<RefreshClaims>(token, &self.decoding_key, &validation)?;
        if token_data.claims.token_type != "refresh" {
            return Err(AppError::Unauthorized("Not a refresh token".to_string()));
        }
        Ok(token_data.claims)
    }

    /// Access-token TTL in seconds
    pub fn access_token_ttl(&self) -> i64 {
        self.config.access_token_ttl_secs
    }
}
