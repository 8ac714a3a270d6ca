//! Bearer token verification for incoming requests.
//!
//! Tokens are issued by the identity provider (Keycloak). We only verify
//! them; the raw token is kept on the [`Principal`] so calls to the backend
//! run with the caller's own permissions.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

use super::config::AuthConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("no verification key configured")]
    NotConfigured,
    #[error("failed to read public key {path}: {message}")]
    KeyUnreadable { path: String, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    realm_access: RealmAccess,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub username: Option<String>,
    pub tenant: String,
    pub roles: Vec<String>,
    /// The verified bearer token, forwarded to the backend.
    pub token: String,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    default_tenant: String,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .field("default_tenant", &self.default_tenant)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn from_config(auth: &AuthConfig, default_tenant: &str) -> Result<Self, AuthError> {
        let (key, algorithm) = match (&auth.secret, &auth.public_key_path) {
            (Some(secret), _) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, Some(path)) => {
                let unreadable = |message: String| AuthError::KeyUnreadable {
                    path: path.display().to_string(),
                    message,
                };
                let pem = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
                let key = DecodingKey::from_rsa_pem(&pem).map_err(|e| unreadable(e.to_string()))?;
                (key, Algorithm::RS256)
            }
            (None, None) => return Err(AuthError::NotConfigured),
        };

        Ok(Self::new(
            key,
            algorithm,
            auth.issuer.as_deref(),
            auth.audience.as_deref(),
            default_tenant,
        ))
    }

    pub fn new(
        key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
        default_tenant: &str,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key,
            validation,
            default_tenant: default_tenant.to_string(),
        }
    }

    /// Extract the token from an `Authorization` header value.
    pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let (scheme, token) = header.split_once(' ').ok_or(AuthError::MalformedHeader)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::MalformedHeader);
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let claims = data.claims;

        Ok(Principal {
            subject: claims.sub,
            username: claims.preferred_username,
            tenant: claims
                .tenant
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| self.default_tenant.clone()),
            roles: claims.realm_access.roles,
            token: token.to_string(),
        })
    }

    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal, AuthError> {
        self.verify(Self::bearer_token(authorization)?)
    }
}
