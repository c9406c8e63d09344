use std::fmt;
use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use funclogs_core::backend::BackendError;
use funclogs_core::error::{FunclogsError, Result};
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const LOGGING_READ_SCOPE: &str = "https://www.googleapis.com/auth/logging.read";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service-account JSON key that the token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            FunclogsError::Config(format!(
                "failed reading credentials {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw).map_err(|e| {
            FunclogsError::Config(format!("credentials {}: {e}", path.display()))
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| FunclogsError::Parse(format!("invalid service account key: {e}")))
    }
}

/// Where bearer tokens for the logging API come from.
pub enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::ServiceAccount(auth) => f
                .debug_tuple("TokenSource::ServiceAccount")
                .field(&auth.client_email)
                .finish(),
        }
    }
}

impl TokenSource {
    pub async fn access_token(&self, http: &reqwest::Client) -> std::result::Result<String, BackendError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(auth) => auth.access_token(http).await,
        }
    }
}

pub struct ServiceAccountAuth {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    signing_key: SigningKey<Sha256>,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'a str,
    typ: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JwtClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl ServiceAccountAuth {
    /// `token_uri` overrides the key's own token endpoint.
    pub fn new(key: &ServiceAccountKey, token_uri: Option<&str>) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&key.private_key)
            .map_err(|e| FunclogsError::Config(format!("unreadable service account private key: {e}")))?;
        let token_uri = token_uri
            .map(str::to_string)
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            client_email: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            token_uri,
            signing_key: SigningKey::<Sha256>::new(private_key),
            cached: Mutex::new(None),
        })
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Builds the signed `header.claims.signature` grant assertion.
    pub fn signed_assertion(&self, now: DateTime<Utc>) -> std::result::Result<String, BackendError> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.key_id.as_deref(),
        };
        let claims = JwtClaims {
            iss: self.client_email.clone(),
            scope: LOGGING_READ_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let header = serde_json::to_vec(&header)
            .map_err(|e| BackendError::Auth(format!("encode jwt header: {e}")))?;
        let claims = serde_json::to_vec(&claims)
            .map_err(|e| BackendError::Auth(format!("encode jwt claims: {e}")))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| BackendError::Auth(format!("sign jwt: {e}")))?;

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    pub async fn access_token(&self, http: &reqwest::Client) -> std::result::Result<String, BackendError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
        {
            return Ok(token.token.clone());
        }

        let assertion = self.signed_assertion(now)?;
        let resp = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("token exchange: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), email = %self.client_email, "token exchange rejected");
            return Err(BackendError::Auth(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Auth(format!("unreadable token response: {e}")))?;
        let expires_at = now + Duration::seconds(parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        tracing::debug!(email = %self.client_email, %expires_at, "obtained access token");

        *cached = Some(CachedToken {
            token: parsed.access_token.clone(),
            expires_at,
        });
        Ok(parsed.access_token)
    }
}
