//! Access tokens for the analytics API.
//!
//! The token file is either a stored OAuth token (as written by an
//! interactive authorisation step) or a service-account key. Service
//! accounts sign an RS256 JWT grant and exchange it at the token endpoint.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::source::SourceError;

pub const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TokenFile {
    ServiceAccount(ServiceAccountKey),
    Authorized(AuthorizedUser),
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + EXPIRY_MARGIN < at,
            None => true,
        }
    }
}

pub struct TokenProvider {
    client: Client,
    credentials: TokenFile,
    token_uri: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn from_file(path: &Path, client: Client, default_token_uri: &str) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SourceError::Auth(format!(
                "cannot read token file {}: {e}. Has the authorisation step been run, \
                 and does ga.token_filepath point at its output?",
                path.display()
            ))
        })?;
        Self::from_json(&contents, client, default_token_uri)
    }

    pub fn from_json(json: &str, client: Client, default_token_uri: &str) -> Result<Self, SourceError> {
        let credentials: TokenFile = serde_json::from_str(json).map_err(|e| {
            SourceError::Auth(format!(
                "token file is neither a stored OAuth token nor a service-account key: {e}"
            ))
        })?;

        let token_uri = match &credentials {
            TokenFile::ServiceAccount(key) => key.token_uri.clone(),
            TokenFile::Authorized(user) => {
                if user.access_token.is_none() && !user.can_refresh() {
                    return Err(SourceError::Auth(
                        "token file has no access_token and no refresh credentials".to_string(),
                    ));
                }
                user.token_uri.clone()
            }
        }
        .unwrap_or_else(|| default_token_uri.to_string());

        Ok(Self {
            client,
            credentials,
            token_uri,
            cached: RwLock::new(None),
        })
    }

    /// A bearer token, refreshed when the cached one is about to expire.
    pub async fn access_token(&self) -> Result<String, SourceError> {
        {
            let guard = self.cached.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *self.cached.write().await = Some(token);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, SourceError> {
        match &self.credentials {
            TokenFile::ServiceAccount(key) => {
                debug!("Exchanging service-account assertion for {}", key.client_email);
                let assertion = self.sign_assertion(key)?;
                self.exchange(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .await
            }
            TokenFile::Authorized(user) => match (&user.refresh_token, &user.client_id, &user.client_secret) {
                (Some(refresh), Some(id), Some(secret)) => {
                    debug!("Refreshing stored OAuth token");
                    self.exchange(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh.as_str()),
                        ("client_id", id.as_str()),
                        ("client_secret", secret.as_str()),
                    ])
                    .await
                }
                _ => user
                    .access_token
                    .clone()
                    .map(|access_token| CachedToken {
                        access_token,
                        expires_at: None,
                    })
                    .ok_or_else(|| SourceError::Auth("no usable access token".to_string())),
            },
        }
    }

    fn sign_assertion(&self, key: &ServiceAccountKey) -> Result<String, SourceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SourceError::Auth(e.to_string()))?
            .as_secs();

        let claims = GrantClaims {
            iss: &key.client_email,
            scope: ANALYTICS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SourceError::Auth(format!("invalid service-account private key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| SourceError::Auth(format!("failed to sign token request: {e}")))
    }

    async fn exchange(&self, params: &[(&str, &str)]) -> Result<CachedToken, SourceError> {
        let response = self.client.post(&self.token_uri).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "token endpoint returned {status}: {message}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
        })
    }
}

impl AuthorizedUser {
    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}
