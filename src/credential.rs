//! Bearer token acquisition.
//!
//! The agent host and the Databricks workspace both accept Entra ID bearer
//! tokens, each for its own audience scope. [`DefaultCredential`] tries a
//! service principal from the environment first, then the Azure CLI, and
//! caches tokens until shortly before they expire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CredentialError;

/// Default Entra ID authority.
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
/// Tokens closer than this to expiry are refreshed.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// A bearer token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Raw bearer token.
    pub token: String,
    /// Expiry instant, if the issuer reported one.
    pub expires_on: Option<SystemTime>,
}

impl AccessToken {
    /// Creates a token that never expires.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_on: None,
        }
    }

    /// Whether the token is still usable at `now` with the refresh margin applied.
    fn is_fresh(&self, now: SystemTime) -> bool {
        self.expires_on
            .is_none_or(|exp| exp.duration_since(now).is_ok_and(|left| left > REFRESH_MARGIN))
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Credential source name for diagnostics.
    fn name(&self) -> &'static str;

    /// Acquires a token for the given audience scope.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the source cannot issue a token.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: AccessToken,
}

impl StaticTokenCredential {
    /// Creates a credential that hands out `token` for every scope.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        Ok(self.token.clone())
    }
}

/// OAuth2 client-credentials flow for a service principal.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientSecretCredential {
    /// Creates a credential against the public Entra ID authority.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority: DEFAULT_AUTHORITY.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Overrides the authority host (sovereign clouds, tests).
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
    ///
    /// Returns `None` unless all three are set.
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let tenant = std::env::var("AZURE_TENANT_ID").ok()?;
        let client = std::env::var("AZURE_CLIENT_ID").ok()?;
        let secret = std::env::var("AZURE_CLIENT_SECRET").ok()?;
        let mut credential = Self::new(http, tenant, client, secret);
        if let Ok(authority) = std::env::var("AZURE_AUTHORITY_HOST") {
            credential = credential.with_authority(authority);
        }
        Some(credential)
    }

    fn unavailable(message: impl Into<String>) -> CredentialError {
        CredentialError::Unavailable {
            source_name: "client-secret",
            message: message.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client-secret"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(format!("token endpoint returned {status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("invalid token response: {e}")))?;

        Ok(AccessToken {
            token: body.access_token,
            expires_on: body
                .expires_in
                .map(|secs| SystemTime::now() + Duration::from_secs(secs)),
        })
    }
}

/// Shells out to `az account get-access-token`.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<u64>,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
        }
    }
}

impl AzureCliCredential {
    /// Uses a specific executable instead of `az` from `PATH`.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> CredentialError {
        CredentialError::Unavailable {
            source_name: "azure-cli",
            message: message.into(),
        }
    }

    /// Parses the JSON printed by `az account get-access-token`.
    fn parse_output(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
        let parsed: CliToken = serde_json::from_slice(stdout)
            .map_err(|e| Self::unavailable(format!("unexpected az output: {e}")))?;
        Ok(AccessToken {
            token: parsed.access_token,
            expires_on: parsed
                .expires_on
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
        })
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure-cli"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--scope", scope])
            .output()
            .await
            .map_err(|e| Self::unavailable(format!("could not run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::unavailable(stderr.trim().to_string()));
        }

        Self::parse_output(&output.stdout)
    }
}

/// Tries each credential in order and returns the first token.
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedCredential {
    /// Creates a chain from the given sources.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

impl std::fmt::Debug for ChainedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainedCredential")
            .field("sources", &names)
            .finish()
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut attempts = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    debug!(source = source.name(), scope, "acquired token");
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = source.name(), error = %e, "credential source failed");
                    attempts.push(e.to_string());
                }
            }
        }
        Err(CredentialError::Exhausted { attempts })
    }
}

/// Caches tokens per scope until they near expiry.
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl CachedCredential {
    /// Wraps `inner` with a per-scope cache.
    #[must_use]
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(scope)
            && token.is_fresh(SystemTime::now())
        {
            return Ok(token.clone());
        }
        let token = self.inner.get_token(scope).await?;
        cache.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

/// Service principal from the environment, then Azure CLI, with caching.
pub struct DefaultCredential;

impl DefaultCredential {
    /// Builds the default credential chain.
    #[must_use]
    pub fn create(http: &reqwest::Client) -> Arc<dyn TokenCredential> {
        let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();
        if let Some(sp) = ClientSecretCredential::from_env(http.clone()) {
            sources.push(Arc::new(sp));
        }
        sources.push(Arc::new(AzureCliCredential::default()));
        Arc::new(CachedCredential::new(Arc::new(ChainedCredential::new(
            sources,
        ))))
    }
}
