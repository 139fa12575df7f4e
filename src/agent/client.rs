//! Host factory and shared HTTP client.

use std::sync::Arc;

use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::host::AgentHost;
use crate::agent::orchestrator::Orchestrator;
use crate::agent::providers::FoundryHost;
use crate::credential::{DefaultCredential, TokenCredential};
use crate::error::{ConnectionError, Result};
use crate::genie::GenieFactory;
use crate::poll::TokioSleeper;

/// Builds the HTTP client shared by the agent host, credentials, and Genie.
///
/// # Errors
///
/// Returns [`ConnectionError::Client`] if the TLS backend cannot be initialized.
pub fn http_client(
    config: &AgentConfig,
) -> std::result::Result<reqwest::Client, ConnectionError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConnectionError::Client {
            message: e.to_string(),
        })
}

/// Creates the agent host for the configured project endpoint.
#[must_use]
pub fn create_host(
    http: reqwest::Client,
    config: &AgentConfig,
    credential: Arc<dyn TokenCredential>,
) -> Arc<dyn AgentHost> {
    Arc::new(FoundryHost::new(http, config, credential))
}

/// Wires a production orchestrator: shared HTTP client, default
/// credential chain, Foundry host, and Genie factory.
///
/// # Errors
///
/// Returns [`crate::Error::Connection`] if the HTTP client cannot be built.
pub fn create_orchestrator(config: AgentConfig) -> Result<Orchestrator> {
    let http = http_client(&config)?;
    let credential = DefaultCredential::create(&http);
    let sleeper = Arc::new(TokioSleeper);
    let host = create_host(http.clone(), &config, Arc::clone(&credential));
    let genie = GenieFactory::new(http, &config, credential, sleeper.clone());
    debug!(endpoint = config.endpoint, host = host.name(), "orchestrator wired");
    Ok(Orchestrator::new(host, Arc::new(genie), sleeper, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::StaticTokenCredential;

    #[test]
    fn test_create_foundry_host() {
        let config = AgentConfig::builder()
            .endpoint("https://example.services.ai.azure.com/api/projects/p")
            .connection_name("dbx")
            .agent_id("asst_1")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let http = http_client(&config).unwrap_or_else(|_| unreachable!());
        let host = create_host(http, &config, Arc::new(StaticTokenCredential::new("t")));
        assert_eq!(host.name(), "foundry");
    }

    #[test]
    fn test_create_orchestrator_is_lazy() {
        let config = AgentConfig::builder()
            .endpoint("https://example.services.ai.azure.com/api/projects/p")
            .connection_name("dbx")
            .model_deployment("gpt-4o")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let orchestrator = create_orchestrator(config).unwrap_or_else(|_| unreachable!());
        assert!(!orchestrator.is_connected());
    }
}
