//! Databricks Genie data-query integration.
//!
//! ```text
//! Connection (from agent host)
//!   ├── validate type marker + read genie_space_id
//!   ├── token for the Databricks audience
//!   └── GenieClient ──▶ DataQueryBridge ──▶ ToolSet ("ask_genie")
//! ```

pub mod bridge;
pub mod client;

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::config::{AgentConfig, DATABRICKS_AUDIENCE_SCOPE};
use crate::agent::message::{CONNECTION_TYPE_KEY, Connection, GENIE_SPACE_KEY};
use crate::credential::TokenCredential;
use crate::error::ConnectionError;
use crate::poll::{PollStrategy, Sleeper};

pub use bridge::{DataQueryBridge, NOT_INITIALIZED, TOOL_NAME};
pub use client::{DataService, GenieClient, GenieResponse, Upstream};

/// Connection type marker identifying a Genie connection.
pub const GENIE_CONNECTION_TYPE: &str = "genie";

/// Checks that `connection` is a Genie connection and returns its space id.
///
/// # Errors
///
/// Returns [`ConnectionError::WrongType`] if the type marker is absent or
/// differs, and [`ConnectionError::MissingMetadata`] if the space id is absent.
pub fn genie_space_id(connection: &Connection) -> Result<&str, ConnectionError> {
    let kind = connection.metadata.get(CONNECTION_TYPE_KEY);
    if kind.map(String::as_str) != Some(GENIE_CONNECTION_TYPE) {
        return Err(ConnectionError::WrongType {
            name: connection.name.clone(),
            found: kind.cloned(),
        });
    }
    connection
        .metadata
        .get(GENIE_SPACE_KEY)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConnectionError::MissingMetadata {
            name: connection.name.clone(),
            key: GENIE_SPACE_KEY,
        })
}

/// Builds a data service for a Genie space.
#[async_trait]
pub trait DataServiceFactory: Send + Sync {
    /// Creates a client for `space_id` on the workspace at `host`.
    async fn create(
        &self,
        host: &str,
        space_id: &str,
    ) -> Result<Arc<dyn DataService>, ConnectionError>;
}

/// Creates [`GenieClient`]s authenticated for the Databricks audience.
pub struct GenieFactory {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    sleeper: Arc<dyn Sleeper>,
    upstream: Upstream,
    poll: PollStrategy,
    max_rows: usize,
}

impl GenieFactory {
    /// Creates a factory from configuration.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &AgentConfig,
        credential: Arc<dyn TokenCredential>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            http,
            credential,
            sleeper,
            upstream: Upstream {
                tag: config.upstream.clone(),
                version: config.upstream_version.clone(),
            },
            poll: config.genie_poll,
            max_rows: config.genie_max_rows,
        }
    }
}

#[async_trait]
impl DataServiceFactory for GenieFactory {
    async fn create(
        &self,
        host: &str,
        space_id: &str,
    ) -> Result<Arc<dyn DataService>, ConnectionError> {
        if host.trim().is_empty() {
            return Err(ConnectionError::Client {
                message: "connection has no target host".to_string(),
            });
        }
        // Surface an unusable identity at connect time, not on the first tool call.
        self.credential.get_token(DATABRICKS_AUDIENCE_SCOPE).await?;
        Ok(Arc::new(GenieClient::new(
            self.http.clone(),
            host,
            Arc::clone(&self.credential),
            space_id,
            &self.upstream,
            self.poll,
            Arc::clone(&self.sleeper),
            self.max_rows,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn connection(metadata: &[(&str, &str)]) -> Connection {
        Connection {
            name: "dbx".to_string(),
            target: "https://adb-1.azuredatabricks.net".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_genie_connection_accepted() {
        let conn = connection(&[
            ("azure_databricks_connection_type", "genie"),
            ("genie_space_id", "space-1"),
        ]);
        assert_eq!(genie_space_id(&conn).ok(), Some("space-1"));
    }

    #[test]
    fn test_missing_type_marker_rejected() {
        let conn = connection(&[("genie_space_id", "space-1")]);
        assert!(matches!(
            genie_space_id(&conn),
            Err(ConnectionError::WrongType { found: None, .. })
        ));
    }

    #[test]
    fn test_other_type_rejected() {
        let conn = connection(&[
            ("azure_databricks_connection_type", "sql_warehouse"),
            ("genie_space_id", "space-1"),
        ]);
        assert!(matches!(
            genie_space_id(&conn),
            Err(ConnectionError::WrongType { found: Some(_), .. })
        ));
    }

    #[test]
    fn test_missing_space_rejected() {
        let conn = connection(&[("azure_databricks_connection_type", "genie")]);
        assert!(matches!(
            genie_space_id(&conn),
            Err(ConnectionError::MissingMetadata { .. })
        ));
    }
}
