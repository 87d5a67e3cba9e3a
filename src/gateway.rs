//! Graph store reached through an HTTP gateway.
//!
//! The gateway holds the graph session behind a cookie: `connect` opens it
//! against the first reachable graph service endpoint, then every statement
//! is posted to `/api/db/exec` prefixed with `USE <space>;`.

use crate::backend::{GraphStore, QueryResult, QueryRow, StoreResult};
use crate::config::{parse_endpoint, PublisherConfig};
use crate::error::{GraphError, Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    username: &'a str,
    password: &'a str,
    address: &'a str,
    port: u16,
}

#[derive(Debug, Serialize)]
struct ExecRequest<'a> {
    gql: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    code: i64,
    #[serde(default)]
    data: Option<ExecData>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExecData {
    #[serde(default)]
    tables: Vec<HashMap<String, Value>>,
}

impl GatewayResponse {
    fn into_result(self) -> StoreResult<QueryResult> {
        if self.code != 0 {
            return Err(classify_message(self.message));
        }

        Ok(self
            .data
            .unwrap_or_default()
            .tables
            .into_iter()
            .map(|columns| QueryRow { columns })
            .collect())
    }
}

/// The gateway reports every failure as a nonzero code; existing elements
/// are recognised by the store's `Existed` message.
fn classify_message(message: String) -> StoreError {
    if message.contains("Existed") {
        StoreError::AlreadyExists(message)
    } else {
        StoreError::Execution(message)
    }
}

fn classify_transport(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::Unreachable(err.to_string())
    } else if err.status().is_some_and(|s| s.is_server_error()) {
        StoreError::Unreachable(err.to_string())
    } else {
        StoreError::Execution(err.to_string())
    }
}

pub struct GatewayStore {
    client: reqwest::Client,
    base_url: String,
    space: String,
    connected: AtomicBool,
}

impl GatewayStore {
    /// Open a session through the gateway, trying endpoints in order.
    pub async fn connect(config: &PublisherConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(config.max_pool_size)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GraphError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let base_url = config.gateway_url.trim_end_matches('/').to_string();
        let connect_url = format!("{}/api/db/connect", base_url);
        let mut last_error = StoreError::Unreachable("no endpoints configured".to_string());

        for endpoint in &config.endpoints {
            let Some((address, port)) = parse_endpoint(endpoint) else {
                continue;
            };

            let request = ConnectRequest {
                username: &config.user,
                password: &config.password,
                address,
                port,
            };

            let outcome = match client.post(&connect_url).json(&request).send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => match resp.json::<GatewayResponse>().await {
                        Ok(body) => body.into_result().map(|_| ()),
                        Err(e) => Err(classify_transport(e)),
                    },
                    Err(e) => Err(classify_transport(e)),
                },
                Err(e) => Err(classify_transport(e)),
            };

            match outcome {
                Ok(()) => {
                    tracing::info!(endpoint = %endpoint, gateway = %base_url, space = %config.space, "graph session opened");
                    return Ok(Self {
                        client,
                        base_url,
                        space: config.space.clone(),
                        connected: AtomicBool::new(true),
                    });
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "graph endpoint not usable, trying next");
                    last_error = e;
                }
            }
        }

        Err(GraphError::from_store(connect_url, last_error))
    }

    async fn post_exec(&self, gql: &str) -> StoreResult<QueryResult> {
        let url = format!("{}/api/db/exec", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&ExecRequest { gql })
            .send()
            .await
            .map_err(classify_transport)?
            .error_for_status()
            .map_err(classify_transport)?;

        let body: GatewayResponse = resp.json().await.map_err(classify_transport)?;
        body.into_result()
    }
}

#[async_trait]
impl GraphStore for GatewayStore {
    async fn execute(&self, statement: &str) -> StoreResult<QueryResult> {
        if !self.is_connected() {
            return Err(StoreError::Unreachable("session closed".to_string()));
        }
        let gql = format!("USE {}; {}", self.space, statement);
        self.post_exec(&gql).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let url = format!("{}/api/db/disconnect", self.base_url);
        let resp = self.client.post(&url).send().await.map_err(classify_transport)?;
        resp.error_for_status().map_err(classify_transport)?;
        tracing::info!(gateway = %self.base_url, "graph session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> StoreResult<QueryResult> {
        serde_json::from_str::<GatewayResponse>(body).unwrap().into_result()
    }

    #[test]
    fn test_success_rows() {
        let rows = parse(
            r#"{"code":0,"data":{"headers":["Field","Type","Null"],
                "tables":[{"Field":"name","Type":"string","Null":"YES"}]},"message":""}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_string("Type").as_deref(), Some("string"));
    }

    #[test]
    fn test_success_without_data() {
        assert_eq!(parse(r#"{"code":0}"#).unwrap().len(), 0);
    }

    #[test]
    fn test_existed_is_already_exists() {
        let err = parse(r#"{"code":-1,"message":"Existed!"}"#).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_other_failure_is_execution() {
        let err = parse(r#"{"code":-1,"message":"SyntaxError: syntax error near `TAGG'"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Execution(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = PublisherConfig::new("n", "r", "");
        assert!(matches!(
            GatewayStore::connect(&config).await,
            Err(GraphError::Configuration(_))
        ));
    }
}
