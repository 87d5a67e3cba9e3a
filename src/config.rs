//! Publisher configuration loaded from code or environment variables.

use crate::error::{GraphError, Result};
use crate::reader::ReaderConfig;
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POOL_SIZE: usize = 10;

/// Configuration for a publish run
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Directory holding vertex record files
    pub vertex_dir: PathBuf,
    /// Directory holding edge record files
    pub edge_dir: PathBuf,
    /// Graph service `host:port` addresses, tried in order
    pub endpoints: Vec<String>,
    /// HTTP gateway fronting the graph service
    pub gateway_url: String,
    /// Graph space statements run in
    pub space: String,
    pub user: String,
    pub password: String,
    /// Rows per multi-row insert
    pub batch_size: usize,
    /// Retries after the first attempt of each statement
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    /// Maximum idle connections kept per endpoint
    pub max_pool_size: usize,
    /// Stamped on every element written by the run. Required.
    pub publish_tag: String,
    pub reader: ReaderConfig,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            vertex_dir: PathBuf::from("nodes"),
            edge_dir: PathBuf::from("relationships"),
            endpoints: vec!["localhost:9669".to_string()],
            gateway_url: "http://localhost:8080".to_string(),
            space: "metadata".to_string(),
            user: "root".to_string(),
            password: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            publish_tag: String::new(),
            reader: ReaderConfig::default(),
        }
    }
}

impl PublisherConfig {
    pub fn new(vertex_dir: impl Into<PathBuf>, edge_dir: impl Into<PathBuf>, publish_tag: impl Into<String>) -> Self {
        Self {
            vertex_dir: vertex_dir.into(),
            edge_dir: edge_dir.into(),
            publish_tag: publish_tag.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: impl Into<String>) -> Self {
        self.gateway_url = gateway_url.into();
        self
    }

    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = space.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }

    /// Reject settings a run cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.publish_tag.trim().is_empty() {
            return Err(GraphError::Configuration(
                "publish tag is required and must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(GraphError::Configuration("batch size must be at least 1".to_string()));
        }
        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(GraphError::Configuration(
                "at least one store endpoint is required".to_string(),
            ));
        }
        if let Some(bad) = self.endpoints.iter().find(|e| parse_endpoint(e).is_none()) {
            return Err(GraphError::Configuration(format!(
                "endpoint {:?} is not a host:port address",
                bad
            )));
        }
        if self.max_pool_size == 0 {
            return Err(GraphError::Configuration(
                "max pool size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `GRAPH_PUBLISH_TAG`: tag stamped on every written element
    ///
    /// Optional:
    /// - `GRAPH_PUBLISH_VERTEX_DIR`: vertex record directory (default: "nodes")
    /// - `GRAPH_PUBLISH_EDGE_DIR`: edge record directory (default: "relationships")
    /// - `GRAPH_STORE_ENDPOINTS`: comma-separated `host:port` list (default: "localhost:9669")
    /// - `GRAPH_STORE_GATEWAY_URL`: HTTP gateway base URL (default: "http://localhost:8080")
    /// - `GRAPH_STORE_SPACE`: graph space (default: "metadata")
    /// - `GRAPH_STORE_USER` / `GRAPH_STORE_PASSWORD`: credentials (default: "root" / "")
    /// - `GRAPH_PUBLISH_BATCH_SIZE`: rows per insert (default: 64)
    /// - `GRAPH_PUBLISH_RETRY_ATTEMPTS`: retries per statement (default: 4)
    /// - `GRAPH_PUBLISH_RETRY_BASE_MS`: backoff base in milliseconds (default: 1000)
    /// - `GRAPH_STORE_MAX_POOL_SIZE`: idle connections per endpoint (default: 10)
    /// - `GRAPH_PUBLISH_MAX_FIELD_SIZE`: largest accepted record field in bytes (default: unlimited)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let vertex_dir = std::env::var("GRAPH_PUBLISH_VERTEX_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.vertex_dir);

        let edge_dir = std::env::var("GRAPH_PUBLISH_EDGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.edge_dir);

        let endpoints: Vec<String> = match std::env::var("GRAPH_STORE_ENDPOINTS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.endpoints,
        };

        let gateway_url = std::env::var("GRAPH_STORE_GATEWAY_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.gateway_url);

        let space = std::env::var("GRAPH_STORE_SPACE").unwrap_or(defaults.space);
        let user = std::env::var("GRAPH_STORE_USER").unwrap_or(defaults.user);
        let password = std::env::var("GRAPH_STORE_PASSWORD").unwrap_or(defaults.password);
        let publish_tag = std::env::var("GRAPH_PUBLISH_TAG").unwrap_or_default();

        let batch_size = parse_var("GRAPH_PUBLISH_BATCH_SIZE")?.unwrap_or(defaults.batch_size);
        let retry_attempts =
            parse_var("GRAPH_PUBLISH_RETRY_ATTEMPTS")?.unwrap_or(defaults.retry_attempts);
        let retry_base_delay = parse_var::<u64>("GRAPH_PUBLISH_RETRY_BASE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);
        let max_pool_size =
            parse_var("GRAPH_STORE_MAX_POOL_SIZE")?.unwrap_or(defaults.max_pool_size);
        let max_field_size = parse_var::<usize>("GRAPH_PUBLISH_MAX_FIELD_SIZE")?;

        let config = Self {
            vertex_dir,
            edge_dir,
            endpoints,
            gateway_url,
            space,
            user,
            password,
            batch_size,
            retry_attempts,
            retry_base_delay,
            max_pool_size,
            publish_tag,
            reader: ReaderConfig { max_field_size },
        };

        tracing::info!(
            vertex_dir = %config.vertex_dir.display(),
            edge_dir = %config.edge_dir.display(),
            endpoints = ?config.endpoints,
            gateway_url = %config.gateway_url,
            space = %config.space,
            batch_size = config.batch_size,
            retry_attempts = config.retry_attempts,
            publish_tag = %config.publish_tag,
            "publisher configuration loaded"
        );

        config.validate()?;
        Ok(config)
    }
}

/// Split a `host:port` endpoint.
pub fn parse_endpoint(endpoint: &str) -> Option<(&str, u16)> {
    let (host, port) = endpoint.trim().rsplit_once(':')?;
    let port = port.parse().ok()?;
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GraphError::Configuration(format!("{} has an invalid value: {:?}", name, raw))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "GRAPH_PUBLISH_VERTEX_DIR",
        "GRAPH_PUBLISH_EDGE_DIR",
        "GRAPH_STORE_ENDPOINTS",
        "GRAPH_STORE_GATEWAY_URL",
        "GRAPH_STORE_SPACE",
        "GRAPH_STORE_USER",
        "GRAPH_STORE_PASSWORD",
        "GRAPH_PUBLISH_BATCH_SIZE",
        "GRAPH_PUBLISH_RETRY_ATTEMPTS",
        "GRAPH_PUBLISH_RETRY_BASE_MS",
        "GRAPH_STORE_MAX_POOL_SIZE",
        "GRAPH_PUBLISH_TAG",
        "GRAPH_PUBLISH_MAX_FIELD_SIZE",
    ];

    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
        for (k, v) in vars {
            std::env::set_var(k, v);
        }

        f();

        for (k, v) in &saved {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = PublisherConfig::new("n", "r", "run-1");
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.retry_attempts, 4);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.reader.max_field_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_publish_tag_rejected() {
        let err = PublisherConfig::new("n", "r", "  ").validate().unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
        assert!(err.to_string().contains("publish tag"));
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let config = PublisherConfig::new("n", "r", "t").with_batch_size(0);
        assert!(matches!(config.validate(), Err(GraphError::Configuration(_))));

        let config = PublisherConfig::new("n", "r", "t").with_endpoints(vec![]);
        assert!(matches!(config.validate(), Err(GraphError::Configuration(_))));

        let config = PublisherConfig::new("n", "r", "t").with_endpoints(vec!["http://graphd".into()]);
        assert!(matches!(config.validate(), Err(GraphError::Configuration(_))));

        let config = PublisherConfig::new("n", "r", "t").with_max_pool_size(0);
        assert!(matches!(config.validate(), Err(GraphError::Configuration(_))));
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(parse_endpoint("graphd:9669"), Some(("graphd", 9669)));
        assert_eq!(parse_endpoint(" 10.0.0.1:9669 "), Some(("10.0.0.1", 9669)));
        assert_eq!(parse_endpoint("graphd"), None);
        assert_eq!(parse_endpoint(":9669"), None);
        assert_eq!(parse_endpoint("graphd:port"), None);
    }

    #[test]
    fn test_from_env() {
        with_env_vars(
            &[
                ("GRAPH_PUBLISH_TAG", "nightly-2024-05-01"),
                ("GRAPH_STORE_ENDPOINTS", "graphd-a:9669, graphd-b:9669,"),
                ("GRAPH_STORE_GATEWAY_URL", "http://gateway:8080/"),
                ("GRAPH_PUBLISH_BATCH_SIZE", "100"),
                ("GRAPH_PUBLISH_RETRY_BASE_MS", "250"),
                ("GRAPH_PUBLISH_MAX_FIELD_SIZE", "1048576"),
            ],
            || {
                let config = PublisherConfig::from_env().unwrap();
                assert_eq!(config.publish_tag, "nightly-2024-05-01");
                assert_eq!(config.endpoints, vec!["graphd-a:9669", "graphd-b:9669"]);
                assert_eq!(config.gateway_url, "http://gateway:8080");
                assert_eq!(config.batch_size, 100);
                assert_eq!(config.retry_base_delay, Duration::from_millis(250));
                assert_eq!(config.reader.max_field_size, Some(1_048_576));
                assert_eq!(config.space, "metadata");
            },
        );
    }

    #[test]
    fn test_from_env_requires_tag() {
        with_env_vars(&[], || {
            let err = PublisherConfig::from_env().unwrap_err();
            assert!(matches!(err, GraphError::Configuration(_)));
        });
    }

    #[test]
    fn test_from_env_rejects_bad_number() {
        with_env_vars(
            &[("GRAPH_PUBLISH_TAG", "t"), ("GRAPH_PUBLISH_BATCH_SIZE", "lots")],
            || {
                let err = PublisherConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("GRAPH_PUBLISH_BATCH_SIZE"));
            },
        );
    }
}
