use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, RexecError};

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "RXD";

fn default_listen_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_jobs() -> usize {
    10_000
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_job_retention_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    30
}

/// One triggerable command endpoint: `GET /run/<path>` runs `command` with
/// `args`. Immutable after load; replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub path: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// When false, at most one job for this endpoint may run at a time.
    #[serde(default)]
    pub allow_multi: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Upper bound on registered job records.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    /// Per-job cap on captured stdout; overflow is dropped and flagged.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// How long finished job records stay queryable before eviction.
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            endpoints: Vec::new(),
            max_jobs: default_max_jobs(),
            max_output_bytes: default_max_output_bytes(),
            job_retention_secs: default_job_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Configuration {
    /// Read, parse, and validate a configuration file. Environment overrides
    /// (`RXD_*`) are applied between parsing and validation, so an override
    /// that breaks validation is rejected like any other bad value.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RexecError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Configuration = serde_yaml::from_str(&raw).map_err(|e| {
            RexecError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.apply_overrides(&env_overrides());
        config.validate()?;
        Ok(config)
    }

    /// Apply `(name, value)` override pairs. Unparseable numeric values are
    /// logged and skipped rather than failing the whole load.
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) {
        for (name, value) in overrides {
            match name.as_str() {
                "RXD_LISTEN_ADDRESS" => self.listen_address = value.clone(),
                "RXD_MAX_JOBS" => match value.parse() {
                    Ok(n) => self.max_jobs = n,
                    Err(_) => tracing::warn!(%name, %value, "ignoring unparseable override"),
                },
                "RXD_MAX_OUTPUT_BYTES" => match value.parse() {
                    Ok(n) => self.max_output_bytes = n,
                    Err(_) => tracing::warn!(%name, %value, "ignoring unparseable override"),
                },
                "RXD_JOB_RETENTION_SECS" => match value.parse() {
                    Ok(n) => self.job_retention_secs = n,
                    Err(_) => tracing::warn!(%name, %value, "ignoring unparseable override"),
                },
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_address.parse::<SocketAddr>().map_err(|e| {
            RexecError::Config(format!(
                "invalid listen address {:?}: {}",
                self.listen_address, e
            ))
        })?;
        if self.max_output_bytes == 0 {
            return Err(RexecError::Config(
                "maxOutputBytes must be greater than zero".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.path.is_empty() {
                return Err(RexecError::Config("endpoint with empty path".to_string()));
            }
            if endpoint.path.contains('/') {
                return Err(RexecError::Config(format!(
                    "endpoint path {:?} must not contain '/'",
                    endpoint.path
                )));
            }
            if endpoint.command.is_empty() {
                return Err(RexecError::Config(format!(
                    "endpoint {:?} has an empty command",
                    endpoint.path
                )));
            }
            if !seen.insert(endpoint.path.as_str()) {
                return Err(RexecError::Config(format!(
                    "duplicate endpoint path {:?}",
                    endpoint.path
                )));
            }
        }
        Ok(())
    }

    /// Look up an endpoint by its route path.
    pub fn endpoint(&self, path: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.path == path)
    }
}

/// Collect `RXD_*` overrides from the process environment.
fn env_overrides() -> Vec<(String, String)> {
    std::env::vars()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect()
}

/// Holds the active configuration snapshot and the file it came from.
///
/// Readers clone the inner `Arc` and release the lock immediately, so they
/// always observe a complete, self-consistent configuration. `reload` builds
/// and validates a full replacement before swapping; on any failure the
/// previous snapshot stays active.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<Configuration>>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, initial: Configuration) -> Self {
        Self {
            path,
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub async fn current(&self) -> Arc<Configuration> {
        self.current.read().await.clone()
    }

    /// Re-read the configuration file and atomically swap the snapshot.
    /// In-flight jobs keep the endpoint reference they captured at trigger
    /// time and are unaffected.
    pub async fn reload(&self) -> Result<Arc<Configuration>> {
        let fresh = Configuration::load(&self.path).await?;
        let previous = self.current().await;
        if fresh.listen_address != previous.listen_address {
            tracing::warn!(
                old = %previous.listen_address,
                new = %fresh.listen_address,
                "listen address changed in config file; takes effect on restart"
            );
        }
        let snapshot = Arc::new(fresh);
        *self.current.write().await = snapshot.clone();
        Ok(snapshot)
    }
}
