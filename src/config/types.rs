use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Logical id reserved for the master in `NodeInfo::id`.
pub const MASTER_NODE_ID: i32 = -1;

/// Identity of a cluster member.
///
/// Workers use their position in the worker list as `id`; the master uses
/// [`MASTER_NODE_ID`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    pub id: i32,
    pub host: String,
    pub port: u16,
}

impl NodeInfo {
    pub fn new(id: i32, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, used both for dialing and as the log key of a link.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_master(&self) -> bool {
        self.id == MASTER_NODE_ID
    }
}

/// Console verbosity threshold. Ordered from most to least chatty.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Everything, including per-word shuffle traffic.
    Deep,
    #[default]
    Debug,
    Info,
    Warn,
    Err,
}

impl Verbosity {
    pub fn as_level(self) -> tracing::Level {
        match self {
            Verbosity::Deep => tracing::Level::TRACE,
            Verbosity::Debug => tracing::Level::DEBUG,
            Verbosity::Info => tracing::Level::INFO,
            Verbosity::Warn => tracing::Level::WARN,
            Verbosity::Err => tracing::Level::ERROR,
        }
    }
}

/// How workers hand back their sorted results during GATHER.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// Ship the full `"word: count"` listing to the master.
    Explicit,
    /// Keep the listing on the worker and report a marker only.
    #[default]
    KeepLocal,
}

impl ResultMode {
    pub const EXPLICIT: &'static str = "EXPLICIT";
    pub const KEEP_LOCAL: &'static str = "KEEP_LOCAL";

    /// Control string carried by `SORT_AND_SEND_RESULT`.
    pub fn control_string(self) -> &'static str {
        match self {
            ResultMode::Explicit => Self::EXPLICIT,
            ResultMode::KeepLocal => Self::KEEP_LOCAL,
        }
    }

    /// Unknown control strings fall back to `KeepLocal`.
    pub fn from_control_string(ctrl: &str) -> Self {
        match ctrl.trim() {
            Self::EXPLICIT => ResultMode::Explicit,
            Self::KEEP_LOCAL => ResultMode::KeepLocal,
            other => {
                tracing::warn!("Unknown result control string {:?}, keeping results local", other);
                ResultMode::KeepLocal
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cluster has no workers configured")]
    NoWorkers,

    #[error("worker at position {position} has id {id}; ids must be dense and in list order")]
    NonDenseIds { position: usize, id: i32 },

    #[error("worker id {0} is not in the configured peer list")]
    UnknownWorker(usize),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_output_path() -> PathBuf {
    PathBuf::from("final_result.txt")
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

/// Static description of the whole cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub master: NodeInfo,
    /// Canonical peer list; index = worker id.
    pub workers: Vec<NodeInfo>,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub result_mode: ResultMode,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Where workers persist their listing under `KEEP_LOCAL`. Unset = not persisted.
    #[serde(default)]
    pub local_result_dir: Option<PathBuf>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            master: NodeInfo::new(MASTER_NODE_ID, "localhost", 12345),
            workers: vec![NodeInfo::new(0, "localhost", 10001)],
            verbosity: Verbosity::default(),
            result_mode: ResultMode::default(),
            output_path: default_output_path(),
            local_result_dir: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ClusterConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Hashing and threshold routing index straight into `workers`, so ids
    /// must be exactly `0..n-1` in list order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.is_empty() {
            return Err(ConfigError::NoWorkers);
        }

        for (position, worker) in self.workers.iter().enumerate() {
            if worker.id < 0 || worker.id as usize != position {
                return Err(ConfigError::NonDenseIds {
                    position,
                    id: worker.id,
                });
            }
        }

        Ok(())
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, id: usize) -> Result<&NodeInfo, ConfigError> {
        self.workers.get(id).ok_or(ConfigError::UnknownWorker(id))
    }

    /// Outbound links a worker keeps: every other worker plus the master.
    pub fn worker_peers(&self, id: usize) -> Vec<NodeInfo> {
        self.workers
            .iter()
            .filter(|w| w.id as usize != id)
            .cloned()
            .chain(std::iter::once(self.master.clone()))
            .collect()
    }

    pub fn reconnect_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.reconnect_delay_ms)
    }
}
