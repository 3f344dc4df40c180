//! Model Router for task-based model selection
//!
//! The two AI calls of an analysis have different needs: factor discovery
//! wants low temperature and strict JSON, the explanation call is allowed more
//! latitude and a longer deadline. Each task gets its own model, timeout,
//! retry budget and temperature.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in the config dir (~/.local/share/vyapar/config/models.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::reference::{default_config_dir, read_document, DocumentSource};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/models.toml");

pub const MODELS_FILE: &str = "models.toml";

/// Task types for model routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Structured JSON: weighted factors and market estimates
    FactorDiscovery,
    /// Narrative prose around already-computed numbers
    Explanation,
}

impl TaskType {
    /// Get the config key for this task type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FactorDiscovery => "factor_discovery",
            Self::Explanation => "explanation",
        }
    }

    /// Get all task types
    pub fn all() -> &'static [TaskType] {
        &[Self::FactorDiscovery, Self::Explanation]
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "factor_discovery" => Ok(Self::FactorDiscovery),
            "explanation" => Ok(Self::Explanation),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a specific task type
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    /// Model pinned for this task; `None` uses the backend's own model
    pub model: Option<String>,
    /// Deadline for one upstream call
    pub timeout: Duration,
    /// Additional attempts after the first on transient failure
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    pub temperature: f32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            model: None,
            timeout: Duration::from_secs(60),
            max_retries: 1,
            retry_delay: Duration::from_millis(750),
            temperature: 0.2,
        }
    }
}

/// Router configuration
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Applied to any task without its own section
    pub defaults: TaskConfig,
    /// Per-task configurations
    pub tasks: HashMap<TaskType, TaskConfig>,
}

/// Model Router for task-based model selection
#[derive(Debug, Clone)]
pub struct ModelRouter {
    config: RouterConfig,
    source: DocumentSource,
}

impl ModelRouter {
    /// Load from the default config dir, falling back to the embedded config
    pub fn new() -> Result<Self> {
        Self::load_from(default_config_dir().as_deref())
    }

    /// Load with an override taken from a specific directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::load_from(Some(dir))
    }

    /// Create with an explicit configuration (for testing)
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            source: DocumentSource::Embedded,
        }
    }

    fn load_from(dir: Option<&Path>) -> Result<Self> {
        let (content, source) = read_document(dir, MODELS_FILE, DEFAULT_CONFIG)?;
        Ok(Self {
            config: parse_config(&content)?,
            source,
        })
    }

    /// Get the full task configuration
    pub fn config_for_task(&self, task: TaskType) -> TaskConfig {
        self.config
            .tasks
            .get(&task)
            .cloned()
            .unwrap_or_else(|| self.config.defaults.clone())
    }

    /// Get the model override for a task, if any
    pub fn model_for_task(&self, task: TaskType) -> Option<&str> {
        self.config
            .tasks
            .get(&task)
            .and_then(|c| c.model.as_deref())
            .or(self.config.defaults.model.as_deref())
    }

    /// Get the timeout for a task
    pub fn timeout_for_task(&self, task: TaskType) -> Duration {
        self.config_for_task(task).timeout
    }

    /// Get the router configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Where the configuration was loaded from
    pub fn source(&self) -> &DocumentSource {
        &self.source
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid models.toml override, using built-in defaults");
            Self::with_config(RouterConfig::default())
        })
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join(MODELS_FILE))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawTaskConfig>,
    models: Option<HashMap<String, RawTaskConfig>>,
}

#[derive(Debug, Deserialize)]
struct RawTaskConfig {
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    temperature: Option<f32>,
}

impl RawTaskConfig {
    fn apply(self, base: &TaskConfig) -> TaskConfig {
        TaskConfig {
            model: self.model.or_else(|| base.model.clone()),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(base.timeout),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay: self
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.retry_delay),
            temperature: self.temperature.unwrap_or(base.temperature),
        }
    }
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<RouterConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Configuration(format!("Invalid models TOML: {}", e)))?;

    let mut config = RouterConfig::default();

    if let Some(defaults) = raw.defaults {
        config.defaults = defaults.apply(&TaskConfig::default());
    }

    if let Some(models) = raw.models {
        for (task_name, task_config) in models {
            let Ok(task) = task_name.parse::<TaskType>() else {
                tracing::warn!(task = %task_name, "Skipping unknown task in models.toml");
                continue;
            };
            if task_config.timeout_secs == Some(0) {
                return Err(Error::Configuration(format!(
                    "models.{}: timeout_secs must be positive",
                    task_name
                )));
            }
            config
                .tasks
                .insert(task, task_config.apply(&config.defaults));
        }
    }

    Ok(config)
}
