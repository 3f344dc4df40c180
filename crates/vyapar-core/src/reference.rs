//! Reference data shared by every analysis
//!
//! The gazetteer, business benchmarks and scoring policy are TOML documents
//! compiled into the binary. Config is loaded with a two-layer resolution:
//! 1. Check for an override in the config dir (~/.local/share/vyapar/config/<file>)
//! 2. Fall back to the embedded default
//!
//! Tables are parsed once at startup and shared read-only behind an `Arc`.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::business::{BenchmarkTable, BusinessProfile};
use crate::error::{Error, Result};
use crate::location::{Gazetteer, LocationProfile};
use crate::scoring::ScoringPolicy;

pub const GAZETTEER_FILE: &str = "gazetteer.toml";
pub const BENCHMARKS_FILE: &str = "benchmarks.toml";
pub const POLICY_FILE: &str = "policy.toml";

/// Where a reference document was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Embedded,
    Override(PathBuf),
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentSource::Embedded => write!(f, "embedded"),
            DocumentSource::Override(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Summary line for `vyapar config show`
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub file: &'static str,
    pub version: u32,
    pub source: DocumentSource,
}

/// Immutable lookup tables used by the classifiers and the scoring engine
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub gazetteer: Gazetteer,
    pub benchmarks: BenchmarkTable,
    pub policy: ScoringPolicy,
    documents: Vec<DocumentInfo>,
}

impl ReferenceData {
    /// Load from the default config dir, falling back to embedded tables
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_dir().as_deref())
    }

    /// Load with overrides taken from a specific directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::load_from(Some(dir))
    }

    /// Embedded tables only (used by tests and `--no-overrides`)
    pub fn embedded() -> Result<Self> {
        Self::load_from(None)
    }

    fn load_from(dir: Option<&Path>) -> Result<Self> {
        let (text, gazetteer_source) =
            read_document(dir, GAZETTEER_FILE, crate::location::DEFAULT_GAZETTEER)?;
        let gazetteer = Gazetteer::from_toml(&text)?;

        let (text, benchmarks_source) =
            read_document(dir, BENCHMARKS_FILE, crate::business::DEFAULT_BENCHMARKS)?;
        let benchmarks = BenchmarkTable::from_toml(&text)?;

        let (text, policy_source) =
            read_document(dir, POLICY_FILE, crate::scoring::DEFAULT_POLICY)?;
        let policy = ScoringPolicy::from_toml(&text)?;

        let documents = vec![
            DocumentInfo {
                file: GAZETTEER_FILE,
                version: gazetteer.version(),
                source: gazetteer_source,
            },
            DocumentInfo {
                file: BENCHMARKS_FILE,
                version: benchmarks.version(),
                source: benchmarks_source,
            },
            DocumentInfo {
                file: POLICY_FILE,
                version: policy.version,
                source: policy_source,
            },
        ];

        info!(
            cities = gazetteer.city_count(),
            categories = benchmarks.len(),
            policy_version = policy.version,
            "Reference data loaded"
        );

        Ok(Self {
            gazetteer,
            benchmarks,
            policy,
            documents,
        })
    }

    /// Versions and origins of the loaded documents
    pub fn documents(&self) -> &[DocumentInfo] {
        &self.documents
    }

    pub fn classify_location(&self, raw: &str) -> LocationProfile {
        self.gazetteer.classify(raw)
    }

    pub fn classify_business(&self, idea: &str) -> BusinessProfile {
        self.benchmarks.classify(idea)
    }
}

/// Default config override directory
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("vyapar").join("config"))
}

/// Read a config document, preferring an override file when one exists
pub(crate) fn read_document(
    dir: Option<&Path>,
    file_name: &str,
    embedded: &'static str,
) -> Result<(Cow<'static, str>, DocumentSource)> {
    if let Some(dir) = dir {
        let path = dir.join(file_name);
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
            })?;
            return Ok((Cow::Owned(content), DocumentSource::Override(path)));
        }
    }
    Ok((Cow::Borrowed(embedded), DocumentSource::Embedded))
}
