//! Prompt Library for the analysis calls
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/vyapar/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! This allows operators to tune wording without modifying the source, while
//! automatically getting new default prompts on upgrade. All prompts are
//! parsed once when the library is built and shared read-only afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const DISCOVER_FACTORS: &str = include_str!("../../../prompts/discover_factors.md");
    pub const EXPLAIN_ANALYSIS: &str = include_str!("../../../prompts/explain_analysis.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Weighted factors plus market estimates (JSON)
    DiscoverFactors,
    /// Narrative around the computed numbers (JSON)
    ExplainAnalysis,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoverFactors => "discover_factors",
            Self::ExplainAnalysis => "explain_analysis",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::DiscoverFactors, Self::ExplainAnalysis]
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::DiscoverFactors => defaults::DISCOVER_FACTORS,
            Self::ExplainAnalysis => defaults::EXPLAIN_ANALYSIS,
        }
    }
}

impl std::str::FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PromptId::all()
            .iter()
            .find(|id| id.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown prompt: {}", s))
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Task type for model routing (factor_discovery, explanation)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn is_override(&self) -> bool {
        self.override_path.is_some()
    }

    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the system section (empty when the prompt has none)
    pub fn render_system(&self, vars: &HashMap<&str, String>) -> String {
        self.system_section()
            .map(|s| render_template(s, vars))
            .unwrap_or_default()
    }

    /// Render the user section, or the whole prompt if it has no sections
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        render_template(self.user_section().unwrap_or(&self.content), vars)
    }
}

/// Prompt library holding every known prompt
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    prompts: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Load with overrides from the default data directory
    pub fn new() -> Result<Self> {
        Self::load(default_prompts_dir())
    }

    /// Load with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Embedded prompts only
    pub fn embedded_only() -> Result<Self> {
        Self::load(None)
    }

    fn load(override_dir: Option<PathBuf>) -> Result<Self> {
        let mut prompts = HashMap::new();
        for &id in PromptId::all() {
            prompts.insert(id, load_prompt(id, override_dir.as_deref())?);
        }
        Ok(Self {
            override_dir,
            prompts,
        })
    }

    /// Get a prompt by ID
    pub fn get(&self, id: PromptId) -> Result<&Prompt> {
        self.prompts
            .get(&id)
            .ok_or_else(|| Error::Configuration(format!("prompt {} not loaded", id.as_str())))
    }

    /// List all prompts with their override status
    pub fn list(&self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .filter_map(|id| self.prompts.get(id).map(|p| (id, p)))
            .map(|(id, prompt)| PromptInfo {
                id: id.as_str().to_string(),
                version: prompt.metadata.version,
                task_type: prompt.metadata.task_type.clone(),
                has_override: prompt.is_override(),
                override_path: prompt.override_path.clone(),
            })
            .collect()
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    /// Task type for model routing
    pub task_type: String,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("vyapar").join("prompts").join("overrides"))
}

/// Load a prompt (checking override first, then default)
fn load_prompt(id: PromptId, override_dir: Option<&Path>) -> Result<Prompt> {
    if let Some(dir) = override_dir {
        let override_path = dir.join(format!("{}.md", id.as_str()));
        if override_path.exists() {
            let content = fs::read_to_string(&override_path).map_err(|e| {
                Error::Configuration(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            tracing::info!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
            return Ok(Prompt {
                metadata,
                content: body,
                override_path: Some(override_path),
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        override_path: None,
    })
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::Configuration(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Configuration("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Configuration(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Resolve conditionals, then substitute `{{var}}` in a single pass
///
/// Substituted values are never re-scanned, so user text containing braces
/// cannot open or close template blocks.
fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let resolved = resolve_conditionals(template, vars);
    let mut out = String::with_capacity(resolved.len());
    let mut rest = resolved.as_str();

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    // Unknown placeholders render empty
                    None if is_identifier(name) => {}
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Keep `{{#if var}}...{{/if}}` blocks whose variable is non-empty, drop the rest
fn resolve_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    loop {
        let Some(if_start) = result.find("{{#if ") else {
            break;
        };
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].trim().to_string();
        let block_start = var_start + var_end + 2;
        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let full_end = block_start + endif_pos + 7;

        let keep = vars
            .get(var_name.as_str())
            .is_some_and(|v| !v.trim().is_empty());
        result = if keep {
            format!(
                "{}{}{}",
                &result[..if_start],
                &result[block_start..block_start + endif_pos],
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
task_type: explanation
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_extract_section() {
        let content = "# System\nSystem content here.\n\n# User\nUser content here.";
        assert_eq!(extract_section(content, "# System"), Some("System content here."));
        assert_eq!(extract_section(content, "# User"), Some("User content here."));
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "Start{{#if signals}}\nContext: {{signals}}{{/if}}\nEnd";

        let rendered = render_template(template, &vars(&[("signals", "GDP growth 6.5%")]));
        assert!(rendered.contains("Context: GDP growth 6.5%"));

        let rendered = render_template(template, &vars(&[("signals", "  ")]));
        assert!(!rendered.contains("Context:"));
        assert!(rendered.starts_with("Start"));
        assert!(rendered.ends_with("End"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let rendered = render_template(
            "Idea: {{business_idea}} / {{location}}",
            &vars(&[
                ("business_idea", "{{location}} {{#if x}}"),
                ("location", "Pune"),
            ]),
        );
        assert_eq!(rendered, "Idea: {{location}} {{#if x}} / Pune");
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        assert_eq!(render_template("a{{missing}}b", &HashMap::new()), "ab");
        assert_eq!(render_template("json {{ not a var }}", &HashMap::new()), "json {{ not a var }}");
    }

    #[test]
    fn test_embedded_prompts_load() {
        let lib = PromptLibrary::embedded_only().unwrap();
        for id in PromptId::all() {
            let prompt = lib.get(*id).unwrap();
            assert_eq!(prompt.metadata.id, id.as_str());
            assert!(!prompt.is_override());
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().is_some());
        }
        assert_eq!(lib.list().len(), 2);
    }

    #[test]
    fn test_task_types_match_router() {
        let lib = PromptLibrary::embedded_only().unwrap();
        for info in lib.list() {
            assert!(info
                .task_type
                .parse::<crate::model_router::TaskType>()
                .is_ok());
        }
    }

    #[test]
    fn test_override_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("explain_analysis.md"),
            "---\nid: explain_analysis\nversion: 9\ntask_type: explanation\n---\n# System\nShort.\n# User\n{{verdict}}\n",
        )
        .unwrap();

        let lib = PromptLibrary::with_override_dir(dir.path().to_path_buf()).unwrap();
        let prompt = lib.get(PromptId::ExplainAnalysis).unwrap();
        assert!(prompt.is_override());
        assert_eq!(prompt.metadata.version, 9);
        assert_eq!(prompt.render_user(&vars(&[("verdict", "GO")])), "GO");
        assert!(!lib.get(PromptId::DiscoverFactors).unwrap().is_override());
    }

    #[test]
    fn test_prompt_id_parse() {
        assert_eq!(
            "discover_factors".parse::<PromptId>().unwrap(),
            PromptId::DiscoverFactors
        );
        assert!("classify_merchant".parse::<PromptId>().is_err());
    }
}
