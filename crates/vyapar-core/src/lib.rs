//! Vyapar Core Library
//!
//! Feasibility scoring for small businesses in India:
//! - Budget parsing in Indian numeric shorthand (lakh, crore)
//! - City tier and business category classification
//! - Pluggable AI backends for factor discovery and narrative explanation
//! - Sanitization of every AI-sourced payload
//! - Deterministic scoring (weighted average or stump ensemble) with verdict bands
//! - Five-year projections with monthly seasonality
//! - Optional web search and macro statistics for prompt context
//! - Encrypted SQLite history of past analyses

pub mod ai;
pub mod analysis;
pub mod business;
pub mod db;
pub mod discovery;
pub mod error;
pub mod explanation;
pub mod location;
pub mod model_router;
pub mod models;
pub mod money;
pub mod projection;
pub mod prompts;
pub mod reference;
pub mod request;
pub mod sanitize;
pub mod scoring;
pub mod signals;

/// Test utilities including a mock upstream server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use analysis::{Analyzer, Classification};
pub use business::BusinessProfile;
pub use db::Database;
pub use error::{Error, Result};
pub use location::LocationProfile;
pub use model_router::{ModelRouter, RouterConfig, TaskConfig, TaskType};
pub use models::{AnalysisResult, AnalysisSummary, Factor, ScoringResult, Verdict};
pub use money::{format_inr, parse_budget, BudgetAmount};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use reference::ReferenceData;
pub use request::AnalysisRequest;
pub use scoring::{ScoringEngine, StrategyKind};
pub use signals::{ExternalSignalGateway, SignalDigest};
