//! AI backend request types
//!
//! These types are backend-agnostic and used across all AI implementations.

use std::time::Duration;

use crate::model_router::{TaskConfig, TaskType};

/// One chat-style completion: a system prompt plus a single user turn
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub task: TaskType,
    pub system: String,
    pub user: String,
    /// Model override; `None` uses the backend's configured model
    pub model: Option<String>,
    pub temperature: f32,
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Ask the backend for a JSON-only reply where it supports that
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Build a request from a rendered prompt and the router's task config
    pub fn new(task: TaskType, system: String, user: String, config: &TaskConfig) -> Self {
        Self {
            task,
            system,
            user,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
            json_mode: true,
        }
    }

    /// Resolve the model name against a backend default
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default)
    }
}

/// Retry budget for one mandatory AI call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl From<&TaskConfig> for RetryPolicy {
    fn from(config: &TaskConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        }
    }
}
