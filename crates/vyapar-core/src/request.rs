//! Analysis request and its validation

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder stored for absent optional fields
pub const NOT_SPECIFIED: &str = "Not specified";

pub const MIN_IDEA_CHARS: usize = 10;
pub const MAX_IDEA_CHARS: usize = 2000;
pub const MAX_LOCATION_CHARS: usize = 200;
pub const MAX_BUDGET_CHARS: usize = 100;

/// Raw request as received from the API or CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub business_idea: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
}

/// A request that passed validation; optional fields are filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub business_idea: String,
    pub location: String,
    pub budget: String,
    /// Whether the caller supplied a budget string at all
    pub budget_given: bool,
}

impl AnalysisRequest {
    pub fn new(business_idea: &str, location: Option<&str>, budget: Option<&str>) -> Self {
        Self {
            business_idea: business_idea.to_string(),
            location: location.map(str::to_string),
            budget: budget.map(str::to_string),
        }
    }

    /// Trim and bound every field
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let idea = self.business_idea.trim();
        let idea_len = idea.chars().count();
        if idea_len < MIN_IDEA_CHARS {
            return Err(Error::validation(
                "businessIdea",
                format!(
                    "Business idea must be at least {} characters",
                    MIN_IDEA_CHARS
                ),
            ));
        }
        if idea_len > MAX_IDEA_CHARS {
            return Err(Error::validation(
                "businessIdea",
                format!("Business idea must be at most {} characters", MAX_IDEA_CHARS),
            ));
        }

        let location = optional_field(self.location.as_deref(), "location", MAX_LOCATION_CHARS)?;
        let budget = optional_field(self.budget.as_deref(), "budget", MAX_BUDGET_CHARS)?;

        Ok(ValidatedRequest {
            business_idea: idea.to_string(),
            budget_given: budget.is_some(),
            location: location.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            budget: budget.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        })
    }
}

fn optional_field(value: Option<&str>, field: &'static str, max: usize) -> Result<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("{} must be at most {} characters", capitalize(field), max),
        ));
    }
    Ok(Some(value.to_string()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_idea_rejected() {
        let err = AnalysisRequest::new("  cafe   ", None, None)
            .validate()
            .unwrap_err();
        match err {
            Error::Validation { field, message } => {
                assert_eq!(field, "businessIdea");
                assert!(message.contains("at least 10"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_long_fields_rejected() {
        let long_idea = "a".repeat(MAX_IDEA_CHARS + 1);
        assert!(AnalysisRequest::new(&long_idea, None, None).validate().is_err());

        let long_location = "x".repeat(MAX_LOCATION_CHARS + 1);
        let err = AnalysisRequest::new("A cloud kitchen", Some(&long_location), None)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "location", .. }));

        let long_budget = "9".repeat(MAX_BUDGET_CHARS + 1);
        let err = AnalysisRequest::new("A cloud kitchen", None, Some(&long_budget))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "budget", .. }));
    }

    #[test]
    fn test_blank_optionals_become_placeholder() {
        let validated = AnalysisRequest::new("  A cloud kitchen  ", Some("   "), None)
            .validate()
            .unwrap();
        assert_eq!(validated.business_idea, "A cloud kitchen");
        assert_eq!(validated.location, NOT_SPECIFIED);
        assert_eq!(validated.budget, NOT_SPECIFIED);
        assert!(!validated.budget_given);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let idea = "चायकीदुकानहै";
        assert!(idea.chars().count() >= MIN_IDEA_CHARS);
        assert!(AnalysisRequest::new(idea, None, None).validate().is_ok());
    }

    #[test]
    fn test_deserializes_camel_case() {
        let request: AnalysisRequest = serde_json::from_str(
            r#"{"businessIdea": "Cloud kitchen in Bangalore", "budget": "15 lakhs"}"#,
        )
        .unwrap();
        assert_eq!(request.budget.as_deref(), Some("15 lakhs"));
        assert!(request.location.is_none());
    }
}
