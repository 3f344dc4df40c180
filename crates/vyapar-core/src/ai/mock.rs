//! Mock backend for testing
//!
//! Returns canned, well-formed replies for both analysis tasks. Tests can
//! script a sequence of replies (prose, errors) to exercise retries and
//! failure mapping without a running model server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model_router::TaskType;

use super::types::CompletionRequest;
use super::AIBackend;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    RateLimited,
    QuotaExhausted,
    Unavailable,
}

/// Mock AI backend for testing
///
/// Scripted replies are consumed in order; once the script is empty the
/// backend falls back to the canned reply for the request's task.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            latency: None,
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Replies returned in order before falling back to canned ones
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            ..Self::new()
        }
    }

    /// Every call answers with the same text
    pub fn with_response(text: &str) -> Self {
        Self::scripted(vec![MockReply::Text(text.to_string()); 16])
    }

    /// Delay every reply (for deadline tests)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_scripted(&self) -> Option<MockReply> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_scripted() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::RateLimited) => Err(Error::UpstreamRateLimited("429 mock".into())),
            Some(MockReply::QuotaExhausted) => {
                Err(Error::UpstreamQuotaExhausted("429 insufficient_quota mock".into()))
            }
            Some(MockReply::Unavailable) => Err(Error::UpstreamUnavailable("503 mock".into())),
            None => Ok(match request.task {
                TaskType::FactorDiscovery => CANNED_DISCOVERY.to_string(),
                TaskType::Explanation => CANNED_EXPLANATION.to_string(),
            }),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

/// A cloud-kitchen style discovery reply
pub const CANNED_DISCOVERY: &str = r#"{
  "factors": [
    {"name": "Market demand", "weight": 0.25, "score": 78, "reasoning": "Steady delivery demand from working professionals.", "isLocationSpecific": false},
    {"name": "Competition", "weight": 0.20, "score": 55, "reasoning": "Many established delivery brands in the area.", "isLocationSpecific": false},
    {"name": "Location advantage", "weight": 0.15, "score": 80, "reasoning": "Dense residential and office catchment.", "isLocationSpecific": true},
    {"name": "Operational complexity", "weight": 0.15, "score": 65, "reasoning": "Kitchen operations and delivery partners to coordinate.", "isLocationSpecific": false},
    {"name": "Customer acquisition", "weight": 0.10, "score": 60, "reasoning": "Aggregator commissions raise acquisition cost.", "isLocationSpecific": false},
    {"name": "Licensing", "weight": 0.15, "score": 70, "reasoning": "FSSAI and trade licences are routine.", "isLocationSpecific": false}
  ],
  "marketEstimates": {
    "setupCostMin": 600000,
    "setupCostMax": 1000000,
    "monthlyRevenueMin": 350000,
    "monthlyRevenueMax": 450000,
    "monthlyExpenseMin": 260000,
    "monthlyExpenseMax": 320000,
    "directCompetitors": 25,
    "indirectCompetitors": 40,
    "marketSize": "₹4,000 Cr city food delivery market",
    "marketGrowth": "22% CAGR",
    "dataPoints": [
      {"metric": "Average order value", "minValue": 250, "maxValue": 400, "estimatedValue": 320, "unit": "INR", "source": "Industry estimate", "confidence": "medium"},
      {"metric": "Daily orders at steady state", "minValue": 40, "maxValue": 70, "estimatedValue": 50, "unit": "orders", "source": "Industry estimate", "confidence": "low"}
    ]
  }
}"#;

/// A narrative reply with three risks and a roadmap
pub const CANNED_EXPLANATION: &str = r#"{
  "summary": "The idea has solid demand and a workable cost structure, with competition as the main pressure.",
  "marketExplanation": "Urban delivery demand continues to grow with rising smartphone use.",
  "competitionExplanation": "Established brands dominate aggregator listings; a focused menu can still stand out.",
  "financialExplanation": "Monthly revenue comfortably covers operating costs once order volume stabilises.",
  "competitiveAdvantage": "A narrow, high-quality menu with fast delivery times.",
  "threats": ["Aggregator commission increases", "Price wars with larger brands"],
  "opportunities": ["Corporate lunch subscriptions", "Own-channel ordering"],
  "risks": [
    {"risk": "Aggregator dependence", "severity": "high", "mitigation": "Build a direct ordering channel early."},
    {"risk": "Food cost inflation", "severity": "medium", "mitigation": "Lock in supplier contracts quarterly."},
    {"risk": "Staff turnover", "severity": "low", "mitigation": "Cross-train kitchen staff."}
  ],
  "recommendations": ["Start with a limited menu", "Track unit economics weekly", "Secure FSSAI licence before launch"],
  "roadmap": {
    "phases": [
      {"name": "Setup", "duration": "0-2 months", "tasks": ["Lease kitchen", "Obtain licences"], "milestones": ["Kitchen ready"]},
      {"name": "Launch", "duration": "3-6 months", "tasks": ["List on aggregators", "Run launch offers"], "milestones": ["50 orders per day"]},
      {"name": "Scale", "duration": "7-12 months", "tasks": ["Add a second brand"], "milestones": ["Break-even"]}
    ],
    "explanation": "Phases are sequenced to reach break-even before expanding."
  },
  "expertInsights": ["Menu engineering matters more than menu size.", "Negotiate aggregator commissions after three months of volume."]
}"#;
