use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Passed => "PASS",
            Outcome::Failed => "FAIL",
            Outcome::Skipped => "SKIP",
        };
        f.write_str(s)
    }
}

/// Where a probe stopped when it did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configuration,
    /// Required page state was absent before the probe started.
    Precondition,
    Resolution,
    Action,
    Verification,
    /// Launch or navigation failure that ends the session.
    Environment,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Configuration => "configuration",
            Phase::Precondition => "precondition",
            Phase::Resolution => "resolution",
            Phase::Action => "action",
            Phase::Verification => "verification",
            Phase::Environment => "environment",
        };
        f.write_str(s)
    }
}

/// Recorded outcome of one capability probe. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeVerdict {
    pub capability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ProbeVerdict {
    pub fn passed(capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(capability, Outcome::Passed, None, detail)
    }

    pub fn failed(capability: impl Into<String>, phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(capability, Outcome::Failed, Some(phase), detail)
    }

    pub fn skipped(capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            capability,
            Outcome::Skipped,
            Some(Phase::Configuration),
            detail,
        )
    }

    fn new(
        capability: impl Into<String>,
        outcome: Outcome,
        phase: Option<Phase>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            page: None,
            outcome,
            phase,
            detail: detail.into(),
            timestamp: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn on_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a ProbeVerdict>) -> Self {
        let mut summary = Summary::default();
        for verdict in verdicts {
            match verdict.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// True only when something ran and everything that ran passed.
    pub fn all_passed(&self) -> bool {
        self.passed > 0 && self.failed == 0 && self.skipped == 0
    }
}

/// Flat report handed to report sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
    pub verdicts: Vec<ProbeVerdict>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(timestamp: DateTime<Utc>, verdicts: Vec<ProbeVerdict>) -> Self {
        let summary = Summary::from_verdicts(&verdicts);
        Self {
            timestamp,
            base_url: None,
            pages: Vec::new(),
            verdicts,
            summary,
        }
    }

    pub fn with_target(mut self, base_url: impl Into<String>, pages: Vec<String>) -> Self {
        self.base_url = Some(base_url.into());
        self.pages = pages;
        self
    }

    pub fn exit_code(&self) -> i32 {
        if self.summary.all_passed() { 0 } else { 1 }
    }
}
