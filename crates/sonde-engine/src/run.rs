use chrono::{DateTime, Utc};
use sonde_common::verdict::{Outcome, Phase, ProbeVerdict, RunReport, Summary};

/// Capability name used for whole-run verdicts (launch or navigation failures).
pub const RUN_CAPABILITY: &str = "run";

/// Ordered verdicts of one run, threaded explicitly through sessions.
#[derive(Debug, Clone)]
pub struct ProbeRun {
    started_at: DateTime<Utc>,
    verdicts: Vec<ProbeVerdict>,
    fatal: bool,
}

impl Default for ProbeRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeRun {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            verdicts: Vec::new(),
            fatal: false,
        }
    }

    /// Append a verdict. Insertion order is execution order.
    pub fn record(&mut self, verdict: ProbeVerdict) -> &ProbeVerdict {
        self.verdicts.push(verdict);
        &self.verdicts[self.verdicts.len() - 1]
    }

    /// Record a failure that ended the session early.
    pub fn record_fatal(&mut self, page: Option<&str>, message: impl Into<String>) {
        let mut verdict = ProbeVerdict::failed(RUN_CAPABILITY, Phase::Environment, message);
        if let Some(page) = page {
            verdict = verdict.on_page(page);
        }
        self.fatal = true;
        self.verdicts.push(verdict);
    }

    pub fn verdicts(&self) -> &[ProbeVerdict] {
        &self.verdicts
    }

    /// Outcome of the latest verdict for `capability` on `page`.
    pub fn outcome_of(&self, page: Option<&str>, capability: &str) -> Option<Outcome> {
        self.verdicts
            .iter()
            .rev()
            .find(|v| v.capability == capability && v.page.as_deref() == page)
            .map(|v| v.outcome)
    }

    pub fn summary(&self) -> Summary {
        Summary::from_verdicts(&self.verdicts)
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn has_failures(&self) -> bool {
        self.verdicts.iter().any(|v| v.outcome != Outcome::Passed)
    }

    /// Append another run's verdicts after this one's.
    pub fn merge(&mut self, other: ProbeRun) {
        self.started_at = self.started_at.min(other.started_at);
        self.fatal |= other.fatal;
        self.verdicts.extend(other.verdicts);
    }

    pub fn into_report(self) -> RunReport {
        RunReport::new(self.started_at, self.verdicts)
    }
}
