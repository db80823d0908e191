use serde::{Deserialize, Serialize};

/// Officer decision on a document review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// Escalation policy for repeated document-review rejections.
///
/// Each rejection raises the application's strike counter by exactly one.
/// At the limit the applicant is sent back through phase-1 payment instead
/// of a free revision cycle; the counter itself never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikePolicy {
    pub limit: u32,
}

impl Default for StrikePolicy {
    fn default() -> Self {
        Self { limit: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeVerdict {
    /// Below the limit: ask the applicant to revise and resubmit.
    Revise,
    /// At or above the limit: force a fresh phase-1 payment.
    RetryPayment,
}

impl StrikePolicy {
    /// Verdict for a rejection that raises the counter to `strikes`.
    pub fn verdict(&self, strikes: u32) -> StrikeVerdict {
        if strikes >= self.limit {
            StrikeVerdict::RetryPayment
        } else {
            StrikeVerdict::Revise
        }
    }
}
