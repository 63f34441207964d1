//! Step ledger for the trade sequence.
//!
//! Every step appends exactly one record, completed or failed, and the
//! ledger is returned wholesale no matter where the sequence stopped.
//! There is no rollback; the ledger is the audit trail of what actually
//! happened on chain.

use std::fmt;

use serde::Serialize;

/// The seven steps of the trade sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    Plan,
    Fund,
    ApproveSpend,
    ApproveCustody,
    Split,
    DeriveCredential,
    SubmitOrder,
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plan => "plan",
            Self::Fund => "fund",
            Self::ApproveSpend => "approve-spend",
            Self::ApproveCustody => "approve-custody",
            Self::Split => "split",
            Self::DeriveCredential => "derive-credential",
            Self::SubmitOrder => "submit-order",
        };
        f.write_str(name)
    }
}

/// How one step ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    /// Step finished; `reference` is its transaction hash, credential id,
    /// or order id when one exists.
    Completed { reference: Option<String> },
    Failed { error: String },
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: StepName,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Ordered record of the trade sequence.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StepLedger {
    records: Vec<StepRecord>,
}

impl StepLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&mut self, step: StepName, reference: Option<String>) {
        self.records.push(StepRecord {
            step,
            outcome: StepOutcome::Completed { reference },
        });
    }

    pub fn fail(&mut self, step: StepName, error: String) {
        self.records.push(StepRecord {
            step,
            outcome: StepOutcome::Failed { error },
        });
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Reference recorded for a completed step, if any.
    #[must_use]
    pub fn reference_of(&self, step: StepName) -> Option<&str> {
        self.records.iter().find_map(|record| match &record.outcome {
            StepOutcome::Completed { reference } if record.step == step => reference.as_deref(),
            _ => None,
        })
    }

    /// The failing record, when the sequence stopped early.
    #[must_use]
    pub fn failure(&self) -> Option<&StepRecord> {
        self.records
            .iter()
            .find(|record| matches!(record.outcome, StepOutcome::Failed { .. }))
    }

    #[must_use]
    pub fn is_complete_through(&self, step: StepName) -> bool {
        self.records.iter().any(|record| {
            record.step == step && matches!(record.outcome, StepOutcome::Completed { .. })
        })
    }
}
