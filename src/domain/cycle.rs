use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::{FetchError, ParseError, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    HttpStatus,
    Network,
    MalformedFeed,
    Storage,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded {
        seen: usize,
        inserted: usize,
        updated: usize,
        unchanged: usize,
    },
    Failed {
        kind: FailureKind,
        reason: String,
    },
}

impl SourceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SourceOutcome::Failed { kind, .. } => Some(*kind),
            SourceOutcome::Succeeded { .. } => None,
        }
    }
}

impl From<FetchError> for SourceOutcome {
    fn from(err: FetchError) -> Self {
        let kind = match err {
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::HttpStatus(_) => FailureKind::HttpStatus,
            FetchError::Network(_) => FailureKind::Network,
        };
        SourceOutcome::Failed {
            kind,
            reason: err.to_string(),
        }
    }
}

impl From<ParseError> for SourceOutcome {
    fn from(err: ParseError) -> Self {
        SourceOutcome::Failed {
            kind: FailureKind::MalformedFeed,
            reason: err.to_string(),
        }
    }
}

impl From<StorageError> for SourceOutcome {
    fn from(err: StorageError) -> Self {
        SourceOutcome::Failed {
            kind: FailureKind::Storage,
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleTotals {
    pub succeeded: usize,
    pub failed: usize,
    pub seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Result of one refresh cycle. Kept in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn outcome_for(&self, source: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }

    pub fn totals(&self) -> CycleTotals {
        self.sources
            .iter()
            .fold(CycleTotals::default(), |mut acc, r| {
                match r.outcome {
                    SourceOutcome::Succeeded {
                        seen,
                        inserted,
                        updated,
                        unchanged,
                    } => {
                        acc.succeeded += 1;
                        acc.seen += seen;
                        acc.inserted += inserted;
                        acc.updated += updated;
                        acc.unchanged += unchanged;
                    }
                    SourceOutcome::Failed { .. } => acc.failed += 1,
                }
                acc
            })
    }

    pub fn has_storage_failure(&self) -> bool {
        self.sources
            .iter()
            .any(|r| r.outcome.failure_kind() == Some(FailureKind::Storage))
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds() as f64
            / 1000.0
    }
}
