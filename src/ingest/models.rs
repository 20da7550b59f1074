use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::IngestError;
use crate::price_store::db_types::WindowResult;

/// Stages an event passes through, in order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Decode,
    AppendRaw,
    Accumulate,
    ComputeWindow,
    Persist,
    /// The worker running the event aborted, so how far it got is not known
    Unknown,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Decode => "decode",
            IngestStage::AppendRaw => "append_raw",
            IngestStage::Accumulate => "accumulate",
            IngestStage::ComputeWindow => "compute_window",
            IngestStage::Persist => "persist",
            IngestStage::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Why an event was deliberately left untouched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Price of zero or below cannot anchor a percentage deviation
    NonPositivePrice,
    /// Older than the configured maximum event age
    Stale { age_secs: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonPositivePrice => f.write_str("non-positive price"),
            SkipReason::Stale { age_secs } => write!(f, "stale by {}s", age_secs),
        }
    }
}

/// Everything the pipeline produced for one successfully ingested event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestedEvent {
    pub asset_id: String,
    pub observed_at: i64,
    pub bucket_start: i64,
    pub price: BigDecimal,
    pub result: WindowResult,
}

/// A failed event with enough context to replay it from the raw store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventFailure {
    /// Unknown when decoding failed before the asset could be read
    pub asset_id: Option<String>,
    pub observed_at: Option<i64>,
    pub stage: IngestStage,
    pub error: String,
    pub retryable: bool,
}

impl EventFailure {
    pub fn new(
        asset_id: Option<String>,
        observed_at: Option<i64>,
        stage: IngestStage,
        error: &IngestError,
    ) -> Self {
        Self {
            asset_id,
            observed_at,
            stage,
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Terminal outcome of one event within a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Success(IngestedEvent),
    Skipped {
        asset_id: String,
        skip: SkipReason,
    },
    Failed(EventFailure),
}

impl EventOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EventOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EventOutcome::Failed(_))
    }
}

/// Per-batch summary returned to the trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One entry per delivered payload, in delivery order
    pub outcomes: Vec<EventOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<EventOutcome>) -> Self {
        let mut report = BatchReport {
            batch_id: Uuid::new_v4(),
            total: outcomes.len(),
            succeeded: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::new(),
        };

        for outcome in &outcomes {
            match outcome {
                EventOutcome::Success(_) => report.succeeded += 1,
                EventOutcome::Skipped { .. } => report.skipped += 1,
                EventOutcome::Failed(_) => report.failed += 1,
            }
        }

        report.outcomes = outcomes;
        report
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let failure = EventFailure::new(
            None,
            None,
            IngestStage::Decode,
            &IngestError::decode("bad json"),
        );
        let outcomes = vec![
            EventOutcome::Failed(failure.clone()),
            EventOutcome::Skipped {
                asset_id: "bitcoin".to_string(),
                skip: SkipReason::NonPositivePrice,
            },
            EventOutcome::Failed(failure),
        ];

        let report = BatchReport::from_outcomes(outcomes);
        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 0);
        assert!(report.has_failures());
    }

    #[test]
    fn test_failure_carries_retryability() {
        let storage = EventFailure::new(
            Some("bitcoin".to_string()),
            Some(1),
            IngestStage::Accumulate,
            &IngestError::storage("connection refused"),
        );
        assert!(storage.retryable);

        let decode = EventFailure::new(None, None, IngestStage::Decode, &IngestError::decode("x"));
        assert!(!decode.retryable);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = EventOutcome::Skipped {
            asset_id: "solana".to_string(),
            skip: SkipReason::Stale { age_secs: 90 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["skip"]["reason"], "stale");
        assert_eq!(json["skip"]["age_secs"], 90);
    }
}
