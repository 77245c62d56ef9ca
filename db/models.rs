//! Row-shaped types returned by the gateway. No business logic here; see
//! `queries` for the SQL that produces these and `src/context.rs` /
//! `src/risk` upstream for what consumes them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A claimed row from the `job` queue table.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub retry_count: i32,
    pub payload: JobPayload,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobPayload {
    #[serde(rename = "assetId")]
    pub asset_id: Uuid,
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    #[serde(rename = "databaseStored", default = "default_true")]
    pub database_stored: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
        }
    }
}

/// Per SPEC_FULL.md §9, private and public attempts are modeled as a tagged
/// variant carrying the same fields rather than by inheritance.
#[derive(Debug, Clone)]
pub enum Attempt {
    Private(AttemptRow),
    Public(AttemptRow),
}

impl Attempt {
    pub fn row(&self) -> &AttemptRow {
        match self {
            Attempt::Private(r) | Attempt::Public(r) => r,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Attempt::Public(_))
    }
}

#[derive(Debug, Clone)]
pub struct AttemptRow {
    pub id: Uuid,
    pub test_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A detector event reduced to exactly what the gateway needs to persist it:
/// the type name, its recording-relative offset in seconds, and its `extra`
/// attribute map. The full typed `Event`/`EventKind` vocabulary lives in the
/// worker binary, not here, so this crate stays ignorant of event policy.
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub kind: String,
    pub timestamp_secs: f64,
    pub extra: serde_json::Value,
}

/// Per-run context resolved from the attempt and its owning test. Defaults
/// (§3) are applied by the resolver, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestContext {
    pub is_public: bool,
    pub total_questions: u32,
    pub duration_minutes: f64,
}

impl Default for TestContext {
    fn default() -> Self {
        TestContext {
            is_public: false,
            total_questions: 30,
            duration_minutes: 60.0,
        }
    }
}
