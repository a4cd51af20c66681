use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JobId;

/// The closed set of job types the dispatcher knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    QuickCreate,
    QuickCreateFullUniverse,
    Compose,
    Tts,
}

impl JobType {
    /// Wire name used in persisted rows and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickCreate => "quick_create",
            Self::QuickCreateFullUniverse => "quick_create_full_universe",
            Self::Compose => "compose",
            Self::Tts => "tts",
        }
    }

    /// Prefix stamped onto job ids of this type
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::QuickCreate => "qc",
            Self::QuickCreateFullUniverse => "qcf",
            Self::Compose => "compose",
            Self::Tts => "tts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quick_create" => Some(Self::QuickCreate),
            "quick_create_full_universe" => Some(Self::QuickCreateFullUniverse),
            "compose" => Some(Self::Compose),
            "tts" => Some(Self::Tts),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle states.
///
/// `Completed` is the canonical internal spelling; the public API translates
/// it to `done` at the boundary via [`JobState::public_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl JobState {
    /// Internal state name as persisted in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Client-visible status string (`completed` to `done`)
    pub fn public_name(&self) -> &'static str {
        match self {
            Self::Completed => "done",
            other => other.as_str(),
        }
    }

    /// Accepts both the internal spelling and the public alias
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" | "done" => Some(Self::Completed),
            "error" => Some(Self::Error),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if the job has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted view of a job, as stored in the jobs table.
///
/// `job_type` stays in wire form because legacy rows carry `"unknown"`;
/// dispatch parses it and fails the job fatally when it is not one of the
/// known types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub state: JobState,
    /// Progress percentage in [0, 100]
    pub progress: i64,
    pub job_type: String,
    /// Opaque submitter payload, annotated with `user_id` and `credits_cost`
    pub payload: Value,
    /// Unix seconds
    pub created_at: i64,
}

impl JobRecord {
    /// Parse the wire-form type into the closed dispatchable set
    pub fn parsed_type(&self) -> Option<JobType> {
        JobType::parse(&self.job_type)
    }

    /// Credits debited for this job at submission, 0 when absent
    pub fn credits_cost(&self) -> i64 {
        self.payload
            .get("credits_cost")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Owner of the debit, when the job was charged
    pub fn user_id(&self) -> Option<&str> {
        self.payload.get("user_id").and_then(Value::as_str)
    }
}
