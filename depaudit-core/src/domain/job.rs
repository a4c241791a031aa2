//! Audit jobs and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use utoipa::ToSchema;

use super::manifest::Manifest;

/// Queue-assigned job identifier.
///
/// Backed by a monotonically increasing counter and rendered as a decimal
/// string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid job id: {0}")]
pub struct JobIdParseError(String);

impl FromStr for JobId {
    type Err = JobIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(JobId)
            .map_err(|_| JobIdParseError(s.to_string()))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(JobId(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Enqueued, not yet claimed by a worker
    Waiting,
    /// Leased by exactly one worker
    Active,
    /// Report persisted
    Completed,
    /// Execution or persistence failed
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 4] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
    ];

    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Waiting ──► Active ──► Completed
    ///    ▲          │
    ///    └─(stall)──┴──► Failed
    /// ```
    pub fn valid_transitions(&self) -> &[JobState] {
        match self {
            Self::Waiting => &[Self::Active],
            Self::Active => &[Self::Completed, Self::Failed, Self::Waiting],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, target: JobState) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state: {}", other)),
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, thiserror::Error)]
#[error("job {job_id} cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub job_id: JobId,
    pub from: JobState,
    pub to: JobState,
}

/// A queued audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub data: Manifest,
    /// Number of times a worker claimed this job
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
}

impl Job {
    pub fn new(id: JobId, data: Manifest) -> Self {
        Self {
            id,
            state: JobState::Waiting,
            data,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failed_reason: None,
        }
    }

    /// Apply a state change, stamping the matching timestamp.
    pub fn transition(&mut self, target: JobState) -> Result<(), JobTransitionError> {
        if !self.state.can_transition_to(target) {
            return Err(JobTransitionError {
                job_id: self.id,
                from: self.state,
                to: target,
            });
        }

        let now = Utc::now();
        match target {
            JobState::Active => {
                self.started_at = Some(now);
                self.attempts += 1;
            }
            JobState::Completed | JobState::Failed => self.finished_at = Some(now),
            JobState::Waiting => self.started_at = None,
        }
        self.state = target;
        Ok(())
    }

    /// Move to [`JobState::Failed`] with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), JobTransitionError> {
        self.transition(JobState::Failed)?;
        self.failed_reason = Some(reason.into());
        Ok(())
    }
}

/// Number of jobs per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn increment(&mut self, state: JobState) {
        match state {
            JobState::Waiting => self.waiting += 1,
            JobState::Active => self.active += 1,
            JobState::Completed => self.completed += 1,
            JobState::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, state: JobState) -> u64 {
        match state {
            JobState::Waiting => self.waiting,
            JobState::Active => self.active,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
        }
    }
}
