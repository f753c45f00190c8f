//! Mutation events for user notifications
//!
//! The mutation coordinator publishes one event per protocol milestone.
//! A front end turns `Committed` and `RolledBack` into non-blocking
//! notifications.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a mutation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateBoard,
    UpdateBoard,
    DeleteBoard,
}

impl MutationKind {
    /// The verb, e.g. `create`.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::CreateTask | Self::CreateBoard => "create",
            Self::UpdateTask | Self::UpdateBoard => "update",
            Self::DeleteTask | Self::DeleteBoard => "delete",
        }
    }

    /// The entity, e.g. `task`.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::CreateTask | Self::UpdateTask | Self::DeleteTask => "task",
            Self::CreateBoard | Self::UpdateBoard | Self::DeleteBoard => "board",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self.verb() {
            "create" => "created",
            "update" => "updated",
            _ => "deleted",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.noun())
    }
}

/// Event types for mutation tracking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationEvent {
    /// Optimistic state written to the cache, remote call about to start
    Applied {
        kind: MutationKind,
        id: i64,
        timestamp: i64,
    },
    /// Remote call succeeded and the cache holds server data
    Committed {
        kind: MutationKind,
        id: i64,
        timestamp: i64,
    },
    /// Remote call failed and the cache was restored
    RolledBack {
        kind: MutationKind,
        id: Option<i64>,
        error: String,
        timestamp: i64,
    },
    /// Refused before any optimistic write; the cache was not touched
    Failed {
        kind: MutationKind,
        id: Option<i64>,
        error: String,
        timestamp: i64,
    },
}

impl MutationEvent {
    pub fn applied(kind: MutationKind, id: i64) -> Self {
        MutationEvent::Applied {
            kind,
            id,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn committed(kind: MutationKind, id: i64) -> Self {
        MutationEvent::Committed {
            kind,
            id,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn rolled_back(kind: MutationKind, id: Option<i64>, error: impl Into<String>) -> Self {
        MutationEvent::RolledBack {
            kind,
            id,
            error: error.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn failed(kind: MutationKind, id: Option<i64>, error: impl Into<String>) -> Self {
        MutationEvent::Failed {
            kind,
            id,
            error: error.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            MutationEvent::Applied { kind, .. }
            | MutationEvent::Committed { kind, .. }
            | MutationEvent::RolledBack { kind, .. }
            | MutationEvent::Failed { kind, .. } => *kind,
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> i64 {
        match self {
            MutationEvent::Applied { timestamp, .. }
            | MutationEvent::Committed { timestamp, .. }
            | MutationEvent::RolledBack { timestamp, .. }
            | MutationEvent::Failed { timestamp, .. } => *timestamp,
        }
    }

    /// Notification text for settled mutations; `None` for `Applied`.
    pub fn notification(&self) -> Option<String> {
        match self {
            MutationEvent::Applied { .. } => None,
            MutationEvent::Committed { kind, .. } => {
                let noun = kind.noun();
                let mut capitalized = noun[..1].to_uppercase();
                capitalized.push_str(&noun[1..]);
                Some(format!("{} {} successfully", capitalized, kind.past_tense()))
            }
            MutationEvent::RolledBack { kind, error, .. }
            | MutationEvent::Failed { kind, error, .. } => {
                Some(format!("Failed to {}: {}", kind, error))
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MutationEvent::RolledBack { .. } | MutationEvent::Failed { .. }
        )
    }
}
