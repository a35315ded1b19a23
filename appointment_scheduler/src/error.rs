use crate::types::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Slot length must be a positive number of minutes, got {0}")]
    InvalidDuration(i64),

    #[error("Invalid interval: start {start} is not before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{kind} {id} is still referenced by {referenced_by} and can't be purged")]
    Integrity {
        kind: EntityKind,
        id: EntityId,
        referenced_by: EntityKind,
    },

    #[error("Referenced {kind} {id} does not exist")]
    MissingReference { kind: EntityKind, id: EntityId },

    #[error("A reason is required to void {kind} {id}")]
    MissingVoidReason { kind: EntityKind, id: EntityId },

    #[error("Time slot {start} - {end} lies outside of its appointment block")]
    SlotOutsideBlock {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Time slot {start} - {end} overlaps time slot {existing}")]
    SlotOverlap {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        existing: EntityId,
    },

    #[error("{0} has to be saved first")]
    Unsaved(EntityKind),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
