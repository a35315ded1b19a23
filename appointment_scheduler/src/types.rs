use crate::error::{Result, SchedulingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use uuid::Uuid;

/// Surrogate key assigned by the repository on first save.
pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    AppointmentType,
    AppointmentBlock,
    TimeSlot,
    Appointment,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::AppointmentType => "Appointment type",
            EntityKind::AppointmentBlock => "Appointment block",
            EntityKind::TimeSlot => "Time slot",
            EntityKind::Appointment => "Appointment",
        };
        f.write_str(name)
    }
}

/// Non-owning pointer from one stored row to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub i64);

/// Soft-delete state. A voided row stays retrievable by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VoidState {
    #[default]
    Active,
    Voided {
        reason: String,
        voided_at: DateTime<Utc>,
    },
}

impl VoidState {
    pub fn is_voided(&self) -> bool {
        matches!(self, VoidState::Voided { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            VoidState::Active => None,
            VoidState::Voided { reason, .. } => Some(reason),
        }
    }
}

/// Common surface of everything the repository stores.
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: EntityId);
    fn uuid(&self) -> Uuid;
    fn void_state(&self) -> &VoidState;
    fn set_void_state(&mut self, state: VoidState);

    /// Rows this entity points at. Used for referential integrity.
    fn references(&self) -> Vec<EntityRef>;

    fn is_voided(&self) -> bool {
        self.void_state().is_voided()
    }
}

macro_rules! entity_accessors {
    () => {
        fn id(&self) -> Option<EntityId> {
            self.id
        }

        fn set_id(&mut self, id: EntityId) {
            self.id = Some(id);
        }

        fn uuid(&self) -> Uuid {
            self.uuid
        }

        fn void_state(&self) -> &VoidState {
            &self.void_state
        }

        fn set_void_state(&mut self, state: VoidState) {
            self.void_state = state;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentType {
    pub id: Option<EntityId>,
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub void_state: VoidState,
}

impl AppointmentType {
    pub fn new(name: impl Into<String>, duration_minutes: Option<i64>) -> Self {
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            name: name.into(),
            description: None,
            duration_minutes,
            void_state: VoidState::Active,
        }
    }
}

impl Entity for AppointmentType {
    const KIND: EntityKind = EntityKind::AppointmentType;

    entity_accessors!();

    fn references(&self) -> Vec<EntityRef> {
        vec![]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentBlock {
    pub id: Option<EntityId>,
    pub uuid: Uuid,
    pub provider: ProviderId,
    pub location: LocationId,
    pub appointment_type_id: Option<EntityId>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub void_state: VoidState,
}

impl AppointmentBlock {
    pub fn new(
        provider: ProviderId,
        location: LocationId,
        appointment_type_id: Option<EntityId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self> {
        if start >= end {
            return Err(SchedulingError::InvalidRange { start, end });
        }
        Ok(Self {
            id: None,
            uuid: Uuid::new_v4(),
            provider,
            location,
            appointment_type_id,
            start,
            end,
            void_state: VoidState::Active,
        })
    }

    /// Whole minutes between start and end.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= start && end <= self.end
    }
}

impl Entity for AppointmentBlock {
    const KIND: EntityKind = EntityKind::AppointmentBlock;

    entity_accessors!();

    fn references(&self) -> Vec<EntityRef> {
        self.appointment_type_id
            .map(|id| EntityRef::new(EntityKind::AppointmentType, id))
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Option<EntityId>,
    pub uuid: Uuid,
    pub block_id: EntityId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub void_state: VoidState,
}

impl TimeSlot {
    pub fn new(block_id: EntityId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(SchedulingError::InvalidRange { start, end });
        }
        Ok(Self {
            id: None,
            uuid: Uuid::new_v4(),
            block_id,
            start,
            end,
            void_state: VoidState::Active,
        })
    }

    pub fn length_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Entity for TimeSlot {
    const KIND: EntityKind = EntityKind::TimeSlot;

    entity_accessors!();

    fn references(&self) -> Vec<EntityRef> {
        vec![EntityRef::new(EntityKind::AppointmentBlock, self.block_id)]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Rescheduled,
    WalkIn,
    Cancelled,
    Waiting,
    InConsultation,
    Completed,
    Missed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Option<EntityId>,
    pub uuid: Uuid,
    pub time_slot_id: EntityId,
    pub provider: Option<ProviderId>,
    pub appointment_type_id: Option<EntityId>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    #[serde(default)]
    pub void_state: VoidState,
}

impl Appointment {
    pub fn new(
        time_slot_id: EntityId,
        provider: Option<ProviderId>,
        appointment_type_id: Option<EntityId>,
    ) -> Self {
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            time_slot_id,
            provider,
            appointment_type_id,
            status: AppointmentStatus::Scheduled,
            reason: None,
            void_state: VoidState::Active,
        }
    }
}

impl Entity for Appointment {
    const KIND: EntityKind = EntityKind::Appointment;

    entity_accessors!();

    fn references(&self) -> Vec<EntityRef> {
        let mut references = vec![EntityRef::new(EntityKind::TimeSlot, self.time_slot_id)];
        if let Some(id) = self.appointment_type_id {
            references.push(EntityRef::new(EntityKind::AppointmentType, id));
        }
        references
    }
}
