use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};

use crate::{
    error::{Result, SchedulingError},
    local_repository::LocalRepository,
    repository::Repository,
    types::{
        Appointment, AppointmentBlock, AppointmentType, Entity, EntityId, LocationId, ProviderId,
        TimeSlot, VoidState,
    },
};

pub fn ts(datetime: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(datetime)
        .unwrap()
        .with_timezone(&Utc)
}

pub struct Dataset {
    pub appointment_type: AppointmentType,
    pub blocks: Vec<AppointmentBlock>,
    pub slots: Vec<TimeSlot>,
    pub appointments: Vec<Appointment>,
}

/// One appointment type, three blocks, four slots (the third voided) and
/// three appointments (two in the first slot, one in the voided slot).
/// The third block has no slots.
pub fn standard_dataset<R: Repository>(repository: &R) -> Dataset {
    let appointment_type = repository
        .save(AppointmentType::new("Initial consultation", Some(30)))
        .unwrap();

    let first_block = repository
        .save(
            AppointmentBlock::new(
                ProviderId(1),
                LocationId(1),
                appointment_type.id,
                ts("2006-01-01T00:00:00.000Z"),
                ts("2006-01-01T00:00:00.200Z"),
            )
            .unwrap(),
        )
        .unwrap();
    let second_block = repository
        .save(
            AppointmentBlock::new(
                ProviderId(2),
                LocationId(1),
                appointment_type.id,
                ts("2007-01-01T00:00:00.000Z"),
                ts("2007-01-01T01:00:00.000Z"),
            )
            .unwrap(),
        )
        .unwrap();
    let empty_block = repository
        .save(
            AppointmentBlock::new(
                ProviderId(1),
                LocationId(2),
                appointment_type.id,
                ts("2008-01-01T08:00:00Z"),
                ts("2008-01-01T12:00:00Z"),
            )
            .unwrap(),
        )
        .unwrap();

    let first_block_id = first_block.id.unwrap();
    let second_block_id = second_block.id.unwrap();
    let mut voided_slot = TimeSlot::new(
        second_block_id,
        ts("2007-01-01T00:00:00.200Z"),
        ts("2007-01-01T00:30:00.000Z"),
    )
    .unwrap();
    voided_slot.void_state = VoidState::Voided {
        reason: "void reason".into(),
        voided_at: ts("2007-01-01T00:00:00Z"),
    };

    let slots: Vec<TimeSlot> = [
        TimeSlot::new(
            first_block_id,
            ts("2006-01-01T00:00:00.000Z"),
            ts("2006-01-01T00:00:00.100Z"),
        )
        .unwrap(),
        TimeSlot::new(
            first_block_id,
            ts("2006-01-01T00:00:00.100Z"),
            ts("2006-01-01T00:00:00.200Z"),
        )
        .unwrap(),
        voided_slot,
        TimeSlot::new(
            second_block_id,
            ts("2007-01-01T00:30:00Z"),
            ts("2007-01-01T01:00:00Z"),
        )
        .unwrap(),
    ]
    .into_iter()
    .map(|slot| repository.save(slot).unwrap())
    .collect();

    let appointments = [
        slot_id(&slots[0]),
        slot_id(&slots[0]),
        slot_id(&slots[2]),
    ]
    .into_iter()
    .map(|time_slot_id| {
        repository
            .save(Appointment::new(
                time_slot_id,
                Some(ProviderId(1)),
                appointment_type.id,
            ))
            .unwrap()
    })
    .collect();

    Dataset {
        appointment_type,
        blocks: vec![first_block, second_block, empty_block],
        slots,
        appointments,
    }
}

fn slot_id(slot: &TimeSlot) -> EntityId {
    slot.id.unwrap()
}

pub struct MockRepositoryCalls {
    pub calls_to_save: AtomicU64,
    pub calls_to_delete: AtomicU64,
    pub calls_to_transaction: AtomicU64,
    /// Saves beyond this count fail with a storage error.
    pub failing_save_after: AtomicU64,
}

/// Local repository that counts writes and can be told to fail.
#[derive(Clone)]
pub struct MockRepository {
    pub calls: Arc<MockRepositoryCalls>,
    store: LocalRepository,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(MockRepositoryCalls {
                calls_to_save: AtomicU64::default(),
                calls_to_delete: AtomicU64::default(),
                calls_to_transaction: AtomicU64::default(),
                failing_save_after: AtomicU64::new(u64::MAX),
            }),
            store: LocalRepository::default(),
        }
    }

    pub fn writes(&self) -> u64 {
        self.calls.calls_to_save.load(Ordering::SeqCst)
            + self.calls.calls_to_delete.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.calls_to_save.store(0, Ordering::SeqCst);
        self.calls.calls_to_delete.store(0, Ordering::SeqCst);
        self.calls.calls_to_transaction.store(0, Ordering::SeqCst);
    }

    pub fn fail_saves_after(&self, successful_saves: u64) {
        self.reset_calls();
        self.calls
            .failing_save_after
            .store(successful_saves, Ordering::SeqCst);
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn save<E: Entity>(&self, entity: E) -> Result<E> {
        let previous = self.calls.calls_to_save.fetch_add(1, Ordering::SeqCst);
        if previous >= self.calls.failing_save_after.load(Ordering::SeqCst) {
            return Err(SchedulingError::Storage("Supposed to fail".into()));
        }
        self.store.save(entity)
    }

    fn get_by_id<E: Entity>(&self, id: EntityId) -> Result<Option<E>> {
        self.store.get_by_id(id)
    }

    fn get_by_uuid<E: Entity>(&self, uuid: &str) -> Result<Option<E>> {
        self.store.get_by_uuid(uuid)
    }

    fn find_all<E: Entity>(&self, include_voided: bool) -> Result<Vec<E>> {
        self.store.find_all(include_voided)
    }

    fn find_by_predicate<E, P>(&self, predicate: P) -> Result<Vec<E>>
    where
        E: Entity,
        P: Fn(&E) -> bool,
    {
        self.store.find_by_predicate(predicate)
    }

    fn delete<E: Entity>(&self, entity: &E) -> Result<()> {
        self.calls.calls_to_delete.fetch_add(1, Ordering::SeqCst);
        self.store.delete(entity)
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.calls
            .calls_to_transaction
            .fetch_add(1, Ordering::SeqCst);
        self.store.transaction(|store| {
            let staged = MockRepository {
                calls: self.calls.clone(),
                store: store.clone(),
            };
            f(&staged)
        })
    }
}
