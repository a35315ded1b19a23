use crate::{
    availability::live_slots_in_block,
    error::{Result, SchedulingError},
    repository::Repository,
    types::{AppointmentBlock, EntityId, EntityKind, TimeSlot},
};
use chrono::Duration;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{debug, info, warn};

/// Splits `block` into contiguous slots of `slot_length_minutes`, starting at
/// `block.start`. Minutes left over at the end of the block stay uncovered.
pub fn generate_slots(block: &AppointmentBlock, slot_length_minutes: i64) -> Result<Vec<TimeSlot>> {
    let count = slot_count(block, slot_length_minutes)?;
    let block_id = block
        .id
        .ok_or(SchedulingError::Unsaved(EntityKind::AppointmentBlock))?;
    if count == 0 {
        return Ok(vec![]);
    }

    let length = Duration::minutes(slot_length_minutes);
    let mut start = block.start;
    (0..count)
        .map(|_| {
            let end = start + length;
            let slot = TimeSlot::new(block_id, start, end);
            start = end;
            slot
        })
        .collect()
}

fn slot_count(block: &AppointmentBlock, slot_length_minutes: i64) -> Result<i64> {
    if slot_length_minutes <= 0 {
        return Err(SchedulingError::InvalidDuration(slot_length_minutes));
    }
    if block.start >= block.end {
        return Err(SchedulingError::InvalidRange {
            start: block.start,
            end: block.end,
        });
    }
    Ok(block.duration_minutes() / slot_length_minutes)
}

/// Purges and recreates the slots of `block` when the slot count implied by
/// `slot_length_minutes` differs from the current one, or when a live slot
/// no longer lies inside the block. Must run inside a transaction.
fn replace_slots<R: Repository>(
    repository: &R,
    block: &AppointmentBlock,
    slot_length_minutes: i64,
) -> Result<Vec<TimeSlot>> {
    let count = slot_count(block, slot_length_minutes)?;
    let block_id = block
        .id
        .ok_or(SchedulingError::Unsaved(EntityKind::AppointmentBlock))?;

    let current = live_slots_in_block(repository, block_id)?;
    let inside = current
        .iter()
        .all(|slot| block.contains(slot.start, slot.end));
    if inside && current.len() as i64 == count {
        debug!(block_id, count, "Slot count unchanged, keeping slots");
        return Ok(current);
    }

    info!(
        block_id,
        current = current.len(),
        count,
        inside,
        slot_length_minutes,
        "Replacing slots"
    );
    let existing: Vec<TimeSlot> =
        repository.find_by_predicate(|slot: &TimeSlot| slot.block_id == block_id)?;
    for slot in &existing {
        repository.delete(slot)?;
    }

    generate_slots(block, slot_length_minutes)?
        .into_iter()
        .map(|slot| repository.save(slot))
        .collect()
}

#[derive(Clone)]
pub struct SlotGenerator<R: Repository> {
    repository: R,
    block_locks: Arc<Mutex<HashMap<EntityId, Arc<Mutex<()>>>>>,
}

impl<R: Repository> SlotGenerator<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            block_locks: Arc::default(),
        }
    }

    /// Replaces the slots of a saved block if the slot count changed.
    /// All-or-nothing: on failure the previous slots remain untouched.
    pub fn regenerate_slots(
        &self,
        block: &AppointmentBlock,
        slot_length_minutes: i64,
    ) -> Result<Vec<TimeSlot>> {
        let block_id = block
            .id
            .ok_or(SchedulingError::Unsaved(EntityKind::AppointmentBlock))?;

        self.with_block_lock(Some(block_id), || {
            self.repository
                .transaction(|repository| replace_slots(repository, block, slot_length_minutes))
        })
        .inspect_err(|err| warn!(block_id, %err, "Slot regeneration aborted"))
    }

    /// Saves the block and brings its slots in line with
    /// `slot_length_minutes` in a single transaction.
    pub fn save_block(
        &self,
        block: AppointmentBlock,
        slot_length_minutes: i64,
    ) -> Result<(AppointmentBlock, Vec<TimeSlot>)> {
        slot_count(&block, slot_length_minutes)?;

        self.with_block_lock(block.id, move || {
            self.repository.transaction(move |repository| {
                let block = repository.save(block)?;
                let slots = replace_slots(repository, &block, slot_length_minutes)?;
                info!(block_id = block.id, slots = slots.len(), "Saved appointment block");
                Ok((block, slots))
            })
        })
    }

    /// Length in minutes of the first live slot of the block.
    pub fn current_slot_length(&self, block: &AppointmentBlock) -> Result<Option<i64>> {
        let Some(block_id) = block.id else {
            return Ok(None);
        };
        Ok(live_slots_in_block(&self.repository, block_id)?
            .first()
            .map(TimeSlot::length_minutes))
    }

    /// Saves a manually defined slot after checking it against its block and
    /// the block's other live slots.
    pub fn add_slot(&self, slot: TimeSlot) -> Result<TimeSlot> {
        if slot.start >= slot.end {
            return Err(SchedulingError::InvalidRange {
                start: slot.start,
                end: slot.end,
            });
        }
        let block_id = slot.block_id;

        self.with_block_lock(Some(block_id), move || {
            self.repository.transaction(move |repository| {
                let block: AppointmentBlock = repository.get_by_id(block_id)?.ok_or(
                    SchedulingError::MissingReference {
                        kind: EntityKind::AppointmentBlock,
                        id: block_id,
                    },
                )?;
                if !block.contains(slot.start, slot.end) {
                    return Err(SchedulingError::SlotOutsideBlock {
                        start: slot.start,
                        end: slot.end,
                    });
                }

                let siblings = live_slots_in_block(repository, block_id)?;
                if let Some(existing) = siblings
                    .iter()
                    .find(|other| other.id != slot.id && other.overlaps(&slot))
                {
                    return Err(SchedulingError::SlotOverlap {
                        start: slot.start,
                        end: slot.end,
                        existing: existing.id.unwrap_or_default(),
                    });
                }

                repository.save(slot)
            })
        })
    }

    fn with_block_lock<T>(
        &self,
        block_id: Option<EntityId>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let Some(block_id) = block_id else {
            return f();
        };

        let lock = {
            let mut block_locks = self
                .block_locks
                .lock()
                .map_err(|_| SchedulingError::Storage("Block lock table poisoned".into()))?;
            block_locks.entry(block_id).or_default().clone()
        };
        let _guard = lock
            .lock()
            .map_err(|_| SchedulingError::Storage(format!("Lock of block {block_id} poisoned")))?;
        f()
    }
}
