use crate::{
    error::Result,
    repository::Repository,
    types::{
        Appointment, AppointmentBlock, AppointmentType, Entity, EntityId, ProviderId, TimeSlot,
    },
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

fn sort_by_start(slots: &mut [TimeSlot]) {
    slots.sort_unstable_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
}

/// Non-voided slots of a block, ordered by start time.
pub(crate) fn live_slots_in_block<R: Repository>(
    repository: &R,
    block_id: EntityId,
) -> Result<Vec<TimeSlot>> {
    let mut slots =
        repository.find_by_predicate(|slot: &TimeSlot| slot.block_id == block_id && !slot.is_voided())?;
    sort_by_start(&mut slots);
    Ok(slots)
}

/// Read side of the scheduler. Malformed queries yield empty results
/// instead of errors.
#[derive(Clone)]
pub struct AvailabilityResolver<R: Repository> {
    repository: R,
}

impl<R: Repository> AvailabilityResolver<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Live slots inside `[from, to]` whose block offers `appointment_type`
    /// (and belongs to `provider`, if given).
    pub fn find_slots_by_constraints(
        &self,
        appointment_type: Option<&AppointmentType>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        provider: Option<ProviderId>,
    ) -> Result<Vec<TimeSlot>> {
        if from > to {
            debug!(%from, %to, "Reversed date range, no slots match");
            return Ok(vec![]);
        }
        let Some(appointment_type_id) = appointment_type.and_then(|appointment_type| appointment_type.id)
        else {
            debug!("No appointment type given, no slots match");
            return Ok(vec![]);
        };

        let block_ids: HashSet<EntityId> = self
            .repository
            .find_by_predicate(|block: &AppointmentBlock| {
                block.appointment_type_id == Some(appointment_type_id)
                    && provider.map_or(true, |provider| block.provider == provider)
            })?
            .into_iter()
            .filter_map(|block| block.id)
            .collect();
        if block_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut slots = self.repository.find_by_predicate(|slot: &TimeSlot| {
            block_ids.contains(&slot.block_id)
                && !slot.is_voided()
                && from <= slot.start
                && slot.end <= to
        })?;
        sort_by_start(&mut slots);
        Ok(slots)
    }

    pub fn find_slots_in_block(&self, block: Option<&AppointmentBlock>) -> Result<Vec<TimeSlot>> {
        match block.and_then(|block| block.id) {
            Some(block_id) => live_slots_in_block(&self.repository, block_id),
            None => Ok(vec![]),
        }
    }

    pub fn find_appointments_in_slot(&self, slot: &TimeSlot) -> Result<Vec<Appointment>> {
        let Some(slot_id) = slot.id else {
            return Ok(vec![]);
        };
        self.repository.find_by_predicate(|appointment: &Appointment| {
            appointment.time_slot_id == slot_id && !appointment.is_voided()
        })
    }
}
