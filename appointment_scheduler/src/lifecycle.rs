use crate::{
    error::{Result, SchedulingError},
    repository::Repository,
    types::{Entity, EntityId, VoidState},
};
use chrono::Utc;
use tracing::{debug, info};

/// Void, unvoid and purge for every stored entity. Nothing cascades: voiding
/// a block leaves its slots alone, and purges have to go leaf to root.
#[derive(Clone)]
pub struct LifecycleManager<R: Repository> {
    repository: R,
}

impl<R: Repository> LifecycleManager<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn void<E: Entity>(&self, mut entity: E, reason: &str) -> Result<E> {
        let reason = reason.trim();
        if let Some(id) = entity.id() {
            if reason.is_empty() {
                return Err(SchedulingError::MissingVoidReason { kind: E::KIND, id });
            }
        }

        entity.set_void_state(VoidState::Voided {
            reason: reason.into(),
            voided_at: Utc::now(),
        });
        let entity = self.repository.save(entity)?;
        info!(kind = %E::KIND, id = entity.id(), reason, "Voided");
        Ok(entity)
    }

    pub fn unvoid<E: Entity>(&self, mut entity: E) -> Result<E> {
        if !entity.is_voided() {
            debug!(kind = %E::KIND, id = entity.id(), "Not voided, nothing to restore");
            return Ok(entity);
        }

        entity.set_void_state(VoidState::Active);
        let entity = self.repository.save(entity)?;
        info!(kind = %E::KIND, id = entity.id(), "Unvoided");
        Ok(entity)
    }

    /// Irreversible. Fails with `SchedulingError::Integrity` while other rows
    /// reference the entity.
    pub fn purge<E: Entity>(&self, entity: &E) -> Result<()> {
        self.repository.delete(entity)?;
        info!(kind = %E::KIND, id = entity.id(), "Purged");
        Ok(())
    }

    pub fn get<E: Entity>(&self, id: EntityId) -> Result<Option<E>> {
        self.repository.get_by_id(id)
    }

    pub fn get_by_uuid<E: Entity>(&self, uuid: &str) -> Result<Option<E>> {
        self.repository.get_by_uuid(uuid)
    }

    pub fn list<E: Entity>(&self, include_voided: bool) -> Result<Vec<E>> {
        self.repository.find_all(include_voided)
    }
}
