use crate::error::Result;
use crate::types::{Entity, EntityId};

/// Storage contract consumed by the scheduling components.
///
/// Lookups report absence as `Ok(None)` or an empty vector. `delete` is a
/// hard delete and fails with `SchedulingError::Integrity` while other rows
/// still reference the entity.
pub trait Repository: Clone + Send + Sync + 'static {
    /// Inserts on first save (assigning the id) and replaces afterwards.
    fn save<E: Entity>(&self, entity: E) -> Result<E>;
    fn get_by_id<E: Entity>(&self, id: EntityId) -> Result<Option<E>>;
    fn get_by_uuid<E: Entity>(&self, uuid: &str) -> Result<Option<E>>;
    fn find_all<E: Entity>(&self, include_voided: bool) -> Result<Vec<E>>;
    fn find_by_predicate<E, P>(&self, predicate: P) -> Result<Vec<E>>
    where
        E: Entity,
        P: Fn(&E) -> bool;
    fn delete<E: Entity>(&self, entity: &E) -> Result<()>;

    /// Runs `f` against a transactional handle. Either every write made
    /// through the handle becomes visible or, if `f` fails, none does.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
