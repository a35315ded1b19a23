use crate::error::{Result, SchedulingError};
use crate::repository::Repository;
use crate::types::{Entity, EntityId, EntityKind, EntityRef};
use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
struct Row {
    value: Arc<dyn Any + Send + Sync>,
    uuid: Uuid,
    references: Vec<EntityRef>,
}

#[derive(Clone, Default)]
struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<EntityId, Row>>,
    last_id: HashMap<EntityKind, EntityId>,
}

impl Tables {
    fn entities<E: Entity>(&self) -> impl Iterator<Item = E> + '_ {
        self.rows
            .get(&E::KIND)
            .into_iter()
            .flat_map(|table| table.values())
            .filter_map(|row| row.value.downcast_ref::<E>().cloned())
    }

    fn exists(&self, target: &EntityRef) -> bool {
        self.rows
            .get(&target.kind)
            .is_some_and(|table| table.contains_key(&target.id))
    }

    fn referenced_by(&self, target: &EntityRef) -> Option<EntityKind> {
        self.rows.iter().find_map(|(kind, table)| {
            table
                .values()
                .any(|row| row.references.contains(target))
                .then_some(*kind)
        })
    }

    fn next_id(&mut self, kind: EntityKind) -> EntityId {
        let last_id = self.last_id.entry(kind).or_insert(0);
        *last_id += 1;
        *last_id
    }
}

/// In-memory repository. Writes are serialized; a transaction stages its
/// writes on a private copy and swaps it in on success, so readers only ever
/// observe committed state.
#[derive(Clone, Default)]
pub struct LocalRepository {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

fn poisoned() -> SchedulingError {
    SchedulingError::Storage("Local repository lock poisoned".into())
}

impl LocalRepository {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|_| poisoned())
    }
}

impl Repository for LocalRepository {
    fn save<E: Entity>(&self, mut entity: E) -> Result<E> {
        let _writer = self.lock_writer()?;
        let mut tables = self.write()?;

        let references = entity.references();
        if let Some(missing) = references.iter().find(|target| !tables.exists(target)) {
            warn!(kind = %E::KIND, missing = ?missing, "Rejected save with dangling reference");
            return Err(SchedulingError::MissingReference {
                kind: missing.kind,
                id: missing.id,
            });
        }

        let id = match entity.id() {
            Some(id) if tables.exists(&EntityRef::new(E::KIND, id)) => id,
            Some(id) => {
                warn!(kind = %E::KIND, id, "Rejected save of a purged entity");
                return Err(SchedulingError::MissingReference { kind: E::KIND, id });
            }
            None => {
                let id = tables.next_id(E::KIND);
                entity.set_id(id);
                id
            }
        };

        let row = Row {
            value: Arc::new(entity.clone()),
            uuid: entity.uuid(),
            references,
        };
        tables.rows.entry(E::KIND).or_default().insert(id, row);
        debug!(kind = %E::KIND, id, "Saved entity");
        Ok(entity)
    }

    fn get_by_id<E: Entity>(&self, id: EntityId) -> Result<Option<E>> {
        let tables = self.read()?;
        Ok(tables
            .rows
            .get(&E::KIND)
            .and_then(|table| table.get(&id))
            .and_then(|row| row.value.downcast_ref::<E>().cloned()))
    }

    fn get_by_uuid<E: Entity>(&self, uuid: &str) -> Result<Option<E>> {
        let Ok(uuid) = Uuid::parse_str(uuid) else {
            return Ok(None);
        };
        let tables = self.read()?;
        Ok(tables
            .rows
            .get(&E::KIND)
            .and_then(|table| table.values().find(|row| row.uuid == uuid))
            .and_then(|row| row.value.downcast_ref::<E>().cloned()))
    }

    fn find_all<E: Entity>(&self, include_voided: bool) -> Result<Vec<E>> {
        let tables = self.read()?;
        Ok(tables
            .entities::<E>()
            .filter(|entity| include_voided || !entity.is_voided())
            .collect())
    }

    fn find_by_predicate<E, P>(&self, predicate: P) -> Result<Vec<E>>
    where
        E: Entity,
        P: Fn(&E) -> bool,
    {
        let tables = self.read()?;
        Ok(tables
            .entities::<E>()
            .filter(|entity| predicate(entity))
            .collect())
    }

    fn delete<E: Entity>(&self, entity: &E) -> Result<()> {
        let id = entity.id().ok_or(SchedulingError::Unsaved(E::KIND))?;
        let target = EntityRef::new(E::KIND, id);

        let _writer = self.lock_writer()?;
        let mut tables = self.write()?;
        if let Some(referenced_by) = tables.referenced_by(&target) {
            warn!(kind = %E::KIND, id, %referenced_by, "Purge blocked by live references");
            return Err(SchedulingError::Integrity {
                kind: E::KIND,
                id,
                referenced_by,
            });
        }

        let removed = tables
            .rows
            .get_mut(&E::KIND)
            .and_then(|table| table.remove(&id));
        if removed.is_none() {
            debug!(kind = %E::KIND, id, "Nothing to delete");
        }
        Ok(())
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let _writer = self.lock_writer()?;
        let snapshot = self.read()?.clone();
        let staged = LocalRepository {
            tables: Arc::new(RwLock::new(snapshot)),
            writer: Arc::default(),
        };

        let value = match f(&staged) {
            Ok(value) => value,
            Err(err) => {
                debug!(%err, "Rolled back transaction");
                return Err(err);
            }
        };

        let committed = std::mem::take(&mut *staged.write()?);
        *self.write()? = committed;
        Ok(value)
    }
}
