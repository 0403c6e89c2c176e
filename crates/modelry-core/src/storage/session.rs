//! Unit of work over a store.

use super::{Row, Store};
use crate::catalog::EntityDef;
use crate::error::{Error, Result};
use crate::instance::{Instance, InstanceHandle};
use crate::query::Predicate;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Pending {
    Save(Instance),
    Delete {
        entity: Arc<EntityDef>,
        handle: InstanceHandle,
        id: Value,
    },
}

impl Pending {
    fn handle(&self) -> InstanceHandle {
        match self {
            Pending::Save(inst) => inst.handle(),
            Pending::Delete { handle, .. } => *handle,
        }
    }
}

/// Queues saves and deletes and flushes them to the store in one transaction.
///
/// Bulk deletes run immediately inside an open transaction and become durable on the next
/// [`commit`](Session::commit).
pub struct Session {
    store: Box<dyn Store>,
    pending: Vec<Pending>,
    in_transaction: bool,
}

impl Session {
    /// Create a session over a store.
    pub fn new(store: impl Store + 'static) -> Self {
        Self::from_box(Box::new(store))
    }

    /// Create a session over a boxed store.
    pub fn from_box(store: Box<dyn Store>) -> Self {
        Self {
            store,
            pending: Vec::new(),
            in_transaction: false,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Number of queued operations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check if a store transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Queue an instance for insert or update. Re-adding the same instance replaces the
    /// queued copy.
    pub fn add(&mut self, instance: &Instance) {
        self.dequeue(instance.handle());
        self.pending.push(Pending::Save(instance.clone()));
    }

    /// Queue a persisted instance for deletion.
    pub fn delete(&mut self, instance: &Instance) -> Result<()> {
        let id = instance
            .id()
            .cloned()
            .ok_or_else(|| Error::NotPersisted(instance.entity_name().to_string()))?;
        self.dequeue(instance.handle());
        self.pending.push(Pending::Delete {
            entity: Arc::clone(instance.entity_arc()),
            handle: instance.handle(),
            id,
        });
        Ok(())
    }

    /// Delete every row matching the predicates right away, inside the session transaction.
    pub fn delete_where(&mut self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        self.begin()?;
        let removed = self.store.delete_where(entity, predicates)?;
        info!(entity = %entity.name, removed, "bulk delete");
        Ok(removed)
    }

    /// Flush queued work and commit.
    ///
    /// Returns the stored row of every saved instance, keyed by handle. On failure the
    /// transaction is rolled back and the queue is cleared.
    pub fn commit(&mut self) -> Result<Vec<(InstanceHandle, Row)>> {
        match self.flush() {
            Ok(saved) => {
                self.store.commit()?;
                self.in_transaction = false;
                info!(saved = saved.len(), "session committed");
                Ok(saved)
            }
            Err(err) => {
                warn!(error = %err, "commit failed, rolling back");
                self.pending.clear();
                self.in_transaction = false;
                self.store.rollback()?;
                Err(err)
            }
        }
    }

    /// Discard queued work and roll the open transaction back.
    pub fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        if self.in_transaction {
            self.in_transaction = false;
            self.store.rollback()?;
        }
        Ok(())
    }

    /// Reload an instance's columns from the store. Returns `false` if it no longer exists.
    pub fn refresh(&self, instance: &mut Instance) -> Result<bool> {
        let Some(id) = instance.id().cloned() else {
            return Err(Error::NotPersisted(instance.entity_name().to_string()));
        };
        match self.store.fetch(instance.entity(), &id)? {
            Some(row) => {
                instance.load_row(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.store.begin()?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn dequeue(&mut self, handle: InstanceHandle) {
        self.pending.retain(|p| p.handle() != handle);
    }

    fn flush(&mut self) -> Result<Vec<(InstanceHandle, Row)>> {
        self.begin()?;
        let pending = std::mem::take(&mut self.pending);
        debug!(operations = pending.len(), "flushing session");

        let mut assigned: HashMap<InstanceHandle, Value> = HashMap::new();
        let mut saved = Vec::new();
        for op in pending {
            match op {
                Pending::Save(instance) => {
                    let row = self.save_row(&instance, &assigned)?;
                    let entity = instance.entity();
                    if let Some((_, id)) = row.iter().find(|(n, _)| *n == entity.identity_field) {
                        assigned.insert(instance.handle(), id.clone());
                    }
                    saved.push((instance.handle(), row));
                }
                Pending::Delete { entity, id, .. } => {
                    if !self.store.delete(&entity, &id)? {
                        debug!(entity = %entity.name, id = %id, "row already gone");
                    }
                }
            }
        }
        Ok(saved)
    }

    /// Write one instance, linking relationships to rows inserted earlier in this flush.
    fn save_row(&mut self, instance: &Instance, assigned: &HashMap<InstanceHandle, Value>) -> Result<Row> {
        let entity = instance.entity();
        let mut row = instance.to_row();
        for relation in &entity.relations {
            let Some(related) = instance.related(&relation.name) else {
                continue;
            };
            if let Some(id) = related.id().or_else(|| assigned.get(&related.handle())) {
                match row.iter_mut().find(|(n, _)| *n == relation.local_field) {
                    Some(slot) => slot.1 = id.clone(),
                    None => row.push((relation.local_field.clone(), id.clone())),
                }
            }
        }

        if let Some(id) = instance.id() {
            if self.store.update(entity, id, row.clone())? {
                return self
                    .store
                    .fetch(entity, id)?
                    .ok_or_else(|| Error::NotPersisted(entity.name.clone()));
            }
        }
        self.store.insert(entity, row)
    }
}
