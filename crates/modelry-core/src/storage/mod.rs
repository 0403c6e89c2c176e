//! Storage layer.
//!
//! A [`Store`] persists rows of scalar column values per entity type. The [`Session`]
//! queues instance-level work on top of a store and flushes it in one transaction.

mod memory;
mod session;
mod sqlite;

pub use memory::MemoryStore;
pub use session::Session;
pub use sqlite::SqliteStore;

use crate::catalog::EntityDef;
use crate::error::Result;
use crate::query::Predicate;
use crate::value::Value;
use std::ops::ControlFlow;

/// A stored row: column name and value pairs.
pub type Row = Vec<(String, Value)>;

/// Persistent storage for entity rows.
///
/// Rows are addressed by the entity's identity field. Scans return rows in identity order.
pub trait Store: Send {
    /// Insert a row, returning it as stored (generated identity and column defaults filled in).
    fn insert(&mut self, entity: &EntityDef, row: Row) -> Result<Row>;

    /// Overwrite the given columns of the row with identity `id`.
    ///
    /// Returns `false` when no such row exists.
    fn update(&mut self, entity: &EntityDef, id: &Value, row: Row) -> Result<bool>;

    /// Delete the row with identity `id`, returning whether it existed.
    fn delete(&mut self, entity: &EntityDef, id: &Value) -> Result<bool>;

    /// Delete every row matching all predicates.
    fn delete_where(&mut self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize>;

    /// Stream rows matching all predicates to `visit` until it breaks.
    fn scan(
        &self,
        entity: &EntityDef,
        predicates: &[Predicate],
        visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Count rows matching all predicates.
    fn count(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize>;

    /// Fetch one row by identity.
    fn fetch(&self, entity: &EntityDef, id: &Value) -> Result<Option<Row>>;

    /// Start a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Discard the open transaction.
    fn rollback(&mut self) -> Result<()>;
}
