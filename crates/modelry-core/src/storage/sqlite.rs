//! SQLite-backed store.

use super::{Row, Store};
use crate::catalog::{DefaultValue, EntityDef, FieldDef, ModelRegistry, ScalarType};
use crate::error::{Error, Result};
use crate::query::Predicate;
use crate::value::{Value, DATE_FORMAT};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info};

/// In-memory database path accepted by [`SqliteStore::open`].
pub const MEMORY_PATH: &str = ":memory:";

/// A store backed by a SQLite database, one table per entity.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file. `:memory:` opens a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == MEMORY_PATH {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        debug!(path = %path.display(), "opened sqlite database");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection.
    pub fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA case_sensitive_like = ON;")?;
        Ok(Self { conn })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create a table for every registered entity that does not have one yet.
    pub fn create_schema(&self, registry: &ModelRegistry) -> Result<()> {
        for entity in registry.entities() {
            let sql = create_table_sql(entity, registry);
            debug!(entity = %entity.name, sql = %sql, "creating table");
            self.conn.execute_batch(&sql)?;
        }
        info!(tables = registry.len(), "schema created");
        Ok(())
    }

    fn select_sql(entity: &EntityDef, predicates: &[Predicate], params: &mut Vec<Value>) -> String {
        let columns: Vec<String> = entity.fields.iter().map(|f| quote(&f.name)).collect();
        format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            columns.join(", "),
            table_name(entity),
            where_clause(predicates, params),
            quote(&entity.identity_field)
        )
    }

    fn read_row(entity: &EntityDef, row: &rusqlite::Row<'_>) -> Result<Row> {
        let mut out = Vec::with_capacity(entity.fields.len());
        for (idx, field) in entity.fields.iter().enumerate() {
            let value = read_value(field, row.get_ref(idx)?)?;
            out.push((field.name.clone(), value));
        }
        Ok(out)
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn table_name(entity: &EntityDef) -> String {
    quote(&entity.name.to_lowercase())
}

fn sql_literal(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Bool(b) => i64::from(*b).to_string(),
        DefaultValue::Int(i) => i.to_string(),
        DefaultValue::Float(f) => f.to_string(),
        DefaultValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn create_table_sql(entity: &EntityDef, registry: &ModelRegistry) -> String {
    let mut columns = Vec::with_capacity(entity.fields.len());
    for field in &entity.fields {
        let mut col = format!("{} {}", quote(&field.name), field.scalar_type.sql_type());
        if field.name == entity.identity_field {
            col.push_str(" primary key");
        } else {
            if !field.nullable {
                col.push_str(" not null");
            }
            if let Some(default) = &field.default {
                col.push_str(" default ");
                col.push_str(&sql_literal(default));
            }
            if let Some(rel) = entity.relation_for_field(&field.name) {
                if let Some(target) = registry.get(&rel.target) {
                    col.push_str(&format!(
                        " references {}({})",
                        table_name(target),
                        quote(&target.identity_field)
                    ));
                }
            }
        }
        columns.push(col);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table_name(entity),
        columns.join(", ")
    )
}

fn where_clause(predicates: &[Predicate], params: &mut Vec<Value>) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = predicates
        .iter()
        .map(|p| predicate_sql(p, params))
        .collect();
    format!(" WHERE {}", parts.join(" AND "))
}

fn bind(field: &str, op: &str, value: &Value, params: &mut Vec<Value>) -> String {
    params.push(value.clone());
    format!("{} {} ?", quote(field), op)
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Eq { field, value } => bind(field, "=", value, params),
        Predicate::Ne { field, value } => bind(field, "<>", value, params),
        Predicate::Lt { field, value } => bind(field, "<", value, params),
        Predicate::Le { field, value } => bind(field, "<=", value, params),
        Predicate::Gt { field, value } => bind(field, ">", value, params),
        Predicate::Ge { field, value } => bind(field, ">=", value, params),
        Predicate::In { field, values } => {
            if values.is_empty() {
                return "0".to_string();
            }
            params.extend(values.iter().cloned());
            let marks = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", quote(field), marks)
        }
        Predicate::IsNull { field } => format!("{} IS NULL", quote(field)),
        Predicate::IsNotNull { field } => format!("{} IS NOT NULL", quote(field)),
        Predicate::Like { field, pattern } => {
            params.push(Value::Text(pattern.clone()));
            format!("{} LIKE ? ESCAPE '\\'", quote(field))
        }
        Predicate::NotLike { field, pattern } => {
            params.push(Value::Text(pattern.clone()));
            format!("{} NOT LIKE ? ESCAPE '\\'", quote(field))
        }
        Predicate::Between { field, low, high } => {
            params.push(low.clone());
            params.push(high.clone());
            format!("{} BETWEEN ? AND ?", quote(field))
        }
        Predicate::And(nested) if nested.is_empty() => "1".to_string(),
        Predicate::Or(nested) if nested.is_empty() => "0".to_string(),
        Predicate::And(nested) => {
            let parts: Vec<String> = nested.iter().map(|p| predicate_sql(p, params)).collect();
            format!("({})", parts.join(" AND "))
        }
        Predicate::Or(nested) => {
            let parts: Vec<String> = nested.iter().map(|p| predicate_sql(p, params)).collect();
            format!("({})", parts.join(" OR "))
        }
        Predicate::Never => "0".to_string(),
    }
}

fn read_value(field: &FieldDef, raw: ValueRef<'_>) -> Result<Value> {
    let value = match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match field.scalar_type {
            ScalarType::Bool => Value::Bool(i != 0),
            ScalarType::Float => Value::Float(i as f64),
            _ => Value::Int(i),
        },
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(Error::invalid_value(&field.name, "unexpected blob column"));
        }
    };
    value.coerce(&field.name, field.scalar_type)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
            Value::Entity(inst) => match inst.id() {
                Some(id) => return id.to_sql(),
                None => ToSqlOutput::Owned(SqlValue::Null),
            },
        })
    }
}

impl Store for SqliteStore {
    fn insert(&mut self, entity: &EntityDef, row: Row) -> Result<Row> {
        // Null columns are left out so column defaults apply.
        let row: Row = row.into_iter().filter(|(_, v)| !v.is_null()).collect();
        let explicit_id = row
            .iter()
            .find(|(n, _)| *n == entity.identity_field)
            .map(|(_, v)| v.clone());

        let sql = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table_name(entity))
        } else {
            let columns: Vec<String> = row.iter().map(|(n, _)| quote(n)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table_name(entity),
                columns.join(", "),
                vec!["?"; row.len()].join(", ")
            )
        };
        self.conn
            .execute(&sql, params_from_iter(row.iter().map(|(_, v)| v)))?;

        let id = explicit_id.unwrap_or_else(|| Value::Int(self.conn.last_insert_rowid()));
        debug!(entity = %entity.name, id = %id, "inserted row");
        self.fetch(entity, &id)?.ok_or_else(|| {
            Error::invalid_value(&entity.identity_field, format!("inserted row {} not found", id))
        })
    }

    fn update(&mut self, entity: &EntityDef, id: &Value, row: Row) -> Result<bool> {
        if row.is_empty() {
            return Ok(self.fetch(entity, id)?.is_some());
        }
        let assignments: Vec<String> = row.iter().map(|(n, _)| format!("{} = ?", quote(n))).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table_name(entity),
            assignments.join(", "),
            quote(&entity.identity_field)
        );
        let params = row.iter().map(|(_, v)| v).chain(std::iter::once(id));
        let changed = self.conn.execute(&sql, params_from_iter(params))?;
        Ok(changed > 0)
    }

    fn delete(&mut self, entity: &EntityDef, id: &Value) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            table_name(entity),
            quote(&entity.identity_field)
        );
        Ok(self.conn.execute(&sql, [id])? > 0)
    }

    fn delete_where(&mut self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM {}{}",
            table_name(entity),
            where_clause(predicates, &mut params)
        );
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    fn scan(
        &self,
        entity: &EntityDef,
        predicates: &[Predicate],
        visit: &mut dyn FnMut(Row) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut params = Vec::new();
        let sql = Self::select_sql(entity, predicates, &mut params);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            if visit(Self::read_row(entity, row)?).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count(&self, entity: &EntityDef, predicates: &[Predicate]) -> Result<usize> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            table_name(entity),
            where_clause(predicates, &mut params)
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |r| r.get(0))?;
        Ok(count as usize)
    }

    fn fetch(&self, entity: &EntityDef, id: &Value) -> Result<Option<Row>> {
        let mut found = None;
        let by_id = [Predicate::eq(&entity.identity_field, id.clone())];
        self.scan(entity, &by_id, &mut |row| {
            found = Some(row);
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    fn begin(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RelationDef;
    use chrono::NaiveDate;

    fn registry() -> ModelRegistry {
        ModelRegistry::from_entities([
            EntityDef::new("Person")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text))
                .with_field(
                    FieldDef::new("active", ScalarType::Bool).with_default(DefaultValue::Bool(true)),
                )
                .with_field(FieldDef::optional("born", ScalarType::Date)),
            EntityDef::new("Pet")
                .with_field(FieldDef::new("id", ScalarType::Int))
                .with_field(FieldDef::new("name", ScalarType::Text))
                .with_field(FieldDef::optional("owner_id", ScalarType::Int))
                .with_relation(RelationDef::new("owner", "Person")),
        ])
        .unwrap()
    }

    fn store() -> (SqliteStore, ModelRegistry) {
        let registry = registry();
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_schema(&registry).unwrap();
        (store, registry)
    }

    fn column<'a>(row: &'a Row, name: &str) -> &'a Value {
        &row.iter().find(|(n, _)| n == name).unwrap().1
    }

    #[test]
    fn test_create_table_sql() {
        let registry = registry();
        let sql = create_table_sql(registry.get_model("pet").unwrap(), &registry);

        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"pet\" (\"id\" integer primary key, \"name\" text not null, \
             \"owner_id\" integer references \"person\"(\"id\"));"
        );
    }

    #[test]
    fn test_predicate_sql() {
        let mut params = Vec::new();
        let sql = where_clause(
            &[
                Predicate::like("name", "%oh%"),
                Predicate::between("age", 18, 30),
                Predicate::Or(vec![Predicate::eq("a", Value::Null), Predicate::Never]),
            ],
            &mut params,
        );

        assert_eq!(
            sql,
            " WHERE \"name\" LIKE ? ESCAPE '\\' AND \"age\" BETWEEN ? AND ? AND (\"a\" IS NULL OR 0)"
        );
        assert_eq!(params, vec![Value::from("%oh%"), Value::Int(18), Value::Int(30)]);
    }

    #[test]
    fn test_insert_roundtrips_types() {
        let (mut store, registry) = store();
        let person = registry.get_model("person").unwrap();
        let born = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();

        let row = store
            .insert(
                person,
                vec![
                    ("name".into(), "Ana".into()),
                    ("born".into(), Value::Date(born)),
                ],
            )
            .unwrap();

        assert_eq!(column(&row, "id"), &Value::Int(1));
        assert_eq!(column(&row, "active"), &Value::Bool(true));
        assert_eq!(column(&row, "born"), &Value::Date(born));
    }

    #[test]
    fn test_like_is_case_sensitive() {
        let (mut store, registry) = store();
        let person = registry.get_model("person").unwrap();
        for name in ["John", "JOHN", "Jane"] {
            store.insert(person, vec![("name".into(), name.into())]).unwrap();
        }

        assert_eq!(store.count(person, &[Predicate::like("name", "%oh%")]).unwrap(), 1);
    }

    #[test]
    fn test_update_delete_and_rollback() {
        let (mut store, registry) = store();
        let person = registry.get_model("person").unwrap();
        store.insert(person, vec![("name".into(), "Ana".into())]).unwrap();

        assert!(store
            .update(person, &Value::Int(1), vec![("name".into(), "Anna".into())])
            .unwrap());

        store.begin().unwrap();
        assert!(store.delete(person, &Value::Int(1)).unwrap());
        assert_eq!(store.count(person, &[]).unwrap(), 0);
        store.rollback().unwrap();

        let row = store.fetch(person, &Value::Int(1)).unwrap().unwrap();
        assert_eq!(column(&row, "name"), &Value::from("Anna"));
    }

    #[test]
    fn test_not_null_violation_is_storage_error() {
        let (mut store, registry) = store();
        let result = store.insert(registry.get_model("person").unwrap(), vec![]);
        assert!(matches!(result, Err(Error::Storage(_))));
    }
}
