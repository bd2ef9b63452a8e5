//! In-memory implementation of the data access port for testing and development

use crate::core::descriptor::{Cardinality, EdgeDescriptor, EntityDescriptor, Schema};
use crate::core::error::{StorageError, StorageResult};
use crate::core::field::FieldValue;
use crate::core::payload::{MutationPayload, Patch};
use crate::core::query::ListQuery;
use crate::core::record::{Record, Relation};
use crate::core::service::DataAccess;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
struct Row {
    fields: IndexMap<String, FieldValue>,
    edges: IndexMap<String, Vec<i64>>,
}

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// Pre-images of what the current write touched: rows (None when the row
/// did not exist) and id counters
#[derive(Debug, Default)]
struct Journal {
    rows: HashMap<(String, i64), Option<Row>>,
    counters: HashMap<String, i64>,
}

#[derive(Debug, Default)]
struct Tables {
    tables: HashMap<String, Table>,
    journal: Journal,
}

/// In-memory store for every kind of a schema
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// A write journals the rows it touches and rolls them back unless every
/// constraint holds, so a rejected write leaves no trace.
#[derive(Clone)]
pub struct InMemoryStore {
    schema: Arc<Schema>,
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store with one table per kind of the schema
    pub fn new(schema: Arc<Schema>) -> Self {
        let tables = schema
            .kinds()
            .map(|kind| (kind.to_string(), Table::default()))
            .collect();
        Self {
            schema,
            tables: Arc::new(RwLock::new(Tables {
                tables,
                journal: Journal::default(),
            })),
        }
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StorageError::Fault(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StorageError::Fault(format!("Failed to acquire write lock: {}", e)))
    }
}

impl Tables {
    /// Run one write, undoing everything it touched when it fails
    fn staged<T>(&mut self, write: impl FnOnce(&mut Self) -> StorageResult<T>) -> StorageResult<T> {
        let outcome = write(self);
        let journal = std::mem::take(&mut self.journal);
        if outcome.is_err() {
            for ((kind, id), before) in journal.rows {
                let Some(table) = self.tables.get_mut(&kind) else {
                    continue;
                };
                match before {
                    Some(row) => table.rows.insert(id, row),
                    None => table.rows.remove(&id),
                };
            }
            for (kind, last_id) in journal.counters {
                if let Some(table) = self.tables.get_mut(&kind) {
                    table.last_id = last_id;
                }
            }
        }
        outcome
    }

    fn table(&self, kind: &str) -> StorageResult<&Table> {
        self.tables.get(kind).ok_or_else(|| no_table(kind))
    }

    fn row(&self, kind: &str, id: i64) -> StorageResult<&Row> {
        self.table(kind)?
            .rows
            .get(&id)
            .ok_or_else(|| not_found(kind, id))
    }

    fn row_mut(&mut self, kind: &str, id: i64) -> StorageResult<&mut Row> {
        let row = self
            .tables
            .get_mut(kind)
            .ok_or_else(|| no_table(kind))?
            .rows
            .get_mut(&id)
            .ok_or_else(|| not_found(kind, id))?;
        self.journal
            .rows
            .entry((kind.to_string(), id))
            .or_insert_with(|| Some(row.clone()));
        Ok(row)
    }

    fn ensure_targets(&self, edge: &EdgeDescriptor, ids: &[i64]) -> StorageResult<()> {
        let table = self.table(&edge.target)?;
        match ids.iter().find(|id| !table.rows.contains_key(id)) {
            Some(missing) => Err(StorageError::Constraint(format!(
                "{} {} does not exist",
                edge.target, missing
            ))),
            None => Ok(()),
        }
    }

    fn insert(
        &mut self,
        schema: &Schema,
        descriptor: &EntityDescriptor,
        payload: &MutationPayload,
    ) -> StorageResult<i64> {
        let kind = descriptor.kind();
        let mut row = Row::default();

        for field in descriptor.fields() {
            let value = match payload.field(&field.name) {
                Patch::Value(value) => value.clone(),
                Patch::Null if field.nullable => FieldValue::Null,
                _ => field.default.clone().unwrap_or(FieldValue::Null),
            };
            if value.is_null() && !field.nullable {
                return Err(StorageError::Constraint(format!(
                    "{}.{} must not be null",
                    kind, field.name
                )));
            }
            row.fields.insert(field.name.clone(), value);
        }
        for edge in descriptor.edges() {
            row.edges.insert(edge.name.clone(), Vec::new());
        }

        let table = self.tables.get_mut(kind).ok_or_else(|| no_table(kind))?;
        self.journal
            .counters
            .entry(kind.to_string())
            .or_insert(table.last_id);
        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(id, row);
        self.journal.rows.entry((kind.to_string(), id)).or_insert(None);

        for edge in descriptor.edges() {
            if let Patch::Value(ids) = payload.edge(&edge.name) {
                self.ensure_targets(edge, ids.ids())?;
                self.set_edge(schema, kind, id, edge, ids.ids())?;
            }
            if edge.required && self.row(kind, id)?.edges[&edge.name].is_empty() {
                return Err(StorageError::Constraint(format!(
                    "{}.{} is required",
                    kind, edge.name
                )));
            }
        }

        Ok(id)
    }

    fn patch(
        &mut self,
        schema: &Schema,
        descriptor: &EntityDescriptor,
        id: i64,
        payload: &MutationPayload,
    ) -> StorageResult<()> {
        let kind = descriptor.kind();
        let row = self.row_mut(kind, id)?;

        for field in descriptor.fields() {
            match payload.field(&field.name) {
                Patch::Value(value) => {
                    row.fields.insert(field.name.clone(), value.clone());
                }
                Patch::Null if field.nullable => {
                    row.fields.insert(field.name.clone(), FieldValue::Null);
                }
                _ => {}
            }
        }

        for edge in descriptor.edges() {
            let ids = match payload.edge(&edge.name) {
                Patch::Absent => continue,
                Patch::Null => &[][..],
                Patch::Value(ids) => ids.ids(),
            };
            if edge.required && ids.is_empty() {
                return Err(StorageError::Constraint(format!(
                    "{}.{} is required",
                    kind, edge.name
                )));
            }
            self.ensure_targets(edge, ids)?;
            self.set_edge(schema, kind, id, edge, ids)?;
        }

        Ok(())
    }

    fn remove(&mut self, schema: &Schema, kind: &str, id: i64) -> StorageResult<()> {
        let row = self
            .tables
            .get_mut(kind)
            .ok_or_else(|| no_table(kind))?
            .rows
            .remove(&id)
            .ok_or_else(|| not_found(kind, id))?;
        self.journal
            .rows
            .entry((kind.to_string(), id))
            .or_insert(Some(row));

        for source in schema.descriptors() {
            for edge in source.edges().iter().filter(|e| e.target == kind) {
                let holders: Vec<i64> = self
                    .table(source.kind())?
                    .rows
                    .iter()
                    .filter(|(_, row)| row.edges.get(&edge.name).is_some_and(|ids| ids.contains(&id)))
                    .map(|(holder, _)| *holder)
                    .collect();
                for holder in holders {
                    self.unlink(source.kind(), holder, edge, id)?;
                }
            }
        }

        Ok(())
    }

    /// Replace the targets of an edge and keep the inverse side consistent
    fn set_edge(
        &mut self,
        schema: &Schema,
        kind: &str,
        id: i64,
        edge: &EdgeDescriptor,
        ids: &[i64],
    ) -> StorageResult<()> {
        let mut targets: Vec<i64> = Vec::with_capacity(ids.len());
        for target in ids {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }

        let row = self.row_mut(kind, id)?;
        let previous = row
            .edges
            .insert(edge.name.clone(), targets.clone())
            .unwrap_or_default();

        let Some(inverse) = edge.inverse.as_deref() else {
            return Ok(());
        };
        let inverse = schema
            .get(&edge.target)
            .and_then(|target| target.edge(inverse))
            .ok_or_else(|| {
                StorageError::Fault(format!("{} has no edge '{}'", edge.target, inverse))
            })?;

        for dropped in previous.iter().filter(|t| !targets.contains(t)) {
            self.unlink(&edge.target, *dropped, inverse, id)?;
        }

        for added in targets.iter().filter(|t| !previous.contains(t)) {
            let target_row = self.row_mut(&edge.target, *added)?;
            match inverse.cardinality {
                Cardinality::One => {
                    let displaced = target_row
                        .edges
                        .insert(inverse.name.clone(), vec![id])
                        .unwrap_or_default();
                    for other in displaced.into_iter().filter(|other| *other != id) {
                        self.unlink(kind, other, edge, *added)?;
                    }
                }
                Cardinality::Many => {
                    let back = target_row.edges.entry(inverse.name.clone()).or_default();
                    if !back.contains(&id) {
                        back.push(id);
                    }
                }
            }
        }

        Ok(())
    }

    /// Drop one target from an edge, refusing to empty a required one
    fn unlink(&mut self, kind: &str, id: i64, edge: &EdgeDescriptor, target: i64) -> StorageResult<()> {
        let Ok(row) = self.row_mut(kind, id) else {
            return Ok(());
        };
        if let Some(ids) = row.edges.get_mut(&edge.name) {
            ids.retain(|t| *t != target);
            if edge.required && ids.is_empty() {
                return Err(StorageError::Constraint(format!(
                    "{} {} still requires its {}",
                    kind, id, edge.name
                )));
            }
        }
        Ok(())
    }

    fn record(&self, descriptor: &EntityDescriptor, id: i64) -> StorageResult<Record> {
        let row = self.row(descriptor.kind(), id)?;
        let mut record = Record::new(id);
        for field in descriptor.fields() {
            let value = row.fields.get(&field.name).cloned().unwrap_or(FieldValue::Null);
            record.fields.insert(field.name.clone(), value);
        }
        for edge in descriptor.edges() {
            let ids = row.edges.get(&edge.name).cloned().unwrap_or_default();
            record.edge_ids.insert(edge.name.clone(), ids);
        }
        Ok(record)
    }

    /// Attach the named relations, one level deep
    fn load_edges(
        &self,
        schema: &Schema,
        descriptor: &EntityDescriptor,
        record: &mut Record,
        eager: &[&str],
    ) -> StorageResult<()> {
        for name in eager {
            let edge = descriptor.edge(name).ok_or_else(|| {
                StorageError::Fault(format!("{} has no edge '{}'", descriptor.kind(), name))
            })?;
            let target = schema.get(&edge.target).ok_or_else(|| {
                StorageError::Fault(format!("no descriptor for entity kind '{}'", edge.target))
            })?;

            let ids = record.edge_ids.get(&edge.name).cloned().unwrap_or_default();
            let mut related = ids
                .iter()
                .map(|id| self.record(target, *id))
                .collect::<StorageResult<Vec<_>>>()?;

            let relation = match edge.cardinality {
                Cardinality::One => Relation::One(related.pop().map(Box::new)),
                Cardinality::Many => Relation::Many(related),
            };
            record.relations.insert(edge.name.clone(), relation);
        }
        Ok(())
    }
}

fn no_table(kind: &str) -> StorageError {
    StorageError::Fault(format!("no table for entity kind '{}'", kind))
}

fn not_found(kind: &str, id: i64) -> StorageError {
    StorageError::NotFound {
        entity: kind.to_string(),
        id,
    }
}

#[async_trait]
impl DataAccess for InMemoryStore {
    async fn create(
        &self,
        descriptor: &EntityDescriptor,
        payload: &MutationPayload,
    ) -> StorageResult<i64> {
        self.write()?
            .staged(|tables| tables.insert(&self.schema, descriptor, payload))
    }

    async fn fetch(
        &self,
        descriptor: &EntityDescriptor,
        id: i64,
        eager: &[&str],
    ) -> StorageResult<Record> {
        let tables = self.read()?;
        let mut record = tables.record(descriptor, id)?;
        tables.load_edges(&self.schema, descriptor, &mut record, eager)?;
        Ok(record)
    }

    async fn update(
        &self,
        descriptor: &EntityDescriptor,
        id: i64,
        payload: &MutationPayload,
    ) -> StorageResult<Record> {
        self.write()?.staged(|tables| {
            tables.patch(&self.schema, descriptor, id, payload)?;
            tables.record(descriptor, id)
        })
    }

    async fn delete(&self, descriptor: &EntityDescriptor, id: i64) -> StorageResult<()> {
        self.write()?
            .staged(|tables| tables.remove(&self.schema, descriptor.kind(), id))
    }

    async fn list(
        &self,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
        eager: &[&str],
    ) -> StorageResult<Vec<Record>> {
        let tables = self.read()?;
        let records = tables
            .table(descriptor.kind())?
            .rows
            .keys()
            .map(|id| tables.record(descriptor, *id))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut page = query.apply(records);
        for record in &mut page {
            tables.load_edges(&self.schema, descriptor, record, eager)?;
        }
        Ok(page)
    }
}
