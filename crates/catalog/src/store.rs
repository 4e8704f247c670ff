use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CatalogError;
use crate::records::default_indexes;

/// A typed record stored in a named collection.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert {
        collection: String,
        id: String,
        doc: Value,
    },
    /// Shallow merge: each field overwrites the stored field of the same name.
    Patch {
        collection: String,
        id: String,
        fields: Map<String, Value>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Insert { collection, .. }
            | WriteOp::Patch { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Insert { id, .. } | WriteOp::Patch { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }
}

/// Ordered writes applied all-or-nothing by `RecordStore::apply`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<D: Document>(&mut self, doc: &D) -> Result<(), CatalogError> {
        let value = serde_json::to_value(doc).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        self.ops.push(WriteOp::Insert {
            collection: D::COLLECTION.to_string(),
            id: doc.id().to_string(),
            doc: value,
        });
        Ok(())
    }

    /// Untyped insert, for documents carrying fields their record type drops
    /// (imports, legacy data).
    pub fn insert_value(&mut self, collection: &str, id: &str, doc: Value) {
        self.ops.push(WriteOp::Insert {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        });
    }

    /// `fields` must be a JSON object.
    pub fn patch<D: Document>(&mut self, id: &str, fields: Value) -> Result<(), CatalogError> {
        let Value::Object(fields) = fields else {
            return Err(CatalogError::Corrupt(format!(
                "patch for {}/{id} is not an object",
                D::COLLECTION
            )));
        };
        self.ops.push(WriteOp::Patch {
            collection: D::COLLECTION.to_string(),
            id: id.to_string(),
            fields,
        });
        Ok(())
    }

    /// Rewrites every serialized field of `doc`.
    pub fn replace<D: Document>(&mut self, doc: &D) -> Result<(), CatalogError> {
        let value = serde_json::to_value(doc).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        self.patch::<D>(doc.id(), value)
    }

    pub fn delete<D: Document>(&mut self, id: &str) {
        self.ops.push(WriteOp::Delete {
            collection: D::COLLECTION.to_string(),
            id: id.to_string(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Document store keyed by opaque ids.
///
/// `apply` validates the whole batch before touching anything: inserting an
/// existing id is a `Conflict`, patching or deleting a missing one is `NotFound`,
/// and in both cases nothing is written.
pub trait RecordStore: Send {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, CatalogError>;
    fn list(&self, collection: &str) -> Result<Vec<Value>, CatalogError>;
    /// Documents whose `field` equals `value` (string or number rendered as string).
    fn query(&self, collection: &str, field: &str, value: &str)
    -> Result<Vec<Value>, CatalogError>;
    fn apply(&mut self, batch: WriteBatch) -> Result<(), CatalogError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, CatalogError> {
        (**self).get(collection, id)
    }
    fn list(&self, collection: &str) -> Result<Vec<Value>, CatalogError> {
        (**self).list(collection)
    }
    fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, CatalogError> {
        (**self).query(collection, field, value)
    }
    fn apply(&mut self, batch: WriteBatch) -> Result<(), CatalogError> {
        (**self).apply(batch)
    }
}

fn decode<D: Document>(value: Value) -> Result<D, CatalogError> {
    serde_json::from_value(value)
        .map_err(|e| CatalogError::Corrupt(format!("{}: {e}", D::COLLECTION)))
}

/// Typed helpers over any `RecordStore`.
pub trait RecordStoreExt: RecordStore {
    fn get_doc<D: Document>(&self, id: &str) -> Result<Option<D>, CatalogError> {
        self.get(D::COLLECTION, id)?.map(decode).transpose()
    }

    /// Like `get_doc`, but a missing record is `NotFound`.
    fn require_doc<D: Document>(&self, id: &str) -> Result<D, CatalogError> {
        self.get_doc(id)?
            .ok_or_else(|| CatalogError::NotFound(format!("{}/{id}", D::COLLECTION)))
    }

    fn list_docs<D: Document>(&self) -> Result<Vec<D>, CatalogError> {
        self.list(D::COLLECTION)?.into_iter().map(decode).collect()
    }

    fn query_docs<D: Document>(&self, field: &str, value: &str) -> Result<Vec<D>, CatalogError> {
        self.query(D::COLLECTION, field, value)?
            .into_iter()
            .map(decode)
            .collect()
    }

    fn insert_doc<D: Document>(&mut self, doc: &D) -> Result<(), CatalogError> {
        let mut batch = WriteBatch::new();
        batch.insert(doc)?;
        self.apply(batch)
    }

    fn patch_doc<D: Document>(&mut self, id: &str, fields: Value) -> Result<(), CatalogError> {
        let mut batch = WriteBatch::new();
        batch.patch::<D>(id, fields)?;
        self.apply(batch)
    }

    fn delete_doc<D: Document>(&mut self, id: &str) -> Result<(), CatalogError> {
        let mut batch = WriteBatch::new();
        batch.delete::<D>(id);
        self.apply(batch)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

/// A store shared between request handlers. Never hold the lock across `.await`.
pub type SharedStore<S> = Arc<Mutex<S>>;

pub fn shared<S: RecordStore>(store: S) -> SharedStore<S> {
    Arc::new(Mutex::new(store))
}

/// Serializable contents of a store: collection -> id -> document.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub collections: BTreeMap<String, BTreeMap<String, Value>>,
}

// field -> value -> ids
type FieldIndex = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Deterministic in-memory store. `BTreeMap` everywhere for stable listing order.
#[derive(Debug, Clone)]
pub struct InMemoryRecordStore {
    snapshot: StoreSnapshot,
    indexed_fields: BTreeMap<String, Vec<String>>,
    indexes: BTreeMap<String, FieldIndex>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn index_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl InMemoryRecordStore {
    /// Empty store with the default secondary indexes.
    pub fn new() -> Self {
        Self::with_indexes(default_indexes())
    }

    pub fn with_indexes(indexes: Vec<(&str, Vec<&str>)>) -> Self {
        let indexed_fields = indexes
            .into_iter()
            .map(|(c, fs)| (c.to_string(), fs.into_iter().map(str::to_string).collect()))
            .collect();
        Self {
            snapshot: StoreSnapshot::default(),
            indexed_fields,
            indexes: BTreeMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut store = Self::new();
        store.snapshot = snapshot;
        store.rebuild_indexes();
        store
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    fn rebuild_indexes(&mut self) {
        self.indexes.clear();
        let docs: Vec<(String, String, Value)> = self
            .snapshot
            .collections
            .iter()
            .flat_map(|(c, docs)| {
                docs.iter()
                    .map(|(id, d)| (c.clone(), id.clone(), d.clone()))
            })
            .collect();
        for (c, id, d) in docs {
            self.index_doc(&c, &id, &d);
        }
    }

    fn contains(&self, collection: &str, id: &str) -> bool {
        self.snapshot
            .collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id))
    }

    fn index_doc(&mut self, collection: &str, id: &str, doc: &Value) {
        let Some(fields) = self.indexed_fields.get(collection) else {
            return;
        };
        let index = self.indexes.entry(collection.to_string()).or_default();
        for field in fields {
            if let Some(v) = doc.get(field).and_then(index_value) {
                index
                    .entry(field.clone())
                    .or_default()
                    .entry(v)
                    .or_default()
                    .insert(id.to_string());
            }
        }
    }

    fn unindex_doc(&mut self, collection: &str, id: &str, doc: &Value) {
        let Some(fields) = self.indexed_fields.get(collection) else {
            return;
        };
        let Some(index) = self.indexes.get_mut(collection) else {
            return;
        };
        for field in fields {
            let Some(v) = doc.get(field).and_then(index_value) else {
                continue;
            };
            if let Some(values) = index.get_mut(field) {
                if let Some(ids) = values.get_mut(&v) {
                    ids.remove(id);
                    if ids.is_empty() {
                        values.remove(&v);
                    }
                }
            }
        }
    }

    fn validate(&self, batch: &WriteBatch) -> Result<(), CatalogError> {
        // Existence as seen by each op, given the ops before it in the batch.
        let mut overlay: BTreeMap<(&str, &str), bool> = BTreeMap::new();
        for op in batch.ops() {
            let key = (op.collection(), op.id());
            let exists = overlay
                .get(&key)
                .copied()
                .unwrap_or_else(|| self.contains(key.0, key.1));
            let label = || format!("{}/{}", key.0, key.1);
            match op {
                WriteOp::Insert { .. } if exists => return Err(CatalogError::Conflict(label())),
                WriteOp::Insert { .. } => {
                    overlay.insert(key, true);
                }
                WriteOp::Patch { .. } if !exists => return Err(CatalogError::NotFound(label())),
                WriteOp::Patch { .. } => {}
                WriteOp::Delete { .. } if !exists => return Err(CatalogError::NotFound(label())),
                WriteOp::Delete { .. } => {
                    overlay.insert(key, false);
                }
            }
        }
        Ok(())
    }

    fn apply_op(&mut self, op: WriteOp) {
        match op {
            WriteOp::Insert { collection, id, doc } => {
                self.index_doc(&collection, &id, &doc);
                self.snapshot
                    .collections
                    .entry(collection)
                    .or_default()
                    .insert(id, doc);
            }
            WriteOp::Patch {
                collection,
                id,
                fields,
            } => {
                let Some(old) = self
                    .snapshot
                    .collections
                    .get(&collection)
                    .and_then(|docs| docs.get(&id))
                    .cloned()
                else {
                    return;
                };
                self.unindex_doc(&collection, &id, &old);
                let mut merged = old;
                if let Value::Object(obj) = &mut merged {
                    for (k, v) in fields {
                        obj.insert(k, v);
                    }
                }
                self.index_doc(&collection, &id, &merged);
                if let Some(docs) = self.snapshot.collections.get_mut(&collection) {
                    docs.insert(id, merged);
                }
            }
            WriteOp::Delete { collection, id } => {
                let removed = self
                    .snapshot
                    .collections
                    .get_mut(&collection)
                    .and_then(|docs| docs.remove(&id));
                if let Some(old) = removed {
                    self.unindex_doc(&collection, &id, &old);
                }
            }
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, CatalogError> {
        Ok(self
            .snapshot
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>, CatalogError> {
        Ok(self
            .snapshot
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, CatalogError> {
        let Some(docs) = self.snapshot.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let indexed = self
            .indexed_fields
            .get(collection)
            .is_some_and(|fs| fs.iter().any(|f| f == field));
        if indexed {
            let ids = self
                .indexes
                .get(collection)
                .and_then(|idx| idx.get(field))
                .and_then(|values| values.get(value));
            return Ok(ids
                .into_iter()
                .flatten()
                .filter_map(|id| docs.get(id).cloned())
                .collect());
        }
        // Unindexed fields fall back to a scan.
        Ok(docs
            .values()
            .filter(|d| d.get(field).and_then(index_value).as_deref() == Some(value))
            .cloned()
            .collect())
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), CatalogError> {
        self.validate(&batch)?;
        for op in batch.ops {
            self.apply_op(op);
        }
        Ok(())
    }
}
