use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::CatalogError;
use crate::store::{InMemoryRecordStore, RecordStore, StoreSnapshot, WriteBatch};

/// A single JSON snapshot file backed by an in-memory store.
///
/// Each batch is applied to a copy, the copy is written to `<path>.tmp` and
/// renamed over `<path>`, and only then does it replace the live state. A failed
/// write leaves both the file and memory at the previous snapshot. Meant for
/// single-process deployments with modest data volumes.
#[derive(Debug)]
pub struct JsonFileRecordStore {
    path: PathBuf,
    inner: InMemoryRecordStore,
}

impl JsonFileRecordStore {
    /// Opens `path`, starting empty if the file doesn't exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<StoreSnapshot>(&text)
                .map_err(|e| CatalogError::Corrupt(format!("{path:?}: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreSnapshot::default(),
            Err(e) => return Err(CatalogError::Io(format!("read {path:?}: {e}"))),
        };
        Ok(Self {
            path,
            inner: InMemoryRecordStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CatalogError::Io(format!("create {parent:?}: {e}")))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let text =
            serde_json::to_string(snapshot).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        std::fs::write(&tmp, text).map_err(|e| CatalogError::Io(format!("write {tmp:?}: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CatalogError::Io(format!("rename {tmp:?}: {e}")))?;
        Ok(())
    }
}

impl RecordStore for JsonFileRecordStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, CatalogError> {
        self.inner.get(collection, id)
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>, CatalogError> {
        self.inner.list(collection)
    }

    fn query(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, CatalogError> {
        self.inner.query(collection, field, value)
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), CatalogError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut next = self.inner.clone();
        next.apply(batch)?;
        self.write_snapshot(next.snapshot())?;
        self.inner = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileRecordStore;
    use crate::CatalogError;
    use crate::records::{Grid, Lead, fields};
    use crate::store::{RecordStore, RecordStoreExt, WriteBatch};
    use pretty_assertions::assert_eq;

    fn lead(id: &str, key: &str) -> Lead {
        Lead {
            id: id.to_string(),
            grid_id: Some("g".to_string()),
            cell_id: None,
            name: "Smith's Farm".to_string(),
            address: String::new(),
            city: Some("Guelph".to_string()),
            lat: 43.5,
            lng: -80.2,
            place_type: None,
            external_id: None,
            dedup_key: key.to_string(),
            cluster_id: None,
            created_at_ms: 0,
            enriched_at_ms: None,
        }
    }

    #[test]
    fn reopen_restores_documents_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let mut store = JsonFileRecordStore::open(&path).unwrap();
            store.insert_doc(&Grid::new("g", "Wellington", 5)).unwrap();
            store.insert_doc(&lead("l1", "smiths farm::guelph")).unwrap();
        }

        let store = JsonFileRecordStore::open(&path).unwrap();
        assert_eq!(store.require_doc::<Grid>("g").unwrap().name, "Wellington");
        let hits: Vec<Lead> = store
            .query_docs(fields::DEDUP_KEY, "smiths farm::guelph")
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "l1");
    }

    #[test]
    fn rejected_batch_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonFileRecordStore::open(&path).unwrap();
        store.insert_doc(&Grid::new("g", "Wellington", 5)).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut batch = WriteBatch::new();
        batch.insert(&lead("l1", "k")).unwrap();
        batch.delete::<Grid>("nope");
        assert!(matches!(store.apply(batch), Err(CatalogError::NotFound(_))));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert!(store.get_doc::<Lead>("l1").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileRecordStore::open(&path),
            Err(CatalogError::Corrupt(_))
        ));
    }
}
