//! In-process record store

use super::*;
use crate::error::SdkError;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Mutex;

const VERSION_COLUMN: &str = "version";

/// Tables and objects held in memory
///
/// Each write is atomic under a single lock, so conditional writes behave like
/// the backend's conditional update. Rows inserted without `id` or
/// `created_at` get them, the way the backend's column defaults fill them.
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryStore::new();
/// store.seed("communitys", json!({"title": "Expo", "pings": []})).await?;
/// let mutator = ListMutator::new(Arc::new(store), WritePolicy::default());
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
    objects: Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>,
    public_base: String,
    writes: Arc<AtomicU32>,
    next_id: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            public_base: "memory://objects".to_string(),
            ..Default::default()
        }
    }

    /// Insert a fixture row (must be a JSON object)
    pub async fn seed(&self, table: &str, row: Value) -> Result<()> {
        let row = match row {
            Value::Object(map) => map,
            other => {
                return Err(SdkError::Validation(format!(
                    "seed row for {} must be an object, got {}",
                    table, other
                )))
            }
        };
        self.insert_row(table, row).await?;
        Ok(())
    }

    /// All rows of a table, in insertion order
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored object bytes and content type
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects
            .lock()
            .await
            .get(&format!("{}/{}", bucket, path))
            .cloned()
    }

    /// Number of collection writes attempted so far
    pub fn write_count(&self) -> u32 {
        self.writes.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, collection: &Collection, key: &str) -> Result<Option<Snapshot>> {
        let tables = self.tables.lock().await;
        let row = tables
            .get(collection.table)
            .and_then(|rows| rows.iter().find(|r| cell_matches(r.get(collection.key_column), key)));

        match row {
            Some(row) => Ok(Some(Snapshot {
                items: items_of(row, collection.value_column)?,
                version: row.get(VERSION_COLUMN).and_then(Value::as_i64).unwrap_or(0),
            })),
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        collection: &Collection,
        key: &str,
        items: &[Value],
        expect: Expect,
    ) -> Result<WriteOutcome> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        let mut tables = self.tables.lock().await;
        let rows = tables.entry(collection.table.to_string()).or_default();
        let existing = rows
            .iter()
            .position(|r| cell_matches(r.get(collection.key_column), key));

        match (existing, expect) {
            (Some(_), Expect::Absent) => Ok(WriteOutcome::Conflict),
            (Some(i), Expect::Version(expected)) => {
                let row = &mut rows[i];
                let current = row.get(VERSION_COLUMN).and_then(Value::as_i64).unwrap_or(0);
                if current != expected {
                    return Ok(WriteOutcome::Conflict);
                }
                row.insert(collection.value_column.to_string(), Value::Array(items.to_vec()));
                row.insert(VERSION_COLUMN.to_string(), Value::from(expected + 1));
                Ok(WriteOutcome::Written)
            }
            (Some(i), Expect::Any) => {
                rows[i].insert(collection.value_column.to_string(), Value::Array(items.to_vec()));
                Ok(WriteOutcome::Written)
            }
            (None, _) if !collection.creates_record => Err(SdkError::NotFound(format!(
                "{} where {} = {}",
                collection.table, collection.key_column, key
            ))),
            // The row vanished since it was read
            (None, Expect::Version(_)) => Ok(WriteOutcome::Conflict),
            (None, Expect::Absent) | (None, Expect::Any) => {
                let mut row = Row::new();
                row.insert(collection.key_column.to_string(), Value::from(key));
                row.insert(collection.value_column.to_string(), Value::Array(items.to_vec()));
                row.insert(VERSION_COLUMN.to_string(), Value::from(0));
                rows.push(row);
                Ok(WriteOutcome::Written)
            }
        }
    }

    fn supports_versions(&self) -> bool {
        true
    }

    async fn get_row(&self, table: &str, column: &str, value: &str) -> Result<Option<Row>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| cell_matches(r.get(column), value)))
            .cloned())
    }

    async fn list_rows(&self, table: &str, order: Option<&OrderBy>) -> Result<Vec<Row>> {
        let mut rows = self.rows(table).await;

        if let Some(order) = order {
            if order.ascending {
                rows.sort_by(|a, b| compare_cells(a.get(&order.column), b.get(&order.column)));
            } else {
                // Reverse first so equal cells keep newest-first order
                rows.reverse();
                rows.sort_by(|a, b| compare_cells(b.get(&order.column), a.get(&order.column)));
            }
        }

        Ok(rows)
    }

    async fn insert_row(&self, table: &str, mut row: Row) -> Result<Row> {
        if !row.contains_key("id") {
            let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            row.insert("id".to_string(), Value::from(id));
        }
        row.entry("created_at".to_string())
            .or_insert_with(|| Value::from(chrono::Utc::now().to_rfc3339()));

        let mut tables = self.tables.lock().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update_row(&self, table: &str, column: &str, value: &str, patch: Row) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut matched = false;

        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| cell_matches(r.get(column), value)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                matched = true;
            }
        }

        Ok(matched)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let key = format!("{}/{}", bucket, path);
        self.objects
            .lock()
            .await
            .insert(key.clone(), (content_type.to_string(), data));
        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Order cells: missing/null first, then numbers, then text
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_conditional_write_bumps_version() {
        let store = MemoryStore::new();

        assert_eq!(
            store.write(&PING_LIKES, "p1", &[json!("alice")], Expect::Absent).await.unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            store.write(&PING_LIKES, "p1", &[], Expect::Absent).await.unwrap(),
            WriteOutcome::Conflict
        );

        let snapshot = store.fetch(&PING_LIKES, "p1").await.unwrap().unwrap();
        assert_eq!(snapshot.version, 0);

        assert_eq!(
            store.write(&PING_LIKES, "p1", &[], Expect::Version(0)).await.unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            store.write(&PING_LIKES, "p1", &[json!("bob")], Expect::Version(0)).await.unwrap(),
            WriteOutcome::Conflict
        );

        let snapshot = store.fetch(&PING_LIKES, "p1").await.unwrap().unwrap();
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.items.is_empty());
        assert_eq!(store.write_count(), 4);
    }

    #[tokio::test]
    async fn test_parent_row_must_exist() {
        let store = MemoryStore::new();
        let result = store
            .write(&COMMUNITY_PINGS, "Expo", &[], Expect::Any)
            .await;
        assert!(matches!(result, Err(SdkError::NotFound(_))));
        assert!(store.rows("communitys").await.is_empty());
    }

    #[tokio::test]
    async fn test_list_rows_newest_first_keeps_ties_stable() {
        let store = MemoryStore::new();
        store.seed("pings", json!({"id": "a", "created_at": "2025-01-01T00:00:00Z"})).await.unwrap();
        store.seed("pings", json!({"id": "b", "created_at": "2025-01-02T00:00:00Z"})).await.unwrap();
        store.seed("pings", json!({"id": "c", "created_at": "2025-01-02T00:00:00Z"})).await.unwrap();

        let rows = store.list_rows("pings", Some(&OrderBy::newest_first())).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_update_row_reports_match() {
        let store = MemoryStore::new();
        store.seed("profiles", json!({"id": "u1", "avatar_url": null})).await.unwrap();

        let patch: Row = serde_json::from_value(json!({"avatar_url": "x"})).unwrap();
        assert!(store.update_row("profiles", "id", "u1", patch.clone()).await.unwrap());
        assert!(!store.update_row("profiles", "id", "u2", patch).await.unwrap());

        let row = store.get_row("profiles", "id", "u1").await.unwrap().unwrap();
        assert_eq!(row["avatar_url"], json!("x"));
    }
}
