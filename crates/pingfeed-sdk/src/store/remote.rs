//! Record store backed by the hosted backend

use super::*;
use crate::error::SdkError;
use pingfeed_client::{BackendClient, ClientError, Filter, Query, UploadOptions};
use tracing::debug;

/// [`RecordStore`] and [`ObjectStore`] over [`BackendClient`]
///
/// Conditional writes need an integer version column (`not null default 0`)
/// on every table holding a collection; enable them with
/// [`RemoteStore::with_version_column`]. Without one, every write is
/// unconditional.
#[derive(Clone)]
pub struct RemoteStore {
    client: BackendClient,
    version_column: Option<String>,
}

impl RemoteStore {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            version_column: None,
        }
    }

    pub fn with_version_column(mut self, column: impl Into<String>) -> Self {
        self.version_column = Some(column.into());
        self
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    fn not_found(collection: &Collection, key: &str) -> SdkError {
        SdkError::NotFound(format!(
            "{} where {} = {}",
            collection.table, collection.key_column, key
        ))
    }

    fn collection_row(&self, collection: &Collection, key: &str, items: &[Value]) -> Row {
        let mut row = Row::new();
        row.insert(collection.key_column.to_string(), Value::from(key));
        row.insert(collection.value_column.to_string(), Value::Array(items.to_vec()));
        row
    }

    fn rows_from(values: Vec<Value>) -> Result<Vec<Row>> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => Ok(map),
                other => Err(SdkError::Serialization(format!("expected a row, got {}", other))),
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn fetch(&self, collection: &Collection, key: &str) -> Result<Option<Snapshot>> {
        let columns = match self.version_column {
            Some(ref version) => format!("{},{}", collection.value_column, version),
            None => collection.value_column.to_string(),
        };
        let query = Query::new().select(columns).eq(collection.key_column, key);

        let row: Option<Row> = self
            .client
            .select_maybe_single(collection.table, &query)
            .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                items: items_of(&row, collection.value_column)?,
                version: self
                    .version_column
                    .as_deref()
                    .and_then(|c| row.get(c))
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
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
        let key_filter = Filter::eq(collection.key_column, key);

        match (expect, self.version_column.as_deref()) {
            (Expect::Version(expected), Some(version)) => {
                let mut patch = self.collection_row(collection, key, items);
                patch.remove(collection.key_column);
                patch.insert(version.to_string(), Value::from(expected + 1));

                let filters = [key_filter, Filter::eq(version, expected.to_string())];
                let updated = self.client.update(collection.table, &patch, &filters).await?;
                if updated.is_empty() {
                    debug!(collection = collection.name, key, expected, "version check failed");
                    return Ok(WriteOutcome::Conflict);
                }
                Ok(WriteOutcome::Written)
            }
            (Expect::Absent, Some(version)) => {
                if !collection.creates_record {
                    return Err(Self::not_found(collection, key));
                }
                let mut row = self.collection_row(collection, key, items);
                row.insert(version.to_string(), Value::from(0));

                match self.client.insert(collection.table, &[row]).await {
                    Ok(_) => Ok(WriteOutcome::Written),
                    Err(ClientError::Conflict(_)) => Ok(WriteOutcome::Conflict),
                    Err(e) => Err(e.into()),
                }
            }
            _ if collection.creates_record => {
                let row = self.collection_row(collection, key, items);
                self.client
                    .upsert(collection.table, &[row], collection.key_column)
                    .await?;
                Ok(WriteOutcome::Written)
            }
            _ => {
                let mut patch = self.collection_row(collection, key, items);
                patch.remove(collection.key_column);

                let updated = self
                    .client
                    .update(collection.table, &patch, &[key_filter])
                    .await?;
                if updated.is_empty() {
                    return Err(Self::not_found(collection, key));
                }
                Ok(WriteOutcome::Written)
            }
        }
    }

    fn supports_versions(&self) -> bool {
        self.version_column.is_some()
    }

    async fn get_row(&self, table: &str, column: &str, value: &str) -> Result<Option<Row>> {
        let rows: Vec<Row> = self
            .client
            .select(table, &Query::new().eq(column, value).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_rows(&self, table: &str, order: Option<&OrderBy>) -> Result<Vec<Row>> {
        let mut query = Query::new();
        if let Some(order) = order {
            query = query.order(order.column.clone(), order.ascending);
        }
        Ok(self.client.select(table, &query).await?)
    }

    async fn insert_row(&self, table: &str, row: Row) -> Result<Row> {
        let inserted = self.client.insert(table, &[row]).await?;
        Self::rows_from(inserted)?
            .into_iter()
            .next()
            .ok_or_else(|| SdkError::Store(format!("insert into {} returned no row", table)))
    }

    async fn update_row(&self, table: &str, column: &str, value: &str, patch: Row) -> Result<bool> {
        let updated = self
            .client
            .update(table, &patch, &[Filter::eq(column, value)])
            .await?;
        Ok(!updated.is_empty())
    }
}

#[async_trait]
impl ObjectStore for RemoteStore {
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        self.client
            .upload(bucket, path, data, &UploadOptions::upsert(content_type))
            .await?;
        Ok(self.client.public_url(bucket, path))
    }
}
