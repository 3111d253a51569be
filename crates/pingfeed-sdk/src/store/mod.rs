//! Keyed record store abstraction
//!
//! Every shared collection (likes, follows, bookmarks, comments, community
//! feeds) lives as one JSON array column on a row addressed by an exact-match
//! key. [`RecordStore`] exposes that shape plus the handful of plain row
//! operations the feeds need; [`ObjectStore`] covers image/video uploads.
//!
//! Two backends:
//! - [`RemoteStore`]: the hosted backend through `pingfeed-client`
//! - [`MemoryStore`]: in-process tables, used by tests and offline runs

mod memory;
mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A table row as returned by the store
pub type Row = serde_json::Map<String, Value>;

/// How a collection is mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Set of identity strings, toggled
    Membership,
    /// Structured entries, new ones last
    AppendLog,
    /// Structured entries, new ones first
    Feed,
}

/// Where a collection lives: `table.value_column` on the row whose
/// `key_column` equals the key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub value_column: &'static str,
    pub kind: CollectionKind,
    /// Whether the first write may create the row (upsert-by-key). When false
    /// the row belongs to a parent record and must already exist.
    pub creates_record: bool,
}

/// Who liked a ping, keyed by ping id
pub const PING_LIKES: Collection = Collection {
    name: "ping_likes",
    table: "likes",
    key_column: "ping",
    value_column: "likes",
    kind: CollectionKind::Membership,
    creates_record: true,
};

/// Community titles a profile follows, keyed by profile id
pub const FOLLOWED: Collection = Collection {
    name: "followed",
    table: "profiles",
    key_column: "id",
    value_column: "followed",
    kind: CollectionKind::Membership,
    creates_record: false,
};

/// Pings a profile bookmarked, keyed by profile id
pub const STORED: Collection = Collection {
    name: "stored",
    table: "profiles",
    key_column: "id",
    value_column: "stored",
    kind: CollectionKind::Membership,
    creates_record: false,
};

/// Comments on a ping, keyed by ping id
pub const PING_COMMENTS: Collection = Collection {
    name: "ping_comments",
    table: "comments",
    key_column: "ping",
    value_column: "comments",
    kind: CollectionKind::AppendLog,
    creates_record: true,
};

/// Comments on a reel, keyed by reel id
pub const REEL_COMMENTS: Collection = Collection {
    name: "reel_comments",
    table: "reels",
    key_column: "id",
    value_column: "comments",
    kind: CollectionKind::AppendLog,
    creates_record: false,
};

/// A community's feed, keyed by community title
pub const COMMUNITY_PINGS: Collection = Collection {
    name: "community_pings",
    table: "communitys",
    key_column: "title",
    value_column: "pings",
    kind: CollectionKind::Feed,
    creates_record: false,
};

/// Current value of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Entries of the array column (`null` reads as empty)
    pub items: Vec<Value>,
    /// Row version at read time (0 when the store does not track versions)
    pub version: i64,
}

/// Write precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Unconditional write
    Any,
    /// The row must not exist yet
    Absent,
    /// The row must still carry this version
    Version(i64),
}

/// Outcome of a collection write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The precondition did not hold; nothing was written
    Conflict,
}

/// Sort order for row listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn newest_first() -> Self {
        Self {
            column: "created_at".to_string(),
            ascending: false,
        }
    }
}

/// Store of keyed rows holding JSON collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the collection for `key`; `None` when the row does not exist
    async fn fetch(&self, collection: &Collection, key: &str) -> Result<Option<Snapshot>>;

    /// Write the full collection for `key`
    ///
    /// A row that must exist but does not yields `SdkError::NotFound`. A
    /// failed precondition yields `Ok(WriteOutcome::Conflict)`. Conditional
    /// writes bump the row version by one.
    async fn write(
        &self,
        collection: &Collection,
        key: &str,
        items: &[Value],
        expect: Expect,
    ) -> Result<WriteOutcome>;

    /// Whether `Expect::Version` / `Expect::Absent` are honoured
    fn supports_versions(&self) -> bool {
        false
    }

    /// First row whose `column` equals `value`
    async fn get_row(&self, table: &str, column: &str, value: &str) -> Result<Option<Row>>;

    /// Every row of a table
    async fn list_rows(&self, table: &str, order: Option<&OrderBy>) -> Result<Vec<Row>>;

    /// Insert a row, returning it as stored
    async fn insert_row(&self, table: &str, row: Row) -> Result<Row>;

    /// Patch the rows whose `column` equals `value`; false when none matched
    async fn update_row(&self, table: &str, column: &str, value: &str, patch: Row) -> Result<bool>;
}

/// Blob storage with public retrieval URLs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `bucket/path` (overwriting) and return its public URL
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}

/// Compare a row cell with a textual key the way an `eq` filter does
pub(crate) fn cell_matches(cell: Option<&Value>, key: &str) -> bool {
    match cell {
        Some(Value::String(s)) => s == key,
        Some(Value::Number(n)) => n.to_string() == key,
        Some(Value::Bool(b)) => b.to_string() == key,
        _ => false,
    }
}

/// Decode an array column, treating `null`/missing as empty
pub(crate) fn items_of(row: &Row, column: &str) -> Result<Vec<Value>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(crate::error::SdkError::Serialization(format!(
            "column {} holds {}, expected an array",
            column, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_matches_text_and_numbers() {
        assert!(cell_matches(Some(&json!("ping-1")), "ping-1"));
        assert!(cell_matches(Some(&json!(17)), "17"));
        assert!(!cell_matches(Some(&json!(null)), "null"));
        assert!(!cell_matches(None, "ping-1"));
    }

    #[test]
    fn test_items_of_null_is_empty() {
        let row: Row = serde_json::from_value(json!({"likes": null})).unwrap();
        assert!(items_of(&row, "likes").unwrap().is_empty());
        assert!(items_of(&row, "missing").unwrap().is_empty());

        let bad: Row = serde_json::from_value(json!({"likes": "alice"})).unwrap();
        assert!(items_of(&bad, "likes").is_err());
    }
}
