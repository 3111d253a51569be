//! List mutation behaviour over the in-memory store

use async_trait::async_trait;
use pingfeed_sdk::store::{
    Collection, Expect, MemoryStore, OrderBy, RecordStore, Row, Snapshot, WriteOutcome,
    COMMUNITY_PINGS, FOLLOWED, PING_COMMENTS, PING_LIKES,
};
use pingfeed_sdk::{Comment, ListMutator, Ping, SdkError, WritePolicy};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

fn mutator(store: &MemoryStore, policy: WritePolicy) -> ListMutator {
    ListMutator::new(Arc::new(store.clone()), policy)
}

fn comment(text: &str, user: &str) -> Comment {
    Comment {
        comment: text.into(),
        user: user.into(),
        user_image: None,
    }
}

fn ping(id: &str) -> Ping {
    Ping {
        id: id.into(),
        title: Some(format!("ping {}", id)),
        image_url: None,
        user: "alice".into(),
        user_image: None,
        created_at: None,
    }
}

#[tokio::test]
async fn test_toggle_like_twice() {
    let store = MemoryStore::new();
    let mutator = mutator(&store, WritePolicy::default());

    let first = mutator.toggle(&PING_LIKES, "ping-1", "alice").await.unwrap();
    assert!(first.is_member);
    assert_eq!(first.count, 1);
    assert_eq!(first.members, vec!["alice"]);

    let second = mutator.toggle(&PING_LIKES, "ping-1", "alice").await.unwrap();
    assert!(!second.is_member);
    assert_eq!(second.count, 0);
    assert!(mutator.members(&PING_LIKES, "ping-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_toggle_keeps_other_members_in_order() {
    let store = MemoryStore::new();
    store
        .seed("likes", json!({"ping": "ping-1", "likes": ["bob", "carol", "bob"]}))
        .await
        .unwrap();
    let mutator = mutator(&store, WritePolicy::default());

    let change = mutator.toggle(&PING_LIKES, "ping-1", "alice").await.unwrap();
    assert_eq!(change.members, vec!["bob", "carol", "alice"]);

    let change = mutator.toggle(&PING_LIKES, "ping-1", "carol").await.unwrap();
    assert_eq!(change.members, vec!["bob", "alice"]);
}

#[tokio::test]
async fn test_append_comment_keeps_order() {
    let store = MemoryStore::new();
    store
        .seed(
            "comments",
            json!({"ping": "ping-2", "comments": [{"comment": "hi", "user": "bob"}]}),
        )
        .await
        .unwrap();
    let mutator = mutator(&store, WritePolicy::default());

    let comments = mutator
        .append(&PING_COMMENTS, "ping-2", comment("there", "alice"))
        .await
        .unwrap();

    assert_eq!(comments, vec![comment("hi", "bob"), comment("there", "alice")]);
    let stored: Vec<Comment> = mutator.entries(&PING_COMMENTS, "ping-2").await.unwrap();
    assert_eq!(stored, comments);
}

#[tokio::test]
async fn test_append_creates_record_on_first_comment() {
    let store = MemoryStore::new();
    let mutator = mutator(&store, WritePolicy::default());

    for (i, user) in ["a", "b", "c"].iter().enumerate() {
        let comments = mutator
            .append(&PING_COMMENTS, "ping-9", comment(&format!("c{}", i), user))
            .await
            .unwrap();
        assert_eq!(comments.len(), i + 1);
        assert_eq!(comments[i].user, *user);
    }
    assert_eq!(store.rows("comments").await.len(), 1);
}

#[tokio::test]
async fn test_prepend_puts_new_ping_first() {
    let store = MemoryStore::new();
    store
        .seed(
            "communitys",
            json!({"title": "titleX", "pings": [ping("A"), ping("B")]}),
        )
        .await
        .unwrap();
    let mutator = mutator(&store, WritePolicy::default());

    let feed = mutator.prepend(&COMMUNITY_PINGS, "titleX", ping("C")).await.unwrap();

    let ids: Vec<_> = feed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn test_missing_parent_is_not_found() {
    let store = MemoryStore::new();
    let mutator = mutator(&store, WritePolicy::default());

    let result = mutator.prepend(&COMMUNITY_PINGS, "nowhere", ping("C")).await;
    assert!(matches!(result, Err(SdkError::NotFound(_))));

    let result = mutator.toggle(&FOLLOWED, "user-1", "Expo").await;
    assert!(matches!(result, Err(SdkError::NotFound(_))));
    assert_eq!(store.write_count(), 0);
}

/// Holds the first two reads until both have happened
struct GatedStore {
    inner: MemoryStore,
    reads: AtomicU32,
    gate: Barrier,
}

impl GatedStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            reads: AtomicU32::new(0),
            gate: Barrier::new(2),
        }
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn fetch(
        &self,
        collection: &Collection,
        key: &str,
    ) -> pingfeed_sdk::Result<Option<Snapshot>> {
        let snapshot = self.inner.fetch(collection, key).await?;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait().await;
        }
        Ok(snapshot)
    }

    async fn write(
        &self,
        collection: &Collection,
        key: &str,
        items: &[Value],
        expect: Expect,
    ) -> pingfeed_sdk::Result<WriteOutcome> {
        self.inner.write(collection, key, items, expect).await
    }

    fn supports_versions(&self) -> bool {
        self.inner.supports_versions()
    }

    async fn get_row(&self, table: &str, column: &str, value: &str) -> pingfeed_sdk::Result<Option<Row>> {
        self.inner.get_row(table, column, value).await
    }

    async fn list_rows(&self, table: &str, order: Option<&OrderBy>) -> pingfeed_sdk::Result<Vec<Row>> {
        self.inner.list_rows(table, order).await
    }

    async fn insert_row(&self, table: &str, row: Row) -> pingfeed_sdk::Result<Row> {
        self.inner.insert_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: Row,
    ) -> pingfeed_sdk::Result<bool> {
        self.inner.update_row(table, column, value, patch).await
    }
}

async fn race_two_toggles(policy: WritePolicy) -> (MemoryStore, Vec<bool>) {
    let inner = MemoryStore::new();
    let mutator = ListMutator::new(Arc::new(GatedStore::new(inner.clone())), policy);

    let a = tokio::spawn({
        let mutator = mutator.clone();
        async move { mutator.toggle(&PING_LIKES, "ping-1", "alice").await }
    });
    let b = tokio::spawn({
        let mutator = mutator.clone();
        async move { mutator.toggle(&PING_LIKES, "ping-1", "alice").await }
    });

    let mut outcomes = vec![
        a.await.unwrap().unwrap().is_member,
        b.await.unwrap().unwrap().is_member,
    ];
    outcomes.sort();
    (inner, outcomes)
}

#[tokio::test]
async fn test_concurrent_toggle_last_write_wins_loses_update() {
    let (store, outcomes) = race_two_toggles(WritePolicy::LastWriteWins).await;

    // Both read {} and both wrote {"alice"}
    assert_eq!(outcomes, vec![true, true]);
    let snapshot = store.fetch(&PING_LIKES, "ping-1").await.unwrap().unwrap();
    assert_eq!(snapshot.items, vec![json!("alice")]);
}

#[tokio::test]
async fn test_concurrent_toggle_versioned_retries() {
    let policy = WritePolicy::Versioned {
        max_attempts: 3,
        retry_delay_ms: 1,
    };
    let (store, outcomes) = race_two_toggles(policy).await;

    // The loser re-read {"alice"} and toggled it back off
    assert_eq!(outcomes, vec![false, true]);
    let snapshot = store.fetch(&PING_LIKES, "ping-1").await.unwrap().unwrap();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.version, 1);
}

/// Every conditional write loses
struct ContendedStore {
    inner: MemoryStore,
}

#[async_trait]
impl RecordStore for ContendedStore {
    async fn fetch(
        &self,
        _collection: &Collection,
        _key: &str,
    ) -> pingfeed_sdk::Result<Option<Snapshot>> {
        Ok(Some(Snapshot {
            items: Vec::new(),
            version: 7,
        }))
    }

    async fn write(
        &self,
        collection: &Collection,
        key: &str,
        items: &[Value],
        _expect: Expect,
    ) -> pingfeed_sdk::Result<WriteOutcome> {
        // Count the attempt without landing it
        self.inner
            .write(collection, key, items, Expect::Version(-1))
            .await
    }

    fn supports_versions(&self) -> bool {
        true
    }

    async fn get_row(&self, table: &str, column: &str, value: &str) -> pingfeed_sdk::Result<Option<Row>> {
        self.inner.get_row(table, column, value).await
    }

    async fn list_rows(&self, table: &str, order: Option<&OrderBy>) -> pingfeed_sdk::Result<Vec<Row>> {
        self.inner.list_rows(table, order).await
    }

    async fn insert_row(&self, table: &str, row: Row) -> pingfeed_sdk::Result<Row> {
        self.inner.insert_row(table, row).await
    }

    async fn update_row(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: Row,
    ) -> pingfeed_sdk::Result<bool> {
        self.inner.update_row(table, column, value, patch).await
    }
}

#[tokio::test]
async fn test_versioned_gives_up_after_max_attempts() {
    let inner = MemoryStore::new();
    let store = ContendedStore {
        inner: inner.clone(),
    };
    let mutator = ListMutator::new(
        Arc::new(store),
        WritePolicy::Versioned {
            max_attempts: 3,
            retry_delay_ms: 0,
        },
    );

    let result = mutator.toggle(&PING_LIKES, "ping-1", "alice").await;

    match result {
        Err(SdkError::Conflict { key, attempts }) => {
            assert_eq!(key, "ping_likes/ping-1");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(inner.write_count(), 3);
}
