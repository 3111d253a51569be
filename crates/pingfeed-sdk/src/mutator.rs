//! Read-modify-write of shared collections
//!
//! Every mutation reads the whole collection for a key, computes the new value
//! locally and writes the whole value back. Under [`WritePolicy::Versioned`]
//! the write only lands if the row still carries the version that was read;
//! otherwise the mutation is recomputed from a fresh read.

use crate::error::{Result, SdkError};
use crate::store::{Collection, CollectionKind, Expect, RecordStore, WriteOutcome};
use crate::traits::ListEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How concurrent writers to the same key are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Conditional write on the version read; re-read and recompute on conflict
    Versioned {
        max_attempts: u32,
        retry_delay_ms: u64,
    },
    /// Unconditional write. Two writers that read the same value both write
    /// their own result and the last one to land wins.
    LastWriteWins,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::Versioned {
            max_attempts: 3,
            retry_delay_ms: 50,
        }
    }
}

/// Identity strings attached to a record, without duplicates, in order of
/// first insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipSet(Vec<String>);

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a stored array, dropping duplicates that slipped in
    pub fn from_values(values: &[Value]) -> Result<Self> {
        let mut set = Self::new();
        for value in values {
            match value {
                Value::String(s) => {
                    set.insert(s);
                }
                other => {
                    return Err(SdkError::Serialization(format!(
                        "membership entry must be a string, got {}",
                        other
                    )))
                }
            }
        }
        Ok(set)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.0.iter().any(|m| m == member)
    }

    /// Add a member; false if it was already present
    pub fn insert(&mut self, member: &str) -> bool {
        if self.contains(member) {
            return false;
        }
        self.0.push(member.to_string());
        true
    }

    /// Remove a member; false if it was not present
    pub fn remove(&mut self, member: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|m| m != member);
        self.0.len() != before
    }

    /// Flip membership, returning whether `member` is now in the set
    pub fn toggle(&mut self, member: &str) -> bool {
        if self.remove(member) {
            false
        } else {
            self.insert(member)
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn members(&self) -> &[String] {
        &self.0
    }

    pub fn into_members(self) -> Vec<String> {
        self.0
    }

    fn to_values(&self) -> Vec<Value> {
        self.0.iter().map(|m| Value::from(m.as_str())).collect()
    }
}

/// Result of a membership toggle, as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub is_member: bool,
    pub count: usize,
    pub members: Vec<String>,
}

/// Applies toggle/append/prepend mutations to collections in a [`RecordStore`]
///
/// # Example
///
/// ```rust,ignore
/// let mutator = ListMutator::new(store, WritePolicy::default());
/// let change = mutator.toggle(&PING_LIKES, "ping-1", "alice").await?;
/// assert!(change.is_member);
/// ```
#[derive(Clone)]
pub struct ListMutator {
    store: Arc<dyn RecordStore>,
    policy: WritePolicy,
}

impl ListMutator {
    pub fn new(store: Arc<dyn RecordStore>, policy: WritePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Add `actor` to the set if absent, remove it if present
    pub async fn toggle(
        &self,
        collection: &Collection,
        key: &str,
        actor: &str,
    ) -> Result<MembershipChange> {
        require_kind(collection, CollectionKind::Membership)?;
        let key = required(key, "key")?;
        let actor = required(actor, "actor")?;

        let result = self
            .mutate(collection, key, |items| {
                let mut set = MembershipSet::from_values(&items)?;
                let is_member = set.toggle(actor);
                let values = set.to_values();
                Ok((
                    values,
                    MembershipChange {
                        is_member,
                        count: set.len(),
                        members: set.into_members(),
                    },
                ))
            })
            .await;

        match result {
            Ok(change) => {
                debug!(
                    collection = collection.name,
                    key,
                    actor,
                    is_member = change.is_member,
                    count = change.count,
                    "Toggled membership"
                );
                Ok(change)
            }
            Err(e) => {
                warn!(collection = collection.name, key, actor, error = %e, "Toggle failed");
                Err(e)
            }
        }
    }

    /// Add `entry` at the end of the list
    pub async fn append<E: ListEntry>(
        &self,
        collection: &Collection,
        key: &str,
        entry: E,
    ) -> Result<Vec<E>> {
        require_kind(collection, CollectionKind::AppendLog)?;
        self.insert_entry(collection, key, entry, false).await
    }

    /// Add `entry` at the front of the list
    pub async fn prepend<E: ListEntry>(
        &self,
        collection: &Collection,
        key: &str,
        entry: E,
    ) -> Result<Vec<E>> {
        require_kind(collection, CollectionKind::Feed)?;
        self.insert_entry(collection, key, entry, true).await
    }

    /// Current members of a set; a missing record reads as empty
    pub async fn members(&self, collection: &Collection, key: &str) -> Result<MembershipSet> {
        let key = required(key, "key")?;
        match self.store.fetch(collection, key).await? {
            Some(snapshot) => MembershipSet::from_values(&snapshot.items),
            None => Ok(MembershipSet::new()),
        }
    }

    /// Current entries of a list; a missing record reads as empty
    pub async fn entries<E: DeserializeOwned>(
        &self,
        collection: &Collection,
        key: &str,
    ) -> Result<Vec<E>> {
        let key = required(key, "key")?;
        match self.store.fetch(collection, key).await? {
            Some(snapshot) => decode_entries(snapshot.items),
            None => Ok(Vec::new()),
        }
    }

    async fn insert_entry<E: ListEntry>(
        &self,
        collection: &Collection,
        key: &str,
        entry: E,
        front: bool,
    ) -> Result<Vec<E>> {
        let key = required(key, "key")?;
        entry.validate()?;
        let value = serde_json::to_value(&entry)?;

        let result = self
            .mutate(collection, key, |mut items| {
                if front {
                    items.insert(0, value.clone());
                } else {
                    items.push(value.clone());
                }
                let entries = decode_entries(items.clone())?;
                Ok((items, entries))
            })
            .await;

        match result {
            Ok(entries) => {
                debug!(
                    collection = collection.name,
                    key,
                    len = entries.len(),
                    front,
                    "Inserted entry"
                );
                Ok(entries)
            }
            Err(e) => {
                warn!(collection = collection.name, key, error = %e, "Insert failed");
                Err(e)
            }
        }
    }

    /// Read, compute, write; retried on conflict under the versioned policy
    async fn mutate<F, T>(&self, collection: &Collection, key: &str, mut compute: F) -> Result<T>
    where
        F: FnMut(Vec<Value>) -> Result<(Vec<Value>, T)> + Send,
        T: Send,
    {
        let (versioned, max_attempts, retry_delay_ms) = match self.policy {
            WritePolicy::Versioned {
                max_attempts,
                retry_delay_ms,
            } if self.store.supports_versions() => (true, max_attempts.max(1), retry_delay_ms),
            _ => (false, 1, 0),
        };

        for attempt in 0..max_attempts {
            let snapshot = self.store.fetch(collection, key).await?;

            let (items, expect) = match snapshot {
                Some(snapshot) if versioned => (snapshot.items, Expect::Version(snapshot.version)),
                Some(snapshot) => (snapshot.items, Expect::Any),
                None if !collection.creates_record => {
                    return Err(SdkError::NotFound(format!(
                        "{} where {} = {}",
                        collection.table, collection.key_column, key
                    )))
                }
                None if versioned => (Vec::new(), Expect::Absent),
                None => (Vec::new(), Expect::Any),
            };

            let (next, output) = compute(items)?;

            match self.store.write(collection, key, &next, expect).await? {
                WriteOutcome::Written => return Ok(output),
                WriteOutcome::Conflict => {
                    debug!(
                        collection = collection.name,
                        key,
                        attempt = attempt + 1,
                        max_attempts,
                        "Concurrent write detected, retrying"
                    );
                    if attempt + 1 < max_attempts {
                        let delay = retry_delay_ms * (attempt as u64 + 1);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        Err(SdkError::Conflict {
            key: format!("{}/{}", collection.name, key),
            attempts: max_attempts,
        })
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SdkError::Unresolved(format!("{} is empty", what)));
    }
    Ok(trimmed)
}

fn require_kind(collection: &Collection, expected: CollectionKind) -> Result<()> {
    if collection.kind != expected {
        return Err(SdkError::Validation(format!(
            "{} is a {:?} collection, not {:?}",
            collection.name, collection.kind, expected
        )));
    }
    Ok(())
}

fn decode_entries<E: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<E>> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(SdkError::from))
        .collect()
}
