//! Pingfeed SDK - shared-list mutation for a hosted social backend
//!
//! Likes, follows, bookmarks, comments and community feeds are all JSON
//! arrays stored against a key in a remote table. This crate owns the
//! read-modify-write protocol for those arrays and the operations built on
//! top of it.
//!
//! # Architecture
//!
//! - [`store`]: keyed record store trait, remote and in-memory backends
//! - [`mutator`]: toggle / append / prepend with a configurable [`WritePolicy`]
//! - [`session`]: acting identity, resolved once and shared by `Arc`
//! - [`optimistic`]: pending/confirmed/failed view state with rollback
//! - [`social`]: named app operations (like, follow, comment, post, ...)
//!
//! # Example
//!
//! ```rust,ignore
//! use pingfeed_sdk::{Social, SessionContext, MemoryStore, WritePolicy};
//!
//! let store = Arc::new(MemoryStore::new());
//! let session = Arc::new(SessionContext::new());
//! session.resolve(&auth, store.as_ref(), &token).await?;
//!
//! let social = Social::new(store.clone(), store, session, WritePolicy::default());
//! let change = social.toggle_like("ping-1").await?;
//! println!("{} likes", change.count);
//! ```

// Error types
pub mod error;

// Configuration
pub mod config;

// Records and entry traits
pub mod model;
pub mod traits;

// Storage backends
pub mod store;

// Mutation protocol
pub mod mutator;
pub mod optimistic;

// Identity
pub mod session;

// Title filter
pub mod search;

// App operations
pub mod social;

pub use config::{Config, MutationConfig, PolicyKind};
pub use error::{Result, SdkError};
pub use model::{Comment, Community, Ping, PingWithLikes, Profile, Reel};
pub use mutator::{ListMutator, MembershipChange, MembershipSet, WritePolicy};
pub use optimistic::{MembershipView, MutationState, Optimistic};
pub use search::filter_by_title;
pub use session::{AuthProvider, Identity, SessionContext, SessionFile, StaticAuth, StoredSession};
pub use social::{decode_media, NewPing, Social};
pub use store::{
    Collection, CollectionKind, Expect, MemoryStore, ObjectStore, RecordStore, RemoteStore,
    WriteOutcome,
};
pub use traits::{ListEntry, Titled};

// Re-export from the backend client
pub use pingfeed_client::{AuthUser, BackendClient, BackendConfig};
