//! Rust client for the pingfeed backend
//!
//! Wraps the three surfaces of the hosted backend the app talks to:
//! - **Auth**: resolve the account behind an access token
//! - **Tables**: exact-match selects, insert, update and upsert-by-key
//! - **Object storage**: uploads and public URLs
//!
//! # Example
//!
//! ```rust,no_run
//! use pingfeed_client::{BackendClient, BackendConfig, Query};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::new(BackendConfig {
//!     base_url: "https://project.example.co".into(),
//!     anon_key: "public-anon-key".into(),
//!     ..Default::default()
//! })?;
//!
//! // Likes recorded against a ping
//! let row: Option<serde_json::Value> = client
//!     .select_maybe_single("likes", &Query::new().select("likes").eq("ping", "ping-1"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

// Re-export main types
pub use client::BackendClient;
pub use error::{ClientError, Result};
pub use types::*;
