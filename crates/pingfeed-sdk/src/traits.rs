//! Traits implemented by list entries and searchable records

use crate::error::{Result, SdkError};
use serde::{de::DeserializeOwned, Serialize};

/// An entry stored inside an append-log or feed list.
///
/// # Example
///
/// ```rust,ignore
/// impl ListEntry for Comment {
///     fn primary_text(&self) -> &str { &self.comment }
/// }
///
/// mutator.append(&PING_COMMENTS, "ping-2", comment).await?;
/// ```
pub trait ListEntry: Sized + Clone + Send + Sync + Serialize + DeserializeOwned {
    /// Text that must be non-blank for the entry to be accepted
    fn primary_text(&self) -> &str;

    /// Validate the entry before any store access
    fn validate(&self) -> Result<()> {
        if self.primary_text().trim().is_empty() {
            return Err(SdkError::Validation("entry text is empty".into()));
        }
        Ok(())
    }
}

/// A record that can be matched by the title filter
pub trait Titled {
    fn title(&self) -> &str;
}
