//! Records the app reads and writes
//!
//! Field names follow the backend's column names (including the camel-cased
//! `userImage` inside embedded JSON entries).

use crate::traits::{ListEntry, Titled};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A comment embedded in a ping's or reel's comment list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub comment: String,
    pub user: String,
    #[serde(rename = "userImage", default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
}

impl ListEntry for Comment {
    fn primary_text(&self) -> &str {
        &self.comment
    }
}

/// A feed post: caption and/or image, posted into a community
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub user: String,
    #[serde(rename = "userImage", default, skip_serializing_if = "Option::is_none")]
    pub user_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ListEntry for Ping {
    /// A ping needs a caption or an image
    fn primary_text(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.image_url.as_deref())
            .unwrap_or("")
    }
}

impl Titled for Ping {
    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// A ping together with its like count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingWithLikes {
    #[serde(flatten)]
    pub ping: Ping,
    pub like_count: usize,
}

/// A named group with a feed of pings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pings: Vec<Ping>,
}

impl Titled for Community {
    fn title(&self) -> &str {
        &self.title
    }
}

/// A short video post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reel {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub video_url: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A user profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub followed: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub stored: Vec<String>,
}

/// Accept `null` wherever a list column is expected
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifiers come back as text or as integers depending on the table
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
