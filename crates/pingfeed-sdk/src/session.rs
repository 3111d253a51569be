//! Acting user identity
//!
//! The identity is resolved once after sign-in and shared by reference with
//! every operation. Operations that need an actor fail with
//! [`SdkError::Unresolved`] while the context is empty.

use crate::error::{Result, SdkError};
use crate::model::Profile;
use crate::store::{RecordStore, Row};
use async_trait::async_trait;
use pingfeed_client::{AuthUser, BackendClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

const PROFILES: &str = "profiles";

/// The signed-in user, as the app refers to them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Resolves the account behind an access token
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self, access_token: &str) -> Result<AuthUser>;
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn current_user(&self, access_token: &str) -> Result<AuthUser> {
        let client = self.clone().with_access_token(access_token);
        Ok(client.get_user().await?)
    }
}

/// Fixed token-to-account table, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    users: HashMap<String, AuthUser>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, access_token: impl Into<String>, user: AuthUser) -> Self {
        self.users.insert(access_token.into(), user);
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self, access_token: &str) -> Result<AuthUser> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| SdkError::Unresolved("unknown access token".into()))
    }
}

/// Session-wide identity holder
#[derive(Debug, Default)]
pub struct SessionContext {
    identity: RwLock<Option<Identity>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that is already resolved
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    /// Resolve the account behind `access_token` and its profile
    ///
    /// The profile is looked up by account id first and by email second.
    /// An account without a profile row still resolves, without a username.
    pub async fn resolve(
        &self,
        auth: &dyn AuthProvider,
        store: &dyn RecordStore,
        access_token: &str,
    ) -> Result<Identity> {
        if access_token.trim().is_empty() {
            return Err(SdkError::Unresolved("no access token".into()));
        }

        let user = auth.current_user(access_token).await?;

        let mut row = store.get_row(PROFILES, "id", &user.id).await?;
        if row.is_none() {
            if let Some(ref email) = user.email {
                row = store.get_row(PROFILES, "email", email).await?;
            }
        }

        let profile = row.map(profile_from_row).transpose()?;
        if profile.is_none() {
            debug!(user_id = %user.id, "No profile row for account");
        }

        let identity = Identity {
            user_id: profile
                .as_ref()
                .map(|p| p.id.clone())
                .unwrap_or_else(|| user.id.clone()),
            email: user
                .email
                .clone()
                .or_else(|| profile.as_ref().and_then(|p| p.email.clone())),
            username: profile.as_ref().and_then(|p| p.username.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url),
        };

        info!(user_id = %identity.user_id, username = ?identity.username, "Session resolved");
        self.set(identity.clone()).await;
        Ok(identity)
    }

    pub async fn identity(&self) -> Result<Identity> {
        self.identity
            .read()
            .await
            .clone()
            .ok_or_else(|| SdkError::Unresolved("not signed in".into()))
    }

    /// Username used in likes and comments
    pub async fn actor(&self) -> Result<String> {
        let identity = self.identity().await?;
        identity
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SdkError::Unresolved(format!("profile {} has no username", identity.user_id)))
    }

    /// Profile id keying follows and bookmarks
    pub async fn user_id(&self) -> Result<String> {
        Ok(self.identity().await?.user_id)
    }

    pub async fn set(&self, identity: Identity) {
        *self.identity.write().await = Some(identity);
    }

    /// Replace the avatar after an upload
    pub async fn set_avatar(&self, avatar_url: impl Into<String>) -> Result<()> {
        let mut guard = self.identity.write().await;
        let identity = guard
            .as_mut()
            .ok_or_else(|| SdkError::Unresolved("not signed in".into()))?;
        identity.avatar_url = Some(avatar_url.into());
        Ok(())
    }

    /// Forget the identity (sign-out)
    pub async fn clear(&self) {
        *self.identity.write().await = None;
    }

    pub async fn is_resolved(&self) -> bool {
        self.identity.read().await.is_some()
    }
}

fn profile_from_row(row: Row) -> Result<Profile> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

/// Access token persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The signed-in marker kept on disk
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored session, or `None` when signed out
    pub fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Remove the marker; signed out already is fine
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn auth() -> StaticAuth {
        StaticAuth::new().with_user(
            "token-1",
            AuthUser {
                id: "u1".into(),
                email: Some("alice@example.com".into()),
            },
        )
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_email() {
        let store = MemoryStore::new();
        store
            .seed(
                "profiles",
                json!({"id": "p-9", "email": "alice@example.com", "username": "alice"}),
            )
            .await
            .unwrap();

        let session = SessionContext::new();
        let identity = session.resolve(&auth(), &store, "token-1").await.unwrap();

        assert_eq!(identity.user_id, "p-9");
        assert_eq!(session.actor().await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_empty_context_is_unresolved() {
        let session = SessionContext::new();
        assert!(matches!(session.actor().await, Err(SdkError::Unresolved(_))));

        session
            .set(Identity {
                user_id: "u1".into(),
                email: None,
                username: None,
                avatar_url: None,
            })
            .await;
        assert!(session.is_resolved().await);
        // Resolved, but no username to act with
        assert!(matches!(session.actor().await, Err(SdkError::Unresolved(_))));

        session.clear().await;
        assert!(!session.is_resolved().await);
    }

    #[tokio::test]
    async fn test_unknown_token_is_unresolved() {
        let store = MemoryStore::new();
        let session = SessionContext::new();
        let result = session.resolve(&auth(), &store, "other").await;
        assert!(matches!(result, Err(SdkError::Unresolved(_))));
        assert!(!session.is_resolved().await);
    }
}
