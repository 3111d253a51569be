//! Named app operations
//!
//! [`Social`] ties the mutator, the stores and the session together: every
//! operation takes its actor from the shared [`SessionContext`] and fails
//! with `Unresolved` before touching the store when nobody is signed in.

use crate::error::{Result, SdkError};
use crate::model::{Comment, Community, Ping, PingWithLikes, Reel};
use crate::mutator::{ListMutator, MembershipChange, WritePolicy};
use crate::optimistic::MembershipView;
use crate::search::filter_by_title;
use crate::session::SessionContext;
use crate::store::{
    ObjectStore, OrderBy, RecordStore, Row, COMMUNITY_PINGS, FOLLOWED, PING_COMMENTS, PING_LIKES,
    REEL_COMMENTS, STORED,
};
use crate::traits::ListEntry;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const PINGS: &str = "pings";
const COMMUNITIES: &str = "communitys";
const REELS: &str = "reels";
const PROFILES: &str = "profiles";

const PING_PICS: &str = "ping_pics";
const COMMUNITY_PICS: &str = "community_pics";
const VIDEOS: &str = "videos";
const AVATARS: &str = "avatars";

const JPEG: &str = "image/jpeg";
const MP4: &str = "video/mp4";

/// A ping about to be posted
#[derive(Debug, Clone, Default)]
pub struct NewPing {
    pub community: String,
    pub title: Option<String>,
    /// JPEG bytes
    pub image: Option<Vec<u8>>,
}

/// App operations over a record store and an object store
#[derive(Clone)]
pub struct Social {
    mutator: ListMutator,
    store: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    session: Arc<SessionContext>,
}

impl Social {
    pub fn new(
        store: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        session: Arc<SessionContext>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            mutator: ListMutator::new(store.clone(), policy),
            store,
            objects,
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn mutator(&self) -> &ListMutator {
        &self.mutator
    }

    // ---- likes, follows, bookmarks ----

    /// Like or unlike a ping as the signed-in user
    pub async fn toggle_like(&self, ping_id: &str) -> Result<MembershipChange> {
        let actor = self.session.actor().await?;
        self.mutator.toggle(&PING_LIKES, ping_id, &actor).await
    }

    /// Like count of a ping and whether the signed-in user is among the likers
    pub async fn like_state(&self, ping_id: &str) -> Result<MembershipView> {
        let actor = self.session.actor().await?;
        let likes = self.mutator.members(&PING_LIKES, ping_id).await?;
        Ok(MembershipView {
            is_member: likes.contains(&actor),
            count: likes.len(),
        })
    }

    /// Follow or unfollow a community
    pub async fn toggle_follow(&self, community: &str) -> Result<MembershipChange> {
        let user_id = self.session.user_id().await?;
        self.mutator.toggle(&FOLLOWED, &user_id, community).await
    }

    pub async fn is_following(&self, community: &str) -> Result<bool> {
        let user_id = self.session.user_id().await?;
        Ok(self.mutator.members(&FOLLOWED, &user_id).await?.contains(community))
    }

    /// Bookmark or un-bookmark a ping
    pub async fn toggle_saved(&self, ping_id: &str) -> Result<MembershipChange> {
        let user_id = self.session.user_id().await?;
        self.mutator.toggle(&STORED, &user_id, ping_id).await
    }

    /// Communities the signed-in user follows, in listing order
    pub async fn followed_communities(&self) -> Result<Vec<Community>> {
        let user_id = self.session.user_id().await?;
        let followed = self.mutator.members(&FOLLOWED, &user_id).await?;

        let mut communities = self.communities().await?;
        communities.retain(|c| followed.contains(&c.title));
        Ok(communities)
    }

    // ---- comments ----

    pub async fn comment_on_ping(&self, ping_id: &str, text: &str) -> Result<Vec<Comment>> {
        let comment = self.comment(text).await?;
        self.mutator.append(&PING_COMMENTS, ping_id, comment).await
    }

    pub async fn comment_on_reel(&self, reel_id: &str, text: &str) -> Result<Vec<Comment>> {
        let comment = self.comment(text).await?;
        self.mutator.append(&REEL_COMMENTS, reel_id, comment).await
    }

    pub async fn ping_comments(&self, ping_id: &str) -> Result<Vec<Comment>> {
        self.mutator.entries(&PING_COMMENTS, ping_id).await
    }

    pub async fn reel_comments(&self, reel_id: &str) -> Result<Vec<Comment>> {
        self.mutator.entries(&REEL_COMMENTS, reel_id).await
    }

    async fn comment(&self, text: &str) -> Result<Comment> {
        let identity = self.session.identity().await?;
        let comment = Comment {
            comment: text.trim().to_string(),
            user: self.session.actor().await?,
            user_image: identity.avatar_url,
        };
        comment.validate()?;
        Ok(comment)
    }

    // ---- pings and communities ----

    /// Post a ping into a community feed and the global ping table
    ///
    /// The image, if any, is uploaded first; the community feed gets the ping
    /// at the front, then the ping row is inserted.
    pub async fn post_ping(&self, new: NewPing) -> Result<Ping> {
        let identity = self.session.identity().await?;
        let actor = self.session.actor().await?;

        let community = new.community.trim();
        if community.is_empty() {
            return Err(SdkError::Unresolved("no community selected".into()));
        }
        let title = new.title.filter(|t| !t.trim().is_empty());
        let image = new.image.filter(|bytes| !bytes.is_empty());
        if title.is_none() && image.is_none() {
            return Err(SdkError::Validation("a ping needs a title or an image".into()));
        }

        self.require_community(community).await?;

        let millis = chrono::Utc::now().timestamp_millis();
        let mut ping = Ping {
            id: millis.to_string(),
            title,
            image_url: None,
            user: actor,
            user_image: identity.avatar_url,
            created_at: None,
        };

        if let Some(bytes) = image {
            let path = format!("{}/{}.jpg", community, millis);
            ping.image_url = Some(self.objects.put_object(PING_PICS, &path, bytes, JPEG).await?);
        }

        self.mutator.prepend(&COMMUNITY_PINGS, community, ping.clone()).await?;

        let stored = match self.store.insert_row(PINGS, to_row(&ping)?).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    ping_id = %ping.id,
                    community,
                    error = %e,
                    "Ping is in the community feed but its row insert failed"
                );
                return Err(e);
            }
        };
        info!(ping_id = %ping.id, community, "Posted ping");
        from_row(stored)
    }

    /// The feed of one community, newest first
    pub async fn community_feed(&self, title: &str) -> Result<Vec<Ping>> {
        Ok(self.require_community(title).await?.pings)
    }

    /// Every ping, newest first
    pub async fn explore_feed(&self) -> Result<Vec<Ping>> {
        self.list(PINGS, Some(&OrderBy::newest_first())).await
    }

    pub async fn communities(&self) -> Result<Vec<Community>> {
        self.list(COMMUNITIES, None).await
    }

    pub async fn search_communities(&self, query: &str) -> Result<Vec<Community>> {
        Ok(filter_by_title(&self.communities().await?, query))
    }

    /// The signed-in user's pings in a community, with like counts
    pub async fn my_pings_in(&self, community: &str) -> Result<Vec<PingWithLikes>> {
        let actor = self.session.actor().await?;
        let feed = self.community_feed(community).await?;

        let mut result = Vec::new();
        for ping in feed.into_iter().filter(|p| p.user == actor) {
            let like_count = self.mutator.members(&PING_LIKES, &ping.id).await?.len();
            result.push(PingWithLikes { ping, like_count });
        }
        Ok(result)
    }

    /// Create a community with a cover image
    pub async fn create_community(&self, title: &str, image: Vec<u8>) -> Result<Community> {
        self.session.identity().await?;

        let title = title.trim();
        if title.is_empty() || image.is_empty() {
            return Err(SdkError::Validation("a community needs a title and an image".into()));
        }
        if self.store.get_row(COMMUNITIES, "title", title).await?.is_some() {
            return Err(SdkError::Validation(format!("community {} already exists", title)));
        }

        let path = format!("{}/{}/image.jpg", title, chrono::Utc::now().timestamp_millis());
        let image_url = self.objects.put_object(COMMUNITY_PICS, &path, image, JPEG).await?;

        let row = to_row(&json!({"title": title, "image_url": image_url}))?;
        let stored = self.store.insert_row(COMMUNITIES, row).await?;
        info!(community = title, "Created community");
        from_row(stored)
    }

    async fn require_community(&self, title: &str) -> Result<Community> {
        match self.store.get_row(COMMUNITIES, "title", title).await? {
            Some(row) => from_row(row),
            None => Err(SdkError::NotFound(format!("community {}", title))),
        }
    }

    // ---- reels ----

    pub async fn publish_reel(&self, video: Vec<u8>) -> Result<Reel> {
        let user_id = self.session.user_id().await?;
        if video.is_empty() {
            return Err(SdkError::Validation("video is empty".into()));
        }

        let path = format!("video_{}.mp4", chrono::Utc::now().timestamp_millis());
        let video_url = self.objects.put_object(VIDEOS, &path, video, MP4).await?;

        let row = to_row(&json!({"video_url": video_url, "user_id": user_id}))?;
        let stored = self.store.insert_row(REELS, row).await?;
        info!(user_id = %user_id, "Published reel");
        from_row(stored)
    }

    /// Every reel, newest first
    pub async fn reels(&self) -> Result<Vec<Reel>> {
        self.list(REELS, Some(&OrderBy::newest_first())).await
    }

    // ---- profile ----

    /// Upload a new avatar and point the profile at it
    pub async fn update_avatar(&self, image: Vec<u8>) -> Result<String> {
        let user_id = self.session.user_id().await?;
        if image.is_empty() {
            return Err(SdkError::Validation("image is empty".into()));
        }

        let path = format!("{}/{}.jpg", user_id, chrono::Utc::now().timestamp_millis());
        let url = self.objects.put_object(AVATARS, &path, image, JPEG).await?;

        let patch = to_row(&json!({ "avatar_url": url }))?;
        if !self.store.update_row(PROFILES, "id", &user_id, patch).await? {
            return Err(SdkError::NotFound(format!("profile {}", user_id)));
        }
        self.session.set_avatar(url.clone()).await?;
        Ok(url)
    }

    async fn list<T: DeserializeOwned>(&self, table: &str, order: Option<&OrderBy>) -> Result<Vec<T>> {
        self.store
            .list_rows(table, order)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }
}

/// Decode base64 media text, as image pickers hand it over
pub fn decode_media(text: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| SdkError::Validation(format!("invalid base64 media: {}", e)))
}

fn to_row<T: serde::Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(SdkError::Serialization(format!("expected an object, got {}", other))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
