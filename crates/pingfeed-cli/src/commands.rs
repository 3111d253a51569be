//! Subcommands acting on the signed-in user's feeds

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use pingfeed_sdk::{decode_media, NewPing, Social};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Like or unlike a ping
    Like {
        ping_id: String,
    },

    /// Show the like count of a ping and whether you liked it
    Likes {
        ping_id: String,
    },

    /// Follow or unfollow a community
    Follow {
        community: String,
    },

    /// Bookmark or un-bookmark a ping
    Save {
        ping_id: String,
    },

    /// Comment on a ping
    Comment {
        ping_id: String,
        text: String,
    },

    /// Comment on a reel
    CommentReel {
        reel_id: String,
        text: String,
    },

    /// List the comments of a ping
    Comments {
        ping_id: String,
    },

    /// Post a ping into a community
    Post {
        community: String,
        /// Caption
        #[arg(short, long)]
        title: Option<String>,
        /// JPEG file to attach
        #[arg(short, long, conflicts_with = "image_base64")]
        image: Option<PathBuf>,
        /// JPEG bytes as base64 text
        #[arg(long)]
        image_base64: Option<String>,
    },

    /// Create a community with a cover image
    Community {
        title: String,
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Publish a reel
    Reel {
        /// MP4 file
        video: PathBuf,
    },

    /// Replace your avatar
    Avatar {
        image: PathBuf,
    },

    /// Search communities by title
    Search {
        #[arg(default_value = "")]
        query: String,
    },

    /// Show a community feed, or every ping when no community is given
    Feed {
        community: Option<String>,
    },

    /// Show every reel, newest first
    Reels,

    /// Communities you follow
    Followed,

    /// Your pings in a community, with like counts
    Mine {
        community: String,
    },

    /// Show the resolved identity
    Whoami,

    /// Verify the token given with --token and store it for later runs
    Login,

    /// Forget the stored access token
    Logout,
}

/// Run a feed/mutation command, returning its JSON result
pub async fn execute(social: &Social, command: Commands) -> anyhow::Result<Value> {
    let value = match command {
        Commands::Like { ping_id } => serde_json::to_value(social.toggle_like(&ping_id).await?)?,
        Commands::Likes { ping_id } => serde_json::to_value(social.like_state(&ping_id).await?)?,
        Commands::Follow { community } => {
            serde_json::to_value(social.toggle_follow(&community).await?)?
        }
        Commands::Save { ping_id } => serde_json::to_value(social.toggle_saved(&ping_id).await?)?,
        Commands::Comment { ping_id, text } => {
            serde_json::to_value(social.comment_on_ping(&ping_id, &text).await?)?
        }
        Commands::CommentReel { reel_id, text } => {
            serde_json::to_value(social.comment_on_reel(&reel_id, &text).await?)?
        }
        Commands::Comments { ping_id } => {
            serde_json::to_value(social.ping_comments(&ping_id).await?)?
        }
        Commands::Post {
            community,
            title,
            image,
            image_base64,
        } => {
            let image = match (image, image_base64) {
                (Some(path), _) => Some(read_media(&path)?),
                (None, Some(text)) => Some(decode_media(&text)?),
                (None, None) => None,
            };
            let ping = social
                .post_ping(NewPing {
                    community,
                    title,
                    image,
                })
                .await?;
            info!(ping_id = %ping.id, "Ping posted");
            serde_json::to_value(ping)?
        }
        Commands::Community { title, image } => {
            let community = social.create_community(&title, read_media(&image)?).await?;
            serde_json::to_value(community)?
        }
        Commands::Reel { video } => {
            serde_json::to_value(social.publish_reel(read_media(&video)?).await?)?
        }
        Commands::Avatar { image } => {
            Value::from(social.update_avatar(read_media(&image)?).await?)
        }
        Commands::Search { query } => {
            serde_json::to_value(social.search_communities(&query).await?)?
        }
        Commands::Feed { community: Some(title) } => {
            serde_json::to_value(social.community_feed(&title).await?)?
        }
        Commands::Feed { community: None } => serde_json::to_value(social.explore_feed().await?)?,
        Commands::Reels => serde_json::to_value(social.reels().await?)?,
        Commands::Followed => serde_json::to_value(social.followed_communities().await?)?,
        Commands::Mine { community } => {
            serde_json::to_value(social.my_pings_in(&community).await?)?
        }
        Commands::Whoami => serde_json::to_value(social.session().identity().await?)?,
        Commands::Login | Commands::Logout => {
            bail!("session commands are handled before the backend is opened")
        }
    };
    Ok(value)
}

fn read_media(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}
