//! pingfeed: command-line driver for a pingfeed backend
//!
//! Likes, follows, bookmarks, comments and posts from a terminal, using the
//! same mutation protocol as the app. Results are printed as JSON.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use commands::Commands;
use pingfeed_client::BackendClient;
use pingfeed_sdk::config::default_config_path;
use pingfeed_sdk::{Config, SessionContext, SessionFile, Social, StoredSession};

#[derive(Parser)]
#[command(name = "pingfeed")]
#[command(about = "Drive pingfeed likes, follows, comments and feeds from a terminal")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PINGFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Backend project URL (overrides config file)
    #[arg(long, env = "PINGFEED_URL")]
    url: Option<String>,

    /// Public anon key (overrides config file)
    #[arg(long, env = "PINGFEED_ANON_KEY")]
    anon_key: Option<String>,

    /// Access token (overrides the stored session)
    #[arg(long, env = "PINGFEED_TOKEN", global = true)]
    token: Option<String>,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "PINGFEED_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = &cli.log_level;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pingfeed={level},pingfeed_sdk={level},pingfeed_client={level},warn").into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load or create default config
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load_or_default(&config_path)?;
    info!("Config file: {}", config_path.display());

    // Apply CLI overrides
    if let Some(url) = cli.url {
        config.backend.base_url = url;
    }
    if let Some(anon_key) = cli.anon_key {
        config.backend.anon_key = anon_key;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let session_file = SessionFile::new(config.session_path());

    if let Commands::Logout = cli.command {
        session_file.clear()?;
        info!("Signed out");
        return Ok(());
    }

    let login = matches!(cli.command, Commands::Login);
    let token = match cli.token {
        Some(token) => Some(token),
        None if login => anyhow::bail!("login needs --token or PINGFEED_TOKEN"),
        None => session_file.load()?.map(|s| s.access_token),
    };

    let client = BackendClient::new(config.backend.clone())?;
    let client = match token {
        Some(ref token) => client.with_access_token(token.clone()),
        None => client,
    };

    let store = Arc::new(config.remote_store(client.clone()));

    let session = Arc::new(SessionContext::new());
    if let Some(ref token) = token {
        match session.resolve(&client, store.as_ref(), token).await {
            Ok(identity) => info!(user_id = %identity.user_id, "Signed in"),
            Err(e) if login => return Err(e.into()),
            Err(e) => warn!(error = %e, "Could not resolve session; continuing signed out"),
        }
    }

    if let (true, Some(token)) = (login, token) {
        let identity = session.identity().await?;
        session_file.save(&StoredSession {
            access_token: token,
            email: identity.email.clone(),
        })?;
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    let social = Social::new(store.clone(), store, session, config.write_policy());
    let output = commands::execute(&social, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
