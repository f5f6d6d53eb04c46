//! Birdfeed command-line client.
//!
//! - `birdfeed auth` - Run one step of the OAuth handshake
//! - `birdfeed post` - Post a status
//! - `birdfeed timeline` - Read a timeline (cached when a cache dir is configured)
//! - `birdfeed delete` - Delete a status
//! - `birdfeed search` - Search statuses

#![forbid(unsafe_code)]

mod logging;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use birdfeed::{
    Authorization, CacheOutcome, Credentials, FeedClient, FeedConfig, FileSessionStore, OAuthClient,
    OutputFormat, StatusId, TimelineKind, TimelineRequest, authorize, shortener_from_config,
};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use settings::{CredentialSettings, Settings, default_session_path};

/// Client for an OAuth 1.0a social feed API.
#[derive(Parser)]
#[command(name = "birdfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file.
    #[arg(long, short = 'c', env = "BIRDFEED_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Response cache directory (overrides the config file).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false, global = true)]
    json_logs: bool,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// Application (consumer) key.
    #[arg(long, env = "BIRDFEED_APP_KEY", global = true, hide_env_values = true)]
    app_key: Option<String>,

    /// Application (consumer) secret.
    #[arg(long, env = "BIRDFEED_APP_SECRET", global = true, hide_env_values = true)]
    app_secret: Option<String>,

    /// User access token.
    #[arg(long, env = "BIRDFEED_ACCESS_KEY", global = true, hide_env_values = true)]
    access_key: Option<String>,

    /// User access token secret.
    #[arg(long, env = "BIRDFEED_ACCESS_SECRET", global = true, hide_env_values = true)]
    access_secret: Option<String>,
}

impl From<CredentialArgs> for CredentialSettings {
    fn from(args: CredentialArgs) -> Self {
        Self {
            app_key: args.app_key,
            app_secret: args.app_secret,
            access_key: args.access_key,
            access_secret: args.access_secret,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one step of the OAuth handshake.
    ///
    /// The first run prints the URL to approve the application at. Run again afterwards
    /// (with the PIN as --verifier when the provider shows one) to receive access tokens.
    Auth {
        /// Verifier shown by the provider after approval.
        #[arg(long)]
        verifier: Option<String>,

        /// File holding the pending request token between runs.
        #[arg(long, default_value_os_t = default_session_path())]
        session: PathBuf,
    },

    #[command(flatten)]
    Feed(FeedCommand),
}

/// Commands that need access credentials.
#[derive(Subcommand)]
enum FeedCommand {
    /// Post a status update.
    Post {
        /// Message text. Links are shortened when it exceeds 140 characters.
        message: String,
    },

    /// Read a timeline.
    Timeline {
        /// me, friends, mentions or everyone.
        #[arg(long, short = 'k', default_value = "me")]
        kind: TimelineKind,

        /// xml, json, rss or atom.
        #[arg(long, short = 'f', default_value = "xml")]
        format: OutputFormat,

        #[arg(long, default_value_t = 20)]
        count: u32,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Include retweets.
        #[arg(long, default_value_t = false)]
        retweets: bool,
    },

    /// Delete a status.
    Delete {
        /// Status id.
        id: String,
    },

    /// Search statuses.
    Search {
        query: String,

        /// json or atom.
        #[arg(long, short = 'f', default_value = "json")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs, &cli.log_level)?;

    let settings = Settings::load(cli.config.as_deref())?;
    let mut config = settings.feed;
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = Some(dir);
    }
    let credentials = CredentialSettings::from(cli.credentials)
        .or(settings.credentials)
        .into_credentials()?;

    let transport = OAuthClient::new(credentials.app().clone(), &config)
        .context("failed to build HTTP client")?;

    match cli.command {
        Commands::Auth { verifier, session } => {
            let session = FileSessionStore::new(session);
            handshake(transport, credentials, &config, &session, verifier.as_deref()).await
        }
        Commands::Feed(command) => {
            let client = FeedClient::new(transport, credentials, &config)
                .with_shortener(shortener_from_config(&config.shortener)?);
            run(command, &client, &config).await
        }
    }
}

async fn handshake(
    transport: OAuthClient,
    credentials: Credentials,
    config: &FeedConfig,
    session: &FileSessionStore,
    verifier: Option<&str>,
) -> Result<()> {
    match authorize(transport, credentials, config, session, verifier).await? {
        Authorization::Ready(_) => println!("Already authorized."),
        Authorization::RedirectRequired { authorize_url } => {
            println!("Approve access at:\n{authorize_url}");
            println!("Then run `birdfeed auth` again.");
        }
        Authorization::AccessObtained(access) => {
            println!("BIRDFEED_ACCESS_KEY={}", access.key);
            println!("BIRDFEED_ACCESS_SECRET={}", access.secret);
        }
    }
    Ok(())
}

async fn run(
    command: FeedCommand,
    client: &FeedClient<OAuthClient>,
    config: &FeedConfig,
) -> Result<()> {
    match command {
        FeedCommand::Post { message } => {
            let id = client.post_status(&message).await?;
            println!("{}", posted_line(id.as_ref()));
        }
        FeedCommand::Timeline {
            kind,
            format,
            count,
            page,
            retweets,
        } => {
            let request = TimelineRequest {
                kind,
                format,
                count,
                page,
                include_retweets: retweets,
            };
            let outcome = client.fetch_timeline(request).await?;
            match &outcome {
                CacheOutcome::Hit(_) => info!(
                    ttl_secs = config.cache.ttl.as_secs(),
                    "Served from cache"
                ),
                CacheOutcome::StaleFallback { error, .. } => {
                    warn!(error = %error, "API unreachable, showing cached timeline");
                }
                CacheOutcome::Refreshed(_) => {}
            }
            println!("{}", outcome.payload().encode());
        }
        FeedCommand::Delete { id } => {
            let id = StatusId::new(id);
            let deleted = client.delete_status(&id).await?;
            println!("{}", deleted_line(&id, deleted.as_ref()));
        }
        FeedCommand::Search { query, format } => match client.search(&query, format).await? {
            Some(results) => {
                for result in results {
                    println!("{}", result.encode());
                }
            }
            None => println!("No results"),
        },
    }
    Ok(())
}

fn posted_line(id: Option<&StatusId>) -> String {
    id.map_or_else(|| "Posted (no status id returned)".to_string(), ToString::to_string)
}

fn deleted_line(requested: &StatusId, echoed: Option<&StatusId>) -> String {
    echoed.map_or_else(
        || format!("Status {requested} not found"),
        |id| format!("Deleted {id}"),
    )
}
