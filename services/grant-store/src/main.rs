use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use grant_store::{Config, GrantRecord, GrantStore, OpContext, RedisBackend};
use rust_common::init_tracing;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "grant-store")]
#[command(about = "Inspect and manage OAuth2 grants persisted in Redis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Redis URL (overrides REDIS_URL)
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Key namespace prefix (overrides TOKEN_KEY_PREFIX)
    #[arg(long, global = true)]
    prefix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that Redis answers
    Ping,
    /// Issue and persist a grant with random tokens
    Issue(IssueArgs),
    /// Print the grant behind an access token
    ShowAccess(TokenArgs),
    /// Print the grant behind a refresh token
    ShowRefresh(TokenArgs),
    /// Revoke an access token
    RevokeAccess(TokenArgs),
    /// Revoke a refresh token and its grant record
    RevokeRefresh(TokenArgs),
}

#[derive(Args)]
struct IssueArgs {
    /// Client identifier
    #[arg(long)]
    client: String,
    /// User identifier
    #[arg(long)]
    user: String,
    /// Granted scope
    #[arg(long, default_value = "")]
    scope: String,
    /// Redirect URI
    #[arg(long, default_value = "")]
    redirect_uri: String,
    /// Also issue a refresh token
    #[arg(long)]
    refresh: bool,
}

#[derive(Args)]
struct TokenArgs {
    /// Token value
    token: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.redis_url {
        config.redis_url = url;
    }
    if let Some(prefix) = cli.prefix {
        config.key_prefix = prefix;
    }

    init_tracing(&config.tracing()).context("failed to initialize tracing")?;

    let backend = RedisBackend::connect(&config.redis_url)
        .await
        .with_context(|| format!("redis ping failed: {}", config.redis_url))?;
    info!(redis_url = %config.redis_url, prefix = %config.key_prefix, "redis connected");

    let store = GrantStore::new(Arc::new(backend), config.namespace())
        .with_timeout(config.op_timeout);

    run(cli.command, &store, &config).await
}

async fn run(
    command: Commands,
    store: &GrantStore<RedisBackend>,
    config: &Config,
) -> Result<ExitCode> {
    match command {
        Commands::Ping => {
            store.ping(&OpContext::default()).await?;
            println!("PONG");
        }
        Commands::Issue(args) => {
            let now = Utc::now();
            let mut grant = GrantRecord::new(args.client, args.user)
                .with_scope(args.scope)
                .with_redirect_uri(args.redirect_uri)
                .with_access(Uuid::new_v4().simple().to_string(), now, config.access_token_ttl);
            if args.refresh {
                grant = grant.with_refresh(
                    Uuid::new_v4().simple().to_string(),
                    now,
                    config.refresh_token_ttl,
                );
            }

            let grant_id = store.create(&grant).await?;
            info!(grant_id = %grant_id, "grant issued");
            println!("{}", serde_json::to_string_pretty(&grant)?);
        }
        Commands::ShowAccess(args) => {
            return print_grant(store.get_by_access(&args.token).await?);
        }
        Commands::ShowRefresh(args) => {
            return print_grant(store.get_by_refresh(&args.token).await?);
        }
        Commands::RevokeAccess(args) => {
            store.remove_by_access(&args.token).await?;
            info!("access token revoked");
        }
        Commands::RevokeRefresh(args) => {
            store.remove_by_refresh(&args.token).await?;
            info!("refresh token revoked");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit status when the token resolves to no grant.
const NOT_FOUND: u8 = 2;

fn print_grant(grant: Option<GrantRecord>) -> Result<ExitCode> {
    Ok(ExitCode::from(exit_status(render_grant(grant.as_ref())?)))
}

/// Print the grant as JSON, or "not found". Returns whether it was found.
fn render_grant(grant: Option<&GrantRecord>) -> Result<bool> {
    match grant {
        Some(grant) => {
            println!("{}", serde_json::to_string_pretty(grant)?);
            Ok(true)
        }
        None => {
            println!("not found");
            Ok(false)
        }
    }
}

const fn exit_status(found: bool) -> u8 {
    if found {
        0
    } else {
        NOT_FOUND
    }
}
