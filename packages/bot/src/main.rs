// Main entry point for the WG-Gesucht bot

use anthropic_client::AnthropicClient;
use anyhow::{bail, Context, Result};
use bot_core::composer::{LlmComposer, MessageComposer, TemplateComposer};
use bot_core::{search, Config};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wg_gesucht_client::WgClient;

#[derive(Parser)]
#[command(name = "wg-bot")]
#[command(about = "WG-Gesucht flatshare application bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for new offers and contact them until interrupted
    Run {
        /// Generate messages but do not contact anyone
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single search cycle and exit
    Once {
        /// Generate messages but do not contact anyone
        #[arg(long)]
        dry_run: bool,
    },

    /// Search cities by name to find their id
    Cities { query: String },

    /// Show the logged-in user's profile
    Profile,

    /// List conversation threads, or show one with --thread
    Inbox {
        /// Conversation id to show in full
        #[arg(long)]
        thread: Option<String>,

        /// Page of the conversation list
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bot_core=debug,wg_gesucht_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let mut client = WgClient::new().context("Failed to create WG-Gesucht client")?;

    match cli.command {
        Commands::Run { dry_run } => {
            let composer = build_composer(&config, dry_run)?;
            search::run_loop(&mut client, composer.as_ref(), &config, dry_run).await
        }
        Commands::Once { dry_run } => {
            let composer = build_composer(&config, dry_run)?;
            let stats = search::run_once(&mut client, composer.as_ref(), &config, dry_run).await?;
            info!(
                offers_seen = stats.offers_seen,
                skipped = stats.skipped,
                contacted = stats.contacted,
                errors = stats.errors,
                "Cycle finished"
            );
            Ok(())
        }
        Commands::Cities { query } => cmd_cities(&client, &query).await,
        Commands::Profile => cmd_profile(&mut client, &config).await,
        Commands::Inbox { thread, page } => cmd_inbox(&mut client, &config, thread, page).await,
    }
}

/// Claude writes the messages when an API key is configured. Dry runs
/// without a key fall back to a canned template so the pipeline can be
/// exercised without credentials.
fn build_composer(config: &Config, dry_run: bool) -> Result<Box<dyn MessageComposer>> {
    match &config.anthropic_api_key {
        Some(api_key) => {
            let profile = config
                .applicant_profile
                .clone()
                .context("APPLICANT_PROFILE or APPLICANT_PROFILE_PATH must be set")?;
            let client = AnthropicClient::new(api_key.clone());
            Ok(Box::new(LlmComposer::new(
                client,
                config.anthropic_model.clone(),
                profile,
            )))
        }
        None if dry_run => {
            warn!("ANTHROPIC_API_KEY not set, using canned template messages");
            Ok(Box::new(TemplateComposer::new(
                config.applicant_profile.clone(),
            )))
        }
        None => bail!("ANTHROPIC_API_KEY must be set (or use --dry-run)"),
    }
}

async fn cmd_cities(client: &WgClient, query: &str) -> Result<()> {
    let cities = client
        .find_cities(query)
        .await
        .context("City search failed")?;
    if cities.is_empty() {
        println!("No cities found matching '{query}'");
        return Ok(());
    }
    for city in cities {
        println!("{}\t{}", city.city_id, city.city_name);
    }
    Ok(())
}

async fn cmd_profile(client: &mut WgClient, config: &Config) -> Result<()> {
    search::ensure_session(client, config).await?;
    let profile = client.my_profile().await.context("Profile fetch failed")?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn cmd_inbox(
    client: &mut WgClient,
    config: &Config,
    thread: Option<String>,
    page: u32,
) -> Result<()> {
    search::ensure_session(client, config).await?;
    match thread {
        Some(conversation_id) => {
            let conversation = client
                .conversation_detail(&conversation_id)
                .await
                .context("Conversation fetch failed")?;
            println!("{}", serde_json::to_string_pretty(&conversation)?);
        }
        None => {
            let conversations = client
                .conversations(page)
                .await
                .context("Conversation list fetch failed")?;
            println!("{}", serde_json::to_string_pretty(&conversations)?);
        }
    }
    Ok(())
}
