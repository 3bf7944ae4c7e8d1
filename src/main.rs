//! Ephemera CLI
//!
//! Command-line interface for the ephemeral story store:
//! - Publish and delete stories
//! - List the active collection
//! - React to and like stories
//! - Run the expiration sweep
//! - Generate a config file

use clap::{Parser, Subcommand};
use ephemera::config::{generate_default_config, Config};
use ephemera::host::StaticIdentity;
use ephemera::reactions::{ReactionLedger, RECENT_REACTIONS_DEFAULT};
use ephemera::store::{JsonFileKv, LikeKind, MediaItem, StoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ephemera")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ephemeral 24-hour story collections")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Acting user (default: $EPHEMERA_USER)
    #[arg(short, long, global = true)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a story from media references
    Publish {
        /// Photo content references
        #[arg(short, long)]
        photo: Vec<String>,

        /// Video entries in content:thumbnail:duration_secs form
        #[arg(short, long)]
        video: Vec<String>,
    },

    /// List active (unexpired) stories
    List {
        /// Only this author's stories
        #[arg(short, long)]
        author: Option<String>,
    },

    /// Delete one of your stories
    Delete {
        /// Story id
        id: Uuid,
    },

    /// Append an emoji reaction to a story
    React {
        /// Story id
        id: Uuid,
        /// Emoji
        emoji: String,
    },

    /// Toggle a like or dislike mark on a story
    Like {
        /// Story id
        id: Uuid,
        /// Mark with a dislike instead of a like
        #[arg(long)]
        dislike: bool,
    },

    /// Purge expired stories now
    Sweep,

    /// Show collection statistics
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);

    // `config` needs no store or identity
    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)?;
                println!("Wrote default config to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let user = cli
        .user
        .or_else(|| std::env::var("EPHEMERA_USER").ok())
        .ok_or_else(|| anyhow::anyhow!("no user given; pass --user or set EPHEMERA_USER"))?;

    let kv = Arc::new(JsonFileKv::open(&config.store.data_dir)?);
    let identity = Arc::new(StaticIdentity::signed_in(&user));
    let store =
        Arc::new(StoryStore::open(kv.clone(), identity.clone(), config.store_config()).await?);

    match cli.command {
        Commands::Publish { photo, video } => {
            let mut media: Vec<MediaItem> = photo.into_iter().map(MediaItem::photo).collect();
            for entry in video {
                media.push(parse_video_entry(&entry)?);
            }
            let story = store.create(&user, media).await?;
            println!(
                "Published story {} ({} items, expires {})",
                story.id,
                story.media.len(),
                story.expires_at.to_rfc3339()
            );
        }

        Commands::List { author } => {
            let stories = match &author {
                Some(a) => store.query_by_author(a).await,
                None => store.query().await,
            };
            if stories.is_empty() {
                println!("No active stories");
            }
            let ledger = ReactionLedger::open(kv, identity).await?;
            for story in stories {
                println!(
                    "{}  {}  {} item(s), {} view(s), expires {}",
                    story.id,
                    story.author_id,
                    story.media.len(),
                    story.viewed_by.len(),
                    story.expires_at.to_rfc3339()
                );
                for reaction in ledger
                    .recent_reactions(story.id, RECENT_REACTIONS_DEFAULT)
                    .await
                {
                    println!("    {} by {}", reaction.emoji, reaction.user_id);
                }
            }
        }

        Commands::Delete { id } => {
            store.delete(id, &user).await?;
            println!("Deleted story {}", id);
        }

        Commands::React { id, emoji } => {
            let ledger = ReactionLedger::open(kv, identity).await?;
            let reaction = ledger.add_reaction(id, &user, emoji).await?;
            println!("Added reaction {} to story {}", reaction.emoji, id);
        }

        Commands::Like { id, dislike } => {
            let kind = if dislike {
                LikeKind::Dislike
            } else {
                LikeKind::Like
            };
            let ledger = ReactionLedger::open(kv, identity).await?;
            match ledger.toggle_like(id, &user, kind).await? {
                Some(k) => println!("Marked story {} as {:?}", id, k),
                None => println!("Removed mark from story {}", id),
            }
        }

        Commands::Sweep => {
            let purged = store.expiration_sweep().await?;
            println!("Purged {} expired stories", purged);
        }

        Commands::Status => {
            let stats = store.stats().await;
            println!("Data directory: {}", config.store.data_dir);
            println!("Total stories:  {}", stats.total_stories);
            println!("Live stories:   {}", stats.live_stories);
        }

        Commands::Config { .. } => unreachable!("handled above"),
    }

    store.shutdown().await?;
    Ok(())
}

/// Parse a content:thumbnail:duration_secs video entry
fn parse_video_entry(entry: &str) -> anyhow::Result<MediaItem> {
    let parts: Vec<&str> = entry.splitn(3, ':').collect();
    match parts.as_slice() {
        [content, thumbnail, secs] => {
            let duration: f64 = secs
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid video duration in {:?}", entry))?;
            Ok(MediaItem::video(*content, *thumbnail, duration))
        }
        _ => anyhow::bail!("expected content:thumbnail:duration_secs, got {:?}", entry),
    }
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ephemera={}", config.logging.level)),
    );

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
