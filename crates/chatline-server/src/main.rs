//! Chatline server binary.
//!
//! # Usage
//!
//! ```bash
//! # Persist users to ./users.json
//! chatline-server --bind 0.0.0.0:7070
//!
//! # Throwaway instance with a smaller member limit
//! chatline-server --ephemeral --max-members 4
//! ```

use std::path::PathBuf;

use chatline_core::ChatLimits;
use chatline_server::{Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatline chat server
#[derive(Parser, Debug)]
#[command(name = "chatline-server")]
#[command(about = "Permissioned chat rooms on a simulated contract network")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    bind: String,

    /// User directory file (JSON)
    #[arg(long, default_value = "users.json")]
    users_db: PathBuf,

    /// Keep users in memory instead of the directory file
    #[arg(long)]
    ephemeral: bool,

    /// Maximum members per room
    #[arg(long, default_value_t = chatline_core::DEFAULT_MAX_MEMBERS_PER_ROOM)]
    max_members: usize,

    /// Maximum characters per message
    #[arg(long, default_value_t = chatline_core::DEFAULT_MAX_MESSAGE_CHARS)]
    max_message_chars: usize,

    /// Maximum messages per room
    #[arg(long, default_value_t = chatline_core::DEFAULT_MAX_MESSAGES_PER_ROOM)]
    max_messages: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Chatline server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.ephemeral {
        tracing::warn!("Ephemeral mode - users are lost on exit");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        users_db: (!args.ephemeral).then_some(args.users_db),
        limits: ChatLimits {
            max_message_chars: args.max_message_chars,
            max_messages_per_room: args.max_messages,
            max_members_per_room: args.max_members,
        },
    };

    let server = Server::bind(config).await?;

    server.run().await?;

    Ok(())
}
