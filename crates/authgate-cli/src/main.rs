//! authgate - sign in to an authgate API server from the terminal.
//!
//! The session persists between invocations, so `authgate login` followed
//! by `authgate whoami` behaves like reloading a signed-in page.

mod app;

use std::io;

use anyhow::Result;
use authgate_core::AuthEndpoint;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Protected endpoint returning the signed-in user's profile
const PROFILE_PATH: &str = "/api/protected";

#[derive(Parser)]
#[command(name = "authgate")]
#[command(author, version, about = "Client-side session manager for authgate servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API server URL (overrides config and AUTHGATE_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        /// Username (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Sign in with an existing account
    Login {
        /// Username (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Sign out and revoke the token
    Logout,

    /// Show the current session
    Status,

    /// Show the profile of the signed-in user
    Whoami,

    /// GET an API path with the session token attached
    Get {
        /// Path such as /api/info
        path: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();
    info!("authgate starting");

    let mut app = App::new(cli.server)?;

    match cli.command {
        Commands::Register { username } => app.submit(AuthEndpoint::Register, username).await,
        Commands::Login { username } => app.submit(AuthEndpoint::Login, username).await,
        Commands::Logout => app.logout().await,
        Commands::Status => {
            app.status();
            Ok(())
        }
        Commands::Whoami => app.get(PROFILE_PATH).await,
        Commands::Get { path } => app.get(&path).await,
    }
}
