use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use placard::auth::{Credentials, MIN_SECRET_LEN, sanitize_username};
use placard::config::ServerConfig;
use placard::server::{AppState, create_router};
use placard::store::FileStore;

#[derive(Parser)]
#[command(name = "placard")]
#[command(about = "A single-admin panel for template-based sites", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the site document
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Directory holding one subdirectory per template
        #[arg(long, default_value = "./template")]
        template_dir: String,

        /// Template rendered at `/` when none is selected yet
        #[arg(long, default_value = "t1")]
        default_template: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Set the admin username and password directly (lockout recovery)
    Set {
        /// Data directory for the site document
        #[arg(long, default_value = "./data")]
        data_dir: String,

        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },
}

fn run_admin_set(data_dir: String, username: &str, password: &str) -> anyhow::Result<()> {
    let data_path: PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let store = Arc::new(FileStore::new(data_path.join("site.json")));
    let credentials = Credentials::new(store);

    let username = sanitize_username(username.trim());
    if username.is_empty() {
        bail!("Username is empty after sanitization (allowed: A-Z a-z 0-9 _ . -)");
    }
    if password.chars().count() < MIN_SECRET_LEN {
        bail!("Password must be at least {MIN_SECRET_LEN} characters");
    }

    credentials.set_admin(&username, password)?;
    println!("Admin account '{username}' updated.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("placard=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Set {
                data_dir,
                username,
                password,
            } => {
                run_admin_set(data_dir, &username, &password)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            template_dir,
            default_template,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                template_dir: template_dir.into(),
                default_template,
            };

            fs::create_dir_all(&config.data_dir)?;
            if !config.template_dir.is_dir() {
                tracing::warn!(
                    "Template directory {} does not exist; the catalog will be empty",
                    config.template_dir.display()
                );
            }

            let store = Arc::new(FileStore::new(config.store_path()));
            let state = Arc::new(AppState::new(store, &config));
            state.credentials.bootstrap_default()?;

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
