//! Admin Auth Gateway
//! Mission: Only administrators get tokens; everyone else gets a polite 400
//!
//! Usage:
//!   admin-auth                      # serve (default)
//!   admin-auth create-user --username ana --password '...' --staff
//!   admin-auth list-users
//!   admin-auth set-active ana --active false
//!   admin-auth prune-revocations

use admin_auth_gateway::{
    auth::models::NewUser,
    config::GatewayConfig,
    server::{build_gateway, serve},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "admin-auth")]
#[command(about = "Authentication gateway for the administrative panel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Create a user in the directory
    CreateUser {
        #[arg(long)]
        username: String,

        /// Password (falls back to ADMIN_AUTH_NEW_PASSWORD)
        #[arg(long, env = "ADMIN_AUTH_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        #[arg(long)]
        staff: bool,

        #[arg(long)]
        superuser: bool,

        #[arg(long)]
        admin: bool,

        /// Create the account disabled
        #[arg(long)]
        inactive: bool,
    },

    /// List users and their role flags
    ListUsers,

    /// Enable or disable an account
    SetActive {
        username: String,

        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Delete revocation entries for refresh tokens that have expired
    PruneRevocations,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env().context("Invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!("🚀 Admin auth gateway starting");
            serve(config).await?;
        }
        Commands::CreateUser {
            username,
            password,
            email,
            first_name,
            last_name,
            staff,
            superuser,
            admin,
            inactive,
        } => {
            let (_, store) = build_gateway(&config)?;
            let user = store.create_user(&NewUser {
                username,
                password,
                email,
                first_name,
                last_name,
                is_active: !inactive,
                is_staff: staff,
                is_superuser: superuser,
                is_admin: admin,
            })?;
            if !user.has_admin_role() {
                println!("note: {} has no admin role and cannot sign in", user.username);
            }
            println!("Created user {} (id {})", user.username, user.id);
        }
        Commands::ListUsers => {
            let (_, store) = build_gateway(&config)?;
            println!(
                "{:<6} {:<24} {:<8} {:<6} {:<10} {:<6}",
                "ID", "USERNAME", "ACTIVE", "STAFF", "SUPERUSER", "ADMIN"
            );
            for user in store.list_users()? {
                println!(
                    "{:<6} {:<24} {:<8} {:<6} {:<10} {:<6}",
                    user.id,
                    user.username,
                    user.is_active,
                    user.is_staff,
                    user.is_superuser,
                    user.is_admin
                );
            }
        }
        Commands::SetActive { username, active } => {
            let (_, store) = build_gateway(&config)?;
            store.set_active(&username, active)?;
            println!("{username}: active = {active}");
        }
        Commands::PruneRevocations => {
            let (gateway, _) = build_gateway(&config)?;
            let removed = gateway.prune_revocations()?;
            println!("Pruned {removed} expired revocation entries");
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_auth_gateway=debug,admin_auth=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
