//! lamad - CLI driver for the progress core
//!
//! Stands in for the site's UI layer: every subcommand maps to one UI
//! event (login button, checkbox toggle, badge refresh) and goes through
//! the coordinator/resolver interface only.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamad::{
    Args, IdentityResolver, LocalStore, ProgressCoordinator, ProgressKind, RemoteBackend,
};

/// Identifier used for progress when nobody is signed in.
const GUEST_IDENTIFIER: &str = "guest@local";

#[derive(Parser)]
#[command(name = "lamad")]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a demo session (no external verification)
    Login { email: String },
    /// Sign in against the remote identity provider
    Signin { email: String, password: String },
    /// Register and sign in against the remote identity provider
    Signup { email: String, password: String },
    /// End the current session
    Logout,
    /// Show who is signed in
    Status,
    /// Mark a lesson or project done or not done
    Toggle {
        kind: ProgressKind,
        id: String,
        // Positional true/false rather than a flag.
        #[arg(action = clap::ArgAction::Set, value_parser = clap::value_parser!(bool))]
        value: bool,
    },
    /// Print the current progress record
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lamad={}", cli.args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = cli.args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let local = Arc::new(LocalStore::open(&cli.args.data_dir)?);
    let remote = cli.args.remote();
    let resolver = Arc::new(IdentityResolver::new(
        Arc::clone(&local),
        remote.clone(),
    ));
    let coordinator =
        ProgressCoordinator::new(Arc::clone(&local), remote.clone(), Arc::clone(&resolver));

    match cli.command {
        Command::Login { email } => {
            let identity = resolver.login_demo(&email)?;
            println!("Signed in: {} (demo)", identity.identifier);
        }
        Command::Signin { email, password } => {
            resolver.sign_in(&email, &password).await?;
            sync_identity(&resolver, remote.as_ref()).await;
            print_status(&resolver)?;
        }
        Command::Signup { email, password } => {
            resolver.sign_up(&email, &password).await?;
            sync_identity(&resolver, remote.as_ref()).await;
            print_status(&resolver)?;
        }
        Command::Logout => {
            resolver.logout().await?;
            println!("Not signed in");
        }
        Command::Status => print_status(&resolver)?,
        Command::Toggle { kind, id, value } => {
            let identifier = current_identifier(&resolver)?;
            let record = coordinator.toggle(&identifier, kind, &id, value).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Show => {
            let identifier = current_identifier(&resolver)?;
            let record = coordinator.read(&identifier).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

/// One-shot equivalent of the identity watch: pull the backend's current
/// principal and apply it, so the delegated session comes from remote truth
/// rather than being synthesized after sign-in.
async fn sync_identity(resolver: &IdentityResolver, remote: Option<&Arc<dyn RemoteBackend>>) {
    let Some(remote) = remote else { return };
    match remote.current_principal().await {
        Ok(principal) => {
            if let Err(e) = resolver.apply_remote_principal(principal.as_deref()) {
                warn!(error = %e, "Failed to apply remote identity");
            }
        }
        Err(e) => info!(error = %e, "Could not confirm remote session yet"),
    }
}

fn current_identifier(resolver: &IdentityResolver) -> lamad::Result<String> {
    Ok(resolver
        .current()?
        .map(|identity| identity.identifier)
        .unwrap_or_else(|| GUEST_IDENTIFIER.to_string()))
}

fn print_status(resolver: &IdentityResolver) -> lamad::Result<()> {
    match resolver.current()? {
        Some(identity) => println!("Signed in: {} ({:?})", identity.identifier, identity.mode),
        None => println!("Not signed in"),
    }
    Ok(())
}
