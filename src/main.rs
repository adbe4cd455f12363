mod app;
mod cache;
mod config;
mod otp;
mod prompt;
mod refresh;
mod store;
mod terminal;

use crate::app::{App, Viewer, new_secret};
use crate::config::{SECRETS_FILE, Settings, data_root};
use crate::otp::{Clock, SystemClock};
use crate::prompt::ConsolePrompter;
use crate::store::{CachedStore, SecretStore};
use crate::terminal::LiveViewer;
use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "crotp",
    version,
    about = "Secure CLI tool for managing your one-time password secrets"
)]
struct Cli {
    /// Secret store file (defaults to config.json in the data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Without a command, the interactive menu is started
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show live codes for all secrets
    Show,

    /// Add a secret
    ///
    /// Examples:
    ///   crotp add github JBSWY3DPEHPK3PXP
    ///   crotp add work 'otpauth://totp/Work:me?secret=JBSWY3DPEHPK3PXP'
    Add {
        name: String,
        /// Base32 secret or otpauth:// URL
        secret: String,
    },

    /// Remove a secret by name
    Remove { name: String },

    /// List secret names
    Ls,

    /// Print the current code once
    Code {
        name: String,
        /// Show as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("CROTP_LOG", "warn")).init();

    let cli = Cli::parse();
    let root = data_root()?;
    let settings = Settings::load(&root)?;
    let store = SecretStore::new(cli.store.unwrap_or_else(|| root.join(SECRETS_FILE)));

    match cli.command {
        None => cmd_menu(store, settings)?,
        Some(Commands::Show) => cmd_show(&store, settings)?,
        Some(Commands::Add { name, secret }) => cmd_add(&store, &name, &secret)?,
        Some(Commands::Remove { name }) => cmd_remove(&store, &name)?,
        Some(Commands::Ls) => cmd_ls(&store)?,
        Some(Commands::Code { name, json }) => cmd_code(&store, &name, json)?,
    }

    Ok(())
}

fn cmd_menu(store: SecretStore, settings: Settings) -> anyhow::Result<()> {
    // a store that exists but cannot be read stops here instead of
    // showing an empty menu
    store.load()?;

    let notice = settings.notice();
    let store = CachedStore::new(store, settings.store_ttl());
    App::new(
        store,
        ConsolePrompter::stdio(),
        LiveViewer::new(settings),
        notice,
    )
    .run()
}

fn cmd_show(store: &SecretStore, settings: Settings) -> anyhow::Result<()> {
    let secrets = store.load()?;
    if secrets.is_empty() {
        anyhow::bail!("No secrets configured, add one with `crotp add <NAME> <SECRET>`");
    }
    LiveViewer::new(settings).view(&secrets)?;
    Ok(())
}

fn cmd_add(store: &SecretStore, name: &str, raw: &str) -> anyhow::Result<()> {
    let secret = new_secret(name, raw)?;
    let name = secret.name.clone();
    store.add(secret)?;
    println!("Added {} to {}", name, store.path().display());
    Ok(())
}

fn cmd_remove(store: &SecretStore, name: &str) -> anyhow::Result<()> {
    store.remove(name)?;
    println!("Removed {name}");
    Ok(())
}

fn cmd_ls(store: &SecretStore) -> anyhow::Result<()> {
    for secret in store.load()? {
        println!("{}", secret.name);
    }
    Ok(())
}

fn cmd_code(store: &SecretStore, name: &str, json: bool) -> anyhow::Result<()> {
    let secret = store
        .load()?
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| anyhow!("No secret named '{name}'"))?;

    let result = otp::compute(&secret.key, SystemClock.unix_now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{} ({}s left)", result.current_otp, result.time_remaining);
    }
    Ok(())
}
