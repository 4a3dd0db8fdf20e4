//! Emergency contact management
//!
//! Usage:
//!   cargo run --bin contacts -- list
//!   cargo run --bin contacts -- add "98765 43210"
//!   cargo run --bin contacts -- remove +919876543210

use clap::{Parser, Subcommand};
use fallguard::domain::PhoneNumber;
use fallguard::infra::Config;
use fallguard::io::JsonFilePreferences;
use fallguard::services::ContactBook;
use std::sync::Arc;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "contacts", version, about = "Manage emergency contacts")]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print saved contacts, one per line
    #[command(alias = "ls")]
    List,
    /// Normalize and save a number
    Add { number: String },
    /// Remove a number (any accepted spelling)
    #[command(alias = "rm")]
    Remove { number: String },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    let store = Arc::new(JsonFilePreferences::open(config.contacts_store_file())?);
    let book = ContactBook::load(store, config.dialing_plan().clone())?;

    match args.command {
        Command::List => {
            if book.is_empty() {
                println!("No emergency contact set.");
            }
            for number in book.list() {
                println!("{number}");
            }
        }
        Command::Add { number } => {
            let normalized = PhoneNumber::parse(&number, book.dialing_plan())?;
            if book.add(&number)? {
                println!("Added {normalized}");
            } else {
                println!("Already saved: {normalized}");
            }
        }
        Command::Remove { number } => {
            if book.remove(&number)? {
                println!("Removed {number}");
            } else {
                println!("Not saved: {number}");
            }
        }
    }
    Ok(())
}
