//! Threadline CLI - session store migration and local cart management.
//!
//! # Usage
//!
//! ```bash
//! # Create the session store table
//! tl-cli migrate
//!
//! # Work with a cart stored in a local directory
//! tl-cli cart --device ./device show
//! tl-cli cart --device ./device --catalog products.json add p1 --color Black --size M
//! tl-cli cart --device ./device update <item-key> 3
//! tl-cli cart --device ./device remove <item-key>
//!
//! # Sign in: migrates the device's anonymous cart the first time
//! tl-cli cart --device ./device --user user_123 show
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the session store schema
//! - `cart` - Show and modify a device cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::cart::{CartAction, CartArgs};

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session store schema
    Migrate,
    /// Show and modify a cart kept in a local device directory
    Cart {
        /// Device storage directory
        #[arg(short, long, default_value = ".threadline")]
        device: PathBuf,

        /// Signed-in user id (omit to browse anonymously)
        #[arg(short, long)]
        user: Option<String>,

        /// JSON file with a fixed product list (default: content store from env)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Fail on storage errors instead of ignoring them
        #[arg(long)]
        strict: bool,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadline_storefront=warn,tl_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::Cart {
            device,
            user,
            catalog,
            strict,
            action,
        } => {
            let args = CartArgs {
                device,
                user,
                catalog,
                strict,
            };
            let output = commands::cart::run(&args, action).await?;

            #[allow(clippy::print_stdout)]
            {
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
    }
    Ok(())
}
