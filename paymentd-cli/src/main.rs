//! paymentdctl
//!
//! Operator utilities for the paymentd credential layer: key generation,
//! configuration checks, session tokens and signed payment requests.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "paymentdctl")]
#[command(about = "paymentd credential utilities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random hex keys for `auth_keys` or project secrets
    Keygen {
        /// Number of keys to generate
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },

    /// Print or check configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Issue and inspect admin session tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Sign a payment initiation request body
    SignInit {
        /// Project secret (hex)
        #[arg(long)]
        secret: String,

        /// Request JSON file, `-` for stdin
        file: PathBuf,

        /// Use this nonce instead of a random one
        #[arg(long)]
        nonce: Option<String>,

        /// Unix timestamp to sign with instead of now
        #[arg(long)]
        timestamp: Option<i64>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as JSON
    Default,

    /// Load, validate and summarize a configuration file
    Test {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a session token for a user
    Issue {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// User id claim
        #[arg(short, long)]
        user: String,

        /// Additional claims as KEY=VALUE
        #[arg(long = "claim", value_name = "KEY=VALUE")]
        claims: Vec<String>,
    },

    /// Verify a token and print its claims
    Inspect {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Token as sent in the Authorization header
        token: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_filter = if cli.verbose {
        "paymentdctl=debug,paymentd_auth=debug,paymentd_api=debug"
    } else {
        "paymentdctl=info,paymentd_auth=info,paymentd_api=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command) {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Keygen { count } => commands::keygen::run(count),
        Commands::Config { action } => match action {
            ConfigAction::Default => commands::config::print_default(),
            ConfigAction::Test { config } => commands::config::test(&config),
        },
        Commands::Token { action } => match action {
            TokenAction::Issue {
                config,
                user,
                claims,
            } => commands::token::issue(&config, &user, &claims),
            TokenAction::Inspect { config, token } => commands::token::inspect(&config, &token),
        },
        Commands::SignInit {
            secret,
            file,
            nonce,
            timestamp,
        } => commands::sign::init_payment(&secret, &file, nonce.as_deref(), timestamp),
    }
}
