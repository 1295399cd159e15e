//! rrofdma CLI
//!
//! Runs the round-robin OFDMA scheduler against simulated BSS scenarios.

mod commands;

use clap::{Parser, Subcommand};
use rrofdma_core::{LoggingConfig, OfdmaConfig, PackingPolicy};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// rrofdma - round-robin OFDMA scheduler for 802.11ax access points
#[derive(Parser, Debug)]
#[command(name = "rrofdma")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scheduler configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario for a number of scheduling decisions
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Number of decisions to make
        #[arg(long, default_value_t = 10)]
        rounds: u32,

        /// Print decisions as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Pack a synthetic batch of candidates
    Pack {
        /// Channel width in MHz
        #[arg(long, default_value_t = 20)]
        bandwidth: u16,

        /// Number of class 1 candidates
        #[arg(long, default_value_t = 0)]
        class1: u16,

        /// Number of class 2 candidates
        #[arg(long, default_value_t = 0)]
        class2: u16,

        /// Number of class 3 candidates
        #[arg(long, default_value_t = 0)]
        class3: u16,

        /// Packing policy (legacy, greedy)
        #[arg(long, value_parser = parse_policy, default_value = "legacy")]
        policy: PackingPolicy,
    },

    /// Show the RUs of a channel width
    Rus {
        /// Channel width in MHz
        #[arg(long, default_value_t = 20)]
        bandwidth: u16,
    },
}

fn parse_policy(s: &str) -> Result<PackingPolicy, String> {
    match s.to_lowercase().as_str() {
        "legacy" => Ok(PackingPolicy::Legacy),
        "greedy" => Ok(PackingPolicy::Greedy),
        other => Err(format!("unknown packing policy '{}'", other)),
    }
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        match cli
            .log_level
            .as_deref()
            .unwrap_or(&logging.level)
            .to_lowercase()
            .as_str()
        {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if logging.format == "compact" {
        tracing::subscriber::set_global_default(builder.compact().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OfdmaConfig::from_file(path)?,
        None => {
            let mut config = OfdmaConfig::default();
            config.logging.level = "warn".to_string();
            config
        }
    };
    init_logging(&cli, &config.logging);

    match cli.command {
        Commands::Run {
            scenario,
            rounds,
            json,
        } => {
            commands::run(&config, &scenario, rounds, json)?;
        }
        Commands::Pack {
            bandwidth,
            class1,
            class2,
            class3,
            policy,
        } => {
            commands::pack(bandwidth, [class1, class2, class3], policy)?;
        }
        Commands::Rus { bandwidth } => {
            commands::rus(bandwidth)?;
        }
    }

    Ok(())
}
