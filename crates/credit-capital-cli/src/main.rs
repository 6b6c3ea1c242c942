mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::capital::{CapitalArgs, CompareArgs};

/// Monte Carlo credit capital for trading-book portfolios
#[derive(Parser)]
#[command(
    name = "ccap",
    version,
    about = "Monte Carlo IRC and DRC credit capital",
    long_about = "Simulates one-year portfolio credit losses under a Gaussian copula and \
                  reports the 99.9% Incremental Risk Charge (default and migration) or \
                  Default Risk Charge (default only), with issuer breakdowns and \
                  convergence diagnostics. Positions are read as JSON from --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log progress to stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Incremental Risk Charge: default and rating migration
    Irc(CapitalArgs),
    /// Default Risk Charge: default only
    Drc(CapitalArgs),
    /// IRC with standalone and marginal capital per obligor
    IrcByIssuer(CapitalArgs),
    /// DRC with standalone and marginal capital per obligor
    DrcByIssuer(CapitalArgs),
    /// IRC against DRC on the same paths
    Compare(CompareArgs),
    /// List the built-in transition matrices
    Matrices,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Irc(args) => commands::capital::run_irc(args),
        Commands::Drc(args) => commands::capital::run_drc(args),
        Commands::IrcByIssuer(args) => commands::capital::run_irc_by_issuer(args),
        Commands::DrcByIssuer(args) => commands::capital::run_drc_by_issuer(args),
        Commands::Compare(args) => commands::capital::run_compare(args),
        Commands::Matrices => commands::matrices::run_matrices(),
        Commands::Version => {
            println!("ccap {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
