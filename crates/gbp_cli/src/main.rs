//! Thin CLI harness over [`gbp_solver`]: parses arguments, builds an oracle,
//! runs one strategy, and prints (or JSON-serializes) the solutions found.
//! Never reimplements solver logic — everything here is argument plumbing,
//! logging setup, and result formatting.
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use figlet_rs::FIGfont;
use gbp_solver::{strategy::Strategy as SolverStrategy, PlainOracle, Params, SolverError, Variant};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algo {
    PlainIv,
    PlainIp,
    IpPr,
    IpEm,
    IvIt,
    IvItStar,
    KTree,
}

impl From<Algo> for SolverStrategy {
    fn from(a: Algo) -> Self {
        match a {
            Algo::PlainIv => SolverStrategy::PlainIv,
            Algo::PlainIp => SolverStrategy::PlainIp,
            Algo::IpPr => SolverStrategy::IpPr,
            Algo::IpEm => SolverStrategy::IpEm,
            Algo::IvIt => SolverStrategy::IvIt,
            Algo::IvItStar => SolverStrategy::IvItStar,
            Algo::KTree => SolverStrategy::KTree,
        }
    }
}

/// Run Wagner's algorithm for the Generalized Birthday Problem.
#[derive(Debug, Parser)]
#[command(name = "gbp_cli", version, about)]
struct Cli {
    /// Hash output width in bits.
    #[arg(long)]
    n: u32,

    /// Solution size exponent (K = 2^k).
    #[arg(long)]
    k: u32,

    /// Hex-encoded seed fed to the hash oracle.
    #[arg(long, default_value = "00000000000000000000000000000000")]
    seed: String,

    /// Which strategy to run.
    #[arg(long, value_enum, default_value_t = Algo::PlainIv)]
    algo: Algo,

    /// Scratch file path, required by `ip-em`.
    #[arg(long)]
    scratch_path: Option<PathBuf>,

    /// Emit results as JSON instead of a human-readable table.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid seed hex: {0}")]
    SeedHex(#[from] hex::FromHexError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(serde::Serialize)]
struct JsonOutcome {
    n: u32,
    k: u32,
    algo: &'static str,
    solutions: Vec<Vec<u32>>,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let default = match verbose {
        0 => "gbp_cli=info,gbp_solver=warn",
        1 => "gbp_cli=debug,gbp_solver=info",
        _ => "gbp_cli=trace,gbp_solver=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_banner() {
    if let Some(font) = FIGfont::standard().ok() {
        if let Some(fig) = font.convert("GBP Solver") {
            println!("{}", fig.to_string().cyan());
        }
    }
}

fn algo_name(algo: Algo) -> &'static str {
    match algo {
        Algo::PlainIv => "plain_iv",
        Algo::PlainIp => "plain_ip",
        Algo::IpPr => "ip_pr",
        Algo::IpEm => "ip_em",
        Algo::IvIt => "iv_it",
        Algo::IvItStar => "iv_it_star",
        Algo::KTree => "k_tree",
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let strategy: SolverStrategy = cli.algo.into();
    let variant = strategy.variant();
    let params = Params::new(cli.n, cli.k, variant).map_err(SolverError::from)?;
    let seed = hex::decode(&cli.seed)?;
    let oracle = PlainOracle::new(&params, &seed, variant);

    info!(n = cli.n, k = cli.k, algo = algo_name(cli.algo), "starting solve");
    let solutions = gbp_solver::solve(strategy, &params, &oracle, cli.scratch_path.as_deref(), &seed)?;
    info!(found = solutions.len(), "solve finished");

    if cli.json {
        let outcome = JsonOutcome {
            n: cli.n,
            k: cli.k,
            algo: algo_name(cli.algo),
            solutions,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if solutions.is_empty() {
        println!("{}", "no solutions found".yellow());
    } else {
        for (i, solution) in solutions.iter().enumerate() {
            println!("{} {:?}", format!("solution {i}:").green().bold(), solution);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    print_banner();
    if let Err(e) = run(cli) {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}
