use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use minefield_core::{
    verify_disclosure, Amount, EngineParams, OwnerId, RoundEngine, SeedDisclosure, Settlement,
};
use minefield_shared::{RoundLogEntry, VerifyRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod db;
mod sim;

#[derive(Parser)]
#[command(name = "minefield-cli", about = "Operator and auditor CLI for minefield rounds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://minefield.db
    #[arg(long, value_parser, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,
    /// Engine parameters as JSON; missing fields take their defaults
    #[arg(long, env = "MINEFIELD_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute a finished round from its published values
    Verify {
        #[arg(long, conflicts_with = "disclosure")]
        server_seed_hash: Option<String>,
        #[arg(long, requires = "server_seed_hash")]
        server_seed: Option<String>,
        #[arg(long, default_value = "")]
        client_seed: String,
        #[arg(long, default_value_t = 1)]
        nonce: u64,
        #[arg(long)]
        total_tiles: Option<u8>,
        #[arg(long, default_value_t = 3)]
        hazards: u8,
        /// Disclosure JSON file as returned when a round ends
        #[arg(long)]
        disclosure: Option<PathBuf>,
    },
    /// Print the multiplier for every pick count
    Table { hazards: u8 },
    /// Play one round, revealing the given tiles in order, and log it
    Play {
        #[arg(long, default_value = "operator")]
        owner: String,
        #[arg(long, default_value = "1.00")]
        wager: Amount,
        #[arg(long, default_value_t = 3)]
        hazards: u8,
        #[arg(long)]
        client_seed: Option<String>,
        #[arg(required = true, num_args = 1..)]
        tiles: Vec<u32>,
    },
    /// Play many rounds with a fixed strategy and report the observed RTP
    Simulate {
        #[arg(long, default_value_t = 10_000)]
        rounds: u64,
        #[arg(long, default_value_t = 3)]
        hazards: u8,
        /// Safe reveals to attempt before cashing out
        #[arg(long, default_value_t = 2)]
        picks: u8,
        #[arg(long, default_value = "1.00")]
        wager: Amount,
        #[arg(long, default_value_t = 4)]
        workers: u32,
    },
    /// View last N settled rounds
    ViewLogs {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export settled rounds to CSV path
    ExportCsv { path: PathBuf },
}

fn load_params(path: Option<&Path>) -> anyhow::Result<EngineParams> {
    let Some(path) = path else {
        return Ok(EngineParams::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let params: EngineParams = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    params.validate()?;
    Ok(params)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn log_settled(
    database_url: Option<&str>,
    settlement: &Settlement,
    disclosure: &SeedDisclosure,
) -> anyhow::Result<()> {
    let pool = db::open(database_url).await?;
    let entry = RoundLogEntry::settled(settlement, disclosure);
    let id = db::insert_round(&pool, &entry).await?;
    info!(id, round_id = %entry.round_id, state = %entry.state, "round logged");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let params = load_params(cli.config.as_deref())?;
    let database_url = cli.database_url.as_deref();

    match cli.command {
        Commands::Verify {
            server_seed_hash,
            server_seed,
            client_seed,
            nonce,
            total_tiles,
            hazards,
            disclosure,
        } => {
            if let Some(path) = disclosure {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let disclosure: SeedDisclosure = serde_json::from_str(&raw)?;
                let response = VerifyRequest::from(&disclosure).run()?;
                let layout_matches = verify_disclosure(&disclosure)?;
                print_json(&serde_json::json!({
                    "valid": response.valid,
                    "hazard_positions": response.hazard_positions,
                    "layout_matches": layout_matches,
                }))?;
            } else {
                let (Some(server_seed_hash), Some(server_seed)) = (server_seed_hash, server_seed)
                else {
                    anyhow::bail!("pass --server-seed-hash and --server-seed, or --disclosure");
                };
                let request = VerifyRequest {
                    server_seed_hash,
                    server_seed,
                    client_seed,
                    nonce,
                    total_tiles: total_tiles.unwrap_or(params.total_tiles),
                    hazard_count: hazards,
                };
                print_json(&request.run()?)?;
            }
        }
        Commands::Table { hazards } => {
            let engine = RoundEngine::new(params)?;
            println!(
                "board={} hazards={} edge={}",
                engine.params().total_tiles,
                hazards,
                engine.house_edge()
            );
            for (i, m) in engine.multiplier_table(hazards)?.iter().enumerate() {
                println!("{:>3} {:>16} {}", i + 1, m.to_decimal_string(4), m);
            }
        }
        Commands::Play {
            owner,
            wager,
            hazards,
            client_seed,
            tiles,
        } => {
            let engine = RoundEngine::new(params)?;
            let owner = OwnerId::new(owner);
            let round = engine.start(&owner, wager, hazards, client_seed)?;
            print_json(&round)?;

            let mut terminal = None;
            for tile in tiles {
                let outcome = engine.reveal(round.round_id, &owner, tile)?;
                print_json(&outcome)?;
                if let (Some(settlement), Some(disclosure)) =
                    (outcome.settlement, outcome.disclosure)
                {
                    terminal = Some((settlement, disclosure));
                    break;
                }
            }
            let (settlement, disclosure) = match terminal {
                Some(t) => t,
                None => {
                    let cash = engine.cash_out(round.round_id, &owner)?;
                    print_json(&cash)?;
                    (cash.settlement, cash.disclosure)
                }
            };
            log_settled(database_url, &settlement, &disclosure).await?;
        }
        Commands::Simulate {
            rounds,
            hazards,
            picks,
            wager,
            workers,
        } => {
            let engine = RoundEngine::new(params)?;
            let tally = sim::simulate(&engine, rounds, workers, wager, hazards, picks)?;
            println!(
                "rounds={} wins={} losses={} wagered={} paid={}",
                tally.rounds,
                tally.wins,
                tally.losses,
                Amount::from_minor(u64::try_from(tally.wagered)?),
                Amount::from_minor(u64::try_from(tally.paid)?),
            );
            println!(
                "rtp observed={:.4} theoretical={:.4}",
                tally.rtp(),
                engine.house_edge().retained().to_f64()
            );
        }
        Commands::ViewLogs { n } => {
            let pool = db::open(database_url).await?;
            for r in db::recent_rounds(&pool, n).await? {
                let verified = verify_disclosure(&r.disclosure())?;
                println!(
                    "#{:>6} {} {} owner={} nonce={} state={} wager={} payout={} hash={} verified={}",
                    r.id,
                    r.ts.to_rfc3339(),
                    r.round_id,
                    r.owner_id,
                    r.nonce,
                    r.state,
                    r.wager,
                    r.payout,
                    r.server_seed_hash,
                    verified
                );
            }
        }
        Commands::ExportCsv { path } => {
            let pool = db::open(database_url).await?;
            let rounds = db::all_rounds(&pool).await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            db::write_csv(&mut wtr, &rounds)?;
            println!("Exported {} rows to {}", rounds.len(), path.display());
        }
    }

    Ok(())
}
