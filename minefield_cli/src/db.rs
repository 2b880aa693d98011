use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use minefield_shared::RoundLogEntry;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://minefield.db";

// Schema lives in migrations/.

pub async fn open(url: Option<&str>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or(DEFAULT_DATABASE_URL);
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("bad database url {url}"))?
        .create_if_missing(true);
    connect(options, 5).await
}

async fn connect(options: SqliteConnectOptions, max: u32) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max)
        .connect_with(options)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
struct RoundRow {
    id: i64,
    ts: String,
    round_id: String,
    owner_id: String,
    state: String,
    nonce: i64,
    client_seed: String,
    server_seed_hash: String,
    server_seed: String,
    total_tiles: i64,
    hazard_count: i64,
    hazard_positions_json: String,
    picks_json: String,
    wager: String,
    multiplier: String,
    payout: String,
}

impl TryFrom<RoundRow> for RoundLogEntry {
    type Error = anyhow::Error;

    fn try_from(r: RoundRow) -> Result<Self, Self::Error> {
        Ok(RoundLogEntry {
            id: r.id,
            ts: DateTime::parse_from_rfc3339(&r.ts)?.with_timezone(&Utc),
            round_id: r.round_id.parse()?,
            owner_id: r.owner_id.as_str().into(),
            state: r.state.parse()?,
            nonce: u64::try_from(r.nonce)?,
            client_seed: r.client_seed,
            server_seed_hash: r.server_seed_hash.parse()?,
            server_seed: r.server_seed,
            total_tiles: u8::try_from(r.total_tiles)?,
            hazard_count: u8::try_from(r.hazard_count)?,
            hazard_positions: serde_json::from_str(&r.hazard_positions_json)?,
            picks: serde_json::from_str(&r.picks_json)?,
            wager: r.wager.parse()?,
            multiplier: r.multiplier.parse()?,
            payout: r.payout.parse()?,
        })
    }
}

const SELECT_ROUNDS: &str = "SELECT id, ts, round_id, owner_id, state, nonce, client_seed, \
     server_seed_hash, server_seed, total_tiles, hazard_count, hazard_positions_json, \
     picks_json, wager, multiplier, payout FROM rounds";

pub async fn insert_round(pool: &SqlitePool, entry: &RoundLogEntry) -> anyhow::Result<i64> {
    let nonce = i64::try_from(entry.nonce).context("nonce does not fit the log")?;
    let result = sqlx::query(
        "INSERT INTO rounds (ts, round_id, owner_id, state, nonce, client_seed, server_seed_hash, \
         server_seed, total_tiles, hazard_count, hazard_positions_json, picks_json, wager, \
         multiplier, payout) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.ts.to_rfc3339())
    .bind(entry.round_id.to_string())
    .bind(entry.owner_id.as_str())
    .bind(entry.state.as_str())
    .bind(nonce)
    .bind(&entry.client_seed)
    .bind(entry.server_seed_hash.to_string())
    .bind(&entry.server_seed)
    .bind(i64::from(entry.total_tiles))
    .bind(i64::from(entry.hazard_count))
    .bind(serde_json::to_string(&entry.hazard_positions)?)
    .bind(serde_json::to_string(&entry.picks)?)
    .bind(entry.wager.to_string())
    .bind(entry.multiplier.to_string())
    .bind(entry.payout.to_string())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Most recent `n` rounds, newest first.
pub async fn recent_rounds(pool: &SqlitePool, n: i64) -> anyhow::Result<Vec<RoundLogEntry>> {
    let rows = sqlx::query_as::<_, RoundRow>(&format!("{SELECT_ROUNDS} ORDER BY id DESC LIMIT ?"))
        .bind(n)
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(RoundLogEntry::try_from).collect()
}

pub async fn all_rounds(pool: &SqlitePool) -> anyhow::Result<Vec<RoundLogEntry>> {
    let rows = sqlx::query_as::<_, RoundRow>(&format!("{SELECT_ROUNDS} ORDER BY id ASC"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(RoundLogEntry::try_from).collect()
}

pub fn write_csv<W: std::io::Write>(
    wtr: &mut csv::Writer<W>,
    rounds: &[RoundLogEntry],
) -> anyhow::Result<()> {
    wtr.write_record([
        "id",
        "ts",
        "round_id",
        "owner_id",
        "state",
        "nonce",
        "client_seed",
        "server_seed_hash",
        "server_seed",
        "total_tiles",
        "hazard_count",
        "hazard_positions",
        "picks",
        "wager",
        "multiplier",
        "payout",
    ])?;
    for r in rounds {
        wtr.write_record(&[
            r.id.to_string(),
            r.ts.to_rfc3339(),
            r.round_id.to_string(),
            r.owner_id.to_string(),
            r.state.to_string(),
            r.nonce.to_string(),
            r.client_seed.clone(),
            r.server_seed_hash.to_string(),
            r.server_seed.clone(),
            r.total_tiles.to_string(),
            r.hazard_count.to_string(),
            serde_json::to_string(&r.hazard_positions)?,
            serde_json::to_string(&r.picks)?,
            r.wager.to_string(),
            r.multiplier.to_string(),
            r.payout.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
