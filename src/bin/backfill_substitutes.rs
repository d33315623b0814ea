use std::path::PathBuf;

use anyhow::{Context, Result};

use fixture_warehouse::config;
use fixture_warehouse::ingest;
use fixture_warehouse::warehouse;

fn main() -> Result<()> {
    env_logger::init();
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg()
        .unwrap_or_else(|| PathBuf::from(config::env_or("WAREHOUSE_DB", "warehouse.sqlite")));
    let conn = warehouse::open_db(&db_path).context("open warehouse")?;

    let flipped = ingest::backfill_substitutes(&conn)?;
    println!("Substitute backfill complete");
    println!("DB: {}", db_path.display());
    println!("Rows flipped: {flipped}");
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db"
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next));
        }
    }
    None
}
