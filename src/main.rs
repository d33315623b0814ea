use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use fixture_warehouse::api_client::ApiClient;
use fixture_warehouse::config;
use fixture_warehouse::entities::VenueDetails;
use fixture_warehouse::geocode::{Geocoder, HttpGeocoder, NullGeocoder};
use fixture_warehouse::ingest::{self, IngestDeps};
use fixture_warehouse::warehouse;

fn main() -> Result<()> {
    env_logger::init();
    let cfg = config::load()?;

    let fixture_ids = parse_fixture_ids_arg()
        .or_else(fixture_ids_from_env)
        .ok_or_else(|| {
            anyhow!(
                "no fixture ids given; pass --fixture-ids 1234,5678 or set WAREHOUSE_FIXTURE_IDS"
            )
        })?;
    let db_path = parse_db_path_arg().unwrap_or_else(|| cfg.db_path.clone());
    let venue_details = match parse_venues_arg() {
        Some(path) => load_venue_details(&path)?,
        None => HashMap::new(),
    };
    let skip_enrichment = has_flag("--skip-enrichment");

    let mut conn = warehouse::open_db(&db_path)?;
    warehouse::seed_countries(&conn)?;

    let api = ApiClient::new(&cfg)?;
    let mut bundles = Vec::with_capacity(fixture_ids.len());
    let mut fetch_errors: Vec<(i64, String)> = Vec::new();
    for id in &fixture_ids {
        match api.fixture_bundle(*id) {
            Ok(bundle) => bundles.push(bundle),
            Err(err) => fetch_errors.push((*id, err.to_string())),
        }
    }

    let geocoder: Box<dyn Geocoder> = if skip_enrichment {
        Box::new(NullGeocoder)
    } else {
        Box::new(HttpGeocoder::new())
    };
    let deps = IngestDeps {
        profiles: &api,
        geocoder: geocoder.as_ref(),
        venue_details: &venue_details,
    };
    let summary = ingest::ingest_fixtures(&mut conn, &bundles, &deps)?;

    println!("Fixture ingest complete");
    println!("DB: {}", db_path.display());
    println!(
        "Fixtures: {}/{}",
        summary.fixtures_succeeded, summary.fixtures_total
    );
    for outcome in &summary.outcomes {
        println!(
            "fixture {}: id={} created={} players+{} events+{} stats+{} playerstats+{} lineups+{}",
            outcome.external_id,
            outcome.fixture_id,
            outcome.fixture_created,
            outcome.players_added,
            outcome.events_added,
            outcome.team_stats_added,
            outcome.player_stats_added,
            outcome.lineups_added,
        );
    }
    if !summary.errors.is_empty() || !fetch_errors.is_empty() {
        println!(
            "failed fixtures: {}",
            summary.errors.len() + fetch_errors.len()
        );
        for (id, err) in fetch_errors.iter().chain(&summary.errors) {
            println!(" - {id}: {err}");
        }
    }

    Ok(())
}

fn load_venue_details(path: &PathBuf) -> Result<HashMap<String, VenueDetails>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read venue details {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse venue details {}", path.display()))
}

fn parse_db_path_arg() -> Option<PathBuf> {
    value_arg("--db").map(PathBuf::from)
}

fn parse_venues_arg() -> Option<PathBuf> {
    value_arg("--venues").map(PathBuf::from)
}

fn parse_fixture_ids_arg() -> Option<Vec<i64>> {
    let ids = parse_ids(&value_arg("--fixture-ids")?);
    if ids.is_empty() { None } else { Some(ids) }
}

fn fixture_ids_from_env() -> Option<Vec<i64>> {
    let raw = std::env::var("WAREHOUSE_FIXTURE_IDS").ok()?;
    let ids = parse_ids(&raw);
    if ids.is_empty() { None } else { Some(ids) }
}

fn value_arg(flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == flag)
}

fn parse_ids(raw: &str) -> Vec<i64> {
    let mut seen = HashSet::new();
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .filter(|id| seen.insert(*id))
        .collect()
}
