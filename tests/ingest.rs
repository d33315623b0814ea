use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use rusqlite::{Connection, params};
use serde_json::Value;

use fixture_warehouse::entities::{
    CoachProfile, PlayerProfile, ProfileSource, TeamProfile, VenueDetails,
};
use fixture_warehouse::geocode::NullGeocoder;
use fixture_warehouse::ingest::{self, IngestDeps};
use fixture_warehouse::payload::FixtureBundle;
use fixture_warehouse::resolve::ResolveError;
use fixture_warehouse::warehouse;

fn read_fixture(name: &str) -> Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture file should be valid json")
}

fn test_bundle() -> FixtureBundle {
    FixtureBundle {
        external_id: 147926,
        fixture: read_fixture("fixture_payload.json"),
        events: Some(read_fixture("events_payload.json")),
        statistics: Some(read_fixture("statistics_payload.json")),
        player_statistics: Some(read_fixture("player_stats_payload.json")),
        lineups: Some(read_fixture("lineups_payload.json")),
    }
}

fn test_db() -> Connection {
    let conn = warehouse::open_in_memory().expect("schema should build");
    warehouse::seed_countries(&conn).expect("countries should seed");
    warehouse::register_league(&conn, 253, Some("Major League Soccer")).expect("register league");
    conn
}

#[derive(Default)]
struct StubProfiles {
    fetches: RefCell<usize>,
}

impl ProfileSource for StubProfiles {
    fn team(&self, external_id: i64) -> Result<TeamProfile, ResolveError> {
        *self.fetches.borrow_mut() += 1;
        Ok(TeamProfile {
            name: Some(format!("Team {external_id}")),
            country: Some("United States".to_string()),
            founded: Some(2014),
        })
    }

    fn player(&self, external_id: i64) -> Result<PlayerProfile, ResolveError> {
        *self.fetches.borrow_mut() += 1;
        Ok(PlayerProfile {
            firstname: Some("Player".to_string()),
            lastname: Some(format!("{external_id}")),
            birthdate: Some("1998-07-04".to_string()),
            nationality: Some("Brazil".to_string()),
            height_cm: Some(180),
            weight_kg: Some(74),
            ..PlayerProfile::default()
        })
    }

    fn coach(&self, external_id: i64) -> Result<CoachProfile, ResolveError> {
        *self.fetches.borrow_mut() += 1;
        Ok(CoachProfile {
            firstname: Some("Coach".to_string()),
            lastname: Some(format!("{external_id}")),
            nationality: Some("Argentina".to_string()),
            ..CoachProfile::default()
        })
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("count")
}

#[test]
fn full_fixture_ingest_resolves_every_entity() {
    let mut conn = test_db();
    let profiles = StubProfiles::default();
    let details: HashMap<String, VenueDetails> = HashMap::new();
    let deps = IngestDeps {
        profiles: &profiles,
        geocoder: &NullGeocoder,
        venue_details: &details,
    };

    let summary =
        ingest::ingest_fixtures(&mut conn, &[test_bundle()], &deps).expect("batch should run");
    assert_eq!(summary.fixtures_succeeded, 1);
    assert!(summary.errors.is_empty());
    let outcome = &summary.outcomes[0];
    assert!(outcome.fixture_created);
    assert_eq!(outcome.players_added, 4);
    assert_eq!(outcome.events_added, 3);
    assert_eq!(outcome.team_stats_added, 2);
    assert_eq!(outcome.player_stats_added, 3);
    assert_eq!(outcome.lineups_added, 2);

    // The referee arrived as "John A. Smith, England" and did not exist:
    // exactly one new row, split name, England's code, fixture pointing at it.
    assert_eq!(count(&conn, "referee"), 1);
    let (ref_id, firstname, lastname, countrycode): (i64, String, String, String) = conn
        .query_row(
            "SELECT id, firstname, lastname, countrycode FROM referee",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .expect("referee row");
    assert_eq!(firstname, "John");
    assert_eq!(lastname, "A. Smith");
    assert_eq!(countrycode, "ENG");

    let (fixture_referee, winner_team_id): (i64, i64) = conn
        .query_row(
            "SELECT referee_id, winner_team_id FROM fixture WHERE external_id = 147926",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("fixture row");
    assert_eq!(fixture_referee, ref_id);

    let home_team_id: i64 = conn
        .query_row("SELECT id FROM team WHERE external_id = 1608", [], |row| {
            row.get(0)
        })
        .expect("home team");
    assert_eq!(winner_team_id, home_team_id);

    // Venue came with a provider id and minimal metadata.
    let venue_external: i64 = conn
        .query_row(
            "SELECT external_id FROM venue WHERE name = 'Riverside Arena'",
            [],
            |row| row.get(0),
        )
        .expect("venue row");
    assert_eq!(venue_external, 4000);

    // Reference tables filled lazily from the payloads.
    assert_eq!(count(&conn, "team"), 2);
    assert_eq!(count(&conn, "player"), 4);
    assert_eq!(count(&conn, "coach"), 2);
    assert_eq!(count(&conn, "formation"), 2);
    assert_eq!(count(&conn, "event_type"), 3);
    assert_eq!(count(&conn, "position"), 3);

    let possession: f64 = conn
        .query_row(
            "SELECT ball_possession FROM fixture_statistics fs
             JOIN team t ON t.id = fs.team_id WHERE t.external_id = 1608",
            [],
            |row| row.get(0),
        )
        .expect("possession");
    assert!((possession - 58.0).abs() < 1e-9);

    let lineup_players: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM fixture_lineup_player",
            [],
            |row| row.get(0),
        )
        .expect("lineup players");
    assert_eq!(lineup_players, 4);
}

#[test]
fn reingesting_the_same_fixture_adds_nothing() {
    let mut conn = test_db();
    let profiles = StubProfiles::default();
    let details: HashMap<String, VenueDetails> = HashMap::new();
    let deps = IngestDeps {
        profiles: &profiles,
        geocoder: &NullGeocoder,
        venue_details: &details,
    };

    ingest::ingest_fixtures(&mut conn, &[test_bundle()], &deps).expect("first run");
    let fixtures = count(&conn, "fixture");
    let events = count(&conn, "fixture_event");
    let referees = count(&conn, "referee");
    let players = count(&conn, "player");
    let fetches_after_first = *profiles.fetches.borrow();

    let summary = ingest::ingest_fixtures(&mut conn, &[test_bundle()], &deps).expect("second run");
    let outcome = &summary.outcomes[0];
    assert!(!outcome.fixture_created);
    assert_eq!(outcome.players_added, 0);
    assert_eq!(outcome.events_added, 0);
    assert_eq!(outcome.team_stats_added, 0);
    assert_eq!(outcome.player_stats_added, 0);
    assert_eq!(outcome.lineups_added, 0);

    assert_eq!(count(&conn, "fixture"), fixtures);
    assert_eq!(count(&conn, "fixture_event"), events);
    assert_eq!(count(&conn, "referee"), referees);
    assert_eq!(count(&conn, "player"), players);
    // Everything known is answered from the warehouse, not the API.
    assert_eq!(*profiles.fetches.borrow(), fetches_after_first);
}

#[test]
fn failed_fixture_rolls_back_without_touching_committed_ones() {
    let mut conn = test_db();
    let profiles = StubProfiles::default();
    let details: HashMap<String, VenueDetails> = HashMap::new();
    let deps = IngestDeps {
        profiles: &profiles,
        geocoder: &NullGeocoder,
        venue_details: &details,
    };

    // Second bundle points at a league nobody registered.
    let mut broken = test_bundle();
    broken.external_id = 147999;
    broken.fixture["response"][0]["fixture"]["id"] = Value::from(147999);
    broken.fixture["response"][0]["league"]["id"] = Value::from(999);
    broken.fixture["response"][0]["fixture"]["referee"] =
        Value::from("Paula Oliveira, Brazil");

    let summary = ingest::ingest_fixtures(&mut conn, &[test_bundle(), broken], &deps)
        .expect("batch keeps going");
    assert_eq!(summary.fixtures_succeeded, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].0, 147999);
    assert!(summary.errors[0].1.contains("manual resolution"));

    // The committed fixture survives; the failed one left no rows behind,
    // including the referee it resolved before the league lookup failed.
    assert_eq!(count(&conn, "fixture"), 1);
    assert_eq!(count(&conn, "referee"), 1);
    let oliveira: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM referee WHERE fullname_norm = 'paula oliveira'",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(oliveira, 0);
}

#[test]
fn substitute_backfill_flips_the_incoming_player() {
    let mut conn = test_db();
    let profiles = StubProfiles::default();
    let details: HashMap<String, VenueDetails> = HashMap::new();
    let deps = IngestDeps {
        profiles: &profiles,
        geocoder: &NullGeocoder,
        venue_details: &details,
    };
    ingest::ingest_fixtures(&mut conn, &[test_bundle()], &deps).expect("ingest");

    // Player 903 came on as a substitute but the stats feed said otherwise.
    let before: i64 = conn
        .query_row(
            "SELECT substitute FROM fixture_player_statistics fps
             JOIN player p ON p.id = fps.player_id WHERE p.external_id = 903",
            [],
            |row| row.get(0),
        )
        .expect("row before");
    assert_eq!(before, 0);

    let flipped = ingest::backfill_substitutes(&conn).expect("backfill runs");
    assert_eq!(flipped, 1);

    let after: i64 = conn
        .query_row(
            "SELECT substitute FROM fixture_player_statistics fps
             JOIN player p ON p.id = fps.player_id WHERE p.external_id = 903",
            [],
            |row| row.get(0),
        )
        .expect("row after");
    assert_eq!(after, 1);

    // Running it again finds nothing left to repair.
    assert_eq!(ingest::backfill_substitutes(&conn).expect("idempotent"), 0);
}
