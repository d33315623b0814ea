use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS country (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS position (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS referee (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            firstname TEXT,
            lastname TEXT,
            countrycode TEXT REFERENCES country(code),
            fullname_norm TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS venue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER UNIQUE,
            name TEXT NOT NULL,
            address TEXT,
            city TEXT,
            state TEXT,
            countrycode TEXT REFERENCES country(code),
            capacity INTEGER,
            surface TEXT,
            latitude REAL,
            longitude REAL,
            timezone TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_venue_name_unlinked
            ON venue(name) WHERE external_id IS NULL;

        CREATE TABLE IF NOT EXISTS team (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            name TEXT,
            countrycode TEXT REFERENCES country(code),
            founded_date TEXT
        );

        CREATE TABLE IF NOT EXISTS league (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            name TEXT
        );

        CREATE TABLE IF NOT EXISTS league_round_override (
            league_external_id INTEGER NOT NULL,
            round TEXT NOT NULL,
            league_id INTEGER NOT NULL REFERENCES league(id),
            PRIMARY KEY (league_external_id, round)
        );

        CREATE TABLE IF NOT EXISTS venue_override (
            name TEXT PRIMARY KEY,
            venue_id INTEGER NOT NULL REFERENCES venue(id)
        );

        CREATE TABLE IF NOT EXISTS coach (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            firstname TEXT,
            lastname TEXT,
            birthdate TEXT,
            birthplace TEXT,
            birthcountrycode TEXT REFERENCES country(code),
            nationality TEXT REFERENCES country(code)
        );

        CREATE TABLE IF NOT EXISTS player (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            firstname TEXT,
            lastname TEXT,
            birthdate TEXT,
            birthplace TEXT,
            birthcountrycode TEXT REFERENCES country(code),
            nationality TEXT REFERENCES country(code),
            height_cm INTEGER,
            weight_kg INTEGER
        );

        CREATE TABLE IF NOT EXISTS event_type (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            UNIQUE (kind, detail)
        );

        CREATE TABLE IF NOT EXISTS formation (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            formation TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS fixture (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            referee_id INTEGER REFERENCES referee(id),
            utc_datetime TEXT,
            venue_id INTEGER NOT NULL REFERENCES venue(id),
            league_id INTEGER NOT NULL REFERENCES league(id),
            home_team_id INTEGER NOT NULL REFERENCES team(id),
            away_team_id INTEGER NOT NULL REFERENCES team(id),
            status_short TEXT,
            status_elapsed INTEGER,
            winner_team_id INTEGER REFERENCES team(id),
            home_goals INTEGER,
            away_goals INTEGER,
            halftime_home INTEGER,
            halftime_away INTEGER,
            fulltime_home INTEGER,
            fulltime_away INTEGER,
            extratime_home INTEGER,
            extratime_away INTEGER,
            penalty_home INTEGER,
            penalty_away INTEGER,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fixture_event (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES fixture(id),
            event_type_id INTEGER NOT NULL REFERENCES event_type(id),
            comments TEXT,
            time_elapsed INTEGER,
            extra_time_elapsed INTEGER,
            team_id INTEGER REFERENCES team(id),
            player_id INTEGER REFERENCES player(id),
            assist_player_id INTEGER REFERENCES player(id)
        );
        CREATE INDEX IF NOT EXISTS idx_fixture_event_fixture
            ON fixture_event(fixture_id);

        CREATE TABLE IF NOT EXISTS fixture_statistics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES fixture(id),
            team_id INTEGER NOT NULL REFERENCES team(id),
            shots_on_goal INTEGER,
            shots_off_goal INTEGER,
            total_shots INTEGER,
            blocked_shots INTEGER,
            goalkeeper_saves INTEGER,
            shots_inside_box INTEGER,
            shots_outside_box INTEGER,
            corner_kicks INTEGER,
            offsides INTEGER,
            ball_possession REAL,
            total_passes INTEGER,
            passes_accurate INTEGER,
            fouls INTEGER,
            yellow_cards INTEGER,
            red_cards INTEGER,
            UNIQUE (fixture_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS fixture_player_statistics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES fixture(id),
            team_id INTEGER NOT NULL REFERENCES team(id),
            player_id INTEGER NOT NULL REFERENCES player(id),
            minutes INTEGER,
            number INTEGER,
            position_id INTEGER REFERENCES position(id),
            rating REAL,
            captain INTEGER NOT NULL DEFAULT 0,
            substitute INTEGER NOT NULL DEFAULT 0,
            offsides INTEGER,
            total_shots INTEGER,
            shots_on_goal INTEGER,
            goals INTEGER,
            goals_conceded INTEGER,
            assists INTEGER,
            saves INTEGER,
            total_passes INTEGER,
            key_passes INTEGER,
            passes_accuracy REAL,
            tackles INTEGER,
            blocks INTEGER,
            interceptions INTEGER,
            duels INTEGER,
            duels_won INTEGER,
            dribbles_attempts INTEGER,
            dribbles_success INTEGER,
            dribbles_past INTEGER,
            fouls_committed INTEGER,
            fouls_drawn INTEGER,
            yellow_cards INTEGER,
            red_cards INTEGER,
            penalties_won INTEGER,
            penalties_committed INTEGER,
            penalties_scored INTEGER,
            penalties_missed INTEGER,
            penalties_saved INTEGER,
            UNIQUE (fixture_id, player_id)
        );

        CREATE TABLE IF NOT EXISTS fixture_lineup (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fixture_id INTEGER NOT NULL REFERENCES fixture(id),
            team_id INTEGER NOT NULL REFERENCES team(id),
            coach_id INTEGER REFERENCES coach(id),
            formation_id INTEGER REFERENCES formation(id),
            UNIQUE (fixture_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS fixture_lineup_player (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lineup_id INTEGER NOT NULL REFERENCES fixture_lineup(id),
            player_id INTEGER NOT NULL REFERENCES player(id),
            role TEXT NOT NULL CHECK (role IN ('starter', 'substitute')),
            slot INTEGER NOT NULL,
            UNIQUE (lineup_id, role, slot)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

// Immutable reference data: countries are only ever looked up, never inserted
// during ingestion, so the warehouse ships with the lookup table filled.
const COUNTRY_SEED: &[(&str, &str)] = &[
    ("ARG", "Argentina"),
    ("AUS", "Australia"),
    ("AUT", "Austria"),
    ("BEL", "Belgium"),
    ("BIH", "Bosnia and Herzegovina"),
    ("BRA", "Brazil"),
    ("CAN", "Canada"),
    ("CHI", "Chile"),
    ("CIV", "Ivory Coast"),
    ("CMR", "Cameroon"),
    ("COL", "Colombia"),
    ("CRC", "Costa Rica"),
    ("CRO", "Croatia"),
    ("CUW", "Curacao"),
    ("CZE", "Czech Republic"),
    ("DEN", "Denmark"),
    ("ECU", "Ecuador"),
    ("EGY", "Egypt"),
    ("ENG", "England"),
    ("ESP", "Spain"),
    ("FRA", "France"),
    ("GER", "Germany"),
    ("GHA", "Ghana"),
    ("GRE", "Greece"),
    ("HON", "Honduras"),
    ("HUN", "Hungary"),
    ("IRL", "Ireland"),
    ("IRN", "Iran"),
    ("ITA", "Italy"),
    ("JAM", "Jamaica"),
    ("JPN", "Japan"),
    ("KOR", "South Korea"),
    ("KSA", "Saudi Arabia"),
    ("MAR", "Morocco"),
    ("MEX", "Mexico"),
    ("NED", "Netherlands"),
    ("NGA", "Nigeria"),
    ("NIR", "Northern Ireland"),
    ("NOR", "Norway"),
    ("NZL", "New Zealand"),
    ("PAN", "Panama"),
    ("PAR", "Paraguay"),
    ("PER", "Peru"),
    ("POL", "Poland"),
    ("POR", "Portugal"),
    ("QAT", "Qatar"),
    ("ROU", "Romania"),
    ("RSA", "South Africa"),
    ("RUS", "Russia"),
    ("SCO", "Scotland"),
    ("SEN", "Senegal"),
    ("SRB", "Serbia"),
    ("SUI", "Switzerland"),
    ("SWE", "Sweden"),
    ("TUN", "Tunisia"),
    ("TUR", "Turkey"),
    ("UKR", "Ukraine"),
    ("URU", "Uruguay"),
    ("USA", "United States"),
    ("VEN", "Venezuela"),
    ("WAL", "Wales"),
];

pub fn seed_countries(conn: &Connection) -> Result<usize> {
    let mut added = 0usize;
    for (code, name) in COUNTRY_SEED {
        added += conn
            .execute(
                "INSERT INTO country (code, name) VALUES (?1, ?2) ON CONFLICT(code) DO NOTHING",
                params![code, name],
            )
            .context("seed country")?;
    }
    Ok(added)
}

/// Leagues are operator-registered, not auto-inserted: an unknown league id
/// must be looked at by a human before fixtures start pointing at it.
pub fn register_league(conn: &Connection, external_id: i64, name: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO league (external_id, name) VALUES (?1, ?2) ON CONFLICT(external_id) DO NOTHING",
        params![external_id, name],
    )
    .context("register league")?;
    let id = conn
        .query_row(
            "SELECT id FROM league WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .context("read back league id")?;
    Ok(id)
}

/// Pin a (league external id, round label) pair to a specific warehouse
/// league. Covers competitions whose rounds land in a different internal
/// league than the id-level mapping says.
pub fn add_league_round_override(
    conn: &Connection,
    league_external_id: i64,
    round: &str,
    league_id: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO league_round_override (league_external_id, round, league_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(league_external_id, round) DO UPDATE SET league_id = excluded.league_id",
        params![league_external_id, round, league_id],
    )
    .context("add league round override")?;
    Ok(())
}

/// Pin a feed venue name to an existing warehouse venue row.
pub fn add_venue_override(conn: &Connection, name: &str, venue_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO venue_override (name, venue_id) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET venue_id = excluded.venue_id",
        params![name, venue_id],
    )
    .context("add venue override")?;
    Ok(())
}
