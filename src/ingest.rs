use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;

use crate::entities::{self, ProfileSource, VenueDetails};
use crate::geocode::Geocoder;
use crate::payload::{self, FixtureBundle, FixturePayload};
use crate::resolve::{ResolveError, XrefCache};

pub struct IngestDeps<'a> {
    pub profiles: &'a dyn ProfileSource,
    pub geocoder: &'a dyn Geocoder,
    pub venue_details: &'a HashMap<String, VenueDetails>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureOutcome {
    pub external_id: i64,
    pub fixture_id: i64,
    pub fixture_created: bool,
    pub players_added: usize,
    pub events_added: usize,
    pub team_stats_added: usize,
    pub player_stats_added: usize,
    pub lineups_added: usize,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub fixtures_total: usize,
    pub fixtures_succeeded: usize,
    pub outcomes: Vec<FixtureOutcome>,
    pub errors: Vec<(i64, String)>,
}

/// Batch entry point. Each fixture runs in its own transaction; one failing
/// rolls back alone and the batch moves on, reporting it in the summary.
pub fn ingest_fixtures(
    conn: &mut Connection,
    bundles: &[FixtureBundle],
    deps: &IngestDeps<'_>,
) -> Result<IngestSummary> {
    let mut cache = XrefCache::new();
    cache.warm(conn).context("warm cross-reference cache")?;

    let mut summary = IngestSummary {
        fixtures_total: bundles.len(),
        ..IngestSummary::default()
    };
    for bundle in bundles {
        match ingest_fixture(conn, bundle, deps, &mut cache) {
            Ok(outcome) => {
                summary.fixtures_succeeded += 1;
                summary.outcomes.push(outcome);
            }
            Err(err) => {
                warn!("fixture {} failed: {err}", bundle.external_id);
                summary.errors.push((bundle.external_id, err.to_string()));
            }
        }
    }
    Ok(summary)
}

pub fn ingest_fixture(
    conn: &mut Connection,
    bundle: &FixtureBundle,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<FixtureOutcome, ResolveError> {
    let fixture = FixturePayload::from_response(&bundle.fixture)?;
    let tx = conn.transaction()?;
    let mut outcome = FixtureOutcome {
        external_id: fixture.external_id,
        ..FixtureOutcome::default()
    };

    // Players referenced by the lineups go in first so every later foreign
    // key already has a row to land on.
    if let Some(lineups) = bundle.lineups.as_ref() {
        for player_external_id in payload::lineup_player_ids(lineups) {
            let resolution =
                entities::resolve_player(&tx, player_external_id, deps.profiles, cache)?;
            if resolution.was_inserted() {
                outcome.players_added += 1;
            }
        }
    }

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM fixture WHERE external_id = ?1",
            params![fixture.external_id],
            |row| row.get(0),
        )
        .optional()?;
    let fixture_id = match existing {
        Some(id) => {
            info!(
                "fixture {} already in the warehouse (id {id})",
                fixture.external_id
            );
            id
        }
        None => {
            let id = insert_fixture(&tx, &fixture, deps, cache)?;
            outcome.fixture_created = true;
            id
        }
    };
    outcome.fixture_id = fixture_id;

    if let Some(events) = bundle.events.as_ref() {
        outcome.events_added = ingest_events(&tx, fixture_id, events, deps, cache)?;
    }
    if let Some(statistics) = bundle.statistics.as_ref() {
        outcome.team_stats_added = ingest_team_statistics(&tx, fixture_id, statistics, deps, cache)?;
    }
    if let Some(player_statistics) = bundle.player_statistics.as_ref() {
        outcome.player_stats_added =
            ingest_player_statistics(&tx, fixture_id, player_statistics, deps, cache)?;
    }
    if let Some(lineups) = bundle.lineups.as_ref() {
        outcome.lineups_added = ingest_lineups(&tx, fixture_id, lineups, deps, cache)?;
    }

    tx.commit()?;
    Ok(outcome)
}

fn insert_fixture(
    tx: &Transaction<'_>,
    fixture: &FixturePayload,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<i64, ResolveError> {
    let referee_id = entities::resolve_referee(tx, fixture.referee.as_deref())?;

    let details = fixture
        .venue
        .name
        .as_deref()
        .and_then(|name| deps.venue_details.get(name));
    let venue_id = entities::resolve_venue(tx, &fixture.venue, details, deps.geocoder)?.key();

    let league_id =
        entities::resolve_league(tx, fixture.league_external_id, fixture.league_round.as_deref())?;

    let home = entities::resolve_team(tx, fixture.home_team_external_id, deps.profiles, cache)?;
    let away = entities::resolve_team(tx, fixture.away_team_external_id, deps.profiles, cache)?;
    let home_team_id = home.key();
    let away_team_id = away.key();

    // A draw keeps the winner NULL.
    let winner_team_id = match (fixture.home_winner, fixture.away_winner) {
        (Some(true), _) => Some(home_team_id),
        (_, Some(true)) => Some(away_team_id),
        _ => None,
    };

    let resolution = crate::resolve::get_or_insert(
        tx,
        "fixture",
        &fixture.external_id.to_string(),
        "INSERT INTO fixture (
            external_id, referee_id, utc_datetime, venue_id, league_id,
            home_team_id, away_team_id, status_short, status_elapsed,
            winner_team_id, home_goals, away_goals,
            halftime_home, halftime_away, fulltime_home, fulltime_away,
            extratime_home, extratime_away, penalty_home, penalty_away,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                  ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
        ON CONFLICT(external_id) DO NOTHING",
        params![
            fixture.external_id,
            referee_id,
            fixture.utc_date,
            venue_id,
            league_id,
            home_team_id,
            away_team_id,
            fixture.status_short,
            fixture.status_elapsed,
            winner_team_id,
            fixture.home_goals,
            fixture.away_goals,
            fixture.score.halftime_home,
            fixture.score.halftime_away,
            fixture.score.fulltime_home,
            fixture.score.fulltime_away,
            fixture.score.extratime_home,
            fixture.score.extratime_away,
            fixture.score.penalty_home,
            fixture.score.penalty_away,
            Utc::now().to_rfc3339(),
        ],
        "SELECT id FROM fixture WHERE external_id = ?1",
        params![fixture.external_id],
    )?;
    Ok(resolution.key())
}

fn ingest_events(
    tx: &Transaction<'_>,
    fixture_id: i64,
    payload_value: &Value,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<usize, ResolveError> {
    if fact_rows_exist(tx, "fixture_event", fixture_id)? {
        info!("fixture {fixture_id} already has events, skipping");
        return Ok(0);
    }

    let mut added = 0usize;
    for event in payload::parse_events(payload_value)? {
        let event_type_id =
            entities::resolve_event_type(tx, &event.kind, event.detail.as_deref())?.key();
        let team_id = match event.team_external_id {
            Some(ext) => Some(entities::resolve_team(tx, ext, deps.profiles, cache)?.key()),
            None => None,
        };
        let player_id = match event.player_external_id {
            Some(ext) => Some(entities::resolve_player(tx, ext, deps.profiles, cache)?.key()),
            None => None,
        };
        let assist_player_id = match event.assist_external_id {
            Some(ext) => Some(entities::resolve_player(tx, ext, deps.profiles, cache)?.key()),
            None => None,
        };
        added += tx.execute(
            "INSERT INTO fixture_event (
                fixture_id, event_type_id, comments, time_elapsed,
                extra_time_elapsed, team_id, player_id, assist_player_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                fixture_id,
                event_type_id,
                event.comments,
                event.elapsed,
                event.extra,
                team_id,
                player_id,
                assist_player_id,
            ],
        )?;
    }
    Ok(added)
}

fn ingest_team_statistics(
    tx: &Transaction<'_>,
    fixture_id: i64,
    payload_value: &Value,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<usize, ResolveError> {
    if fact_rows_exist(tx, "fixture_statistics", fixture_id)? {
        info!("fixture {fixture_id} already has team statistics, skipping");
        return Ok(0);
    }

    let mut added = 0usize;
    for stats in payload::parse_team_statistics(payload_value)? {
        let team_id =
            entities::resolve_team(tx, stats.team_external_id, deps.profiles, cache)?.key();
        added += tx.execute(
            "INSERT INTO fixture_statistics (
                fixture_id, team_id, shots_on_goal, shots_off_goal, total_shots,
                blocked_shots, goalkeeper_saves, shots_inside_box, shots_outside_box,
                corner_kicks, offsides, ball_possession, total_passes,
                passes_accurate, fouls, yellow_cards, red_cards
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17)
            ON CONFLICT(fixture_id, team_id) DO NOTHING",
            params![
                fixture_id,
                team_id,
                stats.shots_on_goal,
                stats.shots_off_goal,
                stats.total_shots,
                stats.blocked_shots,
                stats.goalkeeper_saves,
                stats.shots_inside_box,
                stats.shots_outside_box,
                stats.corner_kicks,
                stats.offsides,
                stats.ball_possession,
                stats.total_passes,
                stats.passes_accurate,
                stats.fouls,
                stats.yellow_cards,
                stats.red_cards,
            ],
        )?;
    }
    Ok(added)
}

fn ingest_player_statistics(
    tx: &Transaction<'_>,
    fixture_id: i64,
    payload_value: &Value,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<usize, ResolveError> {
    if fact_rows_exist(tx, "fixture_player_statistics", fixture_id)? {
        info!("fixture {fixture_id} already has player statistics, skipping");
        return Ok(0);
    }

    let mut added = 0usize;
    for side in payload::parse_player_statistics(payload_value)? {
        let team_id =
            entities::resolve_team(tx, side.team_external_id, deps.profiles, cache)?.key();
        for line in &side.players {
            let player_id =
                entities::resolve_player(tx, line.player_external_id, deps.profiles, cache)?.key();
            let position_id = match line.position.as_deref() {
                Some(label) => Some(entities::resolve_position(tx, label)?.key()),
                None => None,
            };
            added += tx.execute(
                "INSERT INTO fixture_player_statistics (
                    fixture_id, team_id, player_id, minutes, number, position_id,
                    rating, captain, substitute, offsides, total_shots, shots_on_goal,
                    goals, goals_conceded, assists, saves, total_passes, key_passes,
                    passes_accuracy, tackles, blocks, interceptions, duels, duels_won,
                    dribbles_attempts, dribbles_success, dribbles_past,
                    fouls_committed, fouls_drawn, yellow_cards, red_cards,
                    penalties_won, penalties_committed, penalties_scored,
                    penalties_missed, penalties_saved
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                          ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24,
                          ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36)
                ON CONFLICT(fixture_id, player_id) DO NOTHING",
                params![
                    fixture_id,
                    team_id,
                    player_id,
                    line.minutes,
                    line.number,
                    position_id,
                    line.rating,
                    line.captain,
                    line.substitute,
                    line.offsides,
                    line.total_shots,
                    line.shots_on_goal,
                    line.goals,
                    line.goals_conceded,
                    line.assists,
                    line.saves,
                    line.total_passes,
                    line.key_passes,
                    line.passes_accuracy,
                    line.tackles,
                    line.blocks,
                    line.interceptions,
                    line.duels,
                    line.duels_won,
                    line.dribbles_attempts,
                    line.dribbles_success,
                    line.dribbles_past,
                    line.fouls_committed,
                    line.fouls_drawn,
                    line.yellow_cards,
                    line.red_cards,
                    line.penalties_won,
                    line.penalties_committed,
                    line.penalties_scored,
                    line.penalties_missed,
                    line.penalties_saved,
                ],
            )?;
        }
    }
    Ok(added)
}

fn ingest_lineups(
    tx: &Transaction<'_>,
    fixture_id: i64,
    payload_value: &Value,
    deps: &IngestDeps<'_>,
    cache: &mut XrefCache,
) -> Result<usize, ResolveError> {
    if fact_rows_exist(tx, "fixture_lineup", fixture_id)? {
        info!("fixture {fixture_id} already has lineups, skipping");
        return Ok(0);
    }

    let mut added = 0usize;
    for side in payload::parse_lineups(payload_value)? {
        let team_id =
            entities::resolve_team(tx, side.team_external_id, deps.profiles, cache)?.key();
        let coach_id = match side.coach_external_id {
            Some(ext) => Some(entities::resolve_coach(tx, ext, deps.profiles)?.key()),
            None => None,
        };
        let formation_id = match side.formation.as_deref() {
            Some(formation) => Some(entities::resolve_formation(tx, formation)?.key()),
            None => None,
        };

        let lineup = crate::resolve::get_or_insert(
            tx,
            "fixture_lineup",
            &format!("fixture {fixture_id} team {team_id}"),
            "INSERT INTO fixture_lineup (fixture_id, team_id, coach_id, formation_id)
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT(fixture_id, team_id) DO NOTHING",
            params![fixture_id, team_id, coach_id, formation_id],
            "SELECT id FROM fixture_lineup WHERE fixture_id = ?1 AND team_id = ?2",
            params![fixture_id, team_id],
        )?;
        if !lineup.was_inserted() {
            continue;
        }
        let lineup_id = lineup.key();

        for (slot, player_external_id) in side.starters.iter().enumerate() {
            let player_id =
                entities::resolve_player(tx, *player_external_id, deps.profiles, cache)?.key();
            tx.execute(
                "INSERT INTO fixture_lineup_player (lineup_id, player_id, role, slot)
                 VALUES (?1, ?2, 'starter', ?3)",
                params![lineup_id, player_id, slot as i64 + 1],
            )?;
        }
        for (slot, player_external_id) in side.substitutes.iter().enumerate() {
            let player_id =
                entities::resolve_player(tx, *player_external_id, deps.profiles, cache)?.key();
            tx.execute(
                "INSERT INTO fixture_lineup_player (lineup_id, player_id, role, slot)
                 VALUES (?1, ?2, 'substitute', ?3)",
                params![lineup_id, player_id, slot as i64 + 1],
            )?;
        }
        added += 1;
    }
    Ok(added)
}

fn fact_rows_exist(
    tx: &Transaction<'_>,
    table: &str,
    fixture_id: i64,
) -> Result<bool, ResolveError> {
    // Table names come from a fixed internal set, never from input.
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE fixture_id = ?1");
    let count: i64 = tx.query_row(&sql, params![fixture_id], |row| row.get(0))?;
    Ok(count > 0)
}

/// Out-of-band repair: substitution events name the player coming on in the
/// assist seat; make sure that player's statistics row is flagged as a
/// substitute. Idempotent, runs outside ingestion.
pub fn backfill_substitutes(conn: &Connection) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "SELECT fe.fixture_id, fe.team_id, fe.assist_player_id
             FROM fixture_event fe
             JOIN event_type et ON et.id = fe.event_type_id
             WHERE et.kind = 'subst'
               AND fe.assist_player_id IS NOT NULL
               AND fe.team_id IS NOT NULL",
        )
        .context("prepare substitution events query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .context("query substitution events")?;

    let mut flipped = 0usize;
    for row in rows {
        let (fixture_id, team_id, player_id) = row.context("decode substitution event")?;
        flipped += conn
            .execute(
                "UPDATE fixture_player_statistics SET substitute = 1
                 WHERE fixture_id = ?1 AND team_id = ?2 AND player_id = ?3 AND substitute = 0",
                params![fixture_id, team_id, player_id],
            )
            .context("flip substitute flag")?;
    }
    Ok(flipped)
}
