use serde_json::Value;

use crate::resolve::ResolveError;

const NULL: &Value = &Value::Null;

/// One fixture's worth of raw API payloads, already parsed from JSON. The
/// resolution core never sees transport details, only these values.
#[derive(Debug, Clone)]
pub struct FixtureBundle {
    pub external_id: i64,
    pub fixture: Value,
    pub events: Option<Value>,
    pub statistics: Option<Value>,
    pub player_statistics: Option<Value>,
    pub lineups: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct VenueRef {
    pub external_id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreBreakdown {
    pub halftime_home: Option<i64>,
    pub halftime_away: Option<i64>,
    pub fulltime_home: Option<i64>,
    pub fulltime_away: Option<i64>,
    pub extratime_home: Option<i64>,
    pub extratime_away: Option<i64>,
    pub penalty_home: Option<i64>,
    pub penalty_away: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct FixturePayload {
    pub external_id: i64,
    pub referee: Option<String>,
    pub utc_date: Option<String>,
    pub venue: VenueRef,
    pub status_short: Option<String>,
    pub status_elapsed: Option<i64>,
    pub league_external_id: i64,
    pub league_round: Option<String>,
    pub home_team_external_id: i64,
    pub away_team_external_id: i64,
    pub home_winner: Option<bool>,
    pub away_winner: Option<bool>,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub score: ScoreBreakdown,
}

impl FixturePayload {
    pub fn from_response(payload: &Value) -> Result<Self, ResolveError> {
        let item = first_response_item(payload)
            .ok_or_else(|| malformed("fixture response has no items"))?;
        let fixture = item
            .get("fixture")
            .ok_or_else(|| malformed("fixture object missing"))?;
        let external_id = field_i64(fixture, "id").ok_or_else(|| malformed("fixture id missing"))?;

        let venue_raw = fixture.get("venue").unwrap_or(NULL);
        let venue = VenueRef {
            external_id: field_i64(venue_raw, "id"),
            name: field_str(venue_raw, "name"),
            city: field_str(venue_raw, "city"),
        };

        let status = fixture.get("status").unwrap_or(NULL);
        let league = item.get("league").unwrap_or(NULL);
        let league_external_id =
            field_i64(league, "id").ok_or_else(|| malformed("league id missing"))?;

        let teams = item.get("teams").unwrap_or(NULL);
        let home = teams.get("home").unwrap_or(NULL);
        let away = teams.get("away").unwrap_or(NULL);
        let home_team_external_id =
            field_i64(home, "id").ok_or_else(|| malformed("home team id missing"))?;
        let away_team_external_id =
            field_i64(away, "id").ok_or_else(|| malformed("away team id missing"))?;

        let goals = item.get("goals").unwrap_or(NULL);
        let score_raw = item.get("score").unwrap_or(NULL);
        let score = ScoreBreakdown {
            halftime_home: nested_i64(score_raw, "halftime", "home"),
            halftime_away: nested_i64(score_raw, "halftime", "away"),
            fulltime_home: nested_i64(score_raw, "fulltime", "home"),
            fulltime_away: nested_i64(score_raw, "fulltime", "away"),
            extratime_home: nested_i64(score_raw, "extratime", "home"),
            extratime_away: nested_i64(score_raw, "extratime", "away"),
            penalty_home: nested_i64(score_raw, "penalty", "home"),
            penalty_away: nested_i64(score_raw, "penalty", "away"),
        };

        Ok(FixturePayload {
            external_id,
            referee: field_str(fixture, "referee"),
            utc_date: field_str(fixture, "date"),
            venue,
            status_short: field_str(status, "short"),
            status_elapsed: field_i64(status, "elapsed"),
            league_external_id,
            league_round: field_str(league, "round"),
            home_team_external_id,
            away_team_external_id,
            home_winner: home.get("winner").and_then(Value::as_bool),
            away_winner: away.get("winner").and_then(Value::as_bool),
            home_goals: field_i64(goals, "home"),
            away_goals: field_i64(goals, "away"),
            score,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub kind: String,
    pub detail: Option<String>,
    pub comments: Option<String>,
    pub elapsed: Option<i64>,
    pub extra: Option<i64>,
    pub team_external_id: Option<i64>,
    pub player_external_id: Option<i64>,
    pub assist_external_id: Option<i64>,
}

pub fn parse_events(payload: &Value) -> Result<Vec<EventRecord>, ResolveError> {
    let response = response_array(payload)?;
    check_result_count(payload, response.len(), "events")?;

    let mut out = Vec::with_capacity(response.len());
    for event in response {
        let kind = field_str(event, "type").ok_or_else(|| malformed("event without a type"))?;
        let time = event.get("time").unwrap_or(NULL);
        out.push(EventRecord {
            kind,
            detail: field_str(event, "detail"),
            comments: field_str(event, "comments"),
            elapsed: field_i64(time, "elapsed"),
            extra: field_i64(time, "extra"),
            team_external_id: nested_i64(event, "team", "id"),
            player_external_id: nested_i64(event, "player", "id"),
            assist_external_id: nested_i64(event, "assist", "id"),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct TeamStats {
    pub team_external_id: i64,
    pub shots_on_goal: Option<i64>,
    pub shots_off_goal: Option<i64>,
    pub total_shots: Option<i64>,
    pub blocked_shots: Option<i64>,
    pub shots_inside_box: Option<i64>,
    pub shots_outside_box: Option<i64>,
    pub fouls: Option<i64>,
    pub corner_kicks: Option<i64>,
    pub offsides: Option<i64>,
    pub ball_possession: Option<f64>,
    pub yellow_cards: Option<i64>,
    pub red_cards: Option<i64>,
    pub goalkeeper_saves: Option<i64>,
    pub total_passes: Option<i64>,
    pub passes_accurate: Option<i64>,
}

pub fn parse_team_statistics(payload: &Value) -> Result<Vec<TeamStats>, ResolveError> {
    let response = response_array(payload)?;
    check_result_count(payload, response.len(), "statistics")?;

    let mut out = Vec::with_capacity(response.len());
    for side in response {
        let team_external_id =
            nested_i64(side, "team", "id").ok_or_else(|| malformed("statistics without a team"))?;
        let mut stats = TeamStats {
            team_external_id,
            ..TeamStats::default()
        };
        if let Some(entries) = side.get("statistics").and_then(Value::as_array) {
            for entry in entries {
                let Some(kind) = entry.get("type").and_then(Value::as_str) else {
                    continue;
                };
                let value = entry.get("value").unwrap_or(NULL);
                match kind {
                    "Shots on Goal" => stats.shots_on_goal = as_i64_any(value),
                    "Shots off Goal" => stats.shots_off_goal = as_i64_any(value),
                    "Total Shots" => stats.total_shots = as_i64_any(value),
                    "Blocked Shots" => stats.blocked_shots = as_i64_any(value),
                    "Shots insidebox" => stats.shots_inside_box = as_i64_any(value),
                    "Shots outsidebox" => stats.shots_outside_box = as_i64_any(value),
                    "Fouls" => stats.fouls = as_i64_any(value),
                    "Corner Kicks" => stats.corner_kicks = as_i64_any(value),
                    "Offsides" => stats.offsides = as_i64_any(value),
                    "Ball Possession" => stats.ball_possession = as_percent_any(value),
                    "Yellow Cards" => stats.yellow_cards = as_i64_any(value),
                    "Red Cards" => stats.red_cards = as_i64_any(value),
                    "Goalkeeper Saves" => stats.goalkeeper_saves = as_i64_any(value),
                    "Total passes" => stats.total_passes = as_i64_any(value),
                    "Passes accurate" => stats.passes_accurate = as_i64_any(value),
                    _ => {}
                }
            }
        }
        out.push(stats);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct PlayerStatLine {
    pub player_external_id: i64,
    pub minutes: Option<i64>,
    pub number: Option<i64>,
    pub position: Option<String>,
    pub rating: Option<f64>,
    pub captain: bool,
    pub substitute: bool,
    pub offsides: Option<i64>,
    pub total_shots: Option<i64>,
    pub shots_on_goal: Option<i64>,
    pub goals: Option<i64>,
    pub goals_conceded: Option<i64>,
    pub assists: Option<i64>,
    pub saves: Option<i64>,
    pub total_passes: Option<i64>,
    pub key_passes: Option<i64>,
    pub passes_accuracy: Option<f64>,
    pub tackles: Option<i64>,
    pub blocks: Option<i64>,
    pub interceptions: Option<i64>,
    pub duels: Option<i64>,
    pub duels_won: Option<i64>,
    pub dribbles_attempts: Option<i64>,
    pub dribbles_success: Option<i64>,
    pub dribbles_past: Option<i64>,
    pub fouls_committed: Option<i64>,
    pub fouls_drawn: Option<i64>,
    pub yellow_cards: Option<i64>,
    pub red_cards: Option<i64>,
    pub penalties_won: Option<i64>,
    pub penalties_committed: Option<i64>,
    pub penalties_scored: Option<i64>,
    pub penalties_missed: Option<i64>,
    pub penalties_saved: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TeamPlayerStats {
    pub team_external_id: i64,
    pub players: Vec<PlayerStatLine>,
}

pub fn parse_player_statistics(payload: &Value) -> Result<Vec<TeamPlayerStats>, ResolveError> {
    let response = response_array(payload)?;
    check_result_count(payload, response.len(), "player statistics")?;

    let mut out = Vec::with_capacity(response.len());
    for side in response {
        let team_external_id = nested_i64(side, "team", "id")
            .ok_or_else(|| malformed("player statistics without a team"))?;
        let mut players = Vec::new();
        for entry in side
            .get("players")
            .and_then(Value::as_array)
            .unwrap_or(&Vec::new())
        {
            let Some(player_external_id) = nested_i64(entry, "player", "id") else {
                continue;
            };
            // One statistics block per player per fixture; the API wraps it
            // in a single-element array.
            let stats = entry
                .get("statistics")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .cloned()
                .unwrap_or(Value::Null);
            let games = stats.get("games").unwrap_or(NULL);
            let shots = stats.get("shots").unwrap_or(NULL);
            let goals = stats.get("goals").unwrap_or(NULL);
            let passes = stats.get("passes").unwrap_or(NULL);
            let tackles = stats.get("tackles").unwrap_or(NULL);
            let duels = stats.get("duels").unwrap_or(NULL);
            let dribbles = stats.get("dribbles").unwrap_or(NULL);
            let fouls = stats.get("fouls").unwrap_or(NULL);
            let cards = stats.get("cards").unwrap_or(NULL);
            let penalty = stats.get("penalty").unwrap_or(NULL);

            players.push(PlayerStatLine {
                player_external_id,
                minutes: field_i64(games, "minutes"),
                number: field_i64(games, "number"),
                position: field_str(games, "position"),
                rating: games.get("rating").and_then(as_f64_any),
                captain: games.get("captain").and_then(Value::as_bool).unwrap_or(false),
                substitute: games
                    .get("substitute")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                offsides: field_i64(&stats, "offsides"),
                total_shots: field_i64(shots, "total"),
                shots_on_goal: field_i64(shots, "on"),
                goals: field_i64(goals, "total"),
                goals_conceded: field_i64(goals, "conceded"),
                assists: field_i64(goals, "assists"),
                saves: field_i64(goals, "saves"),
                total_passes: field_i64(passes, "total"),
                key_passes: field_i64(passes, "key"),
                passes_accuracy: passes.get("accuracy").and_then(as_percent_any),
                tackles: field_i64(tackles, "total"),
                blocks: field_i64(tackles, "blocks"),
                interceptions: field_i64(tackles, "interceptions"),
                duels: field_i64(duels, "total"),
                duels_won: field_i64(duels, "won"),
                dribbles_attempts: field_i64(dribbles, "attempts"),
                dribbles_success: field_i64(dribbles, "success"),
                dribbles_past: field_i64(dribbles, "past"),
                fouls_committed: field_i64(fouls, "committed"),
                fouls_drawn: field_i64(fouls, "drawn"),
                yellow_cards: field_i64(cards, "yellow"),
                red_cards: field_i64(cards, "red"),
                penalties_won: field_i64(penalty, "won"),
                penalties_committed: field_i64(penalty, "commited"),
                penalties_scored: field_i64(penalty, "scored"),
                penalties_missed: field_i64(penalty, "missed"),
                penalties_saved: field_i64(penalty, "saved"),
            });
        }
        out.push(TeamPlayerStats {
            team_external_id,
            players,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct LineupSide {
    pub team_external_id: i64,
    pub coach_external_id: Option<i64>,
    pub formation: Option<String>,
    pub starters: Vec<i64>,
    pub substitutes: Vec<i64>,
}

pub fn parse_lineups(payload: &Value) -> Result<Vec<LineupSide>, ResolveError> {
    let response = response_array(payload)?;
    if response.is_empty() {
        // Lineups are published close to kickoff; nothing yet is fine.
        return Ok(Vec::new());
    }
    if response.len() != 2 {
        return Err(malformed(&format!(
            "expected 2 lineup sides, got {}",
            response.len()
        )));
    }

    let mut out = Vec::with_capacity(2);
    for side in response {
        let team_external_id =
            nested_i64(side, "team", "id").ok_or_else(|| malformed("lineup without a team"))?;
        out.push(LineupSide {
            team_external_id,
            coach_external_id: nested_i64(side, "coach", "id"),
            formation: field_str(side, "formation"),
            starters: squad_player_ids(side.get("startXI")),
            substitutes: squad_player_ids(side.get("substitutes")),
        });
    }
    Ok(out)
}

/// Every player external id referenced by a lineups payload, in first-seen
/// order without duplicates.
pub fn lineup_player_ids(payload: &Value) -> Vec<i64> {
    let mut out = Vec::new();
    let Some(response) = payload.get("response").and_then(Value::as_array) else {
        return out;
    };
    for side in response {
        for group in ["startXI", "substitutes"] {
            for id in squad_player_ids(side.get(group)) {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }
    out
}

fn squad_player_ids(group: Option<&Value>) -> Vec<i64> {
    let mut out = Vec::new();
    let Some(entries) = group.and_then(Value::as_array) else {
        return out;
    };
    for entry in entries {
        if let Some(id) = nested_i64(entry, "player", "id") {
            out.push(id);
        }
    }
    out
}

pub fn first_response_item(payload: &Value) -> Option<&Value> {
    payload.get("response").and_then(Value::as_array)?.first()
}

fn response_array(payload: &Value) -> Result<&Vec<Value>, ResolveError> {
    payload
        .get("response")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("payload has no response array"))
}

// The API announces how many rows it is sending; a mismatch means we read a
// truncated or mangled body.
fn check_result_count(payload: &Value, actual: usize, what: &str) -> Result<(), ResolveError> {
    if let Some(expected) = payload.get("results").and_then(as_i64_any)
        && expected >= 0
        && expected as usize != actual
    {
        return Err(malformed(&format!(
            "{what}: results={expected} but response has {actual} items"
        )));
    }
    Ok(())
}

fn malformed(msg: &str) -> ResolveError {
    ResolveError::MalformedPayload(msg.to_string())
}

fn field_str(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn field_i64(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(as_i64_any)
}

fn nested_i64(v: &Value, outer: &str, inner: &str) -> Option<i64> {
    v.get(outer).and_then(|o| o.get(inner)).and_then(as_i64_any)
}

pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

pub fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

/// "61%" -> 61.0; plain numbers pass through.
pub fn as_percent_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().trim_end_matches('%').parse::<f64>().ok()
}

/// "180 cm" -> 180; the API writes heights and weights as annotated strings.
pub fn parse_leading_int(raw: Option<&str>) -> Option<i64> {
    raw?.split_whitespace().next()?.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{as_percent_any, lineup_player_ids, parse_leading_int, parse_lineups};

    #[test]
    fn percent_strings_convert() {
        assert_eq!(as_percent_any(&json!("61%")), Some(61.0));
        assert_eq!(as_percent_any(&json!(48.5)), Some(48.5));
        assert_eq!(as_percent_any(&json!("")), None);
        assert_eq!(as_percent_any(&json!(null)), None);
    }

    #[test]
    fn annotated_measurements_parse() {
        assert_eq!(parse_leading_int(Some("180 cm")), Some(180));
        assert_eq!(parse_leading_int(Some("74 kg")), Some(74));
        assert_eq!(parse_leading_int(Some("")), None);
        assert_eq!(parse_leading_int(None), None);
    }

    #[test]
    fn lineup_player_ids_dedup_in_order() {
        let payload = json!({
            "response": [
                {
                    "startXI": [
                        {"player": {"id": 10}},
                        {"player": {"id": 11}}
                    ],
                    "substitutes": [{"player": {"id": 10}}, {"player": {"id": 12}}]
                }
            ]
        });
        assert_eq!(lineup_player_ids(&payload), vec![10, 11, 12]);
    }

    #[test]
    fn empty_lineup_response_is_not_an_error() {
        let payload = json!({"results": 0, "response": []});
        assert!(parse_lineups(&payload).expect("empty ok").is_empty());
    }

    #[test]
    fn one_sided_lineups_are_rejected() {
        let payload = json!({
            "response": [{"team": {"id": 1}, "startXI": [], "substitutes": []}]
        });
        assert!(parse_lineups(&payload).is_err());
    }
}
