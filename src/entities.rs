use std::collections::HashMap;

use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;

use crate::candidates::{candidate_names, normalize_label};
use crate::geocode::{Geocoder, normalize_timezone};
use crate::names::{canonical_full_name, split_full_name};
use crate::payload::VenueRef;
use crate::resolve::{Resolution, ResolveError, XrefCache, get_or_insert, match_candidates};

/// Profile lookups against the upstream provider, behind a seam so the
/// resolution layer never performs HTTP itself.
pub trait ProfileSource {
    fn team(&self, external_id: i64) -> Result<TeamProfile, ResolveError>;
    fn player(&self, external_id: i64) -> Result<PlayerProfile, ResolveError>;
    fn coach(&self, external_id: i64) -> Result<CoachProfile, ResolveError>;
}

#[derive(Debug, Clone, Default)]
pub struct TeamProfile {
    pub name: Option<String>,
    pub country: Option<String>,
    pub founded: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerProfile {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birthdate: Option<String>,
    pub birthplace: Option<String>,
    pub birthcountry: Option<String>,
    pub nationality: Option<String>,
    pub height_cm: Option<i64>,
    pub weight_kg: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CoachProfile {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birthdate: Option<String>,
    pub birthplace: Option<String>,
    pub birthcountry: Option<String>,
    pub nationality: Option<String>,
}

/// Operator-supplied facts for a venue the feed cannot describe. Loaded from
/// a sidecar file keyed by venue name; replaces the old practice of prompting
/// at the terminal mid-run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueDetails {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub capacity: Option<i64>,
    pub surface: Option<String>,
    pub timezone: Option<String>,
}

/// Countries are pre-seeded reference data: fuzzy lookup only, no insertion.
/// `None` means no match was attempted or nothing matched; the caller keeps
/// the foreign key NULL.
pub fn resolve_country_code(
    conn: &Connection,
    raw: Option<&str>,
) -> Result<Option<String>, ResolveError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let candidates = candidate_names(raw);
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut stmt = conn.prepare("SELECT name, code FROM country")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut by_name: HashMap<String, String> = HashMap::new();
    for row in rows {
        let (name, code) = row?;
        by_name.insert(normalize_label(&name), code);
    }

    let matched = match_candidates("country", raw, &candidates, &by_name)?;
    if matched.is_none() {
        warn!(
            "no country match for {raw:?} ({} candidates tried), leaving NULL",
            candidates.len()
        );
    }
    Ok(matched)
}

pub fn resolve_position(conn: &Connection, label: &str) -> Result<Resolution, ResolveError> {
    get_or_insert(
        conn,
        "position",
        label,
        "INSERT INTO position (label) VALUES (?1) ON CONFLICT(label) DO NOTHING",
        params![label],
        "SELECT id FROM position WHERE label = ?1",
        params![label],
    )
}

/// Referees arrive as one display string, "John A. Smith, England". Matching
/// runs the name through the candidate generator against the canonical
/// full-name column; a miss splits the name, maps the country, and appends.
pub fn resolve_referee(conn: &Connection, raw: Option<&str>) -> Result<Option<i64>, ResolveError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let mut parts = raw.splitn(2, ',');
    let name = parts.next().unwrap_or_default().trim();
    let country = parts.next().map(str::trim).filter(|s| !s.is_empty());
    if name.is_empty() {
        return Ok(None);
    }

    let candidates = candidate_names(name);
    let mut stmt = conn.prepare("SELECT fullname_norm, id FROM referee")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut by_name: HashMap<String, i64> = HashMap::new();
    for row in rows {
        let (fullname, id) = row?;
        by_name.insert(fullname, id);
    }
    if let Some(key) = match_candidates("referee", name, &candidates, &by_name)? {
        return Ok(Some(key));
    }

    info!("referee {name:?} not in the warehouse, adding");
    let Some((firstname, lastname)) = split_full_name(name) else {
        return Ok(None);
    };
    let countrycode = resolve_country_code(conn, country)?;
    let canonical = canonical_full_name(name);
    let resolution = get_or_insert(
        conn,
        "referee",
        name,
        "INSERT INTO referee (firstname, lastname, countrycode, fullname_norm)
         VALUES (?1, ?2, ?3, ?4) ON CONFLICT(fullname_norm) DO NOTHING",
        params![firstname, lastname, countrycode, canonical],
        "SELECT id FROM referee WHERE fullname_norm = ?1",
        params![canonical],
    )?;
    Ok(Some(resolution.key()))
}

/// Two disjoint venue paths. A venue carrying a provider id resolves by that
/// id alone, so later name changes don't fork it. An id-less venue matches by
/// exact name among the other id-less rows; inserting one needs
/// operator-supplied details and goes through enrichment.
pub fn resolve_venue(
    conn: &Connection,
    venue: &VenueRef,
    details: Option<&VenueDetails>,
    geocoder: &dyn Geocoder,
) -> Result<Resolution, ResolveError> {
    if let Some(external_id) = venue.external_id {
        let name = venue.name.clone().unwrap_or_default();
        return get_or_insert(
            conn,
            "venue",
            &name,
            "INSERT INTO venue (external_id, name, city) VALUES (?1, ?2, ?3)
             ON CONFLICT(external_id) DO NOTHING",
            params![external_id, name, venue.city],
            "SELECT id FROM venue WHERE external_id = ?1",
            params![external_id],
        );
    }

    let Some(name) = venue.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(ResolveError::MalformedPayload(
            "venue has neither an external id nor a name".to_string(),
        ));
    };

    // Operator-pinned names take precedence over the name scan.
    if let Some(key) = conn
        .query_row(
            "SELECT venue_id FROM venue_override WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
    {
        return Ok(Resolution::Existing(key));
    }

    if let Some(key) = conn
        .query_row(
            "SELECT id FROM venue WHERE external_id IS NULL AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
    {
        return Ok(Resolution::Existing(key));
    }

    let Some(details) = details else {
        return Err(ResolveError::ManualResolutionRequired {
            entity: "venue",
            label: name.to_string(),
        });
    };

    let countrycode = resolve_country_code(conn, details.country.as_deref())?;
    let city = details.city.clone().or_else(|| venue.city.clone());
    let full_address = [
        details.address.as_deref(),
        city.as_deref(),
        details.state.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");

    let coords = geocoder.geocode(&full_address);
    let timezone = details
        .timezone
        .as_deref()
        .and_then(normalize_timezone)
        .or_else(|| {
            coords.and_then(|(lat, lon)| {
                geocoder
                    .timezone_at(lat, lon)
                    .as_deref()
                    .and_then(normalize_timezone)
            })
        });
    let (latitude, longitude) = match coords {
        Some((lat, lon)) => (Some(lat), Some(lon)),
        None => (None, None),
    };

    get_or_insert(
        conn,
        "venue",
        name,
        "INSERT INTO venue (external_id, name, address, city, state, countrycode,
                            capacity, surface, latitude, longitude, timezone)
         VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(name) WHERE external_id IS NULL DO NOTHING",
        params![
            name,
            details.address,
            city,
            details.state,
            countrycode,
            details.capacity,
            details.surface,
            latitude,
            longitude,
            timezone,
        ],
        "SELECT id FROM venue WHERE external_id IS NULL AND name = ?1",
        params![name],
    )
}

pub fn resolve_team(
    conn: &Connection,
    external_id: i64,
    profiles: &dyn ProfileSource,
    cache: &mut XrefCache,
) -> Result<Resolution, ResolveError> {
    if let Some(key) = cache.team(external_id) {
        return Ok(Resolution::Existing(key));
    }
    if let Some(key) = conn
        .query_row(
            "SELECT id FROM team WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .optional()?
    {
        cache.record_team(external_id, key);
        return Ok(Resolution::Existing(key));
    }

    info!("team {external_id} not in the warehouse, fetching profile");
    let profile = profiles.team(external_id)?;
    let countrycode = resolve_country_code(conn, profile.country.as_deref())?;
    let founded_date = profile.founded.map(|year| format!("{year:04}-01-01"));
    let resolution = get_or_insert(
        conn,
        "team",
        &external_id.to_string(),
        "INSERT INTO team (external_id, name, countrycode, founded_date)
         VALUES (?1, ?2, ?3, ?4) ON CONFLICT(external_id) DO NOTHING",
        params![external_id, profile.name, countrycode, founded_date],
        "SELECT id FROM team WHERE external_id = ?1",
        params![external_id],
    )?;
    cache.record_team(external_id, resolution.key());
    Ok(resolution)
}

/// Leagues never auto-insert; an unknown id is an operator decision. The
/// round-override table is consulted first so competition-phase quirks can be
/// pinned as data.
pub fn resolve_league(
    conn: &Connection,
    external_id: i64,
    round: Option<&str>,
) -> Result<i64, ResolveError> {
    if let Some(round) = round
        && let Some(key) = conn
            .query_row(
                "SELECT league_id FROM league_round_override
                 WHERE league_external_id = ?1 AND round = ?2",
                params![external_id, round],
                |row| row.get(0),
            )
            .optional()?
    {
        return Ok(key);
    }

    conn.query_row(
        "SELECT id FROM league WHERE external_id = ?1",
        params![external_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(ResolveError::ManualResolutionRequired {
        entity: "league",
        label: external_id.to_string(),
    })
}

pub fn resolve_coach(
    conn: &Connection,
    external_id: i64,
    profiles: &dyn ProfileSource,
) -> Result<Resolution, ResolveError> {
    if let Some(key) = conn
        .query_row(
            "SELECT id FROM coach WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .optional()?
    {
        return Ok(Resolution::Existing(key));
    }

    info!("coach {external_id} not in the warehouse, fetching profile");
    let profile = profiles.coach(external_id)?;
    let birthcountrycode = resolve_country_code(conn, profile.birthcountry.as_deref())?;
    let nationality = resolve_country_code(conn, profile.nationality.as_deref())?;
    get_or_insert(
        conn,
        "coach",
        &external_id.to_string(),
        "INSERT INTO coach (external_id, firstname, lastname, birthdate, birthplace,
                            birthcountrycode, nationality)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON CONFLICT(external_id) DO NOTHING",
        params![
            external_id,
            profile.firstname,
            profile.lastname,
            profile.birthdate,
            profile.birthplace,
            birthcountrycode,
            nationality,
        ],
        "SELECT id FROM coach WHERE external_id = ?1",
        params![external_id],
    )
}

pub fn resolve_event_type(
    conn: &Connection,
    kind: &str,
    detail: Option<&str>,
) -> Result<Resolution, ResolveError> {
    // Unique indexes treat NULLs as distinct, so a missing detail is ''.
    let detail = detail.unwrap_or("");
    let label = if detail.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}/{detail}")
    };
    get_or_insert(
        conn,
        "event_type",
        &label,
        "INSERT INTO event_type (kind, detail) VALUES (?1, ?2)
         ON CONFLICT(kind, detail) DO NOTHING",
        params![kind, detail],
        "SELECT id FROM event_type WHERE kind = ?1 AND detail = ?2",
        params![kind, detail],
    )
}

pub fn resolve_formation(conn: &Connection, formation: &str) -> Result<Resolution, ResolveError> {
    get_or_insert(
        conn,
        "formation",
        formation,
        "INSERT INTO formation (formation) VALUES (?1) ON CONFLICT(formation) DO NOTHING",
        params![formation],
        "SELECT id FROM formation WHERE formation = ?1",
        params![formation],
    )
}

pub fn resolve_player(
    conn: &Connection,
    external_id: i64,
    profiles: &dyn ProfileSource,
    cache: &mut XrefCache,
) -> Result<Resolution, ResolveError> {
    if let Some(key) = cache.player(external_id) {
        return Ok(Resolution::Existing(key));
    }
    if let Some(key) = conn
        .query_row(
            "SELECT id FROM player WHERE external_id = ?1",
            params![external_id],
            |row| row.get(0),
        )
        .optional()?
    {
        cache.record_player(external_id, key);
        return Ok(Resolution::Existing(key));
    }

    info!("player {external_id} not in the warehouse, fetching profile");
    let profile = profiles.player(external_id)?;
    let birthcountrycode = resolve_country_code(conn, profile.birthcountry.as_deref())?;
    let nationality = resolve_country_code(conn, profile.nationality.as_deref())?;
    let resolution = get_or_insert(
        conn,
        "player",
        &external_id.to_string(),
        "INSERT INTO player (external_id, firstname, lastname, birthdate, birthplace,
                             birthcountrycode, nationality, height_cm, weight_kg)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) ON CONFLICT(external_id) DO NOTHING",
        params![
            external_id,
            profile.firstname,
            profile.lastname,
            profile.birthdate,
            profile.birthplace,
            birthcountrycode,
            nationality,
            profile.height_cm,
            profile.weight_kg,
        ],
        "SELECT id FROM player WHERE external_id = ?1",
        params![external_id],
    )?;
    cache.record_player(external_id, resolution.key());
    Ok(resolution)
}
