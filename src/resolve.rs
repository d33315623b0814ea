use std::collections::HashMap;

use log::debug;
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

/// How an entity key came to be known: found in the reference table, or
/// appended to it during this resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Existing(i64),
    Inserted(i64),
}

impl Resolution {
    pub fn key(self) -> i64 {
        match self {
            Resolution::Existing(key) | Resolution::Inserted(key) => key,
        }
    }

    pub fn was_inserted(self) -> bool {
        matches!(self, Resolution::Inserted(_))
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ambiguous match for {entity} {label:?}: rows {matches:?}")]
    AmbiguousMatch {
        entity: &'static str,
        label: String,
        matches: Vec<String>,
    },
    #[error("{entity} {label:?} requires manual resolution")]
    ManualResolutionRequired { entity: &'static str, label: String },
    #[error("transient i/o failure: {0}")]
    Transient(String),
    #[error("constraint violation on {entity} {label:?}: {message}")]
    ConstraintViolation {
        entity: &'static str,
        label: String,
        message: String,
    },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Try every candidate against a (normalized name -> key) projection. Zero
/// hits is "not found"; hits on more than one distinct row are an error, not
/// a first-row-wins pick.
pub fn match_candidates<K>(
    entity: &'static str,
    label: &str,
    candidates: &[String],
    table: &HashMap<String, K>,
) -> Result<Option<K>, ResolveError>
where
    K: Clone + PartialEq + ToString,
{
    let mut found: Vec<K> = Vec::new();
    for candidate in candidates {
        if let Some(key) = table.get(candidate)
            && !found.iter().any(|existing| existing == key)
        {
            found.push(key.clone());
        }
    }
    match found.len() {
        0 => Ok(None),
        1 => Ok(Some(found.remove(0))),
        _ => Err(ResolveError::AmbiguousMatch {
            entity,
            label: label.to_string(),
            matches: found.iter().map(ToString::to_string).collect(),
        }),
    }
}

/// Atomic insert-or-fetch on a natural key. The insert statement must carry
/// `ON CONFLICT ... DO NOTHING` on that key and the select must read the key
/// column back by it; a concurrent writer landing first turns our insert into
/// a no-op and the select still finds the row.
pub fn get_or_insert<I, S>(
    conn: &Connection,
    entity: &'static str,
    label: &str,
    insert_sql: &str,
    insert_params: I,
    select_sql: &str,
    select_params: S,
) -> Result<Resolution, ResolveError>
where
    I: rusqlite::Params,
    S: rusqlite::Params,
{
    let inserted = conn.execute(insert_sql, insert_params).map_err(|err| {
        // A conflict on the natural key is absorbed by DO NOTHING; anything
        // still surfacing here (foreign key, check) is a real violation.
        if is_constraint_violation(&err) {
            ResolveError::ConstraintViolation {
                entity,
                label: label.to_string(),
                message: err.to_string(),
            }
        } else {
            ResolveError::Db(err)
        }
    })?;
    let key = conn
        .query_row(select_sql, select_params, |row| row.get::<_, i64>(0))
        .optional()?
        .ok_or_else(|| ResolveError::ConstraintViolation {
            entity,
            label: label.to_string(),
            message: "row missing after insert-or-ignore".to_string(),
        })?;
    if inserted > 0 {
        debug!("{entity} {label:?} inserted with key {key}");
        Ok(Resolution::Inserted(key))
    } else {
        Ok(Resolution::Existing(key))
    }
}

/// Per-run map from upstream external ids to warehouse keys, for the entities
/// referenced many times within one ingestion run. Never persisted; each run
/// starts cold and warms from the reference tables.
#[derive(Debug, Default)]
pub struct XrefCache {
    teams: HashMap<i64, i64>,
    players: HashMap<i64, i64>,
    warmed: bool,
}

impl XrefCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warm(&mut self, conn: &Connection) -> Result<(), ResolveError> {
        if self.warmed {
            return Ok(());
        }
        self.teams = external_id_map(conn, "SELECT external_id, id FROM team")?;
        self.players = external_id_map(conn, "SELECT external_id, id FROM player")?;
        self.warmed = true;
        debug!(
            "xref cache warmed: {} teams, {} players",
            self.teams.len(),
            self.players.len()
        );
        Ok(())
    }

    pub fn team(&self, external_id: i64) -> Option<i64> {
        self.teams.get(&external_id).copied()
    }

    pub fn player(&self, external_id: i64) -> Option<i64> {
        self.players.get(&external_id).copied()
    }

    pub fn record_team(&mut self, external_id: i64, key: i64) {
        self.teams.insert(external_id, key);
    }

    pub fn record_player(&mut self, external_id: i64, key: i64) {
        self.players.insert(external_id, key);
    }
}

fn external_id_map(conn: &Connection, sql: &str) -> Result<HashMap<i64, i64>, ResolveError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    let mut out = HashMap::new();
    for row in rows {
        let (external_id, key) = row?;
        out.insert(external_id, key);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ResolveError, match_candidates};

    #[test]
    fn no_hit_is_not_an_error() {
        let table: HashMap<String, i64> = HashMap::new();
        let out = match_candidates("country", "Narnia", &["narnia".to_string()], &table);
        assert!(matches!(out, Ok(None)));
    }

    #[test]
    fn multiple_candidates_one_row_is_a_single_match() {
        let mut table = HashMap::new();
        table.insert("ivory coast".to_string(), 7i64);
        let candidates = vec!["cote d'ivoire".to_string(), "ivory coast".to_string()];
        let out = match_candidates("country", "Côte d'Ivoire", &candidates, &table);
        assert!(matches!(out, Ok(Some(7))));
    }

    #[test]
    fn two_distinct_rows_are_ambiguous() {
        let mut table = HashMap::new();
        table.insert("congo".to_string(), 1i64);
        table.insert("congo dr".to_string(), 2i64);
        let candidates = vec!["congo".to_string(), "congo dr".to_string()];
        let out = match_candidates("country", "Congo", &candidates, &table);
        assert!(matches!(out, Err(ResolveError::AmbiguousMatch { .. })));
    }
}
