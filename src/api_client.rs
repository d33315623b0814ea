use anyhow::Result;
use log::debug;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::Config;
use crate::entities::{CoachProfile, PlayerProfile, ProfileSource, TeamProfile};
use crate::http::{get_json_with_retry, http_client_with_timeout};
use crate::payload::{FixtureBundle, as_i64_any, first_response_item, parse_leading_int};
use crate::resolve::ResolveError;

const NULL: &Value = &Value::Null;

/// Client for the upstream sports-data API. Every call goes through the
/// shared blocking client with its timeout and the bounded retry policy.
pub struct ApiClient {
    client: &'static Client,
    base: String,
    key: String,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client_with_timeout(cfg.request_timeout)?,
            base: cfg.api_base.trim_end_matches('/').to_string(),
            key: cfg.api_key.clone(),
        })
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ResolveError> {
        let url = format!("{}{path}", self.base);
        debug!("GET {url} {query:?}");
        get_json_with_retry(
            self.client,
            &url,
            query,
            &[("x-apisports-key", self.key.as_str())],
        )
        .map_err(ResolveError::from)
    }

    /// All five payloads the warehouse ingests for one fixture.
    pub fn fixture_bundle(&self, external_id: i64) -> Result<FixtureBundle, ResolveError> {
        let id = external_id.to_string();
        let fixture = self.get("/fixtures", &[("id", id.as_str())])?;
        let events = self.get("/fixtures/events", &[("fixture", id.as_str())])?;
        let statistics = self.get("/fixtures/statistics", &[("fixture", id.as_str())])?;
        let player_statistics = self.get("/fixtures/players", &[("fixture", id.as_str())])?;
        let lineups = self.get("/fixtures/lineups", &[("fixture", id.as_str())])?;
        Ok(FixtureBundle {
            external_id,
            fixture,
            events: Some(events),
            statistics: Some(statistics),
            player_statistics: Some(player_statistics),
            lineups: Some(lineups),
        })
    }
}

impl ProfileSource for ApiClient {
    fn team(&self, external_id: i64) -> Result<TeamProfile, ResolveError> {
        let id = external_id.to_string();
        let value = self.get("/teams", &[("id", id.as_str())])?;
        let item = first_response_item(&value).ok_or_else(|| {
            ResolveError::MalformedPayload(format!("no team profile for external id {external_id}"))
        })?;
        let team = item.get("team").unwrap_or(NULL);
        Ok(TeamProfile {
            name: str_field(team, "name"),
            country: str_field(team, "country"),
            founded: team.get("founded").and_then(as_i64_any),
        })
    }

    fn player(&self, external_id: i64) -> Result<PlayerProfile, ResolveError> {
        let id = external_id.to_string();
        let value = self.get("/players/profiles", &[("player", id.as_str())])?;
        let item = first_response_item(&value).ok_or_else(|| {
            ResolveError::MalformedPayload(format!(
                "no player profile for external id {external_id}"
            ))
        })?;
        let player = item.get("player").unwrap_or(NULL);
        let birth = player.get("birth").unwrap_or(NULL);
        Ok(PlayerProfile {
            firstname: str_field(player, "firstname"),
            lastname: str_field(player, "lastname"),
            birthdate: str_field(birth, "date"),
            birthplace: str_field(birth, "place"),
            birthcountry: str_field(birth, "country"),
            nationality: str_field(player, "nationality"),
            height_cm: parse_leading_int(player.get("height").and_then(Value::as_str)),
            weight_kg: parse_leading_int(player.get("weight").and_then(Value::as_str)),
        })
    }

    fn coach(&self, external_id: i64) -> Result<CoachProfile, ResolveError> {
        let id = external_id.to_string();
        let value = self.get("/coachs", &[("id", id.as_str())])?;
        let coach = first_response_item(&value).ok_or_else(|| {
            ResolveError::MalformedPayload(format!(
                "no coach profile for external id {external_id}"
            ))
        })?;
        let birth = coach.get("birth").unwrap_or(NULL);
        Ok(CoachProfile {
            firstname: str_field(coach, "firstname"),
            lastname: str_field(coach, "lastname"),
            birthdate: str_field(birth, "date"),
            birthplace: str_field(birth, "place"),
            birthcountry: str_field(birth, "country"),
            nationality: str_field(coach, "nationality"),
        })
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
