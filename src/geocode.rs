use log::warn;
use serde_json::Value;

use crate::http::{get_json_with_retry, http_client};

const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
const TIMEZONE_LOOKUP_URL: &str = "https://timeapi.io/api/TimeZone/coordinate";
const GEOCODER_USER_AGENT: &str = "fixture-warehouse/0.1 (venue enrichment)";

// Upstream feeds hand us US aliases, bare abbreviations, and Windows display
// names; the warehouse stores IANA zone names only.
const TZ_ALIASES: &[(&str, &str)] = &[
    ("america/new_york", "America/New_York"),
    ("us/eastern", "America/New_York"),
    ("us/central", "America/Chicago"),
    ("us/mountain", "America/Denver"),
    ("us/pacific", "America/Los_Angeles"),
    ("est", "America/New_York"),
    ("edt", "America/New_York"),
    ("cst", "America/Chicago"),
    ("cdt", "America/Chicago"),
    ("mst", "America/Denver"),
    ("mdt", "America/Denver"),
    ("pst", "America/Los_Angeles"),
    ("pdt", "America/Los_Angeles"),
    ("(utc-05:00) eastern time (us & canada)", "America/New_York"),
    ("(utc-06:00) central time (us & canada)", "America/Chicago"),
    ("(utc-07:00) mountain time (us & canada)", "America/Denver"),
    ("(utc-08:00) pacific time (us & canada)", "America/Los_Angeles"),
    ("eastern standard time", "America/New_York"),
    ("central standard time", "America/Chicago"),
    ("mountain standard time", "America/Denver"),
    ("pacific standard time", "America/Los_Angeles"),
];

/// External venue enrichment. Both lookups are best-effort: any failure maps
/// to `None` and the caller stores NULL instead of aborting the insert.
pub trait Geocoder {
    fn geocode(&self, address: &str) -> Option<(f64, f64)>;
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// Enrichment disabled: every lookup misses.
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    fn geocode(&self, _address: &str) -> Option<(f64, f64)> {
        None
    }

    fn timezone_at(&self, _latitude: f64, _longitude: f64) -> Option<String> {
        None
    }
}

pub struct HttpGeocoder {
    search_url: String,
    timezone_url: String,
}

impl HttpGeocoder {
    pub fn new() -> Self {
        Self {
            search_url: NOMINATIM_SEARCH_URL.to_string(),
            timezone_url: TIMEZONE_LOOKUP_URL.to_string(),
        }
    }

    pub fn with_endpoints(search_url: &str, timezone_url: &str) -> Self {
        Self {
            search_url: search_url.to_string(),
            timezone_url: timezone_url.to_string(),
        }
    }
}

impl Default for HttpGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Geocoder for HttpGeocoder {
    fn geocode(&self, address: &str) -> Option<(f64, f64)> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        let client = http_client().ok()?;
        let query = [("q", address), ("format", "jsonv2"), ("limit", "1")];
        let value = match get_json_with_retry(
            client,
            &self.search_url,
            &query,
            &[("User-Agent", GEOCODER_USER_AGENT)],
        ) {
            Ok(value) => value,
            Err(err) => {
                warn!("geocoding {address:?} failed: {err}");
                return None;
            }
        };
        let hit = value.as_array()?.first()?;
        let latitude = as_f64_loose(hit.get("lat")?)?;
        let longitude = as_f64_loose(hit.get("lon")?)?;
        Some((latitude, longitude))
    }

    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String> {
        let client = http_client().ok()?;
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let query = [("latitude", lat.as_str()), ("longitude", lon.as_str())];
        let value = match get_json_with_retry(
            client,
            &self.timezone_url,
            &query,
            &[("User-Agent", GEOCODER_USER_AGENT)],
        ) {
            Ok(value) => value,
            Err(err) => {
                warn!("timezone lookup at ({latitude}, {longitude}) failed: {err}");
                return None;
            }
        };
        value
            .get("timeZone")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Map a timezone string to its IANA name where an alias is known; unknown
/// strings pass through untouched.
pub fn normalize_timezone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let key = trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if let Some((_, iana)) = TZ_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return Some((*iana).to_string());
    }
    Some(trimmed.to_string())
}

fn as_f64_loose(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}
