use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::resolve::ResolveError;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

static CLIENT: OnceCell<Client> = OnceCell::new();

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("upstream returned http {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("unparseable response body: {0}")]
    Malformed(String),
}

impl From<HttpError> for ResolveError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Transient(message) => ResolveError::Transient(message),
            HttpError::Upstream { status, message } => {
                ResolveError::Configuration(format!("http {status}: {message}"))
            }
            HttpError::Malformed(message) => ResolveError::MalformedPayload(message),
        }
    }
}

pub fn http_client() -> Result<&'static Client> {
    http_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// The first caller's timeout wins; the client is shared for the process.
pub fn http_client_with_timeout(timeout: Duration) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")
    })
}

pub fn get_json_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    headers: &[(&str, &str)],
) -> Result<Value, HttpError> {
    let mut last_err = String::new();
    for attempt in 1..=RETRY_ATTEMPTS {
        if attempt > 1 {
            thread::sleep(Duration::from_millis(
                RETRY_BASE_DELAY_MS * u64::from(attempt - 1),
            ));
        }

        let mut req = client.get(url);
        if !query.is_empty() {
            req = req.query(&query);
        }
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = match req.send() {
            Ok(resp) => resp,
            Err(err) if err.is_timeout() || err.is_connect() => {
                last_err = err.to_string();
                warn!("request to {url} failed (attempt {attempt}/{RETRY_ATTEMPTS}): {last_err}");
                continue;
            }
            Err(err) => return Err(HttpError::Transient(err.to_string())),
        };

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            last_err = format!("http {status}");
            warn!("upstream busy at {url} (attempt {attempt}/{RETRY_ATTEMPTS}): {last_err}");
            continue;
        }

        let body = match resp.text() {
            Ok(body) => body,
            Err(err) => {
                last_err = err.to_string();
                warn!("failed reading body from {url} (attempt {attempt}/{RETRY_ATTEMPTS})");
                continue;
            }
        };
        if !status.is_success() {
            return Err(HttpError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }
        return serde_json::from_str::<Value>(body.trim())
            .map_err(|err| HttpError::Malformed(format!("{url}: {err}")));
    }
    Err(HttpError::Transient(format!(
        "{url}: retries exhausted: {last_err}"
    )))
}
