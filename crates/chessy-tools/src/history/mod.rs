//! Recent games from Lichess and Chess.com.

mod chesscom;
mod lichess;

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use thiserror::Error;

use chessy_core::pgn::{self, PgnGame};
use chessy_core::PgnError;

pub use chesscom::{parse_archives, parse_month};
pub use lichess::parse_ndjson;

pub const DEFAULT_LIMIT: usize = 10;
const USER_AGENT: &str = concat!("chessy/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("network error: {0}")]
    Network(String),
    #[error("user '{0}' not found")]
    NotFound(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Lichess,
    #[value(name = "chesscom")]
    ChessCom,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Lichess => f.write_str("Lichess"),
            Platform::ChessCom => f.write_str("Chess.com"),
        }
    }
}

/// One finished or ongoing game as listed by a platform.
#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub platform: Platform,
    pub white: String,
    pub black: String,
    /// PGN result token (`1-0`, `0-1`, `1/2-1/2`, `*`).
    pub result: String,
    /// `YYYY-MM-DD`, UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub pgn: String,
}

impl GameSummary {
    /// `3. alice vs bob (1-0)`
    pub fn label(&self, index: usize) -> String {
        format!("{index}. {} vs {} ({})", self.white, self.black, self.result)
    }

    pub fn game(&self) -> Result<PgnGame, PgnError> {
        pgn::parse(&self.pgn)
    }
}

pub fn client() -> Result<Client, HistoryError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| HistoryError::Network(e.to_string()))
}

/// Up to `limit` most recent games of `username`, newest first.
pub fn fetch_recent_games(
    client: &Client,
    platform: Platform,
    username: &str,
    limit: usize,
) -> Result<Vec<GameSummary>, HistoryError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(HistoryError::NotFound(String::new()));
    }
    log::info!("fetching up to {limit} games of {username} from {platform}");
    let games = match platform {
        Platform::Lichess => lichess::fetch(client, username, limit)?,
        Platform::ChessCom => chesscom::fetch(client, username, limit)?,
    };
    log::info!("fetched {} games", games.len());
    Ok(games)
}

/// GET with retries on connection errors and timeouts. 404 is `NotFound`.
fn get(client: &Client, url: &str, accept: &str, username: &str) -> Result<Response, HistoryError> {
    let mut attempt = 1;
    let res = loop {
        match client.get(url).header(reqwest::header::ACCEPT, accept).send() {
            Ok(res) => break res,
            Err(e) if (e.is_connect() || e.is_timeout()) && attempt < MAX_ATTEMPTS => {
                log::warn!("GET {url} failed (attempt {attempt}), retrying: {e}");
                attempt += 1;
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(HistoryError::Network(format!("GET {url}: {e}"))),
        }
    };
    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        return Err(HistoryError::NotFound(username.to_string()));
    }
    if !status.is_success() {
        return Err(HistoryError::Network(format!("HTTP {status} for {url}")));
    }
    Ok(res)
}

fn get_text(client: &Client, url: &str, accept: &str, username: &str) -> Result<String, HistoryError> {
    get(client, url, accept, username)?
        .text()
        .map_err(|e| HistoryError::Network(format!("read body: {url}: {e}")))
}

fn format_date(timestamp_ms: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map(|d| d.format("%Y-%m-%d").to_string())
}
