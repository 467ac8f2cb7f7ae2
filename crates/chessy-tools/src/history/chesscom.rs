use reqwest::blocking::Client;
use serde::Deserialize;

use super::{GameSummary, HistoryError, Platform, format_date, get_text};

const API_ROOT: &str = "https://api.chess.com/pub/player";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Archives {
    archives: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Month {
    games: Vec<ChessComGame>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChessComGame {
    url: Option<String>,
    pgn: Option<String>,
    end_time: Option<i64>,
    white: Side,
    black: Side,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Side {
    username: String,
    result: String,
}

const DRAW_RESULTS: [&str; 7] = [
    "agreed",
    "repetition",
    "stalemate",
    "insufficient",
    "50move",
    "timevsinsufficient",
    "draw",
];

fn result_token(game: &ChessComGame) -> &'static str {
    if game.white.result == "win" {
        "1-0"
    } else if game.black.result == "win" {
        "0-1"
    } else if DRAW_RESULTS.contains(&game.white.result.as_str()) {
        "1/2-1/2"
    } else {
        "*"
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> Result<T, HistoryError> {
    serde_json::from_str(body).map_err(|e| HistoryError::Decode(format!("{what}: {e}")))
}

pub(super) fn fetch(
    client: &Client,
    username: &str,
    limit: usize,
) -> Result<Vec<GameSummary>, HistoryError> {
    // Chess.com のユーザー名は小文字で扱われる
    let username = username.to_lowercase();
    get_text(client, &format!("{API_ROOT}/{username}"), "application/json", &username)?;

    let body = get_text(
        client,
        &format!("{API_ROOT}/{username}/games/archives"),
        "application/json",
        &username,
    )?;
    let archives = parse_archives(&body)?;
    log::debug!("{username}: {} monthly archives", archives.len());

    let mut games = Vec::new();
    for archive in archives {
        if games.len() >= limit {
            break;
        }
        let body = get_text(client, &archive, "application/json", &username)?;
        games.extend(parse_month(&body, limit - games.len())?);
    }
    Ok(games)
}

/// Monthly archive URLs, newest first.
pub fn parse_archives(body: &str) -> Result<Vec<String>, HistoryError> {
    let mut archives: Archives = decode(body, "archives")?;
    archives.archives.reverse();
    Ok(archives.archives)
}

/// Up to `limit` games of one month, newest first.
pub fn parse_month(body: &str, limit: usize) -> Result<Vec<GameSummary>, HistoryError> {
    let month: Month = decode(body, "monthly archive")?;
    Ok(month
        .games
        .into_iter()
        .rev()
        .filter_map(|game| {
            let result = result_token(&game).to_string();
            let date = game.end_time.and_then(|t| format_date(t.saturating_mul(1000)));
            Some(GameSummary {
                platform: Platform::ChessCom,
                result,
                date,
                url: game.url,
                pgn: game.pgn?,
                white: game.white.username,
                black: game.black.username,
            })
        })
        .take(limit)
        .collect())
}
