use reqwest::blocking::Client;
use serde::Deserialize;

use super::{GameSummary, HistoryError, Platform, format_date, get_text};

const API_ROOT: &str = "https://lichess.org";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LichessGame {
    id: String,
    status: String,
    winner: Option<String>,
    created_at: Option<i64>,
    players: Players,
    pgn: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Players {
    white: Player,
    black: Player,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Player {
    user: Option<User>,
    ai_level: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct User {
    name: String,
}

impl Player {
    fn display_name(&self) -> String {
        match (&self.user, self.ai_level) {
            (Some(user), _) => user.name.clone(),
            (None, Some(level)) => format!("Stockfish level {level}"),
            (None, None) => "Unknown".to_string(),
        }
    }
}

fn result_token(game: &LichessGame) -> &'static str {
    match game.winner.as_deref() {
        Some("white") => "1-0",
        Some("black") => "0-1",
        _ => match game.status.as_str() {
            "draw" | "stalemate" | "outoftime" | "timeout" => "1/2-1/2",
            _ => "*",
        },
    }
}

pub(super) fn fetch(
    client: &Client,
    username: &str,
    limit: usize,
) -> Result<Vec<GameSummary>, HistoryError> {
    let url = format!("{API_ROOT}/api/games/user/{username}?max={limit}&pgnInJson=true");
    let body = get_text(client, &url, "application/x-ndjson", username)?;
    Ok(parse_ndjson(&body, limit))
}

/// One game per line. Lines that do not decode or carry no PGN are skipped.
pub fn parse_ndjson(body: &str, limit: usize) -> Vec<GameSummary> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<LichessGame>(line) {
            Ok(game) => Some(game),
            Err(e) => {
                log::debug!("skipping undecodable lichess line: {e}");
                None
            }
        })
        .filter_map(|game| {
            let result = result_token(&game).to_string();
            let pgn = game.pgn?;
            Some(GameSummary {
                platform: Platform::Lichess,
                white: game.players.white.display_name(),
                black: game.players.black.display_name(),
                result,
                date: game.created_at.and_then(format_date),
                url: (!game.id.is_empty()).then(|| format!("{API_ROOT}/{}", game.id)),
                pgn,
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        r#"{"id":"abc123","status":"mate","winner":"white","createdAt":1700000000000,"players":{"white":{"user":{"name":"alice"}},"black":{"user":{"name":"bob"}}},"pgn":"1. e4 e5 *"}"#,
        "\n",
        "not json\n",
        r#"{"id":"def456","status":"draw","players":{"white":{"aiLevel":3},"black":{"user":{"name":"alice"}}},"pgn":"1. d4 d5 *"}"#,
        "\n",
        r#"{"id":"nopgn","status":"started","players":{}}"#,
        "\n",
    );

    #[test]
    fn parses_games_and_skips_bad_lines() {
        let games = parse_ndjson(BODY, 10);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].white, "alice");
        assert_eq!(games[0].result, "1-0");
        assert_eq!(games[0].date.as_deref(), Some("2023-11-14"));
        assert_eq!(games[0].url.as_deref(), Some("https://lichess.org/abc123"));
        assert_eq!(games[1].white, "Stockfish level 3");
        assert_eq!(games[1].result, "1/2-1/2");
    }

    #[test]
    fn limit_is_respected() {
        assert_eq!(parse_ndjson(BODY, 1).len(), 1);
    }
}
