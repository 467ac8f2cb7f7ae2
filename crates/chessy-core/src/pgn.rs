//! PGN import and export.
//!
//! Only the main line is kept: comments, variations, NAGs and annotation
//! glyphs are skipped. SAN resolution is done by the rules adapter.

use std::fmt::Write as _;

use crate::error::{PgnError, RulesError};
use crate::position::Position;
use crate::timeline::Timeline;
use crate::types::Move;

/// Seven Tag Roster の順序と既定値。
const ROSTER: [(&str, &str); 7] = [
    ("Event", "?"),
    ("Site", "?"),
    ("Date", "????.??.??"),
    ("Round", "?"),
    ("White", "?"),
    ("Black", "?"),
    ("Result", "*"),
];

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

const LINE_WIDTH: usize = 80;

#[derive(Clone, Debug)]
pub struct PgnGame {
    pub tags: Vec<(String, String)>,
    pub initial: Position,
    pub moves: Vec<Move>,
}

impl PgnGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn white(&self) -> &str {
        self.tag("White").unwrap_or("?")
    }

    pub fn black(&self) -> &str {
        self.tag("Black").unwrap_or("?")
    }

    pub fn result(&self) -> &str {
        self.tag("Result").unwrap_or("*")
    }

    /// `White vs Black (Result)`
    pub fn title(&self) -> String {
        format!("{} vs {} ({})", self.white(), self.black(), self.result())
    }

    pub fn timeline(&self) -> Timeline {
        let mut timeline = Timeline::new(self.initial.clone());
        timeline.reset(self.moves.clone());
        timeline
    }
}

/// Parse the first game in `text`.
pub fn parse(text: &str) -> Result<PgnGame, PgnError> {
    parse_all(text)?.into_iter().next().ok_or(PgnError::Empty)
}

/// Parse every game in `text`.
pub fn parse_all(text: &str) -> Result<Vec<PgnGame>, PgnError> {
    let mut games = Vec::new();
    let mut tag_lines: Vec<&str> = Vec::new();
    let mut movetext = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            if !movetext.trim().is_empty() {
                games.push(build_game(&tag_lines, &movetext)?);
                tag_lines.clear();
                movetext.clear();
            }
            tag_lines.push(trimmed);
        } else if !trimmed.starts_with('%') {
            movetext.push_str(line);
            movetext.push('\n');
        }
    }
    if !tag_lines.is_empty() || !movetext.trim().is_empty() {
        games.push(build_game(&tag_lines, &movetext)?);
    }
    if games.is_empty() {
        return Err(PgnError::Empty);
    }
    Ok(games)
}

fn build_game(tag_lines: &[&str], movetext: &str) -> Result<PgnGame, PgnError> {
    let tags = tag_lines
        .iter()
        .map(|line| parse_tag(line))
        .collect::<Result<Vec<_>, _>>()?;
    let initial = match tags.iter().find(|(k, _)| k == "FEN") {
        Some((_, fen)) => Position::from_fen(fen).map_err(PgnError::Setup)?,
        None => Position::startpos(),
    };
    let tokens = tokenize(movetext)?;
    if tags.is_empty() && tokens.is_empty() {
        return Err(PgnError::Empty);
    }
    let mut position = initial.clone();
    let mut moves = Vec::with_capacity(tokens.len());
    for (ply, token) in tokens.into_iter().enumerate() {
        let mv = position.parse_san(&token).map_err(|source| PgnError::Move {
            ply: ply + 1,
            token: token.clone(),
            source,
        })?;
        position = position.apply(&mv).map_err(|source| PgnError::Move {
            ply: ply + 1,
            token,
            source,
        })?;
        moves.push(mv);
    }
    Ok(PgnGame {
        tags,
        initial,
        moves,
    })
}

/// `[Name "Value"]`
fn parse_tag(line: &str) -> Result<(String, String), PgnError> {
    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.trim_end().strip_suffix(']'))
        .ok_or(PgnError::Unterminated("tag"))?;
    let (name, rest) = inner.trim().split_once(char::is_whitespace).ok_or(PgnError::Unterminated("tag"))?;
    let rest = rest.trim();
    let body = rest
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or(PgnError::Unterminated("tag value"))?;
    let value = body.replace("\\\"", "\"").replace("\\\\", "\\");
    Ok((name.to_string(), value))
}

/// SAN tokens of the main line.
fn tokenize(movetext: &str) -> Result<Vec<String>, PgnError> {
    let mut tokens = Vec::new();
    let mut chars = movetext.chars();
    let mut word = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                flush(&mut word, &mut tokens);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(PgnError::Unterminated("comment"));
                }
            }
            ';' => {
                flush(&mut word, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut word, &mut tokens);
                let mut depth = 1usize;
                while depth > 0 {
                    match chars.next() {
                        Some('(') => depth += 1,
                        Some(')') => depth -= 1,
                        Some('{') => {
                            if !chars.by_ref().any(|c| c == '}') {
                                return Err(PgnError::Unterminated("comment"));
                            }
                        }
                        Some(_) => {}
                        None => return Err(PgnError::Unterminated("variation")),
                    }
                }
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

fn flush(word: &mut String, tokens: &mut Vec<String>) {
    if let Some(san) = clean_token(word) {
        tokens.push(san);
    }
    word.clear();
}

/// 手番号・NAG・結果・注釈記号を取り除き、SAN だけを返す。
fn clean_token(word: &str) -> Option<String> {
    if word.is_empty() || word.starts_with('$') || RESULTS.contains(&word) {
        return None;
    }
    // "12." / "12..." / "12.e4"
    let san = word.trim_start_matches(|c: char| c.is_ascii_digit());
    let san = if san.len() < word.len() && san.starts_with('.') {
        san.trim_start_matches('.')
    } else {
        word
    };
    let san = san.trim_end_matches(['!', '?']);
    if san.is_empty() {
        return None;
    }
    let san = match san.trim_end_matches(['+', '#']) {
        "0-0" => san.replacen("0-0", "O-O", 1),
        "0-0-0" => san.replacen("0-0-0", "O-O-O", 1),
        _ => san.to_string(),
    };
    Some(san)
}

/// Export `timeline` with `tags`. The roster tags come first in their
/// standard order, defaults fill the gaps.
pub fn export(tags: &[(String, String)], timeline: &Timeline) -> Result<String, RulesError> {
    let lookup = |name: &str| {
        tags.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };
    let result = match lookup("Result") {
        Some(r) if r != "*" => r.to_string(),
        _ => timeline
            .terminal()?
            .map_or("*".to_string(), |t| t.result_tag().to_string()),
    };

    let mut out = String::new();
    for (name, default) in ROSTER {
        let value = if name == "Result" {
            result.as_str()
        } else {
            lookup(name).unwrap_or(default)
        };
        let _ = writeln!(out, "[{name} \"{}\"]", escape(value));
    }
    let standard_start = timeline.initial() == &Position::startpos();
    for (name, value) in tags {
        let is_roster = ROSTER.iter().any(|(r, _)| r.eq_ignore_ascii_case(name));
        let is_setup = name == "FEN" || name == "SetUp";
        if !is_roster && !is_setup {
            let _ = writeln!(out, "[{name} \"{}\"]", escape(value));
        }
    }
    if !standard_start {
        let _ = writeln!(out, "[SetUp \"1\"]");
        let _ = writeln!(out, "[FEN \"{}\"]", timeline.initial().fen());
    }
    out.push('\n');

    let mut words = Vec::with_capacity(timeline.len() * 3 / 2 + 1);
    let mut position = timeline.initial().clone();
    for (idx, mv) in timeline.moves().iter().enumerate() {
        let number = position.fullmove_number();
        match position.turn() {
            crate::types::Color::White => words.push(format!("{number}.")),
            crate::types::Color::Black if idx == 0 => words.push(format!("{number}...")),
            crate::types::Color::Black => {}
        }
        words.push(position.san(mv)?);
        position = position.apply(mv)?;
    }
    words.push(result);

    let mut line_len = 0;
    for word in words {
        if line_len > 0 && line_len + 1 + word.len() > LINE_WIDTH {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += word.len();
        out.push_str(&word);
    }
    out.push('\n');
    Ok(out)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
