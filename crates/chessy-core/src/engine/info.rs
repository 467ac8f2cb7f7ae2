use std::collections::BTreeMap;

use crate::types::Score;

/// `info` 行1本分の解析結果。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub multipv: u32,
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub nps: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

impl InfoLine {
    /// Parse a UCI `info` line.
    ///
    /// Returns `None` for `info string …` and for lines that carry neither a
    /// score nor a PV (`currmove` progress reports and the like).
    pub fn parse(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().copied() != Some("info") {
            return None;
        }
        let mut info = InfoLine {
            multipv: 1,
            ..Default::default()
        };
        let mut cp = None;
        let mut mate = None;
        let mut i = 1;
        while i < tokens.len() {
            let next = tokens.get(i + 1).copied();
            match tokens[i] {
                "string" => return None,
                "multipv" => {
                    info.multipv = next.and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
                    i += 1;
                }
                "depth" => {
                    info.depth = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "seldepth" => {
                    info.seldepth = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "nodes" => {
                    info.nodes = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "time" => {
                    info.time_ms = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "nps" => {
                    info.nps = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "score" => {
                    let value = tokens.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                    match next {
                        Some("cp") => cp = value,
                        Some("mate") => mate = value,
                        _ => {}
                    }
                    i += 2;
                }
                "pv" => {
                    info.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                    break;
                }
                // lowerbound / upperbound and unknown keys are skipped
                _ => {}
            }
            i += 1;
        }
        info.score = Score::from_parts(cp, mate);
        if info.score.is_none() && info.pv.is_empty() {
            return None;
        }
        Some(info)
    }
}

/// 探索中に受け取った info を multipv ごとに保持する。
#[derive(Clone, Debug, Default)]
pub struct InfoTable {
    lines: BTreeMap<u32, InfoLine>,
}

impl InfoTable {
    /// Merge one raw engine line. Non-`info` lines are ignored.
    pub fn update_from_line(&mut self, line: &str) {
        let Some(info) = InfoLine::parse(line) else {
            return;
        };
        match self.lines.get_mut(&info.multipv) {
            Some(slot) => {
                slot.depth = info.depth.or(slot.depth);
                slot.seldepth = info.seldepth.or(slot.seldepth);
                slot.nodes = info.nodes.or(slot.nodes);
                slot.time_ms = info.time_ms.or(slot.time_ms);
                slot.nps = info.nps.or(slot.nps);
                slot.score = info.score.or(slot.score);
                if !info.pv.is_empty() {
                    slot.pv = info.pv;
                }
            }
            None => {
                self.lines.insert(info.multipv, info);
            }
        }
    }

    /// Forget lines from a previous search.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn primary(&self) -> Option<&InfoLine> {
        self.lines.get(&1)
    }

    /// Lines ordered by multipv rank, limited to `multipv` entries.
    pub fn into_lines(self, multipv: u32) -> Vec<InfoLine> {
        self.lines
            .into_values()
            .filter(|l| l.multipv <= multipv.max(1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primary_line() {
        let info = InfoLine::parse(
            "info depth 10 seldepth 12 multipv 1 score cp 34 nodes 12345 nps 890 time 67 pv e2e4 e7e5",
        )
        .unwrap();
        assert_eq!(info.depth, Some(10));
        assert_eq!(info.seldepth, Some(12));
        assert_eq!(info.nodes, Some(12_345));
        assert_eq!(info.time_ms, Some(67));
        assert_eq!(info.nps, Some(890));
        assert_eq!(info.score, Some(Score::Cp(34)));
        assert_eq!(info.pv, vec!["e2e4".to_string(), "e7e5".to_string()]);
    }

    #[test]
    fn bounds_and_mate_scores() {
        let info = InfoLine::parse("info depth 20 score cp 50 lowerbound nodes 10 pv d2d4").unwrap();
        assert_eq!(info.score, Some(Score::Cp(50)));
        assert_eq!(info.nodes, Some(10));

        let info = InfoLine::parse("info depth 5 multipv 2 score mate -3 pv h7h6").unwrap();
        assert_eq!(info.multipv, 2);
        assert_eq!(info.score, Some(Score::Mate(-3)));
    }

    #[test]
    fn skips_strings_and_progress_lines() {
        assert!(InfoLine::parse("info string NNUE evaluation enabled").is_none());
        assert!(InfoLine::parse("info depth 12 currmove e2e4 currmovenumber 1").is_none());
        assert!(InfoLine::parse("bestmove e2e4").is_none());
    }

    #[test]
    fn table_keeps_latest_line_per_multipv() {
        let mut table = InfoTable::default();
        table.update_from_line("info depth 8 multipv 1 score cp 20 pv e2e4 e7e5");
        table.update_from_line("info depth 8 multipv 2 score cp 10 pv d2d4");
        table.update_from_line("info depth 9 multipv 1 score cp 25 pv g1f3");
        table.update_from_line("info depth 9 multipv 3 score cp 5 pv c2c4");
        assert_eq!(table.primary().unwrap().depth, Some(9));

        let lines = table.into_lines(2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].score, Some(Score::Cp(25)));
        assert_eq!(lines[0].pv, vec!["g1f3".to_string()]);
        assert_eq!(lines[1].multipv, 2);
    }
}
