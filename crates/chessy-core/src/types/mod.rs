mod moves;
mod score;

pub use moves::Move;
pub use score::{MATE_EVAL, MATE_THRESHOLD, Score};
pub use shakmaty::Color;

/// 手番を "White" / "Black" で表す。
pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}
