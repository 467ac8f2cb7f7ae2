//! Review mode: navigation, analysis scheduling and result reconciliation.

pub mod reconciler;
pub mod report;
pub mod request;
pub mod session;

pub use reconciler::{EvalDisplay, Reconciled, Reconciler};
pub use report::{GameReport, MoveReport, analyse_game};
pub use request::{AnalysisRequest, AnalysisResult, EngineMessage, RequestState};
pub use session::{ReviewConfig, ReviewSession, UiEvent};
