pub mod attempt;
pub mod interaction;
pub mod quiz;
pub mod surface;

pub use attempt::{AttemptRecord, FlowOutcome};
pub use quiz::{Question, Quiz};
pub use surface::{Control, SelectChoice, Surface, View};
