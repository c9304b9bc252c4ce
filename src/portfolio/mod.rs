pub mod position;
pub mod sizing;

pub use position::{Position, PositionStatus};
pub use sizing::PositionSizing;
