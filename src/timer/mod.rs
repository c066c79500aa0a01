pub mod controller;
pub mod state;

pub use controller::{CountdownController, CountdownSnapshot};
pub use state::{format_mmss, CountdownPhase, CountdownState, DEFAULT_FOCUS_DURATION};
