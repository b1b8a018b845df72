//! Ratatui front-end. `app` owns the state machine and rendering, `terminal`
//! owns the raw-mode event loop, and the remaining modules hold the dialog and
//! screen state those two share.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
