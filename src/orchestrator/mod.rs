//! Session orchestration.
//!
//! This module owns the lifecycle of timed attempts (start/split/undo/reset) and the
//! post-run work of committing a finished run and refreshing the comparison baseline.
//! UI/CLI layers feed it commands and render what it holds.

mod controller;
mod post_process;

pub(crate) use controller::{
    parse_line_command, run_controller, Session, SessionCommand, SessionEvent, UiCommand,
};
pub(crate) use post_process::load_profile;
