use crate::error::SplitsError;
use crate::orchestrator::{Session, SessionEvent};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub const TAB_TIMER: usize = 0;
pub const TAB_PREVIEW: usize = 1;
pub const TAB_HELP: usize = 2;
const TAB_COUNT: usize = 3;

/// UI-only state. The timer itself lives in the `Session`.
pub struct UiState {
    pub tab: usize,
    pub info: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_TIMER,
            info: "space: start".into(),
        }
    }
}

impl UiState {
    pub fn next_tab(&mut self) {
        self.tab = (self.tab + 1) % TAB_COUNT;
    }

    /// Turn the outcome of a session command into the status line.
    pub fn report(
        &mut self,
        session: &Session,
        res: Result<SessionEvent, SplitsError>,
        granularity: std::time::Duration,
    ) {
        match res {
            Ok(SessionEvent::Ignored) => {}
            Ok(SessionEvent::Started) => self.info = "Running. space: split".into(),
            Ok(SessionEvent::AwaitingSave) => self.info = "Save this run? y/n".into(),
            Ok(ev) => {
                let lines = crate::text_summary::event_lines(session, &ev, granularity);
                // The finish summary ends with a line-mode hint; keep the first two.
                self.info = lines
                    .into_iter()
                    .take(2)
                    .collect::<Vec<_>>()
                    .join("  ");
                if matches!(ev, SessionEvent::Finished(_)) {
                    self.info.push_str("  space: save prompt");
                }
            }
            Err(e) if e.is_retryable() => {
                self.info = format!("Save failed: {e}. y: retry  n: discard");
            }
            Err(e) => self.info = e.to_string(),
        }
    }
}

/// Green when at or ahead of the comparison, red when behind.
pub fn delta_style(delta: time::Duration) -> Style {
    if delta.is_positive() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Green)
    }
}

pub fn stat_line(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}:"), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::raw(value),
    ])
}
