//! Run lifecycle controller.
//!
//! Owns the live session (route, comparison profile, timer state) and applies commands
//! from presentation layers. Exactly one loop drives a `Session`; renderers only borrow it.

use super::post_process::{commit_finished_run, load_profile};
use crate::cli::OutputLine;
use crate::comparison::ComparisonProfile;
use crate::error::SplitsError;
use crate::model::{CategorySummary, Route, RunId};
use crate::storage::SplitStore;
use crate::timer::{AdvanceOutcome, LiveRun, RunStatus, SplitRecord};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Commands that change the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    /// Start the timer, split, or ask to save once finished.
    Advance,
    Revert,
    Reset,
    Save,
    Discard,
}

/// Commands emitted by UI layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UiCommand {
    Session(SessionCommand),
    Quit,
}

/// What a command did, for presentation layers to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    Started,
    Split(SplitRecord),
    Finished(SplitRecord),
    /// The finished run is waiting for a save/discard decision.
    AwaitingSave,
    Saved(RunId),
    Discarded,
    Reverted,
    Reset,
    /// Nothing to do in the current state (e.g. revert on the first segment).
    Ignored,
}

pub(crate) struct Session {
    store: Box<dyn SplitStore + Send>,
    route: Route,
    category: Option<CategorySummary>,
    profile: ComparisonProfile,
    run: LiveRun,
    threshold: Duration,
    auto_save: bool,
    awaiting_save: bool,
}

impl Session {
    pub(crate) fn open(
        store: Box<dyn SplitStore + Send>,
        route: Route,
        threshold: Duration,
        auto_save: bool,
    ) -> Result<Self> {
        let profile = load_profile(store.as_ref(), &route)?;
        let category = store
            .category(route.category_id)
            .context("load category summary")?;
        info!(
            route = %route.name,
            segments = route.len(),
            runs = profile.total_runs,
            "session opened"
        );
        let run = LiveRun::new(route.len(), &profile);
        Ok(Self {
            store,
            route,
            category,
            profile,
            run,
            threshold,
            auto_save,
            awaiting_save: false,
        })
    }

    pub(crate) fn route(&self) -> &Route {
        &self.route
    }

    pub(crate) fn category(&self) -> Option<&CategorySummary> {
        self.category.as_ref()
    }

    pub(crate) fn profile(&self) -> &ComparisonProfile {
        &self.profile
    }

    pub(crate) fn run(&self) -> &LiveRun {
        &self.run
    }

    pub(crate) fn threshold(&self) -> Duration {
        self.threshold
    }

    pub(crate) fn awaiting_save(&self) -> bool {
        self.awaiting_save
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &dyn SplitStore {
        self.store.as_ref()
    }

    /// Apply one command at `now`.
    ///
    /// A failed save returns `PersistenceFailure` and keeps the finished run, so the
    /// caller can offer another `Save` or a `Discard`.
    pub(crate) fn handle(
        &mut self,
        cmd: SessionCommand,
        now: Instant,
    ) -> Result<SessionEvent, SplitsError> {
        match cmd {
            SessionCommand::Advance => self.advance(now),
            SessionCommand::Revert => {
                if self.awaiting_save || !self.run.revert(now) {
                    return Ok(SessionEvent::Ignored);
                }
                debug!(segment = self.run.segment_index(), "split reverted");
                Ok(SessionEvent::Reverted)
            }
            SessionCommand::Reset => {
                self.run.reset(now)?;
                self.awaiting_save = false;
                info!(route = %self.route.name, "run reset");
                Ok(SessionEvent::Reset)
            }
            SessionCommand::Save => {
                if !self.awaiting_save {
                    return Err(SplitsError::InvalidTransition {
                        op: "save",
                        status: self.run.status().as_str(),
                    });
                }
                self.save()
            }
            SessionCommand::Discard => {
                if !self.awaiting_save {
                    return Ok(SessionEvent::Ignored);
                }
                info!(
                    route = %self.route.name,
                    total = ?self.run.finalized_total(),
                    "finished run discarded"
                );
                self.next_attempt();
                Ok(SessionEvent::Discarded)
            }
        }
    }

    /// End the session. Returns `true` when a finished run was left unsaved; that
    /// run is gone, so it is logged at `warn`.
    pub(crate) fn close(&self) -> bool {
        let unsaved = self.run.is_finished();
        if unsaved {
            warn!(
                route = %self.route.name,
                total = ?self.run.finalized_total(),
                awaiting_save = self.awaiting_save,
                "session closed with an unsaved finished run"
            );
        } else {
            info!(route = %self.route.name, "session closed");
        }
        unsaved
    }

    fn advance(&mut self, now: Instant) -> Result<SessionEvent, SplitsError> {
        if self.run.status() == RunStatus::NotStarted {
            self.run.start(now)?;
            info!(route = %self.route.name, "run started");
            return Ok(SessionEvent::Started);
        }
        match self.run.advance(&self.profile, now)? {
            AdvanceOutcome::Split(record) => {
                debug!(
                    segment = record.index,
                    segment_time = ?record.segment_time,
                    split_time = ?record.split_time,
                    gold = record.time_save.is_some(),
                    "split"
                );
                Ok(SessionEvent::Split(record))
            }
            AdvanceOutcome::Finished(record) => {
                info!(
                    route = %self.route.name,
                    total = ?record.split_time,
                    "run finished"
                );
                Ok(SessionEvent::Finished(record))
            }
            AdvanceOutcome::ReadyToCommit if self.auto_save => {
                self.awaiting_save = true;
                self.save()
            }
            AdvanceOutcome::ReadyToCommit => {
                self.awaiting_save = true;
                Ok(SessionEvent::AwaitingSave)
            }
        }
    }

    fn save(&mut self) -> Result<SessionEvent, SplitsError> {
        let run_id = match commit_finished_run(self.store.as_mut(), &self.route, &self.run) {
            Ok(id) => id,
            Err(e) => {
                warn!(route = %self.route.name, error = %e, "saving run failed");
                return Err(e);
            }
        };
        info!(route = %self.route.name, run_id, "run saved");

        // The run is already on disk; a failed refresh only leaves a stale baseline.
        match load_profile(self.store.as_ref(), &self.route) {
            Ok(profile) => self.profile = profile,
            Err(e) => warn!(error = %format!("{e:#}"), "reloading comparison failed"),
        }
        match self.store.category(self.route.category_id) {
            Ok(category) => self.category = category,
            Err(e) => warn!(error = %format!("{e:#}"), "reloading category failed"),
        }
        self.next_attempt();
        Ok(SessionEvent::Saved(run_id))
    }

    fn next_attempt(&mut self) {
        self.run = LiveRun::new(self.route.len(), &self.profile);
        self.awaiting_save = false;
    }
}

/// Parse one line of line-mode input. An empty line advances.
pub(crate) fn parse_line_command(line: &str) -> Option<UiCommand> {
    let cmd = match line.trim().to_ascii_lowercase().as_str() {
        "" => SessionCommand::Advance,
        "u" | "undo" => SessionCommand::Revert,
        "r" | "reset" => SessionCommand::Reset,
        "y" | "yes" => SessionCommand::Save,
        "n" | "no" => SessionCommand::Discard,
        "q" | "quit" => return Some(UiCommand::Quit),
        _ => return None,
    };
    Some(UiCommand::Session(cmd))
}

/// Drive a session from line-mode commands until quit or end of input.
///
/// The status line is only redrawn while the timer runs; otherwise the ticker branch
/// stays pending so an idle session does not spin.
pub(crate) async fn run_controller(
    mut session: Session,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
    out_tx: UnboundedSender<OutputLine>,
    refresh: Duration,
) -> Result<()> {
    let granularity = refresh;
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let running = session.run().status() == RunStatus::Running;
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let cmd = match cmd {
                    Some(UiCommand::Session(cmd)) => cmd,
                    Some(UiCommand::Quit) | None => break,
                };
                let now = Instant::now();
                match session.handle(cmd, now) {
                    Ok(event) => {
                        let lines = crate::text_summary::event_lines(&session, &event, granularity);
                        for line in lines {
                            let _ = out_tx.send(OutputLine::Stdout(line));
                        }
                    }
                    Err(e) if e.is_retryable() => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "Save failed: {e}. Enter y to retry or n to discard."
                        )));
                    }
                    Err(e) => {
                        let _ = out_tx.send(OutputLine::Stderr(e.to_string()));
                    }
                }
            }
            _ = async {
                if running {
                    ticker.tick().await;
                } else {
                    futures::future::pending::<()>().await
                }
            } => {
                let line = crate::text_summary::status_line(&session, Instant::now(), granularity);
                let _ = out_tx.send(OutputLine::Status(line));
            }
        }
    }

    if session.close() {
        let _ = out_tx.send(OutputLine::Stderr(
            "Finished run was not saved.".to_string(),
        ));
    }
    Ok(())
}
