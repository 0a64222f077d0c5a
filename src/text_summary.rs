//! Text builders for CLI output.
//!
//! Formats human-readable lines for the preview, the route listing, the line-mode
//! status line and session events. The TUI reuses the preview lines.

use crate::comparison::ComparisonProfile;
use crate::format::{format_delta, format_duration, format_opt, PLACEHOLDER};
use crate::model::{CategorySummary, Route};
use crate::orchestrator::{Session, SessionEvent};
use crate::timer::{signed, RunStatus};
use std::time::{Duration, Instant};

/// Preview of a route before running it: title, bests and the per-segment baseline.
pub(crate) fn preview_lines(
    category: Option<&CategorySummary>,
    route: &Route,
    profile: &ComparisonProfile,
    granularity: Duration,
) -> Vec<String> {
    let mut lines = Vec::new();
    let category_name = category.map(|c| c.category.name.as_str()).unwrap_or(PLACEHOLDER);
    lines.push(format!("{category_name}: {}", route.name));

    let category_best = category.and_then(|c| c.best);
    match (category_best, profile.personal_best) {
        (None, None) => {
            lines.push("No runs yet".to_string());
        }
        (Some(cat), route_best) => {
            lines.push(format!("Category best: {}", format_duration(cat, granularity)));
            // Only worth showing when this route is not where the category best came from.
            if let Some(rb) = route_best.filter(|rb| *rb > cat) {
                lines.push(format!("Route best: {}", format_duration(rb, granularity)));
            }
        }
        (None, Some(rb)) => {
            lines.push(format!("Route best: {}", format_duration(rb, granularity)));
        }
    }
    if profile.has_history() {
        lines.push(format!(
            "Runs: {}  Sum of gold: {}",
            profile.total_runs,
            format_opt(profile.sum_of_gold, granularity)
        ));
    }
    lines.push(String::new());

    let headers = ["Segment", "Split Time", "Split Duration", "Gold", "Possible Save"];
    let mut rows: Vec<[String; 5]> = Vec::with_capacity(route.len());
    for (i, seg) in route.segments.iter().enumerate() {
        rows.push([
            seg.name.clone(),
            format_opt(profile.comparison_split(i), granularity),
            format_opt(profile.route_best(i), granularity),
            format_opt(profile.gold(i), granularity),
            format_opt(profile.time_save(i), granularity),
        ]);
    }
    lines.extend(table(&headers, &rows));
    lines
}

/// One line per category, with its routes indented beneath it.
pub(crate) fn list_lines(
    entries: &[(CategorySummary, Vec<Route>)],
    granularity: Duration,
) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No categories yet. Run without --list to create one.".to_string()];
    }
    let mut lines = Vec::new();
    for (summary, routes) in entries {
        lines.push(format!(
            "{} (runs: {}, best: {})",
            summary.category.name,
            summary.total_runs,
            format_opt(summary.best, granularity)
        ));
        for r in routes {
            lines.push(format!("  {} [{} segments]", r.name, r.len()));
        }
    }
    lines
}

/// Single status line for line mode, redrawn on every tick.
pub(crate) fn status_line(session: &Session, now: Instant, granularity: Duration) -> String {
    let run = session.run();
    let route = session.route();
    let snap = run.snapshot(now);
    let delta = run
        .live_delta(session.profile(), session.threshold(), now)
        .filter(|d| !d.suppress_display)
        .map(|d| format_delta(d.delta, granularity))
        .unwrap_or_default();
    let bpt = format_opt(run.project_best_possible_time(session.profile(), now), granularity);
    format!(
        "[{}/{}] {}  seg {}  total {}  {:>8}  bpt {}",
        snap.segment_index + 1,
        route.len(),
        route.segment_name(snap.segment_index),
        format_duration(snap.elapsed_in_segment, granularity),
        format_duration(snap.elapsed_total, granularity),
        delta,
        bpt
    )
}

/// Lines reporting what a session command did.
pub(crate) fn event_lines(
    session: &Session,
    event: &SessionEvent,
    granularity: Duration,
) -> Vec<String> {
    let route = session.route();
    let profile = session.profile();
    match event {
        SessionEvent::Started => vec![format!(
            "Started {}. Enter splits, u undoes, r resets, q quits.",
            route.name
        )],
        SessionEvent::Split(record) | SessionEvent::Finished(record) => {
            let mut line = format!(
                "{}: {} ({})",
                route.segment_name(record.index),
                format_duration(record.split_time, granularity),
                format_duration(record.segment_time, granularity),
            );
            if let Some(delta) = session.run().split_delta(profile, record.index) {
                line.push_str(&format!(" {}", format_delta(delta, granularity)));
            }
            if let Some(save) = record.time_save {
                line.push_str(&format!(
                    " new gold, -{}",
                    format_duration(save, granularity)
                ));
            }
            let mut lines = vec![line];
            if let SessionEvent::Finished(record) = event {
                lines.extend(finish_lines(profile, record.split_time, granularity));
            }
            lines
        }
        SessionEvent::AwaitingSave => vec!["Save this run? (y/n)".to_string()],
        SessionEvent::Saved(id) => vec![format!("Saved run {id}. Enter starts the next attempt.")],
        SessionEvent::Discarded => vec!["Run discarded.".to_string()],
        SessionEvent::Reverted => vec![format!(
            "Back to {}",
            route.segment_name(session.run().segment_index())
        )],
        SessionEvent::Reset => vec!["Reset. Timer restarted.".to_string()],
        SessionEvent::Ignored => Vec::new(),
    }
}

fn finish_lines(profile: &ComparisonProfile, total: Duration, granularity: Duration) -> Vec<String> {
    let mut lines = vec![format!("Finished: {}", format_duration(total, granularity))];
    match profile.personal_best {
        Some(pb) if total < pb => lines.push(format!(
            "New personal best by {}",
            format_duration(pb - total, granularity)
        )),
        Some(pb) => lines.push(format!(
            "Personal best: {} ({})",
            format_duration(pb, granularity),
            format_delta(signed(total) - signed(pb), granularity)
        )),
        None => lines.push("First run on this route".to_string()),
    }
    lines.push("Press Enter to save or discard.".to_string());
    lines
}

/// Status of the run as a short label, for headers.
pub(crate) fn status_label(status: RunStatus, awaiting_save: bool) -> &'static str {
    match (status, awaiting_save) {
        (_, true) => "save?",
        (RunStatus::NotStarted, _) => "ready",
        (RunStatus::Running, _) => "running",
        (RunStatus::Finished, _) => "finished",
    }
}

fn table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> Vec<String> {
    let mut widths = headers.map(|h| h.chars().count());
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (c, w))| {
                if i == 0 {
                    format!("{c:<w$}")
                } else {
                    format!("{c:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![render(headers.to_vec())];
    for row in rows {
        out.push(render(row.iter().map(String::as_str).collect()));
    }
    out
}
