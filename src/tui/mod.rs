mod help;
mod state;

use crate::cli::Cli;
use crate::format::{format_delta, format_duration, format_opt};
use crate::orchestrator::{Session, SessionCommand, UiCommand};
use crate::timer::RunStatus;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Terminal,
};
use state::{delta_style, stat_line, UiState, TAB_HELP, TAB_PREVIEW, TAB_TIMER};
use std::{io, time::Duration, time::Instant};

pub async fn run(session: Session, args: Cli) -> Result<()> {
    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    // The session moves with it: that thread is its only mutator.
    let ui_handle = std::thread::spawn(move || run_threaded(session, args));

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join())
        .await
        .context("join TUI thread")?;
    match join_res {
        Ok(res) => res,
        Err(_) => Err(anyhow::anyhow!("TUI thread panicked")),
    }
}

/// Map a key press to a command. Keys that only affect the UI return `None`.
fn key_command(modifiers: KeyModifiers, code: KeyCode) -> Option<UiCommand> {
    let cmd = match (modifiers, code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            return Some(UiCommand::Quit)
        }
        (_, KeyCode::Char(' ')) => SessionCommand::Advance,
        (_, KeyCode::Backspace) | (_, KeyCode::Char('u')) => SessionCommand::Revert,
        (_, KeyCode::Char('r')) => SessionCommand::Reset,
        (_, KeyCode::Char('y')) => SessionCommand::Save,
        (_, KeyCode::Char('n')) => SessionCommand::Discard,
        _ => return None,
    };
    Some(UiCommand::Session(cmd))
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(mut session: Session, args: Cli) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = args.refresh();
    let mut state = UiState::default();
    let mut last_tick = Instant::now();
    let mut dirty = true;

    let res = loop {
        if dirty || last_tick.elapsed() >= tick_rate {
            let now = Instant::now();
            terminal
                .draw(|f| draw(f.area(), f, &state, &session, now, tick_rate))
                .ok();
            last_tick = now;
            dirty = false;
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                let now = Instant::now();
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                dirty = true;
                match key_command(k.modifiers, k.code) {
                    Some(UiCommand::Quit) => {
                        session.close();
                        break Ok(());
                    }
                    Some(UiCommand::Session(cmd)) => {
                        state.tab = TAB_TIMER;
                        let res = session.handle(cmd, now);
                        state.report(&session, res, tick_rate);
                    }
                    None => match k.code {
                        KeyCode::Tab => state.next_tab(),
                        KeyCode::Char('?') => state.tab = TAB_HELP,
                        _ => {}
                    },
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn draw(
    area: Rect,
    f: &mut ratatui::Frame,
    state: &UiState,
    session: &Session,
    now: Instant,
    granularity: Duration,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Timer"),
        Line::from("Preview"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("splitwatch: {}", session.route().name)),
    )
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_TIMER => draw_timer(chunks[1], f, session, now, granularity),
        TAB_PREVIEW => draw_preview(chunks[1], f, session, granularity),
        _ => help::draw_help(chunks[1], f),
    }

    let label = crate::text_summary::status_label(session.run().status(), session.awaiting_save());
    let status = Paragraph::new(Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::raw(state.info.as_str()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn draw_timer(
    area: Rect,
    f: &mut ratatui::Frame,
    session: &Session,
    now: Instant,
    g: Duration,
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(area);

    let run = session.run();
    let profile = session.profile();
    let current = run.segment_index();
    let running = run.status() == RunStatus::Running;
    let live = run
        .live_delta(profile, session.threshold(), now)
        .filter(|d| !d.suppress_display);

    let rows: Vec<Row> = session
        .route()
        .segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            let committed = run.committed().get(i).copied().flatten();
            let (delta, segment, split, style) = match committed {
                Some(d) => {
                    let delta = run.split_delta(profile, i).map(|delta| {
                        Cell::from(format_delta(delta, g)).style(delta_style(delta))
                    });
                    (
                        delta,
                        format_duration(d, g),
                        format_opt(run.split_time(i), g),
                        Style::default(),
                    )
                }
                None if running && i == current => {
                    let delta =
                        live.map(|l| Cell::from(format_delta(l.delta, g)).style(delta_style(l.delta)));
                    (
                        delta,
                        format_duration(run.elapsed_in_segment(now), g),
                        format_duration(run.elapsed_total(now), g),
                        Style::default().add_modifier(Modifier::BOLD),
                    )
                }
                None => (
                    None,
                    format_opt(profile.route_best(i), g),
                    format_opt(profile.comparison_split(i), g),
                    Style::default().fg(Color::DarkGray),
                ),
            };
            Row::new(vec![
                Cell::from(seg.name.clone()),
                delta.unwrap_or_else(|| Cell::from("")),
                Cell::from(segment),
                Cell::from(split),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(11),
            Constraint::Length(11),
        ],
    )
    .header(
        Row::new(vec!["Segment", "Delta", "Time", "Split"])
            .style(Style::default().fg(Color::Gray)),
    )
    .block(Block::default().borders(Borders::ALL).title("Splits"));
    f.render_widget(table, cols[0]);

    let total_style = match live {
        Some(l) => delta_style(l.delta),
        None => Style::default(),
    };
    let lines = vec![
        Line::from(Span::styled(
            format_duration(run.elapsed_total(now), g),
            total_style.add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        stat_line("Segment", format_duration(run.elapsed_in_segment(now), g)),
        stat_line(
            "Best possible time",
            format_opt(run.project_best_possible_time(profile, now), g),
        ),
        stat_line("Gold", format_opt(profile.gold(current), g)),
        stat_line("Possible time save", format_opt(profile.time_save(current), g)),
        stat_line("Sum of gold", format_opt(run.sum_of_gold(), g)),
        stat_line("Personal best", format_opt(profile.personal_best, g)),
        stat_line("Runs", profile.total_runs.to_string()),
    ];
    let stats = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Total"));
    f.render_widget(stats, cols[1]);
}

fn draw_preview(area: Rect, f: &mut ratatui::Frame, session: &Session, g: Duration) {
    let lines: Vec<Line> = crate::text_summary::preview_lines(
        session.category(),
        session.route(),
        session.profile(),
        g,
    )
    .into_iter()
    .map(Line::from)
    .collect();
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Preview"));
    f.render_widget(p, area);
}
