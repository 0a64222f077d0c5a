use crate::orchestrator::{load_profile, parse_line_command, run_controller, Session};
use crate::storage::{JsonStore, SplitStore};
use crate::wizard::Wizard;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "splitwatch.log";

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
    /// Rewrites the current terminal line instead of starting a new one.
    Status(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());
        let mut status_shown = false;

        while let Some(line) = rx.blocking_recv() {
            if status_shown && !matches!(line, OutputLine::Status(_)) {
                let _ = write!(out, "\r\x1b[K");
                let _ = out.flush();
                status_shown = false;
            }
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
                OutputLine::Status(msg) => {
                    let _ = write!(out, "\r{}\x1b[K", msg);
                    let _ = out.flush();
                    status_shown = true;
                }
            }
        }

        if status_shown {
            let _ = writeln!(out);
        }
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "splitwatch",
    version,
    about = "Speedrun split timer with personal-best comparison"
)]
pub struct Cli {
    /// Route to run. Unknown or missing routes start the setup wizard
    pub route: Option<String>,

    /// Directory holding the splits file and the log
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Line-mode timer on stdin/stdout (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Print the route's comparison profile as JSON and exit
    #[arg(long)]
    pub json: bool,

    /// Print the route preview and exit
    #[arg(long)]
    pub preview: bool,

    /// List categories and routes and exit
    #[arg(long)]
    pub list: bool,

    /// Redraw interval; also the display granularity
    #[arg(long, default_value = "100ms")]
    pub refresh_interval: humantime::Duration,

    /// Leads larger than this are hidden while ahead of pace [default: 10s]
    #[arg(long)]
    pub plus_minus_threshold: Option<humantime::Duration>,

    /// Use --auto-save true to save finished runs without asking
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Export the route's run history as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Export the route's run history as CSV
    #[arg(long)]
    pub export_csv: Option<PathBuf>,
}

impl Cli {
    pub fn refresh(&self) -> Duration {
        Duration::from(self.refresh_interval).max(Duration::from_millis(1))
    }

    pub fn threshold(&self) -> Duration {
        self.plus_minus_threshold
            .map(Duration::from)
            .unwrap_or(crate::timer::DEFAULT_PLUS_MINUS_THRESHOLD)
    }

    /// True when the command prints something and exits instead of running a timer.
    pub fn is_one_shot(&self) -> bool {
        self.list || self.json || self.preview
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let data_dir = match args.data_dir.clone() {
        Some(dir) => dir,
        None => crate::storage::default_data_dir()?,
    };
    let mut store = JsonStore::open(&data_dir)?;
    init_tracing(&data_dir)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %store.path().display(),
        "starting"
    );

    if args.list {
        return print_listing(&store, args.refresh());
    }

    let Some(route) = resolve_route(&args, &mut store)? else {
        return Ok(());
    };

    handle_exports(&args, &store, &route)?;

    if args.json {
        let profile = load_profile(&store, &route)?;
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    let session = Session::open(Box::new(store), route, args.threshold(), args.auto_save)?;

    if args.preview {
        print_preview(&session, args.refresh());
        return Ok(());
    }

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(session, args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(session, args).await;
        }
    }

    run_text(session, args).await
}

/// Send tracing output to a log file in the data directory. The terminal belongs to
/// the timer.
fn init_tracing(dir: &Path) -> Result<()> {
    let path = dir.join(LOG_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

/// Find the named route, falling back to the setup wizard.
fn resolve_route(args: &Cli, store: &mut JsonStore) -> Result<Option<crate::model::Route>> {
    if let Some(name) = args.route.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(route) = store.find_route(name)? {
            return Ok(Some(route));
        }
        if args.is_one_shot() {
            anyhow::bail!("route '{name}' not found");
        }
        println!("route '{name}' not found");
    } else if args.is_one_shot() {
        anyhow::bail!("a route name is required with --json or --preview");
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    Wizard::new(stdin.lock(), stdout.lock()).run(store)
}

fn print_listing(store: &JsonStore, granularity: Duration) -> Result<()> {
    let mut entries = Vec::new();
    for summary in store.categories()? {
        let routes = store.routes_in_category(summary.category.id)?;
        entries.push((summary, routes));
    }
    for line in crate::text_summary::list_lines(&entries, granularity) {
        println!("{line}");
    }
    Ok(())
}

fn print_preview(session: &Session, granularity: Duration) {
    let lines = crate::text_summary::preview_lines(
        session.category(),
        session.route(),
        session.profile(),
        granularity,
    );
    for line in lines {
        println!("{line}");
    }
}

async fn run_text(session: Session, args: Cli) -> Result<()> {
    let refresh = args.refresh();
    let (out_tx, out_handle) = spawn_output_writer();
    let preview = crate::text_summary::preview_lines(
        session.category(),
        session.route(),
        session.profile(),
        refresh,
    );
    for line in preview {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    let _ = out_tx.send(OutputLine::Stdout(String::new()));
    let _ = out_tx.send(OutputLine::Stdout(
        "Press Enter to start, q to quit.".to_string(),
    ));

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let reader_out = out_tx.clone();
    // Plain thread: a blocked stdin read must not hold up runtime shutdown.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_line_command(&line) {
                Some(cmd) => {
                    if cmd_tx.send(cmd).is_err() {
                        break;
                    }
                }
                None => {
                    let _ = reader_out.send(OutputLine::Stderr(format!(
                        "unknown command '{}': Enter, u, r, y, n or q",
                        line.trim()
                    )));
                }
            }
        }
    });

    let res = run_controller(session, cmd_rx, out_tx.clone(), refresh).await;
    drop(out_tx);
    let _ = out_handle.await;
    res
}

/// Handle export operations (JSON and CSV).
fn handle_exports(args: &Cli, store: &dyn SplitStore, route: &crate::model::Route) -> Result<()> {
    if args.export_json.is_none() && args.export_csv.is_none() {
        return Ok(());
    }
    let runs = store.runs_for_route(route.id)?;
    if let Some(p) = args.export_json.as_deref() {
        crate::storage::export_json(p, route, &runs)?;
    }
    if let Some(p) = args.export_csv.as_deref() {
        crate::storage::export_csv(p, route, &runs)?;
    }
    Ok(())
}
