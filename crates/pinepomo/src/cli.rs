//! CLI command definitions and handlers

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{value_parser, Parser, Subcommand};
use pinepomo_core::config::Config;
use pinepomo_core::{FileDeviceIdentity, Paths};
use tokio::sync::mpsc;

use pinepomo::{
    Control, DailyProgress, FileStorage, PomodoroStats, Runner, StartOptions, StoragePort,
    Subscription, Timer, TimerConfig, TimerConfigPatch, TimerEvent, TimerEventType, TimerSession,
    TimerStatus, WindowStats, MAX_DURATION_MINS,
};

/// pomo - Pomodoro focus timer
#[derive(Parser)]
#[command(name = "pomo")]
#[command(about = "Pomodoro focus timer")]
#[command(version)]
#[command(after_help = r#"WHILE A SESSION RUNS:
    p + Enter    pause
    r + Enter    resume
    d + Enter    mark done (only while running)
    c + Enter    cancel (Ctrl-C also cancels)

EXAMPLES:
    pomo start                       # 25-minute focus session
    pomo start 50 --task "Review"    # Custom length with a task name
    pomo break                       # Short break
    pomo long-break                  # Long break
    pomo stats                       # Progress toward today's goal
    pomo stats --days 30             # Totals for the last 30 days
    pomo config --work 30 --goal 6   # Change settings
    pomo config --bell false         # Silence the completion bell

ENVIRONMENT:
    PINEPOMO_DATA_DIR    Data directory override
    RUST_LOG             Log filter, e.g. pinepomo=debug
"#)]
pub struct Cli {
    /// Data directory (default: ~/.local/share/pinepomo)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a focus session in the foreground
    #[command(alias = "s")]
    Start {
        /// Duration in minutes (default: configured work length)
        #[arg(value_name = "MINS", value_parser = minutes())]
        duration: Option<u32>,

        /// What you're working on
        #[arg(long)]
        task: Option<String>,

        /// Reference to a task in an external tracker
        #[arg(long, value_name = "REF")]
        task_ref: Option<String>,
    },

    /// Run a short break
    #[command(alias = "b")]
    Break {
        /// Duration in minutes (default: configured break length)
        #[arg(value_name = "MINS", value_parser = minutes())]
        duration: Option<u32>,
    },

    /// Run a long break
    #[command(alias = "lb")]
    LongBreak {
        /// Duration in minutes (default: configured long break length)
        #[arg(value_name = "MINS", value_parser = minutes())]
        duration: Option<u32>,
    },

    /// Cancel a session left live by an interrupted run
    #[command(alias = "end")]
    Stop,

    /// Show the current session
    #[command(alias = "st")]
    Status,

    /// Show progress and statistics
    #[command(alias = "statistics")]
    Stats {
        /// Number of days to total (default: 7)
        #[arg(long, default_value = "7", value_parser = value_parser!(u32).range(1..=3660))]
        days: u32,
    },

    /// List sessions for a day
    History {
        /// Day to list, YYYY-MM-DD (default: today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show or change timer settings
    Config {
        /// Focus length in minutes
        #[arg(long, value_name = "MINS", value_parser = minutes())]
        work: Option<u32>,

        /// Short break length in minutes
        #[arg(long = "break", value_name = "MINS", value_parser = minutes())]
        break_mins: Option<u32>,

        /// Long break length in minutes
        #[arg(long, value_name = "MINS", value_parser = minutes())]
        long_break: Option<u32>,

        /// Completed sessions per day to aim for
        #[arg(long, value_parser = value_parser!(u32).range(1..))]
        goal: Option<u32>,

        /// Ring the terminal bell when a session completes
        #[arg(long, value_name = "BOOL")]
        bell: Option<bool>,
    },
}

/// Session lengths accepted on the command line
fn minutes() -> clap::builder::RangedI64ValueParser<u32> {
    value_parser!(u32).range(1..=MAX_DURATION_MINS as i64)
}

/// What a foreground run is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    fn label(self) -> &'static str {
        match self {
            SessionKind::Focus => "FOCUS",
            SessionKind::ShortBreak => "BREAK",
            SessionKind::LongBreak => "LONG BREAK",
        }
    }

    /// Start options using the configured length for this kind
    fn options(self, settings: &TimerConfig) -> StartOptions {
        match self {
            SessionKind::Focus => StartOptions::work(),
            SessionKind::ShortBreak => StartOptions::short_break(settings),
            SessionKind::LongBreak => StartOptions::long_break(settings),
        }
    }
}

// ANSI color codes
const GREEN: &str = "\x1b[0;32m";
const YELLOW: &str = "\x1b[0;33m";
const CYAN: &str = "\x1b[0;36m";
const MAGENTA: &str = "\x1b[0;35m";
const BOLD: &str = "\x1b[1m";
const NC: &str = "\x1b[0m";

/// Check if stdout is a TTY and colors should be used
fn use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Conditionally apply color
fn color(code: &str, text: &str) -> String {
    if use_colors() {
        format!("{}{}{}", code, text, NC)
    } else {
        text.to_string()
    }
}

fn local(at: DateTime<Utc>) -> DateTime<Local> {
    at.into()
}

fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn progress_bar(percent: u32, width: usize) -> String {
    let filled = (width * percent.min(100) as usize) / 100;
    format!("{}{}", "\u{2588}".repeat(filled), "\u{2591}".repeat(width - filled))
}

/// Resolved configuration, paths and storage for one invocation
pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub paths: Paths,
    pub storage: Arc<FileStorage>,
}

impl App {
    pub async fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let config_path = Config::default_path(&Paths::new());
        let config = Config::load(&config_path)?;
        let paths = match data_dir {
            Some(dir) => Paths::with_data_dir(&dir),
            None => config.paths(),
        };

        let storage = FileStorage::open(&paths.sessions())
            .await
            .with_context(|| format!("Failed to open session store: {}", paths.sessions().display()))?;

        Ok(Self {
            config,
            config_path,
            paths,
            storage: Arc::new(storage),
        })
    }

    async fn settings(&self) -> Result<TimerConfig> {
        self.storage
            .get_settings()
            .await
            .context("Failed to load timer settings")
    }

    async fn completed_today(&self) -> Result<u32> {
        let today = self.storage.get_sessions_by_date(Utc::now().date_naive()).await?;
        Ok(today
            .iter()
            .filter(|s| s.status == TimerStatus::Completed)
            .count() as u32)
    }
}

/// Start a focus session
pub async fn cmd_start(
    app: &App,
    duration: Option<u32>,
    task: Option<String>,
    task_ref: Option<String>,
) -> Result<()> {
    let mut options = StartOptions::work();
    options.duration_mins = duration;
    options.task_name = task;
    options.external_task_ref = task_ref;
    run_session(app, options, SessionKind::Focus).await
}

/// Start a short or long break
pub async fn cmd_break(app: &App, duration: Option<u32>, kind: SessionKind) -> Result<()> {
    let settings = app.settings().await?;
    let mut options = kind.options(&settings);
    if duration.is_some() {
        options.duration_mins = duration;
    }
    run_session(app, options, kind).await
}

async fn run_session(app: &App, options: StartOptions, kind: SessionKind) -> Result<()> {
    if let Some(live) = app.storage.get_current_session().await? {
        bail!(
            "A session started at {} is still {}. Use 'pomo stop' to end it first.",
            local(live.started_at).format("%H:%M"),
            live.status.as_str()
        );
    }

    let settings = app.settings().await?;
    let device = Arc::new(FileDeviceIdentity::new(&app.paths.device_id()));
    let timer = Arc::new(Timer::new(device, settings));
    let _display = attach_display(&timer, kind.label(), app.config.bell);

    let (tx, rx) = mpsc::unbounded_channel();
    spawn_input(tx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Control::Cancel);
        }
    });

    let period = Duration::from_millis(app.config.tick_interval_ms.max(1));
    let runner = Runner::new(Arc::clone(&timer), Arc::clone(&app.storage)).with_period(period);
    let session = runner.run(options, rx).await?;
    timer.events().clear();

    if let Some(session) = session {
        if session.status == TimerStatus::Completed && kind == SessionKind::Focus {
            let progress = DailyProgress::new(app.completed_today().await?, settings.daily_goal);
            println!();
            println!("  {}  {}", color(CYAN, "Today:"), describe_progress(&progress));
            if progress.is_met() {
                println!("{}", color(GREEN, "Daily goal reached."));
            }
        }
    }

    Ok(())
}

/// Read line commands from stdin on a dedicated thread
fn spawn_input(tx: mpsc::UnboundedSender<Control>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            match Control::parse(&line) {
                Some(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("Unknown command '{}' (p, r, d, c)", line.trim()),
            }
        }
    });
}

/// Print transitions and a live countdown line
fn attach_display(timer: &Timer, label: &'static str, bell: bool) -> Vec<Subscription> {
    let events = timer.events();
    vec![
        events.on(TimerEventType::Started, move |event| {
            let session = &event.session;
            let ends = local(event.timestamp) + chrono::Duration::seconds(event.remaining_seconds as i64);
            println!("{}", color(&format!("{}{}", BOLD, MAGENTA), label));
            println!();
            println!("  {}  {} minutes", color(CYAN, "Duration:"), session.duration_mins);
            if let Some(ref task) = session.task_name {
                println!("  {}      {}", color(CYAN, "Task:"), task);
            }
            println!("  {}   {}", color(CYAN, "Ends at:"), ends.format("%H:%M"));
            println!();
            Ok(())
        }),
        events.on(TimerEventType::Tick, render_countdown),
        events.on(TimerEventType::Paused, |event| {
            render_countdown(event)?;
            println!("  {}", color(YELLOW, "paused (r to resume)"));
            Ok(())
        }),
        events.on(TimerEventType::Resumed, render_countdown),
        events.on(TimerEventType::Cancelled, |event| {
            let done = event.session.elapsed_seconds(event.remaining_seconds) / 60;
            println!();
            println!(
                "{} Session cancelled after {} of {} minutes",
                color(YELLOW, "[--]"),
                done,
                event.session.duration_mins
            );
            Ok(())
        }),
        events.on(TimerEventType::Completed, move |event| {
            render_countdown(event)?;
            println!();
            if bell && use_colors() {
                print!("\x07");
            }
            println!("{} {} complete", color(GREEN, "[ok]"), label.to_lowercase());
            announce_task(&event.session);
            std::io::stdout().flush()?;
            Ok(())
        }),
    ]
}

fn describe_progress(progress: &DailyProgress) -> String {
    let mut line = format!("{} {} of {}", progress.dots(), progress.completed, progress.goal);
    if !progress.is_met() {
        line.push_str(&format!(" ({} to go)", progress.remaining()));
    }
    line
}

fn render_countdown(event: &TimerEvent) -> Result<()> {
    let percent = event.session.progress_percent(event.remaining_seconds);
    let mut out = std::io::stdout().lock();
    write!(
        out,
        "\r  {} [{}] {:>3}%",
        format_clock(event.remaining_seconds),
        progress_bar(percent, 30),
        percent
    )?;
    out.flush()?;
    Ok(())
}

/// Hand-off point for a task tracker; the reference is only carried through
fn announce_task(session: &TimerSession) {
    if let Some(ref task_ref) = session.external_task_ref {
        tracing::info!(task_ref = %task_ref, session = %session.id, "focus session completed for task");
        println!(
            "  {}  {}min focus session completed ({})",
            color(CYAN, "Task:"),
            session.duration_mins,
            task_ref
        );
    }
}

/// Cancel a session left live by an interrupted run
pub async fn cmd_stop(app: &App) -> Result<()> {
    let mut session = match app.storage.get_current_session().await? {
        Some(s) => s,
        None => {
            println!("{} No live session", color(CYAN, "[info]"));
            return Ok(());
        }
    };

    if session.abandon() {
        app.storage.save_session(&session).await?;
    }
    println!("{} Session cancelled", color(GREEN, "[ok]"));
    Ok(())
}

/// Show the current session
pub async fn cmd_status(app: &App) -> Result<()> {
    let session = match app.storage.get_current_session().await? {
        Some(s) => s,
        None => {
            println!("No live session");
            println!();
            println!("Start one with: pomo start");
            return Ok(());
        }
    };

    println!("{}", color(&format!("{}{}", BOLD, MAGENTA), "SESSION LIVE"));
    println!();
    println!("  {}     {}", color(CYAN, "Status:"), session.status.as_str());
    println!("  {}   {} minutes", color(CYAN, "Duration:"), session.duration_mins);
    println!(
        "  {}    {}",
        color(CYAN, "Started:"),
        local(session.started_at).format("%H:%M")
    );
    if let Some(ref task) = session.task_name {
        println!("  {}       {}", color(CYAN, "Task:"), task);
    }
    Ok(())
}

/// Show progress and statistics
pub async fn cmd_stats(app: &App, days: u32) -> Result<()> {
    let settings = app.settings().await?;
    let sessions = app.storage.get_all_sessions().await?;
    let today = Utc::now().date_naive();
    let stats = PomodoroStats::from_sessions(&sessions, today);
    let window = WindowStats::from_sessions(&sessions, today, days);
    let progress = DailyProgress::new(stats.today.completed, settings.daily_goal);

    println!("{}Focus Statistics{}", BOLD, NC);
    println!();
    println!("  {}       {}", color(CYAN, "Today:"), describe_progress(&progress));

    let (hours, mins) = stats.this_week.total_time();
    println!(
        "  {}   {} sessions, {}h {}m",
        color(CYAN, "This week:"),
        stats.this_week.completed,
        hours,
        mins
    );
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let by_day: Vec<String> = days
        .iter()
        .zip(stats.week_by_day.iter())
        .map(|(d, n)| format!("{} {}", d, n))
        .collect();
    println!("               {}", by_day.join("  "));

    let (hours, mins) = stats.this_month.total_time();
    println!(
        "  {}  {} sessions, {}h {}m",
        color(CYAN, "This month:"),
        stats.this_month.completed,
        hours,
        mins
    );
    println!("  {}      {} days", color(CYAN, "Streak:"), stats.streak);
    if let Some(best) = stats.best_day {
        println!("  {}    {} ({} sessions)", color(CYAN, "Best day:"), best.date, best.count);
    }

    println!();
    println!("{}Last {} days{}", BOLD, window.days, NC);
    println!();
    let (hours, mins) = window.completed.total_time();
    println!(
        "  {}   {} of {} ({}%)",
        color(CYAN, "Completed:"),
        window.completed.completed,
        window.finished,
        window.completion_rate
    );
    println!("  {}  {}h {}m", color(CYAN, "Focus time:"), hours, mins);
    if let Some(best) = window.best_day {
        println!("  {}    {} ({} sessions)", color(CYAN, "Best day:"), best.date, best.count);
    }

    Ok(())
}

/// List sessions for a day
pub async fn cmd_history(app: &App, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let sessions = app.storage.get_sessions_by_date(date).await?;

    if sessions.is_empty() {
        println!("No sessions on {}", date);
        return Ok(());
    }

    println!("{}Sessions on {}{}", BOLD, date, NC);
    println!();
    for session in &sessions {
        let status = match session.status {
            TimerStatus::Completed => color(GREEN, session.status.as_str()),
            TimerStatus::Cancelled => color(YELLOW, session.status.as_str()),
            _ => color(CYAN, session.status.as_str()),
        };
        println!(
            "  {}  {:>3} min  {:<10} {}",
            local(session.started_at).format("%H:%M"),
            session.duration_mins,
            status,
            session.task_name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Show or change timer settings and local preferences
pub async fn cmd_config(app: &App, patch: TimerConfigPatch, bell: Option<bool>) -> Result<()> {
    let mut settings = app.settings().await?;
    let mut config = app.config.clone();

    if !patch.is_empty() {
        settings.merge(&patch);
        app.storage
            .save_settings(&settings)
            .await
            .context("Failed to save timer settings")?;
    }
    if let Some(bell) = bell {
        config.bell = bell;
        config.save(&app.config_path)?;
    }
    if !patch.is_empty() || bell.is_some() {
        println!("{} Settings saved", color(GREEN, "[ok]"));
        println!();
    }

    println!("  {}        {} minutes", color(CYAN, "Work:"), settings.work_mins);
    println!("  {}       {} minutes", color(CYAN, "Break:"), settings.break_mins);
    println!("  {}  {} minutes", color(CYAN, "Long break:"), settings.long_break_mins);
    println!("  {}  {} sessions", color(CYAN, "Daily goal:"), settings.daily_goal);
    println!(
        "  {}        {}",
        color(CYAN, "Bell:"),
        if config.bell { "on" } else { "off" }
    );
    Ok(())
}
