//! pomo - Pomodoro focus timer
//!
//! Usage:
//!   pomo start [MINS] [--task NAME]    Run a focus session (default: 25 mins)
//!   pomo break [MINS]                  Run a short break
//!   pomo long-break [MINS]             Run a long break
//!   pomo stop                          Cancel a session left live
//!   pomo status                        Show the current session
//!   pomo stats [--days N]              Show progress and statistics
//!   pomo history [--date YYYY-MM-DD]   List sessions for a day
//!   pomo config [--work N] [--bell B]  Show or change settings

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{App, Cli, Commands, SessionKind};
use pinepomo::TimerConfigPatch;

fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the countdown line
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_command(cli).await })
}

async fn run_command(cli: Cli) -> Result<()> {
    let app = App::open(cli.data_dir).await?;

    match cli.command {
        Some(Commands::Start {
            duration,
            task,
            task_ref,
        }) => cli::cmd_start(&app, duration, task, task_ref).await,
        Some(Commands::Break { duration }) => {
            cli::cmd_break(&app, duration, SessionKind::ShortBreak).await
        }
        Some(Commands::LongBreak { duration }) => {
            cli::cmd_break(&app, duration, SessionKind::LongBreak).await
        }
        Some(Commands::Stop) => cli::cmd_stop(&app).await,
        Some(Commands::Status) => cli::cmd_status(&app).await,
        Some(Commands::Stats { days }) => cli::cmd_stats(&app, days).await,
        Some(Commands::History { date }) => cli::cmd_history(&app, date).await,
        Some(Commands::Config {
            work,
            break_mins,
            long_break,
            goal,
            bell,
        }) => {
            let patch = TimerConfigPatch {
                work_mins: work,
                break_mins,
                long_break_mins: long_break,
                daily_goal: goal,
            };
            cli::cmd_config(&app, patch, bell).await
        }
        None => cli::cmd_status(&app).await,
    }
}
