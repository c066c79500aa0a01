use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tokio::time::sleep;

use taskchime::{
    format_mmss, AlertController, CountdownController, CountdownPhase, DeliveryHandler,
    DesktopPresenter, FocusSettings, RegistrationStore, ReminderEngine, RingtoneSink,
    ScheduleOutcome, SettingsStore, TokioAlarmService,
};

/// Exact-time task reminders that ring until acknowledged, plus a focus
/// countdown timer.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Arm a reminder and ring when it comes due
    Remind {
        /// Task the reminder is for
        task_id: String,

        /// Fire this many seconds from now
        #[arg(long = "in", value_name = "SECS", conflicts_with = "at")]
        in_secs: Option<u64>,

        /// Fire at an RFC 3339 instant, e.g. 2026-09-01T09:30:00Z
        #[arg(long, value_parser = parse_due)]
        at: Option<DateTime<Utc>>,
    },

    /// Discard a pending reminder
    Cancel { task_id: String },

    /// Run the focus countdown in the terminal
    Focus {
        /// Countdown length in minutes (defaults to the configured focus duration)
        #[arg(long)]
        minutes: Option<u64>,
    },

    /// Show or change the stored settings
    Config {
        /// Focus countdown length in minutes
        #[arg(long)]
        focus_minutes: Option<u64>,

        /// Base frequency of the alarm tone
        #[arg(long)]
        tone_hz: Option<f32>,

        /// Alarm volume between 0.0 and 1.0
        #[arg(long)]
        volume: Option<f32>,
    },
}

fn parse_due(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;

    match cli.command {
        Command::Remind {
            task_id,
            in_secs,
            at,
        } => {
            let due = match (in_secs, at) {
                (Some(secs), None) => {
                    let secs = i64::try_from(secs).context("--in value is too large")?;
                    Utc::now() + chrono::Duration::seconds(secs)
                }
                (None, Some(at)) => at,
                _ => bail!("give the due time as either --in <SECS> or --at <INSTANT>"),
            };
            remind(&data_dir, &settings, &task_id, due).await
        }
        Command::Cancel { task_id } => {
            let engine = build_engine(&data_dir, &settings)?;
            engine.cancel_reminder(&task_id)?;
            println!("Cancelled any pending reminder for {}.", task_id);
            Ok(())
        }
        Command::Focus { minutes } => focus(&settings, minutes).await,
        Command::Config {
            focus_minutes,
            tone_hz,
            volume,
        } => config(&settings, focus_minutes, tone_hz, volume),
    }
}

fn data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "taskchime")
        .context("could not determine a data directory for taskchime")?;
    Ok(dirs.data_local_dir().to_path_buf())
}

fn build_engine(data_dir: &Path, settings: &SettingsStore) -> Result<ReminderEngine> {
    let alert = settings.alert();
    let sink = Arc::new(RingtoneSink::new(alert.tone_hz, alert.volume));
    let alerts = Arc::new(AlertController::new(sink));

    let delivery = Arc::new(DeliveryHandler::new(
        alerts.clone(),
        Arc::new(DesktopPresenter),
    ));
    let store = RegistrationStore::new(data_dir.join("registrations.json"));
    let service = Arc::new(TokioAlarmService::with_store(delivery, Some(store))?);

    Ok(ReminderEngine::new(service, alerts))
}

async fn remind(
    data_dir: &Path,
    settings: &SettingsStore,
    task_id: &str,
    due: DateTime<Utc>,
) -> Result<()> {
    let engine = build_engine(data_dir, settings)?;

    match engine.schedule_reminder(task_id, due)? {
        ScheduleOutcome::PermissionRequired => {
            eprintln!("Exact alarms are not permitted right now; nothing was scheduled.");
            eprintln!("Grant the permission and run the command again.");
            return Ok(());
        }
        ScheduleOutcome::Scheduled => {
            println!("Reminder for {} set for {}.", task_id, due);
        }
    }

    // Stay resident until the alarm fires, then hold it until the user
    // acknowledges it.
    while !engine.alerts().is_ringing() {
        sleep(Duration::from_millis(250)).await;
    }

    println!("Press Enter to stop the alarm.");
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line)
    })
    .await
    .context("stdin reader panicked")??;

    engine.acknowledge_alert(task_id);
    println!("Alarm stopped.");
    Ok(())
}

async fn focus(settings: &SettingsStore, minutes: Option<u64>) -> Result<()> {
    let total = match minutes {
        Some(minutes) => {
            let secs = minutes
                .checked_mul(60)
                .context("--minutes value is too large")?;
            Duration::from_secs(secs)
        }
        None => settings.focus().duration(),
    };

    let controller = CountdownController::new(total);
    let mut ticks = controller.subscribe();
    controller.start().await?;

    println!("Focus for {}. Ctrl-C to abandon.", format_mmss(total));
    loop {
        ticks.changed().await?;
        let snapshot = ticks.borrow().clone();
        print!(
            "\r{}",
            format_mmss(Duration::from_secs(snapshot.remaining_secs))
        );
        io::stdout().flush()?;
        if snapshot.phase == CountdownPhase::Finished {
            break;
        }
    }

    println!();
    println!("Focus session complete.");
    Ok(())
}

fn config(
    settings: &SettingsStore,
    focus_minutes: Option<u64>,
    tone_hz: Option<f32>,
    volume: Option<f32>,
) -> Result<()> {
    if let Some(minutes) = focus_minutes {
        let secs = minutes
            .checked_mul(60)
            .context("--focus-minutes value is too large")?;
        settings.update_focus(FocusSettings {
            duration_secs: secs,
        })?;
    }

    if tone_hz.is_some() || volume.is_some() {
        let mut alert = settings.alert();
        if let Some(tone_hz) = tone_hz {
            alert.tone_hz = tone_hz;
        }
        if let Some(volume) = volume {
            alert.volume = volume.clamp(0.0, 1.0);
        }
        settings.update_alert(alert)?;
    }

    let focus = settings.focus();
    let alert = settings.alert();
    println!("focus duration: {}", format_mmss(focus.duration()));
    println!(
        "alert tone:     {} Hz at volume {}",
        alert.tone_hz, alert.volume
    );
    Ok(())
}
