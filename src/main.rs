use anyhow::Context;
use clap::{Parser, Subcommand};
use duty_tracker::alerts::LogCue;
use duty_tracker::clock::{Clock, SystemClock};
use duty_tracker::config::{AlertSourceKind, AppConfig};
use duty_tracker::db::{self, PgAlertSource, PgStore};
use duty_tracker::models::DutyState;
use duty_tracker::sensor::LineFeedSource;
use duty_tracker::session::{Session, SessionDeps, SessionSettings};
use duty_tracker::shift::{format_elapsed, parse_odometer, ShiftController};
use duty_tracker::store::AlertSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "duty-tracker", version, about = "Duty shifts, telemetry, and emergency alerts for mobile workers")]
struct Cli {
    /// Worker id (defaults to WORKER_ID)
    #[arg(long, global = true)]
    worker: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply database migrations
    Migrate,
    /// Show whether the worker is on duty
    Status,
    /// Open a shift at the given odometer reading
    CheckIn { odometer: String },
    /// Close the open shift at the given odometer reading
    CheckOut { odometer: String },
    /// Track positions and show alerts until ctrl-c; type `ack` to acknowledge an alert
    Run {
        /// File or FIFO with one JSON position fix per line
        #[arg(long)]
        fixes: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");

    let worker = cli.worker.or(config.worker_id);
    let store = Arc::new(PgStore::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Migrate => {
            db::migrate(&pool).await?;
            info!("Migrations applied");
        }
        Command::Status => {
            let worker_id = require_worker(worker)?;
            let mut shifts = ShiftController::new(worker_id, store, Arc::clone(&clock));
            print_state(shifts.resume().await?, clock.as_ref());
        }
        Command::CheckIn { odometer } => {
            let worker_id = require_worker(worker)?;
            let odometer = parse_odometer(&odometer)?;
            let mut shifts = ShiftController::new(worker_id, store, clock);
            shifts.resume().await?;
            let record = shifts.check_in(odometer).await?;
            println!(
                "Shift started at {} (odometer {})",
                record.start_time.format("%H:%M"),
                record.start_odometer
            );
        }
        Command::CheckOut { odometer } => {
            let worker_id = require_worker(worker)?;
            let odometer = parse_odometer(&odometer)?;
            let mut shifts = ShiftController::new(worker_id, store, clock);
            shifts.resume().await?;
            let record = shifts.check_out(odometer).await?;
            println!(
                "Shift ended: {} km in {} min",
                record.distance_km.unwrap_or_default(),
                record.duration_minutes.unwrap_or_default()
            );
        }
        Command::Run { fixes } => {
            let worker_id = require_worker(worker)?;
            let alerts: Arc<dyn AlertSource> = match config.alert_source {
                AlertSourceKind::Postgres => Arc::new(PgAlertSource::new(pool.clone())),
                #[cfg(feature = "kafka")]
                AlertSourceKind::Kafka => {
                    Arc::new(duty_tracker::kafka::KafkaAlertSource::new(config.kafka.clone()))
                }
                #[cfg(not(feature = "kafka"))]
                AlertSourceKind::Kafka => anyhow::bail!("ALERT_SOURCE=kafka needs the `kafka` feature"),
            };
            let deps = SessionDeps {
                telemetry: store.clone(),
                shifts: store.clone(),
                profiles: store,
                alerts,
                cue: Arc::new(LogCue),
                clock,
            };
            let settings = SessionSettings {
                sampler: config.sampler,
                telemetry_min_interval: config.telemetry_min_interval,
                alert_retry: config.alert_retry,
            };
            run_session(worker_id, deps, settings, fixes).await?;
        }
    }

    Ok(())
}

async fn run_session(
    worker_id: Uuid,
    deps: SessionDeps,
    settings: SessionSettings,
    fixes: PathBuf,
) -> anyhow::Result<()> {
    let clock = Arc::clone(&deps.clock);
    let mut session = Session::open(worker_id, deps, settings).await?;

    match session.profile().await? {
        Some(profile) => info!("Driver: {}", profile.display_name),
        None => warn!("No driver profile for worker {}", worker_id),
    }
    print_state(session.duty_state(), clock.as_ref());

    let feed = tokio::fs::File::open(&fixes)
        .await
        .with_context(|| format!("opening position feed {}", fixes.display()))?;
    session.start_tracking(Arc::new(LineFeedSource::new(BufReader::new(feed))))?;

    let mut displayed = session.alerts().watch();
    let mut gps = session.watch_gps_status();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            line = stdin.next_line() => match line? {
                Some(input) if input.trim().eq_ignore_ascii_case("ack") => {
                    if session.alerts().acknowledge().is_none() {
                        println!("No alert to acknowledge");
                    }
                }
                Some(_) => println!("Type `ack` to acknowledge the displayed alert"),
                None => break,
            },
            changed = displayed.changed() => {
                if changed.is_err() {
                    break;
                }
                let alert = displayed.borrow_and_update().clone();
                if let Some(alert) = alert {
                    let marker = if alert.severity.is_flashing() { "!!!" } else { "!" };
                    println!(
                        "{marker} {:?} {}: {} {marker}  (type `ack` to acknowledge)",
                        alert.severity, alert.title, alert.message
                    );
                }
            }
            changed = gps.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = gps.borrow_and_update().clone();
                info!(status = status.label(), ?status, "GPS status");
            }
        }
    }

    session.close().await;
    Ok(())
}

fn require_worker(worker: Option<Uuid>) -> anyhow::Result<Uuid> {
    worker.context("no worker id: pass --worker or set WORKER_ID")
}

fn print_state(state: &DutyState, clock: &dyn Clock) {
    match state {
        DutyState::OnDuty(record) => {
            let elapsed = clock.now() - record.start_time;
            println!(
                "ON DUTY since {} (odometer {}), elapsed {}",
                record.start_time.format("%H:%M"),
                record.start_odometer,
                format_elapsed(elapsed)
            );
        }
        DutyState::OffDuty => println!("OFF DUTY"),
    }
}
