//! `agenda` CLI: manage a clinic calendar and its bookings from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Open Monday mornings and add a session type
//! agenda availability add --day mon --start 08:00 --end 12:00
//! agenda session-type add --name Therapy --duration 50 --price 20000
//!
//! # List bookable slots and book one
//! agenda slots --session-type <ID> --date 2024-01-15
//! agenda book --session-type <ID> --start 2024-01-15T08:50 --name Ana --phone "+55 11 90000-0001"
//!
//! # Patient self-service through the cancellation token
//! agenda cancel --token <TOKEN>
//! agenda reschedule --token <TOKEN> --start 2024-01-15T10:30
//!
//! # Weekly series, checked before it is created
//! agenda series check --session-type <ID> --day mon --time 09:00 --from 2024-01-01 --until 2024-03-01
//!
//! # Patient records
//! agenda patient search ana
//! agenda patient appointments <ID>
//! ```
//!
//! Every command prints JSON to stdout. Logs go to stderr (`-v`, `-vv` or
//! `RUST_LOG`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use booking_engine::{
    AdminBookingRequest, BookingEngine, BookingRequest, Clock, Config, FixedClock, PatientInfo,
    SeriesRequest, SystemClock,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use slot_engine::{AppointmentStatus, BlockType, Frequency, TimeRange};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "agenda", version, about = "Clinic appointment booking CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = "agenda.toml")]
    config: PathBuf,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Pretend the current time is this RFC 3339 instant
    #[arg(long, global = true, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage session types
    #[command(subcommand)]
    SessionType(SessionTypeCommand),
    /// Manage weekly availability windows
    #[command(subcommand)]
    Availability(AvailabilityCommand),
    /// Manage vacations, holidays and breaks
    #[command(subcommand)]
    Block(BlockCommand),
    /// Manage patient records
    #[command(subcommand)]
    Patient(PatientCommand),
    /// List bookable slots
    Slots {
        #[arg(long)]
        session_type: Uuid,
        #[arg(long)]
        date: NaiveDate,
        /// Last date of a multi-day listing
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Book a slot as a patient would
    Book {
        #[arg(long)]
        session_type: Uuid,
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        #[command(flatten)]
        patient: PatientArgs,
    },
    /// Book on behalf of a patient, off the slot grid
    AdminBook {
        #[arg(long)]
        session_type: Uuid,
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        #[command(flatten)]
        patient: PatientArgs,
        /// Initial status (defaults to the configured one)
        #[arg(long)]
        status: Option<AppointmentStatus>,
    },
    /// Show an appointment
    Show {
        #[command(flatten)]
        target: AppointmentRef,
    },
    /// Cancel an appointment
    Cancel {
        #[command(flatten)]
        target: AppointmentRef,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Move an appointment to another slot
    Reschedule {
        #[arg(long)]
        token: String,
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
    },
    /// Set an appointment's status
    Status {
        id: Uuid,
        status: AppointmentStatus,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List appointments in a date range
    Appointments {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Manage recurring series
    #[command(subcommand)]
    Series(SeriesCommand),
    /// Manage payments
    #[command(subcommand)]
    Payment(PaymentCommand),
}

#[derive(Subcommand)]
enum SessionTypeCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// Price in cents
        #[arg(long)]
        price: i64,
    },
    List {
        /// Include inactive session types
        #[arg(long)]
        all: bool,
    },
    Deactivate { id: Uuid },
}

#[derive(Subcommand)]
enum AvailabilityCommand {
    Add {
        #[arg(long)]
        day: Weekday,
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
    },
    List,
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum BlockCommand {
    Add {
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        #[arg(long, value_parser = parse_datetime)]
        end: NaiveDateTime,
        #[arg(long = "type")]
        block_type: BlockType,
        #[arg(long)]
        reason: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,
        #[arg(long, value_parser = parse_datetime)]
        end: NaiveDateTime,
        #[arg(long = "type")]
        block_type: BlockType,
        #[arg(long)]
        reason: Option<String>,
    },
    List {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Active patients by name
    List,
    /// Active patients whose name contains TEXT
    Search { text: String },
    Show { id: Uuid },
    /// Replace name, phone and email
    Update {
        id: Uuid,
        #[command(flatten)]
        patient: PatientArgs,
    },
    Deactivate { id: Uuid },
    /// Appointment history, most recent first
    Appointments { id: Uuid },
}

#[derive(Subcommand)]
enum SeriesCommand {
    /// Dry run: list occurrences and conflicts
    Check {
        #[command(flatten)]
        rule: SeriesArgs,
    },
    Create {
        #[command(flatten)]
        rule: SeriesArgs,
        #[command(flatten)]
        patient: PatientArgs,
    },
    Show { id: Uuid },
    /// Cancel future occurrences and deactivate the series
    Delete {
        id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    CancelOccurrence {
        appointment_id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum PaymentCommand {
    Paid {
        appointment_id: Uuid,
        #[arg(long)]
        receipt: Option<String>,
    },
    Waive {
        appointment_id: Uuid,
        #[arg(long)]
        note: Option<String>,
    },
    Pending,
}

#[derive(Args)]
struct PatientArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: Option<String>,
}

impl From<PatientArgs> for PatientInfo {
    fn from(args: PatientArgs) -> Self {
        PatientInfo {
            name: args.name,
            phone: args.phone,
            email: args.email,
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct AppointmentRef {
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    id: Option<Uuid>,
}

#[derive(Args)]
struct SeriesArgs {
    #[arg(long)]
    session_type: Uuid,
    #[arg(long)]
    day: Weekday,
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,
    #[arg(long, default_value = "weekly")]
    frequency: Frequency,
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    until: Option<NaiveDate>,
}

impl From<SeriesArgs> for SeriesRequest {
    fn from(args: SeriesArgs) -> Self {
        SeriesRequest {
            session_type_id: args.session_type,
            day_of_week: args.day,
            start_time: args.time,
            frequency: args.frequency,
            start_date: args.from,
            end_date: args.until,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(&cli.config, cli.database)?;
    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(FixedClock::new(now)),
        None => Arc::new(SystemClock),
    };
    let engine = BookingEngine::open(&config, clock).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database_path.display()
        )
    })?;

    run(&engine, cli.command)
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Load `path` if it exists, otherwise start from defaults.
fn load_config(path: &Path, database: Option<PathBuf>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load config: {}", path.display()))?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    if let Some(database) = database {
        config.database_path = database;
    }
    Ok(config)
}

fn run(engine: &BookingEngine, command: Commands) -> Result<()> {
    match command {
        Commands::SessionType(cmd) => match cmd {
            SessionTypeCommand::Add {
                name,
                duration,
                price,
            } => emit(&engine.create_session_type(&name, duration, price)?),
            SessionTypeCommand::List { all } => emit(&engine.session_types(all)?),
            SessionTypeCommand::Deactivate { id } => emit(&engine.deactivate_session_type(id)?),
        },
        Commands::Availability(cmd) => match cmd {
            AvailabilityCommand::Add { day, start, end } => {
                emit(&engine.create_window(day, start, end)?)
            }
            AvailabilityCommand::List => emit(&engine.windows()?),
            AvailabilityCommand::Remove { id } => {
                engine.delete_window(id)?;
                emit(&serde_json::json!({ "removed": id }))
            }
        },
        Commands::Block(cmd) => match cmd {
            BlockCommand::Add {
                start,
                end,
                block_type,
                reason,
            } => {
                let range = TimeRange::new(start, end).context("Invalid block range")?;
                emit(&engine.create_block(range, block_type, reason)?)
            }
            BlockCommand::Update {
                id,
                start,
                end,
                block_type,
                reason,
            } => {
                let range = TimeRange::new(start, end).context("Invalid block range")?;
                emit(&engine.update_block(id, range, block_type, reason)?)
            }
            BlockCommand::List { from, to } => emit(&engine.blocks(&date_range(from, to)?)?),
            BlockCommand::Remove { id } => {
                engine.delete_block(id)?;
                emit(&serde_json::json!({ "removed": id }))
            }
        },
        Commands::Patient(cmd) => match cmd {
            PatientCommand::List => emit(&engine.active_patients()?),
            PatientCommand::Search { text } => emit(&engine.search_patients(&text)?),
            PatientCommand::Show { id } => emit(&engine.patient(id)?),
            PatientCommand::Update { id, patient } => {
                emit(&engine.update_patient(id, &patient.into())?)
            }
            PatientCommand::Deactivate { id } => emit(&engine.deactivate_patient(id)?),
            PatientCommand::Appointments { id } => emit(&engine.patient_appointments(id)?),
        },
        Commands::Slots {
            session_type,
            date,
            until,
        } => match until {
            Some(until) => emit(&engine.slots_for_range(date, until, session_type)?),
            None => emit(&engine.generate_slots(date, session_type)?),
        },
        Commands::Book {
            session_type,
            start,
            patient,
        } => emit(&engine.create_booking(&BookingRequest {
            session_type_id: session_type,
            start,
            patient: patient.into(),
        })?),
        Commands::AdminBook {
            session_type,
            start,
            patient,
            status,
        } => emit(&engine.create_admin_booking(&AdminBookingRequest {
            session_type_id: session_type,
            start,
            patient: patient.into(),
            status,
        })?),
        Commands::Show { target } => match (target.token, target.id) {
            (Some(token), _) => emit(&engine.appointment_by_token(&token)?),
            (None, Some(id)) => emit(&engine.appointment(id)?),
            (None, None) => anyhow::bail!("Either --token or --id is required"),
        },
        Commands::Cancel { target, reason } => match (target.token, target.id) {
            (Some(token), _) => emit(&engine.cancel_appointment(&token, reason.as_deref())?),
            (None, Some(id)) => emit(&engine.cancel_by_admin(id, reason.as_deref())?),
            (None, None) => anyhow::bail!("Either --token or --id is required"),
        },
        Commands::Reschedule { token, start } => {
            emit(&engine.reschedule_appointment(&token, start)?)
        }
        Commands::Status { id, status, reason } => {
            emit(&engine.update_status(id, status, reason.as_deref())?)
        }
        Commands::Appointments { from, to } => {
            emit(&engine.appointments_between(&date_range(from, to)?)?)
        }
        Commands::Series(cmd) => match cmd {
            SeriesCommand::Check { rule } => {
                emit(&engine.check_series_conflicts(&SeriesRequest::from(rule))?)
            }
            SeriesCommand::Create { rule, patient } => emit(
                &engine.create_recurring_series(&patient.into(), &SeriesRequest::from(rule))?,
            ),
            SeriesCommand::Show { id } => emit(&engine.series(id)?),
            SeriesCommand::Delete { id, reason } => {
                emit(&engine.delete_recurring_series(id, reason.as_deref())?)
            }
            SeriesCommand::CancelOccurrence {
                appointment_id,
                reason,
            } => emit(&engine.cancel_occurrence(appointment_id, reason.as_deref())?),
        },
        Commands::Payment(cmd) => match cmd {
            PaymentCommand::Paid {
                appointment_id,
                receipt,
            } => emit(&engine.mark_paid(appointment_id, receipt.as_deref())?),
            PaymentCommand::Waive {
                appointment_id,
                note,
            } => emit(&engine.mark_waived(appointment_id, note.as_deref())?),
            PaymentCommand::Pending => emit(&engine.pending_payments()?),
        },
    }
}

/// Print `value` as pretty JSON on stdout.
fn emit<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Whole days from `from` through `to`.
fn date_range(from: NaiveDate, to: NaiveDate) -> Result<TimeRange> {
    let end = to
        .succ_opt()
        .with_context(|| format!("Date out of range: {}", to))?;
    TimeRange::new(from.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
        .with_context(|| format!("--to {} is before --from {}", to, from))
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 instant: {}", e))
}

fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| format!("expected YYYY-MM-DDTHH:MM, got '{}'", s))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_accepts_minutes_and_seconds() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(8, 50, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-01-15T08:50"), Ok(expected));
        assert_eq!(parse_datetime("2024-01-15T08:50:00"), Ok(expected));
        assert!(parse_datetime("15/01/2024 08:50").is_err());
    }

    #[test]
    fn date_range_includes_last_day() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let range = date_range(from, from).unwrap();
        assert_eq!(range, TimeRange::day(from));
        assert!(date_range(from, from.pred_opt().unwrap()).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
