//! Pulse CLI - Command-line interface for the TrustPulse engine
//!
//! Commands:
//! - apply: Process update events into score results (batch mode)
//! - run: Process streaming events from stdin (streaming mode)
//! - score: Print the committed score view for one relationship
//! - forecast: Project a relationship's trajectory
//! - validate: Validate raw event schema
//! - doctor: Diagnose engine state and configuration
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use trustpulse::{
    CategoryConfig, EngineError, EngineSnapshot, MemoryStore, RawUpdateEvent, RelationshipId,
    TrustEngine, ENGINE_VERSION, PRODUCER_NAME, SCHEMA_VERSION, SUPPORTED_HORIZONS,
};

/// Pulse - Trust/resonance scoring and forecast engine
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score relationship events and project trust trajectories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process update events into score results (batch mode)
    Apply {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Category config JSON file (built-in table when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Load engine state snapshot from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save engine state snapshot to file after processing
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Stop at the first rejected event instead of reporting and continuing
        #[arg(long)]
        strict: bool,
    },

    /// Process streaming events from stdin (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Category config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Load engine state snapshot from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save engine state snapshot to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Print the committed score view for one relationship
    Score {
        /// Engine state snapshot file
        #[arg(long)]
        state: PathBuf,

        /// Subject entity id
        #[arg(long)]
        subject: String,

        /// Target entity id
        #[arg(long)]
        target: String,
    },

    /// Project a relationship's trust trajectory
    Forecast {
        /// Engine state snapshot file
        #[arg(long)]
        state: PathBuf,

        /// Subject entity id
        #[arg(long)]
        subject: String,

        /// Target entity id
        #[arg(long)]
        target: String,

        /// Horizon in hours (24 or 72)
        #[arg(long, default_value = "24")]
        horizon: u32,
    },

    /// Validate raw event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine state and configuration
    Doctor {
        /// Check an engine state snapshot file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Check a category config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one result per line)
    Ndjson,
    /// JSON array of results
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (pulse.update_event.v1)
    Input,
    /// Output schema (update results / forecasts)
    Output,
}

#[derive(Debug, thiserror::Error)]
enum PulseCliError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no events in input")]
    NoEvents,
    #[error("{0} invalid events")]
    ValidationFailed(usize),
    #[error("relationship not found: {0}")]
    NotFound(String),
    #[error("doctor found errors")]
    DoctorFailed,
}

fn main() -> ExitCode {
    if let Ok(filter) = std::env::var("PULSE_LOG") {
        use tracing_subscriber::EnvFilter;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(io::stderr)
            .try_init();
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pulse: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Apply {
            input,
            output,
            output_format,
            config,
            load_state,
            save_state,
            strict,
        } => cmd_apply(
            &input,
            &output,
            output_format,
            config.as_deref(),
            load_state.as_deref(),
            save_state.as_deref(),
            strict,
        ),

        Commands::Run {
            output_format,
            config,
            load_state,
            save_state,
            flush,
        } => cmd_run(
            output_format,
            config.as_deref(),
            load_state.as_deref(),
            save_state.as_deref(),
            flush,
        ),

        Commands::Score {
            state,
            subject,
            target,
        } => cmd_score(&state, &subject, &target),

        Commands::Forecast {
            state,
            subject,
            target,
            horizon,
        } => cmd_forecast(&state, &subject, &target, horizon),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { state, config, json } => {
            cmd_doctor(state.as_deref(), config.as_deref(), json)
        }

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

/// Build an engine from the optional snapshot and config flags. A loaded
/// snapshot carries its own config table; an explicit `--config` wins.
fn build_engine(
    config: Option<&Path>,
    load_state: Option<&Path>,
) -> Result<TrustEngine<MemoryStore>, PulseCliError> {
    let (store, snapshot_config) = match load_state {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let (store, config) = EngineSnapshot::from_json(&json)?.restore()?;
            (store, Some(config))
        }
        None => (MemoryStore::new(), None),
    };

    let table = match config {
        Some(path) => CategoryConfig::from_json(&fs::read_to_string(path)?)?,
        None => snapshot_config.unwrap_or_else(CategoryConfig::default_table),
    };

    Ok(TrustEngine::new(store, table)?)
}

fn save_snapshot(engine: &TrustEngine<MemoryStore>, path: &Path) -> Result<(), PulseCliError> {
    let snapshot = EngineSnapshot::capture(engine.store(), &engine.config_snapshot());
    fs::write(path, snapshot.to_json()?)?;
    Ok(())
}

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_ndjson(data: &str) -> Result<Vec<RawUpdateEvent>, PulseCliError> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| RawUpdateEvent::from_json(line).map_err(PulseCliError::Engine))
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
enum ApplyRecord<T: Serialize> {
    Committed {
        #[serde(flatten)]
        result: T,
    },
    Rejected {
        index: usize,
        error: String,
    },
}

fn cmd_apply(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    strict: bool,
) -> Result<(), PulseCliError> {
    let events = parse_ndjson(&read_input(input)?)?;
    if events.is_empty() {
        return Err(PulseCliError::NoEvents);
    }

    let engine = build_engine(config, load_state)?;
    let mut records = Vec::with_capacity(events.len());

    for (index, raw) in events.into_iter().enumerate() {
        let outcome = raw
            .normalize()
            .and_then(|event| engine.apply_update(&event));
        match outcome {
            Ok(result) => records.push(ApplyRecord::Committed { result }),
            Err(e) if strict => return Err(e.into()),
            Err(e) => records.push(ApplyRecord::Rejected {
                index,
                error: e.to_string(),
            }),
        }
    }

    if let Some(path) = save_state {
        save_snapshot(&engine, path)?;
    }

    let output_data = format_output(&records, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{output_data}");
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    config: Option<&Path>,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    flush: bool,
) -> Result<(), PulseCliError> {
    let engine = build_engine(config, load_state)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let outcome = RawUpdateEvent::from_json(trimmed)
            .and_then(|raw| raw.normalize())
            .and_then(|event| engine.apply_update(&event));
        let record = match outcome {
            Ok(result) => ApplyRecord::Committed { result },
            Err(e) => ApplyRecord::Rejected {
                index,
                error: e.to_string(),
            },
        };

        let rendered = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&record)?,
            _ => serde_json::to_string(&record)?,
        };
        writeln!(stdout, "{rendered}")?;
        if flush {
            stdout.flush()?;
        }
    }

    if let Some(path) = save_state {
        save_snapshot(&engine, path)?;
    }

    Ok(())
}

fn cmd_score(state: &Path, subject: &str, target: &str) -> Result<(), PulseCliError> {
    let engine = build_engine(None, Some(state))?;
    let id = RelationshipId::new(subject, target);
    let view = engine
        .current_score(&id)?
        .ok_or_else(|| PulseCliError::NotFound(id.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn cmd_forecast(
    state: &Path,
    subject: &str,
    target: &str,
    horizon: u32,
) -> Result<(), PulseCliError> {
    let engine = build_engine(None, Some(state))?;
    let id = RelationshipId::new(subject, target);
    let forecast = engine
        .forecast(&id, horizon, Utc::now())?
        .ok_or_else(|| PulseCliError::NotFound(id.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&forecast)?);
    Ok(())
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), PulseCliError> {
    let data = read_input(input)?;
    let lines: Vec<&str> = data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut errors = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let result = RawUpdateEvent::from_json(line).and_then(|raw| raw.normalize());
        if let Err(e) = result {
            errors.push(ValidationErrorDetail {
                index,
                error: e.to_string(),
            });
        }
    }

    let report = ValidationReport {
        total_events: lines.len(),
        valid_events: lines.len() - errors.len(),
        invalid_events: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);
        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(PulseCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

fn cmd_doctor(
    state: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("TrustPulse version {ENGINE_VERSION}"),
    });
    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {SCHEMA_VERSION}"),
    });

    if let Some(path) = config {
        let check = match fs::read_to_string(path)
            .map_err(PulseCliError::from)
            .and_then(|json| CategoryConfig::from_json(&json).map_err(PulseCliError::from))
        {
            Ok(table) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config `{}` valid: {} bands, {} dimensions",
                    table.version,
                    table.bands.len(),
                    table.weights.len()
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {e}"),
            },
        };
        checks.push(check);
    }

    if let Some(path) = state {
        let check = if path.exists() {
            match fs::read_to_string(path)
                .map_err(PulseCliError::from)
                .and_then(|json| EngineSnapshot::from_json(&json).map_err(PulseCliError::from))
            {
                Ok(snapshot) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Snapshot valid: {} relationships, {} ledger entries, config `{}`",
                        snapshot.states.len(),
                        snapshot.history.len(),
                        snapshot.config.version
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "state".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid snapshot: {e}"),
                },
            }
        } else {
            DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "Snapshot file does not exist".to_string(),
            }
        };
        checks.push(check);
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), PulseCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input Schema: {SCHEMA_VERSION}");
            println!();
            println!("One JSON object per line:");
            println!("  subject_id      string   originating entity");
            println!("  target_id       string   entity the trust is toward");
            println!("  dimension_code  string   must exist in the config weight table");
            println!("  raw_value       number   normalized observation, 0-100");
            println!("  cause           string   known cause code (see below)");
            println!("  timestamp       string   RFC 3339 UTC");
            println!();
            println!("Known cause codes: trade_completed, trade_defaulted, gift_given,");
            println!("quest_shared, contract_fulfilled, contract_breached, favor_repaid,");
            println!("insult_exchanged, betrayal_exposed, admin_adjustment");
        }
        SchemaType::Output => {
            println!("Output Schemas");
            println!();
            println!("apply/run emit one record per event:");
            println!("  status: committed | rejected");
            println!("  relationship: {{ composite_score, tier, benefits, mood, per_dimension }}");
            println!("  trust_delta, mood_after, crisis_alert_raised");
            println!("  world_pulse: {{ pulse_level, crisis_risk }}");
            println!();
            println!("forecast emits one trajectory:");
            println!("  producer: {{ name, version, instance_id }}");
            println!(
                "  points[]: {{ timestamp, expected_index, mood, confidence, world_pulse }}"
            );
            println!("  horizons: {SUPPORTED_HORIZONS:?} hours");
        }
    }
    Ok(())
}

fn format_output<T: Serialize>(
    records: &[T],
    format: &OutputFormat,
) -> Result<String, PulseCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}
