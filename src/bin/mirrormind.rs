//! MirrorMind CLI - Command-line interface for MirrorMind
//!
//! Commands:
//! - replay: Run a recorded session (NDJSON frames) through the pipeline and log it
//! - classify: Classify a session snapshot JSON
//! - dashboard: Summarize the loop log
//! - doctor: Diagnose configuration and log health
//! - schema: Print input formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mirrormind::config::dirs_config_path;
use mirrormind::dashboard::LogSummary;
use mirrormind::pipeline::LoopProcessor;
use mirrormind::session::{LiveStatus, StopHandle};
use mirrormind::source::NdjsonFrameSource;
use mirrormind::types::{LoopType, SessionSnapshot};
use mirrormind::{LoopClassifier, LoopError, MirrorConfig, PatternLog};
use mirrormind::{MIRRORMIND_VERSION, PRODUCER_NAME};

/// MirrorMind - Behavioral loop detection from face and gaze signals
#[derive(Parser)]
#[command(name = "mirrormind")]
#[command(version = MIRRORMIND_VERSION)]
#[command(about = "Classify behavioral loops from face and gaze sessions", long_about = None)]
struct Cli {
    /// Configuration file (merged over ~/.config/mirrormind/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session and classify it
    Replay {
        /// Input file of NDJSON frames (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Stop after this many seconds of session time
        #[arg(long)]
        max_duration: Option<f64>,

        /// Label for the Pattern column
        #[arg(long)]
        pattern: Option<String>,

        /// Loop log file (defaults to the configured log_path)
        #[arg(long, conflicts_with = "no_log")]
        log: Option<PathBuf>,

        /// Do not append the session to the loop log
        #[arg(long)]
        no_log: bool,

        /// Print in-progress classification for every frame to stderr
        #[arg(long)]
        live: bool,
    },

    /// Classify a session snapshot JSON
    Classify {
        /// Snapshot JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Summarize the loop log
    Dashboard {
        /// Loop log file (defaults to the configured log_path)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Number of recent sessions to list
        #[arg(long)]
        recent: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and loop log health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print input format information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Replay frame (one JSON object per line)
    Frame,
    /// Session snapshot accepted by `classify`
    Snapshot,
    /// Loop log CSV columns
    Log,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), MirrorCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Replay {
            input,
            max_duration,
            pattern,
            log,
            no_log,
            live,
        } => {
            let mut config = MirrorConfig::load_from(config_path)?;
            if max_duration.is_some() {
                config.max_duration_sec = max_duration;
            }
            if let Some(pattern) = pattern {
                config.pattern_label = pattern;
            }
            if let Some(log) = log {
                config.log_path = log;
            }
            cmd_replay(&input, &config, no_log, live)
        }

        Commands::Classify { input } => cmd_classify(&input),

        Commands::Dashboard { log, recent, json } => {
            let config = MirrorConfig::load_from(config_path)?;
            let log_path = log.unwrap_or_else(|| config.log_path.clone());
            cmd_dashboard(&log_path, recent.unwrap_or(config.recent_rows), json)
        }

        Commands::Doctor { json } => cmd_doctor(config_path, json),

        Commands::Schema { schema_type } => {
            cmd_schema(schema_type);
            Ok(())
        }
    }
}

fn open_input(input: &Path) -> Result<Box<dyn BufRead>, MirrorCliError> {
    if input.to_string_lossy() == "-" {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(File::open(input)?)))
    }
}

fn cmd_replay(
    input: &Path,
    config: &MirrorConfig,
    no_log: bool,
    live: bool,
) -> Result<(), MirrorCliError> {
    let source = NdjsonFrameSource::new(open_input(input)?);

    let mut processor = LoopProcessor::from_config(config);
    if no_log {
        processor = processor.without_log();
    }

    let stop = StopHandle::new();
    watch_ctrl_c(stop.clone());

    let outcome = processor.run_session_with(source, |status| {
        if live {
            print_live_status(status);
        }
        stop.poll()
    });

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Turn Ctrl-C into a cooperative stop so the session is still classified and logged
fn watch_ctrl_c(stop: StopHandle) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "cannot watch for Ctrl-C");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("stop requested, finalizing session after the next frame");
                stop.request();
            }
        });
    });
}

fn print_live_status(status: &LiveStatus) {
    eprintln!(
        "[{:>7.2}s] LoopType: {:<15} Break: {:<3} Context: {:<16} Blinks: {}",
        status.elapsed_sec,
        status.loop_type,
        if status.break_suggested { "Yes" } else { "No" },
        status.context,
        status.blink_count
    );
}

fn cmd_classify(input: &Path) -> Result<(), MirrorCliError> {
    let data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let snapshot: SessionSnapshot = serde_json::from_str(&data)?;
    let classification = LoopClassifier::evaluate(&snapshot);

    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

#[derive(Tabled)]
struct LoopRow {
    #[tabled(rename = "Loop Type")]
    loop_type: LoopType,
    #[tabled(rename = "Sessions")]
    count: usize,
    #[tabled(rename = "Share")]
    share: String,
}

#[derive(Tabled)]
struct BreakRow {
    #[tabled(rename = "Break Suggested")]
    label: &'static str,
    #[tabled(rename = "Sessions")]
    count: usize,
}

#[derive(Tabled)]
struct RecentRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Loop Type")]
    loop_type: LoopType,
}

fn cmd_dashboard(log_path: &Path, recent: usize, json: bool) -> Result<(), MirrorCliError> {
    let log = PatternLog::new(log_path);
    if !log.path().exists() {
        return Err(MirrorCliError::NoLog(log_path.to_path_buf()));
    }

    let summary = LogSummary::load(&log, recent)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("MirrorMind Loop Log: {}", log_path.display());
    println!("Sessions: {}", summary.total_sessions);
    if let Some(dominant) = summary.dominant_loop() {
        println!("Most frequent loop: {}", dominant);
    }

    let total = summary.total_sessions.max(1) as f64;
    let loop_rows: Vec<LoopRow> = summary
        .loop_counts
        .iter()
        .map(|c| LoopRow {
            loop_type: c.loop_type,
            count: c.count,
            share: format!("{:.0}%", c.count as f64 / total * 100.0),
        })
        .collect();
    println!("\nLoop Type Distribution\n{}", Table::new(loop_rows));

    let break_rows = vec![
        BreakRow {
            label: "Yes",
            count: summary.breaks_suggested,
        },
        BreakRow {
            label: "No",
            count: summary.breaks_not_suggested,
        },
    ];
    println!("\nBreak Suggestions\n{}", Table::new(break_rows));

    let recent_rows: Vec<RecentRow> = summary
        .recent
        .iter()
        .map(|r| RecentRow {
            timestamp: r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            pattern: r.pattern.clone(),
            context: r.context.to_string(),
            loop_type: r.loop_type,
        })
        .collect();
    println!("\nRecent Patterns\n{}", Table::new(recent_rows));

    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), MirrorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("MirrorMind version {}", MIRRORMIND_VERSION),
    });

    let config = match MirrorConfig::load_from(config_path) {
        Ok(config) => {
            let source = config_path
                .map(|p| p.display().to_string())
                .or_else(|| dirs_config_path().map(|p| p.join("config.toml").display().to_string()))
                .unwrap_or_else(|| "defaults".to_string());
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!("Configuration loaded ({})", source),
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            });
            None
        }
    };

    if let Some(config) = &config {
        let log = PatternLog::new(&config.log_path);
        let check = if log.path().exists() {
            match log.load() {
                Ok(rows) => DoctorCheck {
                    name: "loop_log".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("{} ({} sessions)", log.path().display(), rows.len()),
                },
                Err(e) => DoctorCheck {
                    name: "loop_log".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read {}: {}", log.path().display(), e),
                },
            }
        } else {
            DoctorCheck {
                name: "loop_log".to_string(),
                status: CheckStatus::Warning,
                message: format!(
                    "{} does not exist yet (created on first session)",
                    log.path().display()
                ),
            }
        };
        checks.push(check);

        checks.push(DoctorCheck {
            name: "max_duration".to_string(),
            status: CheckStatus::Ok,
            message: match config.max_duration() {
                Some(d) => format!("Sessions stop after {:.1}s", d.as_secs_f64()),
                None => "Sessions run until the input ends".to_string(),
            },
        });
    }

    // Check stdin is available (for replay from a pipe)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MIRRORMIND_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("MirrorMind Doctor Report");
        println!("========================");
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
        Err(MirrorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) {
    match schema_type {
        SchemaType::Frame => {
            println!("Replay frames: one JSON object per line.");
            println!();
            println!("Every frame has `elapsed_sec` (seconds since session start) and a `kind`:");
            println!();
            println!("1. signal - pre-extracted observations");
            println!(r#"   {{"elapsed_sec": 0.5, "kind": "signal", "face_detected": true, "eyes_detected": true,"#);
            println!(r#"    "eye_closed": false, "smile_detected": false, "scroll_detected": false,"#);
            println!(r#"    "gaze": {{"right": {{"x": 300, "y": 200}}, "left": {{"x": 360, "y": 200}}}}}}"#);
            println!();
            println!("2. face_mesh - raw landmarks (normalized 0..1), heuristics applied here");
            println!(r#"   {{"elapsed_sec": 0.5, "kind": "face_mesh", "width": 640, "height": 480,"#);
            println!(r#"    "faces": [[{{"x": 0.5, "y": 0.4}}, ...]], "hands": [[{{"x": 0.2, "y": 0.7}}, ...]]}}"#);
        }
        SchemaType::Snapshot => {
            println!("Session snapshot (input to `classify`):");
            println!();
            println!("  face_detected    bool   (required) face on the last frame");
            println!("  eyes_detected    bool   (required) irises on the last frame");
            println!("  blink_detected   bool   more than 3 blinks in the session");
            println!("  blink_count      int    closed-to-open transitions");
            println!("  smile_detected   bool   smile on the last frame");
            println!("  scroll_detected  bool   scroll gesture on the last frame");
            println!("  duration_sec     float  session length");
            println!("  gaze_trace       array  [{{\"right\": {{x, y}}, \"left\": {{x, y}}}}, ...]");
        }
        SchemaType::Log => {
            println!("Loop log CSV columns:");
            println!();
            println!("  Timestamp       YYYY-MM-DD HH:MM:SS (local time)");
            println!("  SessionId       UUID");
            println!("  Pattern         pattern label");
            println!("  LoopType        Normal | EscapeLoop | FreezeLoop | DoubtLoop | ComparisonLoop | ConsumptionLoop");
            println!("  DurationSec     session length in seconds");
            println!("  Context         Reading | Writing | Browsing | Writing/Thinking | Escape/Idle | Unknown");
            println!("  BreakSuggested  Yes | No");
        }
    }
}

// Error handling

#[derive(Debug)]
enum MirrorCliError {
    Io(io::Error),
    Loop(LoopError),
    Json(serde_json::Error),
    NoLog(PathBuf),
    DoctorFailed,
}

impl From<io::Error> for MirrorCliError {
    fn from(e: io::Error) -> Self {
        MirrorCliError::Io(e)
    }
}

impl From<LoopError> for MirrorCliError {
    fn from(e: LoopError) -> Self {
        MirrorCliError::Loop(e)
    }
}

impl From<serde_json::Error> for MirrorCliError {
    fn from(e: serde_json::Error) -> Self {
        MirrorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MirrorCliError> for CliError {
    fn from(e: MirrorCliError) -> Self {
        match e {
            MirrorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MirrorCliError::Loop(LoopError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'mirrormind doctor' to inspect configuration".to_string()),
            },
            MirrorCliError::Loop(e) => CliError {
                code: "LOOP_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            MirrorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'mirrormind schema snapshot' for the expected shape".to_string()),
            },
            MirrorCliError::NoLog(path) => CliError {
                code: "NO_LOG".to_string(),
                message: format!("No loop log at {}", path.display()),
                hint: Some("Run a session with 'mirrormind replay' first".to_string()),
            },
            MirrorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
