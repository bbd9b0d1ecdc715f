//! Calm CLI - Command-line interface for Synheart Calm
//!
//! Commands:
//! - simulate: Run a scripted guided session with synthetic signals (NDJSON snapshots)
//! - presets: Print the emotion preset table
//! - geometry: Build the neural geometry and print structure statistics
//! - sessions: List stored sessions with a summary
//! - doctor: Diagnose store and configuration health

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use synheart_calm::geometry::GeometryStats;
use synheart_calm::signals::HandJoint;
use synheart_calm::store::read_sessions;
use synheart_calm::{
    CalmEngine, Emotion, EmotionPresetTable, EngineConfig, EngineError, HandFrame,
    NeuralGeometryBuilder, SessionPhase, SessionStore, CALM_VERSION, PRODUCER_NAME,
};

/// Calm - On-device biofeedback engine
#[derive(Parser)]
#[command(name = "calm")]
#[command(author = "Synheart AI Inc")]
#[command(version = CALM_VERSION)]
#[command(about = "Guided breathing and hand-steadiness stabilization sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted guided session and write NDJSON snapshots
    Simulate {
        /// Emotion to explore
        #[arg(short, long, default_value = "anxiety")]
        emotion: Emotion,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Engine config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Seconds of agitated signals before the user settles
        #[arg(long, default_value = "2.0")]
        settle_after: f64,

        /// Answer "no" to the log prompt
        #[arg(long)]
        no_log: bool,

        /// Upper bound on simulated time in seconds
        #[arg(long, default_value = "60")]
        max_seconds: u64,

        /// RNG seed for synthetic signals
        #[arg(long, default_value = "7")]
        seed: u64,
    },

    /// Print the emotion preset table
    Presets {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Build the neural geometry and print structure statistics
    Geometry {
        /// Connectivity used for the connection graph (0-1)
        #[arg(long, default_value = "0.6")]
        connectivity: f32,

        /// Point cloud size
        #[arg(long, default_value = "5000")]
        points: usize,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List stored sessions with a summary
    Sessions {
        /// Session store file
        #[arg(long)]
        store: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Diagnose store and configuration health
    Doctor {
        /// Check session store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Check engine config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CalmCliError> {
    match cli.command {
        Commands::Simulate {
            emotion,
            output,
            config,
            store,
            settle_after,
            no_log,
            max_seconds,
            seed,
        } => cmd_simulate(
            emotion,
            &output,
            config.as_deref(),
            store.as_deref(),
            settle_after,
            !no_log,
            max_seconds,
            seed,
        ),
        Commands::Presets { format } => cmd_presets(format),
        Commands::Geometry {
            connectivity,
            points,
            seed,
        } => cmd_geometry(connectivity, points, seed),
        Commands::Sessions { store, format } => cmd_sessions(&store, format),
        Commands::Doctor {
            store,
            config,
            json,
        } => cmd_doctor(store.as_deref(), config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CalmCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Monitor-rate step of the simulation
const STEP: Duration = Duration::from_millis(100);
const AUDIO_FRAMES_PER_STEP: usize = 4;
const POSE_FRAMES_PER_STEP: usize = 3;
const AUDIO_FRAME_LEN: usize = 1024;

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    emotion: Emotion,
    output: &Path,
    config: Option<&Path>,
    store: Option<&Path>,
    settle_after: f64,
    log: bool,
    max_seconds: u64,
    seed: u64,
) -> Result<(), CalmCliError> {
    let config = load_config(config)?;
    let store = match store {
        Some(path) => SessionStore::open(path),
        None => SessionStore::in_memory(),
    };
    let mut engine = CalmEngine::with_store(config, store)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut writer: Box<dyn Write> = if output == Path::new("-") {
        Box::new(io::stdout().lock())
    } else {
        Box::new(io::BufWriter::new(fs::File::create(output)?))
    };

    if !engine.select_emotion(emotion) {
        return Err(CalmCliError::Simulation("engine did not accept the selection".to_string()));
    }

    let limit = Duration::from_secs(max_seconds);
    let mut stabilizing_since: Option<Duration> = None;

    while engine.clock() < limit {
        match engine.phase() {
            SessionPhase::LogPrompt => {
                engine.answer_log(log);
            }
            SessionPhase::RestoreButton => {
                engine.restore_balance();
                stabilizing_since = Some(engine.clock());
            }
            _ => {}
        }

        let settled = stabilizing_since
            .map(|start| (engine.clock() - start).as_secs_f64() >= settle_after)
            .unwrap_or(false);

        for _ in 0..AUDIO_FRAMES_PER_STEP {
            let amplitude = if settled { 0.01 } else { rng.gen_range(0.05..0.2) };
            engine.push_audio(&synthetic_breath(amplitude, &mut rng));
        }
        for _ in 0..POSE_FRAMES_PER_STEP {
            let jitter = if settled { 0.001 } else { 0.08 };
            engine.push_hand(&synthetic_hand(jitter, &mut rng));
        }

        engine.advance(STEP);
        writeln!(writer, "{}", serde_json::to_string(&engine.snapshot())?)?;

        if engine.phase() == SessionPhase::Hidden {
            break;
        }
    }
    writer.flush()?;

    if engine.phase() != SessionPhase::Hidden {
        return Err(CalmCliError::Simulation(format!(
            "session did not complete within {max_seconds} s (phase {})",
            engine.phase()
        )));
    }
    Ok(())
}

fn synthetic_breath(amplitude: f32, rng: &mut StdRng) -> Vec<f32> {
    (0..AUDIO_FRAME_LEN)
        .map(|_| rng.gen_range(-1.0f32..=1.0) * amplitude * 1.7)
        .collect()
}

fn synthetic_hand(jitter: f32, rng: &mut StdRng) -> HandFrame {
    let mut offset = || rng.gen_range(-jitter..=jitter);
    let (wx, wy) = (0.5 + offset(), 0.7 + offset());
    HandFrame::empty()
        .with(HandJoint::Wrist, wx, wy, 0.95)
        .with(HandJoint::IndexMcp, wx - 0.04, wy - 0.1, 0.9)
        .with(HandJoint::MiddleMcp, wx, wy - 0.11, 0.9)
        .with(HandJoint::RingMcp, wx + 0.04, wy - 0.1, 0.9)
        .with(HandJoint::LittleMcp, wx + 0.07, wy - 0.08, 0.9)
        .with(HandJoint::IndexPip, wx - 0.05, wy - 0.18, 0.9)
        .with(HandJoint::MiddlePip, wx, wy - 0.2, 0.9)
        .with(HandJoint::RingPip, wx + 0.05, wy - 0.18, 0.9)
        .with(HandJoint::LittlePip, wx + 0.09, wy - 0.15, 0.9)
        .with(HandJoint::IndexTip, wx - 0.06, wy - 0.27, 0.9)
        .with(HandJoint::MiddleTip, wx, wy - 0.3, 0.9)
        .with(HandJoint::RingTip, wx + 0.06, wy - 0.27, 0.9)
        .with(HandJoint::LittleTip, wx + 0.11, wy - 0.22, 0.9)
}

fn cmd_presets(format: OutputFormat) -> Result<(), CalmCliError> {
    let table = EmotionPresetTable::new();
    match format {
        OutputFormat::Json => {
            let presets: serde_json::Map<String, serde_json::Value> = table
                .iter()
                .map(|(emotion, preset)| Ok((emotion.to_string(), serde_json::to_value(preset)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
        OutputFormat::Text => {
            println!(
                "{:<8} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
                "emotion", "turb", "pulse", "conn", "vel", "birth", "opac", "rot", "glow"
            );
            for (emotion, p) in table.iter() {
                println!(
                    "{:<8} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.2} {:>6.0} {:>6.2}",
                    emotion.as_str(),
                    p.turbulence,
                    p.pulse_period,
                    p.connectivity,
                    p.particle_velocity,
                    p.birth_rate,
                    p.connection_opacity,
                    p.rotation_period,
                    p.glow_intensity
                );
            }
        }
    }
    Ok(())
}

fn cmd_geometry(connectivity: f32, points: usize, seed: Option<u64>) -> Result<(), CalmCliError> {
    let mut config = EngineConfig::default();
    config.geometry.point_count = points;
    config.geometry.seed = seed;
    config.validate()?;

    let builder = NeuralGeometryBuilder::new(config.geometry);
    let (geometry, graph) = builder.build_all(connectivity);
    let stats = GeometryStats::new(&geometry, &graph);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_sessions(path: &Path, format: OutputFormat) -> Result<(), CalmCliError> {
    let store = SessionStore::open(path);
    let summary = store.summary();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "sessions": store.sessions(),
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for session in store.sessions() {
                println!(
                    "{}  {:<8} {:>6.1}s  {:<8} {}",
                    session.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    session.emotion.as_str(),
                    session.stabilization_duration,
                    session.breathing_quality.as_str(),
                    if session.is_logged { "logged" } else { "-" }
                );
            }
            println!("\nTotal: {} ({} logged)", summary.total, summary.logged);
            if let Some(mean) = summary.mean_stabilization_sec {
                println!("Mean stabilization: {mean:.1}s");
            }
        }
    }
    Ok(())
}

fn cmd_doctor(store: Option<&Path>, config: Option<&Path>, json: bool) -> Result<(), CalmCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "calm_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Calm version {}", CALM_VERSION),
    });

    // Check config file if provided
    if let Some(config_path) = config {
        checks.push(match fs::read_to_string(config_path) {
            Ok(content) => match EngineConfig::from_json(&content) {
                Ok(_) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: "Config file valid".to_string(),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        });
    }

    // Check session store if provided
    if let Some(store_path) = store {
        let check = if !store_path.exists() {
            DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store file does not exist (starts empty)".to_string(),
            }
        } else {
            match read_sessions(store_path) {
                Ok(sessions) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Store file valid ({} sessions)", sessions.len()),
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Store unreadable, engine would start empty: {}", e),
                },
            }
        };
        checks.push(check);

        let tmp = store_path.with_extension("json.tmp");
        if tmp.exists() {
            checks.push(DoctorCheck {
                name: "store_tmp".to_string(),
                status: CheckStatus::Warning,
                message: format!("Leftover temp file from an interrupted write: {}", tmp.display()),
            });
        }
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CALM_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Calm Doctor Report");
        println!("==================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CalmCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum CalmCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    Simulation(String),
    DoctorFailed,
}

impl From<io::Error> for CalmCliError {
    fn from(e: io::Error) -> Self {
        CalmCliError::Io(e)
    }
}

impl From<EngineError> for CalmCliError {
    fn from(e: EngineError) -> Self {
        CalmCliError::Engine(e)
    }
}

impl From<serde_json::Error> for CalmCliError {
    fn from(e: serde_json::Error) -> Self {
        CalmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CalmCliError> for CliError {
    fn from(e: CalmCliError) -> Self {
        match e {
            CalmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CalmCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'calm doctor --config <file>' to check the configuration".to_string()),
            },
            CalmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CalmCliError::Simulation(msg) => CliError {
                code: "SIMULATION_INCOMPLETE".to_string(),
                message: msg,
                hint: Some("Increase --max-seconds or lower --settle-after".to_string()),
            },
            CalmCliError::DoctorFailed => CliError {
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
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
