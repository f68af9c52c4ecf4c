//! eflux - Command-line interface for Engagement Flux
//!
//! Commands:
//! - analyze: Score, classify and rank a cohort
//! - validate: Validate a cohort payload without analyzing it
//! - config: Print a default configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use engagement_flux::report::render_summary;
use engagement_flux::schema::CohortAdapter;
use engagement_flux::types::Counter;
use engagement_flux::{
    AnalysisConfig, ClassificationPolicy, ComputeError, EngagementPipeline, ReportEncoder,
    FLUX_VERSION, PRODUCER_NAME,
};

/// eflux - Deterministic engagement metrics and composite scoring
#[derive(Parser)]
#[command(name = "eflux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Score, classify and rank engagement cohorts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score, classify and rank a cohort
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Scoring flavor (ignored when --config is given, unless it disagrees)
        #[arg(long)]
        flavor: Option<FlavorArg>,

        /// Primary counter for the engagement flavor (likes, comments, shares, views, ...)
        #[arg(long)]
        counter: Option<String>,

        /// Classification policy (overrides the configuration)
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Analysis configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Validate a cohort payload
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration for a flavor
    Config {
        #[arg(long, default_value = "engagement")]
        flavor: FlavorArg,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FlavorArg {
    /// Eight metrics over one counter
    Engagement,
    /// Feature vector over views, likes, comments and shares
    Content,
}

impl FlavorArg {
    fn as_str(&self) -> &'static str {
        match self {
            FlavorArg::Engagement => "engagement",
            FlavorArg::Content => "content",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Fixed thresholds on the composite score
    Absolute,
    /// Percentile rank within the cohort
    Percentile,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// Human-readable summary
    Summary,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), CliFailure> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            flavor,
            counter,
            policy,
            config,
            format,
        } => cmd_analyze(
            &input,
            &output,
            flavor,
            counter.as_deref(),
            policy,
            config.as_deref(),
            format,
        ),
        Commands::Validate { input, json } => cmd_validate(&input, json),
        Commands::Config { flavor } => cmd_config(flavor),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn read_input(path: &Path) -> Result<String, CliFailure> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, contents: &str) -> Result<(), CliFailure> {
    if path.to_string_lossy() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{contents}")?;
        handle.flush()?;
    } else {
        fs::write(path, format!("{contents}\n"))?;
    }
    Ok(())
}

/// Resolve the configuration: file or flavor default, then flag overrides
fn resolve_config(
    flavor: Option<FlavorArg>,
    counter: Option<&str>,
    policy: Option<PolicyArg>,
    config_path: Option<&Path>,
) -> Result<AnalysisConfig, CliFailure> {
    let mut config = match config_path {
        Some(path) => {
            let config = AnalysisConfig::from_json(&fs::read_to_string(path)?)?;
            if let Some(flavor) = flavor {
                if flavor.as_str() != config.flavor.as_str() {
                    return Err(CliFailure::Compute(ComputeError::ConfigurationError(
                        format!(
                            "--flavor {} disagrees with the {} flavor in {}",
                            flavor.as_str(),
                            config.flavor.as_str(),
                            path.display()
                        ),
                    )));
                }
            }
            config
        }
        None => AnalysisConfig::for_flavor(flavor.unwrap_or(FlavorArg::Engagement).as_str())?,
    };

    if let Some(counter) = counter {
        config = config.with_counter(Counter::from_name(counter))?;
    }
    if let Some(policy) = policy {
        let policy = match policy {
            PolicyArg::Absolute => ClassificationPolicy::absolute(),
            PolicyArg::Percentile => ClassificationPolicy::percentile(),
        };
        config = config.with_policy(policy);
    }
    config.validate()?;
    Ok(config)
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    flavor: Option<FlavorArg>,
    counter: Option<&str>,
    policy: Option<PolicyArg>,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), CliFailure> {
    let config = resolve_config(flavor, counter, policy, config_path)?;
    let input_data = read_input(input)?;

    let pipeline = EngagementPipeline::new(config)?;
    let analysis = pipeline.analyze_json(&input_data)?;
    if analysis.outcomes.is_empty() {
        return Err(CliFailure::NoEntities);
    }

    let report = ReportEncoder::new().encode(&analysis, pipeline.config());
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
        OutputFormat::Summary => render_summary(&report),
    };
    write_output(output, rendered.trim_end())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), CliFailure> {
    let input_data = read_input(input)?;
    let entities = CohortAdapter::parse(&input_data)?;
    let report = CohortAdapter::validate_cohort(&entities);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Entities:         {}", report.entities);
        println!("Events:           {}", report.events);
        println!("Valid entities:   {}", report.valid);
        println!("Invalid entities: {}", report.issues.len());

        if !report.issues.is_empty() {
            println!("\nErrors:");
            for issue in &report.issues {
                println!(
                    "  - Entity {} (index {}): {}",
                    issue.id, issue.index, issue.message
                );
            }
        }
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliFailure::ValidationFailed(report.issues.len()))
    }
}

fn cmd_config(flavor: FlavorArg) -> Result<(), CliFailure> {
    let config = AnalysisConfig::for_flavor(flavor.as_str())?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), CliFailure> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Flux version {FLUX_VERSION}"),
    });

    // Built-in defaults must always validate
    for name in ["engagement", "content"] {
        let check = match AnalysisConfig::for_flavor(name).and_then(|c| c.validate()) {
            Ok(()) => DoctorCheck {
                name: format!("default_{name}_config"),
                status: CheckStatus::Ok,
                message: "Default configuration is valid".to_string(),
            },
            Err(e) => DoctorCheck {
                name: format!("default_{name}_config"),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    if let Some(path) = config_path {
        let check = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match AnalysisConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Valid {} configuration, weights {} v{}, {} policy",
                            config.flavor.as_str(),
                            config.weights.name,
                            config.weights.version,
                            config.policy.as_str()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {e}"),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            }
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    checks.push(DoctorCheck {
        name: "logging".to_string(),
        status: CheckStatus::Ok,
        message: match std::env::var("RUST_LOG") {
            Ok(filter) => format!("RUST_LOG={filter}"),
            Err(_) => "RUST_LOG unset (warnings only)".to_string(),
        },
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Flux Doctor Report");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

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

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoEntities,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<ComputeError> for CliFailure {
    fn from(e: ComputeError) -> Self {
        CliFailure::Compute(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Compute(e) => {
                let hint = match &e {
                    ComputeError::ConfigurationError(_) => {
                        "Run 'eflux config' for a valid starting point"
                    }
                    ComputeError::CohortEmpty(_) => "No entity could be scored",
                    _ => "Run 'eflux validate' for details",
                };
                CliError {
                    code: e.code().to_uppercase(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::NoEntities => CliError {
                code: "NO_ENTITIES".to_string(),
                message: "No entities found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            CliFailure::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} entities failed validation"),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CliFailure::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: None,
            },
        }
    }
}
