use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use stepbot::config::{self as cfg, EngineConfig, LogLevel};
use stepbot::control::{self, ControlCommand};
use stepbot::executor::{
    EnigoDriver, ExecutionState, InputActionDispatcher, ResolverConditionEvaluator,
    ScreenElementResolver, ScriptExecutor,
};
use stepbot::journal::{ExecutionEvent, ExecutionJournal};
use stepbot::observer::ObserverManager;
use stepbot::validation::validate_script;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    Script,
    Config,
}

/// Stepbot CLI
#[derive(Debug, Parser)]
#[command(
    name = stepbot::PKG_NAME,
    version = stepbot::PKG_VERSION,
    about = "Run desktop-automation scripts with background screen observers"
)]
struct Args {
    /// Path to the JSON script to run
    #[arg(short = 's', long = "script", required_unless_present = "print_schema")]
    script: Option<PathBuf>,

    /// Path to the JSON engine configuration file (defaults apply when omitted)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides config and RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for scripts or for the configuration and exit
    #[arg(long = "print-schema", value_enum)]
    print_schema: Option<SchemaKind>,

    /// Validate the script, print issues and exit
    #[arg(long = "validate-only")]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(kind) = args.print_schema {
        let schema = match kind {
            SchemaKind::Script => cfg::generate_script_schema(),
            SchemaKind::Config => cfg::generate_schema(),
        };
        cfg::write_schema_to_writer(&schema, std::io::stdout().lock())?;
        println!();
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => cfg::load_from_path_async(path).await?,
        None => EngineConfig::default(),
    };
    if args.dry_run {
        config.input.dry_run = true;
    }

    let cli_level = match args.log_level.as_deref() {
        Some(raw) => match LogLevel::parse(raw) {
            Some(level) => Some(level),
            None => bail!("Unknown log level '{raw}'"),
        },
        None => None,
    };
    stepbot::init_tracing(cli_level.or(config.logging.level));

    let script_path = args
        .script
        .as_ref()
        .context("--script is required")?;
    info!(
        version = stepbot::PKG_VERSION,
        script = %script_path.display(),
        dry_run = config.input.dry_run,
        "Starting Stepbot"
    );

    let script = cfg::load_script_from_path_async(script_path).await?;
    let report = validate_script(&script);
    for issue in &report.issues {
        match issue.severity {
            stepbot::validation::Severity::Error => error!(target: "stepbot", "{issue}"),
            stepbot::validation::Severity::Warning => warn!(target: "stepbot", "{issue}"),
        }
    }
    if args.validate_only {
        println!(
            "{}: {} error(s), {} warning(s)",
            script.name,
            report.errors().count(),
            report.warnings().count()
        );
        if report.has_errors() {
            bail!("Script '{}' is invalid", script.name);
        }
        return Ok(());
    }
    if report.has_errors() {
        bail!(
            "Script '{}' has {} validation error(s); refusing to run",
            script.name,
            report.errors().count()
        );
    }

    let check_delay = config.observer.check_delay_for(&script.settings);
    debug!(target: "stepbot", check_delay_ms = check_delay.as_millis() as u64, "Observer tick delay");

    let input = Arc::new(EnigoDriver::new(config.input.clone())?);
    let resolver = Arc::new(ScreenElementResolver::new(stepbot::vision::default_vision()));
    let evaluator = Arc::new(ResolverConditionEvaluator::new(resolver.clone()));
    let observers = ObserverManager::new(evaluator.clone(), check_delay);
    let journal = Arc::new(ExecutionJournal::new(config.logging.max_entries));
    let executor = ScriptExecutor::builder(
        Arc::new(InputActionDispatcher::new(input)),
        resolver,
        evaluator,
        observers,
    )
    .events(journal.clone())
    .options(config.executor.clone())
    .build();
    debug!(target: "stepbot", "Executor assembled");

    if !executor.start(script) {
        bail!("Executor refused to start");
    }

    let (tx, mut rx) = mpsc::channel::<ControlCommand>(16);
    let _reader = control::spawn_line_reader(std::io::stdin(), tx)
        .context("Failed to start the stdin reader")?;
    println!("Commands: pause | resume | stop | status");

    let mut poll = tokio::time::interval(Duration::from_millis(200));
    let mut input_open = true;
    loop {
        tokio::select! {
            command = rx.recv(), if input_open => match command {
                Some(command) => {
                    if let Some(status) = command.apply(&executor) {
                        println!("{status}");
                    }
                    if command == ControlCommand::Stop {
                        break;
                    }
                }
                // Input closed; keep running until Ctrl+C or the script stops itself.
                None => input_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                executor.stop();
                break;
            }
            _ = poll.tick() => {
                if executor.state() == ExecutionState::Idle {
                    info!("Script finished");
                    break;
                }
            }
        }
    }

    // Let the foreground task unwind.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while executor.state() != ExecutionState::Idle && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    print_summary(&executor, &journal);
    info!("Stepbot exited");
    Ok(())
}

fn print_summary(executor: &ScriptExecutor, journal: &ExecutionJournal) {
    let events = journal.events();
    let succeeded = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepSucceeded { .. }))
        .count();
    let failed = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::StepFailed { .. }))
        .count();
    let triggered = events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::ObserverTriggered { .. }))
        .count();
    let context = executor.context();
    println!(
        "{} iteration(s), {succeeded} step(s) succeeded, {failed} failed, {triggered} observer trigger(s) (last {} events)",
        context.iteration_count,
        events.len()
    );
}
