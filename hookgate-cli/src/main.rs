//! Hookgate - priority-ordered front controller for coding agent hooks
//!
//! Outer adapter: reads one hook event, asks the engine for a decision, and
//! translates it into the hook protocol's stdout, stderr, and exit code.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hookgate_core::bootstrap;
use hookgate_core::daemon::{self, Daemon, DaemonRequest};
use hookgate_core::engine::config::DEFAULT_CONFIG_TEMPLATE;
use hookgate_core::engine::global_config::GlobalPaths;
use hookgate_core::engine::{Engine, EngineConfig, HandlerInfo};
use hookgate_core::harness::types::HookEventName;
use hookgate_core::harness::{AdapterEnv, ClaudeHarness, HookOutput, EXIT_FATAL};

mod harness_config;

/// Trace modules for dispatch tracing
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Dispatch,
    Registry,
    Handlers,
    Daemon,
    All,
}

impl TraceModule {
    fn directives(&self) -> &'static [&'static str] {
        match self {
            TraceModule::Dispatch => &["hookgate_core::engine::dispatcher=trace"],
            TraceModule::Registry => &[
                "hookgate_core::engine::registry=trace",
                "hookgate_core::bootstrap=trace",
            ],
            TraceModule::Handlers => &["hookgate_core::handlers=trace"],
            TraceModule::Daemon => &["hookgate_core::daemon=trace"],
            TraceModule::All => &["hookgate_core=trace", "hookgate=trace"],
        }
    }
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "hookgate",
    about = "Priority-ordered front controller for coding agent hooks",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable dispatch tracing (comma-separated: dispatch,registry,handlers,daemon,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level [default: warn for eval, info otherwise]
    #[clap(long, global = true)]
    log_level: Option<LogLevel>,

    /// Override global configuration file path
    #[clap(long, global = true)]
    global_config: Option<PathBuf>,

    /// Project root [default: $CLAUDE_PROJECT_DIR, then the current directory]
    #[clap(long, global = true)]
    project_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Dispatch one hook event read from stdin
    Eval {
        /// Hook event kind (PreToolUse, PostToolUse, UserPromptSubmit, ...)
        #[clap(long)]
        event: HookEventName,

        /// Forward the event to a running daemon instead of evaluating in-process
        #[clap(long)]
        socket: Option<PathBuf>,
    },

    /// Show the registered handlers in dispatch order
    List {
        /// Only this event kind
        #[clap(long)]
        event: Option<HookEventName>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Build every registry from configuration and report problems
    Verify,

    /// Write a default configuration and install the hooks
    Init {
        /// Initialize global (machine-wide) configuration instead of project
        #[clap(long)]
        global: bool,
    },

    /// Serve hook events over a Unix domain socket
    Daemon {
        #[clap(long)]
        socket: PathBuf,
    },
}

fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for directive in trace_modules.iter().flat_map(TraceModule::directives) {
        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    // stdout carries the hook response; logs always go to stderr
    if !trace_modules.is_empty() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(trace_modules = ?trace_modules, "Hookgate dispatch tracing enabled");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Command::Eval { .. } => LogLevel::Warn,
        _ => LogLevel::Info,
    };
    initialize_tracing(cli.log_level.as_ref().unwrap_or(&default_level), &cli.trace);

    let config = EngineConfig::new(resolve_project_dir(cli.project_dir))
        .with_global_config(cli.global_config);

    match cli.command {
        Command::Eval { event, socket } => eval_command(config, event, socket).await,
        Command::List { event, json } => list_command(config, event, json),
        Command::Verify => verify_command(config),
        Command::Init { global } => init_command(config, global),
        Command::Daemon { socket } => daemon_command(config, socket).await,
    }
}

fn resolve_project_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| AdapterEnv::from_process_env().project_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn emit(output: &HookOutput) -> ! {
    println!("{}", output.stdout);
    if let Some(diagnostic) = &output.stderr {
        eprintln!("{diagnostic}");
    }
    std::process::exit(output.exit_code)
}

async fn eval_command(
    config: EngineConfig,
    kind: HookEventName,
    socket: Option<PathBuf>,
) -> Result<()> {
    let mut buffer = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buffer) {
        warn!(error = %e, "Failed to read hook event from stdin; default allow");
        emit(&HookOutput::fail_open());
    }
    let env = AdapterEnv::from_process_env();

    if let Some(socket) = socket {
        let Ok(payload) = serde_json::from_str::<Value>(&buffer) else {
            warn!("Hook event is not valid JSON; default allow");
            emit(&HookOutput::fail_open());
        };
        let request = DaemonRequest {
            event: kind,
            payload,
            env: env.clone(),
        };
        match daemon::send_request(&socket, &request).await {
            Ok(output) => emit(&output),
            Err(e) => warn!(
                error = %format!("{e:#}"),
                "Daemon unavailable; evaluating in-process"
            ),
        }
    }

    debug!("Initializing Hookgate engine for {:?}", config.project_dir);
    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Fatal: Hookgate engine failed to initialize: {:#}", e);
            eprintln!("Error: could not start the Hookgate engine: {e:#}");
            std::process::exit(EXIT_FATAL);
        }
    };

    let decision = engine.evaluate_input(kind, &buffer, &env).await;
    let output = ClaudeHarness::format_response(kind, &decision).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode hook response; default allow");
        HookOutput::fail_open()
    });
    emit(&output)
}

#[derive(Tabled)]
struct HandlerTableRow {
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "#")]
    order: usize,
    #[tabled(rename = "Priority")]
    priority: u8,
    #[tabled(rename = "Handler")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "On failure")]
    failure_mode: String,
}

fn list_command(config: EngineConfig, only: Option<HookEventName>, json: bool) -> Result<()> {
    let engine = Engine::new(config).context("Failed to initialize the Hookgate engine")?;

    let listing: BTreeMap<String, Vec<HandlerInfo>> = HookEventName::ALL
        .into_iter()
        .filter(|kind| only.map_or(true, |wanted| wanted == *kind))
        .map(|kind| (kind.to_string(), engine.handlers(kind)))
        .filter(|(_, handlers)| only.is_some() || !handlers.is_empty())
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    let rows: Vec<HandlerTableRow> = listing
        .iter()
        .flat_map(|(event, handlers)| {
            handlers.iter().map(move |info| HandlerTableRow {
                event: event.clone(),
                order: info.order,
                priority: info.priority,
                name: info.name.clone(),
                category: info.category.to_string(),
                failure_mode: info.failure_mode.to_string(),
            })
        })
        .collect();

    if rows.is_empty() {
        println!("No handlers registered.");
        return Ok(());
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

fn verify_command(config: EngineConfig) -> Result<()> {
    info!("Verifying Hookgate configuration...");

    println!("\n=== Configuration ===");
    let paths = match config.paths() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(EXIT_FATAL);
        }
    };
    match &paths.global_config {
        Some(global) => println!("✅ Global config: {}", global.display()),
        None => println!("   Global config: none"),
    }
    if paths.config_file.exists() {
        println!("✅ Project config: {}", paths.config_file.display());
    } else {
        println!("   Project config: none (defaults apply)");
    }

    let settings = match config.load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(EXIT_FATAL);
        }
    };

    println!("\n=== Registries ===");
    let mut registries = match bootstrap::build_registries(&settings) {
        Ok(registries) => registries,
        Err(e) => {
            eprintln!("❌ {e:#}");
            std::process::exit(EXIT_FATAL);
        }
    };
    for kind in HookEventName::ALL {
        let count = registries.take(kind).map_or(0, |r| r.len());
        println!("  {kind:<18} {count} handler(s)");
    }
    if !settings.disabled.is_empty() {
        println!("  disabled: {}", settings.disabled.join(", "));
    }

    println!("\n✅ Verification complete!");
    Ok(())
}

fn init_command(config: EngineConfig, global: bool) -> Result<()> {
    if global {
        let paths = GlobalPaths::default_location()?;
        if paths.initialize(DEFAULT_CONFIG_TEMPLATE)? {
            println!("✅ Created {}", paths.config_file.display());
        } else {
            println!("   Keeping existing {}", paths.config_file.display());
        }
    } else {
        let paths = config.paths()?;
        std::fs::create_dir_all(&paths.claude_dir)
            .with_context(|| format!("Failed to create {}", paths.claude_dir.display()))?;
        if paths.config_file.exists() {
            println!("   Keeping existing {}", paths.config_file.display());
        } else {
            std::fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE)
                .with_context(|| format!("Failed to write {}", paths.config_file.display()))?;
            println!("✅ Created {}", paths.config_file.display());
        }
    }

    let settings = config.load().unwrap_or_default();
    let kinds: Vec<HookEventName> = bootstrap::builtin_handlers(&settings)
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();

    let settings_path = harness_config::settings_path(&config.project_dir, global)?;
    if harness_config::install_hooks(&settings_path, &kinds)? {
        println!("✅ Merged Hookgate hooks into {}", settings_path.display());
    } else {
        println!("✅ Created {}", settings_path.display());
    }
    Ok(())
}

async fn daemon_command(config: EngineConfig, socket: PathBuf) -> Result<()> {
    let engine = Engine::new(config).context("Failed to initialize the Hookgate engine")?;
    Daemon::new(engine, socket).run().await
}
