//! CLI entrypoint for tether
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_application::{HotlHook, Session, SessionReport};
use tether_domain::SessionId;
use tether_infrastructure::{
    ConfigLoader, Connector, FileConfig, FileContinuationStore, JsonlConversationLogger,
    LocalToolRegistry, RemoteAgentBackend, ShellContinuationHook, ShellLifecycleHook,
    TransportKind,
};
use tether_presentation::{Cli, ConsoleNotifier, ConsoleOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    let config = load_config(&cli)?;

    if cli.show_config {
        println!("{}", ConfigLoader::describe_sources(cli.config.as_deref()));
        println!();
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to render configuration")?
        );
        return Ok(());
    }

    let problems = config.validate();
    if !problems.is_empty() {
        let list: Vec<String> = problems.iter().map(|p| format!("  - {}", p)).collect();
        bail!("Invalid configuration:\n{}", list.join("\n"));
    }

    let cwd = resolve_cwd(cli.cwd.as_deref())?;
    info!(cwd = %cwd.display(), "Starting tether");

    // === Dependency Injection ===
    let connector = config.backend.connector(&cwd);
    let target = connector.target();
    let backend = Arc::new(
        RemoteAgentBackend::connect(
            connector,
            config.backend.framing,
            config.reconnect.to_policy(),
        )
        .await
        .with_context(|| format!("Failed to connect to backend at {}", target))?,
    );

    let registry = Arc::new(LocalToolRegistry::read_only().with_cwd(&cwd));
    let notifier = Arc::new(ConsoleNotifier::new(ConsoleOptions {
        quiet: cli.quiet,
        show_reasoning: cli.verbose > 0,
    }));
    let store = Arc::new(FileContinuationStore::new(
        cwd.join(&config.continuation.state_dir),
    ));

    let mut builder = Session::builder(backend, registry)
        .with_params(config.session_params(&cwd))
        .with_notifier(notifier)
        .with_store(store);

    if let Some(path) = config.logging.conversation_log_path() {
        match JsonlConversationLogger::new(cwd.join(&path)) {
            Some(logger) => builder = builder.with_logger(Arc::new(logger)),
            None => warn!(path = %path.display(), "Conversation log disabled"),
        }
    }

    if cli.hotl
        && let Some(prompt) = &cli.prompt
    {
        let mut hook = HotlHook::new(prompt.clone()).with_auto_respond(cli.auto_respond);
        if let Some(promise) = &cli.promise {
            hook = hook.with_promise(promise.clone());
        }
        builder = builder.with_hook(Arc::new(hook));
    }

    for command in &config.continuation.hooks {
        builder = builder.with_hook(Arc::new(
            ShellContinuationHook::new(command.clone())
                .with_timeout(config.continuation.hook_timeout())
                .with_cwd(&cwd),
        ));
    }

    for (event, command) in config.hooks.commands() {
        builder = builder.with_lifecycle_hook(Arc::new(
            ShellLifecycleHook::new(event, command)
                .with_timeout(config.hooks.timeout())
                .with_cwd(&cwd),
        ));
    }

    let session = Arc::new(match &cli.resume {
        Some(id) => {
            let id = SessionId::parse(id.clone())?;
            builder
                .resume(id.clone())
                .await
                .with_context(|| format!("Failed to resume session {}", id))?
        }
        None => builder.create().await.context("Failed to create session")?,
    });

    info!(session = %session.id(), "Session ready");
    if !cli.quiet {
        eprintln!("Session {}", session.id());
    }

    spawn_interrupt_handler(Arc::clone(&session));

    let mut all_completed = true;

    if cli.resume.is_some()
        && let Some(report) = session.resume_continuation().await?
    {
        all_completed &= finish(&report, cli.quiet);
    }

    match &cli.prompt {
        Some(prompt) => {
            let report = session.submit(prompt).await?;
            all_completed &= finish(&report, cli.quiet);
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
                let prompt = line.trim();
                if prompt.is_empty() {
                    continue;
                }
                let report = session.submit(prompt).await?;
                all_completed &= finish(&report, cli.quiet);
            }
        }
    }

    if !all_completed {
        bail!("One or more turns did not complete");
    }
    Ok(())
}

/// Install the tracing subscriber. The returned guard flushes the log file.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::try_from_default_env().context("Invalid RUST_LOG")?,
        Err(_) => match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        },
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Merge config sources, then apply command-line overrides.
fn load_config(cli: &Cli) -> Result<FileConfig> {
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    if let Some(address) = &cli.connect {
        config.backend.transport = TransportKind::Tcp;
        config.backend.address = address.clone();
    }
    if let Some(command) = &cli.command {
        let mut parts = command.split_whitespace().map(str::to_string);
        config.backend.transport = TransportKind::Process;
        config.backend.command = parts.next().unwrap_or_default();
        config.backend.args = parts.collect();
    }
    if let Some(max) = cli.max_iterations {
        config.continuation.max_iterations = max;
    }
    config.continuation.hooks.extend(cli.hook.iter().cloned());
    config.hooks.prompt_submit.extend(cli.prompt_hook.iter().cloned());
    config.hooks.tool_start.extend(cli.tool_hook.iter().cloned());

    Ok(config)
}

fn resolve_cwd(cwd: Option<&Path>) -> Result<PathBuf> {
    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    cwd.canonicalize()
        .with_context(|| format!("Invalid working directory: {}", cwd.display()))
}

/// First Ctrl-C cancels the running turn; a second one with nothing running exits.
fn spawn_interrupt_handler(session: Arc<Session>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if session.is_busy() {
                info!("Interrupt received, cancelling turn");
                session.cancel();
            } else {
                std::process::exit(130);
            }
        }
    });
}

/// Report the end of a submit. Returns whether the last turn completed.
fn finish(report: &SessionReport, quiet: bool) -> bool {
    if !quiet && report.continuations() > 0 {
        let reason = report
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "turn ended".to_string());
        eprintln!(
            "{} turns ({} continuations), stopped: {}",
            report.outcomes.len(),
            report.continuations(),
            reason
        );
    }
    report.last().is_some_and(|outcome| outcome.is_completed())
}
