use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bibcheck_core::config_file;
use bibcheck_core::{
    Chooser, Config, DeclineAll, Diagnostics, Pipeline, ProgressEvent, RevisionAdapter,
};
use bibcheck_dblp::DblpClient;

mod output;
mod prompt;

use output::ColorMode;
use prompt::TerminalChooser;

/// Reconcile a BibTeX file against DBLP and report what needs a human
#[derive(Parser, Debug)]
#[command(name = "bib-check", version, about, long_about = None)]
struct Cli {
    /// Path to the .bib file to check
    input: PathBuf,

    /// Where to write the checked bibliography [default: <input>.chk.bib]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Look entries up on DBLP and merge authoritative records
    #[arg(long)]
    dblp: bool,

    /// Revise titles and venue names with a completion service
    #[arg(long)]
    ai: bool,

    /// Completion service name (used in the default base URL)
    #[arg(long)]
    ai_service: Option<String>,

    /// Completion model
    #[arg(long)]
    ai_model: Option<String>,

    /// Completion service API key (or BIBCHECK_AI_KEY)
    #[arg(long)]
    ai_key: Option<String>,

    /// Report unrecognized entry types as warnings instead of stopping
    #[arg(long)]
    suppress_type: bool,

    /// Never prompt; ambiguous entries are flagged for manual review
    #[arg(long)]
    no_interactive: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Config file applied over the platform and ./.bib-check.toml files
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the log file
    #[arg(long, default_value = "bib-check.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_file)?;

    let color = ColorMode(!cli.no_color && std::io::stdout().is_terminal());
    let config = load_config(&cli)?;
    tracing::info!(?config, "starting run");

    check(&cli, &config, color).await
}

/// Send `tracing` output to the log file; `RUST_LOG` overrides the `warn`
/// default.
fn init_logging(path: &Path) -> anyhow::Result<WorkerGuard> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

/// Resolve configuration: CLI flags > env vars > --config > ./.bib-check.toml
/// > platform config > defaults.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut file = config_file::load_config();
    if let Some(path) = &cli.config {
        file = config_file::merge(file, config_file::load_explicit(path)?);
    }

    let mut config = Config::default();
    file.apply(&mut config)?;

    let env_key = std::env::var("BIBCHECK_AI_KEY").ok();
    apply_cli(cli, env_key, std::io::stdin().is_terminal(), &mut config);
    Ok(config)
}

fn apply_cli(cli: &Cli, env_key: Option<String>, stdin_is_terminal: bool, config: &mut Config) {
    config.use_dblp = cli.dblp;
    config.use_ai = cli.ai;
    if cli.suppress_type {
        config.suppress_type = true;
    }
    config.interactive = !cli.no_interactive && stdin_is_terminal;

    if let Some(service) = &cli.ai_service {
        config.ai.service = service.clone();
        // A base URL from a config file belongs to the service it named.
        config.ai.base_url = None;
    }
    if let Some(model) = &cli.ai_model {
        config.ai.model = model.clone();
    }
    if let Some(key) = cli.ai_key.clone().or(env_key) {
        config.ai.api_key = Some(key);
    }
}

/// `refs.bib` -> `refs.chk.bib`.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("chk.bib")
}

async fn check(cli: &Cli, config: &Config, color: ColorMode) -> anyhow::Result<ExitCode> {
    let input = &cli.input;
    if !input.exists() {
        anyhow::bail!("File not found: {}", input.display());
    }
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    if output_path == *input {
        anyhow::bail!("refusing to overwrite the input file {}", input.display());
    }

    let parsed = bibcheck_bib::read_file(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let mut diagnostics = Diagnostics::new();
    parsed.report_failures(&mut diagnostics);

    let database = if config.use_dblp {
        Some(DblpClient::new(&config.dblp).context("cannot set up the DBLP client")?)
    } else {
        None
    };
    let reviser = if config.use_ai {
        let client = config.ai.client()?;
        Some(RevisionAdapter::new(Box::new(client), config.revision.clone()))
    } else {
        None
    };

    let mut passes = Vec::new();
    if database.is_some() {
        passes.push("DBLP");
    }
    if let Some(r) = &reviser {
        passes.push(r.service_name());
    }

    let mut stdout = std::io::stdout();
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string());
    output::print_run_header(
        &mut stdout,
        &file_name,
        parsed.entries.len(),
        parsed.failures.len(),
        &passes,
        color,
    )?;

    let mut chooser: Box<dyn Chooser> = if config.interactive {
        Box::new(TerminalChooser)
    } else {
        Box::new(DeclineAll)
    };
    let mut pipeline = Pipeline::new(config, &mut *chooser);
    if let Some(db) = &database {
        pipeline = pipeline.with_database(db);
    }
    if let Some(r) = &reviser {
        pipeline = pipeline.with_reviser(r);
    }

    let progress = |event: ProgressEvent| {
        let mut out = std::io::stdout().lock();
        let _ = output::print_progress(&mut out, &event, color);
        let _ = out.flush();
    };
    let report = pipeline.run(parsed.entries, diagnostics, progress).await;

    bibcheck_bib::write_file(&output_path, &report.entries)
        .with_context(|| format!("cannot write {}", output_path.display()))?;

    writeln!(stdout)?;
    output::print_changes(&mut stdout, &report.changes, color)?;
    output::print_diagnostics(&mut stdout, &report.diagnostics, color)?;
    output::print_summary(
        &mut stdout,
        &report.stats,
        &report.diagnostics,
        &output_path.display().to_string(),
        color,
    )?;

    Ok(if report.has_blocking() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
