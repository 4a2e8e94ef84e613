//! Delta command-line entry point.
//!
//! Searches exploit modules, detection templates, PoC indexes and advisory
//! services for a CVE, CWE or keyword and prints one report per source.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod progress;
mod render;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use delta_core::{AppConfig, SearchTerm};
use delta_sources::{
    build_http_client, default_sections, AggregationController, ArchiveRefresher, Section,
};
use progress::SectionProgress;
use render::{banner, render_tree, render_update, Origin, Theme};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vulnerability intelligence search.
#[derive(Debug, Parser)]
#[command(name = "delta", version, about)]
struct Cli {
    /// CVE, CWE or keyword to search for
    #[arg(short, long, value_name = "TERM")]
    search: Option<String>,

    /// Refresh the local snapshots before searching
    #[arg(short, long)]
    update: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Initialize tracing subscriber for logging.
///
/// Logs go to stderr; `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    let theme = Theme::from_config(&config.display);

    if cli.write_config {
        config.save().context("failed to write configuration")?;
        let path = AppConfig::config_path()?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    if cli.search.is_none() && !cli.update {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    }

    let term = cli
        .search
        .as_deref()
        .map(SearchTerm::new)
        .transpose()
        .context("invalid search term")?;

    print!("{}", banner(&theme));
    info!("Starting Delta v{}", env!("CARGO_PKG_VERSION"));

    let cache_dir = config.snapshot_dir()?;
    debug!(cache_dir = %cache_dir.display(), "Using snapshot cache");

    let show_progress = console::Term::stderr().is_term();
    let client = build_http_client(&config.network).context("failed to build HTTP client")?;
    let refresher =
        Arc::new(ArchiveRefresher::new(client.clone(), &cache_dir).with_progress(show_progress));
    let sections = default_sections(&config.search, &cache_dir, &client, refresher);
    let controller = AggregationController::new(sections)
        .with_concurrency(config.search.concurrent_sections);

    tokio::select! {
        result = execute(&controller, cli.update, term.as_ref(), &theme, show_progress) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, remaining sections aborted");
            println!();
            Ok(())
        }
    }
}

async fn execute(
    controller: &AggregationController,
    update: bool,
    term: Option<&SearchTerm>,
    theme: &Theme,
    show_progress: bool,
) -> Result<()> {
    let mut stdout = std::io::stdout();

    if update {
        for (title, outcome) in controller.update_all().await {
            writeln!(stdout, "{}", render_update(&title, &outcome, theme))
                .context("failed to write update status")?;
        }
        writeln!(stdout).context("failed to write update status")?;
    }

    if let Some(term) = term {
        let mut progress = SectionProgress::new(
            controller.sections().iter().map(Section::title),
            show_progress,
        );
        let emitted = controller
            .try_run(term, |section, tree| {
                let text = render_tree(&tree, Origin::of(section), theme);
                progress.complete(|| write_section(&mut stdout, &text))
            })
            .await
            .context("failed to write report")?;
        debug!(sections = emitted, "Search finished");
    }

    Ok(())
}

/// Write one rendered section.
///
/// Flushed per section so a Ctrl-C never leaves one half printed.
fn write_section(out: &mut impl Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}
