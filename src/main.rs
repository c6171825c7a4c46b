use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use feed_digest::cancel::Cancellation;
use feed_digest::config::Config;
use feed_digest::digest::run_all;
use feed_digest::feed::build_client;
use feed_digest::output::{render_summary, write_atom_file, write_failure_report};

const FAILURE_REPORT_NAME: &str = "failures.json";

#[derive(Parser, Debug)]
#[command(
    name = "feed-digest",
    about = "Merge RSS/Atom feeds into categorized digest feeds"
)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = "feed-digest.toml")]
    config: PathBuf,

    /// Output directory (overrides `output_dir` from the config file)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Only run the category with this type
    #[arg(long, value_name = "TYPE")]
    category: Option<String>,

    /// Cancel outstanding fetches after this many seconds
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Do not write Atom files for categories with no items
    #[arg(long)]
    skip_empty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(kind) = &args.category {
        config.categories.retain(|c| &c.kind == kind);
        if config.categories.is_empty() {
            anyhow::bail!("No category with type '{}' in {}", kind, args.config.display());
        }
    }

    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir.clone());
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            output_dir.display()
        )
    })?;

    let client = build_client(&config.fetch.user_agent).context("Failed to build HTTP client")?;

    let cancel = Cancellation::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling outstanding fetches");
                cancel.cancel();
            }
        });
    }
    let deadline = args
        .deadline_secs
        .map(|secs| cancel.cancel_after(Duration::from_secs(secs)));

    let digests = run_all(
        &client,
        &config.categories,
        Utc::now(),
        &config.pipeline_config(),
        &cancel,
    )
    .await
    .context("Digest run failed")?;

    if let Some(timer) = deadline {
        timer.abort();
    }

    for digest in &digests {
        if args.skip_empty && digest.feed.is_empty() {
            tracing::info!(category = %digest.feed.kind, "No items, skipping output");
            continue;
        }
        write_atom_file(
            &digest.feed,
            &output_dir,
            config.newsletter.hide_author_in_title,
        )?;
    }

    write_failure_report(&digests, &output_dir.join(FAILURE_REPORT_NAME))?;

    eprint!("{}", render_summary(&digests));
    Ok(())
}
