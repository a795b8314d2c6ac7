//! Main entry point for fmturl CLI

use anyhow::{bail, Context};
use clap::Parser;
use fmturl::cli::output::{settled_counts, OutputFormatter};
use fmturl::cli::{Args, GroupArg, VerbosityLevel};
use fmturl::core::{Manifest, StreamGroup};
use fmturl::platform::{DeferredEngine, ScriptEngine, ScriptSource};
use fmturl::present::Session;
use fmturl::resolve::{Resolver, RetryPolicyBuilder};
use fmturl::utils::extract_video_id;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbosity_level())?;
    info!("Starting fmturl with args: {:?}", args);

    let mut formatter = OutputFormatter::new(args.verbosity_level()).with_json(args.json);

    if let Some(reference) = &args.video {
        match extract_video_id(reference) {
            Ok(video_id) => formatter.print_video_id(&video_id),
            Err(e) => formatter.warning(&format!("{}: {}", reference, e)),
        }
    }

    let mut manifest = read_manifest(&args).await?;
    select_groups(&mut manifest, args.group);

    // The engine may still be loading when the first rows render
    let engine = Arc::new(DeferredEngine::new());
    match &args.script {
        Some(script) => spawn_engine_load(ScriptSource::parse(script), engine.clone()),
        None => formatter.warning("No --script given; ciphered streams will stay pending"),
    }

    let retry = RetryPolicyBuilder::new()
        .interval(args.retry_interval_duration())
        .max_attempts(args.max_attempts)
        .build();
    let resolver = Resolver::new(engine.clone()).with_retry_policy(retry);
    debug!("Resolver: {:?}", resolver);

    let mut session = Session::new(&manifest);
    if let Some(details) = session.details() {
        formatter.print_video_details(details);
    }
    if !session.has_streams() {
        formatter.print_no_streams();
        return Ok(());
    }
    if let Some(label) = &args.filter {
        if session.toggle_filter(label).is_none() {
            bail!("Unknown filter '{}'", label);
        }
    }

    let start = Instant::now();
    formatter.start_spinner(manifest.variant_count());
    let tables = session
        .wait_until_settled(&resolver, args.timeout_duration(), |views| {
            formatter.update_spinner(views)
        })
        .await;
    session.unmount();

    let (settled, total) = settled_counts(&tables);
    formatter.finish_spinner(&format!("{}/{} rows settled", settled, total));

    formatter.print_tables(&tables).context("Failed to serialize rows")?;

    if engine.is_failed() {
        formatter.warning("Decipher script could not be loaded; affected rows failed");
    } else if args.script.is_some() && !engine.is_ready() {
        formatter.warning("Decipher script was still loading when the wait ended");
    }

    if settled < total {
        formatter.warning(&format!(
            "{} rows still pending after {}",
            total - settled,
            args.timeout
        ));
    } else {
        formatter.success(&format!(
            "Resolved {} rows in {}",
            total,
            humantime::format_duration(start.elapsed())
        ));
    }

    Ok(())
}

/// Read the player response from a file or stdin
async fn read_manifest(args: &Args) -> anyhow::Result<Manifest> {
    let text = if args.reads_stdin() {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read manifest from stdin")?;
        text
    } else {
        tokio::fs::read_to_string(&args.manifest)
            .await
            .with_context(|| format!("Failed to read manifest {}", args.manifest))?
    };

    Manifest::from_json(&text).context("Manifest is not a valid player response")
}

/// Drop the stream lists the user did not ask for
fn select_groups(manifest: &mut Manifest, group: GroupArg) {
    if let Some(data) = manifest.streaming_data.as_mut() {
        if !group.includes(StreamGroup::Combined) {
            data.formats = None;
        }
        if !group.includes(StreamGroup::Adaptive) {
            data.adaptive_formats = None;
        }
    }
}

/// Load the decipher script in the background and install it once ready
fn spawn_engine_load(source: ScriptSource, slot: Arc<DeferredEngine>) {
    tokio::spawn(async move {
        info!("Loading decipher script {:?}", source);
        match ScriptEngine::load(&source).await {
            Ok(engine) => {
                if slot.install(Arc::new(engine)).is_err() {
                    warn!("Decipher engine was already installed");
                } else {
                    info!("Decipher engine ready");
                }
            }
            Err(e) => {
                error!("Failed to load decipher script: {}", e);
                slot.fail(format!("failed to load decipher script: {}", e));
            }
        }
    });
}

/// Initialize logging
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    let default_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "warn",
        VerbosityLevel::Verbose => "debug",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();

    Ok(())
}
