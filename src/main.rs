mod cli;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sr_av::{probe_media, SystemRunner, ToolRegistry, Toolchain};
use sr_core::config::{Config, LoggingConfig};
use sr_core::events::EventBus;
use sr_pipeline::{sequencer, EngineContext, ProgressSender, Publisher, RenderPipeline};
use sr_worker::{JobOverrides, JobRequest, JobTracker, StdoutPublisher, WebhookPublisher, WorkerPool};
use tokio::io::AsyncBufReadExt;

const CRATES: [&str; 5] = ["slidereel", "sr_core", "sr_av", "sr_pipeline", "sr_worker"];

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { logging.level.as_str() };
        CRATES
            .iter()
            .map(|c| format!("{c}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    });

    // stdout is reserved for command output and completion events.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Validate { .. } | Commands::Version => None,
        _ => Some(config::load_config_or_default(cli.config.as_deref())?),
    };
    init_logging(
        cli.verbose,
        config.as_ref().map(|c| &c.logging).unwrap_or(&LoggingConfig::default()),
    );
    if let Some(ref config) = config {
        for warning in config.validate() {
            tracing::warn!("{warning}");
        }
    }
    let config = config.unwrap_or_default();

    match cli.command {
        Commands::Render {
            job_id,
            file_id,
            visual_dir,
            audio_dir,
            intro,
            outro,
            output_root,
        } => {
            let request = JobRequest {
                job_id: job_id.parse()?,
                file_id: file_id.parse()?,
                overrides: JobOverrides {
                    visual_dir,
                    audio_dir,
                    intro,
                    outro,
                    job_dir: None,
                },
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(render(config, request, output_root))
        }
        Commands::Plan {
            visual_dir,
            audio_dir,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan(&visual_dir, &audio_dir, json))
        }
        Commands::Worker => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_worker(config))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => check_tools(&config),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("slidereel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Resolve ffmpeg/ffprobe and build the engine context.
fn engine_context(config: &Config) -> Result<EngineContext> {
    let toolchain = ToolRegistry::discover(&config.tools)
        .toolchain(&config.tools)
        .context("ffmpeg and ffprobe are required; see `slidereel check-tools`")?;
    Ok(EngineContext::new(
        Arc::new(SystemRunner),
        toolchain,
        config.policy.clone(),
    ))
}

/// Webhook when configured, otherwise JSON lines on stdout.
fn publisher(config: &Config) -> Result<Arc<dyn Publisher>> {
    match config.notify.webhook_url {
        Some(ref url) => {
            let timeout = std::time::Duration::from_secs(config.notify.webhook_timeout_secs);
            Ok(Arc::new(WebhookPublisher::new(url.clone(), timeout)?))
        }
        None => Ok(Arc::new(StdoutPublisher)),
    }
}

async fn render(mut config: Config, request: JobRequest, output_root: Option<PathBuf>) -> Result<()> {
    if let Some(root) = output_root {
        config.storage.output_root = root;
    }

    let job = request.into_job(&config.storage, &config.profile);
    let pipeline = RenderPipeline::new(engine_context(&config)?, publisher(&config)?);
    let progress = ProgressSender::new(|pct, step| {
        tracing::debug!(progress = pct, "{step}");
    });

    let outcome = pipeline
        .run(&job, &progress)
        .await
        .with_context(|| format!("Render of job {} failed", job.job_id))?;

    eprintln!("Artifact: {}", outcome.artifact.display());
    eprintln!("Segments: {}", outcome.segments);
    eprintln!("Bumpers: {}", outcome.bumpers.count());
    for skipped in &outcome.skipped {
        eprintln!("Skipped: {} ({:?})", skipped.path.display(), skipped.reason);
    }
    for dropped in &outcome.dropped {
        eprintln!("Dropped: {} ({})", dropped.visual.display(), dropped.error);
    }
    Ok(())
}

async fn plan(visual_dir: &Path, audio_dir: &Path, json: bool) -> Result<()> {
    let plan = sequencer::scan(visual_dir, audio_dir).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Segments: {}", plan.entries.len());
    for (i, entry) in plan.entries.iter().enumerate() {
        let audio = match entry.audio {
            sr_pipeline::SegmentAudio::Narration(ref p) => p.display().to_string(),
            sr_pipeline::SegmentAudio::Embedded => "(embedded)".to_string(),
        };
        println!(
            "  {}. [{}] {} + {}",
            i + 1,
            entry.index.map_or_else(|| "-".to_string(), |n| n.to_string()),
            entry.visual.display(),
            audio
        );
    }

    if !plan.skipped.is_empty() {
        println!("\nSkipped: {}", plan.skipped.len());
        for skipped in &plan.skipped {
            println!("  {} ({:?})", skipped.path.display(), skipped.reason);
        }
    }
    Ok(())
}

async fn run_worker(config: Config) -> Result<()> {
    let pool = WorkerPool::start(
        &config,
        engine_context(&config)?,
        publisher(&config)?,
        Arc::new(JobTracker::with_retention(config.worker.retained_jobs)),
        Arc::new(EventBus::default()),
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JobRequest>(line) {
                    Ok(request) => {
                        if let Err(e) = pool.submit(request).await {
                            tracing::warn!("Job rejected: {e}");
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring invalid job request: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; stopping workers");
                pool.stop();
                break;
            }
        }
    }

    let tracker = pool.tracker().clone();
    pool.shutdown().await;

    let records = tracker.list();
    let failed = records
        .iter()
        .filter(|r| r.state == sr_core::JobState::Failed)
        .count();
    tracing::info!(jobs = records.len(), failed, "Worker finished");
    Ok(())
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let toolchain: Toolchain = ToolRegistry::discover(&config.tools)
        .toolchain(&config.tools)
        .context("ffprobe is required")?;
    let probe = probe_media(&SystemRunner, &toolchain, file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&probe)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    if let Some(ref format) = probe.format_name {
        println!("Container: {format}");
    }
    if let Some(secs) = probe.duration_secs {
        println!("Duration: {secs:.3}s");
    }
    match probe.video {
        Some(ref v) => {
            print!("Video: {} {}x{}", v.codec, v.width, v.height);
            if let Some(fps) = v.frame_rate {
                print!(" {fps:.3} fps");
            }
            if let Some(ref pix) = v.pixel_format {
                print!(" {pix}");
            }
            println!();
        }
        None => println!("Video: none"),
    }
    match probe.audio {
        Some(ref a) => {
            print!("Audio: {}", a.codec);
            if let Some(sr) = a.sample_rate {
                print!(" {sr} Hz");
            }
            if let Some(ch) = a.channels {
                print!(" {ch}ch");
            }
            if let Some(bps) = probe.audio_bit_rate() {
                print!(" {} kb/s", bps / 1000);
            }
            println!();
        }
        None => println!("Audio: none"),
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to render videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).or_else(config::find_default_config);
    let config = match path {
        Some(ref p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let v = &config.profile.video;
    let a = &config.profile.audio;
    println!(
        "  Video: {}x{} @ {} fps, {} {}",
        v.width, v.height, v.frame_rate, v.codec, v.pixel_format
    );
    println!(
        "  Audio: {} {} Hz, {} ch, {} kb/s",
        a.codec, a.sample_rate, a.channels, a.bitrate_kbps
    );
    println!("  Output root: {}", config.storage.output_root.display());
    println!(
        "  Workers: {} (keeping {} finished jobs)",
        config.worker.concurrency, config.worker.retained_jobs
    );
    println!(
        "  Webhook: {}",
        config.notify.webhook_url.as_deref().unwrap_or("(stdout)")
    );

    for warning in config.validate() {
        println!("  warning: {warning}");
    }
    Ok(())
}
