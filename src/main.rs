use anyhow::Context;
use caption_batch::batch::{BatchObserver, BatchProcessor, BatchProgress, BatchQueue, ItemId, ItemStatus};
use caption_batch::cli::{Args, CaptionArgs, Commands, ServiceArgs};
use caption_batch::client::{ClientConfig, HttpCaptionService};
use caption_batch::compress::{compress_file, CompressionOptions};
use caption_batch::constants::{SINGLE_BYTE_BUDGET, SINGLE_INITIAL_QUALITY, SINGLE_MAX_DIMENSION};
use caption_batch::export::{write_exports, ExportFormat};
use caption_batch::intake::collect_image_files;
use caption_batch::retry::RetryPolicy;
use caption_batch::settings::CaptionSettings;
use caption_batch::single::{caption_file, caption_url, is_remote_url, source_label};
use caption_batch::utils::{create_progress_bar, print_captions, print_compression_result};
use clap::Parser;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Caption {
            input,
            caption,
            json,
        } => {
            let service = build_service(&args.service)?;
            run_caption(&service, &input, &caption, json).await?;
        }
        Commands::Batch {
            input,
            recursive,
            output,
            format,
            budget_kb,
            caption,
        } => {
            let service = build_service(&args.service)?;
            run_batch(service, &input, recursive, output.as_deref(), format, budget_kb, &caption)
                .await?;
        }
        Commands::Compress {
            input,
            output,
            max_dimension,
            quality,
            budget_kb,
        } => {
            run_compress(&input, &output, max_dimension, quality, budget_kb)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

fn build_service(args: &ServiceArgs) -> anyhow::Result<HttpCaptionService> {
    let config = ClientConfig::new(args.api_url.clone())
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_retry(RetryPolicy::new(args.retries, RetryPolicy::default().base_delay));
    Ok(HttpCaptionService::new(config)?)
}

fn build_settings(args: &CaptionArgs) -> anyhow::Result<CaptionSettings> {
    let defaults = CaptionSettings::default();
    let styles = if args.styles.is_empty() {
        defaults.styles.into_iter().collect()
    } else {
        args.styles.clone()
    };
    Ok(CaptionSettings::new(styles, args.tone, args.max_length)?)
}

async fn run_caption(
    service: &HttpCaptionService,
    input: &str,
    args: &CaptionArgs,
    json: bool,
) -> anyhow::Result<()> {
    let settings = build_settings(args)?;
    println!("🖼️  Captioning: {} ({})", source_label(input), input);
    println!("🌐 Service: {}", service.config().api_base);

    let result = if is_remote_url(input) {
        caption_url(service, input, &settings).await
    } else {
        caption_file(service, Path::new(input), &settings).await
    };

    let response = result.context("❌ Failed to generate captions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("✅ Captions generated");
    print_captions(&response.captions);
    if let Some(metadata) = &response.metadata {
        println!(
            "⏱️  {:.2}s with {}",
            metadata.processing_time, metadata.model_used
        );
    }
    Ok(())
}

struct ProgressObserver {
    pb: ProgressBar,
}

impl BatchObserver for ProgressObserver {
    fn on_status_change(&self, id: ItemId, status: ItemStatus) {
        if status == ItemStatus::Processing {
            self.pb.set_message(format!("item {}", id));
        }
    }

    fn on_progress(&self, progress: BatchProgress) {
        self.pb.set_length(progress.total as u64);
        self.pb.set_position(progress.completed as u64);
    }
}

async fn run_batch(
    service: HttpCaptionService,
    input: &str,
    recursive: bool,
    output: Option<&Path>,
    format: ExportFormat,
    budget_kb: Option<usize>,
    args: &CaptionArgs,
) -> anyhow::Result<()> {
    let settings = build_settings(args)?;
    println!("🔍 Scanning for images: {}", input);

    let files = collect_image_files(input, recursive)?;
    if files.is_empty() {
        println!("⚠️  No image files found");
        return Ok(());
    }
    println!("📁 Found {} image files", files.len());

    let queue = BatchQueue::new();
    for path in files {
        queue.add_file(path);
    }

    let compression = CompressionOptions::batch()
        .with_byte_budget(budget_kb.map(|kb| kb.saturating_mul(1024)));
    let mut processor = BatchProcessor::with_queue(service, queue).with_compression(compression);

    let observer = ProgressObserver {
        pb: create_progress_bar(processor.queue().len() as u64),
    };
    let results = processor.run(&settings, &observer).await?;
    observer.pb.finish_and_clear();

    for result in &results {
        match result.error_message() {
            None => {
                println!("✅ {}", result.source_name);
                if let Some(captions) = result.captions() {
                    print_captions(captions);
                }
            }
            Some(message) => println!("❌ {}: {}", result.source_name, message),
        }
    }

    let summary = processor.summary();
    println!(
        "\n🎉 Batch complete: {}/{} captioned, {} failed",
        summary.succeeded, summary.total, summary.failed
    );

    if let Some(dir) = output {
        let written = write_exports(&results, dir, format)
            .with_context(|| format!("failed to write exports to {}", dir.display()))?;
        for path in written {
            println!("💾 Exported {}", path.display());
        }
    }

    Ok(())
}

fn run_compress(
    input: &Path,
    output: &Path,
    max_dimension: Option<u32>,
    quality: Option<u8>,
    budget_kb: Option<usize>,
) -> anyhow::Result<()> {
    let options = CompressionOptions::new(
        max_dimension.unwrap_or(SINGLE_MAX_DIMENSION),
        quality.unwrap_or(SINGLE_INITIAL_QUALITY),
        Some(budget_kb.map_or(SINGLE_BYTE_BUDGET, |kb| kb.saturating_mul(1024))),
    )?;

    println!("🔄 Compressing: {} -> {}", input.display(), output.display());
    let (original_size, payload) = compress_file(input, output, &options)?;

    println!("📐 Dimensions: {}x{}", payload.width, payload.height);
    print_compression_result(original_size, payload.bytes.len() as u64, payload.quality);
    if payload.encode_attempts > 1 {
        println!("🔁 Re-encoded {} times to fit the budget", payload.encode_attempts);
    }
    Ok(())
}
