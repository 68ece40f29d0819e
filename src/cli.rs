use crate::constants::{API_URL_ENV, DEFAULT_MAX_LENGTH, MAX_RETRIES};
use crate::export::ExportFormat;
use crate::settings::{CaptionStyle, Tone};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "caption-batch",
    about = "Caption images through a remote service, one at a time or in batches",
    long_about = "caption-batch compresses images locally, submits them to a caption service and \
                  collects the results. Batches run sequentially with per-item status, failed \
                  requests are retried with linear backoff, and batch results can be exported \
                  as JSON or CSV.",
    version,
    after_help = "EXAMPLES:\n  \
    caption-batch caption photo.jpg --style short --style alt\n  \
    caption-batch caption https://example.com/cat.jpg --tone funny\n  \
    caption-batch batch ./photos -r -o ./exports --format csv\n  \
    caption-batch compress photo.png photo.jpg --budget-kb 512"
)]
pub struct Args {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServiceArgs {
    #[arg(
        long,
        global = true,
        env = API_URL_ENV,
        help = "Caption service URL",
        long_help = "Base URL of the caption service. Requests go to <URL>/api. \
                     Defaults to http://localhost:8000."
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        default_value_t = 60,
        help = "Per-request timeout in seconds"
    )]
    pub timeout_secs: u64,

    #[arg(
        long,
        global = true,
        default_value_t = MAX_RETRIES,
        help = "Retries after a network failure or 5xx response",
        long_help = "Number of retries after the first attempt. Retry n waits n seconds. \
                     4xx responses are never retried."
    )]
    pub retries: u32,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CaptionArgs {
    #[arg(
        short = 's',
        long = "style",
        value_enum,
        help = "Caption style to request (repeatable, default: short, detailed, alt)"
    )]
    pub styles: Vec<CaptionStyle>,

    #[arg(short = 't', long, value_enum, default_value_t = Tone::Professional, help = "Caption tone")]
    pub tone: Tone,

    #[arg(
        short = 'm',
        long,
        default_value_t = DEFAULT_MAX_LENGTH,
        help = "Maximum caption length in characters"
    )]
    pub max_length: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Caption a single image file or URL",
        long_about = "Compress one image (longest side 1920px, kept under 2 MB) and caption it. \
                      An http(s) URL is passed to the service, which fetches the image itself."
    )]
    Caption {
        #[arg(help = "Image file path or http(s) URL")]
        input: String,

        #[command(flatten)]
        caption: CaptionArgs,

        #[arg(long, help = "Print the raw service response as JSON")]
        json: bool,
    },

    #[command(
        about = "Caption many images sequentially",
        long_about = "Queue every image found at the input and caption them one at a time. \
                      Each image is compressed (longest side 1280px, JPEG quality 80) before \
                      submission. A failing image is reported and the batch continues."
    )]
    Batch {
        #[arg(
            help = "Input directory, file, or glob",
            long_help = "Input can be a directory path, a single file, or a glob expression. \
                         Examples: './photos', 'photo.jpg', './photos/*.png'"
        )]
        input: String,

        #[arg(short = 'r', long, help = "Process subdirectories recursively")]
        recursive: bool,

        #[arg(
            short = 'o',
            long,
            help = "Directory for export files",
            long_help = "Write BATCH_EXPORT_<timestamp> files into this directory once the batch finishes."
        )]
        output: Option<PathBuf>,

        #[arg(short = 'f', long, value_enum, default_value_t = ExportFormat::Both, help = "Export format")]
        format: ExportFormat,

        #[arg(long, help = "Keep each encoded image under this many KiB")]
        budget_kb: Option<usize>,

        #[command(flatten)]
        caption: CaptionArgs,
    },

    #[command(
        about = "Compress an image the way it would be submitted",
        long_about = "Run the local compression step on its own and write the JPEG result. \
                      Useful for checking what the caption service will receive."
    )]
    Compress {
        #[arg(help = "Input image file path")]
        input: PathBuf,

        #[arg(help = "Output JPEG file path")]
        output: PathBuf,

        #[arg(short = 'd', long, help = "Longest side in pixels (default: 1920)")]
        max_dimension: Option<u32>,

        #[arg(short = 'q', long, help = "Initial JPEG quality, 10-100 (default: 90)")]
        quality: Option<u8>,

        #[arg(long, help = "Byte budget for the data URI in KiB (default: 2048)")]
        budget_kb: Option<usize>,
    },
}
