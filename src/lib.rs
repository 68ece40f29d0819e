pub mod batch;
pub mod cli;
pub mod client;
pub mod compress;
pub mod constants;
pub mod error;
pub mod export;
pub mod intake;
pub mod retry;
pub mod settings;
pub mod single;
pub mod utils;

pub use batch::{
    BatchObserver, BatchOutcome, BatchProcessor, BatchProgress, BatchQueue, BatchResult,
    BatchSummary, ItemId, ItemStatus, NoopObserver,
};
pub use client::{CaptionResponse, CaptionService, ClientConfig, HttpCaptionService};
pub use compress::{compress, compress_file, CompressionOptions, EncodedPayload};
pub use error::{CaptionError, Result};
pub use export::{to_csv, to_json, write_exports, ExportFormat};
pub use intake::{collect_image_files, is_image_file};
pub use retry::{send_with_retry, RetryPolicy};
pub use settings::{CaptionSettings, CaptionStyle, Captions, Tone};
pub use single::{caption_bytes, caption_file, caption_url};
