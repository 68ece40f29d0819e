use std::time::Duration;

// Compression. Quality is a JPEG percentage.
pub const SINGLE_MAX_DIMENSION: u32 = 1920;
pub const BATCH_MAX_DIMENSION: u32 = 1280;
pub const SINGLE_INITIAL_QUALITY: u8 = 90;
pub const BATCH_INITIAL_QUALITY: u8 = 80;
pub const SINGLE_BYTE_BUDGET: usize = 2048 * 1024;
pub const QUALITY_STEP: u8 = 10;
pub const MIN_QUALITY: u8 = 10;
pub const MAX_QUALITY: u8 = 100;

pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

// Remote service
pub const API_URL_ENV: &str = "CAPTION_API_URL";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const API_PATH: &str = "/api";
pub const CAPTION_ENDPOINT: &str = "/caption";
pub const CAPTION_URL_ENDPOINT: &str = "/caption-url";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const USER_AGENT: &str = concat!("caption-batch/", env!("CARGO_PKG_VERSION"));

// Retry
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

// Caption settings
pub const DEFAULT_MAX_LENGTH: u32 = 150;

// Export
pub const CSV_HEADER: [&str; 5] = ["filename", "short", "detailed", "alt", "creative"];
pub const EXPORT_FILE_PREFIX: &str = "BATCH_EXPORT_";

// Labels for images without a filename
pub const PASTED_IMAGE_LABEL: &str = "Pasted Image";
pub const URL_IMAGE_LABEL: &str = "URL Image";

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
