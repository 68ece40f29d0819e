//! Terminal helpers shared by the subcommands.

use crate::constants::PROGRESS_BAR_TEMPLATE;
use crate::settings::Captions;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for a pass over `len` items.
pub fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Format file size in human-readable format
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    const THRESHOLD: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Size reduction as a percentage; negative when the output grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

pub fn print_compression_result(original_size: u64, compressed_size: u64, quality: u8) {
    let ratio = calculate_compression_ratio(original_size, compressed_size);

    println!("📊 Original size: {}", format_file_size(original_size));
    println!(
        "📈 Compressed size: {} at quality {}",
        format_file_size(compressed_size),
        quality
    );
    if ratio > 0.0 {
        println!("✅ Reduced size by {:.1}%", ratio);
    } else {
        println!("⚠️  Size increased by {:.1}%", ratio.abs());
    }
}

pub fn print_captions(captions: &Captions) {
    if captions.is_empty() {
        println!("⚠️  The service returned no captions");
        return;
    }
    for (style, text) in captions.iter() {
        println!("  {:<9} {}", format!("{}:", style), text);
    }
}
