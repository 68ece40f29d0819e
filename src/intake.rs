//! Finding image files on disk and reading them under a size ceiling.

use crate::constants::{MAX_FILE_SIZE, SUPPORTED_IMAGE_EXTENSIONS};
use crate::error::{CaptionError, Result};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check if a file path has an extension the caption service accepts.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collects image files from a single file, a directory, or a glob pattern.
///
/// Hidden entries are skipped when walking directories. Paths are
/// canonicalized and returned in walk order (sorted by file name).
pub fn collect_image_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut image_files = Vec::new();
    let input_path = Path::new(input);

    if input_path.is_file() {
        if is_image_file(input_path) {
            image_files.push(input_path.canonicalize()?);
        }
    } else if input_path.is_dir() {
        let mut walker = WalkDir::new(input_path).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && is_image_file(path) {
                if let Ok(canonical_path) = path.canonicalize() {
                    image_files.push(canonical_path);
                }
            }
        }
    } else if let Ok(pattern) = glob(input) {
        for entry in pattern.flatten() {
            if entry.is_file() && is_image_file(&entry) {
                if let Ok(canonical_path) = entry.canonicalize() {
                    image_files.push(canonical_path);
                }
            }
        }
    } else {
        return Err(CaptionError::NoImageFilesFound(input.to_string()));
    }

    Ok(image_files)
}

/// Reads an image file, refusing anything above [`MAX_FILE_SIZE`].
pub fn read_image_file(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CaptionError::FileNotFound(path.to_path_buf()));
    }

    let file_size = fs::metadata(path)?.len();
    if file_size > MAX_FILE_SIZE {
        return Err(CaptionError::FileTooLarge(file_size, MAX_FILE_SIZE));
    }

    Ok(fs::read(path)?)
}

/// Display label for a file: its name, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("test.jpg")));
        assert!(is_image_file(Path::new("test.JPEG")));
        assert!(is_image_file(Path::new("test.png")));
        assert!(is_image_file(Path::new("test.webp")));
        assert!(is_image_file(Path::new("test.gif")));

        assert!(!is_image_file(Path::new("test.txt")));
        assert!(!is_image_file(Path::new("test.tiff")));
        assert!(!is_image_file(Path::new("test")));
    }

    #[test]
    fn test_collect_image_files_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.jpg");
        File::create(&test_file)
            .unwrap()
            .write_all(b"fake image data")
            .unwrap();

        let files = collect_image_files(&test_file.to_string_lossy(), false).unwrap();
        assert_eq!(files, vec![test_file.canonicalize().unwrap()]);
    }

    #[test]
    fn test_collect_image_files_directory_skips_non_images_and_hidden() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("b.png")).unwrap();
        File::create(temp_dir.path().join("a.jpg")).unwrap();
        File::create(temp_dir.path().join("notes.txt")).unwrap();
        File::create(temp_dir.path().join(".hidden.jpg")).unwrap();

        let files = collect_image_files(&temp_dir.path().to_string_lossy(), false).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn test_collect_image_files_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        File::create(temp_dir.path().join("top.jpg")).unwrap();
        File::create(subdir.join("nested.png")).unwrap();

        let shallow = collect_image_files(&temp_dir.path().to_string_lossy(), false).unwrap();
        assert_eq!(shallow.len(), 1);

        let deep = collect_image_files(&temp_dir.path().to_string_lossy(), true).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn test_collect_image_files_glob_pattern() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("test1.jpg")).unwrap();
        File::create(temp_dir.path().join("test2.png")).unwrap();

        let pattern = format!("{}/*.jpg", temp_dir.path().to_string_lossy());
        let files = collect_image_files(&pattern, false).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_read_image_file_not_found() {
        let result = read_image_file(Path::new("/nonexistent/file.jpg"));
        assert!(matches!(result, Err(CaptionError::FileNotFound(_))));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/tmp/photos/cat.jpg")), "cat.jpg");
    }
}
