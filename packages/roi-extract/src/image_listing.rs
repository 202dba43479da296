//! Flat, non-recursive discovery of the images to process.
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ExtractError, Result};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists `.png`/`.jpg`/`.jpeg` files directly inside `dir`, sorted by file name.
///
/// Fails when the directory is missing, unreadable, or holds no images.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ExtractError::ImageDirectoryMissing(dir.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ExtractError::ImageDirectoryUnreadable {
            path: dir.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;
        if entry.file_type().is_dir() || !is_image_file(entry.path()) {
            continue;
        }
        images.push(entry.into_path());
    }

    if images.is_empty() {
        return Err(ExtractError::NoImages(dir.to_path_buf()));
    }
    log::info!("[BATCH] found {} images in {}", images.len(), dir.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        assert!(is_image_file(Path::new("a.PNG")));
        assert!(is_image_file(Path::new("b.JpEg")));
        assert!(is_image_file(Path::new("c.jpg")));
        assert!(!is_image_file(Path::new("d.bmp")));
        assert!(!is_image_file(Path::new("png")));
    }

    #[test]
    fn test_lists_sorted_flat_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt", "c.jpeg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.png"), b"x").unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg", "c.jpeg"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_images(&dir.path().join("images")).unwrap_err();
        assert!(matches!(err, ExtractError::ImageDirectoryMissing(_)));
    }

    #[test]
    fn test_directory_without_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), b"x").unwrap();
        let err = list_images(dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::NoImages(_)));
    }
}
