use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Error, Result, ResultExt};

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::configuration(format!("path exists but is not a directory: {}", path.display())))
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Error unless the directory already exists.
pub fn require_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::configuration(format!("directory does not exist: {}", path.display())))
    }
    if !path.is_dir() {
        return Err(Error::configuration(format!("path exists but is not a directory: {}", path.display())))
    }
    Ok(())
}

/// Files directly under `dir` whose name ends with `suffix`, sorted by name.
pub fn list_files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    require_dir_exists(dir)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::from(std::io::Error::other(e)))
            .with_context(|| format!("listing {}", dir.display()))?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Names of the entries of a `.zip` archive ending with `suffix`, in archive order.
///
/// Directory components are kept, so `a/b.tif` is listed as such.
pub fn list_zip_entries(zip_path: &Path, suffix: &str) -> Result<Vec<String>> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("failed to open {}", zip_path.display()))?;
    let archive = ZipArchive::new(file)
        .map_err(|e| Error::data(format!("failed to read zip archive {}: {e}", zip_path.display())))?;
    Ok(archive.file_names()
        .filter(|name| !name.ends_with('/') && name.ends_with(suffix))
        .map(str::to_string)
        .collect())
}

/// Extract one entry of a `.zip` archive to `dest`, replacing any existing file.
pub fn extract_zip_entry(zip_path: &Path, entry: &str, dest: &Path) -> Result<()> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("failed to open {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::data(format!("failed to read zip archive {}: {e}", zip_path.display())))?;
    let mut reader = archive.by_name(entry)
        .map_err(|e| Error::data(format!("{} has no entry {entry}: {e}", zip_path.display())))?;

    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    ensure_dir_exists(dir)?;
    // the destination name only ever holds a complete file
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage {}", dest.display()))?;
    io::copy(&mut reader, &mut staged)
        .with_context(|| format!("failed to read {entry} from {}", zip_path.display()))?;
    staged.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(())
}

/// File stem of `path` as an owned string (`a/b/CHN.gpkg` → `CHN`).
pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::configuration(format!("path has no file name: {}", path.display())))
}

/// File name of `path` as an owned string.
pub fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::configuration(format!("path has no file name: {}", path.display())))
}
