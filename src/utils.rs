use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use humansize::{format_size, FormatSizeOptions, WINDOWS};

/// Format file size in human-readable form, e.g. `1.50 kB` or `1.00 MB`.
///
/// Multiples of 1024 with short unit names and two fixed decimals.
pub fn format_file_size(size: u64) -> String {
    let options = FormatSizeOptions::from(WINDOWS)
        .decimal_places(2)
        .decimal_zeroes(2);
    format_size(size, options)
}

/// First free path for `file_name` in `dir`, adding `_1`, `_2`, ... before the extension
pub fn unique_target(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name.file_stem().unwrap_or(file_name).to_string_lossy();
    let extension = name.extension().map(|ext| ext.to_string_lossy());

    (1u64..)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Replace anything but ASCII alphanumerics, `-`, `_` and `.` with `_`
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // "." and ".." are not usable directory names
    if sanitized.chars().all(|c| c == '.') {
        sanitized.replace('.', "_")
    } else {
        sanitized
    }
}

/// Check if a file can be opened for reading
pub fn is_readable(path: &Path) -> bool {
    fs::File::open(path).is_ok()
}

/// Check if this process may create or remove entries in `dir`
#[cfg(unix)]
pub fn is_dir_writable(dir: &Path) -> bool {
    use rustix::fs::{access, Access};

    dir.is_dir() && access(dir, Access::WRITE_OK).is_ok()
}

#[cfg(not(unix))]
pub fn is_dir_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
        .unwrap_or(false)
}

/// Show `path` relative to `root` when possible
pub fn display_path<'a>(path: &'a Path, root: &Path) -> Cow<'a, str> {
    match pathdiff::diff_paths(path, root) {
        Some(relative) if !relative.starts_with("..") && !relative.as_os_str().is_empty() => {
            Cow::Owned(relative.to_string_lossy().into_owned())
        }
        _ => path.to_string_lossy(),
    }
}
