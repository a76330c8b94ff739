//! Recursive directory copy with a suffix filter and a per-file transform.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, error, info};
use walkdir::WalkDir;

fn matches_suffix(name: &str, suffix: &str) -> bool {
    suffix.is_empty() || name.to_uppercase().ends_with(&suffix.to_uppercase())
}

/// Copies `src` into `dst`.
///
/// Only files whose name ends with `suffix` (case-insensitive, empty = all) are
/// copied. An existing destination file is rewritten only when its modification
/// time differs from the source; written files take over the source's mtime.
/// `transform` gets the file name and content and returns what to write.
///
/// Returns the number of files written. Per-file failures are logged and skipped.
pub fn copy_files<F>(src: impl AsRef<Path>, dst: impl AsRef<Path>, suffix: &str, transform: F) -> io::Result<usize>
where
    F: Fn(&str, Vec<u8>) -> Vec<u8>,
{
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if !src.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("source directory {} not found", src.display())));
    }
    fs::create_dir_all(dst)?;

    let mut written = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                error!("copyfiles: {}", e);
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            if target.is_file() {
                error!("copyfiles: filename conflict: {}", target.display());
            } else if let Err(e) = fs::create_dir_all(&target) {
                error!("copyfiles: {}: {}", target.display(), e);
            }
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !matches_suffix(&name, suffix) {
            continue;
        }
        match copy_one(entry.path(), &target, &name, &transform) {
            Ok(true) => {
                info!("CP: {}", relative.display());
                written += 1;
            }
            Ok(false) => debug!("copyfiles: {} unchanged", relative.display()),
            Err(e) => error!("copyfiles: {}: {}", relative.display(), e),
        }
    }
    Ok(written)
}

fn copy_one<F>(src: &Path, target: &Path, name: &str, transform: &F) -> io::Result<bool>
where
    F: Fn(&str, Vec<u8>) -> Vec<u8>,
{
    let src_modified = fs::metadata(src)?.modified()?;
    if let Ok(existing) = fs::metadata(target) {
        if existing.is_dir() {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "filename conflict with a directory"));
        }
        if existing.modified().ok() == Some(src_modified) {
            return Ok(false);
        }
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = transform(name, fs::read(src)?);
    fs::write(target, content)?;
    fs::File::options().write(true).open(target)?.set_modified(src_modified)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_with_suffix_and_transform() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("css")).unwrap();
        fs::write(src.path().join("index.HTML"), "url={{{JSON_URL}}}").unwrap();
        fs::write(src.path().join("css/site.css"), "body{}").unwrap();
        fs::write(src.path().join("readme.txt"), "hi").unwrap();

        let out = dst.path().join("ui");
        let n = copy_files(src.path(), &out, ".html", |name, bytes| {
            if name.eq_ignore_ascii_case("index.html") {
                String::from_utf8_lossy(&bytes).replace("{{{JSON_URL}}}", "/swagger.json").into_bytes()
            } else {
                bytes
            }
        })
        .unwrap();

        assert_eq!(n, 1);
        assert_eq!(fs::read_to_string(out.join("index.HTML")).unwrap(), "url=/swagger.json");
        assert!(out.join("css").is_dir());
        assert!(!out.join("css/site.css").exists());
        assert!(!out.join("readme.txt").exists());
    }

    #[test]
    fn test_unchanged_files_skipped() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("a.js"), "1").unwrap();

        assert_eq!(copy_files(src.path(), dst.path(), "", |_, b| b).unwrap(), 1);
        assert_eq!(copy_files(src.path(), dst.path(), "", |_, b| b).unwrap(), 0);
    }

    #[test]
    fn test_file_directory_conflict_skipped() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("a.js"), "1").unwrap();
        fs::write(src.path().join("b.js"), "2").unwrap();
        fs::create_dir_all(dst.path().join("a.js")).unwrap();

        assert_eq!(copy_files(src.path(), dst.path(), "", |_, b| b).unwrap(), 1);
        assert!(dst.path().join("a.js").is_dir());
    }

    #[test]
    fn test_missing_source() {
        let dst = TempDir::new().unwrap();
        assert!(copy_files(dst.path().join("nope"), dst.path(), "", |_, b| b).is_err());
    }
}
