// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Static file serving under a fixed work directory, grounded in
//! `HTTPServer::get_resource`'s plain-file branch. Unlike the original,
//! every resolved path is checked against the work directory boundary
//! before the file is opened, rejecting `..` escapes with
//! [`Error::PathTraversal`] instead of reading whatever the traversal
//! reaches.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolves `url_path` (e.g. `/index.html`) against `work_dir`, rejecting
/// any path that would resolve outside of it.
///
/// # Errors
/// Returns [`Error::PathTraversal`] if the resolved path escapes
/// `work_dir`, or [`Error::NotFound`] if no such file exists.
pub fn resolve(work_dir: &Path, url_path: &str) -> Result<PathBuf> {
    let relative = url_path.trim_start_matches('/');
    let candidate = work_dir.join(relative);

    let work_dir_abs = work_dir
        .canonicalize()
        .map_err(Error::Io)?;
    // `canonicalize` requires the path to exist; a non-existent file is
    // `NotFound`, but a `..`-laden path that would exist outside the work
    // directory must still be rejected as a traversal rather than silently
    // reported as missing, so check lexically first.
    if has_traversal_component(&candidate, work_dir) {
        return Err(Error::PathTraversal);
    }

    let resolved = candidate.canonicalize().map_err(|_| Error::NotFound)?;
    if !resolved.starts_with(&work_dir_abs) {
        return Err(Error::PathTraversal);
    }
    Ok(resolved)
}

fn has_traversal_component(candidate: &Path, work_dir: &Path) -> bool {
    use std::path::Component;

    let mut depth: i64 = 0;
    for component in candidate.strip_prefix(work_dir).unwrap_or(candidate).components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

/// Reads the file at `url_path` under `work_dir`.
///
/// # Errors
/// See [`resolve`]; additionally returns [`Error::Io`] if the file exists
/// but cannot be read.
pub fn serve(work_dir: &Path, url_path: &str) -> Result<Vec<u8>> {
    let path = resolve(work_dir, url_path)?;
    std::fs::read(path).map_err(Error::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn serves_a_file_that_exists_under_the_work_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), b"<html/>").unwrap();
        let contents = serve(dir.path(), "/index.html").unwrap();
        assert_eq!(contents, b"<html/>");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match serve(dir.path(), "/missing.html") {
            Err(Error::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn traversal_outside_the_work_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("inside.txt"), b"secret").unwrap();
        match serve(dir.path(), "/../inside.txt") {
            Err(Error::PathTraversal) => {}
            other => panic!("expected PathTraversal, got {other:?}"),
        }
    }

    #[test]
    fn deep_traversal_past_the_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        match serve(dir.path(), "/a/../../../../etc/passwd") {
            Err(Error::PathTraversal) => {}
            other => panic!("expected PathTraversal, got {other:?}"),
        }
    }
}
