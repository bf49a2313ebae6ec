// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! CGI execution, grounded in `HTTPServer::exec_cgi`: a script under the
//! work directory runs with `REQUEST_METHOD`/`QUERY_STRING` set, its stdout
//! becomes the response body. `std::process::Command` replaces the
//! original's manual `pipe`/`fork`/`dup2`/`execl` with the same environment
//! contract.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};
use crate::static_file::resolve;

/// Runs the CGI program at `path` (resolved under `work_dir`, subject to
/// the same traversal rejection as static files) with `REQUEST_METHOD` set
/// to `method` and `QUERY_STRING` set to `query_or_body`. Returns the
/// program's captured stdout.
///
/// # Errors
/// Returns [`Error::PathTraversal`]/[`Error::NotFound`] as [`resolve`]
/// does, or [`Error::CgiFailed`] if the program cannot be spawned or exits
/// non-zero.
pub fn run(work_dir: &Path, path: &str, method: &str, query_or_body: &str) -> Result<Vec<u8>> {
    let program = resolve(work_dir, path)?;

    let output = Command::new(&program)
        .env("REQUEST_METHOD", method)
        .env("QUERY_STRING", query_or_body)
        .output()
        .map_err(|e| Error::CgiFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(Error::CgiFailed(format!(
            "{} exited with {}",
            program.display(),
            output.status
        )));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn cgi_program_receives_method_and_query_string_as_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        write_script(
            dir.path(),
            "echo_env.sh",
            "#!/bin/sh\nprintf '%s %s' \"$REQUEST_METHOD\" \"$QUERY_STRING\"\n",
        );
        let stdout = run(dir.path(), "/echo_env.sh", "GET", "a=1&b=2").unwrap();
        assert_eq!(String::from_utf8(stdout).unwrap(), "GET a=1&b=2");
    }

    #[test]
    fn nonexistent_cgi_program_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match run(dir.path(), "/missing.sh", "GET", "") {
            Err(Error::NotFound) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
