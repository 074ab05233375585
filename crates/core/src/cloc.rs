// crates/core/src/cloc.rs
//! Invocation of the external `cloc` line counter.
//!
//! `cloc` is run as a child process writing a YAML report into the working
//! directory. The exit code is not meaningful; the absence of the report file
//! after the call is how an empty repository announces itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::IndexError;

/// Name of the report file written into the working directory.
pub const REPORT_FILE: &str = "cloc.yaml";

/// Upper bound on a single cloc run. Large repositories are slow but not
/// five-minutes slow.
const CLOC_TIMEOUT: Duration = Duration::from_secs(300);

/// Run `cloc <dir> --yaml --report-file=<dir>/cloc.yaml`.
///
/// Returns the path of the report file. `MissingDependency` if the tool is not
/// on PATH; `StatisticsUnavailable` if the report was not produced (the
/// repository contains no code).
pub async fn run(dir: &Path) -> Result<PathBuf, IndexError> {
    let report = dir.join(REPORT_FILE);

    let child = Command::new("cloc")
        .arg(dir)
        .arg("--yaml")
        .arg(format!("--report-file={}", report.display()))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(IndexError::MissingDependency);
        }
        Err(err) => return Err(err.into()),
    };

    match tokio::time::timeout(CLOC_TIMEOUT, child.wait()).await {
        Ok(status) => {
            // Exit code unused; cloc signals "nothing to count" by not
            // writing the report.
            let _ = status?;
        }
        Err(_) => {
            let _ = child.kill().await;
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "cloc timed out",
            )));
        }
    }

    if report.is_file() {
        Ok(report)
    } else {
        Err(IndexError::StatisticsUnavailable)
    }
}
