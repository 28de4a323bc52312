//! Running the external command-line tools (pdftoppm, tesseract).

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use crate::error::{AppError, AppResult};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Run `program` with `args` and return its stdout.
pub fn run_tool<I, S>(program: &str, args: I) -> AppResult<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let output = cmd
        .output()
        .map_err(|e| AppError::Tool(format!("{}: {}", program, e)))?;
    if output.status.success() {
        return Ok(output.stdout);
    }

    let status = output
        .status
        .code()
        .map(|c| format!("exit code {}", c))
        .unwrap_or_else(|| "terminated".to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(AppError::Tool(
        format!("{} {}: {}", program, status, stderr).trim().to_string(),
    ))
}

/// Scratch directory under `parent`, removed when dropped.
pub fn scratch_dir(parent: &Path, prefix: &str) -> AppResult<TempDir> {
    Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dirs_are_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let a = scratch_dir(parent.path(), ".ocr").unwrap();
        let b = scratch_dir(parent.path(), ".ocr").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(parent.path()));

        let kept = a.path().to_path_buf();
        assert!(kept.is_dir());
        drop(a);
        assert!(!kept.exists());
    }

    #[test]
    fn missing_program_is_a_tool_error() {
        let err = run_tool("oilsplit-no-such-program", ["--version"]).unwrap_err();
        assert!(matches!(err, AppError::Tool(ref m) if m.contains("oilsplit-no-such-program")));
    }
}
