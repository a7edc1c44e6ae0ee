//! Derives the project name used to scope memories.

use std::path::Path;
use std::process::Command;

/// Name of the project containing the current directory: the git toplevel's
/// base name, falling back to the cwd's base name, then `"unknown"`.
///
/// Resolved fresh on every call — one command invocation, one lookup.
pub fn current_project() -> String {
    if let Ok(out) = Command::new("git").args(["rev-parse", "--show-toplevel"]).output() {
        if out.status.success() {
            let toplevel = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if let Some(name) = Path::new(&toplevel).file_name() {
                return name.to_string_lossy().into_owned();
            }
        }
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".into()),
        Err(_) => "unknown".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_yields_a_name() {
        let p = current_project();
        assert!(!p.is_empty());
    }
}
