//! `herald check`: validate a config file.

use anyhow::Result;
use std::path::Path;

use herald_config::{load_config, prepare, validate};

use crate::terminal_output::{note_error, note_success, note_warn, render_report};

/// Print the validation report. Returns whether the config has no errors.
pub async fn run(path: &Path) -> Result<bool> {
    if !path.exists() {
        note_warn(&format!("{} does not exist; checking defaults", path.display()));
    }
    let config = prepare(load_config(path).await?)?;
    let report = validate(&config);

    if report.errors.is_empty() && report.warnings.is_empty() {
        note_success(&format!("{} is valid", path.display()));
        return Ok(true);
    }
    print!("{}", render_report(&report));
    if report.is_valid() {
        note_warn(&format!("{} is valid with {} warning(s)", path.display(), report.warnings.len()));
    } else {
        note_error(&format!("{} has {} error(s)", path.display(), report.errors.len()));
    }
    Ok(report.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_checks_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("herald.yaml")).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_alias_replacement_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herald.yaml");
        tokio::fs::write(&path, "handler:\n  aliasReplacement: \"(\"\n").await.unwrap();
        assert!(!run(&path).await.unwrap());
    }
}
