//! Reading and writing `herald.yaml`.

use crate::schema::HeraldConfig;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "herald.yaml";

const HEADER: &str = "# Herald configuration. `${VAR}` values are read from the environment.\n";

/// Previous versions kept next to the file as `herald.yaml.1`, `.2`, ...
const KEEP_BACKUPS: usize = 3;

/// `HERALD_CONFIG_DIR`, else `~/.herald`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HERALD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".herald"))
        .unwrap_or_else(|| PathBuf::from(".herald"))
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Parse config text. A file holding only blank lines and comments is the
/// default config.
pub fn parse_config(raw: &str) -> Result<HeraldConfig> {
    let blank = raw.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    });
    if blank {
        return Ok(HeraldConfig::default());
    }
    serde_yaml::from_str(raw).context("Invalid herald config YAML")
}

/// Load the config at `path`. A missing file is the default config.
pub async fn load_config(path: &Path) -> Result<HeraldConfig> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "[Config] No config file; using defaults");
            return Ok(HeraldConfig::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let config = parse_config(&raw).with_context(|| path.display().to_string())?;
    debug!(path = %path.display(), "[Config] Loaded");
    Ok(config)
}

/// The text `write_config` puts on disk.
pub fn render_config(config: &HeraldConfig) -> Result<String> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    Ok(format!("{HEADER}{yaml}"))
}

/// Write `config` through a temp file and rename. Returns `false` when the
/// file already holds exactly this config; nothing is touched then.
/// Otherwise the previous file becomes the newest backup.
pub async fn write_config(config: &HeraldConfig, path: &Path) -> Result<bool> {
    let text = render_config(config)?;
    match fs::read_to_string(path).await {
        Ok(existing) if existing == text => {
            debug!(path = %path.display(), "[Config] Unchanged; not writing");
            return Ok(false);
        }
        Ok(_) => shift_backups(path).await,
        Err(_) => {}
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, text.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move config into {}", path.display()))?;

    info!(path = %path.display(), "[Config] Wrote config");
    Ok(true)
}

pub fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

async fn shift_backups(path: &Path) {
    for n in (1..KEEP_BACKUPS).rev() {
        match fs::rename(backup_path(path, n), backup_path(path, n + 1)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(backup = n, error = %e, "[Config] Failed to shift backup"),
        }
    }
    if let Err(e) = fs::copy(path, backup_path(path, 1)).await {
        warn!(path = %path.display(), error = %e, "[Config] Failed to back up config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::HandlerConfig;

    fn with_prefix(prefix: &str) -> HeraldConfig {
        HeraldConfig {
            handler: Some(HandlerConfig {
                prefixes: Some(vec![prefix.into()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.yaml")).await.unwrap();
        assert_eq!(cfg, HeraldConfig::default());
    }

    #[test]
    fn comment_only_file_is_default() {
        let cfg = parse_config("# nothing here yet\n\n").unwrap();
        assert_eq!(cfg, HeraldConfig::default());
        assert!(parse_config("handler: [").is_err());
    }

    #[tokio::test]
    async fn rewrites_keep_bounded_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        for prefix in ["a", "b", "c", "d", "e"] {
            assert!(write_config(&with_prefix(prefix), &path).await.unwrap());
        }
        assert_eq!(load_config(&path).await.unwrap(), with_prefix("e"));
        assert_eq!(load_config(&backup_path(&path, 1)).await.unwrap(), with_prefix("d"));
        assert_eq!(load_config(&backup_path(&path, 3)).await.unwrap(), with_prefix("b"));
        assert!(!backup_path(&path, 4).exists());
    }

    #[tokio::test]
    async fn unchanged_config_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        assert!(write_config(&with_prefix("?"), &path).await.unwrap());
        assert!(!write_config(&with_prefix("?"), &path).await.unwrap());
        assert!(!backup_path(&path, 1).exists());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# Herald"));
    }
}
