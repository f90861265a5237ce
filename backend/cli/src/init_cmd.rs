//! `herald init`: write a fully defaulted config.

use anyhow::{bail, Result};
use std::path::Path;

use herald_config::{default_config, write_config};

use crate::terminal_output::note_success;

pub async fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    write_config(&default_config(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
