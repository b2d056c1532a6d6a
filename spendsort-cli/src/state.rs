use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// `$SPENDSORT_HOME`, or `~/.spendsort`.
pub fn spendsort_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("SPENDSORT_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".spendsort"))
}

pub fn ensure_spendsort_home() -> Result<PathBuf> {
    let dir = spendsort_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Absolute paths pass through; relative ones are taken from `home`.
pub fn resolve_in(home: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home.join(p)
    }
}
