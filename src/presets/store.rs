//! User preset file.
//!
//! A JSON array of presets, e.g.
//!
//! ```json
//! [
//!   { "label": "Who Am I", "command": "whoami" },
//!   { "label": "List Processes", "command": "Get-Process", "help": "Get-Help Get-Process" }
//! ]
//! ```
//!
//! Entries override built-ins with the same label and are appended otherwise.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{debug, info};

use super::{Preset, PresetTable};

pub fn default_presets_path() -> PathBuf {
    // ~/.ps-commander/presets.json
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".ps-commander").join("presets.json")
}

/// Read presets from `path`. A missing file yields `None`.
pub fn load(path: &Path) -> anyhow::Result<Option<Vec<Preset>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No user preset file");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let presets: Vec<Preset> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid preset JSON at {}", path.display()))?;

    if let Some(bad) = presets
        .iter()
        .find(|p| p.label.trim().is_empty() || p.command.trim().is_empty())
    {
        anyhow::bail!(
            "Preset {:?} in {} needs a non-empty label and command",
            bad.label,
            path.display()
        );
    }

    Ok(Some(presets))
}

/// Built-in table merged with the user file at `path`.
pub fn load_table(path: &Path) -> anyhow::Result<PresetTable> {
    let mut table = PresetTable::builtin();
    if let Some(user) = load(path)? {
        info!(path = %path.display(), count = user.len(), "Loaded user presets");
        table.extend(user);
    }
    Ok(table)
}
