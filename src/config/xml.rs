//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Locates the file via an explicit path, $USR_MERGE_CONFIG, or the per-user default.
//! - Applies file values onto a Config; CLI overrides are applied afterwards by the caller.
//!
//! Notes:
//! - Unknown XML elements are rejected so misconfigurations surface early.
//! - `<mapping>` and `<ignore>` lists replace the built-in defaults when present.

use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::CONFIG_ENV;
use super::paths::default_config_path;
use super::types::{Config, DirectoryMapping, LogLevel};
use crate::errors::UsrMergeError;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    root: Option<String>,
    prefix: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    disable_locks: Option<bool>,
    #[serde(default, rename = "ignore")]
    ignore: Vec<String>,
    #[serde(default, rename = "mapping")]
    mappings: Vec<XmlMapping>,
}

#[derive(Debug, Deserialize)]
struct XmlMapping {
    #[serde(rename = "@from")]
    from: String,
    #[serde(rename = "@to")]
    to: String,
}

/// Settings read from a config file. `None` means "not set in the file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSettings {
    pub root: Option<PathBuf>,
    pub prefix: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<PathBuf>,
    pub disable_locks: Option<bool>,
    pub ignore_patterns: Option<Vec<String>>,
    pub mappings: Option<Vec<DirectoryMapping>>,
}

impl FileSettings {
    /// Overlay file values onto `cfg`.
    pub fn apply_to(&self, cfg: &mut Config) {
        if let Some(root) = &self.root {
            cfg.root = root.clone();
        }
        if let Some(prefix) = &self.prefix {
            cfg.prefix = Some(prefix.clone());
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = level.clone();
        }
        if let Some(log_file) = &self.log_file {
            cfg.log_file = Some(log_file.clone());
        }
        if let Some(disable) = self.disable_locks {
            cfg.disable_locks = disable;
        }
        if let Some(patterns) = &self.ignore_patterns {
            cfg.ignore_patterns = patterns.clone();
        }
        if let Some(mappings) = &self.mappings {
            cfg.mappings = mappings.clone();
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse the config file at `path`.
pub fn load_config_from_xml_path(path: &Path) -> Result<FileSettings, UsrMergeError> {
    let content = fs::read_to_string(path).map_err(|source| UsrMergeError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: XmlConfig = from_xml_str(&content).map_err(|e| UsrMergeError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let log_level = match non_empty(parsed.log_level.as_deref()) {
        Some(raw) => Some(raw.parse::<LogLevel>().map_err(|reason| {
            UsrMergeError::ConfigParse {
                path: path.to_path_buf(),
                reason,
            }
        })?),
        None => None,
    };

    let ignore: Vec<String> = parsed
        .ignore
        .iter()
        .filter_map(|p| non_empty(Some(p)))
        .map(str::to_string)
        .collect();

    let mappings: Vec<DirectoryMapping> = parsed
        .mappings
        .iter()
        .map(|m| DirectoryMapping::new(m.from.trim(), m.to.trim()))
        .collect();

    let settings = FileSettings {
        root: non_empty(parsed.root.as_deref()).map(PathBuf::from),
        prefix: non_empty(parsed.prefix.as_deref()).map(PathBuf::from),
        log_level,
        log_file: non_empty(parsed.log_file.as_deref()).map(PathBuf::from),
        disable_locks: parsed.disable_locks,
        ignore_patterns: (!ignore.is_empty()).then_some(ignore),
        mappings: (!mappings.is_empty()).then_some(mappings),
    };
    debug!(path = %path.display(), ?settings, "loaded config file");
    Ok(settings)
}

/// Decide which config file applies. The boolean is true when the file was
/// named explicitly (flag or environment) and therefore must exist.
pub fn locate_config(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(p) = explicit {
        return Some((p.to_path_buf(), true));
    }
    if let Some(p) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some((PathBuf::from(p), true));
    }
    default_config_path().map(|p| (p, false))
}

/// Load settings from the located config file, if any.
/// A missing default file is not an error; a missing explicit file is.
pub fn load_settings(explicit: Option<&Path>) -> Result<Option<FileSettings>, UsrMergeError> {
    let Some((path, required)) = locate_config(explicit) else {
        return Ok(None);
    };
    if !required && !path.exists() {
        debug!(path = %path.display(), "no config file at default location; using built-in defaults");
        return Ok(None);
    }
    load_config_from_xml_path(&path).map(Some)
}
