//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, path_has_symlink_ancestor};
pub use types::{Config, DirectoryMapping, LogLevel};
pub use validate::validate_and_normalize;
pub use xml::{FileSettings, load_config_from_xml_path, load_settings, locate_config};

/// The usr-merge mapping table: legacy location -> canonical location.
pub const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    ("bin", "usr/bin"),
    ("sbin", "usr/bin"),
    ("usr/sbin", "usr/bin"),
    ("lib", "usr/lib"),
    ("lib32", "usr/lib32"),
    ("lib64", "usr/lib64"),
    ("libx32", "usr/libx32"),
];

/// Placeholder "keep" markers left by package managers.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".keep*"];

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "USR_MERGE_CONFIG";
