//! Settings file loading.
//!
//! # Layout
//!
//! ```text
//! [settings]
//! ignored_dirs = .git, node_modules
//! ignored_files = *.log, *.swp
//! # optional
//! ssh_program = /usr/bin/ssh
//! rsync_program = /usr/local/bin/rsync
//! control_path = ~/.ssh/%r@%h:%p_%l
//! ```
//!
//! The file is INI unless its extension says YAML, TOML or JSON; the same
//! keys apply in every format. In the structured formats the two pattern
//! keys may also be written as lists.

use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{ExclusionSet, ToolSettings};

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "simplesync.cfg";

/// Everything the settings file contributes to a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub exclusions: ExclusionSet,
    pub tools: ToolSettings,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    settings: SettingsSection,
}

#[derive(Debug, Deserialize)]
struct SettingsSection {
    ignored_dirs: PatternList,
    ignored_files: PatternList,
    ssh_program: Option<PathBuf>,
    rsync_program: Option<PathBuf>,
    control_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatternList {
    Csv(String),
    Items(Vec<String>),
}

impl PatternList {
    fn into_items(self) -> Vec<String> {
        match self {
            PatternList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
            PatternList::Items(items) => items,
        }
    }
}

/// Load settings from `path`. A missing file is [`ConfigError::NotFound`].
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let parse_err = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let raw = Config::builder()
        .add_source(File::from(path).format(format_for(path)).required(true))
        .build()
        .map_err(parse_err)?;
    let file: SettingsFile = raw.try_deserialize().map_err(parse_err)?;
    Ok(file.settings.into())
}

/// Like [`load`], but a missing file yields `Ok(None)`.
pub fn load_optional(path: &Path) -> Result<Option<Settings>, ConfigError> {
    match load(path) {
        Ok(settings) => Ok(Some(settings)),
        Err(ConfigError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn format_for(path: &Path) -> FileFormat {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Ini,
    }
}

impl From<SettingsSection> for Settings {
    fn from(section: SettingsSection) -> Self {
        let defaults = ToolSettings::default();
        Self {
            exclusions: ExclusionSet::new(
                section.ignored_dirs.into_items(),
                section.ignored_files.into_items(),
            ),
            tools: ToolSettings {
                ssh_program: section.ssh_program.unwrap_or(defaults.ssh_program),
                rsync_program: section.rsync_program.unwrap_or(defaults.rsync_program),
                control_path: section
                    .control_path
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or(defaults.control_path),
            },
        }
    }
}
