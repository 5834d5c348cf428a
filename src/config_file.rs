use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config dir
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration file handler for logshard
///
/// Every key is optional; anything left out falls through to the command
/// line or the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub core: CoreSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreSection {
    pub filepath: Option<String>,
    pub workers: Option<usize>,
    pub tops: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub json: Option<bool>,
    pub level: Option<String>,
}

impl ConfigFile {
    /// Project-level config: `config.json` in the working directory
    pub fn find_project_config() -> Option<PathBuf> {
        let path = env::current_dir().ok()?.join(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    /// User config location: $XDG_CONFIG_HOME/logshard/config.json, falling
    /// back to ~/.config/logshard/config.json
    pub fn get_user_config_path() -> PathBuf {
        let xdg_config = env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".config"))
                    .unwrap_or_else(|_| PathBuf::from(".config"))
            });
        xdg_config.join("logshard").join(CONFIG_FILE_NAME)
    }

    /// Config file locations in precedence order
    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(project_config) = Self::find_project_config() {
            paths.push(project_config);
        }
        paths.push(Self::get_user_config_path());
        paths
    }

    /// Find the first existing configuration file
    pub fn find_config_path() -> Option<PathBuf> {
        Self::get_config_paths().into_iter().find(|p| p.exists())
    }

    /// Load the first config file found, or defaults when there is none
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        match Self::find_config_path() {
            Some(path) => Ok((Self::load_from_path(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Load configuration with optional custom config file path.
    ///
    /// An explicit path must exist; the implicit lookup may find nothing.
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = custom_path {
            let path_buf = PathBuf::from(path);
            let config = Self::load_from_path(&path_buf)?;
            Ok((config, Some(path_buf)))
        } else {
            Self::load()
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_json_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse JSON content from string
    fn parse_json_content(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(content)?)
    }

    /// Show the search locations and which one is in effect
    pub fn show_config<W: std::io::Write>(output: &mut W) -> std::io::Result<()> {
        writeln!(
            output,
            "Configuration precedence: CLI > ./{} > user config > defaults\n",
            CONFIG_FILE_NAME
        )?;
        writeln!(output, "Configuration search locations (in precedence order):")?;
        let project = env::current_dir()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME));
        for (i, (label, path)) in [("Project", project), ("User", Self::get_user_config_path())]
            .iter()
            .enumerate()
        {
            let status = if path.exists() { "(found)" } else { "(not found)" };
            writeln!(output, "  {}. {}: {} {}", i + 1, label, path.display(), status)?;
        }
        Ok(())
    }
}
