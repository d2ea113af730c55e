//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe. A [`Toolchain`] pairs the resolved paths with the per-operation
//! time budgets from [`sr_core::config::ToolsConfig`]; it is what the typed
//! command builders consume.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sr_core::config::ToolsConfig;

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Configuration for a single external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

fn custom_path<'a>(tools_config: &'a ToolsConfig, name: &str) -> Option<&'a Path> {
    match name {
        "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
        "ffprobe" => tools_config.ffprobe_path.as_deref(),
        _ => None,
    }
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the config supplies a custom path **and** that
    /// path exists, it is used directly. Otherwise [`which::which`] is used to
    /// locate the tool in `PATH`. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let resolved = match custom_path(tools_config, name) {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "Configured tool path does not exist; searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                    },
                );
            }
        }

        Self { tools }
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`sr_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> sr_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            sr_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Resolve both tools and attach the configured time budgets.
    pub fn toolchain(&self, tools_config: &ToolsConfig) -> sr_core::Result<Toolchain> {
        Ok(Toolchain {
            ffmpeg: self.require("ffmpeg")?.path.clone(),
            ffprobe: self.require("ffprobe")?.path.clone(),
            probe_timeout: tools_config.probe_timeout(),
            encode_timeout: tools_config.encode_timeout(),
            concat_timeout: tools_config.concat_timeout(),
        })
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }

    /// Iterate over all registered tool configs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

/// Resolved tool paths plus per-operation time budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub probe_timeout: Duration,
    pub encode_timeout: Duration,
    pub concat_timeout: Duration,
}

impl Toolchain {
    /// Toolchain from configuration alone, without any PATH lookup.
    pub fn from_config(tools_config: &ToolsConfig) -> Self {
        Self {
            ffmpeg: tools_config
                .ffmpeg_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe: tools_config
                .ffprobe_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("ffprobe")),
            probe_timeout: tools_config.probe_timeout(),
            encode_timeout: tools_config.encode_timeout(),
            concat_timeout: tools_config.concat_timeout(),
        }
    }
}
