use anyhow::{Context, Result};
use sr_core::config::Config;
use std::path::{Path, PathBuf};

/// Searched in order when no `--config` is given.
const DEFAULT_PATHS: [&str; 3] = [
    "./slidereel.toml",
    "~/.config/slidereel/config.toml",
    "/etc/slidereel/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .check()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

/// Find the first default config location that exists.
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_PATHS.iter().find_map(|p| {
        let path = PathBuf::from(shellexpand::tilde(p).as_ref());
        path.exists().then_some(path)
    })
}

/// Load config from `custom_path`, the default locations, or defaults, then
/// apply environment overrides.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    let mut config = match custom_path.map(Path::to_path_buf).or_else(find_default_config) {
        Some(path) => {
            tracing::debug!("Loading config from {:?}", path);
            load_config(&path)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply `SLIDEREEL_*` overrides read through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    let set = |key: &str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(root) = set("SLIDEREEL_OUTPUT_ROOT") {
        config.storage.output_root = root;
    }
    if let Some(path) = set("SLIDEREEL_FFMPEG") {
        config.tools.ffmpeg_path = Some(path);
    }
    if let Some(path) = set("SLIDEREEL_FFPROBE") {
        config.tools.ffprobe_path = Some(path);
    }
}
