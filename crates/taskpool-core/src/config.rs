use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
    #[serde(default = "default_toast_tick_ms")]
    pub toast_tick_ms: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: default_search_debounce_ms(),
            toast_duration_ms: default_toast_duration_ms(),
            toast_tick_ms: default_toast_tick_ms(),
            max_redirects: default_max_redirects(),
            theme: Theme::default(),
            locale: Locale::default(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    De,
    Es,
    Fr,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::De => "de",
            Self::Es => "es",
            Self::Fr => "fr",
        })
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum ConfigSource {
    Explicit(PathBuf),
    WorkingDir(PathBuf),
    UserDir(PathBuf),
    Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub app: AppConfig,
    pub source: ConfigSource,
    pub resolved_output: String,
}

/// Parse one config file. A missing file yields defaults.
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<AppConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Look up the configuration: explicit path, then `./taskpool.toml`, then
/// the per-user config directory.
pub fn load_config(explicit: Option<&Path>, working_dir: &Path) -> Result<(AppConfig, ConfigSource)> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        let config = load_config_file(path)?;
        return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
    }

    let local = working_dir.join("taskpool.toml");
    if local.exists() {
        let config = load_config_file(&local)?;
        return Ok((config, ConfigSource::WorkingDir(local)));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("taskpool/config.toml");
        if user.exists() {
            let config = load_config_file(&user)?;
            return Ok((config, ConfigSource::UserDir(user)));
        }
    }

    Ok((AppConfig::default(), ConfigSource::Defaults))
}

pub fn resolve_config(
    explicit: Option<&Path>,
    working_dir: &Path,
    cli_json: bool,
) -> Result<EffectiveConfig> {
    let (app, source) = load_config(explicit, working_dir)?;
    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, app.output.clone(), env_format);
    Ok(EffectiveConfig {
        app,
        source,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, config_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = config_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_search_debounce_ms() -> u64 {
    300
}

const fn default_toast_duration_ms() -> u64 {
    3000
}

const fn default_toast_tick_ms() -> u64 {
    250
}

const fn default_max_redirects() -> u32 {
    4
}
