use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Point2PointError, Point2PointResult};
use crate::measure::units::{DEFAULT_BASE_FONT_SIZE, DEFAULT_DPI};

const CONFIG_FILE: &str = "config.toml";
const ENV_DPI: &str = "POINT2POINT_DPI";
const ENV_BASE_FONT_SIZE: &str = "POINT2POINT_BASE_FONT_SIZE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionConfig {
    #[serde(default = "default_dpi")]
    pub dpi: f64,
    #[serde(default = "default_base_font_size")]
    pub base_font_size: f64,
    /// Overrides the captured-region width for vw/vh/%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<f64>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            base_font_size: DEFAULT_BASE_FONT_SIZE,
            viewport_width: None,
            viewport_height: None,
        }
    }
}

fn default_dpi() -> f64 {
    DEFAULT_DPI
}

fn default_base_font_size() -> f64 {
    DEFAULT_BASE_FONT_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_timeout")]
    pub timeout_ms: u64,
    /// Pause between a screenshot tool exiting and reading its output file.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
    /// Explicit provider order by name; empty picks one from the display protocol.
    #[serde(default)]
    pub providers: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_capture_timeout(),
            settle_ms: default_settle(),
            providers: Vec::new(),
        }
    }
}

fn default_capture_timeout() -> u64 {
    5000
}

fn default_settle() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopologyConfig {
    #[serde(default = "default_topology_timeout")]
    pub timeout_ms: u64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_topology_timeout(),
        }
    }
}

fn default_topology_timeout() -> u64 {
    3000
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(CONFIG_FILE);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = user_config_path()?;
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in user config dir");
        return Some(candidate);
    }
    None
}

/// `~/.config/point2point/config.toml` on Linux.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("point2point").join(CONFIG_FILE))
}

/// Loads the first config file found, or defaults when there is none.
/// Environment overrides are applied on top either way.
pub fn load_config() -> Point2PointResult<AppConfig> {
    let mut config = match resolve_config_path() {
        Some(path) => load_config_from(&path)?,
        None => {
            tracing::info!("no config.toml found; using defaults");
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Point2PointResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        dpi = config.conversion.dpi,
        base_font_size = config.conversion.base_font_size,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> Point2PointResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Point2PointResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_DPI) {
        config.conversion.dpi = parse_env_number(ENV_DPI, &raw)?;
    }
    if let Some(raw) = lookup(ENV_BASE_FONT_SIZE) {
        config.conversion.base_font_size = parse_env_number(ENV_BASE_FONT_SIZE, &raw)?;
    }
    Ok(())
}

fn parse_env_number(key: &str, raw: &str) -> Point2PointResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Point2PointError::Config(format!("{key}={raw:?} is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.conversion.dpi, 96.0);
        assert_eq!(config.conversion.base_font_size, 16.0);
        assert_eq!(config.capture.timeout_ms, 5000);
        assert_eq!(config.capture.settle_ms, 300);
        assert_eq!(config.topology.timeout_ms, 3000);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [conversion]
            dpi = 144.0
            viewport_width = 1280.0

            [capture]
            providers = ["grim", "xcap"]
            "#,
        )
        .unwrap();
        assert_eq!(config.conversion.dpi, 144.0);
        assert_eq!(config.conversion.base_font_size, 16.0);
        assert_eq!(config.conversion.viewport_width, Some(1280.0));
        assert_eq!(config.conversion.viewport_height, None);
        assert_eq!(config.capture.providers, vec!["grim", "xcap"]);
        assert_eq!(config.capture.timeout_ms, 5000);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.conversion.base_font_size = 18.0;
        config.capture.providers = vec!["scrot".into()];

        save_config(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[conversion]\ndpi = \"lots\"\n").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(Point2PointError::TomlDe(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_DPI => Some("120".into()),
            ENV_BASE_FONT_SIZE => Some(" 14.5 ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.conversion.dpi, 120.0);
        assert_eq!(config.conversion.base_font_size, 14.5);
    }

    #[test]
    fn bad_env_value_is_a_config_error() {
        let mut config = AppConfig::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == ENV_DPI).then(|| "ninety-six".to_string())
        });
        assert!(matches!(result, Err(Point2PointError::Config(_))));
        assert_eq!(config.conversion.dpi, 96.0);
    }
}
