use anyhow::{Context, Result};
use directories::ProjectDirs;
use ratatui::style::Color;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub icons: Icons,
    pub refresh: RefreshConfig,
    pub storage: StorageConfig,
    pub behavior: BehaviorConfig,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Theme {
    #[serde(deserialize_with = "hex_to_color")]
    pub background: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub foreground: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub selection: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub black: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub red: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub green: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub yellow: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub blue: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub magenta: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub cyan: Color,
    #[serde(deserialize_with = "hex_to_color")]
    pub gray: Color,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Icons {
    pub stopwatch: String,
    pub interval_list: String,
    pub play: String,
    pub pause: String,
    pub select: String,
    pub input_cursor: String,
    pub separator: String,
    pub header_left: String,
    pub header_right: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RefreshConfig {
    /// Display refresh period while the timer runs.
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides `<data dir>/state.json`.
    pub path: Option<PathBuf>,
    /// Keep state in memory only; nothing survives a restart.
    pub ephemeral: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Ask before a reset discards recorded intervals.
    pub confirm_reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            icons: Icons::default(),
            refresh: RefreshConfig::default(),
            storage: StorageConfig::default(),
            behavior: BehaviorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Rgb(9, 14, 19),
            foreground: Color::Rgb(197, 201, 199),
            selection: Color::Rgb(230, 195, 132),
            black: Color::Rgb(13, 12, 12),
            red: Color::Rgb(228, 104, 118),
            green: Color::Rgb(138, 154, 123),
            yellow: Color::Rgb(196, 178, 138),
            blue: Color::Rgb(127, 180, 202),
            magenta: Color::Rgb(162, 146, 163),
            cyan: Color::Rgb(122, 168, 159),
            gray: Color::Rgb(164, 167, 164),
        }
    }
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            stopwatch: "Δ".to_string(),
            interval_list: "⬢".to_string(),
            play: "▶".to_string(),
            pause: "⏸".to_string(),
            select: "▸".to_string(),
            input_cursor: "▊".to_string(),
            separator: "│".to_string(),
            header_left: "⟪ ".to_string(),
            header_right: " ⟫".to_string(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            confirm_reset: true,
        }
    }
}

fn hex_to_color<'de, D>(deserializer: D) -> Result<Color, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    if !s.is_ascii() || !s.starts_with('#') || s.len() != 7 {
        return Err(serde::de::Error::custom("invalid hex color format"));
    }
    let r = u8::from_str_radix(&s[1..3], 16).map_err(serde::de::Error::custom)?;
    let g = u8::from_str_radix(&s[3..5], 16).map_err(serde::de::Error::custom)?;
    let b = u8::from_str_radix(&s[5..7], 16).map_err(serde::de::Error::custom)?;
    Ok(Color::Rgb(r, g, b))
}

pub fn load_config() -> Result<Config> {
    match ProjectDirs::from("com", "stint", "stint") {
        Some(proj_dirs) => load_config_from(&proj_dirs.config_dir().join("stint.toml")),
        None => Ok(Config::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    parse_config(&config_str).with_context(|| format!("Failed to parse config file at {:?}", path))
}

fn parse_config(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)?;
    if config.refresh.interval_ms == 0 {
        anyhow::bail!("refresh.interval_ms must be greater than zero");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.refresh.interval_ms, 100);
        assert!(config.behavior.confirm_reset);
        assert!(!config.storage.ephemeral);
        assert_eq!(config.storage.path, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r##"
            log_level = "debug"

            [theme]
            red = "#ff0000"

            [refresh]
            interval_ms = 250

            [storage]
            path = "/var/tmp/stint.json"

            [behavior]
            confirm_reset = false
            "##,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.theme.red, Color::Rgb(255, 0, 0));
        assert_eq!(config.theme.blue, Theme::default().blue);
        assert_eq!(config.refresh.interval_ms, 250);
        assert_eq!(config.storage.path, Some(PathBuf::from("/var/tmp/stint.json")));
        assert!(!config.behavior.confirm_reset);
        assert_eq!(config.icons.play, "▶");
    }

    #[test]
    fn malformed_colors_are_rejected() {
        assert!(parse_config("[theme]\nred = \"red\"").is_err());
        assert!(parse_config("[theme]\nred = \"#gg0000\"").is_err());
        // Seven bytes, but the second digit pair straddles a multi-byte char.
        assert!(parse_config("[theme]\nred = \"#0é000\"").is_err());
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        assert!(parse_config("[refresh]\ninterval_ms = 0").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("stint.toml")).unwrap();
        assert_eq!(config.refresh.interval_ms, 100);
    }
}
