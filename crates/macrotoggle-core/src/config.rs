//! Macro configuration loading and validation.
//!
//! Documents are JSON (default) or YAML, chosen by file extension. All
//! structural problems are collected with a field path before anything runs.

use crate::{
    Action, ConfigError, Hotkey, Key, MacroDefinition, MouseButton, MoveMode, Step, TriggerMode,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// File name looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "macros.json";

/// A validation problem with context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path to the problematic field (e.g. `macro[3].action`).
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.path, self.message)
    }
}

/// Which input backend the binary should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Real OS injection.
    #[default]
    Enigo,
    /// Log every operation, inject nothing.
    DryRun,
}

/// A fully validated configuration.
#[derive(Debug, Clone)]
pub struct MacroConfig {
    pub definition: MacroDefinition,
    pub trigger: TriggerMode,
    pub backend: BackendKind,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    trigger_hotkey: Option<String>,
    #[serde(default)]
    quit_hotkey: Option<String>,
    #[serde(default)]
    trigger_key: Option<String>,
    #[serde(default)]
    quit_key: Option<String>,
    #[serde(default, rename = "loop")]
    looping: bool,
    #[serde(default)]
    backend: BackendKind,
    #[serde(default, rename = "macro")]
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStep {
    #[serde(rename = "type")]
    kind: Option<String>,
    seconds: Option<f64>,
    text: Option<String>,
    key: Option<String>,
    keys: Option<Vec<String>>,
    action: Option<String>,
    button: Option<String>,
    count: Option<i64>,
    mode: Option<String>,
    x: Option<i32>,
    y: Option<i32>,
    dx: Option<i32>,
    dy: Option<i32>,
}

impl MacroConfig {
    /// Load from a file; `.yaml`/`.yml` is parsed as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let config = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };
        info!(?path, steps = config.definition.len(), "Loaded macro configuration");
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();

        let trigger = validate_trigger(&raw, &mut errors);

        let steps = match &raw.steps {
            Some(steps) => steps
                .iter()
                .enumerate()
                .filter_map(|(i, step)| build_step(step, &format!("macro[{i}]"), &mut errors))
                .collect(),
            None => {
                errors.push(ValidationError::new("macro", "\"macro\" is required"));
                Vec::new()
            }
        };

        match trigger {
            Some(trigger) if errors.is_empty() => {
                debug!(%trigger, "trigger configured");
                Ok(Self {
                    definition: MacroDefinition::new(steps, raw.looping),
                    trigger,
                    backend: raw.backend,
                })
            }
            _ => Err(ConfigError::Invalid(errors)),
        }
    }
}

/// Treat empty strings like absent fields.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn validate_trigger(raw: &RawConfig, errors: &mut Vec<ValidationError>) -> Option<TriggerMode> {
    let trigger_hotkey = present(&raw.trigger_hotkey);
    let quit_hotkey = present(&raw.quit_hotkey);
    let trigger_key = present(&raw.trigger_key);
    let quit_key = present(&raw.quit_key);

    match (trigger_hotkey, trigger_key) {
        (Some(toggle), None) => {
            if quit_key.is_some() {
                errors.push(ValidationError::new(
                    "quit_key",
                    "quit_key requires trigger_key; use quit_hotkey with trigger_hotkey",
                ));
            }
            let toggle = parse_hotkey(toggle, "trigger_hotkey", errors)?;
            let quit = match quit_hotkey {
                Some(q) => Some(parse_hotkey(q, "quit_hotkey", errors)?),
                None => None,
            };
            Some(TriggerMode::Combo { toggle, quit })
        }
        (None, Some(trigger)) => {
            if quit_hotkey.is_some() {
                errors.push(ValidationError::new(
                    "quit_hotkey",
                    "quit_hotkey requires trigger_hotkey; use quit_key with trigger_key",
                ));
            }
            let trigger = parse_key(trigger, "trigger_key", errors)?;
            let quit = match quit_key {
                Some(q) => Some(parse_key(q, "quit_key", errors)?),
                None => None,
            };
            Some(TriggerMode::SingleKey { trigger, quit })
        }
        (Some(_), Some(_)) => {
            errors.push(ValidationError::new(
                "trigger_hotkey",
                "trigger_hotkey and trigger_key are mutually exclusive",
            ));
            None
        }
        (None, None) => {
            errors.push(ValidationError::new(
                "trigger_hotkey",
                "either \"trigger_hotkey\" or \"trigger_key\" is required",
            ));
            None
        }
    }
}

fn parse_hotkey(s: &str, path: &str, errors: &mut Vec<ValidationError>) -> Option<Hotkey> {
    s.parse::<Hotkey>()
        .map_err(|_| {
            errors.push(ValidationError::new(
                path,
                format!("invalid hotkey {s:?}, expected e.g. \"<ctrl>+<alt>+h\""),
            ))
        })
        .ok()
}

fn parse_key(s: &str, path: &str, errors: &mut Vec<ValidationError>) -> Option<Key> {
    s.parse::<Key>()
        .map_err(|e| errors.push(ValidationError::new(path, e.to_string())))
        .ok()
}

fn parse_enum<T>(
    value: Option<&str>,
    default: T,
    path: String,
    errors: &mut Vec<ValidationError>,
) -> Option<T>
where
    T: std::str::FromStr<Err = crate::InvalidValue>,
{
    match value {
        None => Some(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|e| errors.push(ValidationError::new(path, e.to_string())))
            .ok(),
    }
}

/// Convert one raw step, recording any problem under `path`.
fn build_step(raw: &RawStep, path: &str, errors: &mut Vec<ValidationError>) -> Option<Step> {
    let Some(kind) = raw.kind.as_deref() else {
        errors.push(ValidationError::new(format!("{path}.type"), "step type is required"));
        return None;
    };

    let step = match kind {
        "wait" => {
            let seconds = raw.seconds.unwrap_or(0.0);
            if !seconds.is_finite() || seconds < 0.0 {
                errors.push(ValidationError::new(
                    format!("{path}.seconds"),
                    "seconds must be a non-negative number",
                ));
                return None;
            }
            let Ok(duration) = Duration::try_from_secs_f64(seconds) else {
                errors.push(ValidationError::new(
                    format!("{path}.seconds"),
                    format!("seconds must be at most {}", Duration::MAX.as_secs()),
                ));
                return None;
            };
            Step::Wait { duration }
        }
        "text" => Step::Text {
            content: raw.text.clone().unwrap_or_default(),
        },
        "key" => {
            let Some(key) = raw.key.as_deref() else {
                errors.push(ValidationError::new(format!("{path}.key"), "key is required"));
                return None;
            };
            let key = parse_key(key, &format!("{path}.key"), errors);
            let action = parse_enum(
                raw.action.as_deref(),
                Action::Tap,
                format!("{path}.action"),
                errors,
            );
            Step::Key {
                key: key?,
                action: action?,
            }
        }
        "combo" => {
            let keys: Vec<Option<Key>> = raw
                .keys
                .iter()
                .flatten()
                .enumerate()
                .map(|(i, k)| parse_key(k, &format!("{path}.keys[{i}]"), errors))
                .collect();
            Step::Combo {
                keys: keys.into_iter().collect::<Option<Vec<_>>>()?,
            }
        }
        "mouse_click" => {
            let button = parse_enum(
                raw.button.as_deref(),
                MouseButton::Left,
                format!("{path}.button"),
                errors,
            )?;
            let count = raw.count.unwrap_or(1).clamp(0, i64::from(u32::MAX));
            Step::MouseClick {
                button,
                count: u32::try_from(count).unwrap_or(u32::MAX),
            }
        }
        "mouse_button" => {
            let button = parse_enum(
                raw.button.as_deref(),
                MouseButton::Left,
                format!("{path}.button"),
                errors,
            );
            let action = parse_enum(
                raw.action.as_deref(),
                Action::Tap,
                format!("{path}.action"),
                errors,
            );
            Step::MouseButton {
                button: button?,
                action: action?,
            }
        }
        "mouse_move" => {
            let mode = parse_enum(
                raw.mode.as_deref(),
                MoveMode::Relative,
                format!("{path}.mode"),
                errors,
            )?;
            Step::MouseMove {
                mode,
                x: raw.x.unwrap_or(0),
                y: raw.y.unwrap_or(0),
            }
        }
        "mouse_scroll" => Step::MouseScroll {
            dx: raw.dx.unwrap_or(0),
            dy: raw.dy.unwrap_or(0),
        },
        other => {
            errors.push(ValidationError::new(
                format!("{path}.type"),
                format!("unknown step type {other:?}"),
            ));
            return None;
        }
    };
    Some(step)
}

/// Places searched for a configuration file, in order.
pub fn candidate_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("macrotoggle").join(DEFAULT_CONFIG_FILE));
    }
    paths
}

/// Resolve the configuration path: an explicit path wins, otherwise the
/// first existing candidate.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    candidate_config_paths().into_iter().find(|p| p.exists())
}
