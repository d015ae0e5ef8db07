use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ClaiError;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEBUG_VAR: &str = "DEBUG";

const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_PHOTO_MODEL: &str = "dall-e-3";
const DEFAULT_PICTURE_PREFIX: &str = "clai";
const DEFAULT_PICTURE_SUBDIR: &str = "Pictures";
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant for a CLI interface. Answer concisely and informatively. Prefer markdown if possible.";
const DEFAULT_PHOTO_PROMPT_FORMAT: &str = "I NEED to test how the tool works with extremely simple prompts. DO NOT add any detail, just use it AS-IS: '{}'";

const CONFIG_DIR: &str = ".clai";
const CONFIG_FILE: &str = "config.yaml";

/// Built-in option values. Flags that still equal these are treated as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub chat_model: String,
    pub photo_model: String,
    pub picture_dir: PathBuf,
    pub picture_prefix: String,
    pub stdin_replace: String,
    pub print_raw: bool,
    pub reply_mode: bool,
}

impl Defaults {
    pub fn for_home(home: &Path) -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            photo_model: DEFAULT_PHOTO_MODEL.to_string(),
            picture_dir: home.join(DEFAULT_PICTURE_SUBDIR),
            picture_prefix: DEFAULT_PICTURE_PREFIX.to_string(),
            stdin_replace: String::new(),
            print_raw: false,
            reply_mode: false,
        }
    }
}

/// Flag values after each pair of alternative flags has been collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagValues {
    pub chat_model: String,
    pub photo_model: String,
    pub picture_dir: PathBuf,
    pub picture_prefix: String,
    pub stdin_replace: String,
    pub print_raw: bool,
    pub reply_mode: bool,
}

impl From<&Defaults> for FlagValues {
    fn from(defaults: &Defaults) -> Self {
        Self {
            chat_model: defaults.chat_model.clone(),
            photo_model: defaults.photo_model.clone(),
            picture_dir: defaults.picture_dir.clone(),
            picture_prefix: defaults.picture_prefix.clone(),
            stdin_replace: defaults.stdin_replace.clone(),
            print_raw: defaults.print_raw,
            reply_mode: defaults.reply_mode,
        }
    }
}

/// Two flags that set the same option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagPair {
    pub short: &'static str,
    pub long: &'static str,
}

/// Collapses two alternative flag values into one. Fails when both were moved
/// off the default.
pub fn return_non_default<T: PartialEq>(
    short: T,
    long: T,
    default: T,
    pair: FlagPair,
) -> Result<T, ClaiError> {
    match (short != default, long != default) {
        (true, true) => Err(ClaiError::MutuallyExclusive {
            first: pair.short,
            second: pair.long,
        }),
        (true, false) => Ok(short),
        (false, true) => Ok(long),
        (false, false) => Ok(default),
    }
}

/// Optional `~/.clai/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// Prompt format for image generation, `{}` marks the prompt.
    pub photo: Option<String>,
    /// System prompt for chat queries.
    pub query: Option<String>,
    pub chat_model: Option<String>,
    pub photo_model: Option<String>,
    pub picture_dir: Option<PathBuf>,
    pub picture_prefix: Option<String>,
    pub raw: Option<bool>,
}

pub fn config_dir(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR)
}

pub fn config_file_path(home: &Path) -> PathBuf {
    config_dir(home).join(CONFIG_FILE)
}

/// A missing file is not an error.
pub fn load_file_config(path: &Path) -> Result<Option<FileConfig>, ClaiError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ClaiError::ConfigFile {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    if raw.trim().is_empty() {
        return Ok(Some(FileConfig::default()));
    }

    serde_yaml::from_str(&raw)
        .map(Some)
        .map_err(|err| ClaiError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub chat_model: String,
    pub photo_model: String,
    pub picture_dir: PathBuf,
    pub picture_prefix: String,
    pub print_raw: bool,
    pub reply_mode: bool,
    pub stdin_replace: String,
    pub system_prompt: String,
    pub photo_prompt_format: String,
}

fn pick<T: PartialEq>(flag: T, file: Option<T>, default: &T) -> T {
    if flag != *default {
        return flag;
    }
    file.unwrap_or(flag)
}

/// Flag (when moved off its default) beats file, file beats default.
pub fn resolve(defaults: &Defaults, flags: FlagValues, file: Option<&FileConfig>) -> EffectiveConfig {
    let file = file.cloned().unwrap_or_default();

    EffectiveConfig {
        chat_model: pick(flags.chat_model, file.chat_model, &defaults.chat_model),
        photo_model: pick(flags.photo_model, file.photo_model, &defaults.photo_model),
        picture_dir: pick(flags.picture_dir, file.picture_dir, &defaults.picture_dir),
        picture_prefix: pick(
            flags.picture_prefix,
            file.picture_prefix,
            &defaults.picture_prefix,
        ),
        print_raw: pick(flags.print_raw, file.raw, &defaults.print_raw),
        reply_mode: flags.reply_mode,
        stdin_replace: flags.stdin_replace,
        system_prompt: file
            .query
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        photo_prompt_format: file
            .photo
            .unwrap_or_else(|| DEFAULT_PHOTO_PROMPT_FORMAT.to_string()),
    }
}

/// Settings for the remote API, read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApiSettings {
    pub fn from_env_with(get_var: impl Fn(&str) -> Option<String>) -> Result<Self, ClaiError> {
        let api_key = get_var(API_KEY_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ClaiError::MissingApiKey { var: API_KEY_VAR })?;

        let base_url = get_var("OPENAI_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            api_key,
            base_url,
            timeout_secs: parse_positive_u64(
                get_var("CLAI_TIMEOUT_SECS").as_deref(),
                DEFAULT_TIMEOUT_SECS,
            ),
        })
    }
}

pub fn debug_enabled(get_var: impl Fn(&str) -> Option<String>) -> bool {
    parse_bool(get_var(DEBUG_VAR).as_deref(), false)
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
