use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::oracle::CallPolicy;

pub const DEFAULT_MODEL: &str = "phi3:mini";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_PACING_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub ollama_url: String,
    pub dpi: u32,
    /// Wait after every successful oracle call.
    pub pacing_delay_ms: u64,
    /// No timeout when unset; a stuck model then blocks the run.
    pub timeout_secs: Option<u64>,
    pub tesseract_cmd: String,
    pub pdftoppm_cmd: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            dpi: DEFAULT_DPI,
            pacing_delay_ms: DEFAULT_PACING_MS,
            timeout_secs: None,
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
        }
    }
}

impl Settings {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            pacing_delay: Duration::from_millis(self.pacing_delay_ms),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn get_settings_path() -> PathBuf {
    let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config_dir.join("oilsplit").join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = get_settings_path();
    if path.exists() {
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> AppResult<PathBuf> {
    let path = get_settings_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json)?;
    Ok(path)
}
