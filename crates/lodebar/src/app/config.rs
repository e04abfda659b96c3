use cap_std::fs_utf8::Dir;
use lode_compass::{colors::DEFAULT_COLORS_FILE_NAME, TrackerConfig};
use lode_core::config::load_or_create_json;
use miette::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "lodebar_config.json";

/// Everything a user can tweak. Lives in the data dir as `lodebar_config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodebarConfig {
    /// file name of the lodestone colors, relative to the data dir
    pub colors_file: String,
    pub tracker: TrackerConfig,
}

impl Default for LodebarConfig {
    fn default() -> Self {
        Self {
            colors_file: DEFAULT_COLORS_FILE_NAME.to_string(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl LodebarConfig {
    pub fn load(dir: &Dir) -> Result<Self> {
        load_or_create_json(dir, CONFIG_FILE_NAME).wrap_err("failed to load lodebar config")
    }
}
