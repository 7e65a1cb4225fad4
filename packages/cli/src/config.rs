use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "lyx2lyx.config.json";

/// Defaults for a run, read from the working directory.
///
/// Command line flags always take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Keep going after recoverable errors
    #[serde(default)]
    pub try_hard: bool,

    /// Diagnostic level, as for `--debug`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<u8>,

    /// Encoding CJK-LyX used for files up to format 248
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cjk_encoding: Option<String>,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}
