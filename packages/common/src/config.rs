use serde::{Deserialize, Serialize};

/// Options of one conversion run.
///
/// The value is owned by the document being converted and consulted at every
/// point where a rewrite step must choose between aborting and carrying on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Keep going after recoverable errors; the run then ends with status 2.
    #[serde(default)]
    pub try_hard: bool,

    /// Target numeric format; the newest known format when unset.
    #[serde(default)]
    pub end_format: Option<u32>,

    /// Target release, e.g. "1.4.3"; selects the newest format of that release
    /// when no explicit format is requested.
    #[serde(default)]
    pub final_version: Option<String>,

    /// Encoding CJK-LyX used for files up to format 248.
    #[serde(default)]
    pub cjk_encoding: Option<String>,
}

impl RunConfig {
    pub fn try_hard(mut self, try_hard: bool) -> Self {
        self.try_hard = try_hard;
        self
    }

    pub fn to_format(mut self, format: u32) -> Self {
        self.end_format = Some(format);
        self
    }

    pub fn to_version(mut self, version: impl Into<String>) -> Self {
        self.final_version = Some(version.into());
        self
    }

    pub fn with_cjk_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.cjk_encoding = Some(encoding.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RunConfig::default().try_hard(true).to_format(245);
        assert!(config.try_hard);
        assert_eq!(config.end_format, Some(245));
        assert_eq!(config.final_version, None);
    }
}
