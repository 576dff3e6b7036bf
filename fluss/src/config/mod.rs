//! Configuration for pipeline execution.
//!
//! Tool locations are resolved by the host and handed to the executor here;
//! operations never search for binaries themselves.

use crate::errors::{ConfigError, OperationError};
use crate::pipeline::SortPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// External programs the built-in codecs may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// WavPack encoder.
    WavPack,
    /// WavPack decoder.
    WvUnpack,
    /// True Audio encoder/decoder.
    Tta,
    /// FLAC encoder/decoder.
    Flac,
    /// Lossless JPEG optimizer.
    JpegTran,
}

impl Tool {
    /// All tools in declaration order.
    pub const ALL: [Self; 5] = [
        Self::WavPack,
        Self::WvUnpack,
        Self::Tta,
        Self::Flac,
        Self::JpegTran,
    ];

    /// Returns the conventional program name.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::WavPack => "wavpack",
            Self::WvUnpack => "wvunpack",
            Self::Tta => "tta",
            Self::Flac => "flac",
            Self::JpegTran => "jpegtran",
        }
    }

    /// Returns the environment variable overriding this tool's path.
    #[must_use]
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::WavPack => "FLUSS_WAVPACK",
            Self::WvUnpack => "FLUSS_WVUNPACK",
            Self::Tta => "FLUSS_TTA",
            Self::Flac => "FLUSS_FLAC",
            Self::JpegTran => "FLUSS_JPEGTRAN",
        }
    }
}

/// Resolved locations of external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Path to `wavpack`.
    #[serde(default)]
    pub wavpack: Option<PathBuf>,
    /// Path to `wvunpack`. Defaults to a sibling of `wavpack`.
    #[serde(default)]
    pub wvunpack: Option<PathBuf>,
    /// Path to `tta`.
    #[serde(default)]
    pub tta: Option<PathBuf>,
    /// Path to `flac`.
    #[serde(default)]
    pub flac: Option<PathBuf>,
    /// Path to `jpegtran`.
    #[serde(default)]
    pub jpegtran: Option<PathBuf>,
}

impl ToolPaths {
    /// Creates an empty set of tool paths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path of a tool.
    #[must_use]
    pub fn with_tool(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        *self.slot_mut(tool) = Some(path.into());
        self
    }

    /// Returns the configured path of a tool.
    ///
    /// `wvunpack` falls back to a program next to `wavpack`, keeping its
    /// extension, since both ship in the same package.
    #[must_use]
    pub fn get(&self, tool: Tool) -> Option<PathBuf> {
        match tool {
            Tool::WavPack => self.wavpack.clone(),
            Tool::WvUnpack => self.wvunpack.clone().or_else(|| {
                self.wavpack.as_ref().map(|wavpack| {
                    let mut name = Tool::WvUnpack.program().to_string();
                    if let Some(ext) = wavpack.extension() {
                        name.push('.');
                        name.push_str(&ext.to_string_lossy());
                    }
                    wavpack.with_file_name(name)
                })
            }),
            Tool::Tta => self.tta.clone(),
            Tool::Flac => self.flac.clone(),
            Tool::JpegTran => self.jpegtran.clone(),
        }
    }

    /// Returns the path of a tool or a [`OperationError::ToolNotConfigured`].
    pub fn require(&self, tool: Tool) -> Result<PathBuf, OperationError> {
        self.get(tool).ok_or_else(|| OperationError::ToolNotConfigured {
            tool: tool.program().to_string(),
        })
    }

    fn slot_mut(&mut self, tool: Tool) -> &mut Option<PathBuf> {
        match tool {
            Tool::WavPack => &mut self.wavpack,
            Tool::WvUnpack => &mut self.wvunpack,
            Tool::Tta => &mut self.tta,
            Tool::Flac => &mut self.flac,
            Tool::JpegTran => &mut self.jpegtran,
        }
    }
}

/// Top-level configuration of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlussConfig {
    /// External tool locations.
    #[serde(default)]
    pub tools: ToolPaths,
    /// Root for temporary targets and per-stage scratch directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Root for output targets.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Keep temporary targets after the run.
    #[serde(default)]
    pub keep_temporaries: bool,
    /// How sorting treats stages waiting on unproduced targets.
    #[serde(default)]
    pub sort_policy: SortPolicy,
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("fluss")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for FlussConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
            keep_temporaries: false,
            sort_policy: SortPolicy::default(),
        }
    }
}

impl FlussConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Builds a configuration from defaults overlaid with `FLUSS_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Overlays `FLUSS_*` variables from the given pairs.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for tool in Tool::ALL {
            if let Some(path) = vars.get(tool.env_key()) {
                *self.tools.slot_mut(tool) = Some(PathBuf::from(path));
            }
        }
        if let Some(dir) = vars.get("FLUSS_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = vars.get("FLUSS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(value) = vars.get("FLUSS_KEEP_TEMPORARIES") {
            self.keep_temporaries = parse_bool("FLUSS_KEEP_TEMPORARIES", value)?;
        }
        if let Some(value) = vars.get("FLUSS_SORT_POLICY") {
            self.sort_policy = match value.trim().to_ascii_lowercase().as_str() {
                "omit_incomplete" | "omit" => SortPolicy::OmitIncomplete,
                "fail_fast" | "fail" => SortPolicy::FailFast,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "FLUSS_SORT_POLICY".to_string(),
                        value: value.clone(),
                    })
                }
            };
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FlussConfig::default();
        assert!(!config.keep_temporaries);
        assert_eq!(config.sort_policy, SortPolicy::OmitIncomplete);
        assert!(config.work_dir.ends_with("fluss"));
        assert_eq!(config.tools, ToolPaths::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config = FlussConfig::from_json_str(
            r#"{"tools": {"flac": "/usr/bin/flac"}, "sort_policy": "fail_fast", "output_dir": "/music"}"#,
        )
        .unwrap();

        assert_eq!(config.tools.get(Tool::Flac), Some(PathBuf::from("/usr/bin/flac")));
        assert_eq!(config.tools.get(Tool::Tta), None);
        assert_eq!(config.sort_policy, SortPolicy::FailFast);
        assert_eq!(config.output_dir, PathBuf::from("/music"));
        assert!(!config.keep_temporaries);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            FlussConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = FlussConfig::from_json_file(Path::new("/nonexistent/fluss.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = FlussConfig::default();
        config
            .apply_env([
                ("FLUSS_TTA", "/opt/tta"),
                ("FLUSS_KEEP_TEMPORARIES", "yes"),
                ("FLUSS_SORT_POLICY", "fail_fast"),
                ("UNRELATED", "1"),
            ])
            .unwrap();

        assert_eq!(config.tools.tta, Some(PathBuf::from("/opt/tta")));
        assert!(config.keep_temporaries);
        assert_eq!(config.sort_policy, SortPolicy::FailFast);
    }

    #[test]
    fn test_env_overlay_rejects_bad_values() {
        let mut config = FlussConfig::default();
        let err = config.apply_env([("FLUSS_KEEP_TEMPORARIES", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));

        let err = config.apply_env([("FLUSS_SORT_POLICY", "random")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_wvunpack_falls_back_to_wavpack_sibling() {
        let tools = ToolPaths::new().with_tool(Tool::WavPack, "/opt/wavpack/wavpack.exe");
        assert_eq!(
            tools.get(Tool::WvUnpack),
            Some(PathBuf::from("/opt/wavpack/wvunpack.exe"))
        );

        let tools = tools.with_tool(Tool::WvUnpack, "/usr/bin/wvunpack");
        assert_eq!(tools.get(Tool::WvUnpack), Some(PathBuf::from("/usr/bin/wvunpack")));
    }

    #[test]
    fn test_require_missing_tool() {
        let err = ToolPaths::new().require(Tool::Flac).unwrap_err();
        assert_eq!(err.to_string(), "No path configured for tool 'flac'");
    }
}
