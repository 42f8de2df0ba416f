//! Configuration management for dio.
//!
//! Parses `dio.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `drawio.binary_path` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;
mod format;
mod headless;

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use format::{ExportFormat, TargetFormats};
pub use headless::{HeadlessPolicy, virtual_display_supported};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override docs source directory (the build source root).
    pub source_dir: Option<PathBuf>,
    /// Override renderer binary path.
    pub binary_path: Option<String>,
    /// Override headless policy.
    pub headless: Option<HeadlessPolicy>,
    /// Override the sandbox-disable flag.
    pub no_sandbox: Option<bool>,
    /// Override default export scale (percent).
    pub default_export_scale: Option<u32>,
    /// Override default transparency.
    pub default_transparency: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "dio.toml";

/// Largest accepted export scale, in percent.
const MAX_EXPORT_SCALE: u32 = 10_000;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Documentation configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Renderer and export configuration.
    pub drawio: DrawioConfig,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
}

/// Resolved documentation configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Build source root. Diagram paths and the export cache are relative to it.
    pub source_dir: PathBuf,
}

/// Renderer and export settings (`[drawio]` section).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrawioConfig {
    /// Renderer binary. Falls back to the platform default when unset.
    pub binary_path: Option<String>,
    /// Export scale in percent used when a request does not set one.
    pub default_export_scale: u32,
    /// Transparency used when a request does not set it.
    pub default_transparency: bool,
    /// Pass `--no-sandbox` to the renderer (needed in some containers).
    pub no_sandbox: bool,
    /// Virtual display policy.
    pub headless: HeadlessPolicy,
    /// Export format per output target.
    pub builder_export_format: TargetFormats,
}

impl Default for DrawioConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            default_export_scale: 100,
            default_transparency: false,
            no_sandbox: false,
            headless: HeadlessPolicy::Auto,
            builder_export_format: TargetFormats::default(),
        }
    }
}

impl DrawioConfig {
    /// Renderer binary to execute.
    #[must_use]
    pub fn binary(&self) -> PathBuf {
        self.binary_path
            .as_deref()
            .map_or_else(|| PathBuf::from(default_binary_path()), PathBuf::from)
    }
}

/// Install location of the draw.io desktop app on this platform.
#[must_use]
pub fn default_binary_path() -> &'static str {
    if cfg!(windows) {
        r"C:\Program Files\draw.io\draw.io.exe"
    } else if cfg!(target_os = "macos") {
        "/Applications/draw.io.app/Contents/MacOS/draw.io"
    } else {
        "/opt/draw.io/drawio"
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`drawio.binary_path`").
        field: String,
        /// Error message (e.g., "${`DRAWIO_BIN`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `dio.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The merged result
    /// is validated.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(binary_path) = &settings.binary_path {
            self.drawio.binary_path = Some(binary_path.clone());
        }
        if let Some(headless) = settings.headless {
            self.drawio.headless = headless;
        }
        if let Some(no_sandbox) = settings.no_sandbox {
            self.drawio.no_sandbox = no_sandbox;
        }
        if let Some(scale) = settings.default_export_scale {
            self.drawio.default_export_scale = scale;
        }
        if let Some(transparency) = settings.default_transparency {
            self.drawio.default_transparency = transparency;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            docs: DocsConfigRaw::default(),
            drawio: DrawioConfig::default(),
            docs_resolved: DocsConfig {
                source_dir: base.join("docs"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Export formats are already checked while parsing, since the mapping
    /// deserializes into [`ExportFormat`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale = self.drawio.default_export_scale;
        if scale == 0 {
            return Err(ConfigError::Validation(
                "drawio.default_export_scale must be greater than 0".to_owned(),
            ));
        }
        if scale > MAX_EXPORT_SCALE {
            return Err(ConfigError::Validation(format!(
                "drawio.default_export_scale cannot exceed {MAX_EXPORT_SCALE}"
            )));
        }

        if self
            .drawio
            .binary_path
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "drawio.binary_path cannot be empty".to_owned(),
            ));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.drawio.binary_path {
            self.drawio.binary_path = Some(expand::expand_env(path, "drawio.binary_path")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.docs_resolved = DocsConfig {
            source_dir: config_dir.join(self.docs.source_dir.as_deref().unwrap_or("docs")),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/test/docs"));
        assert_eq!(config.drawio.default_export_scale, 100);
        assert!(!config.drawio.default_transparency);
        assert!(!config.drawio.no_sandbox);
        assert_eq!(config.drawio.headless, HeadlessPolicy::Auto);
        assert_eq!(config.drawio.builder_export_format, TargetFormats::default());
        assert!(config.drawio.binary_path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.drawio.default_export_scale, 100);
        assert_eq!(config.drawio.headless, HeadlessPolicy::Auto);
    }

    #[test]
    fn test_parse_drawio_config() {
        let toml = r#"
[drawio]
binary_path = "/usr/local/bin/drawio"
default_export_scale = 150
default_transparency = true
no_sandbox = true
headless = true

[drawio.builder_export_format]
html = "png"
singlehtml = "svg"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.drawio.binary_path.as_deref(),
            Some("/usr/local/bin/drawio")
        );
        assert_eq!(config.drawio.default_export_scale, 150);
        assert!(config.drawio.default_transparency);
        assert!(config.drawio.no_sandbox);
        assert_eq!(config.drawio.headless, HeadlessPolicy::Always);
        assert_eq!(
            config.drawio.builder_export_format,
            TargetFormats::from([("html", ExportFormat::Png), ("singlehtml", ExportFormat::Svg)])
        );
    }

    #[test]
    fn test_parse_headless_variants() {
        for (value, expected) in [
            ("\"auto\"", HeadlessPolicy::Auto),
            ("false", HeadlessPolicy::Never),
            ("\"never\"", HeadlessPolicy::Never),
            ("\"always\"", HeadlessPolicy::Always),
        ] {
            let toml = format!("[drawio]\nheadless = {value}\n");
            let config: Config = toml::from_str(&toml).unwrap();
            assert_eq!(config.drawio.headless, expected, "headless = {value}");
        }
    }

    #[test]
    fn test_parse_invalid_headless_fails() {
        let result: Result<Config, _> = toml::from_str("[drawio]\nheadless = \"maybe\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_export_format_fails() {
        let toml = r#"
[drawio.builder_export_format]
html = "gif"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[docs]
source_dir = "documentation"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.docs_resolved.source_dir,
            PathBuf::from("/project/documentation")
        );
    }

    #[test]
    fn test_resolve_paths_default_source_dir() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));
        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/project/docs"));
    }

    #[test]
    fn test_binary_defaults_to_platform_path() {
        let config = DrawioConfig::default();
        assert_eq!(config.binary(), PathBuf::from(default_binary_path()));
    }

    #[test]
    fn test_binary_uses_configured_path() {
        let config = DrawioConfig {
            binary_path: Some("/custom/drawio".to_owned()),
            ..DrawioConfig::default()
        };
        assert_eq!(config.binary(), PathBuf::from("/custom/drawio"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            source_dir: Some(PathBuf::from("/custom/docs")),
            binary_path: Some("/bin/drawio".to_owned()),
            headless: Some(HeadlessPolicy::Never),
            no_sandbox: Some(true),
            default_export_scale: Some(200),
            default_transparency: Some(true),
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/custom/docs"));
        assert_eq!(config.drawio.binary_path.as_deref(), Some("/bin/drawio"));
        assert_eq!(config.drawio.headless, HeadlessPolicy::Never);
        assert!(config.drawio.no_sandbox);
        assert_eq!(config.drawio.default_export_scale, 200);
        assert!(config.drawio.default_transparency);
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.docs_resolved.source_dir, PathBuf::from("/test/docs"));
        assert_eq!(config.drawio.headless, HeadlessPolicy::Auto);
        assert_eq!(config.drawio.default_export_scale, 100);
    }

    #[test]
    fn test_expand_env_vars_binary_path() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("DIO_CONFIG_TEST_BIN", "/env/drawio");
        }

        let toml = r#"
[drawio]
binary_path = "${DIO_CONFIG_TEST_BIN}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        assert_eq!(config.drawio.binary_path.as_deref(), Some("/env/drawio"));

        unsafe {
            std::env::remove_var("DIO_CONFIG_TEST_BIN");
        }
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/dio.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config_dir() {
        let dir = std::env::temp_dir().join(format!("dio-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILENAME);
        std::fs::write(&path, "[docs]\nsource_dir = \"src\"\n").unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.docs_resolved.source_dir, dir.join("src"));
        assert_eq!(config.config_path, Some(path));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_scale_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.drawio.default_export_scale = 0;
        assert_validation_error(&config, &["default_export_scale", "greater than 0"]);
    }

    #[test]
    fn test_validate_scale_too_high() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.drawio.default_export_scale = 20_000;
        assert_validation_error(&config, &["default_export_scale", "10000"]);
    }

    #[test]
    fn test_validate_empty_binary_path() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.drawio.binary_path = Some("  ".to_owned());
        assert_validation_error(&config, &["binary_path", "empty"]);
    }

    #[test]
    fn test_load_rejects_invalid_cli_scale() {
        let dir = std::env::temp_dir().join(format!("dio-config-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            default_export_scale: Some(0),
            ..CliSettings::default()
        };
        let result = Config::load(Some(&path), Some(&settings));

        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
