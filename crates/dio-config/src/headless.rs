//! Headless (virtual display) policy.

use std::ffi::OsStr;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Whether the renderer should run against a virtual display.
///
/// In `dio.toml` this is written as `headless = "auto"`, `true` or `false`
/// (`"always"` and `"never"` are accepted as aliases).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "HeadlessRaw")]
pub enum HeadlessPolicy {
    /// Always start a virtual display.
    Always,
    /// Never start a virtual display.
    Never,
    /// Start one only on a supported platform without an existing display.
    #[default]
    Auto,
}

impl HeadlessPolicy {
    /// Decide whether to run headless.
    ///
    /// `Auto` resolves to headless only when the platform supports the virtual
    /// display and `display` is unset or empty.
    #[must_use]
    pub fn decide(self, platform_supported: bool, display: Option<&OsStr>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => platform_supported && display.is_none_or(OsStr::is_empty),
        }
    }
}

/// Whether the virtual display server can run on this platform.
#[must_use]
pub fn virtual_display_supported() -> bool {
    cfg!(target_os = "linux")
}

impl fmt::Display for HeadlessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "always",
            Self::Never => "never",
            Self::Auto => "auto",
        })
    }
}

impl FromStr for HeadlessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "always" | "true" => Ok(Self::Always),
            "never" | "false" => Ok(Self::Never),
            other => Err(format!(
                "invalid headless policy '{other}' (expected auto, always or never)"
            )),
        }
    }
}

/// TOML representation: a boolean or a policy name.
#[derive(Deserialize)]
#[serde(untagged)]
enum HeadlessRaw {
    Flag(bool),
    Name(String),
}

impl TryFrom<HeadlessRaw> for HeadlessPolicy {
    type Error = String;

    fn try_from(raw: HeadlessRaw) -> Result<Self, Self::Error> {
        match raw {
            HeadlessRaw::Flag(true) => Ok(Self::Always),
            HeadlessRaw::Flag(false) => Ok(Self::Never),
            HeadlessRaw::Name(name) => name.parse(),
        }
    }
}
