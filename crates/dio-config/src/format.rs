//! Export formats and the per-target format mapping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Image format produced by the renderer.
///
/// The set is closed: anything else is rejected when the configuration or a
/// request is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpg,
    Svg,
    Pdf,
}

impl ExportFormat {
    /// Every valid export format.
    pub const ALL: [Self; 4] = [Self::Png, Self::Jpg, Self::Svg, Self::Pdf];

    /// Format used when no mapping exists for an output target.
    pub const FALLBACK: Self = Self::Png;

    /// File extension (without dot), also the renderer's `--format` value.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = Self::ALL.iter().map(|f| f.extension()).collect();
                format!(
                    "invalid export format '{s}' (expected one of: {})",
                    valid.join(", ")
                )
            })
    }
}

/// Mapping from output target (e.g. `html`, `latex`) to export format.
///
/// Configured under `[drawio.builder_export_format]`. A configured table
/// replaces the default mapping rather than extending it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TargetFormats(BTreeMap<String, ExportFormat>);

impl TargetFormats {
    /// Look up the format registered for `target`.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<ExportFormat> {
        self.0.get(target).copied()
    }

    /// Registered target names in sorted order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl Default for TargetFormats {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("html".to_owned(), ExportFormat::Svg),
            ("latex".to_owned(), ExportFormat::Pdf),
            ("rinoh".to_owned(), ExportFormat::Pdf),
        ]))
    }
}

impl<const N: usize> From<[(&str, ExportFormat); N]> for TargetFormats {
    fn from(entries: [(&str, ExportFormat); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(target, format)| (target.to_owned(), format))
                .collect(),
        )
    }
}
