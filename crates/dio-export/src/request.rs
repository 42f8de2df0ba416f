//! Export requests and per-document export options.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use dio_config::{DrawioConfig, ExportFormat, TargetFormats};

use crate::error::ExportError;

/// A fully resolved request to export one page of a diagram file.
///
/// Scale is an integer percentage (`100` = 1:1). Width and height, when set,
/// are passed straight to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportRequest {
    /// Diagram source file, absolute or relative to the build source root.
    pub source: PathBuf,
    /// Zero-based page to export.
    pub page_index: u32,
    /// Output format.
    pub format: ExportFormat,
    /// Export scale in percent.
    pub scale: u32,
    /// Export with a transparent background.
    pub transparent: bool,
    /// Fit the export to this width.
    pub width: Option<u32>,
    /// Fit the export to this height.
    pub height: Option<u32>,
}

impl ExportRequest {
    /// Create a request for page 0 at 100% scale without transparency.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            source: source.into(),
            page_index: 0,
            format,
            scale: 100,
            transparent: false,
            width: None,
            height: None,
        }
    }

    #[must_use]
    pub fn page_index(mut self, page_index: u32) -> Self {
        self.page_index = page_index;
        self
    }

    #[must_use]
    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    #[must_use]
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Reject values the renderer cannot accept.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.scale == 0 {
            return Err(ExportError::InvalidRequest(
                "export scale must be greater than 0".to_owned(),
            ));
        }
        if self.width == Some(0) {
            return Err(ExportError::InvalidRequest(
                "export width must be greater than 0".to_owned(),
            ));
        }
        if self.height == Some(0) {
            return Err(ExportError::InvalidRequest(
                "export height must be greater than 0".to_owned(),
            ));
        }
        self.stem()?;
        Ok(())
    }

    /// Source file name without extension, used as the artifact name.
    pub fn stem(&self) -> Result<&OsStr, ExportError> {
        self.source.file_stem().ok_or_else(|| {
            ExportError::InvalidRequest(format!(
                "source path {} has no file name",
                self.source.display()
            ))
        })
    }

    /// Scale as a decimal factor (`100` -> `"1.0"`, `125` -> `"1.25"`).
    #[must_use]
    pub fn scale_factor(&self) -> String {
        scale_factor(self.scale)
    }

    /// Whether the renderer's scale argument must be left out.
    ///
    /// draw.io mis-renders vector PDFs when passed `--scale 1.0`
    /// (jgraph/drawio-desktop#344).
    #[must_use]
    pub fn omits_scale(&self) -> bool {
        self.format == ExportFormat::Pdf && self.scale == 100
    }
}

/// Render a percentage as an exact decimal factor.
fn scale_factor(percent: u32) -> String {
    let whole = percent / 100;
    let frac = percent % 100;
    if frac == 0 {
        format!("{whole}.0")
    } else if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    }
}

/// Look up the export format registered for an output target.
pub fn target_format(formats: &TargetFormats, target: &str) -> Result<ExportFormat, ExportError> {
    formats
        .get(target)
        .ok_or_else(|| ExportError::UnsupportedExportTarget {
            target: target.to_owned(),
        })
}

/// Export options as written on a diagram directive.
///
/// Unset options fall back to the output target's format and the configured
/// defaults in [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: Option<ExportFormat>,
    pub page_index: Option<u32>,
    pub transparency: Option<bool>,
    pub export_scale: Option<u32>,
    pub export_width: Option<u32>,
    pub export_height: Option<u32>,
}

impl ExportOptions {
    /// Parse one raw option by its directive name.
    ///
    /// Recognized names: `format`, `page-index`, `transparency`,
    /// `export-scale`, `export-width`, `export-height`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ExportError> {
        let value = value.trim();
        match name {
            "format" => {
                self.format = Some(value.parse().map_err(ExportError::InvalidRequest)?);
            }
            "page-index" => self.page_index = Some(parse_non_negative(name, value)?),
            "transparency" => {
                self.transparency = Some(match value {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(ExportError::InvalidRequest(format!(
                            "transparency: unexpected value '{other}', true or false expected"
                        )));
                    }
                });
            }
            "export-scale" => self.export_scale = Some(parse_positive(name, value)?),
            "export-width" => self.export_width = Some(parse_positive(name, value)?),
            "export-height" => self.export_height = Some(parse_positive(name, value)?),
            other => {
                return Err(ExportError::InvalidRequest(format!(
                    "unknown option '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// Parse a list of raw `(name, value)` options.
    pub fn parse<'a>(
        options: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ExportError> {
        let mut parsed = Self::default();
        for (name, value) in options {
            parsed.set(name, value)?;
        }
        Ok(parsed)
    }

    /// Build a request for `source`, filling gaps from the config.
    ///
    /// When no format is given and `target` has no mapping, the fallback
    /// format is used and a warning is logged.
    #[must_use]
    pub fn resolve(&self, source: &Path, config: &DrawioConfig, target: &str) -> ExportRequest {
        let format = self.format.unwrap_or_else(|| {
            target_format(&config.builder_export_format, target).unwrap_or_else(|err| {
                tracing::warn!(
                    "{err} in 'drawio.builder_export_format', using '{}' as a fall-back",
                    ExportFormat::FALLBACK
                );
                ExportFormat::FALLBACK
            })
        });

        ExportRequest {
            source: source.to_path_buf(),
            page_index: self.page_index.unwrap_or(0),
            format,
            scale: self.export_scale.unwrap_or(config.default_export_scale),
            transparent: self.transparency.unwrap_or(config.default_transparency),
            width: self.export_width,
            height: self.export_height,
        }
    }
}

fn parse_non_negative(name: &str, value: &str) -> Result<u32, ExportError> {
    value.parse().map_err(|_| {
        ExportError::InvalidRequest(format!(
            "{name}: expected a non-negative integer, got '{value}'"
        ))
    })
}

fn parse_positive(name: &str, value: &str) -> Result<u32, ExportError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ExportError::InvalidRequest(format!(
            "{name}: expected a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scale_factor() {
        assert_eq!(scale_factor(100), "1.0");
        assert_eq!(scale_factor(150), "1.5");
        assert_eq!(scale_factor(125), "1.25");
        assert_eq!(scale_factor(5), "0.05");
        assert_eq!(scale_factor(50), "0.5");
        assert_eq!(scale_factor(300), "3.0");
    }

    #[test]
    fn test_omits_scale_only_for_pdf_at_100() {
        assert!(ExportRequest::new("a.drawio", ExportFormat::Pdf).omits_scale());
        assert!(!ExportRequest::new("a.drawio", ExportFormat::Pdf).scale(200).omits_scale());
        assert!(!ExportRequest::new("a.drawio", ExportFormat::Png).omits_scale());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let base = ExportRequest::new("a.drawio", ExportFormat::Svg);
        assert!(base.validate().is_ok());
        assert!(matches!(
            base.clone().scale(0).validate(),
            Err(ExportError::InvalidRequest(_))
        ));
        assert!(matches!(
            base.clone().width(0).validate(),
            Err(ExportError::InvalidRequest(_))
        ));
        assert!(matches!(
            base.height(0).validate(),
            Err(ExportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_rejects_path_without_file_name() {
        let request = ExportRequest::new("..", ExportFormat::Svg);
        assert!(matches!(
            request.validate(),
            Err(ExportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_stem() {
        let request = ExportRequest::new("diagrams/flow.drawio", ExportFormat::Png);
        assert_eq!(request.stem().unwrap(), "flow");
    }

    #[test]
    fn test_parse_options() {
        let options = ExportOptions::parse([
            ("format", "pdf"),
            ("page-index", "2"),
            ("transparency", "true"),
            ("export-scale", "150"),
            ("export-width", "800"),
            ("export-height", "600"),
        ])
        .unwrap();

        assert_eq!(
            options,
            ExportOptions {
                format: Some(ExportFormat::Pdf),
                page_index: Some(2),
                transparency: Some(true),
                export_scale: Some(150),
                export_width: Some(800),
                export_height: Some(600),
            }
        );
    }

    #[test]
    fn test_parse_rejects_negative_page_index() {
        let err = ExportOptions::parse([("page-index", "-1")]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
        assert!(err.to_string().contains("page-index"));
    }

    #[test]
    fn test_parse_rejects_unsupported_format() {
        let err = ExportOptions::parse([("format", "gif")]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_rejects_zero_scale() {
        let err = ExportOptions::parse([("export-scale", "0")]).unwrap_err();
        assert!(err.to_string().contains("export-scale"));
    }

    #[test]
    fn test_parse_rejects_loose_boolean() {
        let err = ExportOptions::parse([("transparency", "yes")]).unwrap_err();
        assert!(err.to_string().contains("true or false"));
    }

    #[test]
    fn test_parse_rejects_unknown_option() {
        let err = ExportOptions::parse([("dpi", "300")]).unwrap_err();
        assert!(err.to_string().contains("dpi"));
    }

    #[test]
    fn test_resolve_uses_target_format_and_defaults() {
        let config = DrawioConfig {
            default_export_scale: 200,
            default_transparency: true,
            ..DrawioConfig::default()
        };

        let request = ExportOptions::default().resolve(Path::new("a.drawio"), &config, "html");

        assert_eq!(
            request,
            ExportRequest::new("a.drawio", ExportFormat::Svg)
                .scale(200)
                .transparent(true)
        );
    }

    #[test]
    fn test_resolve_explicit_options_win() {
        let options = ExportOptions {
            format: Some(ExportFormat::Jpg),
            page_index: Some(1),
            transparency: Some(false),
            export_scale: Some(50),
            export_width: Some(640),
            export_height: None,
        };
        let config = DrawioConfig {
            default_transparency: true,
            ..DrawioConfig::default()
        };

        let request = options.resolve(Path::new("a.drawio"), &config, "latex");

        assert_eq!(
            request,
            ExportRequest::new("a.drawio", ExportFormat::Jpg)
                .page_index(1)
                .scale(50)
                .width(640)
        );
    }

    #[test]
    fn test_resolve_unknown_target_falls_back() {
        let request = ExportOptions::default().resolve(
            Path::new("a.drawio"),
            &DrawioConfig::default(),
            "epub",
        );
        assert_eq!(request.format, ExportFormat::FALLBACK);
    }

    #[test]
    fn test_target_format_unknown_target() {
        let err = target_format(&TargetFormats::default(), "epub").unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedExportTarget { .. }));
    }
}
