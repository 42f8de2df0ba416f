//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a configuration value.
///
/// Bare `$VAR` is left alone, so values containing a literal dollar sign
/// pass through untouched. An unset variable without a default is an error
/// naming the config `field`.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, UnsetVar> {
        std::env::var(var).map(Some).map_err(|_| UnsetVar {
            name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.name),
    })
}

/// Lookup failure for a referenced variable.
struct UnsetVar {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_binary_path_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("DIO_TEST_DRAWIO_HOME", "/opt/custom");
        }
        let result = expand_env("${DIO_TEST_DRAWIO_HOME}/drawio", "drawio.binary_path").unwrap();
        assert_eq!(result, "/opt/custom/drawio");
        unsafe {
            std::env::remove_var("DIO_TEST_DRAWIO_HOME");
        }
    }

    #[test]
    fn test_expand_default_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("DIO_TEST_UNSET_BIN");
        }
        let result = expand_env("${DIO_TEST_UNSET_BIN:-/usr/bin/drawio}", "drawio.binary_path")
            .unwrap();
        assert_eq!(result, "/usr/bin/drawio");
    }

    #[test]
    fn test_expand_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("DIO_TEST_MISSING_BIN");
        }
        let err = expand_env("${DIO_TEST_MISSING_BIN}", "drawio.binary_path").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let msg = err.to_string();
        assert!(msg.contains("DIO_TEST_MISSING_BIN"));
        assert!(msg.contains("drawio.binary_path"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let result = expand_env("/opt/$weird/drawio", "drawio.binary_path").unwrap();
        assert_eq!(result, "/opt/$weird/drawio");
    }
}
