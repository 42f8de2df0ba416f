//! Build lifecycle hooks.
//!
//! A [`BuildSession`] spans one documentation build: it starts the virtual
//! display when the headless policy asks for one and stops it when the
//! build finishes, whether the build succeeded or not.

use std::fmt::Display;

use dio_config::DrawioConfig;

use crate::display::{DisplaySession, DisplaySessionManager};
use crate::error::ExportError;

/// State owned for the duration of a build.
#[derive(Debug)]
pub struct BuildSession {
    display: Option<DisplaySession>,
}

impl BuildSession {
    /// Build-start hook: start the display session if headless.
    pub fn on_build_start(
        manager: &DisplaySessionManager,
        config: &DrawioConfig,
    ) -> Result<Self, ExportError> {
        let display = manager.start(config.headless)?;
        Ok(Self { display })
    }

    /// `DISPLAY` value for renderer invocations, if a session is live.
    #[must_use]
    pub fn display(&self) -> Option<String> {
        self.display.as_ref().map(DisplaySession::display)
    }

    /// Whether a virtual display is running for this build.
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.display.is_some()
    }

    /// Build-finished hook: stop the display session.
    ///
    /// `outcome` is the build's result and only affects logging.
    pub fn on_build_finished<E: Display>(self, outcome: Result<(), &E>) -> Result<(), ExportError> {
        match outcome {
            Ok(()) => tracing::info!("build finished"),
            Err(e) => tracing::warn!("build failed: {e}"),
        }
        self.display.map_or(Ok(()), DisplaySession::stop)
    }

    /// Run `build` between the start and finish hooks.
    ///
    /// The finish hook runs on both success and error. A build error takes
    /// precedence over a teardown error.
    pub fn scope<T, E, F>(
        manager: &DisplaySessionManager,
        config: &DrawioConfig,
        build: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<ExportError> + Display,
    {
        let session = Self::on_build_start(manager, config)?;
        let result = build(&session);
        let finished = session.on_build_finished(result.as_ref().map(|_| ()));
        let value = result?;
        finished?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dio_config::HeadlessPolicy;

    fn config(headless: HeadlessPolicy) -> DrawioConfig {
        DrawioConfig {
            headless,
            ..DrawioConfig::default()
        }
    }

    #[test]
    fn test_non_headless_build_has_no_display() {
        let manager = DisplaySessionManager::new();
        let session = BuildSession::on_build_start(&manager, &config(HeadlessPolicy::Never)).unwrap();

        assert!(!session.is_headless());
        assert_eq!(session.display(), None);
        session.on_build_finished::<ExportError>(Ok(())).unwrap();
    }

    #[test]
    fn test_scope_returns_build_value() {
        let manager = DisplaySessionManager::new();
        let value = BuildSession::scope(&manager, &config(HeadlessPolicy::Never), |session| {
            assert!(session.display().is_none());
            Ok::<_, ExportError>(42)
        })
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_scope_propagates_build_error() {
        let manager = DisplaySessionManager::new();
        let result: Result<(), ExportError> =
            BuildSession::scope(&manager, &config(HeadlessPolicy::Never), |_| {
                Err(ExportError::InvalidRequest("boom".to_owned()))
            });
        assert!(matches!(result, Err(ExportError::InvalidRequest(_))));
    }

    #[cfg(unix)]
    mod headless {
        use super::*;
        use crate::display::tests::{SESSION_TEST_LOCK, sleeping_manager};

        #[test]
        fn test_headless_scope_exposes_display_and_tears_down() {
            let _guard = SESSION_TEST_LOCK
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let manager = sleeping_manager();

            let display = BuildSession::scope(&manager, &config(HeadlessPolicy::Always), |session| {
                assert!(session.is_headless());
                Ok::<_, ExportError>(session.display())
            })
            .unwrap();
            assert_eq!(display.as_deref(), Some(":1"));

            // Session was released, a new one can start
            manager.launch().unwrap().stop().unwrap();
        }

        #[test]
        fn test_headless_scope_tears_down_on_failure() {
            let _guard = SESSION_TEST_LOCK
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let manager = sleeping_manager();

            let result: Result<(), ExportError> =
                BuildSession::scope(&manager, &config(HeadlessPolicy::Always), |_| {
                    Err(ExportError::OutputMissing {
                        command: "drawio".to_owned(),
                        stdout: String::new(),
                        stderr: String::new(),
                    })
                });
            assert!(matches!(result, Err(ExportError::OutputMissing { .. })));

            manager.launch().unwrap().stop().unwrap();
        }

        #[test]
        fn test_start_failure_is_fatal_to_build() {
            let _guard = SESSION_TEST_LOCK
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let manager = DisplaySessionManager::new().with_command("sh", ["-c", "exit 1"]);
            let mut ran = false;

            let result: Result<(), ExportError> =
                BuildSession::scope(&manager, &config(HeadlessPolicy::Always), |_| {
                    ran = true;
                    Ok(())
                });

            assert!(matches!(
                result,
                Err(ExportError::DisplaySessionStartFailure { .. })
            ));
            assert!(!ran);
        }
    }
}
