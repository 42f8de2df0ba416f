//! Virtual display sessions for headless rendering.
//!
//! draw.io is an Electron app and needs an X display even in export mode.
//! On build machines without one, [`DisplaySessionManager`] runs `Xvfb` for
//! the duration of the build and hands out the `DISPLAY` value to render
//! against.
//!
//! Only one session may be live per process. The slot is claimed when a
//! session starts and released when the [`DisplaySession`] is stopped or
//! dropped.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use dio_config::{HeadlessPolicy, virtual_display_supported};

use crate::consts::{
    DEFAULT_STARTUP_GRACE, STARTUP_POLL_INTERVAL, X_DISPLAY_NUMBER, XVFB_PROGRAM, XVFB_SCREEN,
};
use crate::error::ExportError;

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the process-wide session slot, released on drop.
#[derive(Debug)]
struct SessionSlot;

impl SessionSlot {
    fn acquire() -> Result<Self, ExportError> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| ExportError::DisplaySessionActive)
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Starts and stops the virtual display server.
#[derive(Debug, Clone)]
pub struct DisplaySessionManager {
    program: OsString,
    args: Vec<OsString>,
    display_number: u32,
    startup_grace: Duration,
    pub(crate) platform_supported: bool,
}

impl Default for DisplaySessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySessionManager {
    /// Manager for `Xvfb :1 -screen 0 1280x768x16`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: XVFB_PROGRAM.into(),
            args: vec![
                format!(":{X_DISPLAY_NUMBER}").into(),
                "-screen".into(),
                "0".into(),
                XVFB_SCREEN.into(),
            ],
            display_number: X_DISPLAY_NUMBER,
            startup_grace: DEFAULT_STARTUP_GRACE,
            platform_supported: virtual_display_supported(),
        }
    }

    /// Replace the display server command line.
    ///
    /// The display number handed to the renderer is unchanged.
    #[must_use]
    pub fn with_command<I, S>(mut self, program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// How long the server must stay up after spawning to count as started.
    #[must_use]
    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Decide whether `policy` calls for a virtual display right now.
    #[must_use]
    pub fn is_headless(&self, policy: HeadlessPolicy) -> bool {
        let display = std::env::var_os("DISPLAY");
        policy.decide(self.platform_supported, display.as_deref())
    }

    /// Start a session if `policy` calls for one.
    ///
    /// Returns `Ok(None)` when running against a real display.
    pub fn start(&self, policy: HeadlessPolicy) -> Result<Option<DisplaySession>, ExportError> {
        if !self.is_headless(policy) {
            tracing::info!("running in non-headless mode, not starting Xvfb");
            return Ok(None);
        }
        self.launch().map(Some)
    }

    /// Stop a session returned by [`start`](Self::start). `None` is a no-op.
    pub fn stop(&self, session: Option<DisplaySession>) -> Result<(), ExportError> {
        session.map_or(Ok(()), DisplaySession::stop)
    }

    /// Spawn the display server unconditionally.
    ///
    /// Fails with [`ExportError::DisplaySessionStartFailure`] if the server
    /// cannot be spawned or exits within the startup grace period, and with
    /// [`ExportError::DisplaySessionActive`] if another session is live.
    pub fn launch(&self) -> Result<DisplaySession, ExportError> {
        let slot = SessionSlot::acquire()?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExportError::DisplaySessionStartFailure {
                message: format!("could not run {}: {e}", self.program.to_string_lossy()),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        let deadline = Instant::now() + self.startup_grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Err(exited_early(child, &status.to_string())),
                Ok(None) => {}
                Err(e) => {
                    if let Err(kill_err) = child.kill() {
                        tracing::warn!("failed to kill Xvfb after status error: {kill_err}");
                    }
                    return Err(exited_early(child, &e.to_string()));
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(STARTUP_POLL_INTERVAL);
        }

        forward_output("stdout", child.stdout.take());
        forward_output("stderr", child.stderr.take());

        tracing::info!(
            pid = child.id(),
            display = self.display_number,
            "started virtual display"
        );

        Ok(DisplaySession {
            child: Some(child),
            display_number: self.display_number,
            _slot: slot,
        })
    }
}

/// Build the start failure for a server that is no longer running.
fn exited_early(child: Child, reason: &str) -> ExportError {
    let (stdout, stderr) = child
        .wait_with_output()
        .map(|out| {
            (
                String::from_utf8_lossy(&out.stdout).into_owned(),
                String::from_utf8_lossy(&out.stderr).into_owned(),
            )
        })
        .unwrap_or_default();
    ExportError::DisplaySessionStartFailure {
        message: format!("Xvfb process terminated immediately ({reason})"),
        stdout,
        stderr,
    }
}

/// Drain a server pipe into the debug log so the server never blocks on it.
fn forward_output<R: Read + Send + 'static>(stream: &'static str, pipe: Option<R>) {
    let Some(pipe) = pipe else {
        return;
    };
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines().map_while(Result::ok) {
            tracing::debug!(stream, "Xvfb: {line}");
        }
    });
}

/// A running virtual display server.
///
/// Dropping a live session terminates the server, so the display is released
/// on error paths as well. Call [`stop`](Self::stop) to observe failures.
#[derive(Debug)]
pub struct DisplaySession {
    child: Option<Child>,
    display_number: u32,
    _slot: SessionSlot,
}

impl DisplaySession {
    /// Value for the renderer's `DISPLAY` variable (e.g. `:1`).
    #[must_use]
    pub fn display(&self) -> String {
        format!(":{}", self.display_number)
    }

    /// Process id of the display server.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Terminate the server and wait for it to exit.
    pub fn stop(mut self) -> Result<(), ExportError> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<(), ExportError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let io_err = |e| ExportError::io(XVFB_PROGRAM, e);

        // Always reap the child, even when it cannot be signalled
        let signalled = send_terminate(&mut child);
        if let Err(e) = &signalled {
            tracing::warn!("failed to signal Xvfb, killing it: {e}");
            if let Err(kill_err) = child.kill() {
                tracing::warn!("failed to kill Xvfb: {kill_err}");
            }
        }
        let status = child.wait().map_err(io_err)?;
        tracing::info!(%status, "stopped virtual display");
        signalled.map_err(io_err)
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::warn!("failed to stop virtual display: {e}");
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(io::Error::other)?;
    // SAFETY: `pid` is our own child and has not been reaped yet.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}
