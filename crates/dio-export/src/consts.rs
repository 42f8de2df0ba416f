//! Internal constants for diagram export.

use std::time::Duration;

/// Cache directory name, created directly under the build source root.
pub const CACHE_DIR_NAME: &str = ".drawio";

/// Display number the virtual display server binds to.
pub const X_DISPLAY_NUMBER: u32 = 1;

/// Virtual display server program.
pub const XVFB_PROGRAM: &str = "Xvfb";

/// Screen geometry and depth of the virtual display.
pub const XVFB_SCREEN: &str = "1280x768x16";

/// How long a freshly spawned display server must survive to count as started.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(200);

/// Poll interval while watching the display server during startup.
pub const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(20);
