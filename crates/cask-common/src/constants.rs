//! System-wide constants and default paths.

/// Default runtime state directory (records, logs, network state).
pub const DEFAULT_RUN_DIR: &str = "/var/run/cask";

/// Default data directory (image tarballs, layers, mountpoints).
pub const DEFAULT_DATA_DIR: &str = "/var/lib/cask";

/// File name of the persisted container record inside its runtime directory.
pub const RECORD_FILE: &str = "config.json";

/// File name of the captured stdout/stderr of a detached container.
pub const LOG_FILE: &str = "container.log";

/// File descriptor on which the init process receives its command pipe.
///
/// The parent dupes the pipe read end onto this fd before re-executing
/// itself, so the contract survives the exec boundary.
pub const INIT_PIPE_FD: i32 = 3;

/// Environment variable carrying the target PID for the exec bridge.
pub const ENV_EXEC_PID: &str = "CASK_EXEC_PID";

/// Environment variable carrying the command line for the exec bridge.
pub const ENV_EXEC_CMD: &str = "CASK_EXEC_CMD";

/// Parent directory for per-container cgroup v1 groups.
pub const CGROUP_PARENT: &str = "cask";

/// Hidden directory name used while pivoting the root filesystem.
pub const PIVOT_OLD_ROOT: &str = ".pivot_root";
