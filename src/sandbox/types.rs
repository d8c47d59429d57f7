//! Value types shared by the sandbox driver trait and its implementations.

/// One bind mount from a host path into the container.
#[derive(Debug, Clone)]
pub struct Mount {
    /// Absolute path on the host, e.g. the per-invocation scratch directory.
    pub host_path: String,
    /// Absolute path inside the container. The executor always binds the
    /// per-invocation directory at the container's working directory.
    pub container_path: String,
}

/// Resource caps applied to the container for one run (spec section 4.1).
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub time_ms: u32,
    pub memory_mb: u32,
}

/// One container invocation: image, argv, mounts, limits, and where to read
/// stdin from on the host.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub argv: Vec<String>,
    pub working_dir: String,
    pub mounts: Vec<Mount>,
    pub limits: ResourceLimits,
    /// Host path of the file the sandbox must wire to the process's stdin.
    /// Never appended to `argv` as a literal `<` redirection token (spec
    /// section 9): the driver streams its bytes into the container's stdin.
    pub stdin_path: String,
}

/// Outcome of one container invocation. `exit_code == -1` with a non-empty
/// `stderr` signals an infrastructure failure (daemon unreachable, image
/// missing, mount failed) rather than anything the submitted program did.
#[derive(Debug, Clone)]
pub struct RawResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub wall_time_ms: u32,
    /// Peak resident set size in KiB. `0` when the sandbox could not sample
    /// it before teardown -- never fabricated, never alone grounds for MLE.
    pub peak_memory_kb: u32,
    /// Set when the wall-clock deadline was hit and the container was
    /// stopped (and, if unresponsive, force-killed) by the driver.
    pub timed_out: bool,
}

/// `tmpfs` mount options for the scratch area mounted at `/tmp`, distinct
/// from the per-invocation bind mount: writable, no exec bit, no setuid,
/// capped at 100 MiB (spec section 4.1).
pub const TMPFS_OPTIONS: &str = "rw,noexec,nosuid,size=100m";
