//! Sandboxed execution engine (C3): compile (if needed) and run one program
//! against one stdin, inside the sandbox driver (C1), under the language
//! profile resolved from the registry (C2).
//!
//! Grounded on the teacher's `engine/executer.rs` for the overall
//! compile-then-run shape (working directory per invocation, compile phase
//! gated on an `Option<Vec<String>>`, explicit cleanup), generalized to the
//! driver trait instead of a concrete `IsolateBox`.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::languages::{get_language_profile, LanguageProfile};
use crate::sandbox::{Mount, ResourceLimits, RunSpec, SandboxDriver};

/// Compilation is capped independently of the test time limit (spec 4.2);
/// the memory cap and the rest of the isolation policy are identical to the
/// run phase (spec 4.3 step 3).
const COMPILE_TIMEOUT_MS: u32 = 30_000;

const STDOUT_CAP_BYTES: usize = 1024 * 1024;
const STDERR_CAP_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionVerdict {
    Success,
    Ce,
    Tle,
    Mle,
    Re,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub verdict: ExecutionVerdict,
    pub stdout: String,
    pub stderr: Option<String>,
    pub time_ms: u32,
    pub memory_kb: u32,
}

impl ExecutionResult {
    fn ce(message: impl Into<String>) -> Self {
        Self {
            verdict: ExecutionVerdict::Ce,
            stdout: String::new(),
            stderr: Some(message.into()),
            time_ms: 0,
            memory_kb: 0,
        }
    }
}

pub struct Executor {
    sandbox: Box<dyn SandboxDriver>,
    scratch_root: PathBuf,
}

impl Executor {
    pub fn new(sandbox: Box<dyn SandboxDriver>, scratch_root: PathBuf) -> Self {
        Self {
            sandbox,
            scratch_root,
        }
    }

    pub async fn execute(
        &self,
        language: &str,
        code: &str,
        stdin: &str,
        time_limit_ms: u32,
        memory_limit_mb: u32,
    ) -> anyhow::Result<ExecutionResult> {
        let profile = match get_language_profile(language) {
            Some(p) => p,
            None => return Ok(ExecutionResult::ce("Unsupported language")),
        };

        fs::create_dir_all(&self.scratch_root).await?;
        let work_dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&self.scratch_root)?;

        self.execute_in(
            work_dir.path(),
            &profile,
            code,
            stdin,
            time_limit_ms,
            memory_limit_mb,
        )
        .await

        // `work_dir` is removed on drop here, on every exit path (spec 4.3 step 6).
    }

    async fn execute_in(
        &self,
        work_dir: &Path,
        profile: &LanguageProfile,
        code: &str,
        stdin: &str,
        time_limit_ms: u32,
        memory_limit_mb: u32,
    ) -> anyhow::Result<ExecutionResult> {
        let source_path = work_dir.join(format!("solution{}", profile.source_ext));
        let input_path = work_dir.join("input.txt");
        fs::write(&source_path, code).await?;
        fs::write(&input_path, stdin).await?;

        let container_workdir = "/sandbox".to_string();
        let mounts = vec![Mount {
            host_path: work_dir.to_string_lossy().to_string(),
            container_path: container_workdir.clone(),
        }];

        if let Some(compile_argv) = &profile.compile_command {
            let spec = RunSpec {
                image: profile.image.clone(),
                argv: compile_argv.clone(),
                working_dir: container_workdir.clone(),
                mounts: mounts.clone(),
                limits: ResourceLimits {
                    time_ms: COMPILE_TIMEOUT_MS,
                    memory_mb: memory_limit_mb,
                },
                stdin_path: input_path.to_string_lossy().to_string(),
            };
            let raw = self.sandbox.run(&spec).await?;
            if raw.exit_code != 0 {
                return Ok(ExecutionResult {
                    verdict: ExecutionVerdict::Ce,
                    stdout: String::new(),
                    stderr: Some(truncate(&raw.stderr, STDERR_CAP_BYTES)),
                    time_ms: 0,
                    memory_kb: 0,
                });
            }
        }

        let run_spec = RunSpec {
            image: profile.image.clone(),
            argv: profile.run_command.clone(),
            working_dir: container_workdir,
            mounts,
            limits: ResourceLimits {
                time_ms: time_limit_ms,
                memory_mb: memory_limit_mb,
            },
            stdin_path: input_path.to_string_lossy().to_string(),
        };
        let raw = self.sandbox.run(&run_spec).await?;

        Ok(classify(raw, time_limit_ms, memory_limit_mb))
    }
}

fn classify(
    raw: crate::sandbox::RawResult,
    time_limit_ms: u32,
    memory_limit_mb: u32,
) -> ExecutionResult {
    let memory_cap_kb = memory_limit_mb as u64 * 1024;

    if raw.timed_out {
        return ExecutionResult {
            verdict: ExecutionVerdict::Tle,
            stdout: String::new(),
            stderr: None,
            time_ms: time_limit_ms,
            memory_kb: raw.peak_memory_kb,
        };
    }

    let near_memory_cap = raw.peak_memory_kb as u64 * 100 >= memory_cap_kb * 95;

    if raw.exit_code == 0 {
        if raw.peak_memory_kb as u64 > memory_cap_kb {
            return ExecutionResult {
                verdict: ExecutionVerdict::Mle,
                stdout: String::new(),
                stderr: None,
                time_ms: raw.wall_time_ms,
                memory_kb: raw.peak_memory_kb,
            };
        }
        return ExecutionResult {
            verdict: ExecutionVerdict::Success,
            stdout: ascii_trim(&truncate(&raw.stdout, STDOUT_CAP_BYTES)).to_string(),
            stderr: None,
            time_ms: raw.wall_time_ms,
            memory_kb: raw.peak_memory_kb,
        };
    }

    // Non-zero exit with near-cap memory: the OOM killer, not the program, is
    // the likely cause (spec 4.3 edge case).
    if near_memory_cap {
        return ExecutionResult {
            verdict: ExecutionVerdict::Mle,
            stdout: String::new(),
            stderr: None,
            time_ms: raw.wall_time_ms,
            memory_kb: raw.peak_memory_kb,
        };
    }

    ExecutionResult {
        verdict: ExecutionVerdict::Re,
        stdout: String::new(),
        stderr: Some(truncate(&raw.stderr, STDERR_CAP_BYTES)),
        time_ms: raw.wall_time_ms,
        memory_kb: raw.peak_memory_kb,
    }
}

fn truncate(bytes: &[u8], cap: usize) -> String {
    let slice = if bytes.len() > cap { &bytes[..cap] } else { bytes };
    String::from_utf8_lossy(slice).into_owned()
}

/// Strips leading/trailing ASCII whitespace only -- no internal-whitespace
/// normalization, and no stripping of non-ASCII Unicode whitespace that
/// Rust's `str::trim()` would also remove (spec section 4.5(d)).
pub(crate) fn ascii_trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}
