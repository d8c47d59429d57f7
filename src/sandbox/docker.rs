//! Docker-backed sandbox driver.
//!
//! Grounded on `examples/original_source/api/executor.py`, which launches
//! each run under the `docker` SDK with the exact isolation policy this
//! module reproduces (no network, all capabilities dropped, no new
//! privileges, a size-capped `tmpfs` scratch mount, a PID cap, and halved
//! CPU/memory shares with no swap headroom). The teacher's `IsolateBox`
//! contributes the shape -- an owned handle constructed per run, an explicit
//! `run()` returning a typed outcome, and teardown on every exit path -- the
//! backend underneath is `bollard` instead of the `isolate` CLI, matching
//! `In-Saiyan-AlgoJudge`'s `ContainerManager` (`benchmark/container.rs`),
//! which already pins the same `bollard` version for the same container
//! lifecycle (create/start/remove via the `query_parameters` builders).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig, Mount as BollardMount, MountTypeEnum};
use bollard::query_parameters::{
    AttachContainerOptions, CreateContainerOptionsBuilder, KillContainerOptionsBuilder,
    RemoveContainerOptionsBuilder, StartContainerOptions, StatsOptionsBuilder,
    WaitContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::types::{RawResult, RunSpec, TMPFS_OPTIONS};
use super::SandboxDriver;

/// Grace period allowed after the wall-clock deadline for a stopped
/// container to exit before it is force-killed (spec section 4.1).
const STOP_GRACE: Duration = Duration::from_millis(500);

pub struct DockerSandbox {
    docker: Docker,
}

impl DockerSandbox {
    pub fn connect(endpoint: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix(endpoint, 120, bollard::API_DEFAULT_VERSION)
            .context("failed to connect to sandbox endpoint")?;
        Ok(Self { docker })
    }

    async fn create_and_start(&self, spec: &RunSpec, name: &str) -> anyhow::Result<()> {
        let mounts: Vec<BollardMount> = spec
            .mounts
            .iter()
            .map(|m| BollardMount {
                target: Some(m.container_path.clone()),
                source: Some(m.host_path.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(false),
                ..Default::default()
            })
            .collect();

        // The per-invocation directory is bind-mounted at `working_dir` so the
        // source, stdin, and any compiled artifact the executor wrote there are
        // visible to the process -- and, for compiled languages, executable.
        // The size-capped scratch tmpfs therefore lives at a distinct path
        // (`/tmp`) instead of shadowing that bind mount; mounting both at
        // `working_dir` is rejected by Docker (or the tmpfs wins), hiding every
        // file the executor staged.
        let mut tmpfs = HashMap::new();
        tmpfs.insert("/tmp".to_string(), TMPFS_OPTIONS.to_string());

        let memory_bytes = spec.limits.memory_mb as i64 * 1024 * 1024;

        let host_config = HostConfig {
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            readonly_rootfs: Some(true),
            mounts: Some(mounts),
            tmpfs: Some(tmpfs),
            pids_limit: Some(50),
            cpu_period: Some(100_000),
            cpu_quota: Some(50_000),
            memory: Some(memory_bytes),
            memory_swap: Some(memory_bytes),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.argv.clone()),
            working_dir: Some(spec.working_dir.clone()),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(true),
            tty: Some(false),
            network_disabled: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default().name(name).build();

        self.docker
            .create_container(Some(options), body)
            .await
            .context("failed to create sandbox container")?;

        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .context("failed to start sandbox container")?;

        Ok(())
    }

    async fn teardown(&self, name: &str) {
        let options = RemoveContainerOptionsBuilder::default()
            .force(true)
            .v(true)
            .build();
        let _ = self.docker.remove_container(name, Some(options)).await;
    }

    async fn peak_memory_kb(&self, name: &str) -> u32 {
        let options = StatsOptionsBuilder::default()
            .stream(false)
            .one_shot(true)
            .build();
        let mut stream = self.docker.stats(name, Some(options));
        match stream.next().await {
            Some(Ok(stats)) => (stats.memory_stats.max_usage.unwrap_or(0) / 1024) as u32,
            _ => 0,
        }
    }

    async fn stop_with_grace(&self, name: &str) {
        let sigterm = KillContainerOptionsBuilder::default()
            .signal("SIGTERM")
            .build();
        let _ = self.docker.kill_container(name, Some(sigterm)).await;

        tokio::time::sleep(STOP_GRACE).await;

        let sigkill = KillContainerOptionsBuilder::default()
            .signal("SIGKILL")
            .build();
        if self.docker.kill_container(name, Some(sigkill)).await.is_ok() {
            warn!(container = name, "sandbox exceeded deadline, force-killed");
        }
    }

    async fn wait_exit_code(&self, name: &str) -> Option<i32> {
        let options = WaitContainerOptions {
            condition: Some("not-running".to_string()),
        };
        let mut stream = self.docker.wait_container(name, Some(options));
        match stream.next().await {
            Some(Ok(response)) => Some(response.status_code as i32),
            _ => None,
        }
    }
}

#[async_trait]
impl SandboxDriver for DockerSandbox {
    async fn run(&self, spec: &RunSpec) -> anyhow::Result<RawResult> {
        let name = format!("judge-run-{}", unique_suffix());

        if let Err(err) = self.create_and_start(spec, &name).await {
            self.teardown(&name).await;
            return Ok(RawResult {
                exit_code: -1,
                stdout: Vec::new(),
                stderr: format!("sandbox infrastructure failure: {err:#}").into_bytes(),
                wall_time_ms: 0,
                peak_memory_kb: 0,
                timed_out: false,
            });
        }

        let attach_options = AttachContainerOptions {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            ..Default::default()
        };

        let attach = self
            .docker
            .attach_container(&name, Some(attach_options))
            .await
            .context("failed to attach to sandbox container");

        let (mut output, mut input) = match attach {
            Ok(a) => (a.output, a.input),
            Err(err) => {
                self.teardown(&name).await;
                return Ok(RawResult {
                    exit_code: -1,
                    stdout: Vec::new(),
                    stderr: format!("{err:#}").into_bytes(),
                    wall_time_ms: 0,
                    peak_memory_kb: 0,
                    timed_out: false,
                });
            }
        };

        let stdin_bytes = tokio::fs::read(&spec.stdin_path).await.unwrap_or_default();
        if input.write_all(&stdin_bytes).await.is_ok() {
            let _ = input.shutdown().await;
        }

        let start = tokio::time::Instant::now();
        let deadline = Duration::from_millis(spec.limits.time_ms as u64);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut timed_out = false;

        let drain = async {
            while let Some(frame) = output.next().await {
                match frame {
                    Ok(LogOutput::StdOut { message }) => stdout.extend_from_slice(&message),
                    Ok(LogOutput::StdErr { message }) => stderr.extend_from_slice(&message),
                    Ok(_) => {}
                    Err(err) => {
                        debug!(%err, "sandbox output stream ended");
                        break;
                    }
                }
            }
        };

        if tokio::time::timeout(deadline, drain).await.is_err() {
            timed_out = true;
            self.stop_with_grace(&name).await;
        }

        let wall_time_ms = start.elapsed().as_millis() as u32;
        let peak_memory_kb = self.peak_memory_kb(&name).await;
        let exit_code = self.wait_exit_code(&name).await.unwrap_or(-1);

        self.teardown(&name).await;

        Ok(RawResult {
            exit_code,
            stdout,
            stderr,
            wall_time_ms,
            peak_memory_kb,
            timed_out,
        })
    }
}

/// Lightweight unique suffix for container names; this worker processes one
/// job per invocation of `run`, so collision risk is bounded by process PID
/// plus a monotonic counter rather than needing a real UUID dependency.
fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", std::process::id(), n)
}
