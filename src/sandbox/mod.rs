//! Sandbox driver (C1) -- ephemeral, resource- and privilege-capped execution
//! of one program invocation.
//!
//! The driver is a trait so the executor (C3) and checker runner (C4) can be
//! exercised against an in-memory fake without a live Docker daemon; the
//! production implementation in `docker` talks to the daemon over `bollard`.

mod docker;
mod types;

pub use docker::DockerSandbox;
pub use types::{Mount, RawResult, ResourceLimits, RunSpec};

use async_trait::async_trait;

/// Launches one isolated container per `run` call and tears it down on every
/// exit path, including errors and timeouts (spec section 4.1).
#[async_trait]
pub trait SandboxDriver: Send + Sync {
    async fn run(&self, spec: &RunSpec) -> anyhow::Result<RawResult>;
}
