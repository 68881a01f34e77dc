//! Built-in ways of powering off the host, most capable first.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::config::{HostConfig, MethodKind};
use crate::shutdown::command::CommandRunner;
use crate::shutdown::types::MethodError;

/// Something that can ask the host to power off.
///
/// `Ok(())` means the request was accepted. Nothing waits for the machine
/// to actually go down.
pub trait ShutdownAction: Send + Sync {
    fn attempt<'a>(&'a self, ctx: &'a CancellationToken) -> BoxFuture<'a, Result<(), MethodError>>;
}

/// A named entry in the orchestrator's priority list.
pub struct ShutdownMethod {
    name: String,
    action: Box<dyn ShutdownAction>,
}

impl ShutdownMethod {
    pub fn new(name: impl Into<String>, action: impl ShutdownAction + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    /// Build one of the built-in methods from host configuration.
    pub fn builtin(kind: MethodKind, config: &HostConfig, runner: Arc<dyn CommandRunner>) -> Self {
        match kind {
            MethodKind::Nsenter => {
                Self::new(kind.as_str(), NsenterPoweroff::new(runner, config.target_pid))
            }
            MethodKind::SysrqTrigger => {
                Self::new(kind.as_str(), SysrqTrigger::new(&config.proc_path))
            }
            MethodKind::DirectCommand => Self::new(kind.as_str(), DirectCommand::new(runner)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn attempt(&self, ctx: &CancellationToken) -> Result<(), MethodError> {
        self.action.attempt(ctx).await
    }
}

impl std::fmt::Debug for ShutdownMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownMethod").field("name", &self.name).finish()
    }
}

/// Joins the mount, UTS, IPC, network and PID namespaces of the host's
/// init process and runs `poweroff` there.
///
/// Needs a privileged container sharing the host PID namespace.
pub struct NsenterPoweroff {
    runner: Arc<dyn CommandRunner>,
    target: String,
}

impl NsenterPoweroff {
    pub fn new(runner: Arc<dyn CommandRunner>, target_pid: u32) -> Self {
        Self {
            runner,
            target: target_pid.to_string(),
        }
    }
}

impl ShutdownAction for NsenterPoweroff {
    fn attempt<'a>(&'a self, ctx: &'a CancellationToken) -> BoxFuture<'a, Result<(), MethodError>> {
        async move {
            let args = [
                "--target",
                self.target.as_str(),
                "--mount",
                "--uts",
                "--ipc",
                "--net",
                "--pid",
                "--",
                "poweroff",
            ];
            self.runner.run("nsenter", &args, ctx).await?;
            Ok(())
        }
        .boxed()
    }
}

/// Writes one SysRq request to the control file.
pub trait TriggerWriter: Send + Sync {
    fn write<'a>(
        &'a self,
        path: &'a Path,
        request: &'static [u8],
    ) -> BoxFuture<'a, io::Result<()>>;
}

/// Writes through the filesystem.
#[derive(Debug, Default)]
pub struct FsTriggerWriter;

impl TriggerWriter for FsTriggerWriter {
    fn write<'a>(
        &'a self,
        path: &'a Path,
        request: &'static [u8],
    ) -> BoxFuture<'a, io::Result<()>> {
        tokio::fs::write(path, request).boxed()
    }
}

/// Magic SysRq requests written to the host's `sysrq-trigger`.
pub struct SysrqTrigger {
    proc_path: PathBuf,
    writer: Box<dyn TriggerWriter>,
}

impl SysrqTrigger {
    pub const SYNC: &'static [u8] = b"s";
    pub const REMOUNT_RO: &'static [u8] = b"u";
    pub const POWER_OFF: &'static [u8] = b"o";

    pub fn new(proc_path: impl AsRef<Path>) -> Self {
        Self::with_writer(proc_path, FsTriggerWriter)
    }

    pub fn with_writer(proc_path: impl AsRef<Path>, writer: impl TriggerWriter + 'static) -> Self {
        Self {
            proc_path: proc_path.as_ref().to_path_buf(),
            writer: Box::new(writer),
        }
    }

    pub fn trigger_path(&self) -> PathBuf {
        self.proc_path.join("sysrq-trigger")
    }
}

impl ShutdownAction for SysrqTrigger {
    fn attempt<'a>(
        &'a self,
        _ctx: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), MethodError>> {
        async move {
            match tokio::fs::metadata(&self.proc_path).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(MethodError::NotMounted {
                        path: self.proc_path.clone(),
                    });
                }
                _ => {}
            }

            let trigger = self.trigger_path();

            // Best effort: the power-off write alone decides the outcome.
            if let Err(e) = self.writer.write(&trigger, Self::SYNC).await {
                tracing::warn!(
                    path = %trigger.display(),
                    error = %e,
                    "Failed to sync filesystems via sysrq"
                );
            }
            if let Err(e) = self.writer.write(&trigger, Self::REMOUNT_RO).await {
                tracing::warn!(
                    path = %trigger.display(),
                    error = %e,
                    "Failed to remount filesystems read-only via sysrq"
                );
            }

            self.writer
                .write(&trigger, Self::POWER_OFF)
                .await
                .map_err(|source| MethodError::TriggerWrite {
                    path: trigger,
                    source,
                })
        }
        .boxed()
    }
}

/// `poweroff`, falling back to `shutdown -h now`, in our own namespaces.
///
/// Only useful when the agent already shares the host's init system.
pub struct DirectCommand {
    runner: Arc<dyn CommandRunner>,
}

impl DirectCommand {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl ShutdownAction for DirectCommand {
    fn attempt<'a>(&'a self, ctx: &'a CancellationToken) -> BoxFuture<'a, Result<(), MethodError>> {
        async move {
            let primary = match self.runner.run("poweroff", &[], ctx).await {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };
            tracing::debug!(error = %primary, "poweroff failed, trying shutdown -h now");

            match self.runner.run("shutdown", &["-h", "now"], ctx).await {
                Ok(_) => Ok(()),
                Err(fallback) => Err(MethodError::CommandsExhausted { primary, fallback }),
            }
        }
        .boxed()
    }
}
