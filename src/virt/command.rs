//! Backend that decommissions guests by running an external program.
//!
//! Arguments may contain the placeholders `{fqdn}`, `{hostname}` and
//! `{hypervisor}`, e.g. `ssh {hypervisor} virsh undefine --remove-all-storage {hostname}`.
//!
//! The program must finish within the backend timeout; otherwise it is
//! killed and the decommission fails, leaving the inventory untouched.

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::model::Machine;
use crate::virt::VirtualizationBackend;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Default time a backend program may run.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between exit checks of a running backend program.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Program-driven virtualization backend.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    kind: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(kind: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            program: program.into(),
            args,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the time the program may run before it is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(&config.kind, &config.program, config.args.clone())
            .with_timeout(config.timeout()?))
    }

    /// Substitute placeholders in the configured arguments.
    fn render_args(&self, machine: &Machine) -> Vec<String> {
        let hypervisor = machine.hypervisor.as_deref().unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{fqdn}", &machine.fqdn)
                    .replace("{hostname}", machine.hostname())
                    .replace("{hypervisor}", hypervisor)
            })
            .collect()
    }
}

impl VirtualizationBackend for CommandBackend {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn decommission(&self, machine: &Machine) -> Result<()> {
        let args = self.render_args(machine);
        tracing::info!(
            backend = %self.kind,
            fqdn = %machine.fqdn,
            program = %self.program,
            "decommissioning virtual machine"
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::backend(&self.kind, format!("failed to run {}: {}", self.program, e)))?;

        // Drain stderr concurrently so a chatty program cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        let status = self.wait(&mut child)?;
        let stderr = stderr
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(Error::backend(
                &self.kind,
                format!("{} exited with {}: {}", self.program, status, stderr.trim()),
            ));
        }

        Ok(())
    }
}

impl CommandBackend {
    /// Wait for the program, killing it once the timeout elapses.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let exited = child
                .try_wait()
                .map_err(|e| Error::backend(&self.kind, format!("failed to wait for {}: {}", self.program, e)))?;
            if let Some(status) = exited {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    tracing::warn!(backend = %self.kind, error = %e, "failed to kill backend program");
                }
                let _ = child.wait();
                return Err(Error::backend(
                    &self.kind,
                    format!(
                        "{} did not finish within {}",
                        self.program,
                        humantime::format_duration(self.timeout)
                    ),
                ));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }
}
