//! Launching, watching and stopping child processes.

use futures::future;
use std::{io, process::ExitStatus, str::FromStr, time::Duration};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;

/// How long a child gets to exit after its stdin was closed, before it's killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Exit status when a program can't be started, as in shells.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Exit status when the supervisor itself was asked to shut down.
pub const SHUTDOWN_EXIT_CODE: i32 = 130;

/// A process to launch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Name used in logs and in [`Exit`]
    pub name: String,
    /// Program to run
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
}

impl ProcessSpec {
    /// Run `program` with `args`.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Run `command` through `sh -c`.
    pub fn shell(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(name, "sh", ["-c".to_string(), command.into()])
    }

    fn spawn(&self) -> io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Errors parsing a `NAME=COMMAND` process spec
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProcessSpecError {
    /// There's no `=` separating name and command
    #[error("expected NAME=COMMAND, got {0:?}")]
    MissingSeparator(String),
    /// The name before `=` is empty
    #[error("process name must not be empty")]
    EmptyName,
    /// The command after `=` is empty
    #[error("command for {0} must not be empty")]
    EmptyCommand(String),
}

impl FromStr for ProcessSpec {
    type Err = ProcessSpecError;

    /// Parse `NAME=COMMAND`, running COMMAND through `sh -c`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, command) = s
            .split_once('=')
            .ok_or_else(|| ProcessSpecError::MissingSeparator(s.to_string()))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ProcessSpecError::EmptyName);
        }

        if command.trim().is_empty() {
            return Err(ProcessSpecError::EmptyCommand(name.to_string()));
        }

        Ok(Self::shell(name, command))
    }
}

/// How supervision ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    /// A child exited first
    Child {
        /// Name of the child
        name: String,
        /// Its exit status. Signals map to `128 + N`.
        code: i32,
    },
    /// The supervisor was asked to shut down before any child exited
    Shutdown,
}

impl Exit {
    /// The status the supervisor should exit with
    pub fn code(&self) -> i32 {
        match self {
            Self::Child { code, .. } => *code,
            Self::Shutdown => SHUTDOWN_EXIT_CODE,
        }
    }
}

/// Errors supervising processes
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A process couldn't be started
    #[error("failed to start {name}: {source}")]
    Spawn {
        /// Name of the process
        name: String,
        /// Why it couldn't be started
        #[source]
        source: io::Error,
    },
    /// Waiting on a process failed
    #[error("failed to wait for {name}: {source}")]
    Wait {
        /// Name of the process
        name: String,
        /// Why waiting failed
        #[source]
        source: io::Error,
    },
    /// Nothing to supervise
    #[error("no processes to supervise")]
    NoProcesses,
}

impl SupervisorError {
    /// The status the supervisor should exit with
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => SPAWN_FAILURE_EXIT_CODE,
            Self::Wait { .. } | Self::NoProcesses => 1,
        }
    }
}

/// Runs a set of processes until the first one exits
#[derive(Clone, Debug)]
pub struct Supervisor {
    specs: Vec<ProcessSpec>,
    grace_period: Duration,
}

#[derive(Debug)]
struct Running {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl Supervisor {
    /// Supervise the given processes
    pub fn new(specs: impl IntoIterator<Item = ProcessSpec>) -> Self {
        Self {
            specs: specs.into_iter().collect(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Set how long children get to exit once asked to stop
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Launch all processes and wait until one of them exits or `shutdown`
    /// is cancelled. The remaining processes are stopped and reaped before
    /// this returns.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<Exit, SupervisorError> {
        if self.specs.is_empty() {
            return Err(SupervisorError::NoProcesses);
        }

        let mut running = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            match spec.spawn() {
                Ok(mut child) => {
                    tracing::info!(
                        subject = "process_start",
                        category = "supervisor",
                        name = %spec.name,
                        pid = child.id(),
                        "Started process"
                    );

                    let stdin = child.stdin.take();
                    running.push(Running {
                        name: spec.name.clone(),
                        child,
                        stdin,
                    });
                }
                Err(source) => {
                    tracing::error!(name = %spec.name, %source, "Failed to start process");
                    self.stop_all(&mut running).await;
                    return Err(SupervisorError::Spawn {
                        name: spec.name.clone(),
                        source,
                    });
                }
            }
        }

        let first = {
            let waits = running
                .iter_mut()
                .enumerate()
                .map(|(i, process)| Box::pin(async move { (i, process.child.wait().await) }));

            tokio::select! {
                ((i, status), _, _) = future::select_all(waits) => Some((i, status)),
                _ = shutdown.cancelled() => None,
            }
        };

        let result = match first {
            Some((i, Ok(status))) => {
                let name = running[i].name.clone();
                let code = exit_code(status);
                tracing::info!(
                    subject = "process_exit",
                    category = "supervisor",
                    name = %name,
                    code,
                    "Process exited, stopping the others"
                );
                Ok(Exit::Child { name, code })
            }
            Some((i, Err(source))) => Err(SupervisorError::Wait {
                name: running[i].name.clone(),
                source,
            }),
            None => {
                tracing::info!(
                    subject = "shutdown",
                    category = "supervisor",
                    "Shutdown requested, stopping all processes"
                );
                Ok(Exit::Shutdown)
            }
        };

        self.stop_all(&mut running).await;

        result
    }

    async fn stop_all(&self, running: &mut [Running]) {
        // Closing stdin asks the children to shut down.
        for process in running.iter_mut() {
            process.stdin.take();
        }

        future::join_all(
            running
                .iter_mut()
                .map(|process| stop(process, self.grace_period)),
        )
        .await;
    }
}

async fn stop(process: &mut Running, grace_period: Duration) {
    match tokio::time::timeout(grace_period, process.child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(name = %process.name, %status, "Process stopped");
        }
        Ok(Err(err)) => {
            tracing::warn!(name = %process.name, %err, "Failed to wait for process");
        }
        Err(_) => {
            tracing::warn!(
                name = %process.name,
                grace_period = ?grace_period,
                "Process didn't stop in time, killing it"
            );
            if let Err(err) = process.child.kill().await {
                tracing::warn!(name = %process.name, %err, "Failed to kill process");
            }
        }
    }
}

/// The shell's view of an exit status: the exit code, or `128 + N` when
/// terminated by signal `N`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
