use std::{
    ffi::OsString,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use log::trace;
use nix::unistd::Uid;

use crate::dependencies::{Command, CommandOutput, Dependency, DependencyError};

/// How often a running command is polled for completion while a deadline is
/// in effect.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs [`Command`]s. Implementations block the calling thread until the
/// command finishes and return its stdout. A failing command produces a
/// [`DependencyError`] that still carries everything the command printed.
pub trait Executor: Send + Sync {
    fn execute(&self, command: &Command) -> Result<String, Box<DependencyError>>;
}

/// Privilege tier a command runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Run as the current user.
    Base,
    /// Run as root, going through `sudo` when not already root.
    Root,
}

/// Executor spawning real processes on the host.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    privilege: Privilege,
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn base() -> Self {
        Self {
            privilege: Privilege::Base,
            timeout: None,
        }
    }

    pub fn root() -> Self {
        Self {
            privilege: Privilege::Root,
            timeout: None,
        }
    }

    /// Kill commands still running after `timeout`.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Builds the argv handed to the system: an optional `sudo -n`, then
    /// `env K=V...` when the command overrides its environment, then the
    /// resolved binary and its arguments.
    fn argv(&self, command: &Command) -> Result<Vec<OsString>, Box<DependencyError>> {
        let mut argv = Vec::new();

        if self.privilege == Privilege::Root && !Uid::effective().is_root() {
            argv.push(Dependency::Sudo.path()?.into_os_string());
            argv.push("-n".into());
        }

        if !command.get_envs().is_empty() {
            argv.push(Dependency::Env.path()?.into_os_string());
            for (key, val) in command.get_envs() {
                let mut pair = key.clone();
                pair.push("=");
                pair.push(val);
                argv.push(pair);
            }
        }

        argv.push(command.dependency().path()?.into_os_string());
        argv.extend(command.get_args().iter().cloned());
        Ok(argv)
    }

    fn spawn(&self, command: &Command) -> Result<CommandOutput, Box<DependencyError>> {
        let argv = self.argv(command)?;
        let could_not_execute = |inner| {
            Box::new(DependencyError::CouldNotExecute {
                dependency: command.dependency(),
                inner,
            })
        };

        let handle = duct::cmd(&argv[0], &argv[1..])
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(could_not_execute)?;

        let output = match self.timeout {
            None => handle.wait().map_err(could_not_execute)?.clone(),
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match handle.try_wait().map_err(could_not_execute)? {
                        Some(output) => break output.clone(),
                        None if Instant::now() >= deadline => {
                            // The command is abandoned either way; a failed kill
                            // only means it exited in the meantime.
                            let _ = handle.kill();
                            return Err(Box::new(DependencyError::TimedOut {
                                dependency: command.dependency(),
                                rendered_command: command.render_command(),
                                timeout,
                            }));
                        }
                        None => thread::sleep(POLL_INTERVAL),
                    }
                }
            }
        };

        Ok(CommandOutput::new(command, output))
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, command: &Command) -> Result<String, Box<DependencyError>> {
        let rendered_command = command.render_command();
        trace!("Executing '{rendered_command}' ({:?})", self.privilege);
        let output = self.spawn(command)?;
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );
        output.check_output()
    }
}

/// The pair of executors handed to every component: call sites pick the tier
/// the underlying tool needs.
#[derive(Clone)]
pub struct Executors {
    base: Arc<dyn Executor>,
    root: Arc<dyn Executor>,
}

impl Executors {
    pub fn new(base: Arc<dyn Executor>, root: Arc<dyn Executor>) -> Self {
        Self { base, root }
    }

    /// Executors running real processes on the host.
    pub fn system(timeout: Option<Duration>) -> Self {
        Self::new(
            Arc::new(ProcessExecutor::base().with_timeout(timeout)),
            Arc::new(ProcessExecutor::root().with_timeout(timeout)),
        )
    }

    /// Unprivileged executor.
    pub fn base(&self) -> &dyn Executor {
        self.base.as_ref()
    }

    /// Elevated executor.
    pub fn root(&self) -> &dyn Executor {
        self.root.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute() {
        let executor = ProcessExecutor::base();
        let output = executor
            .execute(&Dependency::Echo.cmd().with_arg("Hello, world"))
            .unwrap();
        assert_eq!(output, "Hello, world\n");

        let error = executor.execute(&Dependency::False.cmd()).unwrap_err();
        assert!(matches!(
            *error,
            DependencyError::ExecutionFailed { code: Some(1), .. }
        ));

        let error = executor
            .execute(&Dependency::DoesNotExist.cmd())
            .unwrap_err();
        assert!(matches!(*error, DependencyError::NotFound { .. }));
    }

    #[test]
    fn test_execute_with_env() {
        let executor = ProcessExecutor::base();
        let cmd = Dependency::Echo.cmd().c_locale().with_arg("locale");
        assert_eq!(executor.argv(&cmd).unwrap().len(), 4);
        assert_eq!(executor.execute(&cmd).unwrap(), "locale\n");
    }

    #[test]
    fn test_timeout() {
        let executor = ProcessExecutor::base().with_timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let error = executor
            .execute(&Dependency::Sleep.cmd().with_arg("10"))
            .unwrap_err();
        assert!(matches!(*error, DependencyError::TimedOut { .. }));
        assert_eq!(error.rendered_command(), Some("sleep 10"));
        assert!(started.elapsed() < Duration::from_secs(5));

        // Commands finishing in time are not affected
        let output = executor
            .execute(&Dependency::Echo.cmd().with_arg("fast"))
            .unwrap();
        assert_eq!(output, "fast\n");
    }
}
