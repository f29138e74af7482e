use std::{
    ffi::{OsStr, OsString},
    io,
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::Output,
    time::Duration,
};

use strum_macros::IntoStaticStr;

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },

    #[error("Dependency '{dependency}' finished unsuccessfully: {explanation}\nCmdline: {rendered_command}\n{output}")]
    ExecutionFailed {
        dependency: Dependency,
        rendered_command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
        explanation: String,
        output: String,
    },

    #[error("Dependency '{dependency}' did not finish within {timeout:?} and was killed\nCmdline: {rendered_command}")]
    TimedOut {
        dependency: Dependency,
        rendered_command: String,
        timeout: Duration,
    },
}

impl DependencyError {
    /// Gets the rendered command line, when the command got far enough to
    /// have one.
    pub fn rendered_command(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed {
                rendered_command, ..
            }
            | Self::TimedOut {
                rendered_command, ..
            } => Some(rendered_command),
            _ => None,
        }
    }
}

/// External binaries the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Env,
    Lvcreate,
    Lvdisplay,
    Lvremove,
    Lvs,
    Mke2fs,
    Mkdir,
    Mount,
    Mountpoint,
    Rmdir,
    Sudo,
    Udevadm,
    Umount,
    Vgs,
    // Test dependencies
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
    #[cfg(test)]
    Sleep,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Binary name looked up on `PATH`, e.g. `lvcreate`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// Resolves the binary on `PATH`.
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Starts a [`Command`] invoking this binary.
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
            envs: vec![],
        }
    }
}

/// Description of a single invocation of a dependency. Running it is up to an
/// [`Executor`](crate::exe::Executor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn with_arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.arg(arg);
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args(args);
        self
    }

    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Command
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Forces the C locale so that the textual output of the tool does not
    /// depend on the host's language settings.
    pub fn c_locale(mut self) -> Self {
        self.env("LC_ALL", "C");
        self
    }

    pub fn dependency(&self) -> Dependency {
        self.dependency
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(OsString, OsString)] {
        &self.envs
    }

    /// Renders the command the way it is handed to the system, including the
    /// `env` prefix used to apply environment overrides.
    pub fn render_command(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.envs.len() + self.args.len() + 2);
        if !self.envs.is_empty() {
            parts.push(Dependency::Env.to_string());
            parts.extend(self.envs.iter().map(|(key, val)| {
                format!("{}={}", key.to_string_lossy(), val.to_string_lossy())
            }));
        }
        parts.push(self.dependency.to_string());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy())
                .map(|arg| {
                    if arg.contains(' ') {
                        format!("'{arg}'")
                    } else {
                        arg.into()
                    }
                }),
        );
        parts.join(" ")
    }
}

#[derive(Debug)]
pub struct CommandOutput {
    rendered_command: String,
    dependency: Dependency,
    inner: Output,
}

impl CommandOutput {
    pub fn new(command: &Command, inner: Output) -> Self {
        Self {
            rendered_command: command.render_command(),
            dependency: command.dependency(),
            inner,
        }
    }

    pub fn success(&self) -> bool {
        self.inner.status.success()
    }

    /// Exit code, `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.inner.status.code()
    }

    fn signal(&self) -> Option<i32> {
        self.inner.status.signal()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stdout).into()
    }

    pub fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stderr).into()
    }

    /// Both output streams, labelled, for logs and error messages. Empty
    /// streams are left out.
    pub fn output_report(&self) -> String {
        [("stdout", self.output()), ("stderr", self.error_output())]
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(label, text)| format!("{label}:\n{text}\n"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Turns a non-zero exit into [`DependencyError::ExecutionFailed`].
    pub fn check(&self) -> Result<(), Box<DependencyError>> {
        if self.success() {
            return Ok(());
        }

        let report = self.output_report();
        Err(Box::new(DependencyError::ExecutionFailed {
            dependency: self.dependency,
            rendered_command: self.rendered_command.clone(),
            code: self.code(),
            signal: self.signal(),
            stdout: self.output(),
            stderr: self.error_output(),
            explanation: self.explain_exit(),
            output: if report.is_empty() {
                "(no output collected)".into()
            } else {
                report
            },
        }))
    }

    /// Like [`CommandOutput::check`], returning stdout on success.
    pub fn check_output(&self) -> Result<String, Box<DependencyError>> {
        self.check().map(|()| self.output())
    }

    pub fn explain_exit(&self) -> String {
        match (self.code(), self.signal()) {
            (Some(code), _) => format!("exited with status: {code}"),
            (None, Some(signal)) => format!("terminated by signal: {signal}"),
            (None, None) => "exited with unknown status".into(),
        }
    }
}
