use std::collections::HashMap;
use std::ffi::OsString;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::Context as _;
use log::debug;

/// One run of the configured ctl command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<OsString>,
    pub env: HashMap<OsString, OsString>,
}

impl Invocation {
    pub fn new(
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
        env: HashMap<OsString, OsString>,
    ) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// Trimmed stdout.
    pub stdout: String,
    pub failed: bool,
}

pub trait Runner {
    /// Runs with the terminal attached and returns the exit code.
    fn stream(&mut self, invocation: &Invocation) -> anyhow::Result<i32>;

    /// Runs with stdout captured. Never errors; spawn trouble sets `failed`.
    fn capture(&mut self, invocation: &Invocation) -> Captured;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn stream(&mut self, invocation: &Invocation) -> anyhow::Result<i32> {
        (**self).stream(invocation)
    }

    fn capture(&mut self, invocation: &Invocation) -> Captured {
        (**self).capture(invocation)
    }
}

/// Spawns the ctl command through the platform shell so the configured command
/// may be an alias or carry its own flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    fn command(invocation: &Invocation) -> Command {
        debug!("running {} {:?}", invocation.command, invocation.args);

        #[cfg(unix)]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(format!("{} \"$@\"", invocation.command))
                .arg(&invocation.command)
                .args(&invocation.args);
            cmd
        };

        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&invocation.command).args(&invocation.args);
            cmd
        };

        cmd.env_clear().envs(&invocation.env);
        cmd
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

impl Runner for ShellRunner {
    fn stream(&mut self, invocation: &Invocation) -> anyhow::Result<i32> {
        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Running {}", invocation.command))?;

        Ok(exit_code(status))
    }

    fn capture(&mut self, invocation: &Invocation) -> Captured {
        let output = Self::command(invocation)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output();

        match output {
            Ok(output) => Captured {
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
                failed: !output.status.success(),
            },
            Err(e) => {
                debug!("could not spawn {}: {e}", invocation.command);
                Captured {
                    stdout: String::new(),
                    failed: true,
                }
            }
        }
    }
}
