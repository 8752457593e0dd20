//! Child-process boundary. Everything the pipeline asks of an external tool
//! goes through [`CommandRunner`], so stages can be driven by a test double.

use crate::error::{PipelineError, Result, Stage};
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

/// One external tool invocation.
#[derive(Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment. Values may be secret and are never logged.
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// `program arg arg`, for error messages and logs.
    pub fn display_name(&self) -> String {
        let mut s = self.program.clone();
        for a in self.args.iter().take(2) {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env_keys", &env_keys)
            .field("stdin", &self.stdin.as_ref().map(|_| "<piped>"))
            .finish()
    }
}

/// Result of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner {
    /// Spawn errors (tool missing, not executable) come back as `Err`;
    /// a non-zero exit is an `Ok` with `success() == false`.
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        tracing::debug!(
            program = %invocation.program,
            args = ?invocation.args,
            "running external command"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        for (k, v) in &invocation.env {
            cmd.env(k, v);
        }

        let mut child = cmd.spawn()?;
        if let Some(input) = &invocation.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                // A child may exit without reading its input.
                if let Err(e) = pipe.write_all(input.as_bytes()) {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
        }
        let out = child.wait_with_output()?;

        let output = CommandOutput {
            status: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        tracing::trace!(
            program = %invocation.program,
            status = ?output.status,
            "external command finished"
        );
        Ok(output)
    }
}

/// Run `invocation` and require a zero exit. Spawn failures and non-zero
/// exits both surface as `ExternalCallFailed` attributed to `stage`.
pub fn run_step(
    runner: &dyn CommandRunner,
    stage: Stage,
    invocation: &Invocation,
) -> Result<CommandOutput> {
    let out = run_tolerant(runner, stage, invocation)?;
    if !out.success() {
        return Err(PipelineError::external(
            stage,
            invocation.display_name(),
            out.status,
            &out.stderr,
        ));
    }
    Ok(out)
}

/// Run `invocation`, returning the output whatever the exit status. Only a
/// spawn failure is an error.
pub fn run_tolerant(
    runner: &dyn CommandRunner,
    stage: Stage,
    invocation: &Invocation,
) -> Result<CommandOutput> {
    runner.run(invocation).map_err(|e| {
        PipelineError::external(stage, invocation.display_name(), None, &e.to_string())
    })
}
