use crate::error::{MobyError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandOptions<'a> {
    pub cwd: Option<&'a Path>,
    /// Don't mirror captured output to the terminal.
    pub quiet: bool,
    /// Written to stdin, which is then closed.
    pub input: Option<&'a str>,
    /// Inherit stdout/stderr instead of capturing them.
    pub stream: bool,
}

impl<'a> CommandOptions<'a> {
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    pub fn stream() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }

    pub fn in_dir(mut self, dir: &'a Path) -> Self {
        self.cwd = Some(dir);
        self
    }

    pub fn with_input(mut self, input: &'a str) -> Self {
        self.input = Some(input);
        self
    }
}

/// Executes external programs. The orchestrators only talk to this trait.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, argv: &[&str], opts: CommandOptions<'_>) -> Result<CommandResult>;

    /// Runs a command whose failure means "already in the desired state".
    async fn run_best_effort(&self, argv: &[&str], opts: CommandOptions<'_>) -> bool {
        match self.run(argv, opts).await {
            Ok(_) => true,
            Err(e) => {
                debug!(command = %argv.join(" "), error = %e, "ignoring failure");
                false
            }
        }
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Shell;

#[async_trait]
impl Runner for Shell {
    async fn run(&self, argv: &[&str], opts: CommandOptions<'_>) -> Result<CommandResult> {
        let (program, args) = argv.split_first().ok_or(MobyError::EmptyCommand)?;
        let command = argv.join(" ");
        debug!(%command, cwd = ?opts.cwd, "running");

        let mut c = Command::new(program);
        c.args(args);
        if let Some(dir) = opts.cwd {
            c.current_dir(dir);
        }

        let spawn_err = |source| MobyError::Spawn {
            program: program.to_string(),
            source,
        };

        if opts.stream {
            let status = c.status().await.map_err(spawn_err)?;
            let code = status.code().unwrap_or(-1);
            if code != 0 {
                return Err(MobyError::CommandFailed {
                    command,
                    code,
                    stdout: String::new(),
                    stderr: String::new(),
                });
            }
            return Ok(CommandResult {
                stdout: String::new(),
                stderr: String::new(),
                code,
            });
        }

        c.stdout(Stdio::piped()).stderr(Stdio::piped());
        if opts.input.is_some() {
            c.stdin(Stdio::piped());
        }

        let mut child = c.spawn().map_err(spawn_err)?;
        let stdin = child.stdin.take();
        // Feed stdin while output is drained so neither side blocks the other.
        let write_input = async move {
            if let (Some(input), Some(mut stdin)) = (opts.input, stdin) {
                match stdin.write_all(input.as_bytes()).await {
                    // the child exited without reading; its status decides
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                    other => other?,
                }
                // dropping closes the pipe
            }
            Ok::<(), std::io::Error>(())
        };
        let (written, out) = tokio::join!(write_input, child.wait_with_output());
        let out = out.map_err(spawn_err)?;

        let result = CommandResult {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            code: out.status.code().unwrap_or(-1),
        };
        debug!(%command, code = result.code, "finished");

        if !opts.quiet {
            if !result.stdout.is_empty() {
                println!("{}", result.stdout.trim_end_matches('\n'));
            }
            if !result.stderr.is_empty() {
                eprintln!("{}", result.stderr.trim_end_matches('\n'));
            }
        }

        if result.code != 0 {
            return Err(MobyError::CommandFailed {
                command,
                code: result.code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        written.map_err(spawn_err)?;
        Ok(result)
    }
}
