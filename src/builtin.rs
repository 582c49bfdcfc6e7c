use std::env;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use nix::unistd::{User, getuid};

use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::interpreter::Factory;
use crate::session::Session;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "jobs".
    fn name() -> &'static str;

    /// Executes the command using the provided output stream and session.
    ///
    /// Return value follows shell conventions: 0 for success. An `Err` means
    /// the builtin failed at runtime; the dispatcher reports it and leaves
    /// the line unhandled.
    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, out: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        T::execute(*self, out, session)
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, out: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        out.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Terminate the shell with status 0.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _out: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        std::process::exit(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// With no target, changes to the home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to change to; defaults to the home directory when omitted
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _out: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        let path = match &self.target {
            Some(target) if !target.is_empty() => PathBuf::from(target),
            _ => home_dir()?,
        };
        env::set_current_dir(&path).with_context(|| format!("cd: {}", path.display()))?;
        Ok(0)
    }
}

/// Resolve the current user's home directory: `$HOME` first, then the
/// passwd entry for the current uid.
fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = env::var("HOME")
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }
    let user = User::from_uid(getuid())
        .context("cd: passwd lookup failed")?
        .ok_or_else(|| anyhow!("cd: no passwd entry for the current user"))?;
    Ok(user.dir)
}

#[derive(FromArgs)]
/// Print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, out: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        let cwd = env::current_dir().context("pwd")?;
        writeln!(out, "{}", cwd.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print all recorded input lines with 1-based sequence numbers.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        for (index, line) in session.history.iter().enumerate() {
            writeln!(out, "{} {}", index + 1, line)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs and their state.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, out: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.jobs.list(out)?;
        Ok(0)
    }
}
