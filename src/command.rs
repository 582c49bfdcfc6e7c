use std::io::Write;

use anyhow::Result;

use crate::session::Session;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Object-safe trait for any command the dispatcher can run in-process.
///
/// Implemented by the builtins via a blanket impl. An `Err` from `execute`
/// means the command failed at runtime; the dispatcher reports it and leaves
/// the line unhandled.
pub trait ExecutableCommand {
    /// Executes the command, writing its output to `out`.
    fn execute(self: Box<Self>, out: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
