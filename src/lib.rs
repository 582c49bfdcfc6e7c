//! An interactive command shell with background-job tracking.
//!
//! This crate provides the building blocks of a small job-control shell: it
//! reads a line, decides whether it names a builtin or an external program,
//! and runs it either in the foreground (blocking, with temporary ownership
//! of the controlling terminal) or in the background (tracked in a bounded
//! job table that is polled once per prompt, never asynchronously).
//!
//! The main entry point is [`Interpreter`], which owns the session state and
//! the set of builtin command factories. The public modules [`command`],
//! [`jobs`] and [`session`] expose the traits and types needed to embed the
//! read/dispatch/launch loop or extend the builtin set.

mod builtin;
pub mod command;
mod external;
mod interpreter;
pub mod jobs;
mod lexer;
pub mod session;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Tests that read or change the working directory must serialize; the
    /// working directory is process-global.
    pub fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }
}
