//! Session state: prompt, terminal ownership, job table, history.

use std::env;
use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::termios::{self, Termios};
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::jobs::JobTable;

/// Environment variable consulted for the prompt string.
pub const PROMPT_VAR: &str = "MY_PROMPT";

/// Prompt used when [`PROMPT_VAR`] is unset.
pub const DEFAULT_PROMPT: &str = "shell>";

/// Read the prompt from the environment, falling back to [`DEFAULT_PROMPT`].
pub fn get_prompt(var: &str) -> String {
    env::var(var).unwrap_or_else(|_| DEFAULT_PROMPT.to_owned())
}

/// Per-run shell state.
///
/// Owns the prompt, the controlling-terminal handle, the job table and the
/// recorded-line history. The process-group and saved-terminal-mode fields
/// are populated by [`Session::claim_terminal`] and only when the session is
/// interactive.
pub struct Session {
    pub prompt: String,
    /// True iff stdin refers to an actual terminal device.
    pub interactive: bool,
    pub jobs: JobTable,
    /// Lines recorded for the `history` builtin, in input order.
    pub history: Vec<String>,
    terminal: io::Stdin,
    pgid: Option<Pid>,
    saved_modes: Option<Termios>,
}

impl Session {
    pub fn new() -> Self {
        let terminal = io::stdin();
        let interactive = terminal.is_terminal();
        Session {
            prompt: get_prompt(PROMPT_VAR),
            interactive,
            jobs: JobTable::new(),
            history: Vec::new(),
            terminal,
            pgid: None,
            saved_modes: None,
        }
    }

    /// The shell's own process group, once [`Session::claim_terminal`] has
    /// succeeded on an interactive session.
    pub fn pgid(&self) -> Option<Pid> {
        self.pgid
    }

    /// Terminal modes captured when the shell took terminal ownership.
    /// Captured once, never restored by this crate.
    pub fn saved_modes(&self) -> Option<&Termios> {
        self.saved_modes.as_ref()
    }

    /// Put the shell into its own process group and make that group the
    /// terminal's foreground group. No-op for non-interactive sessions.
    ///
    /// Blocks until the shell's group is already in the foreground, prodding
    /// its own group with SIGTTIN until that holds. Must run before the read
    /// loop starts; failures here are fatal to the shell.
    pub fn claim_terminal(&mut self) -> Result<()> {
        if !self.interactive {
            debug!("stdin is not a terminal, skipping terminal setup");
            return Ok(());
        }

        loop {
            let pgrp = unistd::getpgrp();
            if unistd::tcgetpgrp(&self.terminal).context("tcgetpgrp failed")? == pgrp {
                break;
            }
            signal::killpg(pgrp, Signal::SIGTTIN).context("killpg failed")?;
        }

        // The shell itself must survive the terminal-generated signals it
        // hands over to its foreground children.
        unsafe {
            signal::signal(Signal::SIGINT, SigHandler::SigIgn)?;
            signal::signal(Signal::SIGQUIT, SigHandler::SigIgn)?;
            signal::signal(Signal::SIGTSTP, SigHandler::SigIgn)?;
            signal::signal(Signal::SIGTTIN, SigHandler::SigIgn)?;
            signal::signal(Signal::SIGTTOU, SigHandler::SigIgn)?;
        }

        let pgid = unistd::getpid();
        unistd::setpgid(pgid, pgid)
            .context("failed to put the shell into its own process group")?;
        unistd::tcsetpgrp(&self.terminal, pgid)
            .context("failed to claim the controlling terminal")?;
        self.saved_modes =
            Some(termios::tcgetattr(&self.terminal).context("failed to read terminal modes")?);
        self.pgid = Some(pgid);
        debug!(%pgid, "shell took terminal ownership");
        Ok(())
    }

    /// Hand the terminal's foreground slot back to the shell's own group.
    /// No-op unless the terminal was claimed.
    pub(crate) fn restore_terminal(&self) {
        if let Some(pgid) = self.pgid {
            let _ = unistd::tcsetpgrp(&self.terminal, pgid);
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
