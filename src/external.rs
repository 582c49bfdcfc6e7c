//! Launching external programs with process-group and terminal discipline.

use std::io;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::{Pid, setpgid};
use tracing::debug;

use crate::session::Session;

/// Launch the external program named by `argv[0]`.
///
/// Foreground launches block until the child exits or stops and temporarily
/// hand it the controlling terminal; background launches return immediately
/// and are registered in the session's job table. An empty `argv` is a
/// silent no-op.
pub fn launch(session: &mut Session, argv: &[String], background: bool, out: &mut dyn Write) {
    let Some(program) = argv.first() else {
        return;
    };

    let mut command = Command::new(program);
    command.args(&argv[1..]);
    // Every child runs in its own process group, group id = child pid.
    command.process_group(0);

    if !background {
        let interactive = session.interactive;
        unsafe {
            command.pre_exec(move || prepare_foreground_child(interactive));
        }
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            // Covers failed process creation and failed exec alike; the
            // session is left unchanged, but the doomed child may already
            // have grabbed the terminal from its pre-exec hook.
            eprintln!("jsh: {program}: {err}");
            if !background {
                session.restore_terminal();
            }
            return;
        }
    };

    let pid = Pid::from_raw(child.id() as i32);
    // Other half of the double assignment; the child sets the same group
    // before exec, so an error here only means it already won the race.
    let _ = setpgid(pid, pid);

    if background {
        debug!(%pid, command = %program, "spawned background child");
        if let Some(job) = session.jobs.register(pid, program) {
            let _ = writeln!(out, "[{}] {} Running {} &", job.id, job.pid, job.command);
        }
        return;
    }

    debug!(%pid, command = %program, "waiting for foreground child");
    match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
        Ok(status) => debug!(?status, "foreground child finished"),
        Err(err) => eprintln!("jsh: waitpid: {err}"),
    }
    session.restore_terminal();
}

/// Runs in the child between fork and exec: take the terminal's foreground
/// slot when the session is interactive, and put the job-control signals
/// back to their default dispositions. Async-signal-safe libc calls only.
fn prepare_foreground_child(interactive: bool) -> io::Result<()> {
    use nix::libc;
    unsafe {
        if interactive {
            // Allowed from a background group because SIGTTOU is still
            // ignored here; errors are moot once exec happens.
            libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpid());
        }
        // The shell ignores these; a foreground child must not.
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGQUIT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGTTIN, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
    }
    Ok(())
}
