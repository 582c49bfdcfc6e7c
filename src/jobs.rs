//! The background-job table.

use std::io::{self, Write};

use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::debug;

/// Upper bound on the number of background jobs tracked at once.
///
/// Registrations past this point are dropped: the process still runs, it
/// just never shows up in `jobs` output.
pub const MAX_JOBS: usize = 16;

/// One background process tracked by the shell.
#[derive(Debug, Clone)]
pub struct Job {
    /// 1-based id, assigned sequentially and never reused within a run.
    pub id: u32,
    pub pid: Pid,
    /// Owned copy of the command name (argument 0).
    pub command: String,
    active: bool,
    finished: bool,
}

impl Job {
    /// True while no poll has observed the process exit.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once a poll has observed the process exit.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn state_label(&self) -> &'static str {
        if self.active { "Running" } else { "Done" }
    }
}

/// Bounded registry of background jobs.
///
/// Entries are appended by the launcher and flipped to finished by
/// [`JobTable::poll`]; they are never removed, so job ids stay unique for
/// the life of the session. The owned command labels are released when the
/// table is dropped at session end.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::with_capacity(MAX_JOBS),
        }
    }

    /// Track a newly launched background process.
    ///
    /// Returns the new entry, or `None` when the table is full and the
    /// registration was dropped.
    pub fn register(&mut self, pid: Pid, command: &str) -> Option<&Job> {
        if self.jobs.len() >= MAX_JOBS {
            debug!(%pid, command, "job table full, dropping registration");
            return None;
        }
        let id = self.jobs.len() as u32 + 1;
        self.jobs.push(Job {
            id,
            pid,
            command: command.to_owned(),
            active: true,
            finished: false,
        });
        debug!(id, %pid, command, "registered background job");
        self.jobs.last()
    }

    /// Check every still-active entry for completion without blocking.
    ///
    /// Queries each pid individually so the statuses of children this table
    /// does not own are left alone. Finished entries are not re-queried.
    pub fn poll(&mut self) {
        for job in self.jobs.iter_mut().filter(|job| job.active) {
            match waitpid(job.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(status) => {
                    debug!(id = job.id, pid = %job.pid, ?status, "background job finished");
                    job.active = false;
                    job.finished = true;
                }
                Err(err) => {
                    debug!(id = job.id, pid = %job.pid, %err, "waitpid failed");
                }
            }
        }
    }

    /// Render every entry with its current state.
    pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        for job in &self.jobs {
            writeln!(
                out,
                "[{}] {} {} {} &",
                job.id,
                job.pid,
                job.state_label(),
                job.command
            )?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::{Duration, Instant};

    /// Pids far above anything the test process will spawn.
    fn fake_pid(n: i32) -> Pid {
        Pid::from_raw(400_000 + n)
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut table = JobTable::new();
        let first = table.register(fake_pid(1), "sleep").unwrap().id;
        let second = table.register(fake_pid(2), "cat").unwrap().id;
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn register_keeps_an_owned_label_and_starts_active() {
        let mut table = JobTable::new();
        let job = table.register(fake_pid(7), "sleep").unwrap();
        assert_eq!(job.command, "sleep");
        assert!(job.is_active());
        assert!(!job.is_finished());
    }

    #[test]
    fn registration_past_capacity_is_dropped() {
        let mut table = JobTable::new();
        for i in 0..MAX_JOBS {
            assert!(table.register(fake_pid(i as i32), "sleep").is_some());
        }
        assert!(table.register(fake_pid(999), "sleep").is_none());
        assert_eq!(table.len(), MAX_JOBS);
    }

    #[test]
    fn poll_flips_exited_jobs_to_done() {
        let mut table = JobTable::new();
        let child = Command::new("true").spawn().expect("spawn true");
        let pid = Pid::from_raw(child.id() as i32);
        table.register(pid, "true").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while table.iter().any(|job| job.is_active()) {
            assert!(Instant::now() < deadline, "child never observed as exited");
            table.poll();
            std::thread::sleep(Duration::from_millis(10));
        }

        let job = table.iter().next().unwrap();
        assert!(job.is_finished());
        assert!(!job.is_active());

        // finished entries stay finished across further polls
        table.poll();
        assert!(table.iter().next().unwrap().is_finished());
    }

    #[test]
    fn list_renders_state_and_label() {
        let mut table = JobTable::new();
        table.register(fake_pid(42), "ping").unwrap();
        let mut out = Vec::new();
        table.list(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.starts_with("[1] "));
        assert!(rendered.contains("Running ping &"));
    }
}
