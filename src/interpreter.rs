use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::builtin::{Cd, Exit, History, Jobs, Pwd};
use crate::command::CommandFactory;
use crate::external;
use crate::lexer;
use crate::session::Session;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate — the builtins.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The interactive shell: reads lines, runs builtins in-process and launches
/// everything else as an external program, foreground or background.
///
/// The interpreter owns a [`Session`] and a list of [`CommandFactory`]
/// objects that are queried to create builtins by name. See [`Default`] for
/// the factories included out of the box.
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            session: Session::new(),
            commands,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the read/dispatch/launch loop until end of input or `exit`.
    ///
    /// Claims the controlling terminal first when the session is
    /// interactive. Returns when the line source reports end of input;
    /// the `exit` builtin terminates the process directly.
    pub fn repl(&mut self) -> Result<()> {
        self.session.claim_terminal()?;

        let mut rl = DefaultEditor::new()?;
        let mut stdout = io::stdout();
        let prompt = self.session.prompt.clone();

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.session.jobs.poll();
                    rl.add_history_entry(line)?;
                    self.session.history.push(line.to_owned());
                    self.run_line(line, &mut stdout)?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Process one already-trimmed input line: detect the background
    /// marker, tokenize, try the builtins, otherwise launch an external
    /// program.
    pub fn run_line(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        let (line, background) = lexer::strip_background(line);
        let Some(argv) = lexer::split_into_args(line) else {
            return Ok(());
        };
        if !self.dispatch_builtin(&argv, out) {
            external::launch(&mut self.session, &argv, background, out);
        }
        Ok(())
    }

    /// Try the line as a builtin and report whether it was handled.
    ///
    /// A builtin that fails at runtime reports its error and is still left
    /// unhandled, so the line falls through to the launcher and fails a
    /// second time there with the launcher's own message.
    fn dispatch_builtin(&mut self, argv: &[String], out: &mut dyn Write) -> bool {
        let name = argv[0].as_str();
        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
        for factory in &self.commands {
            if let Some(command) = factory.try_create(name, &args) {
                debug!(command = name, "dispatching builtin");
                return match command.execute(out, &mut self.session) {
                    Ok(_) => true,
                    Err(err) => {
                        let _ = writeln!(out, "{err:#}");
                        false
                    }
                };
            }
        }
        false
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the standard builtins:
    /// `exit`, `cd`, `pwd`, `history` and `jobs`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<History>::default()),
            Box::new(Factory::<Jobs>::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::lock_current_dir;
    use nix::sys::signal::{Signal, kill};
    use std::fs;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    fn poll_until_all_done(interp: &mut Interpreter, deadline: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            interp.session.jobs.poll();
            if interp.session.jobs.iter().all(|job| job.is_finished()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn blank_line_is_a_no_op() {
        let mut interp = Interpreter::default();
        let mut out = Vec::new();
        interp.run_line("   ", &mut out).unwrap();
        assert!(out.is_empty());
        assert!(interp.session.jobs.is_empty());
    }

    #[test]
    fn builtin_wins_over_external_lookup() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let temp = std::env::temp_dir().join(format!("jsh_dispatch_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&temp).unwrap();
        let canonical = fs::canonicalize(&temp).unwrap();

        let mut interp = Interpreter::default();
        let mut out = Vec::new();
        interp
            .run_line(&format!("cd {}", canonical.display()), &mut out)
            .unwrap();

        // only the builtin can change this process's working directory
        assert_eq!(
            fs::canonicalize(std::env::current_dir().unwrap()).unwrap(),
            canonical
        );
        assert!(interp.session.jobs.is_empty());

        std::env::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn failed_cd_reports_and_keeps_cwd() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();

        let mut interp = Interpreter::default();
        let mut out = Vec::new();
        interp
            .run_line(&format!("cd /jsh_nonexistent_{}", std::process::id()), &mut out)
            .unwrap();

        assert!(String::from_utf8(out).unwrap().contains("cd"));
        assert_eq!(std::env::current_dir().unwrap(), orig);
        assert!(interp.session.jobs.is_empty());
    }

    #[test]
    fn foreground_launch_blocks_until_the_child_exits() {
        let mut interp = Interpreter::default();
        let mut out = Vec::new();

        let start = Instant::now();
        interp.run_line("sleep 1", &mut out).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(900));
        assert!(interp.session.jobs.is_empty());
    }

    #[test]
    fn background_launch_registers_and_returns_immediately() {
        let mut interp = Interpreter::default();
        let mut out = Vec::new();

        let start = Instant::now();
        interp.run_line("sleep 30 &", &mut out).unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));

        let announcement = String::from_utf8(out).unwrap();
        assert!(announcement.contains("Running sleep &"));

        let job = interp.session.jobs.iter().next().expect("job registered");
        assert_eq!(job.id, 1);
        assert_eq!(job.command, "sleep");
        assert!(job.is_active());
        let pid = job.pid;

        let mut listing = Vec::new();
        interp.run_line("jobs", &mut listing).unwrap();
        assert!(String::from_utf8(listing).unwrap().contains("Running sleep &"));

        kill(pid, Signal::SIGKILL).unwrap();
        assert!(poll_until_all_done(&mut interp, Duration::from_secs(5)));

        let mut listing = Vec::new();
        interp.run_line("jobs", &mut listing).unwrap();
        assert!(String::from_utf8(listing).unwrap().contains("Done sleep &"));
    }

    #[test]
    fn unknown_command_leaves_the_session_intact() {
        let mut interp = Interpreter::default();
        let mut out = Vec::new();
        interp
            .run_line("jsh-no-such-program-on-any-path", &mut out)
            .unwrap();
        assert!(interp.session.jobs.is_empty());
        assert!(interp.session.history.is_empty());
    }
}
