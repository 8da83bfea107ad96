//! Runs the external engine program.
//!
//! The engine executes in its own computer process. It receives a complete
//! command script on its standard input channel, and as a side effect of the
//! `export-stats` commands it writes statistics files to disk. Its standard
//! output is forwarded to the log at debug level and its standard error
//! channel is inherited from this process.

use crate::command::CommandScript;
use crate::error::{Error, ExitCause, Result};
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often to check on an engine which has a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Command line invocation of the engine, plus how long to wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Engine {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().into(),
            args: vec![],
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the engine from this working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().into());
        self
    }

    /// Kill the engine if a single invocation runs longer than this.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one engine process to completion on the given script.
    ///
    /// Writes the whole script to the engine's stdin, closes it, and blocks
    /// until the process exits and its output is drained. With a timeout the
    /// whole call returns shortly after the deadline, even if the engine left
    /// other processes holding its pipes. Does not check which of the script's
    /// exports were actually written, and never retries.
    pub fn run(&self, script: &CommandScript) -> Result<()> {
        let started = Instant::now();
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::inherit());
        let mut child = command.spawn().map_err(|source| Error::EngineLaunch {
            program: self.program.clone(),
            source,
        })?;
        tracing::debug!("started engine {:?} (pid {}) with {} commands", self.program, child.id(), script.len());

        let writer = child.stdin.take().map(|stdin| {
            let script = script.clone();
            thread::spawn(move || {
                let mut stdin = BufWriter::new(stdin);
                script.write(&mut stdin)
                // Dropping the writer closes the engine's stdin.
            })
        });
        let reader = child.stdout.take().map(|stdout| {
            let pid = child.id();
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    match line {
                        Ok(line) => tracing::debug!("engine {pid}: {line}"),
                        Err(_) => break,
                    }
                }
            })
        });

        let status = self.wait(&mut child, started)?;

        // Processes which the engine left behind may still hold its pipes open,
        // so the I/O threads are only waited on until the deadline.
        let deadline = self.timeout.map(|timeout| started + timeout);
        if let Some(writer) = writer {
            match join_until(writer, deadline) {
                Some(Ok(())) => {}
                Some(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::warn!("engine {:?} stopped reading its commands early", self.program);
                }
                Some(Err(err)) => tracing::warn!("failed to send commands to engine {:?}: {err}", self.program),
                None => tracing::warn!("abandoned the command writer of engine {:?}", self.program),
            }
        }
        if let Some(reader) = reader {
            if join_until(reader, deadline).is_none() {
                tracing::warn!("abandoned the output of engine {:?}, its pipe is still open", self.program);
            }
        }

        tracing::debug!("engine {:?} finished in {:?} with {status}", self.program, started.elapsed());
        match status.code() {
            _ if status.success() => Ok(()),
            Some(code) => Err(self.exit_error(ExitCause::Code(code))),
            None => Err(self.exit_error(ExitCause::Signal)),
        }
    }

    fn wait(&self, child: &mut Child, started: Instant) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                tracing::warn!("engine {:?} timed out after {timeout:?}, killing it", self.program);
                // The process may have exited between the two checks.
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.exit_error(ExitCause::Timeout(timeout)));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn exit_error(&self, cause: ExitCause) -> Error {
        Error::EngineExit {
            program: self.program.clone(),
            cause,
        }
    }
}

/// Join a thread, or give up on it at the deadline and leave it detached.
///
/// Returns None if the thread panicked or missed the deadline.
fn join_until<T>(handle: JoinHandle<T>, deadline: Option<Instant>) -> Option<T> {
    if let Some(deadline) = deadline {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
    handle.join().ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::command::Command as EngineCommand;

    fn script(text: &str) -> CommandScript {
        CommandScript::read(&mut text.as_bytes()).unwrap()
    }

    #[test]
    fn missing_program() {
        let engine = Engine::new("/nonexistent/engine/binary");
        match engine.run(&script("exit\n")) {
            Err(Error::EngineLaunch { program, .. }) => assert_eq!(program, Path::new("/nonexistent/engine/binary")),
            other => panic!("expected EngineLaunch, got {other:?}"),
        }
    }

    #[test]
    fn clean_exit() {
        Engine::new("cat").run(&script("goal print1\nnext 20\nexit\n")).unwrap();
    }

    #[test]
    fn nonzero_exit_code() {
        let engine = Engine::new("sh").args(["-c", "cat > /dev/null; exit 3"]);
        match engine.run(&script("new\nexit\n")) {
            Err(Error::EngineExit { cause, .. }) => assert_eq!(cause, ExitCause::Code(3)),
            other => panic!("expected EngineExit, got {other:?}"),
        }
    }

    /// An engine which dies without reading its input is reported by its exit
    /// status, not as a write error.
    #[test]
    fn exits_without_reading() {
        let long: Vec<_> = (0..100_000).map(|_| EngineCommand::Next(1)).collect();
        let engine = Engine::new("sh").args(["-c", "exit 5"]);
        match engine.run(&CommandScript::new(long)) {
            Err(Error::EngineExit { cause, .. }) => assert_eq!(cause, ExitCause::Code(5)),
            other => panic!("expected EngineExit, got {other:?}"),
        }
    }

    #[test]
    fn timeout_kills_engine() {
        let engine = Engine::new("sleep").arg("10").timeout(Duration::from_millis(100));
        let started = Instant::now();
        match engine.run(&script("exit\n")) {
            Err(Error::EngineExit { cause, .. }) => assert_eq!(cause, ExitCause::Timeout(Duration::from_millis(100))),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    /// A wrapper script leaves a grandchild holding the engine's pipes.
    #[test]
    fn timeout_with_lingering_grandchild() {
        let engine = Engine::new("sh")
            .args(["-c", "sleep 4; true"])
            .timeout(Duration::from_millis(100));
        let started = Instant::now();
        match engine.run(&script("exit\n")) {
            Err(Error::EngineExit { cause, .. }) => assert_eq!(cause, ExitCause::Timeout(Duration::from_millis(100))),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn clean_exit_with_background_grandchild() {
        let engine = Engine::new("sh")
            .args(["-c", "cat > /dev/null; sleep 4 & exit 0"])
            .timeout(Duration::from_millis(300));
        let started = Instant::now();
        engine.run(&script("exit\n")).unwrap();
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new("sh")
            .args(["-c", "cat > received.txt"])
            .current_dir(dir.path());
        engine.run(&script("optmem true\ngoal print1\n")).unwrap();
        let received = std::fs::read_to_string(dir.path().join("received.txt")).unwrap();
        assert_eq!(received, "optmem true\ngoal print1\n");
    }
}
