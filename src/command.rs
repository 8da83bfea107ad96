//! The engine's command language.
//!
//! The engine reads one command per line from its standard input channel.
//! The language is small and fixed, so it is modeled as a closed enum which
//! formats itself as exactly one line of text and parses back from it.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One line of the engine's command protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Toggle the memory optimization mode.
    OptMem(bool),

    /// Select the fitness target.
    Goal(String),

    /// Start a fresh run, optionally with an explicit population size.
    New(Option<u64>),

    /// Set the mutation rate, in percent.
    Mut(f64),

    /// Advance the current run by this many generations.
    Next(u64),

    /// Write the current run's statistics to the given file.
    ExportStats(PathBuf),

    /// Terminate the engine process.
    Exit,
}

impl Command {
    /// Format this command and write it to the given stream.
    pub fn write(&self, writer: &mut impl Write) -> Result<(), io::Error> {
        writeln!(writer, "{self}")
    }

    /// Parse the next command from the given input stream. Blocking.
    ///
    /// Blank lines are skipped. Returns `None` at the end of the stream.
    pub fn read(reader: &mut impl BufRead) -> Result<Option<Command>, io::Error> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        line.parse()
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Is this a single generation advance?
    pub fn is_single_step(&self) -> bool {
        matches!(self, Command::Next(1))
    }

    /// The export path, if this is an export command.
    pub fn export_path(&self) -> Option<&Path> {
        match self {
            Command::ExportStats(path) => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::OptMem(enabled) => write!(f, "optmem {enabled}"),
            Command::Goal(goal) => write!(f, "goal {goal}"),
            Command::New(None) => write!(f, "new"),
            Command::New(Some(size)) => write!(f, "new {size}"),
            Command::Mut(percent) => write!(f, "mut {percent}"),
            Command::Next(1) => write!(f, "next"),
            Command::Next(count) => write!(f, "next {count}"),
            Command::ExportStats(path) => write!(f, "export-stats {}", path.display()),
            Command::Exit => write!(f, "exit"),
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (line, None),
        };
        let number = |arg: &str| arg.parse::<u64>().map_err(|err| format!("bad argument to \"{name}\": {err}"));
        match (name, arg) {
            ("optmem", Some(arg)) => match arg {
                "true" => Ok(Command::OptMem(true)),
                "false" => Ok(Command::OptMem(false)),
                _ => Err(format!("expected either \"true\" or \"false\", got \"{arg}\"")),
            },
            ("goal", Some(goal)) => Ok(Command::Goal(goal.to_string())),
            ("new", None) => Ok(Command::New(None)),
            ("new", Some(size)) => Ok(Command::New(Some(number(size)?))),
            ("mut", Some(percent)) => percent
                .parse()
                .map(Command::Mut)
                .map_err(|err| format!("bad argument to \"mut\": {err}")),
            ("next", None) => Ok(Command::Next(1)),
            ("next", Some(count)) => Ok(Command::Next(number(count)?)),
            ("export-stats", Some(path)) => Ok(Command::ExportStats(path.into())),
            ("exit", None) => Ok(Command::Exit),
            ("optmem" | "goal" | "mut" | "export-stats", None) => Err(format!("missing argument to \"{name}\"")),
            ("exit", Some(_)) => Err("unexpected argument to \"exit\"".to_string()),
            _ => Err(format!("unknown command \"{line}\"")),
        }
    }
}

/// An ordered, immutable sequence of commands for one engine invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandScript {
    commands: Vec<Command>,
}

impl CommandScript {
    pub(crate) fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All of the files which this script asks the engine to export, in order.
    pub fn export_paths(&self) -> impl Iterator<Item = &Path> {
        self.commands.iter().filter_map(Command::export_path)
    }

    /// Write the entire script to the given stream, one command per line.
    pub fn write(&self, writer: &mut impl Write) -> Result<(), io::Error> {
        for command in &self.commands {
            command.write(writer)?;
        }
        writer.flush()
    }

    /// Parse a script, one command per line.
    pub fn read(reader: &mut impl BufRead) -> Result<Self, io::Error> {
        let mut commands = vec![];
        while let Some(command) = Command::read(reader)? {
            commands.push(command);
        }
        Ok(Self { commands })
    }
}

impl std::fmt::Display for CommandScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for command in &self.commands {
            writeln!(f, "{command}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrip() {
        let test_messages = [
            Command::OptMem(true),
            Command::OptMem(false),
            Command::Goal("hello-world".to_string()),
            Command::Goal("print1".to_string()),
            Command::New(None),
            Command::New(Some(0)),
            Command::New(Some(2500)),
            Command::Mut(25.0),
            Command::Mut(12.5),
            Command::Mut(0.0),
            Command::Next(1),
            Command::Next(0),
            Command::Next(50),
            Command::Next(u64::MAX),
            Command::ExportStats(PathBuf::from("./data/adjusted-0-17.json")),
            Command::ExportStats(PathBuf::from("/tmp/trial-3-size500-mut25.json")),
            Command::Exit,
        ];
        for original in test_messages {
            let mut message = vec![];
            original.write(&mut message).unwrap();
            assert_eq!(message.iter().filter(|&&byte| byte == b'\n').count(), 1);
            let returned = Command::read(&mut message.as_slice()).unwrap();
            assert_eq!(Some(original), returned);
        }
    }

    /// Check that the lines being sent to the engine are exactly as expected.
    #[test]
    fn send_string() {
        assert_eq!(Command::OptMem(true).to_string(), "optmem true");
        assert_eq!(Command::Goal("print1".into()).to_string(), "goal print1");
        assert_eq!(Command::New(None).to_string(), "new");
        assert_eq!(Command::New(Some(500)).to_string(), "new 500");
        assert_eq!(Command::Mut(40.0).to_string(), "mut 40");
        assert_eq!(Command::Next(1).to_string(), "next");
        assert_eq!(Command::Next(50).to_string(), "next 50");
        assert_eq!(
            Command::ExportStats("data/trial-0.json".into()).to_string(),
            "export-stats data/trial-0.json"
        );
        assert_eq!(Command::Exit.to_string(), "exit");
    }

    #[test]
    fn parse_errors() {
        for bad in ["", "bogus", "optmem", "optmem yes", "goal", "new abc", "mut", "next -1", "exit now"] {
            assert!(bad.parse::<Command>().is_err(), "{bad:?}");
        }
        assert_eq!("  next   7  ".parse::<Command>(), Ok(Command::Next(7)));
    }

    #[test]
    fn script_roundtrip() {
        let text = "optmem true\ngoal print1\n\nnew 500\nmut 25\nnext 50\nexport-stats d/x.json\nexit\n";
        let script = CommandScript::read(&mut text.as_bytes()).unwrap();
        assert_eq!(script.len(), 7);
        assert_eq!(script.to_string(), text.replace("\n\n", "\n"));
        assert_eq!(script.export_paths().collect::<Vec<_>>(), [Path::new("d/x.json")]);
    }
}
