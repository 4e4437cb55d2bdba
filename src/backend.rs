// Invocation of the iproute2 `ip` binary

use std::fmt;
use std::process::Command;

use crate::error::{IpError, IpResult};

/// Protocol family selector passed as a global flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// No family flag.
    Any,
    /// `-0`, link layer only.
    Link,
    /// `-4`
    V4,
    /// `-6`
    V6,
}

impl Family {
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Family::Any => None,
            Family::Link => Some("-0"),
            Family::V4 => Some("-4"),
            Family::V6 => Some("-6"),
        }
    }
}

/// The `ip` object a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Object {
    Link,
    Addr,
    Neigh,
    Route,
    Rule,
}

impl Object {
    pub fn as_str(self) -> &'static str {
        match self {
            Object::Link => "link",
            Object::Addr => "addr",
            Object::Neigh => "neigh",
            Object::Route => "route",
            Object::Rule => "rule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Show,
    Add,
    Change,
    Replace,
    Delete,
    Flush,
    Set,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Show => "show",
            Verb::Add => "add",
            Verb::Change => "change",
            Verb::Replace => "replace",
            Verb::Delete => "del",
            Verb::Flush => "flush",
            Verb::Set => "set",
        }
    }

    /// Whether running this verb can change kernel state.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Verb::Show)
    }
}

/// One `ip` command line, minus the program name and global output flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub family: Family,
    pub object: Object,
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(family: Family, object: Object, verb: Verb, args: Vec<String>) -> Self {
        Invocation {
            family,
            object,
            verb,
            args,
        }
    }

    /// Full argument vector handed to the program.
    pub fn argv(&self, oneline: bool) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        if oneline {
            argv.push("-o".to_string());
        }
        if let Some(flag) = self.family.flag() {
            argv.push(flag.to_string());
        }
        argv.push(self.object.as_str().to_string());
        argv.push(self.verb.as_str().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv(false).join(" "))
    }
}

/// Executes `ip` commands on behalf of the record kinds.
pub trait Backend {
    /// Run a query and return its output, one record per line.
    fn show(&self, invocation: &Invocation) -> IpResult<Vec<String>>;

    /// Run a mutation; a non-zero exit is an error.
    fn execute(&self, invocation: &Invocation) -> IpResult<()>;
}

/// Backend that spawns the `ip` binary.
#[derive(Debug, Clone)]
pub struct IpCommand {
    program: String,
    oneline: bool,
}

impl Default for IpCommand {
    fn default() -> Self {
        IpCommand::new("ip")
    }
}

impl IpCommand {
    pub fn new(program: impl Into<String>) -> Self {
        IpCommand {
            program: program.into(),
            oneline: true,
        }
    }

    /// Toggle `-o`; record patterns expect one-line output.
    pub fn with_oneline(mut self, oneline: bool) -> Self {
        self.oneline = oneline;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, invocation: &Invocation) -> IpResult<String> {
        let argv = invocation.argv(self.oneline);
        let command = format!("{} {}", self.program, argv.join(" "));
        tracing::debug!(command = %command, "Executing ip command");

        let output = Command::new(&self.program)
            .args(&argv)
            .output()
            .map_err(|e| IpError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                command = %command,
                exit_code = exit_code,
                stderr = %stderr,
                "Command failed"
            );
            return Err(IpError::ExternalProcess {
                command,
                exit_code,
                output: stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Backend for IpCommand {
    fn show(&self, invocation: &Invocation) -> IpResult<Vec<String>> {
        let stdout = self.run(invocation)?;
        Ok(split_lines(&stdout))
    }

    fn execute(&self, invocation: &Invocation) -> IpResult<()> {
        self.run(invocation).map(|_| ())
    }
}

fn split_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
