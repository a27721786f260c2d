//! Command line construction.

use std::borrow::Cow;
use std::fmt;

/// A command line made of a trusted template and caller-supplied arguments.
///
/// The program and the trusted tokens come from static configuration. Caller
/// arguments are kept apart so they can be escaped individually when the line
/// is rendered, and are handed to the process as discrete argv entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    trusted: Vec<String>,
    args: Vec<String>,
}

impl CommandLine {
    /// Create a command line for the given executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            trusted: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Append trusted subcommand tokens (e.g. `["cloud", "push"]`).
    pub fn subcommand<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted.extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Append a trusted flag such as `--backtest-name`.
    pub fn flag(mut self, flag: &'static str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    /// Append a caller-influenced argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a flag followed by its caller-influenced value.
    pub fn option(self, flag: &'static str, value: impl Into<String>) -> Self {
        self.flag(flag).arg(value)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector passed to the process (trusted tokens first).
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        self.trusted
            .iter()
            .chain(self.args.iter())
            .map(String::as_str)
    }

    /// Render the shell-escaped command line.
    ///
    /// Every token is quoted on its own with `shlex`, so a project name such as
    /// `My Project; rm -rf ~` renders as a single quoted word.
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.argv())
            .map(|token| quote(token).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote(token: &str) -> Cow<'_, str> {
    // try_quote only rejects interior NUL bytes
    shlex::try_quote(token).unwrap_or_else(|_| {
        Cow::Owned(format!(
            "'{}'",
            token.replace('\0', "").replace('\'', "'\\''")
        ))
    })
}
