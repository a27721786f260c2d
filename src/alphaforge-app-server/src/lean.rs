//! LEAN CLI operations used by the tools.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alphaforge_exec::{CommandLine, CommandResult, CommandRunner};
use serde::{Deserialize, Serialize};

/// Language of a newly created project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectLanguage {
    #[default]
    Python,
    Csharp,
}

impl ProjectLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Csharp => "csharp",
        }
    }
}

impl fmt::Display for ProjectLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "csharp" | "c#" | "cs" => Ok(Self::Csharp),
            other => Err(format!(
                "Unsupported project language '{other}' (expected python or csharp)"
            )),
        }
    }
}

/// Client for the LEAN CLI.
///
/// Every method issues exactly one external call. Subcommand tokens are
/// fixed here; only project names, run names and IDs come from callers.
#[derive(Clone)]
pub struct LeanClient {
    executable: String,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for LeanClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeanClient")
            .field("executable", &self.executable)
            .finish()
    }
}

impl LeanClient {
    pub fn new(executable: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            executable: executable.into(),
            runner,
        }
    }

    fn command<const N: usize>(&self, subcommand: [&str; N]) -> CommandLine {
        CommandLine::new(&self.executable).subcommand(subcommand)
    }

    /// Synchronize the local project to the cloud.
    pub async fn push(&self, project: &str) -> CommandResult {
        let command = self.command(["cloud", "push"]).arg(project);
        self.runner.execute(&command).await
    }

    /// Start a cloud backtest, optionally naming the run.
    pub async fn submit_backtest(&self, project: &str, name: Option<&str>) -> CommandResult {
        let mut command = self.command(["cloud", "backtest"]).arg(project);
        if let Some(name) = name {
            command = command.option("--backtest-name", name);
        }
        self.runner.execute(&command).await
    }

    pub async fn project_status(&self, project: &str) -> CommandResult {
        let command = self.command(["cloud", "status"]).arg(project);
        self.runner.execute(&command).await
    }

    pub async fn backtest_status(&self, project: &str, backtest_id: &str) -> CommandResult {
        let command = self
            .command(["cloud", "status"])
            .arg(project)
            .option("--backtest-id", backtest_id);
        self.runner.execute(&command).await
    }

    pub async fn create_project(&self, name: &str, language: ProjectLanguage) -> CommandResult {
        let command = self
            .command(["project-create"])
            .arg(name)
            .option("--language", language.as_str());
        self.runner.execute(&command).await
    }

    /// Run a local backtest of the named algorithm.
    pub async fn backtest(&self, algorithm: &str) -> CommandResult {
        let command = self.command(["backtest"]).arg(algorithm);
        self.runner.execute(&command).await
    }
}
