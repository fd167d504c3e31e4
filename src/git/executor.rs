use std::{path::PathBuf, process::Command};

use log::{debug, warn};
use thiserror::Error;

use super::command::GitCommand;

const DEFAULT_GIT_BINARY: &str = "git";

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Could not start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` failed with exit code {}: {stderr}", display_exit_code(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

fn display_exit_code(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Runs git commands on behalf of the synchronizer.
pub trait Executor {
    /// Runs `command` to completion and returns its standard output.
    fn run(&self, command: &GitCommand) -> Result<String, ExecutionError>;
}

/// Executes commands by spawning the git binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        GitCli {
            binary: binary.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli::new(DEFAULT_GIT_BINARY)
    }
}

impl Executor for GitCli {
    fn run(&self, command: &GitCommand) -> Result<String, ExecutionError> {
        debug!("Running {}", command);
        let output = Command::new(&self.binary)
            .args(command.to_args())
            .output()
            .map_err(|source| ExecutionError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            warn!("{} exited with {}: {}", command, output.status, stderr);
            Err(ExecutionError::Failed {
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr,
            })
        }
    }
}
