//! Helper program lookup and spawning.
//!
//! Strategies never run vendor tools directly. They ask the [`ProcessRunner`]
//! in their [`FetchContext`](crate::FetchContext) whether a tool is installed
//! and have it spawn the tool, so tests and alternative hosts can substitute
//! the search path.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// Looks up and spawns helper programs.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    search_path: Option<OsString>,
}

impl ProcessRunner {
    /// Runner that searches the process `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that searches `path` (a `PATH`-style list) instead.
    pub fn with_search_path(path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(path.into()),
        }
    }

    /// Finds the full path to a command.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(cmd, Some(paths), cwd)
            }
            None => which::which(cmd),
        };
        found.ok()
    }

    /// Returns true if the command can be found.
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Starts `cmd` with no stdio attached.
    ///
    /// The child is killed when the returned handle is dropped, so callers
    /// that give up early never leave the helper running.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NotFound` if the command is missing, or an IO
    /// error if it cannot be started.
    #[instrument(skip(self, args), fields(cmd = %cmd))]
    pub fn spawn<I, S>(&self, cmd: &str, args: I) -> Result<Child, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let path = self.which(cmd).ok_or_else(|| {
            warn!("Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        let child = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        debug!(path = %path.display(), pid = ?child.id(), "Spawned");
        Ok(child)
    }
}

// ============================================================================
// Tests
// ============================================================================
