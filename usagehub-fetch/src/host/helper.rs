//! Credential refresh by running an external helper program.
//!
//! Some credentials can only be re-established by a vendor tool (for example
//! the `claude` CLI rewriting `~/.claude/.credentials.json`). The helper may
//! keep running long after it has done its job, so instead of waiting for it
//! to exit we poll the watched file and stop the helper as soon as the file
//! changes.
//!
//! The lifecycle is an explicit state machine:
//!
//! ```text
//! Waiting ──changed──▶ Observed ──▶ Cleanup
//!    │ ──deadline──▶ TimedOut ──▶ Cleanup
//!    └ ──cancel────▶ Cancelled ─▶ Cleanup
//! ```
//!
//! Cleanup always kills the child if it is still alive.
//!
//! A helper that rewrites the file in place can be caught mid-write. When a
//! readiness check is set, a change only counts once the contents pass it.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::process::Child;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ProcessError;
use crate::host::process::ProcessRunner;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default overall bound on a helper run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long Cleanup waits for a killed child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// State Machine
// ============================================================================

/// State of a helper refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Helper running, watched file unchanged.
    Waiting,
    /// The watched file changed.
    Observed,
    /// The deadline passed without a change.
    TimedOut,
    /// The refresh was cancelled.
    Cancelled,
    /// The helper has been stopped.
    Cleanup,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// A poll found the file changed.
    Changed,
    /// A poll found the file unchanged.
    Unchanged,
    /// The deadline elapsed.
    Deadline,
    /// The cancellation token fired.
    Cancel,
    /// The child has been stopped.
    Stopped,
}

impl RefreshState {
    /// Applies one event.
    #[must_use]
    pub fn next(self, event: RefreshEvent) -> Self {
        match (self, event) {
            (Self::Waiting, RefreshEvent::Changed) => Self::Observed,
            (Self::Waiting, RefreshEvent::Deadline) => Self::TimedOut,
            (Self::Waiting, RefreshEvent::Cancel) => Self::Cancelled,
            (Self::Waiting, _) => Self::Waiting,
            (Self::Observed | Self::TimedOut | Self::Cancelled, RefreshEvent::Stopped) | (Self::Cleanup, _) => {
                Self::Cleanup
            }
            (terminal, _) => terminal,
        }
    }

    /// The outcome this state settles on, once it has left `Waiting`.
    pub fn outcome(self) -> Option<RefreshOutcome> {
        match self {
            Self::Observed => Some(RefreshOutcome::Observed),
            Self::TimedOut => Some(RefreshOutcome::TimedOut),
            Self::Cancelled => Some(RefreshOutcome::Cancelled),
            Self::Waiting | Self::Cleanup => None,
        }
    }
}

/// How a helper refresh ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The watched file changed; re-read it.
    Observed,
    /// Nothing changed before the deadline.
    TimedOut,
    /// The surrounding refresh was cancelled.
    Cancelled,
}

// ============================================================================
// File Fingerprint
// ============================================================================

/// Identity of a file's contents at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    hash: u64,
}

async fn read_watched(path: &Path) -> Option<(Fingerprint, Vec<u8>)> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let contents = tokio::fs::read(path).await.ok()?;
    let mut hasher = DefaultHasher::new();
    contents.hash(&mut hasher);
    let fingerprint = Fingerprint {
        modified: metadata.modified().ok(),
        len: metadata.len(),
        hash: hasher.finish(),
    };
    Some((fingerprint, contents))
}

async fn fingerprint(path: &Path) -> Option<Fingerprint> {
    read_watched(path).await.map(|(fingerprint, _)| fingerprint)
}

/// Checks whether the watched file's contents are complete.
pub type ReadyCheck = fn(&[u8]) -> bool;

// ============================================================================
// Helper Refresh
// ============================================================================

/// A bounded poll-then-kill run of a helper program.
#[derive(Debug, Clone)]
pub struct HelperRefresh {
    program: String,
    args: Vec<String>,
    watched: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
    ready: Option<ReadyCheck>,
}

impl HelperRefresh {
    /// Creates a refresh that runs `program` and watches `watched`.
    pub fn new(program: impl Into<String>, watched: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            watched: watched.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            ready: None,
        }
    }

    /// Appends arguments for the helper.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the overall timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Only count a change once `check` accepts the new contents.
    #[must_use]
    pub fn ready_when(mut self, check: ReadyCheck) -> Self {
        self.ready = Some(check);
        self
    }

    /// Runs the helper until the watched file changes, the timeout passes,
    /// or `cancel` fires. The helper is stopped before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the helper cannot be found or spawned.
    #[instrument(skip(self, runner, cancel), fields(program = %self.program, watched = %self.watched.display()))]
    pub async fn run(
        &self,
        runner: &ProcessRunner,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, ProcessError> {
        let baseline = fingerprint(&self.watched).await;
        let mut child = runner.spawn(&self.program, &self.args)?;

        let deadline = Instant::now() + self.timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = RefreshState::Waiting;
        let outcome = loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => RefreshEvent::Cancel,
                () = tokio::time::sleep_until(deadline) => RefreshEvent::Deadline,
                _ = ticker.tick() => self.poll(baseline.as_ref()).await,
            };
            state = state.next(event);
            if let Some(outcome) = state.outcome() {
                break outcome;
            }
        };

        stop(&mut child).await;
        state = state.next(RefreshEvent::Stopped);
        debug!(?state, "Helper stopped");

        match outcome {
            RefreshOutcome::Observed => info!("Helper refreshed credentials"),
            RefreshOutcome::TimedOut => warn!(timeout = ?self.timeout, "Helper did not refresh credentials in time"),
            RefreshOutcome::Cancelled => debug!("Helper refresh cancelled"),
        }
        Ok(outcome)
    }

    async fn poll(&self, baseline: Option<&Fingerprint>) -> RefreshEvent {
        let Some((current, contents)) = read_watched(&self.watched).await else {
            return RefreshEvent::Unchanged;
        };
        if Some(&current) == baseline {
            return RefreshEvent::Unchanged;
        }
        match self.ready {
            Some(check) if !check(&contents) => {
                debug!(len = contents.len(), "Watched file changed but is not ready yet");
                RefreshEvent::Unchanged
            }
            _ => RefreshEvent::Changed,
        }
    }
}

async fn stop(child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to kill helper");
        return;
    }
    if tokio::time::timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
        warn!("Helper did not exit after kill");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_transitions() {
        let waiting = RefreshState::Waiting;
        assert_eq!(waiting.next(RefreshEvent::Unchanged), RefreshState::Waiting);
        assert_eq!(waiting.next(RefreshEvent::Changed), RefreshState::Observed);
        assert_eq!(waiting.next(RefreshEvent::Deadline), RefreshState::TimedOut);
        assert_eq!(waiting.next(RefreshEvent::Cancel), RefreshState::Cancelled);
        assert!(waiting.outcome().is_none());
    }

    #[test]
    fn test_settled_states_only_move_to_cleanup() {
        for state in [RefreshState::Observed, RefreshState::TimedOut, RefreshState::Cancelled] {
            assert_eq!(state.next(RefreshEvent::Changed), state);
            assert_eq!(state.next(RefreshEvent::Cancel), state);
            assert_eq!(state.next(RefreshEvent::Stopped), RefreshState::Cleanup);
            assert!(state.outcome().is_some());
        }
        assert_eq!(RefreshState::Cleanup.next(RefreshEvent::Changed), RefreshState::Cleanup);
        assert!(RefreshState::Cleanup.outcome().is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_detects_rewrite_with_same_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "aaaa").unwrap();
        let before = fingerprint(&path).await;

        std::fs::write(&path, "bbbb").unwrap();
        let after = fingerprint(&path).await;

        assert!(before.is_some());
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_missing_file_has_no_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fingerprint(&dir.path().join("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_helper() {
        let dir = tempfile::tempdir().unwrap();
        let refresh = HelperRefresh::new("definitely_not_a_helper_12345", dir.path().join("f"));
        let result = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProcessError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_observed_before_helper_exits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "old").unwrap();

        let script = format!("sleep 0.2; echo new > '{}'; sleep 30", path.display());
        let refresh = HelperRefresh::new("sh", &path).args(["-c", script.as_str()]);

        let start = std::time::Instant::now();
        let outcome = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Observed);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_partial_write_is_not_observed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "old").unwrap();

        let script = format!(
            "printf 'half' > '{p}'; sleep 0.4; printf 'complete' > '{p}'; sleep 30",
            p = path.display()
        );
        let refresh = HelperRefresh::new("sh", &path)
            .args(["-c", script.as_str()])
            .ready_when(|contents| contents == b"complete");

        let outcome = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Observed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "complete");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_never_ready_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "old").unwrap();

        let script = format!("printf 'half' > '{}'; sleep 30", path.display());
        let refresh = HelperRefresh::new("sh", &path)
            .args(["-c", script.as_str()])
            .ready_when(|contents| contents == b"complete")
            .timeout(Duration::from_millis(400));

        let outcome = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::TimedOut);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_created_file_counts_as_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        let script = format!("echo fresh > '{}'; sleep 30", path.display());
        let refresh = HelperRefresh::new("sh", &path).args(["-c", script.as_str()]);

        let outcome = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Observed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_times_out_without_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "old").unwrap();

        let refresh = HelperRefresh::new("sh", &path)
            .args(["-c", "sleep 30"])
            .timeout(Duration::from_millis(300));

        let start = std::time::Instant::now();
        let outcome = refresh.run(&ProcessRunner::new(), &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_helper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, "old").unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let refresh = HelperRefresh::new("sh", &path)
            .args(["-c", "sleep 30"])
            .timeout(Duration::from_secs(30));

        let start = std::time::Instant::now();
        let outcome = refresh.run(&ProcessRunner::new(), &token).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
