//! Execution status and the finish policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status of an event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Created, `init` not called yet
    Init,
    /// Ready for the next event
    Ready,
    /// At least one graph node is suspended on async work
    Await,
    /// An event is being processed
    Running,
    /// Every suspended node resumed; state not yet synced
    Done,
    /// Unrecoverable failure; `init` recovers
    Errored,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Init => "INIT",
            Status::Ready => "READY",
            Status::Await => "AWAIT",
            Status::Running => "RUNNING",
            Status::Done => "DONE",
            Status::Errored => "ERRORED",
        }
    }

    /// RUNNING, AWAIT or DONE: an event has been set and not yet completed
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Status::Running | Status::Await | Status::Done)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `finish()` treats a call when no async node is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishPolicy {
    /// Counter stays at zero and the status becomes DONE.
    #[default]
    Lenient,
    /// The call is rejected with `ApiError::UnmatchedFinish`; nothing changes.
    Strict,
}
