use std::fmt;

/// Where a single user request currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestPhase {
    /// Nothing in flight
    Idle,
    /// Waiting on the resolver service
    Resolving,
    /// Links cached, waiting for a button press
    AwaitingAction,
    /// Download engine running
    Downloading,
    /// File on disk, upload in progress
    Uploading,
    /// Video delivered
    Done,
    /// Request ended with an error message to the user
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::AwaitingAction => "awaiting_action",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
