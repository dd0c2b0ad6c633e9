/// Queue status definitions for tracking crawl progress
///
/// Every queue row is in exactly one of these states. The legal moves are
/// pending → processing → completed | error, plus processing → pending when
/// an interrupted run is recovered.
use std::fmt;

/// Represents the current status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting to be fetched
    Pending,

    /// Dequeued by the running crawl and not yet finished.
    ///
    /// Seeing this at startup means the previous run was interrupted.
    Processing,

    /// Fetched and stored successfully
    Completed,

    /// Fetch or processing failed; the message is kept on the row
    Error,
}

impl QueueStatus {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
                | (Self::Processing, Self::Pending)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all possible queue statuses
    pub fn all_statuses() -> [Self; 4] {
        [
            Self::Pending,
            Self::Processing,
            Self::Completed,
            Self::Error,
        ]
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
