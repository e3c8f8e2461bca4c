use thiserror::Error;

/// Errors surfaced by the providers.
///
/// Collaborators report failures as `anyhow::Error`; providers convert them
/// here with the full context chain flattened into the message. The type is
/// `Clone` so a single in-flight refresh can report to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReachflowError {
    #[error("Failed to load {what} for reach {reach_id}: {message}")]
    Fetch {
        what: &'static str,
        reach_id: String,
        message: String,
    },

    #[error("Failed to load favorites list: {0}")]
    FavoritesList(String),

    #[error("Reach {0} is already a favorite")]
    DuplicateFavorite(String),

    #[error("Reach {0} is not a favorite")]
    NotFavorite(String),

    #[error("Favorites store rejected {operation} for {reach_id}")]
    StoreRejected {
        operation: &'static str,
        reach_id: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid favorite position {index} (list has {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Load for reach {0} was superseded by a newer selection")]
    Superseded(String),
}

/// Maximum length for collaborator error messages
const MAX_MESSAGE_LENGTH: usize = 500;

impl ReachflowError {
    pub fn fetch(what: &'static str, reach_id: &str, err: &anyhow::Error) -> Self {
        ReachflowError::Fetch {
            what,
            reach_id: reach_id.to_string(),
            message: truncate_message(format!("{:#}", err)),
        }
    }

    pub fn favorites_list(err: &anyhow::Error) -> Self {
        ReachflowError::FavoritesList(truncate_message(format!("{:#}", err)))
    }

    pub fn storage(err: &anyhow::Error) -> Self {
        ReachflowError::Storage(truncate_message(format!("{:#}", err)))
    }

    /// Terminal errors are the ones shown to the user. Everything else
    /// degrades quietly and keeps the last good state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReachflowError::Fetch { what: OVERVIEW, .. } | ReachflowError::FavoritesList(_)
        )
    }
}

/// `what` for initial reach loads.
pub(crate) const OVERVIEW: &str = "overview";

fn truncate_message(message: String) -> String {
    if message.len() <= MAX_MESSAGE_LENGTH {
        return message;
    }
    let mut end = MAX_MESSAGE_LENGTH;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &message[..end], message.len())
}

pub type Result<T> = std::result::Result<T, ReachflowError>;
