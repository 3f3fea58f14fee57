use crate::tags::TagError;
use crate::types::MatchField;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The reference identifier did not resolve in the track store.
    #[error("Track '{0}' not found")]
    TrackNotFound(String),
    /// The reference resolved but cannot be matched until it is re-tagged.
    #[error("Track {track_id} ('{title}') is missing {}", join_fields(.missing))]
    IncompleteTrackMetadata {
        track_id: i64,
        title: String,
        missing: Vec<MatchField>,
    },
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Collection lock poisoned")]
    LockPoisoned,
}

impl MatchError {
    /// True for failures caused by the request rather than by the system.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::TrackNotFound(_) | Self::IncompleteTrackMetadata { .. }
        )
    }
}

fn join_fields(fields: &[MatchField]) -> String {
    fields
        .iter()
        .map(MatchField::as_str)
        .collect::<Vec<_>>()
        .join(" and ")
}
