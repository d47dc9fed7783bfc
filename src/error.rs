use thiserror::Error;

/// Failures of the alarm core. Each one is terminal for the operation that
/// raised it and ends up on the status board, never as a process fault.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum AlarmError {
    #[error("Invalid time format. Use HH:MM:SS")]
    InvalidTimeFormat,
    #[error("selection cancelled")]
    SelectionCancelled,
    #[error("No playlists found.")]
    NoPlaylistsFound,
    #[error("No tracks found in this playlist.")]
    NoTracksFound,
    #[error("No track selected.")]
    NoTrackSelected,
    #[error("No active device found. Please open Spotify and play something.")]
    NoActiveDevice,
    #[error("Alarm scheduler is not running")]
    SchedulerStopped,
    #[error("{0}")]
    Remote(String),
}

impl AlarmError {
    pub fn remote(message: impl Into<String>) -> Self {
        AlarmError::Remote(message.into())
    }
}

pub type AlarmResult<T> = std::result::Result<T, AlarmError>;
