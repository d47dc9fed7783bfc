pub mod spotify;

use crate::error::AlarmResult;
use crate::selection::PlaylistCatalog;

pub use spotify::{SpotifyConfig, SpotifyWebApi};

/// One row of a playlist's track listing as the remote side reports it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlaylistEntry {
    pub track_id: Option<String>,
    pub name: String,
    pub primary_artist: Option<String>,
    pub available: bool,
}

impl PlaylistEntry {
    /// The id to play, if this row can be played at all.
    pub fn playable_id(&self) -> Option<&str> {
        if !self.available {
            return None;
        }
        self.track_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Remote calls the alarm core relies on. Authentication is assumed to be
/// in place already; every call may fail with [`crate::error::AlarmError::Remote`].
pub trait PlaybackGateway: Send + Sync {
    fn list_playlists(&self, limit: u32) -> AlarmResult<PlaylistCatalog>;
    fn list_tracks(&self, playlist_id: &str) -> AlarmResult<Vec<PlaylistEntry>>;
    fn list_active_devices(&self) -> AlarmResult<Vec<String>>;
    fn start_playback(&self, device_id: &str, track_id: &str) -> AlarmResult<()>;
    fn pause_playback(&self) -> AlarmResult<()>;
}
