use tracing::{debug, info};

use crate::error::{AlarmError, AlarmResult};
use crate::gateway::{PlaybackGateway, PlaylistEntry};

pub const DEFAULT_PLAYLIST_LIMIT: u32 = 50;
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Ordered label -> id listing. Re-inserting a label keeps its original
/// position and takes the newer id.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Catalog {
    entries: Vec<(String, String)>,
}

pub type PlaylistCatalog = Catalog;
pub type TrackCatalog = Catalog;

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, id: impl Into<String>) {
        let label = label.into();
        let id = id.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((label, id)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, id)| id.as_str())
    }

    pub fn entry(&self, index: usize) -> Option<(&str, &str)> {
        self.entries
            .get(index)
            .map(|(label, id)| (label.as_str(), id.as_str()))
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L, I> FromIterator<(L, I)> for Catalog
where
    L: Into<String>,
    I: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (L, I)>>(iter: T) -> Self {
        let mut catalog = Catalog::new();
        for (label, id) in iter {
            catalog.insert(label, id);
        }
        catalog
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TrackSelection {
    pub display_label: String,
    pub track_id: String,
}

impl TrackSelection {
    pub fn new(display_label: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            display_label: display_label.into(),
            track_id: track_id.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlaylistChoice {
    pub name: String,
    pub playlist_id: String,
}

/// "Pick one of N labels, or cancel". Rendering is up to the implementor.
pub trait Chooser {
    fn choose(&mut self, title: &str, prompt: &str, labels: &[String]) -> Option<usize>;
}

/// Drops unavailable rows and labels the rest as "{name} by {artist}".
pub fn build_track_catalog(entries: &[PlaylistEntry]) -> TrackCatalog {
    let mut catalog = TrackCatalog::new();
    for entry in entries {
        let Some(track_id) = entry.playable_id() else {
            debug!(name = %entry.name, "skipping unavailable track");
            continue;
        };
        let artist = entry.primary_artist.as_deref().unwrap_or(UNKNOWN_ARTIST);
        catalog.insert(format!("{} by {}", entry.name, artist), track_id);
    }
    catalog
}

pub struct SelectionFlow<'a> {
    gateway: &'a dyn PlaybackGateway,
    chooser: &'a mut dyn Chooser,
    playlist_limit: u32,
}

impl<'a> SelectionFlow<'a> {
    pub fn new(
        gateway: &'a dyn PlaybackGateway,
        chooser: &'a mut dyn Chooser,
        playlist_limit: u32,
    ) -> Self {
        Self {
            gateway,
            chooser,
            playlist_limit,
        }
    }

    pub fn choose_playlist(&mut self) -> AlarmResult<PlaylistChoice> {
        let catalog = self.gateway.list_playlists(self.playlist_limit)?;
        if catalog.is_empty() {
            return Err(AlarmError::NoPlaylistsFound);
        }
        debug!(count = catalog.len(), "playlists fetched");

        let (name, playlist_id) =
            pick(&mut *self.chooser, "Select Playlist", "Choose a playlist:", &catalog)?;
        info!(playlist = %name, "playlist chosen");
        Ok(PlaylistChoice {
            name: name.to_string(),
            playlist_id: playlist_id.to_string(),
        })
    }

    pub fn choose_track(&mut self, playlist_id: &str) -> AlarmResult<TrackSelection> {
        let entries = self.gateway.list_tracks(playlist_id)?;
        let catalog = build_track_catalog(&entries);
        if catalog.is_empty() {
            return Err(AlarmError::NoTracksFound);
        }
        debug!(
            listed = entries.len(),
            playable = catalog.len(),
            "tracks fetched"
        );

        let (label, track_id) =
            pick(&mut *self.chooser, "Select Track", "Choose a track:", &catalog)?;
        info!(track = %label, "track chosen");
        Ok(TrackSelection::new(label, track_id))
    }
}

fn pick<'c>(
    chooser: &mut dyn Chooser,
    title: &str,
    prompt: &str,
    catalog: &'c Catalog,
) -> AlarmResult<(&'c str, &'c str)> {
    chooser
        .choose(title, prompt, &catalog.labels())
        .and_then(|index| catalog.entry(index))
        .ok_or(AlarmError::SelectionCancelled)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::gateway::tests::FakeGateway;

    /// Replays scripted answers and records every prompt it was shown.
    #[derive(Default)]
    pub(crate) struct ScriptedChooser {
        answers: VecDeque<Option<usize>>,
        pub(crate) shown: Vec<(String, Vec<String>)>,
    }

    impl ScriptedChooser {
        pub(crate) fn new(answers: impl IntoIterator<Item = Option<usize>>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                shown: Vec::new(),
            }
        }
    }

    impl Chooser for ScriptedChooser {
        fn choose(&mut self, title: &str, _prompt: &str, labels: &[String]) -> Option<usize> {
            self.shown.push((title.to_string(), labels.to_vec()));
            self.answers.pop_front().flatten()
        }
    }

    fn entry(id: Option<&str>, name: &str, artist: Option<&str>, available: bool) -> PlaylistEntry {
        PlaylistEntry {
            track_id: id.map(str::to_string),
            name: name.to_string(),
            primary_artist: artist.map(str::to_string),
            available,
        }
    }

    #[test]
    fn catalog_keeps_insertion_order_and_first_position() {
        let mut catalog = Catalog::new();
        catalog.insert("b", "1");
        catalog.insert("a", "2");
        catalog.insert("b", "3");
        assert_eq!(catalog.labels(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(catalog.get("b"), Some("3"));
        assert_eq!(catalog.entry(1), Some(("a", "2")));
        assert_eq!(catalog.entry(2), None);
    }

    #[test]
    fn morning_mix_listing_drops_unavailable_entry() {
        let entries = vec![
            entry(Some("t1"), "Song A", Some("Artist X"), true),
            entry(None, "Removed", Some("Someone"), false),
        ];
        let catalog = build_track_catalog(&entries);
        let expected: TrackCatalog = [("Song A by Artist X", "t1")].into_iter().collect();
        assert_eq!(catalog, expected);
    }

    #[test]
    fn unplayable_and_artistless_entries_are_handled() {
        let entries = vec![
            entry(Some("t1"), "Blocked", Some("A"), false),
            entry(Some(""), "Blank", Some("A"), true),
            entry(Some("t3"), "Lonely", None, true),
        ];
        let catalog = build_track_catalog(&entries);
        assert_eq!(catalog.labels(), vec!["Lonely by Unknown Artist".to_string()]);
    }

    #[test]
    fn full_flow_returns_chosen_track() {
        let gateway = FakeGateway::morning_mix();
        let mut chooser = ScriptedChooser::new([Some(0), Some(0)]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);

        let playlist = flow.choose_playlist().expect("playlist");
        assert_eq!(playlist.playlist_id, "p1");
        let track = flow.choose_track(&playlist.playlist_id).expect("track");
        assert_eq!(track, TrackSelection::new("Song A by Artist X", "t1"));

        assert_eq!(chooser.shown[0], ("Select Playlist".to_string(), vec!["Morning Mix".to_string()]));
        assert_eq!(chooser.shown[1].1, vec!["Song A by Artist X".to_string()]);
        assert_eq!(gateway.calls(), vec!["list_playlists(50)", "list_tracks(p1)"]);
    }

    #[test]
    fn empty_playlist_listing_fails_without_prompting() {
        let gateway = FakeGateway::default();
        let mut chooser = ScriptedChooser::new([Some(0)]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);
        assert_eq!(flow.choose_playlist(), Err(AlarmError::NoPlaylistsFound));
        assert!(chooser.shown.is_empty());
    }

    #[test]
    fn cancelled_pick_is_reported() {
        let gateway = FakeGateway::morning_mix();
        let mut chooser = ScriptedChooser::new([None]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);
        assert_eq!(flow.choose_playlist(), Err(AlarmError::SelectionCancelled));
    }

    #[test]
    fn out_of_range_pick_counts_as_cancel() {
        let gateway = FakeGateway::morning_mix();
        let mut chooser = ScriptedChooser::new([Some(7)]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);
        assert_eq!(flow.choose_playlist(), Err(AlarmError::SelectionCancelled));
    }

    #[test]
    fn playlist_without_playable_tracks_fails() {
        let gateway = FakeGateway::morning_mix();
        gateway.set_tracks(vec![entry(None, "Gone", None, false)]);
        let mut chooser = ScriptedChooser::new([Some(0)]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);
        assert_eq!(flow.choose_track("p1"), Err(AlarmError::NoTracksFound));
        assert!(chooser.shown.is_empty());
    }

    #[test]
    fn remote_failure_aborts_the_step() {
        let gateway = FakeGateway::morning_mix();
        gateway.fail_with("list_playlists", "503: Service unavailable");
        let mut chooser = ScriptedChooser::new([Some(0)]);
        let mut flow = SelectionFlow::new(&gateway, &mut chooser, DEFAULT_PLAYLIST_LIMIT);
        assert_eq!(
            flow.choose_playlist(),
            Err(AlarmError::remote("503: Service unavailable"))
        );
    }
}
