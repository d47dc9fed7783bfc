use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_LENGTH;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{AlarmError, AlarmResult};
use crate::gateway::{PlaybackGateway, PlaylistEntry};
use crate::selection::PlaylistCatalog;

pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TRACK_PAGES: usize = 100;

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub api_base: String,
    pub access_token: String,
    pub request_timeout: Duration,
}

/// [`PlaybackGateway`] backed by the Spotify Web API and an already issued
/// bearer token.
pub struct SpotifyWebApi {
    http: Client,
    api_base: String,
    access_token: String,
}

impl SpotifyWebApi {
    pub fn new(config: SpotifyConfig) -> Result<Self> {
        let api_base = config.api_base.trim_end_matches('/').to_string();
        if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
            bail!("api base '{api_base}' must start with http:// or https://");
        }
        if config.access_token.trim().is_empty() {
            bail!("access token must not be empty");
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout.min(Duration::from_secs(10)))
            .user_agent(format!("spotify-alarm/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base,
            access_token: config.access_token.trim().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn send(&self, request: RequestBuilder) -> AlarmResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .map_err(|err| AlarmError::remote(err.to_string()))?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> AlarmResult<T> {
        debug!(%url, "GET");
        self.send(self.http.get(url))?
            .json::<T>()
            .map_err(|err| AlarmError::remote(format!("unexpected response from {url}: {err}")))
    }
}

impl PlaybackGateway for SpotifyWebApi {
    fn list_playlists(&self, limit: u32) -> AlarmResult<PlaylistCatalog> {
        let url = self.url(&format!("/me/playlists?limit={limit}"));
        let page: PlaylistPage = self.get_json(&url)?;
        Ok(page
            .items
            .into_iter()
            .flatten()
            .map(|playlist| (playlist.name, playlist.id))
            .collect())
    }

    fn list_tracks(&self, playlist_id: &str) -> AlarmResult<Vec<PlaylistEntry>> {
        let mut entries = Vec::new();
        let mut next = Some(self.url(&format!("/playlists/{playlist_id}/tracks")));
        let mut pages = 0;
        while let Some(url) = next.take() {
            if pages == MAX_TRACK_PAGES {
                warn!(playlist_id, pages, "track listing truncated");
                break;
            }
            let page: TrackPage = self.get_json(&url)?;
            entries.extend(page.items.into_iter().flatten().map(PlaylistItem::into_entry));
            next = page.next;
            pages += 1;
        }
        Ok(entries)
    }

    fn list_active_devices(&self) -> AlarmResult<Vec<String>> {
        let response: DevicesResponse = self.get_json(&self.url("/me/player/devices"))?;
        Ok(response
            .devices
            .into_iter()
            .filter_map(|device| device.id)
            .filter(|id| !id.is_empty())
            .collect())
    }

    fn start_playback(&self, device_id: &str, track_id: &str) -> AlarmResult<()> {
        let url = self.url("/me/player/play");
        debug!(%url, device_id, track_id, "PUT");
        self.send(
            self.http
                .put(&url)
                .query(&[("device_id", device_id)])
                .json(&json!({ "uris": [track_id] })),
        )?;
        Ok(())
    }

    fn pause_playback(&self) -> AlarmResult<()> {
        let url = self.url("/me/player/pause");
        debug!(%url, "PUT");
        self.send(self.http.put(&url).header(CONTENT_LENGTH, "0"))?;
        Ok(())
    }
}

fn check_status(response: Response) -> AlarmResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        });
    Err(AlarmError::remote(format!("{}: {message}", status.as_u16())))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<Option<SimplifiedPlaylist>>,
}

#[derive(Debug, Deserialize)]
struct SimplifiedPlaylist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Option<PlaylistItem>>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    #[serde(default)]
    is_playable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    #[serde(default)]
    id: Option<String>,
}

impl PlaylistItem {
    fn into_entry(self) -> PlaylistEntry {
        match self.track {
            Some(track) => PlaylistEntry {
                available: track.is_playable != Some(false) && track.uri.is_some(),
                track_id: track.uri,
                name: track.name.unwrap_or_default(),
                primary_artist: track.artists.into_iter().next().and_then(|artist| artist.name),
            },
            None => PlaylistEntry {
                track_id: None,
                name: String::new(),
                primary_artist: None,
                available: false,
            },
        }
    }
}
