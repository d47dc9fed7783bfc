use std::sync::Arc;

use tracing::{info, warn};

use crate::alarm::model::AlarmSpec;
use crate::alarm::scheduler::AlarmHandler;
use crate::error::{AlarmError, AlarmResult};
use crate::gateway::PlaybackGateway;
use crate::selection::TrackSelection;
use crate::status::StatusBoard;

pub const FIRING_MESSAGE: &str = "Alarm! Playing track...";
pub const STOPPED_MESSAGE: &str = "Alarm stopped";

/// Starts the chosen track on the first device the remote side lists.
pub struct PlaybackTrigger {
    gateway: Arc<dyn PlaybackGateway>,
    status: Arc<StatusBoard>,
}

impl PlaybackTrigger {
    pub fn new(gateway: Arc<dyn PlaybackGateway>, status: Arc<StatusBoard>) -> Self {
        Self { gateway, status }
    }

    /// Returns the device playback was started on.
    pub fn play(&self, track: Option<&TrackSelection>) -> AlarmResult<String> {
        let track_id = track
            .map(|track| track.track_id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or(AlarmError::NoTrackSelected)?;

        let devices = self.gateway.list_active_devices()?;
        let device_id = devices
            .into_iter()
            .next()
            .ok_or(AlarmError::NoActiveDevice)?;

        self.gateway.start_playback(&device_id, track_id)?;
        Ok(device_id)
    }

    /// Runs [`Self::play`] and reports the outcome on the status board.
    pub fn fire(&self, track: Option<&TrackSelection>) -> AlarmResult<()> {
        self.status.info(FIRING_MESSAGE);
        match self.play(track) {
            Ok(device_id) => {
                let label = track.map_or("track", |track| track.display_label.as_str());
                info!(%device_id, "playback started");
                self.status.success(format!("Playing {label}"));
                Ok(())
            }
            Err(err) => {
                warn!("alarm playback failed: {err}");
                self.status.error(trigger_failure_message(&err));
                Err(err)
            }
        }
    }
}

impl AlarmHandler for PlaybackTrigger {
    fn on_alarm(&self, spec: &AlarmSpec) {
        // Failures are already on the status board.
        let _ = self.fire(spec.track.as_ref());
    }
}

fn trigger_failure_message(err: &AlarmError) -> String {
    match err {
        AlarmError::Remote(message) => format!("Error playing track: {message}"),
        other => other.to_string(),
    }
}

/// Pauses remote playback. Knows nothing about the scheduler.
pub struct StopController {
    gateway: Arc<dyn PlaybackGateway>,
    status: Arc<StatusBoard>,
}

impl StopController {
    pub fn new(gateway: Arc<dyn PlaybackGateway>, status: Arc<StatusBoard>) -> Self {
        Self { gateway, status }
    }

    pub fn stop(&self) -> AlarmResult<()> {
        match self.gateway.pause_playback() {
            Ok(()) => {
                self.status.info(STOPPED_MESSAGE);
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    AlarmError::Remote(message) => message.clone(),
                    other => other.to_string(),
                };
                self.status.error(format!("Error stopping track: {message}"));
                Err(err)
            }
        }
    }
}
