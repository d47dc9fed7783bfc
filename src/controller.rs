use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::alarm::model::{AlarmSpec, SchedulerState, format_fire_at};
use crate::alarm::scheduler::{AlarmHandler, AlarmScheduler};
use crate::alarm::time::resolve_alarm_time;
use crate::clock::SharedClock;
use crate::error::{AlarmError, AlarmResult};
use crate::gateway::PlaybackGateway;
use crate::playback::{PlaybackTrigger, StopController};
use crate::selection::{Chooser, SelectionFlow, TrackSelection};
use crate::status::{Status, StatusBoard};

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub tick: Duration,
    pub playlist_limit: u32,
}

/// Owner of the alarm state: current track choice, the scheduler and the
/// status board. Everything user-initiated goes through here.
pub struct AlarmController {
    gateway: Arc<dyn PlaybackGateway>,
    clock: SharedClock,
    status: Arc<StatusBoard>,
    scheduler: AlarmScheduler,
    stopper: StopController,
    selection: Mutex<Option<TrackSelection>>,
    playlist_limit: u32,
}

impl AlarmController {
    pub fn new(
        gateway: Arc<dyn PlaybackGateway>,
        clock: SharedClock,
        settings: ControllerSettings,
    ) -> Self {
        let status = Arc::new(StatusBoard::new());
        let trigger: Arc<dyn AlarmHandler> = Arc::new(PlaybackTrigger::new(
            Arc::clone(&gateway),
            Arc::clone(&status),
        ));
        let scheduler = AlarmScheduler::new(Arc::clone(&clock), trigger, settings.tick);
        let stopper = StopController::new(Arc::clone(&gateway), Arc::clone(&status));
        Self {
            gateway,
            clock,
            status,
            scheduler,
            stopper,
            selection: Mutex::new(None),
            playlist_limit: settings.playlist_limit,
        }
    }

    /// Playlist then track. A failure at either step keeps the previous
    /// selection.
    pub fn select_track(&self, chooser: &mut dyn Chooser) -> AlarmResult<TrackSelection> {
        let mut flow = SelectionFlow::new(self.gateway.as_ref(), chooser, self.playlist_limit);

        let playlist = flow.choose_playlist().inspect_err(|err| {
            self.status
                .error(selection_failure_message(err, "No playlist selected."));
        })?;
        let track = flow.choose_track(&playlist.playlist_id).inspect_err(|err| {
            self.status
                .error(selection_failure_message(err, "No track selected."));
        })?;

        *self.lock_selection() = Some(track.clone());
        // A waiting alarm keeps its instant and plays the new pick.
        self.scheduler.replace_track(Some(track.clone()));
        self.status
            .success(format!("Selected: {}", track.display_label));
        Ok(track)
    }

    /// Arms the alarm for the next occurrence of `input` (`HH:MM:SS`).
    /// Invalid input leaves any armed alarm as it was.
    pub fn set_alarm(&self, input: &str) -> AlarmResult<DateTime<Local>> {
        let fire_at = match resolve_alarm_time(input, &self.clock.now()) {
            Ok(fire_at) => fire_at,
            Err(err) => {
                self.status.error(err.to_string());
                return Err(err);
            }
        };

        let track = self.selection();
        let spec = AlarmSpec::new(fire_at, track.clone());
        if !self.scheduler.set_alarm(spec) {
            warn!("alarm scheduler is stopped; alarm not armed");
            let err = AlarmError::SchedulerStopped;
            self.status.error(err.to_string());
            return Err(err);
        }

        let when = format_fire_at(&fire_at);
        match track {
            Some(_) => self.status.success(format!("Alarm set for {when}")),
            None => self
                .status
                .success(format!("Alarm set for {when} (no track selected yet)")),
        }
        Ok(fire_at)
    }

    pub fn cancel_alarm(&self) -> bool {
        let cancelled = self.scheduler.cancel();
        if cancelled {
            self.status.info("Alarm cancelled");
        } else {
            self.status.info("No alarm is pending");
        }
        cancelled
    }

    pub fn stop(&self) -> AlarmResult<()> {
        self.stopper.stop()
    }

    pub fn status(&self) -> Option<Status> {
        self.status.current()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn selection(&self) -> Option<TrackSelection> {
        self.lock_selection().clone()
    }

    pub fn shutdown(&self) {
        info!("shutting down alarm controller");
        self.scheduler.shutdown();
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Option<TrackSelection>> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn selection_failure_message(err: &AlarmError, cancelled: &str) -> String {
    match err {
        AlarmError::SelectionCancelled => cancelled.to_string(),
        AlarmError::Remote(message) => format!("An error occurred: {message}"),
        other => other.to_string(),
    }
}
