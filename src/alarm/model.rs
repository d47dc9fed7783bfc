use chrono::{DateTime, Local};

use crate::selection::TrackSelection;

/// One armed alarm. Replaced as a whole whenever the user re-arms.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlarmSpec {
    pub fire_at: DateTime<Local>,
    pub track: Option<TrackSelection>,
}

impl AlarmSpec {
    pub fn new(fire_at: DateTime<Local>, track: Option<TrackSelection>) -> Self {
        Self { fire_at, track }
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track.as_ref().map(|track| track.track_id.as_str())
    }

    pub fn with_track(&self, track: Option<TrackSelection>) -> Self {
        Self {
            fire_at: self.fire_at,
            track,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Waiting(AlarmSpec),
    Firing(AlarmSpec),
    Stopped,
}

impl SchedulerState {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Waiting(_) => "waiting",
            SchedulerState::Firing(_) => "firing",
            SchedulerState::Stopped => "stopped",
        }
    }

    pub fn spec(&self) -> Option<&AlarmSpec> {
        match self {
            SchedulerState::Waiting(spec) | SchedulerState::Firing(spec) => Some(spec),
            SchedulerState::Idle | SchedulerState::Stopped => None,
        }
    }
}

pub fn format_fire_at(fire_at: &DateTime<Local>) -> String {
    fire_at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn track_id_comes_from_selection() {
        let fire_at = Local::now();
        let spec = AlarmSpec::new(
            fire_at,
            Some(TrackSelection::new("Song A by Artist X", "t1")),
        );
        assert_eq!(spec.track_id(), Some("t1"));
        assert_eq!(spec.with_track(None).track_id(), None);
        assert_eq!(spec.with_track(None).fire_at, fire_at);
    }

    #[test]
    fn state_exposes_spec_only_while_armed() {
        let spec = AlarmSpec::new(Local::now(), None);
        assert_eq!(SchedulerState::Waiting(spec.clone()).spec(), Some(&spec));
        assert_eq!(SchedulerState::Firing(spec.clone()).label(), "firing");
        assert_eq!(SchedulerState::Idle.spec(), None);
        assert_eq!(SchedulerState::Stopped.label(), "stopped");
    }

    #[test]
    fn fire_at_is_formatted_to_the_second() {
        let fire_at = Local
            .with_ymd_and_hms(2026, 10, 16, 7, 30, 0)
            .earliest()
            .expect("valid");
        assert_eq!(format_fire_at(&fire_at), "2026-10-16 07:30:00");
    }
}
