use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Status {
    pub message: String,
    pub severity: Severity,
    pub updated_at: DateTime<Local>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// The one user-facing status line. Every write replaces the previous one.
#[derive(Debug, Default)]
pub struct StatusBoard {
    current: Mutex<Option<Status>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => error!(%message, "status"),
            Severity::Info | Severity::Success => info!(%severity, %message, "status"),
        }
        let status = Status {
            message,
            severity,
            updated_at: Local::now(),
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.set(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.set(Severity::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.set(Severity::Error, message);
    }

    pub fn current(&self) -> Option<Status> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
