//! Per-session protocol log
//!
//! Keeps an ordered record of state entries and exchanged messages so an
//! operator can reconstruct why a session ended. Every entry is mirrored to
//! `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::message::{PayloadType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Received,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    StateEntered(String),
    Message {
        direction: Direction,
        message_type: Type,
        payload_type: PayloadType,
        size: usize,
    },
    Info(String),
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: LogEvent,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionLog {
    entries: Vec<LogEntry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_state(&mut self, name: &str) {
        info!("Session: entered {}", name);
        self.push(LogEvent::StateEntered(name.to_string()));
    }

    pub fn message(&mut self, direction: Direction, message_type: Type, payload_type: PayloadType, size: usize) {
        debug!("Session: {:?} {:?} ({} bytes, {:#06x})", direction, message_type, size, payload_type.value());
        self.push(LogEvent::Message {
            direction,
            message_type,
            payload_type,
            size,
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("Session: {}", text);
        self.push(LogEvent::Info(text));
    }

    pub fn failure(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("Session: {}", text);
        self.push(LogEvent::Failure(text));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Names of entered states, in order
    pub fn state_history(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match &e.event {
                LogEvent::StateEntered(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, event: LogEvent) {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_history() {
        let mut log = SessionLog::new();
        log.enter_state("SessionSetup");
        log.message(Direction::Received, Type::SessionSetupReq, PayloadType::Part20Main, 40);
        log.enter_state("AuthorizationSetup");

        assert_eq!(log.state_history(), vec!["SessionSetup", "AuthorizationSetup"]);
        assert_eq!(log.entries().len(), 3);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut log = SessionLog::new();
        log.failure("sequence error");
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("sequence error"));
    }
}
