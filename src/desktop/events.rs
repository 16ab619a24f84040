//! Front-end event rules shared by the desktop window and its handler

use std::time::{Duration, Instant};

use super::DesktopCommand;
use crate::controller::StatusSnapshot;

/// Ignores smart tie key repeats inside a fixed window
#[derive(Debug, Clone)]
pub struct SmartTieDebounce {
    window: Duration,
    last: Option<Instant>,
}

impl SmartTieDebounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether a press at `now` should fire
    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.window => false,
            _ => {
                self.last = Some(now);
                true
            },
        }
    }
}

/// Connection edge detector: reports each connect/disconnect transition once
#[derive(Debug, Clone, Default)]
pub struct ConnectionEdge {
    connected: Option<bool>,
}

/// A transition reported by [`ConnectionEdge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Connected,
    Disconnected,
}

impl Edge {
    pub fn log_message(self) -> &'static str {
        match self {
            Edge::Connected => " [*][ConnectionHandler] ATEM heartbeat received",
            Edge::Disconnected => " [!!][ConnectionHandler] ATEM heartbeat lost",
        }
    }
}

impl ConnectionEdge {
    /// Feed the latest connection flag; returns the edge, if one occurred
    ///
    /// The first observation only reports a connect: starting disconnected
    /// is not a loss.
    pub fn observe(&mut self, connected: bool) -> Option<Edge> {
        let previous = self.connected.replace(connected);
        match (previous, connected) {
            (Some(true), true) | (Some(false), false) | (None, false) => None,
            (_, true) => Some(Edge::Connected),
            (Some(true), false) => Some(Edge::Disconnected),
        }
    }
}

/// Failure dialog content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: &'static str,
    pub message: &'static str,
}

impl DesktopCommand {
    /// Dialog shown when the command reports failure, if any
    pub fn failure_alert(self) -> Option<Alert> {
        match self {
            DesktopCommand::AutoKey | DesktopCommand::AutoTie => Some(Alert {
                title: "Connection Error",
                message: "Cannot reach ATEM switcher.",
            }),
            DesktopCommand::SetDsk => Some(Alert {
                title: "Error",
                message: "Failed to set DSK. Not connected?",
            }),
            DesktopCommand::SmartTie => None,
        }
    }
}

/// Main status line text
pub fn air_label(status: &StatusSnapshot) -> &'static str {
    match (status.connected, status.on_air) {
        (false, _) => "No Connection",
        (true, true) => "ON AIR",
        (true, false) => "OFF AIR",
    }
}

/// Tie line text; a latch takes precedence over the raw tie flag
pub fn tie_label(status: &StatusSnapshot) -> &'static str {
    if !status.connected {
        "Unknown"
    } else if status.auto_tie_enabled {
        "AUTO TIE"
    } else if status.smart_tie_enabled {
        "SMART TIE"
    } else if status.tie {
        "ON"
    } else {
        "OFF"
    }
}
