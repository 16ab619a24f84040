//! Controller state record and status snapshot

use serde::{Deserialize, Serialize};

use super::auto_tie::AutoTieTimer;
use crate::switcher::SourceId;

/// Smart tie arm period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SmartTieLatch {
    /// Program source captured at arm time
    pub baseline: SourceId,
    pub me: u8,
    pub generation: u64,
}

/// Shared mutable state; only ever touched while holding the controller lock
#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    pub connected: bool,
    pub on_air: bool,
    pub tie: bool,
    pub current_source: Option<SourceId>,
    /// `Some` exactly while smart tie is armed
    pub smart_tie: Option<SmartTieLatch>,
    /// `Some` exactly while auto tie is armed
    pub auto_tie: Option<AutoTieTimer>,
    next_generation: u64,
}

/// What a disconnect reset released
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DisconnectReset {
    pub was_connected: bool,
    pub smart_tie_released: bool,
    pub auto_tie_released: bool,
}

impl ControllerState {
    pub fn smart_tie_enabled(&self) -> bool {
        self.smart_tie.is_some()
    }

    pub fn auto_tie_enabled(&self) -> bool {
        self.auto_tie.is_some()
    }

    /// Fresh arm generation; watchers and timers compare against it
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Smart tie baseline if `generation` is still the armed period and the link is up
    pub fn smart_tie_baseline(&self, generation: u64) -> Option<SourceId> {
        match self.smart_tie {
            Some(latch) if latch.generation == generation && self.connected => Some(latch.baseline),
            _ => None,
        }
    }

    /// Drop all device-derived state and release both latches
    pub fn reset_disconnected(&mut self) -> DisconnectReset {
        let reset = DisconnectReset {
            was_connected: self.connected,
            smart_tie_released: self.smart_tie.take().is_some(),
            auto_tie_released: match self.auto_tie.take() {
                Some(timer) => {
                    timer.cancel();
                    true
                },
                None => false,
            },
        };
        self.connected = false;
        self.on_air = false;
        self.tie = false;
        self.current_source = None;
        reset
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.connected,
            on_air: self.on_air,
            tie: self.tie,
            smart_tie_enabled: self.smart_tie_enabled(),
            auto_tie_enabled: self.auto_tie_enabled(),
            current_source: self.current_source,
        }
    }
}

/// Immutable copy of the controller state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub on_air: bool,
    pub tie: bool,
    pub smart_tie_enabled: bool,
    pub auto_tie_enabled: bool,
    pub current_source: Option<SourceId>,
}
