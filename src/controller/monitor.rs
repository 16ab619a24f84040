//! Connection monitor
//!
//! Long-lived task that (re)connects to the switcher and polls keyer status
//! into the controller state at a fixed cadence. Failures never leave this
//! loop: they are logged and turned into a disconnect reset.

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use super::state::DisconnectReset;
use super::TieController;
use crate::switcher::{SourceId, SwitcherError, DSK_INDEX, PROGRAM_ME};

/// Background connect/poll loop for one switcher address
pub struct ConnectionMonitor {
    controller: TieController,
    address: String,
    /// Last failure written to the operator log (repeats go to debug only)
    last_failure: Option<String>,
}

impl ConnectionMonitor {
    pub fn new(controller: TieController, address: impl Into<String>) -> Self {
        Self {
            controller,
            address: address.into(),
            last_failure: None,
        }
    }

    /// Run the monitor for the rest of the process lifetime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("Connection monitor started for {}", self.address);
        let interval = self.controller.shared.timings.poll_interval();
        loop {
            self.poll_once().await;
            sleep(interval).await;
        }
    }

    /// One monitor cycle: connect if needed, then sync status from the device
    pub async fn poll_once(&mut self) {
        let switcher = &self.controller.shared.switcher;

        if !switcher.is_connected() {
            let attempt = switcher.connect(&self.address).await;
            sleep(self.controller.shared.timings.reconnect_delay()).await;
            if let Err(e) = attempt {
                self.record_failure(e);
                self.controller.mark_disconnected().await;
                return;
            }
            info!("Switcher session established with {}", self.address);
        }

        match self.controller.sync_from_device().await {
            Ok(()) => self.last_failure = None,
            Err(e) => self.record_failure(e),
        }
    }

    fn record_failure(&mut self, error: SwitcherError) {
        let message = error.to_string();
        if self.last_failure.as_deref() == Some(message.as_str()) {
            debug!("Sync loop error (repeat): {}", message);
        } else {
            self.controller
                .shared
                .log
                .error(format!(" [!!][ConnectionHandler] Error in sync loop: {}", message));
            self.last_failure = Some(message);
        }
    }
}

impl TieController {
    /// Read on-air, tie and program source into the state, atomically
    ///
    /// Any read failure resets the state under the same lock acquisition.
    pub(crate) async fn sync_from_device(&self) -> Result<(), SwitcherError> {
        let mut state = self.shared.state.lock().await;

        match self.read_device_status().await {
            Ok((on_air, tie, source)) => {
                if !state.connected {
                    self.shared.log.info(" [*][ConnectionHandler] Switcher connected.");
                }
                state.connected = true;
                state.on_air = on_air;
                state.tie = tie;
                state.current_source = Some(source);
                Ok(())
            },
            Err(e) => {
                let reset = state.reset_disconnected();
                drop(state);
                self.log_reset(reset);
                Err(e)
            },
        }
    }

    async fn read_device_status(&self) -> Result<(bool, bool, SourceId), SwitcherError> {
        let switcher = &self.shared.switcher;
        if !switcher.is_connected() {
            return Err(SwitcherError::NotConnected);
        }
        let on_air = switcher.dsk_on_air(DSK_INDEX).await?;
        let tie = switcher.dsk_tie(DSK_INDEX).await?;
        let source = switcher.program_input(PROGRAM_ME).await?;
        Ok((on_air, tie, source))
    }

    /// Apply the disconnect reset and log what it released
    pub(crate) async fn mark_disconnected(&self) {
        let reset = self.shared.state.lock().await.reset_disconnected();
        self.log_reset(reset);
    }

    fn log_reset(&self, reset: DisconnectReset) {
        let log = &self.shared.log;
        if reset.was_connected {
            log.warn(" [!][ConnectionHandler] Switcher connection lost.");
        }
        if reset.smart_tie_released {
            log.warn(" [!][SmartTie] Unlatched (connection lost).");
        }
        if reset.auto_tie_released {
            log.warn(" [!][AutoTie] Unlatched (connection lost), timer cancelled.");
        }
    }
}
