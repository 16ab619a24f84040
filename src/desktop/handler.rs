//! Desktop message handler - Tokio task behind the window
//!
//! Polls the controller status on a fixed cadence, logs connection edges,
//! runs commands from the window and forwards results over a crossbeam
//! channel (the window thread is not async).

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::events::{ConnectionEdge, Edge};
use super::{DesktopCommand, DesktopUpdate};
use crate::controller::TieController;

pub struct DesktopHandler {
    controller: TieController,
    update_tx: crossbeam::channel::Sender<DesktopUpdate>,
    edge: ConnectionEdge,
}

impl DesktopHandler {
    pub fn new(
        controller: TieController,
        update_tx: crossbeam::channel::Sender<DesktopUpdate>,
    ) -> Self {
        Self {
            controller,
            update_tx,
            edge: ConnectionEdge::default(),
        }
    }

    /// Serve the window until it hangs up
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<DesktopCommand>) {
        let mut ticker = tokio::time::interval(self.controller.timings().status_refresh());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.refresh().await {
                        break;
                    }
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.execute(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("Desktop handler stopped");
    }

    /// Push a status update; false once the window is gone
    async fn refresh(&mut self) -> bool {
        let status = self.controller.status().await;
        if let Some(edge) = self.edge.observe(status.connected) {
            let log = self.controller.log();
            match edge {
                Edge::Connected => log.info(edge.log_message()),
                Edge::Disconnected => log.error(edge.log_message()),
            }
        }
        trace!("Desktop status refresh: {:?}", status);
        self.update_tx.send(DesktopUpdate::Status(status)).is_ok()
    }

    /// Run one command; false once the window is gone
    pub async fn execute(&mut self, cmd: DesktopCommand) -> bool {
        let ok = match cmd {
            DesktopCommand::AutoKey => self.controller.toggle_auto_key().await,
            DesktopCommand::SmartTie => self.controller.toggle_smart_tie().await,
            DesktopCommand::AutoTie => self.controller.toggle_auto_tie().await,
            DesktopCommand::SetDsk => self.controller.set_dsk_configuration().await,
        };
        debug!("Desktop command {:?} -> {}", cmd, ok);

        if !ok {
            if let Some(alert) = cmd.failure_alert() {
                return self.update_tx.send(DesktopUpdate::Alert(alert)).is_ok();
            }
        }
        self.refresh().await
    }
}
