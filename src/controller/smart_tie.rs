//! Smart tie watcher
//!
//! One task per arm period. It polls the program input and releases the tie
//! once a change away from the baseline holds for the confirmation delay.
//! The task has no cancel handle: it exits when its arm period ends or the
//! link drops, observed at most one poll interval late.

use tokio::task::JoinHandle;
use tracing::debug;

use super::TieController;
use crate::switcher::DSK_INDEX;

impl TieController {
    pub(crate) fn spawn_smart_tie_watcher(&self, generation: u64, me: u8) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move { controller.watch_program_change(generation, me).await })
    }

    async fn watch_program_change(self, generation: u64, me: u8) {
        let poll = self.shared.timings.smart_tie_poll();
        let confirm = self.shared.timings.smart_tie_confirm();

        loop {
            let baseline = {
                let state = self.shared.state.lock().await;
                match state.smart_tie_baseline(generation) {
                    Some(baseline) => baseline,
                    None => break,
                }
            };

            match self.shared.switcher.program_input(me).await {
                Ok(current) if current != baseline => {
                    self.shared.log.info(format!(
                        " [!][SmartTie] Detected program change: {} -> {}",
                        baseline, current
                    ));
                    tokio::time::sleep(confirm).await;

                    match self.shared.switcher.program_input(me).await {
                        Ok(confirmed) if confirmed == current => {
                            self.release_smart_tie(generation).await;
                            break;
                        },
                        Ok(bounced) => {
                            debug!("SmartTie change not confirmed ({} -> {})", current, bounced);
                        },
                        Err(e) => debug!("SmartTie confirmation read failed: {}", e),
                    }
                },
                Ok(_) => {},
                // The connection monitor owns disconnect handling
                Err(e) => debug!("SmartTie program read failed: {}", e),
            }

            tokio::time::sleep(poll).await;
        }

        debug!("SmartTie watcher #{} finished", generation);
    }

    /// Commit the release for arm period `generation` if it is still armed
    async fn release_smart_tie(&self, generation: u64) {
        let mut state = self.shared.state.lock().await;
        if !state
            .smart_tie
            .is_some_and(|latch| latch.generation == generation)
        {
            return;
        }

        state.smart_tie = None;
        match self.shared.switcher.set_dsk_tie(DSK_INDEX, false).await {
            Ok(()) => {
                state.tie = false;
                self.shared.log.info(" [*][SmartTie] Tie off after transition.");
            },
            Err(e) => {
                self.shared
                    .log
                    .error(format!(" [!!][SmartTie] Tie release failed: {}", e));
            },
        }
        self.shared.log.info(" [*][SmartTie] Unlatched.");
    }
}
