//! Auto tie: tie armed for a fixed period, released by a delayed task

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::TieController;
use crate::switcher::DSK_INDEX;

/// Cancellation handle for a pending auto tie release
///
/// Owned by the controller state while auto tie is armed. The release task
/// re-checks the armed generation under the controller lock, so a cancel that
/// races an expiry leaves the expiry a no-op.
#[derive(Debug)]
pub(crate) struct AutoTieTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl AutoTieTimer {
    /// Schedule the release of arm period `generation` after `delay`
    pub(crate) fn start(controller: TieController, generation: u64, delay: Duration) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.expire_auto_tie(generation).await;
        });
        Self { generation, task }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Abort the pending release; a no-op if it already ran
    pub(crate) fn cancel(self) {
        if self.task.is_finished() {
            debug!("AutoTie timer #{} already fired", self.generation);
        }
        self.task.abort();
    }
}

impl TieController {
    /// Release auto tie for arm period `generation` if it is still armed
    pub(crate) async fn expire_auto_tie(&self, generation: u64) {
        let mut state = self.shared.state.lock().await;

        let armed = state
            .auto_tie
            .as_ref()
            .is_some_and(|timer| timer.generation() == generation);
        if !armed || !state.connected {
            debug!("AutoTie timer #{} expired after disarm, ignoring", generation);
            return;
        }

        // Our own handle: detach rather than abort the running task
        drop(state.auto_tie.take());

        match self.shared.switcher.set_dsk_tie(DSK_INDEX, false).await {
            Ok(()) => {
                state.tie = false;
                self.shared.log.info(format!(
                    " [*][AutoTie] Automatically disabled after {} seconds",
                    self.shared.timings.auto_tie_duration().as_secs_f32()
                ));
            },
            Err(e) => {
                self.shared
                    .log
                    .error(format!(" [!!][AutoTie] Auto release failed: {}", e));
            },
        }
    }
}
