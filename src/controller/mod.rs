//! Tie controller - owner of the shared DSK tie state
//!
//! All state lives in a single [`ControllerState`] behind one async mutex.
//! User operations, the connection monitor, the smart tie watcher and the
//! auto tie timer all mutate it through this lock, so every transition is
//! atomic with respect to the others. Device I/O issued by an operation
//! happens while the lock is held.
//!
//! Smart tie and auto tie are independent latches: both may be armed at the
//! same time, and neither knows about the other's pending release.

mod auto_tie;
mod monitor;
mod smart_tie;
mod state;

pub use monitor::ConnectionMonitor;
pub use state::StatusSnapshot;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use self::auto_tie::AutoTieTimer;
use self::state::{ControllerState, SmartTieLatch};
use crate::config::Timings;
use crate::log_buffer::LogBuffer;
use crate::switcher::{
    DskConfiguration, SourceId, SwitcherClient, SwitcherResult, DSK_INDEX, PROGRAM_ME,
};

struct Shared {
    state: Mutex<ControllerState>,
    switcher: Arc<dyn SwitcherClient>,
    log: Arc<LogBuffer>,
    timings: Timings,
}

/// Cheaply cloneable handle to the controller
#[derive(Clone)]
pub struct TieController {
    shared: Arc<Shared>,
}

impl TieController {
    pub fn new(switcher: Arc<dyn SwitcherClient>, log: Arc<LogBuffer>, timings: Timings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState::default()),
                switcher,
                log,
                timings,
            }),
        }
    }

    /// Operator log shared with the front ends
    pub fn log(&self) -> &Arc<LogBuffer> {
        &self.shared.log
    }

    pub fn timings(&self) -> &Timings {
        &self.shared.timings
    }

    /// Atomic copy of the current state
    pub async fn status(&self) -> StatusSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    /// Run the keyer auto transition and refresh on-air
    ///
    /// Returns `false` without touching the device when disconnected.
    pub async fn toggle_auto_key(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        if !state.connected {
            return false;
        }

        match self.run_auto_key().await {
            Ok(on_air) => {
                state.on_air = on_air;
                true
            },
            Err(e) => {
                self.shared
                    .log
                    .error(format!(" [!!][AutoKey] Auto key failed: {}", e));
                false
            },
        }
    }

    async fn run_auto_key(&self) -> SwitcherResult<bool> {
        let switcher = &self.shared.switcher;
        switcher.execute_auto_keyer(DSK_INDEX).await?;
        tokio::time::sleep(self.shared.timings.auto_key_settle()).await;
        switcher.dsk_on_air(DSK_INDEX).await
    }

    /// Flip the keyer tie, resynchronising with the device first
    pub async fn toggle_tie(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        if !state.connected {
            return false;
        }

        match self.flip_tie().await {
            Ok(tie) => {
                state.tie = tie;
                true
            },
            Err(e) => {
                self.shared
                    .log
                    .error(format!(" [!!][Tie] Tie toggle failed: {}", e));
                false
            },
        }
    }

    async fn flip_tie(&self) -> SwitcherResult<bool> {
        let switcher = &self.shared.switcher;
        let tie = !switcher.dsk_tie(DSK_INDEX).await?;
        // The keyer ignores a tie write issued right after the read
        tokio::time::sleep(self.shared.timings.tie_settle()).await;
        switcher.set_dsk_tie(DSK_INDEX, tie).await?;
        Ok(tie)
    }

    /// Apply [`DskConfiguration::STANDARD`] to the keyer
    pub async fn set_dsk_configuration(&self) -> bool {
        let state = self.shared.state.lock().await;
        let log = &self.shared.log;
        if !state.connected {
            log.warn(" [!][SetDSK] Can't set DSK.");
            log.warn(" [!][ConnectionHandler] Are you connected to the switcher network?");
            return false;
        }

        match DskConfiguration::STANDARD
            .apply(self.shared.switcher.as_ref(), DSK_INDEX)
            .await
        {
            Ok(()) => {
                log.info(" [+][SetDSK] Downstream keyer configured successfully.");
                true
            },
            Err(e) => {
                log.error(format!(" [!!][SetDSK] Error while setting DSK: {}", e));
                false
            },
        }
    }

    /// Toggle smart tie on the default mix effect
    pub async fn toggle_smart_tie(&self) -> bool {
        self.toggle_smart_tie_on(PROGRAM_ME).await
    }

    /// Toggle smart tie, watching program input of `me`
    ///
    /// Arming sets tie on, captures the current program source as baseline
    /// and spawns a watcher for this arm period. Disarming sets tie off; the
    /// watcher notices on its next poll and exits. Returns whether the
    /// transition was applied.
    pub async fn toggle_smart_tie_on(&self, me: u8) -> bool {
        let mut state = self.shared.state.lock().await;
        let log = &self.shared.log;

        if state.smart_tie.take().is_some() {
            log.info(" [!][SmartTie] Unlatched.");
            match self.shared.switcher.set_dsk_tie(DSK_INDEX, false).await {
                Ok(()) => state.tie = false,
                Err(e) => log.error(format!(" [!!][SmartTie] Tie release failed: {}", e)),
            }
            return true;
        }

        if !state.connected {
            log.warn(" [!][SmartTie] Can't latch while disconnected.");
            return false;
        }

        match self.arm_smart_tie(me).await {
            Ok(baseline) => {
                let generation = state.next_generation();
                state.smart_tie = Some(SmartTieLatch {
                    baseline,
                    me,
                    generation,
                });
                state.tie = true;
                log.info(" [*][SmartTie] Latched. Watching for input change...");
                debug!("SmartTie #{} baseline source {}", generation, baseline);
                self.spawn_smart_tie_watcher(generation, me);
                true
            },
            Err(e) => {
                log.error(format!(" [!!][SmartTie] Latch failed: {}", e));
                false
            },
        }
    }

    async fn arm_smart_tie(&self, me: u8) -> SwitcherResult<SourceId> {
        let switcher = &self.shared.switcher;
        // Baseline first: a failed read must not leave the tie on
        let baseline = switcher.program_input(me).await?;
        switcher.set_dsk_tie(DSK_INDEX, true).await?;
        Ok(baseline)
    }

    /// Toggle auto tie: arm with a timed release, or disarm and cancel it
    pub async fn toggle_auto_tie(&self) -> bool {
        let mut state = self.shared.state.lock().await;
        let log = &self.shared.log;
        if !state.connected {
            return false;
        }

        if state.auto_tie.is_some() {
            // The latch and its timer stay armed until the tie is really off
            if let Err(e) = self.shared.switcher.set_dsk_tie(DSK_INDEX, false).await {
                log.error(format!(" [!!][AutoTie] Tie release failed: {}", e));
                return false;
            }
            if let Some(timer) = state.auto_tie.take() {
                timer.cancel();
            }
            state.tie = false;
            log.info(" [!][AutoTie] USER Unlatched, Tie off, DSK off.");
            return true;
        }

        if let Err(e) = self.shared.switcher.set_dsk_tie(DSK_INDEX, true).await {
            log.error(format!(" [!!][AutoTie] Latch failed: {}", e));
            return false;
        }

        let duration = self.shared.timings.auto_tie_duration();
        let generation = state.next_generation();
        state.auto_tie = Some(AutoTieTimer::start(self.clone(), generation, duration));
        state.tie = true;
        log.info(format!(
            " [+][AutoTie] Latched, will auto-disable after {} seconds",
            duration.as_secs_f32()
        ));
        true
    }

    /// Mix effect watched by the armed smart tie
    #[cfg(test)]
    async fn smart_tie_me(&self) -> Option<u8> {
        self.shared.state.lock().await.smart_tie.map(|latch| latch.me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switcher::SimulatedSwitcher;
    use std::time::Duration;

    fn fast_timings() -> Timings {
        Timings {
            reconnect_delay_ms: 1,
            ..Timings::default()
        }
    }

    async fn connected() -> (Arc<SimulatedSwitcher>, TieController) {
        let sw = Arc::new(SimulatedSwitcher::new());
        let controller = TieController::new(sw.clone(), Arc::new(LogBuffer::new()), fast_timings());
        ConnectionMonitor::new(controller.clone(), "sim").poll_once().await;
        assert!(controller.status().await.connected);
        (sw, controller)
    }

    fn disconnected() -> (Arc<SimulatedSwitcher>, TieController) {
        let sw = Arc::new(SimulatedSwitcher::new());
        let controller = TieController::new(sw.clone(), Arc::new(LogBuffer::new()), fast_timings());
        (sw, controller)
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_operations_when_disconnected() {
        let (sw, controller) = disconnected();
        let before = controller.status().await;

        assert!(!controller.toggle_auto_key().await);
        assert!(!controller.toggle_tie().await);
        assert!(!controller.toggle_auto_tie().await);
        assert!(!controller.set_dsk_configuration().await);

        assert_eq!(controller.status().await, before);
        assert!(sw.tie_writes().is_empty());
        assert!(controller
            .log()
            .lines()
            .iter()
            .any(|l| l.contains("[SetDSK] Can't set DSK.")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_auto_key_refreshes_on_air() {
        let (sw, controller) = connected().await;

        assert!(controller.toggle_auto_key().await);
        assert!(controller.status().await.on_air);
        assert!(sw.keyer(DSK_INDEX).on_air);

        assert!(controller.toggle_auto_key().await);
        assert!(!controller.status().await.on_air);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_tie_resyncs_before_flip() {
        let (sw, controller) = connected().await;
        // Someone ties on the panel; tracked state is now stale
        sw.update_keyer(DSK_INDEX, |k| k.tie = true);
        assert!(!controller.status().await.tie);

        assert!(controller.toggle_tie().await);

        assert_eq!(sw.tie_writes(), vec![false]);
        assert!(!controller.status().await.tie);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_tie_waits_for_settle_delay() {
        let (sw, controller) = connected().await;
        let start = tokio::time::Instant::now();

        assert!(controller.toggle_tie().await);

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(sw.tie_writes(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggles_leave_latches_alone() {
        let (_sw, controller) = connected().await;
        assert!(controller.toggle_auto_tie().await);
        assert!(controller.toggle_smart_tie().await);

        assert!(controller.toggle_tie().await);
        assert!(controller.toggle_auto_key().await);

        let status = controller.status().await;
        assert!(status.auto_tie_enabled);
        assert!(status.smart_tie_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_command_reports_failure() {
        let (sw, controller) = connected().await;
        sw.reject_commands(true);

        assert!(!controller.toggle_tie().await);
        assert!(!controller.toggle_auto_key().await);
        assert!(!controller.set_dsk_configuration().await);
        assert!(!controller.toggle_auto_tie().await);

        let status = controller.status().await;
        assert!(status.connected);
        assert!(!status.tie);
        assert!(!status.auto_tie_enabled);
        assert!(controller
            .log()
            .lines()
            .iter()
            .any(|l| l.contains("[!!][SetDSK] Error while setting DSK")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_dsk_configuration_keeps_tracked_state() {
        let (sw, controller) = connected().await;
        let before = controller.status().await;

        assert!(controller.set_dsk_configuration().await);

        assert_eq!(controller.status().await, before);
        assert_eq!(sw.keyer(DSK_INDEX).clip, 90.5);
        assert_eq!(sw.keyer(DSK_INDEX).key_source, SourceId::MP2_KEY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smart_tie_toggle_arm_and_disarm() {
        let (sw, controller) = connected().await;

        assert!(controller.toggle_smart_tie_on(1).await);
        let status = controller.status().await;
        assert!(status.tie);
        assert!(status.smart_tie_enabled);
        assert_eq!(controller.smart_tie_me().await, Some(1));

        assert!(controller.toggle_smart_tie().await);
        let status = controller.status().await;
        assert!(!status.tie);
        assert!(!status.smart_tie_enabled);
        assert_eq!(sw.tie_writes(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smart_tie_refuses_to_latch_disconnected() {
        let (sw, controller) = disconnected();

        assert!(!controller.toggle_smart_tie().await);
        assert!(!controller.status().await.smart_tie_enabled);
        assert!(sw.tie_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_smart_tie_baseline_read_failure_leaves_tie_off() {
        let (sw, controller) = connected().await;
        sw.fail_reads(true);

        assert!(!controller.toggle_smart_tie().await);

        let status = controller.status().await;
        assert!(!status.smart_tie_enabled);
        assert!(!status.tie);
        assert!(sw.tie_writes().is_empty());
        assert!(!sw.keyer(DSK_INDEX).tie);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_tie_disarm_failure_keeps_latch() {
        let (sw, controller) = connected().await;
        assert!(controller.toggle_auto_tie().await);

        sw.reject_commands(true);
        assert!(!controller.toggle_auto_tie().await);
        let status = controller.status().await;
        assert!(status.auto_tie_enabled);
        assert!(status.tie);

        sw.reject_commands(false);
        assert!(controller.toggle_auto_tie().await);
        let status = controller.status().await;
        assert!(!status.auto_tie_enabled);
        assert!(!status.tie);
        assert_eq!(sw.tie_writes(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_tie_disarm_failure_leaves_timer_running() {
        let (sw, controller) = connected().await;
        assert!(controller.toggle_auto_tie().await);

        sw.reject_commands(true);
        assert!(!controller.toggle_auto_tie().await);
        sw.reject_commands(false);

        // The original release still fires
        tokio::time::sleep(Duration::from_secs(11)).await;
        let status = controller.status().await;
        assert!(!status.auto_tie_enabled);
        assert!(!status.tie);
        assert_eq!(sw.tie_writes(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_tie_user_disarm() {
        let (sw, controller) = connected().await;

        assert!(controller.toggle_auto_tie().await);
        let status = controller.status().await;
        assert!(status.tie && status.auto_tie_enabled);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(controller.toggle_auto_tie().await);
        let status = controller.status().await;
        assert!(!status.tie && !status.auto_tie_enabled);

        // The cancelled release never writes
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(sw.tie_writes(), vec![true, false]);
    }
}
