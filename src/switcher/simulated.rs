//! In-process switcher model
//!
//! Behaves like a single-keyer switcher behind a flaky link: it can be made
//! unreachable, can reject commands, and records every tie write so callers
//! can check what actually reached the device.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use super::{SourceId, SwitcherClient, SwitcherError, SwitcherResult};

/// Downstream keyer fields held by the simulated device
#[derive(Debug, Clone, PartialEq)]
pub struct DskState {
    pub on_air: bool,
    pub tie: bool,
    pub fill_source: SourceId,
    pub key_source: SourceId,
    pub masked: bool,
    pub pre_multiplied: bool,
    pub clip: f32,
    pub gain: f32,
}

impl Default for DskState {
    fn default() -> Self {
        Self {
            on_air: false,
            tie: false,
            fill_source: SourceId(0),
            key_source: SourceId(0),
            masked: false,
            pre_multiplied: true,
            clip: 50.0,
            gain: 70.0,
        }
    }
}

#[derive(Debug)]
struct SimState {
    reachable: bool,
    connected: bool,
    address: Option<String>,
    reject_commands: bool,
    fail_reads: bool,
    program: HashMap<u8, SourceId>,
    keyers: HashMap<u8, DskState>,
    tie_writes: Vec<bool>,
    connect_attempts: usize,
}

/// Simulated switcher implementing [`SwitcherClient`]
#[derive(Debug)]
pub struct SimulatedSwitcher {
    state: Mutex<SimState>,
}

impl SimulatedSwitcher {
    /// Create a reachable, not yet connected device with program input 1
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                reachable: true,
                connected: false,
                address: None,
                reject_commands: false,
                fail_reads: false,
                program: HashMap::new(),
                keyers: HashMap::new(),
                tie_writes: Vec::new(),
                connect_attempts: 0,
            }),
        }
    }

    /// Make the device reachable or not; going unreachable drops the session
    pub fn set_reachable(&self, reachable: bool) {
        let mut state = self.state.lock();
        state.reachable = reachable;
        if !reachable {
            state.connected = false;
        }
    }

    /// Reject every write/execute command while enabled
    pub fn reject_commands(&self, reject: bool) {
        self.state.lock().reject_commands = reject;
    }

    /// Fail every status read while enabled; the session stays up
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Cut `source` to program on `me` (operator action on the panel)
    pub fn set_program_input(&self, me: u8, source: SourceId) {
        self.state.lock().program.insert(me, source);
    }

    /// Change keyer fields behind the controller's back
    pub fn update_keyer(&self, keyer: u8, f: impl FnOnce(&mut DskState)) {
        f(self.state.lock().keyers.entry(keyer).or_default());
    }

    /// Current keyer fields
    pub fn keyer(&self, keyer: u8) -> DskState {
        self.state.lock().keyers.get(&keyer).cloned().unwrap_or_default()
    }

    /// Every tie value written so far, oldest first
    pub fn tie_writes(&self) -> Vec<bool> {
        self.state.lock().tie_writes.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub fn address(&self) -> Option<String> {
        self.state.lock().address.clone()
    }

    fn session(&self) -> SwitcherResult<parking_lot::MutexGuard<'_, SimState>> {
        let mut state = self.state.lock();
        if !state.reachable {
            state.connected = false;
            return Err(SwitcherError::Connectivity("no response from switcher".into()));
        }
        if !state.connected {
            return Err(SwitcherError::NotConnected);
        }
        Ok(state)
    }

    fn read(&self, op: &'static str) -> SwitcherResult<parking_lot::MutexGuard<'_, SimState>> {
        let state = self.session()?;
        if state.fail_reads {
            return Err(SwitcherError::Command {
                op,
                reason: "read timed out".into(),
            });
        }
        Ok(state)
    }

    fn command(&self, op: &'static str) -> SwitcherResult<parking_lot::MutexGuard<'_, SimState>> {
        let state = self.session()?;
        if state.reject_commands {
            return Err(SwitcherError::Command {
                op,
                reason: "rejected by device".into(),
            });
        }
        Ok(state)
    }
}

impl Default for SimulatedSwitcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwitcherClient for SimulatedSwitcher {
    async fn connect(&self, address: &str) -> SwitcherResult<()> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        if !state.reachable {
            return Err(SwitcherError::Connectivity(format!("{} unreachable", address)));
        }
        state.connected = true;
        state.address = Some(address.to_string());
        debug!("Simulated switcher connected at {}", address);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.reachable && state.connected
    }

    async fn program_input(&self, me: u8) -> SwitcherResult<SourceId> {
        let state = self.read("program_input")?;
        Ok(state.program.get(&me).copied().unwrap_or(SourceId(1)))
    }

    async fn dsk_on_air(&self, keyer: u8) -> SwitcherResult<bool> {
        let state = self.read("dsk_on_air")?;
        Ok(state.keyers.get(&keyer).map(|k| k.on_air).unwrap_or(false))
    }

    async fn dsk_tie(&self, keyer: u8) -> SwitcherResult<bool> {
        let state = self.read("dsk_tie")?;
        Ok(state.keyers.get(&keyer).map(|k| k.tie).unwrap_or(false))
    }

    async fn set_dsk_tie(&self, keyer: u8, tie: bool) -> SwitcherResult<()> {
        let mut state = self.command("set_dsk_tie")?;
        state.keyers.entry(keyer).or_default().tie = tie;
        state.tie_writes.push(tie);
        Ok(())
    }

    async fn execute_auto_keyer(&self, keyer: u8) -> SwitcherResult<()> {
        let mut state = self.command("execute_auto_keyer")?;
        let dsk = state.keyers.entry(keyer).or_default();
        dsk.on_air = !dsk.on_air;
        Ok(())
    }

    async fn set_dsk_fill_source(&self, keyer: u8, source: SourceId) -> SwitcherResult<()> {
        let mut state = self.command("set_dsk_fill_source")?;
        state.keyers.entry(keyer).or_default().fill_source = source;
        Ok(())
    }

    async fn set_dsk_key_source(&self, keyer: u8, source: SourceId) -> SwitcherResult<()> {
        let mut state = self.command("set_dsk_key_source")?;
        state.keyers.entry(keyer).or_default().key_source = source;
        Ok(())
    }

    async fn set_dsk_masked(&self, keyer: u8, masked: bool) -> SwitcherResult<()> {
        let mut state = self.command("set_dsk_masked")?;
        state.keyers.entry(keyer).or_default().masked = masked;
        Ok(())
    }

    async fn set_dsk_pre_multiplied(&self, keyer: u8, pre_multiplied: bool) -> SwitcherResult<()> {
        let mut state = self.command("set_dsk_pre_multiplied")?;
        state.keyers.entry(keyer).or_default().pre_multiplied = pre_multiplied;
        Ok(())
    }

    async fn set_dsk_clip(&self, keyer: u8, clip: f32) -> SwitcherResult<()> {
        if !(0.0..=100.0).contains(&clip) {
            return Err(SwitcherError::Command {
                op: "set_dsk_clip",
                reason: format!("clip {} out of range", clip),
            });
        }
        let mut state = self.command("set_dsk_clip")?;
        state.keyers.entry(keyer).or_default().clip = clip;
        Ok(())
    }

    async fn set_dsk_gain(&self, keyer: u8, gain: f32) -> SwitcherResult<()> {
        if !(0.0..=100.0).contains(&gain) {
            return Err(SwitcherError::Command {
                op: "set_dsk_gain",
                reason: format!("gain {} out of range", gain),
            });
        }
        let mut state = self.command("set_dsk_gain")?;
        state.keyers.entry(keyer).or_default().gain = gain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switcher::{DskConfiguration, DSK_INDEX};

    #[tokio::test]
    async fn test_requires_session() {
        let sw = SimulatedSwitcher::new();
        assert_eq!(sw.dsk_tie(DSK_INDEX).await, Err(SwitcherError::NotConnected));

        sw.connect("10.0.0.1").await.unwrap();
        assert!(sw.is_connected());
        assert_eq!(sw.address().as_deref(), Some("10.0.0.1"));
        assert_eq!(sw.dsk_tie(DSK_INDEX).await, Ok(false));
    }

    #[tokio::test]
    async fn test_unreachable_drops_session() {
        let sw = SimulatedSwitcher::new();
        sw.connect("10.0.0.1").await.unwrap();
        sw.set_reachable(false);

        assert!(!sw.is_connected());
        assert!(sw.program_input(0).await.unwrap_err().is_connectivity());
        assert!(sw.connect("10.0.0.1").await.is_err());
        assert_eq!(sw.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_reads_keep_session() {
        let sw = SimulatedSwitcher::new();
        sw.connect("sim").await.unwrap();
        sw.fail_reads(true);

        assert!(sw.is_connected());
        assert!(sw.dsk_on_air(DSK_INDEX).await.is_err());
        assert!(sw.program_input(0).await.is_err());
        // Writes are unaffected
        assert_eq!(sw.set_dsk_tie(DSK_INDEX, true).await, Ok(()));

        sw.fail_reads(false);
        assert_eq!(sw.dsk_tie(DSK_INDEX).await, Ok(true));
    }

    #[tokio::test]
    async fn test_auto_keyer_toggles_on_air() {
        let sw = SimulatedSwitcher::new();
        sw.connect("sim").await.unwrap();

        sw.execute_auto_keyer(DSK_INDEX).await.unwrap();
        assert_eq!(sw.dsk_on_air(DSK_INDEX).await, Ok(true));
        sw.execute_auto_keyer(DSK_INDEX).await.unwrap();
        assert_eq!(sw.dsk_on_air(DSK_INDEX).await, Ok(false));
    }

    #[tokio::test]
    async fn test_rejected_command_keeps_state() {
        let sw = SimulatedSwitcher::new();
        sw.connect("sim").await.unwrap();
        sw.reject_commands(true);

        let err = sw.set_dsk_tie(DSK_INDEX, true).await.unwrap_err();
        assert!(!err.is_connectivity());
        assert!(sw.tie_writes().is_empty());
        assert!(!sw.keyer(DSK_INDEX).tie);
    }

    #[tokio::test]
    async fn test_apply_standard_configuration() {
        let sw = SimulatedSwitcher::new();
        sw.connect("sim").await.unwrap();

        DskConfiguration::STANDARD.apply(&sw, DSK_INDEX).await.unwrap();

        let dsk = sw.keyer(DSK_INDEX);
        assert_eq!(dsk.fill_source, SourceId(8));
        assert_eq!(dsk.key_source, SourceId::MP2_KEY);
        assert!(dsk.masked);
        assert!(!dsk.pre_multiplied);
        assert_eq!(dsk.clip, 90.5);
        assert_eq!(dsk.gain, 100.0);
    }
}
