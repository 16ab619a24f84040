//! Switcher device client
//!
//! The controller talks to the switcher exclusively through the [`SwitcherClient`]
//! trait. Implementations own the wire protocol; the controller only sees
//! field-level reads/writes and typed errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod simulated;

pub use simulated::SimulatedSwitcher;

/// Downstream keyer driven by this controller (single fixed keyer)
pub const DSK_INDEX: u8 = 0;

/// Mix effect bus whose program input is tracked
pub const PROGRAM_ME: u8 = 0;

/// Video source identifier as reported by the switcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u16);

impl SourceId {
    /// Media player 2 key output
    pub const MP2_KEY: SourceId = SourceId(3021);
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SourceId {
    fn from(value: u16) -> Self {
        SourceId(value)
    }
}

/// Errors raised by a switcher client
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwitcherError {
    /// No session is established with the device
    #[error("switcher not connected")]
    NotConnected,

    /// Device unreachable or the session dropped mid-call
    #[error("switcher connection failed: {0}")]
    Connectivity(String),

    /// Transport succeeded but the device (or client) rejected the command
    #[error("{op} rejected: {reason}")]
    Command { op: &'static str, reason: String },
}

impl SwitcherError {
    /// True for errors that mean the link itself is gone
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SwitcherError::NotConnected | SwitcherError::Connectivity(_))
    }
}

pub type SwitcherResult<T> = std::result::Result<T, SwitcherError>;

/// Field-level access to a switcher
///
/// Every call may block on network I/O and may fail. Methods take `&self`
/// so a single client can be shared as `Arc<dyn SwitcherClient>`.
#[async_trait]
pub trait SwitcherClient: Send + Sync {
    /// Open a session with the device at `address`
    async fn connect(&self, address: &str) -> SwitcherResult<()>;

    /// Whether a session is currently established
    fn is_connected(&self) -> bool;

    async fn program_input(&self, me: u8) -> SwitcherResult<SourceId>;

    async fn dsk_on_air(&self, keyer: u8) -> SwitcherResult<bool>;

    async fn dsk_tie(&self, keyer: u8) -> SwitcherResult<bool>;

    async fn set_dsk_tie(&self, keyer: u8, tie: bool) -> SwitcherResult<()>;

    /// Run the keyer's auto transition (toggles on-air)
    async fn execute_auto_keyer(&self, keyer: u8) -> SwitcherResult<()>;

    async fn set_dsk_fill_source(&self, keyer: u8, source: SourceId) -> SwitcherResult<()>;

    async fn set_dsk_key_source(&self, keyer: u8, source: SourceId) -> SwitcherResult<()>;

    async fn set_dsk_masked(&self, keyer: u8, masked: bool) -> SwitcherResult<()>;

    async fn set_dsk_pre_multiplied(&self, keyer: u8, pre_multiplied: bool) -> SwitcherResult<()>;

    /// Clip level in percent
    async fn set_dsk_clip(&self, keyer: u8, clip: f32) -> SwitcherResult<()>;

    /// Gain in percent
    async fn set_dsk_gain(&self, keyer: u8, gain: f32) -> SwitcherResult<()>;
}

/// Keyer settings applied by "Set DSK"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DskConfiguration {
    pub fill_source: SourceId,
    pub key_source: SourceId,
    pub masked: bool,
    pub pre_multiplied: bool,
    pub clip: f32,
    pub gain: f32,
}

impl DskConfiguration {
    /// Graphics fill on input 8, keyed by media player 2
    pub const STANDARD: DskConfiguration = DskConfiguration {
        fill_source: SourceId(8),
        key_source: SourceId::MP2_KEY,
        masked: true,
        pre_multiplied: false,
        clip: 90.5,
        gain: 100.0,
    };

    /// Write every field to `keyer`, stopping at the first failure
    pub async fn apply(&self, client: &dyn SwitcherClient, keyer: u8) -> SwitcherResult<()> {
        client.set_dsk_fill_source(keyer, self.fill_source).await?;
        client.set_dsk_key_source(keyer, self.key_source).await?;
        client.set_dsk_masked(keyer, self.masked).await?;
        client.set_dsk_pre_multiplied(keyer, self.pre_multiplied).await?;
        client.set_dsk_clip(keyer, self.clip).await?;
        client.set_dsk_gain(keyer, self.gain).await?;
        Ok(())
    }
}
