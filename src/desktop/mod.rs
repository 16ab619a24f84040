//! Desktop front end
//!
//! A small egui window for the operator's keyboard:
//! - Space runs the auto keyer
//! - Shift toggles smart tie (debounced)
//! - `T` toggles auto tie
//! - the "Set DSK" button applies the keyer configuration
//!
//! The window runs on the main thread; controller calls run on the Tokio
//! runtime in [`DesktopHandler`]. The two sides talk over channels.

use anyhow::Result;
use tokio::sync::mpsc;

use crate::controller::{StatusSnapshot, TieController};

pub mod app;
pub mod events;
pub mod handler;

pub use app::DeskApp;
pub use events::{Alert, ConnectionEdge, Edge, SmartTieDebounce};
pub use handler::DesktopHandler;

/// Commands sent from the window to the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopCommand {
    AutoKey,
    SmartTie,
    AutoTie,
    SetDsk,
}

/// Updates sent from the runtime to the window
#[derive(Debug, Clone, PartialEq)]
pub enum DesktopUpdate {
    /// Periodic status refresh
    Status(StatusSnapshot),
    /// A command failed and the operator should be told
    Alert(Alert),
}

/// Run the desktop window; blocks until it is closed
///
/// Must be called from within a multi-threaded Tokio runtime.
pub fn run(controller: TieController, switcher_ip: &str) -> Result<()> {
    let log = controller.log().clone();
    log.info(format!(
        " [*][ConnectionHandler] Searching for ATEM switcher at {}",
        switcher_ip
    ));
    log.info(" [*][ConnectionHandler] Are you connected to the switcher network?");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();

    let debounce = controller.timings().smart_tie_debounce();
    let handler = DesktopHandler::new(controller, update_tx);
    let handler_task = tokio::spawn(handler.run(cmd_rx));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ATEM DSK Controller")
            .with_inner_size([360.0, 260.0])
            .with_min_inner_size([300.0, 220.0]),
        ..Default::default()
    };

    let result = tokio::task::block_in_place(|| {
        eframe::run_native(
            "ATEM DSK Controller",
            native_options,
            Box::new(move |_cc| Ok(Box::new(DeskApp::new(cmd_tx, update_rx, debounce)))),
        )
    });

    handler_task.abort();
    result.map_err(|e| anyhow::anyhow!("Desktop window failed: {}", e))
}
