//! Desktop window
//!
//! Draws the on-air and tie state and turns key presses into
//! [`DesktopCommand`]s. All state shown comes from [`DesktopUpdate`]s.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

use super::events::{air_label, tie_label, Alert, SmartTieDebounce};
use super::{DesktopCommand, DesktopUpdate};
use crate::controller::StatusSnapshot;

pub struct DeskApp {
    cmd_tx: mpsc::UnboundedSender<DesktopCommand>,
    update_rx: crossbeam::channel::Receiver<DesktopUpdate>,
    status: Option<StatusSnapshot>,
    alert: Option<Alert>,
    debounce: SmartTieDebounce,
    /// Shift state on the previous frame (smart tie fires on press)
    shift_down: bool,
}

impl DeskApp {
    pub fn new(
        cmd_tx: mpsc::UnboundedSender<DesktopCommand>,
        update_rx: crossbeam::channel::Receiver<DesktopUpdate>,
        smart_tie_debounce: Duration,
    ) -> Self {
        Self {
            cmd_tx,
            update_rx,
            status: None,
            alert: None,
            debounce: SmartTieDebounce::new(smart_tie_debounce),
            shift_down: false,
        }
    }

    fn send(&self, cmd: DesktopCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("Desktop handler gone, dropping {:?}", cmd);
        }
    }

    fn drain_updates(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                DesktopUpdate::Status(status) => self.status = Some(status),
                DesktopUpdate::Alert(alert) => self.alert = Some(alert),
            }
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        // Keys are ignored while a dialog is open
        if self.alert.is_some() {
            return;
        }

        let (space, tie_key, shift) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Space),
                i.key_pressed(egui::Key::T),
                i.modifiers.shift,
            )
        });

        if space {
            self.send(DesktopCommand::AutoKey);
        }
        if tie_key {
            self.send(DesktopCommand::AutoTie);
        }
        if shift && !self.shift_down && self.debounce.accept(Instant::now()) {
            self.send(DesktopCommand::SmartTie);
        }
        self.shift_down = shift;
    }

    fn draw_status(&self, ui: &mut egui::Ui) {
        let (air, fill) = match &self.status {
            None => ("Connecting...", egui::Color32::GRAY),
            Some(status) if !status.connected => (air_label(status), egui::Color32::GRAY),
            Some(status) if status.on_air => (air_label(status), egui::Color32::DARK_GREEN),
            Some(status) => (air_label(status), egui::Color32::DARK_RED),
        };

        egui::Frame::none()
            .fill(fill)
            .inner_margin(egui::Margin::symmetric(24.0, 16.0))
            .show(ui, |ui| {
                ui.set_min_width(260.0);
                ui.label(
                    egui::RichText::new(air)
                        .size(22.0)
                        .color(egui::Color32::WHITE),
                );
            });

        ui.add_space(10.0);
        let tie = self.status.as_ref().map(tie_label).unwrap_or("Unknown");
        ui.label(egui::RichText::new(format!("TIE: {}", tie)).size(16.0));

        let info = match &self.status {
            Some(status) if status.connected => "Connected",
            Some(_) => "Can't reach ATEM switcher",
            None => "",
        };
        ui.label(egui::RichText::new(info).color(egui::Color32::GRAY));
    }

    fn draw_alert(&mut self, ctx: &egui::Context) {
        let Some(alert) = self.alert.clone() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(alert.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(alert.message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed || ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.alert = None;
        }
    }
}

impl eframe::App for DeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_updates();
        self.handle_keys(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(12.0);
                self.draw_status(ui);
                ui.add_space(10.0);
                if ui
                    .button(egui::RichText::new("Set DSK").size(15.0))
                    .clicked()
                {
                    self.send(DesktopCommand::SetDsk);
                }
            });
        });

        self.draw_alert(ctx);

        // Updates arrive from another thread; keep polling for them
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
