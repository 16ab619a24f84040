//! ATEM DSK tie controller
//!
//! Supervises the downstream keyer tie of an ATEM switcher: keeps a
//! connection monitor running, exposes tie/auto-key operations and two
//! latches (smart tie and auto tie) that turn the tie off on their own.
//! Front ends are an HTTP API and a small desktop window.

pub mod api;
pub mod config;
pub mod controller;
pub mod desktop;
pub mod log_buffer;
pub mod switcher;
