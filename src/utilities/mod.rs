//! Configuration and time helpers shared by the integrations.

pub mod config;
pub mod time_window;
