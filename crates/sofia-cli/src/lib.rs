//! sofia-cli: Command-line interface for SOFIA devices
//!
//! Provides the `sofia` binary: listen for device announcements, log in
//! to a device and query it, and manage the configuration file.

pub mod commands;
pub mod output;
