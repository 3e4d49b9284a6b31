//! CLI command implementations

mod config;
mod discover;
mod query;

pub use config::{config_init, config_path, config_show, load_config_file};
pub use discover::discover_command;
pub use query::{query_command, QueryKind};
