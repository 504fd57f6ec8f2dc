//! CLI command handling module
//!
//! Handles all CLI subcommands; argument parsing lives in the binary.

mod commands;
mod config;
mod logging;
mod version;

pub use commands::{
    SyncRequest, handle_contexts, handle_detect, handle_get, handle_list, handle_refresh,
    handle_sync,
};
pub use config::{ConfigSubcommand, handle_config_command};
pub use logging::init_logging;
pub use version::display_version;
