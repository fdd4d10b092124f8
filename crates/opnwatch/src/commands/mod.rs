//! Command handlers: bridge CLI args -> core integration -> output formatting.

pub mod config_cmd;
pub mod status;
pub mod watch;
