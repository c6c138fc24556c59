pub mod config;
pub mod error;
pub mod host;
pub mod tool;
pub mod tool_config;
pub mod transport;
