//! Subcommands that do not talk to the resource manager

pub mod init_config;
pub mod names;

pub use init_config::InitArgs;
