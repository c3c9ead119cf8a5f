//! Subcommand implementations.

pub mod env;
pub mod hash;
pub mod install;
pub mod list;
pub mod locate;
pub mod owner;
pub mod package;
pub mod platform;
pub mod uninstall;
