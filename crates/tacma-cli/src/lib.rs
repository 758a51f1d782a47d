//! Tacma CLI library.
//!
//! Argument parsing, configuration and the commands behind the `tacma`
//! binary.

mod cli;
pub mod commands;
mod config;
mod store;

pub use cli::{Cli, Commands, PriorityLogAction, SessionAction};
pub use config::Config;
pub use store::Store;
