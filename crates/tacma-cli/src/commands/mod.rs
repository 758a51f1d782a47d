//! CLI subcommand implementations.

pub mod archive;
pub mod export;
pub mod priority;
pub mod session;
pub mod status;
pub mod task;
pub mod util;
