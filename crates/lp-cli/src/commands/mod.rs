//! CLI subcommand implementations.

mod data;
mod serve;

pub use data::{run_backup, run_migrate, run_restore};
pub use serve::run_server;
