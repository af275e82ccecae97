//! Command implementations for the CLI.

mod config;
mod info;
mod set;
mod watch;

pub use config::cmd_config;
pub use info::cmd_info;
pub use set::cmd_set;
pub use watch::{WatchArgs, cmd_watch};
