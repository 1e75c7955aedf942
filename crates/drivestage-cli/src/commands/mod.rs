//! Subcommands of the `drivestage` binary

pub mod mover;
pub mod run;
pub mod scan;
pub mod watch;
