//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! routed by [`CommandDispatcher`], which opens the cache once for all of
//! them.

pub mod cache;
pub mod dispatcher;
pub mod get;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
