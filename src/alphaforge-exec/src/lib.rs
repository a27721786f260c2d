//! AlphaForge Exec - bridge to the external command-line engine.
//!
//! This crate provides:
//! - `CommandLine`: a trusted program/subcommand template plus caller arguments
//! - `CommandResult`: the structured outcome of a single external call
//! - `CommandRunner`: the seam the orchestration layer depends on
//! - `CommandBridge`: the tokio-process implementation of `CommandRunner`
//!
//! A bridge call never fails across its own boundary. Missing executables,
//! spawn faults, timeouts and non-zero exits are all reported in the
//! returned `CommandResult`.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod bridge;
mod command;
mod result;

pub use bridge::{CommandBridge, CommandRunner, DEFAULT_TIMEOUT};
pub use command::CommandLine;
pub use result::{CommandResult, TOOL_NOT_FOUND_EXIT_CODE};
