//! Library side of the `moorage` binary: argument parsing, logging setup and
//! the subcommands.

pub mod cli;
pub mod commands;
pub mod logging;
