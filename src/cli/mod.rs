//! CLI module for accordo - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
