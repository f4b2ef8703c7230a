//! CLI commands and argument parsing.

pub mod rewrite;
pub mod validate;

use clap::{Parser, Subcommand};

/// Ferry - replication policies for container registries
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Validate replication policy files
    Validate(validate::ValidateArgs),

    /// Show where a repository lands at the destination
    Rewrite(rewrite::RewriteArgs),

    /// Print version information
    Version,
}
