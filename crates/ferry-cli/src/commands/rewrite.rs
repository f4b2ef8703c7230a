//! Rewrite command implementation.

use anyhow::Result;
use clap::{Args, ValueEnum};

use ferry_core::model::PathComponentType;
use ferry_core::replace_namespace;

/// Destination repository path constraint.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum PathConstraint {
    /// Any number of components
    #[default]
    Unconstrained,
    /// Exactly `namespace/name`
    OnlyTwo,
    /// Two or more components
    AtLeastTwo,
}

impl From<PathConstraint> for PathComponentType {
    fn from(constraint: PathConstraint) -> Self {
        match constraint {
            PathConstraint::Unconstrained => Self::Unconstrained,
            PathConstraint::OnlyTwo => Self::OnlyTwo,
            PathConstraint::AtLeastTwo => Self::AtLeastTwo,
        }
    }
}

/// Arguments for the rewrite command.
#[derive(Args)]
pub struct RewriteArgs {
    /// Source repository, e.g. `a/b/c/image`
    pub repository: String,

    /// Destination namespace; empty keeps the source path
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    /// Leading source components to drop; -1 keeps only the last one
    #[arg(short = 'c', long, default_value_t = -1, allow_hyphen_values = true)]
    pub replace_count: i32,

    /// Path constraint of the destination registry
    #[arg(long, value_enum, default_value_t = PathConstraint::Unconstrained)]
    pub path_component_type: PathConstraint,
}

/// Runs the rewrite command.
pub fn run(args: &RewriteArgs) -> Result<()> {
    println!("{}", rewrite(args)?);
    Ok(())
}

fn rewrite(args: &RewriteArgs) -> Result<String> {
    Ok(replace_namespace(
        &args.repository,
        &args.namespace,
        args.replace_count,
        args.path_component_type.into(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    fn parse(argv: &[&str]) -> RewriteArgs {
        match Cli::parse_from(argv).command {
            Commands::Rewrite(args) => args,
            _ => panic!("expected the rewrite command"),
        }
    }

    #[test]
    fn test_default_keeps_last_component() {
        let args = parse(&["ferry", "rewrite", "a/b/c/image", "--namespace", "n"]);
        assert_eq!(args.replace_count, -1);
        assert_eq!(rewrite(&args).unwrap(), "n/image");
    }

    #[test]
    fn test_negative_and_explicit_counts() {
        let args = parse(&["ferry", "rewrite", "a/b/c/image", "-n", "n", "-c", "-1"]);
        assert_eq!(rewrite(&args).unwrap(), "n/image");

        let args = parse(&["ferry", "rewrite", "a/b/c/image", "-n", "n", "-c", "1"]);
        assert_eq!(rewrite(&args).unwrap(), "n/b/c/image");

        let args = parse(&["ferry", "rewrite", "a/b/c/image", "-n", "n", "-c", "4"]);
        assert!(rewrite(&args).is_err());
    }

    #[test]
    fn test_empty_namespace_is_identity() {
        let args = parse(&["ferry", "rewrite", "library/hello-world"]);
        assert_eq!(rewrite(&args).unwrap(), "library/hello-world");
    }

    #[test]
    fn test_path_constraint() {
        let args = parse(&[
            "ferry",
            "rewrite",
            "a/b/c/image",
            "-n",
            "n",
            "-c",
            "1",
            "--path-component-type",
            "only-two",
        ]);
        assert!(rewrite(&args).is_err());

        let args = parse(&[
            "ferry",
            "rewrite",
            "a/b/c/image",
            "-n",
            "n",
            "--path-component-type",
            "only-two",
        ]);
        assert_eq!(rewrite(&args).unwrap(), "n/image");
    }
}
