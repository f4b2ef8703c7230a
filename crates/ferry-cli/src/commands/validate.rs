//! Validate command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ferry_core::Policy;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a policy file or a directory of `*.json` policy files
    #[arg(default_value = "policies")]
    pub path: PathBuf,

    /// Print every policy in its current, normalized shape (always on for a
    /// single file)
    #[arg(long)]
    pub print: bool,

    /// Show detailed output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs the validate command.
pub fn run(args: &ValidateArgs) -> Result<()> {
    info!(path = ?args.path, "Validating policies");

    println!("Ferry Policy Validator");
    println!("======================");
    println!("Path: {}", args.path.display());
    println!();

    let files = if args.path.is_file() {
        vec![args.path.clone()]
    } else if args.path.is_dir() {
        policy_files(&args.path)?
    } else {
        anyhow::bail!("Path does not exist: {}", args.path.display());
    };

    let print = args.print || args.path.is_file();
    let mut failed = 0;
    for path in &files {
        match load_policy(path) {
            Ok(policy) => {
                println!("✓ {}", path.display());
                if args.verbose {
                    print_summary(&policy);
                }
                if print {
                    println!("{}", serde_json::to_string_pretty(&policy)?);
                }
            }
            Err(e) => {
                failed += 1;
                println!("✗ {}: {e:#}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} policies failed validation", files.len());
    }

    println!("\n✓ All policies validated successfully");
    Ok(())
}

/// Reads a policy file, upgrading legacy rows, and validates it.
pub fn load_policy(path: &Path) -> Result<Policy> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let policy: Policy = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    policy.check()?;
    Ok(policy)
}

fn policy_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No policy files found in {}", dir.display());
    }
    Ok(files)
}

fn print_summary(policy: &Policy) {
    let trigger = policy.trigger_type().map_or("manual", |t| t.as_str());
    println!("  Name: {}", policy.name);
    println!("  Trigger: {trigger}");
    println!("  Enabled: {}", policy.enabled);
    println!("  Filters: {}", policy.filters.len());
    if !policy.dest_namespace.is_empty() {
        println!(
            "  Namespace: {} (replace count {})",
            policy.dest_namespace, policy.dest_namespace_replace_count
        );
    }
}
