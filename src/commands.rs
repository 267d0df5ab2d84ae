// src/commands.rs
//! Command handlers for the supermarket-mirror CLI

use crate::cli::Cli;
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io::IsTerminal;
use std::path::Path;
use supermarket_mirror::catalog::Catalog;
use supermarket_mirror::config::{ConfigFile, MirrorConfig, MirrorOptions, resolve_sites};
use supermarket_mirror::mirror::{Mirror, MirrorRequest, compare_catalogs, compare_cookbook};
use supermarket_mirror::progress::ConsoleReporter;
use supermarket_mirror::repository::HttpSiteClient;
use tracing::info;

/// Mirror cookbooks to the target site
pub fn cmd_mirror(
    request: &MirrorRequest,
    options: &MirrorOptions,
    config_path: Option<&Path>,
) -> Result<()> {
    let file = ConfigFile::discover(config_path)?;
    let config = MirrorConfig::resolve(options, &file)?;
    info!("Running {:?}", request);

    let client = HttpSiteClient::new()?.with_progress(std::io::stdout().is_terminal());
    let reporter = ConsoleReporter::new();
    let summary = Mirror::new(&client, &config, &reporter).run(request)?;

    println!();
    println!("Summary: {}", summary);
    if summary.failed() > 0 {
        eprintln!(
            "WARNING: {} cookbook version(s) could not be uploaded to {}",
            summary.failed(),
            config.target_site
        );
    }
    Ok(())
}

/// Print what the target is missing
pub fn cmd_diff(
    cookbook: Option<&str>,
    options: &MirrorOptions,
    config_path: Option<&Path>,
) -> Result<()> {
    let file = ConfigFile::discover(config_path)?;
    let (source, target) = resolve_sites(options, &file)?;
    let client = HttpSiteClient::new()?;

    if let Some(cookbook) = cookbook {
        let diff = compare_cookbook(&client, &source, &target, cookbook)?;
        if diff.is_empty() {
            println!("No differences for {} between {} and {}", cookbook, source, target);
            return Ok(());
        }
        println!("Only on {} (source):", source);
        println!("{}", serde_json::to_string_pretty(&diff.added)?);
        println!("Only on {} (target):", target);
        println!("{}", serde_json::to_string_pretty(&diff.removed)?);
        return Ok(());
    }

    let diff = compare_catalogs(&client, &source, &target)?;
    if diff.is_empty() {
        println!("{} is in sync with {}", target, source);
        return Ok(());
    }

    print_catalog("Missing on the target", &diff.added)?;
    print_catalog("No longer on the source", &diff.removed)?;
    if !diff.invalid_dependency_changes.is_empty() {
        println!("Dependencies changed without a version bump:");
        for entry in &diff.invalid_dependency_changes {
            println!("  {}", entry);
        }
    }
    Ok(())
}

fn print_catalog(title: &str, catalog: &Catalog) -> Result<()> {
    if catalog.is_empty() {
        return Ok(());
    }
    println!(
        "{} ({} cookbooks, {} versions):",
        title,
        catalog.len(),
        catalog.version_count()
    );
    for (cookbook, entry) in catalog.packages() {
        println!("  {} {}", cookbook, entry.sorted_versions()?.join(", "));
    }
    Ok(())
}

/// Write a completion script to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
    Ok(())
}
