// src/cli.rs
//! CLI definitions for supermarket-mirror
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "supermarket-mirror")]
#[command(author = "supermarket-mirror contributors")]
#[command(version)]
#[command(about = "Mirror cookbooks from one Chef Supermarket to another", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: <config dir>/supermarket-mirror/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Source and target site selection
#[derive(Args, Debug, Clone, Default)]
pub struct SiteArgs {
    /// (Source) Supermarket site [default: https://supermarket.chef.io]
    #[arg(short = 'm', long = "supermarket-site")]
    pub supermarket_site: Option<String>,

    /// (Destination/target) Supermarket site
    #[arg(short, long)]
    pub target_site: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror cookbooks to the target Supermarket
    ///
    /// `mirror all` mirrors every cookbook version the target is missing,
    /// `mirror COOKBOOK all` every missing version of one cookbook,
    /// `mirror COOKBOOK VERSION` one version and `mirror COOKBOOK` the latest.
    Mirror {
        /// Cookbook name, or "all"
        cookbook: String,

        /// Version, or "all" (default: latest)
        version: Option<String>,

        #[command(flatten)]
        sites: SiteArgs,

        /// Directory for storing (--keep) cookbooks failing to process
        #[arg(short = 'd', long = "dir")]
        download_dir: Option<PathBuf>,

        /// Directory to stage downloads in (default: system temp dir)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Delay in seconds after each processed version, to throttle requests
        #[arg(long, value_name = "SECONDS")]
        delay: Option<u64>,

        /// Keep cookbooks that were downloaded but failed to upload
        #[arg(long)]
        keep: bool,

        /// Also process the latest version's dependencies
        #[arg(long)]
        deps: bool,

        /// Also process replacements of deprecated cookbooks (not implemented)
        #[arg(long)]
        reps: bool,

        /// Client name used for uploads
        #[arg(short, long)]
        user: Option<String>,

        /// Client key belonging to --user
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Show what the target is missing without transferring anything
    Diff {
        /// Compare one cookbook's full records instead of the catalogs
        #[arg(long)]
        cookbook: Option<String>,

        #[command(flatten)]
        sites: SiteArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
