// src/main.rs

use anyhow::Result;
use clap::Parser;
use supermarket_mirror::config::MirrorOptions;
use supermarket_mirror::mirror::MirrorRequest;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, SiteArgs};

/// Log filter for a `-v` count; `RUST_LOG` takes precedence
fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    })
}

fn site_options(sites: SiteArgs) -> MirrorOptions {
    MirrorOptions {
        source_site: sites.supermarket_site,
        target_site: sites.target_site,
        ..Default::default()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Mirror {
            cookbook,
            version,
            sites,
            download_dir,
            work_dir,
            delay,
            keep,
            deps,
            reps,
            user,
            key,
        } => {
            let request = MirrorRequest::from_args(&cookbook, version.as_deref());
            let options = MirrorOptions {
                download_dir,
                work_dir,
                delay,
                keep,
                deps,
                reps,
                user,
                client_key: key,
                ..site_options(sites)
            };
            commands::cmd_mirror(&request, &options, config_path)
        }
        Commands::Diff { cookbook, sites } => {
            commands::cmd_diff(cookbook.as_deref(), &site_options(sites), config_path)
        }
        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
