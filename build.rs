// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: source site
fn supermarket_site_arg() -> Arg {
    Arg::new("supermarket_site")
        .short('m')
        .long("supermarket-site")
        .value_name("SUPERMARKET_SITE")
        .help("(Source) Supermarket site [default: https://supermarket.chef.io]")
}

/// Common argument: target site
fn target_site_arg() -> Arg {
    Arg::new("target_site")
        .short('t')
        .long("target-site")
        .value_name("TARGET_SITE")
        .help("(Destination/target) Supermarket site")
}

fn build_cli() -> Command {
    Command::new("supermarket-mirror")
        .version(env!("CARGO_PKG_VERSION"))
        .author("supermarket-mirror contributors")
        .about("Mirror cookbooks from one Chef Supermarket to another")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Configuration file (default: <config dir>/supermarket-mirror/config.toml)"),
        )
        .subcommand(
            Command::new("mirror")
                .about("Mirror cookbooks to the target Supermarket")
                .arg(Arg::new("cookbook").required(true).help("Cookbook name, or \"all\""))
                .arg(Arg::new("version").help("Version, or \"all\" (default: latest)"))
                .arg(supermarket_site_arg())
                .arg(target_site_arg())
                .arg(
                    Arg::new("download_dir")
                        .short('d')
                        .long("dir")
                        .help("Directory for storing (--keep) cookbooks failing to process"),
                )
                .arg(
                    Arg::new("work_dir")
                        .long("work-dir")
                        .help("Directory to stage downloads in (default: system temp dir)"),
                )
                .arg(
                    Arg::new("delay")
                        .long("delay")
                        .value_name("SECONDS")
                        .help("Delay in seconds after each processed version, to throttle requests"),
                )
                .arg(
                    Arg::new("keep")
                        .long("keep")
                        .action(ArgAction::SetTrue)
                        .help("Keep cookbooks that were downloaded but failed to upload"),
                )
                .arg(
                    Arg::new("deps")
                        .long("deps")
                        .action(ArgAction::SetTrue)
                        .help("Also process the latest version's dependencies"),
                )
                .arg(
                    Arg::new("reps")
                        .long("reps")
                        .action(ArgAction::SetTrue)
                        .help("Also process replacements of deprecated cookbooks (not implemented)"),
                )
                .arg(Arg::new("user").short('u').long("user").help("Client name used for uploads"))
                .arg(Arg::new("key").short('k').long("key").help("Client key belonging to --user")),
        )
        .subcommand(
            Command::new("diff")
                .about("Show what the target is missing without transferring anything")
                .arg(
                    Arg::new("cookbook")
                        .long("cookbook")
                        .help("Compare one cookbook's full records instead of the catalogs"),
                )
                .arg(supermarket_site_arg())
                .arg(target_site_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("supermarket-mirror.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
