//! binprov CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use binprov_cli::cmd;
use binprov_cli::ui::Output;
use binprov_cli::{Cli, Commands};
use binprov_core::InstallOptions;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let dry_run = cli.dry_run;

    match &cli.command {
        Commands::Package { root, out_base } => cmd::package::package(root, out_base, dry_run),
        Commands::Install {
            source,
            sha256,
            overwrite,
            ignore_platform,
        } => {
            let options = InstallOptions {
                overwrite: *overwrite,
                ignore_platform: *ignore_platform,
            };
            cmd::install::install(&cli.resolve_prefix()?, source, sha256, options, dry_run)
        }
        Commands::Uninstall { target } => {
            cmd::uninstall::uninstall(&cli.resolve_prefix()?, target, dry_run)
        }
        Commands::Owner { file } => cmd::owner::owner(&cli.resolve_prefix()?, file),
        Commands::List => cmd::list::list(&cli.resolve_prefix()?),
        Commands::Locate { platform, product } => {
            cmd::locate::locate(&cli.resolve_prefix()?, platform.as_deref(), product)
        }
        Commands::Platform => cmd::platform::platform(),
        Commands::Hash { files } => cmd::hash::hash(files),
        Commands::Env => cmd::env::env(&cli.resolve_prefix()?),
    }
}
