use std::{error::Error, path::PathBuf};

use clap::Parser;
use mirrorsync::{
    cli::args::{CliArgs, Command},
    MirrorSync, MirrorSyncConfig,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = MirrorSyncConfig::load()?;

    let mut builder = MirrorSync::builder();
    if let Some(cache_directory) = cli_args
        .cache_directory
        .map(PathBuf::from)
        .or(config.cache_dir)
    {
        builder = builder.cache_directory(cache_directory);
    }
    if let Some(git_binary) = cli_args
        .git_binary
        .map(PathBuf::from)
        .or(config.git_binary)
    {
        builder = builder.git_binary(git_binary);
    }
    if let Some(ttl) = config.cache_ttl {
        builder = builder.cache_ttl(ttl);
    }
    let mirrorsync = builder.try_build()?;

    match cli_args.cmd {
        Command::Sync {
            remote,
            reference,
            basedir,
            dirname,
        } => {
            mirrorsync.sync(&reference, &remote, basedir, dirname)?;
            Ok(())
        }
        Command::Resolve { remote, reference } => {
            let commit = mirrorsync.resolve(&remote, &reference)?;
            println!("{commit}");
            Ok(())
        }
        Command::ClearCache => mirrorsync.clear_cache(),
    }
}
