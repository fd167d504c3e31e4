use clap::{Parser, Subcommand};

/// Keeps git working copies in sync through a shared object cache.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Location of the shared object caches [default: $HOME/.mirrorsync/cache]
    #[clap(short, long)]
    pub cache_directory: Option<String>,
    /// Git executable used for working directory operations
    #[clap(long)]
    pub git_binary: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Clones or fetches a working directory and resets it to a ref
    Sync {
        /// Url of the upstream repository
        #[clap(short, long)]
        remote: String,
        /// Branch, tag or revision to check out
        #[clap(long = "ref")]
        reference: String,
        /// Directory under which the working directory lives
        #[clap(short, long, default_value = ".")]
        basedir: String,
        /// Name of the working directory [default: the ref]
        #[clap(short, long)]
        dirname: Option<String>,
    },
    /// Refreshes the object cache and prints the commit a ref resolves to
    Resolve {
        /// Url of the upstream repository
        #[clap(short, long)]
        remote: String,
        /// Branch, tag or revision to resolve
        #[clap(long = "ref")]
        reference: String,
    },
    /// Deletes all object caches
    ClearCache,
}
