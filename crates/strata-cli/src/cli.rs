use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: content-addressed storage with pinning and garbage collection",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory
    #[arg(long, global = true, default_value = ".strata")]
    pub repo: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new repository
    Init(InitArgs),
    /// Add files or directories and pin them
    Add(AddArgs),
    /// Print the content of a file
    Cat(CatArgs),
    /// List the entries of a directory
    Ls(LsArgs),
    /// Manage pins
    Pin(PinArgs),
    /// Remove every block that is not pinned
    Gc(GcArgs),
}

#[derive(Args)]
pub struct InitArgs {
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Paths to add; `-` reads standard input
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Add directories recursively
    #[arg(short, long)]
    pub recursive: bool,
    /// Print only the final hashes
    #[arg(short, long)]
    pub quiet: bool,
    /// Show byte counts while reading files
    #[arg(short, long)]
    pub progress: bool,
    /// Use the trickle layout for files
    #[arg(short, long)]
    pub trickle: bool,
    /// Only compute hashes, store nothing
    #[arg(short = 'n', long)]
    pub only_hash: bool,
    /// Wrap all inputs in one directory
    #[arg(short, long)]
    pub wrap_with_directory: bool,
    /// Include files whose name starts with a dot
    #[arg(short = 'H', long)]
    pub hidden: bool,
    /// Gitignore-style pattern to leave out (repeatable)
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,
}

#[derive(Args)]
pub struct CatArgs {
    pub key: String,
}

#[derive(Args)]
pub struct LsArgs {
    pub key: String,
}

#[derive(Args)]
pub struct PinArgs {
    #[command(subcommand)]
    pub action: PinAction,
}

#[derive(Subcommand)]
pub enum PinAction {
    /// Pin a key (recursively unless --direct)
    Add {
        key: String,
        #[arg(long)]
        direct: bool,
    },
    /// Remove a pin
    Rm {
        key: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// List pins
    Ls {
        #[arg(long = "type", default_value = "all")]
        kind: PinFilter,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum PinFilter {
    All,
    Direct,
    Recursive,
}

#[derive(Args)]
pub struct GcArgs {
    /// Print nothing but errors
    #[arg(short, long)]
    pub quiet: bool,
}
