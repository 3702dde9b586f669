use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "matryoshka",
    about = "Matryoshka -- single-file virtual file system containers",
    version
)]
pub struct Cli {
    /// The container file
    pub container: PathBuf,

    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with container settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show stored files
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Push a host file into the container
    Push(PushArgs),
    /// Pull a stored file out to the host
    Pull(PullArgs),
    /// Print part or all of a stored file to stdout
    Cat(CatArgs),
    /// Show the size of a stored file
    Size(SizeArgs),
    /// Delete a stored file
    #[command(visible_alias = "delete")]
    Rm(RmArgs),
    /// Rewrite the container without dead space
    Compact,
    /// Show container statistics
    Info,
}

impl Command {
    /// Whether the command may create the container file.
    pub fn creates_container(&self) -> bool {
        matches!(self, Command::Push(_))
    }
}

#[derive(Args)]
pub struct ListArgs {
    /// Only show files below this inner path
    pub prefix: Option<String>,
    /// Show size and chunk count
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args)]
pub struct PushArgs {
    /// The host file to push
    pub source: PathBuf,
    /// The inner path in the container
    pub destination: String,
    /// Chunk size in bytes; zero or negative stores one block
    #[arg(short, long, allow_negative_numbers = true)]
    pub chunk_size: Option<i64>,
}

#[derive(Args)]
pub struct PullArgs {
    /// The inner path in the container
    pub source: String,
    /// The host file to write
    pub destination: PathBuf,
    /// Overwrite the destination if it exists
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    /// Bytes to print; defaults to the rest of the file
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Args)]
pub struct SizeArgs {
    pub path: String,
}

#[derive(Args)]
pub struct RmArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
}
