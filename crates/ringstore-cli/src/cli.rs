use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ringstore",
    about = "RingStore: replicated key/value and object storage on a consistent-hash ring",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a storage node
    Serve(ServeArgs),
    /// Print the effective node configuration as TOML
    Config(ConfigArgs),
    /// Show which vnodes hold a key
    Lookup(LookupArgs),
}

/// Node settings shared by every command; flags override the config file.
#[derive(Args, Default)]
pub struct NodeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub rpc_addr: Option<String>,
    #[arg(long)]
    pub http_addr: Option<SocketAddr>,
    /// Ring member RPC address (repeatable)
    #[arg(long = "member")]
    pub members: Vec<String>,
    #[arg(long)]
    pub vnodes_per_host: Option<usize>,
    #[arg(long)]
    pub replicas: Option<usize>,
    /// Per-call RPC deadline in milliseconds
    #[arg(long)]
    pub rpc_timeout: Option<u64>,
    /// Store data on disk under this directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Do not queue repairs when an update finds diverging replicas
    #[arg(long)]
    pub no_heal: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args)]
pub struct LookupArgs {
    pub key: String,
    /// Number of replicas; defaults to the configured replication factor
    #[arg(short = 'n', long = "count")]
    pub count: Option<usize>,
    #[command(flatten)]
    pub node: NodeArgs,
}
