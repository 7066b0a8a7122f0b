use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "osd", about = "Object storage daemon and peer client", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

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
    /// Run a daemon until it receives a shutdown message or Ctrl-C
    Serve(ServeArgs),
    /// Check whether a daemon answers pings
    Ping(PeerArgs),
    /// Write an object
    Put(PutArgs),
    /// Read an object
    Get(GetArgs),
    /// Show an object's size
    Stat(ObjectArgs),
    /// Delete an object
    Rm(ObjectArgs),
    /// Ask a daemon to shut down
    Shutdown(PeerArgs),
    /// Print the effective daemon configuration
    Config(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// TOML config file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub whoami: Option<u32>,

    #[arg(long)]
    pub bind: Option<SocketAddr>,

    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep objects in memory instead of on disk
    #[arg(long)]
    pub memory: bool,

    /// Identities that never answer pings (repeatable)
    #[arg(long = "play-dead")]
    pub play_dead: Vec<u32>,
}

#[derive(Args, Clone, Debug)]
pub struct PeerArgs {
    /// Daemon address
    #[arg(long, default_value = "127.0.0.1:6800")]
    pub addr: SocketAddr,

    /// Identity to present to the daemon
    #[arg(long, default_value_t = 1000)]
    pub id: u32,

    /// Seconds to wait for a reply
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

#[derive(Args, Clone, Debug)]
pub struct ObjectArgs {
    #[command(flatten)]
    pub peer: PeerArgs,

    /// Object name, or a 64-character hex object id
    pub object: String,
}

#[derive(Args, Clone, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// File to upload
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,

    /// Inline data to upload
    #[arg(long)]
    pub data: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub offset: u64,
}

#[derive(Args, Clone, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Bytes to read; defaults to the whole object
    #[arg(long)]
    pub length: Option<u64>,

    /// Write the bytes here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
