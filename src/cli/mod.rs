pub mod evict;
pub mod scan;
pub mod seed;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nsevict")]
#[command(about = "Bulk namespace eviction for key-value stores", long_about = None)]
pub struct Cli {
    /// TOML config file; defaults apply when it does not exist
    #[arg(long, default_value = "nsevict.toml")]
    pub config: String,
    /// Database path, overrides `[store].path`
    #[arg(long)]
    pub db: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete every key of one or more namespaces, plus counter and index
    Evict(evict::EvictArgs),
    /// List the keys of a namespace without touching them
    Scan {
        namespace: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Store a string value under a key
    Put {
        key: String,
        value: String,
    },
    /// Create a secondary index, optionally registering documents with it
    Index {
        name: String,
        #[arg(long = "document")]
        documents: Vec<String>,
    },
}
