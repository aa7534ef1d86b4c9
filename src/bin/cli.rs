//! AtlasLog CLI
//!
//! Command-line tool for inspecting and editing a log storage directory.

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use atlaslog::{naming, LogStorage, Result, StorageMap};

/// AtlasLog CLI
#[derive(Parser, Debug)]
#[command(name = "atlaslog-cli")]
#[command(about = "Inspect and edit an AtlasLog storage directory")]
#[command(version)]
struct Args {
    /// Storage root directory
    #[arg(short, long, default_value = "./atlaslog_data")]
    storage_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List recovered maps and their ids (deletes leftover temp maps)
    List,

    /// Get a value from a map
    Get {
        /// The map name
        map: String,

        /// The key to get
        key: String,
    },

    /// Set a key-value pair in a map
    Put {
        /// The map name
        map: String,

        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Create a temporary map and print its name
    Temp,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlaslog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasLog CLI v{}", atlaslog::VERSION);
    tracing::info!("Storage directory: {}", args.storage_name);

    if let Err(e) = run(args) {
        tracing::error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let storage = LogStorage::open_path(Path::new(&args.storage_name))?;

    match args.command {
        Commands::List => {
            let mut ids: Vec<(String, u32)> = storage.recovered_ids().into_iter().collect();
            ids.sort();
            for (name, id) in ids {
                println!("{}\t{}", name, id);
            }
        }
        Commands::Get { map, key } => {
            let map = storage.open_map(&map, None, None)?;
            match map.get(key.as_bytes()) {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
        }
        Commands::Put { map, key, value } => {
            let map = storage.open_map(&map, None, None)?;
            map.put(key.into_bytes(), value.into_bytes())?;
            storage.commit()?;
            println!("OK");
        }
        Commands::Temp => {
            let map = storage.create_temp_map()?;
            println!("{}", naming::map_full_name(map.name(), map.id()));
        }
    }

    storage.close()
}
