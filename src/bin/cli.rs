//! PolyKV CLI
//!
//! Command-line glue for poking at a store with either backend. The core
//! contract lives in the library; this binary is example plumbing.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use polykv::{open_store, Backend, Context};

/// PolyKV CLI
#[derive(Parser, Debug)]
#[command(name = "polykv-cli")]
#[command(about = "CLI for the PolyKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./polykv_data")]
    dir: String,

    /// Backend engine (sled or redb)
    #[arg(short, long, default_value = "sled")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List key-value pairs under a prefix
    Scan {
        /// The key prefix (empty scans everything)
        #[arg(default_value = "")]
        prefix: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,polykv=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let backend: Backend = match args.backend.parse() {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    let store = match open_store(backend, &args.dir) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!("failed to open store: {}", err);
            std::process::exit(1);
        }
    };

    let ctx = Context::background();

    let result = match args.command {
        Commands::Get { key } => match store.get(&ctx, key.as_bytes()) {
            Ok(value) => {
                println!("{}", String::from_utf8_lossy(&value));
                Ok(())
            }
            Err(err) => Err(err),
        },
        Commands::Set { key, value } => store.put(&ctx, key.as_bytes(), value.as_bytes()),
        Commands::Del { key } => store.delete(&ctx, key.as_bytes()),
        Commands::Scan { prefix } => {
            let mut cursor = store.scan(prefix.as_bytes());
            while cursor.next() {
                if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
                    println!(
                        "{} = {}",
                        String::from_utf8_lossy(&key),
                        String::from_utf8_lossy(&value)
                    );
                }
            }
            let outcome = cursor.error().cloned().map_or(Ok(()), Err);
            cursor.release();
            outcome
        }
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }

    if let Err(err) = store.close() {
        eprintln!("error closing store: {}", err);
        std::process::exit(1);
    }
}
