use clap::Parser;
use log::{error, info, warn};
use server::gamecode::CodeGenerator;
use server::network::{Server, ServerConfig};
use server::store::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Main-method of the game server.
/// Parses command-line arguments, loads the word list and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Hours a game or session survives without being written
        #[clap(long, default_value = "12")]
        ttl_hours: u64,
        /// Seconds between sweeps of expired records
        #[clap(long, default_value = "60")]
        sweep_secs: u64,
        /// Word list used to build game mnemonics, one word per line
        #[clap(short, long)]
        words: Option<PathBuf>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let codes = match &args.words {
        Some(path) => match CodeGenerator::from_file(path) {
            Ok(codes) => {
                info!("Loaded {} mnemonic words from {}", codes.word_count(), path.display());
                codes
            }
            Err(e) => {
                warn!("Could not read word list {}: {}", path.display(), e);
                CodeGenerator::default()
            }
        },
        None => CodeGenerator::default(),
    };

    let config = ServerConfig {
        ttl: Duration::from_secs(args.ttl_hours * 60 * 60),
        sweep_interval: Duration::from_secs(args.sweep_secs.max(1)),
        codes,
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, Arc::new(MemoryStore::new()), config).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
