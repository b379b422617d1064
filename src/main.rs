use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

use ferry::commands::connect::{self, ClientConfig};
use ferry::commands::serve::{self, ServerConfig};
use ferry::{DEFAULT_CLIENT_ROOT, DEFAULT_KEY, DEFAULT_PORT, DEFAULT_SERVER_ROOT};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Minimal file sharing over an obfuscated TCP stream", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the file-sharing server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Directory the served files live in
        #[arg(long, default_value = DEFAULT_SERVER_ROOT)]
        root: PathBuf,
        /// Obfuscation key (must match the clients')
        #[arg(long, default_value = DEFAULT_KEY)]
        key: String,
        /// Optional username:password per line credentials file
        #[arg(long)]
        users: Option<PathBuf>,
        /// Optional cap on concurrent client sessions
        #[arg(long)]
        max_connections: Option<usize>,
    },
    /// Connect to a server interactively
    Connect {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Server port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Directory downloads land in and uploads are read from
        #[arg(long, default_value = DEFAULT_CLIENT_ROOT)]
        root: PathBuf,
        /// Obfuscation key (must match the server's)
        #[arg(long, default_value = DEFAULT_KEY)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Configure logging based on verbose flag
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
        log::info!("Verbose logging enabled");
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    match cli.command {
        Commands::Serve {
            port,
            root,
            key,
            users,
            max_connections,
        } => {
            serve::run(ServerConfig {
                port,
                root,
                key,
                users_file: users,
                max_connections,
            })
            .await?;
        }
        Commands::Connect {
            host,
            port,
            root,
            key,
        } => {
            connect::run(ClientConfig {
                host,
                port,
                root,
                key,
            })
            .await?;
        }
    }

    Ok(())
}
