use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::auth::AuthGate;
use crate::session::Session;
use crate::storage;

/// Server startup configuration, resolved from the CLI.
pub struct ServerConfig {
    pub port: u16,
    pub root: PathBuf,
    pub key: String,
    /// Optional `username:password` per line credentials file; the
    /// built-in table is used when absent.
    pub users_file: Option<PathBuf>,
    /// Optional cap on concurrent sessions. `None` preserves the
    /// reference behavior: unbounded, untracked fire-and-forget tasks.
    pub max_connections: Option<usize>,
}

/// Runs the connection acceptor.
///
/// One independently scheduled task services each accepted connection;
/// the accept loop never blocks on a session's lifetime. Sessions share
/// only the immutable credential table and the storage directory, so no
/// cross-task synchronization exists in the protocol logic. A peer that
/// stops sending mid-protocol parks its task on the blocked receive
/// indefinitely; that cost is accepted per dangling connection.
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn Error>> {
    storage::ensure_root(&config.root)?;

    let gate = Arc::new(match &config.users_file {
        Some(path) => AuthGate::from_file(path)?,
        None => AuthGate::with_default_users(),
    });

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    println!("Server listening on {}", bind_addr);
    info!("server started on {}, root {}", bind_addr, config.root.display());

    let session_permits = config
        .max_connections
        .map(|limit| Arc::new(Semaphore::new(limit)));

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("new client connection from {}", addr);

        // With a connection cap, the acceptor waits here for a free
        // permit; the permit rides along and frees on any session exit.
        let permit = match &session_permits {
            Some(semaphore) => Some(semaphore.clone().acquire_owned().await?),
            None => None,
        };

        let session = Session::new(
            stream,
            config.key.as_bytes(),
            gate.clone(),
            config.root.clone(),
            addr.to_string(),
        );
        debug!("spawning session task for {}", addr);
        tokio::spawn(async move {
            session.run().await;
            drop(permit);
        });
    }
}
