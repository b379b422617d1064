use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::AuthGate;
use crate::channel::MessageChannel;
use crate::protocol::{
    Command, AUTH_FAIL, AUTH_SUCCESS, ERR_AUTH_REQUIRED, ERR_UNKNOWN_COMMAND,
};
use crate::storage;
use crate::transfer;

/// One server-side connection lifetime: the per-session command
/// dispatcher sitting on top of the authentication gate and the
/// transfer engine.
///
/// Each session is owned exclusively by the task servicing it; the only
/// shared state is the read-only credential table and the storage
/// directory on disk. The loop reads exactly one command message per
/// iteration and fully resolves it before reading the next, so a
/// session is never in more than one active transfer.
pub struct Session<S> {
    channel: MessageChannel<S>,
    gate: Arc<AuthGate>,
    root: PathBuf,
    peer: String,
    authenticated: bool,
    username: Option<String>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(stream: S, key: &[u8], gate: Arc<AuthGate>, root: PathBuf, peer: String) -> Self {
        Session {
            channel: MessageChannel::new(stream, key),
            gate,
            root,
            peer,
            authenticated: false,
            username: None,
        }
    }

    /// Runs the session to completion. Faults are caught here, at the
    /// session boundary: they are logged and close this connection
    /// without reaching the acceptor or any other session.
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => info!(
                "[{}] connection closed (user: {})",
                self.peer,
                self.username.as_deref().unwrap_or("-")
            ),
            Err(e) => warn!("[{}] session ended with error: {}", self.peer, e),
        }
    }

    async fn serve(&mut self) -> io::Result<()> {
        info!("[{}] new client connected", self.peer);

        loop {
            let raw = match self.channel.recv().await? {
                Some(raw) => raw,
                None => {
                    info!("[{}] client disconnected", self.peer);
                    return Ok(());
                }
            };
            let line = String::from_utf8_lossy(&raw);
            debug!("[{}] received command: {}", self.peer, line);
            let command = Command::parse(&line);

            if !self.authenticated {
                match command {
                    Command::Auth { username, password } => {
                        self.handle_auth(&username, &password).await?
                    }
                    _ => self.channel.send_str(ERR_AUTH_REQUIRED).await?,
                }
                continue;
            }

            match command {
                Command::List => self.handle_list().await?,
                Command::Download { filename } => {
                    transfer::serve_download(&mut self.channel, &self.root, &filename).await?
                }
                Command::Upload { filename, size } => {
                    transfer::serve_upload(&mut self.channel, &self.root, &filename, size).await?
                }
                Command::Quit => {
                    info!("[{}] client sent QUIT, disconnecting", self.peer);
                    return Ok(());
                }
                // A second AUTH after authenticating is not part of the
                // grammar and falls through with everything else.
                Command::Auth { .. } | Command::Unknown => {
                    self.channel.send_str(ERR_UNKNOWN_COMMAND).await?
                }
            }
        }
    }

    async fn handle_auth(&mut self, username: &str, password: &str) -> io::Result<()> {
        if self.gate.authenticate(username, password) {
            self.authenticated = true;
            self.username = Some(username.to_string());
            info!("[{}] user '{}' authenticated", self.peer, username);
            self.channel.send_str(AUTH_SUCCESS).await
        } else {
            info!("[{}] failed auth attempt for user '{}'", self.peer, username);
            self.channel.send_str(AUTH_FAIL).await
        }
    }

    async fn handle_list(&mut self) -> io::Result<()> {
        let entries = storage::list_entries(&self.root)?;
        self.channel.send_str(&entries.join("\n")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DOWNLOAD_DONE, OK_DOWNLOAD, START, UPLOAD_SUCCESS};
    use std::fs;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    const KEY: &[u8] = b"mysecretkey";

    fn temp_root(tag: &str) -> PathBuf {
        let root =
            std::env::temp_dir().join(format!("test_ferry_session_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn spawn_session(root: PathBuf) -> (MessageChannel<DuplexStream>, JoinHandle<()>) {
        let (server_end, client_end) = duplex(256 * 1024);
        let session = Session::new(
            server_end,
            KEY,
            Arc::new(AuthGate::with_default_users()),
            root,
            "test-peer".to_string(),
        );
        let handle = tokio::spawn(session.run());
        (MessageChannel::new(client_end, KEY), handle)
    }

    async fn authenticate(client: &mut MessageChannel<DuplexStream>) {
        client.send_str("AUTH user pass123").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), AUTH_SUCCESS);
    }

    #[tokio::test]
    async fn test_commands_rejected_before_auth() {
        let root = temp_root("unauth");
        let (mut client, handle) = spawn_session(root.clone());

        for command in ["LIST", "DOWNLOAD a.txt", "UPLOAD a.txt 5", "FOO"] {
            client.send_str(command).await.unwrap();
            assert_eq!(
                client.recv_text().await.unwrap().unwrap(),
                ERR_AUTH_REQUIRED
            );
        }

        // Rejection never closes the connection; auth still works.
        authenticate(&mut client).await;

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_failed_auth_allows_retry() {
        let root = temp_root("retry");
        let (mut client, handle) = spawn_session(root.clone());

        client.send_str("AUTH user wrong").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), AUTH_FAIL);

        client.send_str("AUTH nouser x").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), AUTH_FAIL);

        authenticate(&mut client).await;

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_list_returns_newline_joined_names() {
        let root = temp_root("list");
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();

        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("LIST").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), "a.txt\nb.txt");

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_session_open() {
        let root = temp_root("unknown");
        fs::write(root.join("a.txt"), b"a").unwrap();

        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("FOO").await.unwrap();
        assert_eq!(
            client.recv_text().await.unwrap().unwrap(),
            ERR_UNKNOWN_COMMAND
        );

        // The session still services further commands.
        client.send_str("LIST").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), "a.txt");

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_reauth_after_success_is_unknown() {
        let root = temp_root("reauth");
        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("AUTH user pass123").await.unwrap();
        assert_eq!(
            client.recv_text().await.unwrap().unwrap(),
            ERR_UNKNOWN_COMMAND
        );

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_quit_closes_session() {
        let root = temp_root("quit");
        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("QUIT").await.unwrap();
        handle.await.unwrap();

        assert_eq!(client.recv().await.unwrap(), None);
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_full_download_through_session() {
        let root = temp_root("download");
        fs::write(root.join("data.bin"), b"hello session").unwrap();

        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("DOWNLOAD data.bin").await.unwrap();
        assert_eq!(
            client.recv_text().await.unwrap().unwrap(),
            format!("{} 13", OK_DOWNLOAD)
        );
        client.send_str(START).await.unwrap();
        assert_eq!(
            client.recv().await.unwrap().unwrap(),
            b"hello session".to_vec()
        );
        assert_eq!(client.recv_text().await.unwrap().unwrap(), DOWNLOAD_DONE);

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_full_upload_through_session() {
        let root = temp_root("upload");
        let (mut client, handle) = spawn_session(root.clone());
        authenticate(&mut client).await;

        client.send_str("UPLOAD fresh.bin 9").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), "OK_UPLOAD");
        client.send(b"ninebytes").await.unwrap();
        assert_eq!(client.recv_text().await.unwrap().unwrap(), UPLOAD_SUCCESS);

        assert_eq!(fs::read(root.join("fresh.bin")).unwrap(), b"ninebytes");

        drop(client);
        handle.await.unwrap();
        let _ = fs::remove_dir_all(&root);
    }
}
