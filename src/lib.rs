pub mod auth;
pub mod channel;
pub mod cipher;
pub mod commands;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod transfer;

/// Default TCP port the server listens on and the client connects to.
pub const DEFAULT_PORT: u16 = 9999;

/// Upper bound on one logical message, commands and file chunks alike.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Block size the server reads files in when streaming a download.
pub const DOWNLOAD_CHUNK_SIZE: usize = 4096;

/// Block size the client reads files in when streaming an upload.
pub const UPLOAD_CHUNK_SIZE: usize = 2048;

/// Default obfuscation key. The XOR transform is reversible and
/// keyless-strength; it hides bytes from casual inspection, nothing more.
pub const DEFAULT_KEY: &str = "mysecretkey";

pub const DEFAULT_SERVER_ROOT: &str = "server_files";
pub const DEFAULT_CLIENT_ROOT: &str = "client_files";
