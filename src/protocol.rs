//! Wire vocabulary shared by the server session loop and the client driver.
//!
//! Messages are ASCII, space-delimited, first token is the command or
//! response tag. File content rides over the same message primitive as
//! raw bytes, so nothing here applies to chunks.

pub const AUTH: &str = "AUTH";
pub const LIST: &str = "LIST";
pub const DOWNLOAD: &str = "DOWNLOAD";
pub const UPLOAD: &str = "UPLOAD";
pub const QUIT: &str = "QUIT";

pub const AUTH_SUCCESS: &str = "AUTH_SUCCESS";
pub const AUTH_FAIL: &str = "AUTH_FAIL";
pub const OK_DOWNLOAD: &str = "OK_DOWNLOAD";
pub const OK_UPLOAD: &str = "OK_UPLOAD";
pub const UPLOAD_SUCCESS: &str = "UPLOAD_SUCCESS";
pub const DOWNLOAD_DONE: &str = "DOWNLOAD_DONE";

/// Readiness token the client sends to start download streaming.
pub const START: &str = "START";
/// Sent instead of START when the client cannot open its destination file.
pub const CANCEL: &str = "CANCEL";

pub const ERR_AUTH_REQUIRED: &str = "ERROR Authentication required.";
pub const ERR_UNKNOWN_COMMAND: &str = "ERROR Unknown command.";
pub const ERR_FILE_NOT_FOUND: &str = "ERROR File not found.";
pub const ERR_CANNOT_CREATE: &str = "ERROR Cannot create file.";
pub const ERR_UPLOAD_INCOMPLETE: &str = "ERROR Upload incomplete.";
pub const ERR_TRANSFER_CANCELLED: &str = "ERROR Transfer cancelled.";

/// One tokenized client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth { username: String, password: String },
    List,
    Download { filename: String },
    Upload { filename: String, size: u64 },
    Quit,
    Unknown,
}

impl Command {
    /// Tokenizes one decoded command line. Extra trailing tokens are
    /// ignored. A malformed AUTH still parses (with empty fields) so it
    /// is answered with AUTH_FAIL rather than an unknown-command error.
    pub fn parse(line: &str) -> Command {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(AUTH) => Command::Auth {
                username: tokens.next().unwrap_or_default().to_string(),
                password: tokens.next().unwrap_or_default().to_string(),
            },
            Some(LIST) => Command::List,
            Some(DOWNLOAD) => match tokens.next() {
                Some(filename) => Command::Download {
                    filename: filename.to_string(),
                },
                None => Command::Unknown,
            },
            Some(UPLOAD) => {
                let filename = tokens.next();
                let size = tokens.next().and_then(|s| s.parse::<u64>().ok());
                match (filename, size) {
                    (Some(filename), Some(size)) => Command::Upload {
                        filename: filename.to_string(),
                        size,
                    },
                    _ => Command::Unknown,
                }
            }
            Some(QUIT) => Command::Quit,
            _ => Command::Unknown,
        }
    }
}
