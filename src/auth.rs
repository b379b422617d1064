use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Validates credentials against an immutable table loaded at startup.
///
/// The table is injected at construction and shared read-only across
/// sessions; nothing mutates it at runtime. Passwords are compared by
/// exact string equality, which is all the protocol promises.
pub struct AuthGate {
    users: HashMap<String, String>,
}

impl AuthGate {
    pub fn new(users: HashMap<String, String>) -> Self {
        AuthGate { users }
    }

    /// The built-in credential table used when no users file is given.
    pub fn with_default_users() -> Self {
        let mut users = HashMap::new();
        users.insert("user".to_string(), "pass123".to_string());
        users.insert("admin".to_string(), "adminpass".to_string());
        AuthGate::new(users)
    }

    /// Loads a `username:password` per line credentials file.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut users = HashMap::new();

        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (username, password) = line.split_once(':').ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "malformed credentials line {} in {}",
                        line_number + 1,
                        path.display()
                    ),
                )
            })?;
            users.insert(username.to_string(), password.to_string());
        }

        Ok(AuthGate::new(users))
    }

    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users.get(username).map(String::as_str) == Some(password)
    }
}
