use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{debug, info};
use tokio::net::TcpStream;

use crate::channel::MessageChannel;
use crate::protocol::{AUTH, AUTH_SUCCESS, DOWNLOAD, LIST, QUIT};
use crate::storage;
use crate::transfer;

/// Client startup configuration, resolved from the CLI.
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub key: String,
}

/// Runs the interactive client: connect, authenticate, then drive the
/// command loop until quit.
///
/// Server error strings are printed verbatim and return the user to the
/// prompt; only a transport failure ends the process.
pub async fn run(config: ClientConfig) -> Result<(), Box<dyn Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!("connecting to {}", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| format!("Connection failed. Is the server running? ({})", e))?;
    println!("[+] Connected to server at {}", addr);

    let mut channel = MessageChannel::new(stream, config.key.as_bytes());

    // Authentication gate: retry until the server accepts; there is no
    // retry limit on either side.
    loop {
        let username = prompt("Username: ")?;
        let password = prompt("Password: ")?;

        channel
            .send_str(&format!("{} {} {}", AUTH, username, password))
            .await?;
        match channel.recv_text().await? {
            None => return Err("Server closed the connection.".into()),
            Some(response) if response == AUTH_SUCCESS => {
                info!("authenticated as '{}'", username);
                println!("[+] Authentication successful!");
                break;
            }
            Some(_) => println!("[-] Authentication failed. Please try again."),
        }
    }

    storage::ensure_root(&config.root)?;

    loop {
        let line = prompt("\n(list, upload [file], download [file], quit)\n> ")?;
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            None => continue,
            Some("list") => {
                channel.send_str(LIST).await?;
                match channel.recv_text().await? {
                    Some(listing) if listing.is_empty() => println!("(no files on server)"),
                    Some(listing) => println!("{}", listing),
                    None => return Err("Server closed the connection.".into()),
                }
            }
            Some("download") => {
                let Some(filename) = tokens.next() else {
                    println!("Usage: download [filename]");
                    continue;
                };
                channel
                    .send_str(&format!("{} {}", DOWNLOAD, filename))
                    .await?;
                transfer::fetch(&mut channel, &config.root, filename).await?;
            }
            Some("upload") => {
                let Some(filename) = tokens.next() else {
                    println!("Usage: upload [filename]");
                    continue;
                };
                transfer::push(&mut channel, &config.root, filename).await?;
            }
            Some("quit") => {
                channel.send_str(QUIT).await?;
                break;
            }
            Some(_) => println!("[-] Unknown command."),
        }
    }

    Ok(())
}

/// Thin line-based prompt supplying raw command strings to the driver.
fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
