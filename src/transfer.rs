//! Chunked file transfer over the message channel.
//!
//! Both directions are small per-invocation state machines riding the
//! strict request/response protocol: the server half lives in
//! `serve_download`/`serve_upload` and is driven by the session loop,
//! the client half in `fetch`/`push` driven by the command driver.
//! Transfer accounting (declared size, bytes moved) exists only for the
//! duration of one flow and is dropped on every exit path.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::channel::MessageChannel;
use crate::protocol::{
    CANCEL, DOWNLOAD_DONE, ERR_CANNOT_CREATE, ERR_FILE_NOT_FOUND, ERR_TRANSFER_CANCELLED,
    ERR_UPLOAD_INCOMPLETE, OK_DOWNLOAD, OK_UPLOAD, START, UPLOAD, UPLOAD_SUCCESS,
};
use crate::storage;
use crate::{DOWNLOAD_CHUNK_SIZE, UPLOAD_CHUNK_SIZE};

/// Reads one block from a file, sized to fit a single message.
///
/// Returns the buffer truncated to the bytes actually read; zero bytes
/// read means end of file.
fn read_block<R: Read>(source: &mut R, block_size: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buffer = vec![0; block_size];
    let bytes_read = source.read(&mut buffer)?;
    buffer.truncate(bytes_read);
    Ok((buffer, bytes_read))
}

/// Server side of DOWNLOAD: Lookup -> Negotiated -> Streaming -> Done.
///
/// Missing or confined-out files abort the flow with an error response
/// before any negotiation. After announcing the size the server waits
/// for the readiness token; anything else cancels the transfer with an
/// explicit error so both ends return to the command loop in step.
/// The sender does no byte accounting: it streams to end of file.
pub async fn serve_download<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut MessageChannel<S>,
    root: &Path,
    filename: &str,
) -> io::Result<()> {
    let mut file = match storage::resolve(root, filename).and_then(File::open) {
        Ok(file) => file,
        Err(e) => {
            debug!("download rejected for {}: {}", filename, e);
            return channel.send_str(ERR_FILE_NOT_FOUND).await;
        }
    };
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        debug!("download rejected, not a regular file: {}", filename);
        return channel.send_str(ERR_FILE_NOT_FOUND).await;
    }
    let size = metadata.len();

    channel
        .send_str(&format!("{} {}", OK_DOWNLOAD, size))
        .await?;

    let readiness = match channel.recv().await? {
        Some(token) => token,
        None => return Err(disconnected("peer left before starting download")),
    };
    if readiness != START.as_bytes() {
        debug!("client did not start transfer of {}", filename);
        return channel.send_str(ERR_TRANSFER_CANCELLED).await;
    }

    loop {
        let (block, bytes_read) = read_block(&mut file, DOWNLOAD_CHUNK_SIZE)?;
        if bytes_read == 0 {
            break;
        }
        channel.send(&block).await?;
    }
    debug!("finished sending {} ({} bytes)", filename, size);

    channel.send_str(DOWNLOAD_DONE).await
}

/// Server side of UPLOAD: Announce -> Negotiated -> Receiving ->
/// Complete | Incomplete.
///
/// Every received byte is appended, even past the declared size; the
/// verdict is judged solely by whether the running counter lands exactly
/// on the declared size. A peer disconnect mid-stream leaves the partial
/// file in place and reports incomplete.
pub async fn serve_upload<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut MessageChannel<S>,
    root: &Path,
    filename: &str,
    declared_size: u64,
) -> io::Result<()> {
    let destination = storage::resolve(root, filename).and_then(|path| {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
    });
    let mut file = match destination {
        Ok(file) => file,
        Err(e) => {
            debug!("upload rejected, cannot create {}: {}", filename, e);
            return channel.send_str(ERR_CANNOT_CREATE).await;
        }
    };

    channel.send_str(OK_UPLOAD).await?;

    let mut bytes_received: u64 = 0;
    while bytes_received < declared_size {
        let chunk = match channel.recv().await? {
            Some(chunk) => chunk,
            None => {
                debug!("upload of {} interrupted by disconnect", filename);
                break;
            }
        };
        file.write_all(&chunk)?;
        bytes_received += chunk.len() as u64;
    }
    file.flush()?;

    if bytes_received == declared_size {
        debug!("received {} ({} bytes)", filename, bytes_received);
        channel.send_str(UPLOAD_SUCCESS).await
    } else {
        warn!(
            "upload of {} incomplete: {} of {} bytes",
            filename, bytes_received, declared_size
        );
        channel.send_str(ERR_UPLOAD_INCOMPLETE).await
    }
}

/// Client side of DOWNLOAD, entered after the driver sent the command.
///
/// Receives chunks until the running total reaches the declared size,
/// truncating the final chunk rather than letting the total overshoot,
/// then checks the completion sentinel and only warns if it is missing.
pub async fn fetch<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut MessageChannel<S>,
    root: &Path,
    filename: &str,
) -> io::Result<()> {
    let response = match channel.recv_text().await? {
        Some(response) => response,
        None => return Err(disconnected("server closed the connection")),
    };

    let mut tokens = response.split_whitespace();
    let declared_size = match (tokens.next(), tokens.next().and_then(|s| s.parse::<u64>().ok())) {
        (Some(OK_DOWNLOAD), Some(size)) => size,
        _ => {
            println!("[-] Server error: {}", response);
            return Ok(());
        }
    };
    println!("[+] Server OK. File size: {} bytes.", declared_size);

    let mut file = match storage::resolve(root, filename).and_then(|path| File::create(path)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[-] Error: Could not open file for writing: {}", e);
            // Tell the server not to stream, then consume its abort
            // response so the next command starts from a clean slate.
            channel.send_str(CANCEL).await?;
            if let Some(aborted) = channel.recv_text().await? {
                println!("[-] Server response: {}", aborted);
            }
            return Ok(());
        }
    };

    channel.send_str(START).await?;
    println!("[+] Downloading {}...", filename);

    let bar = ProgressBar::new(declared_size);
    let mut bytes_received: u64 = 0;
    while bytes_received < declared_size {
        let mut chunk = match channel.recv().await? {
            Some(chunk) => chunk,
            None => {
                bar.abandon();
                println!("[-] Download failed. Incomplete file.");
                return Ok(());
            }
        };

        // Never let the running total pass the declared size.
        let remaining = declared_size - bytes_received;
        if (chunk.len() as u64) > remaining {
            chunk.truncate(remaining as usize);
        }

        file.write_all(&chunk)?;
        bytes_received += chunk.len() as u64;
        bar.inc(chunk.len() as u64);
    }
    file.flush()?;
    bar.finish();
    println!("[+] Download complete: {}", filename);

    match channel.recv_text().await? {
        Some(sentinel) if sentinel == DOWNLOAD_DONE => {}
        Some(sentinel) => {
            println!("[+] Warning: Did not receive final DONE signal. Got: {}", sentinel)
        }
        None => println!("[+] Warning: Did not receive final DONE signal."),
    }
    Ok(())
}

/// Client side of UPLOAD: announces name and size, waits for the
/// acknowledgement, then streams the file to end of file and surfaces
/// the server's final verdict verbatim.
pub async fn push<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut MessageChannel<S>,
    root: &Path,
    filename: &str,
) -> io::Result<()> {
    let mut file = match storage::resolve(root, filename).and_then(|path| File::open(path)) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("[-] Error: File not found in local storage: {}", filename);
            return Ok(());
        }
    };
    let size = file.metadata()?.len();

    channel
        .send_str(&format!("{} {} {}", UPLOAD, filename, size))
        .await?;

    let response = match channel.recv_text().await? {
        Some(response) => response,
        None => return Err(disconnected("server closed the connection")),
    };
    if response != OK_UPLOAD {
        println!("[-] Server error: {}", response);
        return Ok(());
    }

    println!("[+] Uploading {} ({} bytes)...", filename, size);
    let bar = ProgressBar::new(size);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    loop {
        let (block, bytes_read) = read_block(&mut file, UPLOAD_CHUNK_SIZE)?;
        if bytes_read == 0 {
            break;
        }
        channel.send(&block).await?;
        bar.inc(bytes_read as u64);
    }
    bar.finish();

    match channel.recv_text().await? {
        Some(verdict) => println!("[+] Server response: {}", verdict),
        None => println!("[-] Connection lost waiting for upload confirmation."),
    }
    Ok(())
}

fn disconnected(context: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, context.to_string())
}
