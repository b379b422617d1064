//! # Commands Module
//!
//! The two entry points of the binary:
//!
//! ## `serve`
//! Runs the file-sharing server:
//! - Ensures the storage root exists
//! - Builds the credential table (defaults or a users file)
//! - Accepts TCP connections and spawns one session task per client
//! - Optionally caps concurrent sessions
//!
//! ## `connect`
//! Runs the interactive client:
//! - Connects to the server and authenticates
//! - Drives the list / download / upload / quit command loop
//! - Streams file content through the obfuscated message channel

pub mod connect;
pub mod serve;
