//! # Snow Owl FTP
//!
//! A server implementation of the File Transfer Protocol as defined by
//! RFC 959, extended with the Block and Compressed transfer modes from
//! that RFC's §3.4.
//!
//! ## Features
//!
//! - Control-connection command dispatch (USER/PASS/TYPE/STRU/MODE/PORT/
//!   PASV/RETR/STOR/APPE/NLST/CWD/CDUP/MKD/RMD/DELE/NOOP/QUIT)
//! - Active (PORT) and passive (PASV) data connections
//! - Stream, Block, and Compressed transfer-mode framing
//! - A filesystem root jailed against path traversal and symlink escape
//! - Flat-file or anonymous authentication

pub mod audit;
pub mod codec;
pub mod config;
pub mod data_channel;
pub mod error;
pub mod jail;
pub mod line_reader;
pub mod server;
pub mod session;
pub mod users;

pub use audit::AuditEvent;
pub use config::{Config, LogFormat, LoggingConfig, ServerMode};
pub use error::{Error, Result};
pub use jail::PathJail;
pub use server::Server;
pub use session::Session;
pub use users::UserDatabase;
