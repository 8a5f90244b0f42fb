//! Per-connection state and command dispatch

use crate::audit::AuditEvent;
use crate::codec::TransferMode;
use crate::config::Config;
use crate::data_channel::{self, DataChannel};
use crate::jail::PathJail;
use crate::line_reader::LineReader;
use crate::users::UserDatabase;
use chrono::Utc;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A data endpoint armed by PORT or PASV, not yet consumed by a transfer.
enum ArmedEndpoint {
    Active(SocketAddr),
    Passive(TcpListener),
}

/// One control connection's mutable state.
pub struct Session {
    config: Arc<Config>,
    users: Arc<UserDatabase>,
    jail: PathJail,
    session_id: Uuid,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    reader: LineReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    user_name: String,
    logged_in: bool,
    transfer_mode: TransferMode,
    cwd: PathBuf,
    data_endpoint: Option<ArmedEndpoint>,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        config: Arc<Config>,
        users: Arc<UserDatabase>,
        jail: PathJail,
    ) -> crate::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let cwd = jail.root().to_path_buf();
        let (read_half, writer) = stream.into_split();

        Ok(Self {
            config,
            users,
            jail,
            session_id: Uuid::new_v4(),
            peer_addr,
            local_addr,
            reader: LineReader::new(read_half),
            writer,
            user_name: String::new(),
            logged_in: false,
            transfer_mode: TransferMode::Stream,
            cwd,
            data_endpoint: None,
        })
    }

    /// Drive the session to completion: greeting, command loop, cleanup.
    /// Returns on QUIT, control-socket EOF, I/O failure, or inactivity
    /// timeout on an idle command loop.
    pub async fn run(&mut self) -> crate::Result<()> {
        info!(peer = %self.peer_addr, session_id = %self.session_id, "control connection accepted");
        AuditEvent::ConnectionEstablished {
            session_id: self.session_id,
            client_ip: Some(self.peer_addr.ip()),
            timestamp: Utc::now(),
        }
        .log();
        let started_at = Instant::now();

        self.reply("220 snow-owl-ftp ready").await?;
        let result = self.command_loop().await;

        AuditEvent::ConnectionClosed {
            session_id: self.session_id,
            client_ip: Some(self.peer_addr.ip()),
            username: (!self.user_name.is_empty()).then(|| self.user_name.clone()),
            timestamp: Utc::now(),
            #[allow(clippy::cast_possible_wrap)]
            duration_secs: started_at.elapsed().as_secs() as i64,
        }
        .log();

        result
    }

    async fn command_loop(&mut self) -> crate::Result<()> {
        loop {
            let control_timeout = Duration::from_secs(self.config.control_timeout_secs);
            let line = match timeout(control_timeout, self.reader.read_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    debug!(peer = %self.peer_addr, "control connection closed by peer");
                    break;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(peer = %self.peer_addr, "control connection timed out");
                    return Err(crate::Error::Timeout);
                }
            };

            let (verb, arg) = split_command(&line);
            if self.dispatch(&verb, &arg).await? {
                break;
            }
        }

        Ok(())
    }

    async fn reply(&mut self, line: &str) -> crate::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Route one command line. Returns `Ok(true)` when the session should
    /// terminate (QUIT).
    async fn dispatch(&mut self, verb: &str, arg: &str) -> crate::Result<bool> {
        let verb = verb.to_ascii_lowercase();

        if !self.logged_in && verb != "user" && verb != "pass" {
            self.reply("530 Not logged in").await?;
            return Ok(false);
        }

        match verb.as_str() {
            "user" => self.cmd_user(arg).await?,
            "pass" => self.cmd_pass(arg).await?,
            "syst" => self.reply("215 UNIX Type: L8").await?,
            "type" => self.cmd_type(arg).await?,
            "stru" => self.cmd_stru(arg).await?,
            "mode" => self.cmd_mode(arg).await?,
            "port" => self.cmd_port(arg).await?,
            "pasv" => self.cmd_pasv().await?,
            "retr" => self.cmd_retr(arg).await?,
            "stor" => self.cmd_store(arg, false).await?,
            "appe" => self.cmd_store(arg, true).await?,
            "nlst" => self.cmd_nlst(arg).await?,
            "cwd" => self.cmd_cwd(arg).await?,
            "cdup" => self.cmd_cwd("..").await?,
            "mkd" => self.cmd_mkd(arg).await?,
            "rmd" => self.cmd_rmd(arg).await?,
            "dele" => self.cmd_dele(arg).await?,
            "noop" => self.reply("200 NOOP ok").await?,
            "quit" => {
                self.reply("221 Goodbye.").await?;
                return Ok(true);
            }
            _ => self.reply("500 Unknown command").await?,
        }

        Ok(false)
    }

    async fn cmd_user(&mut self, arg: &str) -> crate::Result<()> {
        self.user_name = arg.to_string();
        if arg == "anonymous" || !self.config.auth_enabled {
            self.logged_in = true;
            self.reply("230 User logged in, proceed").await
        } else {
            self.reply("331 Need password").await
        }
    }

    async fn cmd_pass(&mut self, arg: &str) -> crate::Result<()> {
        let success = self.users.check(&self.user_name, arg);
        AuditEvent::AuthAttempt {
            session_id: self.session_id,
            client_ip: Some(self.peer_addr.ip()),
            username: self.user_name.clone(),
            timestamp: Utc::now(),
            success,
        }
        .log();

        if success {
            self.logged_in = true;
            self.reply("230 User logged in, proceed").await
        } else {
            self.reply("530 Wrong username or password").await
        }
    }

    async fn cmd_type(&mut self, arg: &str) -> crate::Result<()> {
        match arg.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('A' | 'I') => self.reply("200 Switching to ASCII mode").await,
            _ => self.reply("500 Unrecognised TYPE command").await,
        }
    }

    async fn cmd_stru(&mut self, arg: &str) -> crate::Result<()> {
        if arg.eq_ignore_ascii_case("F") {
            self.reply("200 Struct set to file").await
        } else {
            self.reply("500 Invalid STRU command").await
        }
    }

    async fn cmd_mode(&mut self, arg: &str) -> crate::Result<()> {
        match TransferMode::from_code(arg) {
            Some(mode) => {
                self.transfer_mode = mode;
                let name = match mode {
                    TransferMode::Stream => "stream",
                    TransferMode::Block => "block",
                    TransferMode::Compressed => "compressed",
                };
                self.reply(&format!("200 Mode set to {name}")).await
            }
            None => self.reply("500 Invalid mode").await,
        }
    }

    async fn cmd_port(&mut self, arg: &str) -> crate::Result<()> {
        self.data_endpoint = None;
        match DataChannel::parse_port_arg(arg) {
            Ok(addr) if addr.ip() == self.peer_addr.ip() => {
                self.data_endpoint = Some(ArmedEndpoint::Active(addr));
                self.reply("200 PORT command successful").await
            }
            _ => self.reply("500 Illegal PORT command").await,
        }
    }

    async fn cmd_pasv(&mut self) -> crate::Result<()> {
        self.data_endpoint = None;
        let bind_addr = SocketAddr::new(self.local_addr.ip(), 0);
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                return self
                    .reply(&format!("425 Can't open passive listener: {e}"))
                    .await;
            }
        };
        let addr = listener.local_addr()?;
        self.data_endpoint = Some(ArmedEndpoint::Passive(listener));
        let formatted = DataChannel::format_pasv_reply(addr)?;
        self.reply(&format!("227 Entering Passive Mode ({formatted})"))
            .await
    }

    async fn cmd_retr(&mut self, arg: &str) -> crate::Result<()> {
        let path = match self.resolve_file(arg) {
            Ok(path) if path.is_file() => path,
            _ => return self.reply("550 Invalid filepath").await,
        };

        let contents = std::fs::read(&path)?;
        self.reply("150 Opening data connection").await?;

        let stream = self.open_data_connection().await?;
        data_channel::send(stream, self.transfer_mode, &contents).await?;

        #[allow(clippy::cast_possible_truncation)]
        self.audit_file_operation("retr", arg, true, Some(contents.len() as u64));
        self.reply("226 RETR done").await
    }

    async fn cmd_store(&mut self, arg: &str, append: bool) -> crate::Result<()> {
        let path = match self.resolve_file(arg) {
            Ok(path) => path,
            Err(_) => return self.reply("550 Invalid filepath").await,
        };
        let Some(parent) = path.parent() else {
            return self.reply("550 Invalid filepath").await;
        };
        if !parent.is_dir() {
            return self.reply("550 Invalid filepath").await;
        }

        self.reply("150 Opening data connection").await?;

        let stream = self.open_data_connection().await?;
        let contents =
            data_channel::receive(stream, self.transfer_mode, self.config.data_timeout_secs)
                .await?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        std::io::Write::write_all(&mut file, &contents)?;

        let operation = if append { "appe" } else { "stor" };
        #[allow(clippy::cast_possible_truncation)]
        self.audit_file_operation(operation, arg, true, Some(contents.len() as u64));
        self.reply("226 STOR DONE").await
    }

    async fn cmd_nlst(&mut self, arg: &str) -> crate::Result<()> {
        let path = match self.resolve_dir(arg) {
            Ok(path) if path.is_dir() => path,
            _ => return self.reply("550 Invalid filepath").await,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let mut listing = String::new();
        for name in names {
            listing.push_str(&name);
            listing.push_str("\r\n");
        }

        self.reply("150 Opening data connection").await?;
        let stream = self.open_data_connection().await?;
        data_channel::send(stream, self.transfer_mode, listing.as_bytes()).await?;
        self.audit_directory_operation("nlst", arg, true);
        self.reply("226 NLST done").await
    }

    async fn cmd_cwd(&mut self, arg: &str) -> crate::Result<()> {
        match self.resolve_dir(arg) {
            Ok(path) if path.is_dir() => {
                self.cwd = path;
                self.audit_directory_operation("cwd", arg, true);
                self.reply("250 Directory changed").await
            }
            _ => {
                self.audit_directory_operation("cwd", arg, false);
                self.reply("550 Invalid directory").await
            }
        }
    }

    async fn cmd_mkd(&mut self, arg: &str) -> crate::Result<()> {
        let path = match self.resolve_file(arg) {
            Ok(path) => path,
            Err(_) => return self.reply("550 Invalid filepath").await,
        };
        let parent_exists = path.parent().is_some_and(std::path::Path::is_dir);
        if !parent_exists || path.exists() {
            self.audit_directory_operation("mkd", arg, false);
            return self.reply("550 Invalid filepath").await;
        }

        std::fs::create_dir(&path)?;
        self.audit_directory_operation("mkd", arg, true);
        self.reply("226 MKD done").await
    }

    async fn cmd_rmd(&mut self, arg: &str) -> crate::Result<()> {
        let path = match self.resolve_dir(arg) {
            Ok(path) if path.is_dir() => path,
            _ => return self.reply("550 Invalid filepath").await,
        };

        match std::fs::remove_dir(&path) {
            Ok(()) => {
                self.audit_directory_operation("rmd", arg, true);
                self.reply("226 RMD done").await
            }
            Err(_) => {
                self.audit_directory_operation("rmd", arg, false);
                self.reply("550 Unable to delete directory").await
            }
        }
    }

    async fn cmd_dele(&mut self, arg: &str) -> crate::Result<()> {
        let path = match self.resolve_file(arg) {
            Ok(path) if path.is_file() => path,
            _ => return self.reply("550 Invalid filepath").await,
        };

        std::fs::remove_file(&path)?;
        self.audit_file_operation("dele", arg, true, None);
        self.reply("250 DELE done").await
    }

    fn resolve_file(&self, arg: &str) -> crate::Result<PathBuf> {
        self.resolve(arg)
    }

    fn resolve_dir(&self, arg: &str) -> crate::Result<PathBuf> {
        self.resolve(arg)
    }

    fn resolve(&self, arg: &str) -> crate::Result<PathBuf> {
        self.jail.resolve(&self.cwd, arg).inspect_err(|_| {
            AuditEvent::JailViolation {
                session_id: self.session_id,
                client_ip: Some(self.peer_addr.ip()),
                username: (!self.user_name.is_empty()).then(|| self.user_name.clone()),
                attempted_path: arg.to_string(),
                timestamp: Utc::now(),
            }
            .log();
        })
    }

    fn username_for_audit(&self) -> Option<String> {
        (!self.user_name.is_empty()).then(|| self.user_name.clone())
    }

    fn audit_file_operation(&self, operation: &str, path: &str, success: bool, bytes: Option<u64>) {
        AuditEvent::FileOperation {
            session_id: self.session_id,
            client_ip: Some(self.peer_addr.ip()),
            username: self.username_for_audit(),
            operation: operation.to_string(),
            path: path.to_string(),
            timestamp: Utc::now(),
            success,
            bytes_transferred: bytes,
        }
        .log();
    }

    fn audit_directory_operation(&self, operation: &str, path: &str, success: bool) {
        AuditEvent::DirectoryOperation {
            session_id: self.session_id,
            client_ip: Some(self.peer_addr.ip()),
            username: self.username_for_audit(),
            operation: operation.to_string(),
            path: path.to_string(),
            timestamp: Utc::now(),
            success,
        }
        .log();
    }

    /// Consume the armed data endpoint and establish the actual TCP stream.
    /// Either kind of endpoint is single-use: the next transfer requires a
    /// fresh PORT or PASV.
    async fn open_data_connection(&mut self) -> crate::Result<TcpStream> {
        let endpoint = self
            .data_endpoint
            .take()
            .ok_or_else(|| crate::Error::Connection("no data endpoint armed".to_string()))?;

        let channel = match endpoint {
            ArmedEndpoint::Active(peer) => DataChannel::Active { peer },
            ArmedEndpoint::Passive(listener) => DataChannel::Passive { listener },
        };
        channel.establish(self.config.data_timeout_secs).await
    }
}

/// Split a command line into `(verb, argument)` on the first space.
/// The argument may be empty and may itself contain spaces.
fn split_command(line: &str) -> (String, String) {
    match line.split_once(' ') {
        Some((verb, arg)) => (verb.to_string(), arg.to_string()),
        None => (line.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_verb_and_argument() {
        assert_eq!(
            split_command("RETR some file.txt"),
            ("RETR".to_string(), "some file.txt".to_string())
        );
    }

    #[test]
    fn bare_verb_has_empty_argument() {
        assert_eq!(split_command("PWD"), ("PWD".to_string(), String::new()));
    }

    #[test]
    fn verb_is_split_case_preserved_for_argument() {
        let (verb, arg) = split_command("user Alice");
        assert_eq!(verb, "user");
        assert_eq!(arg, "Alice");
    }
}
