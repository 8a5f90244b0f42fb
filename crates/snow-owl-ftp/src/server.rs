//! Accept loop: binds the control port and spawns one `Session` per
//! connection.

use crate::config::Config;
use crate::jail::PathJail;
use crate::session::Session;
use crate::users::UserDatabase;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Owns the listening socket and the configuration/user-database shared by
/// every session it spawns.
pub struct Server {
    config: Arc<Config>,
    users: Arc<UserDatabase>,
    jail: PathJail,
}

impl Server {
    /// Validate `config`, load its user database, and canonicalize its
    /// root directory once so every `Session` reuses the same `PathJail`.
    pub fn new(config: Config) -> crate::Result<Self> {
        config.validate()?;

        let users = match &config.users_file {
            Some(path) => UserDatabase::load(path)?,
            None => UserDatabase::empty(),
        };

        let root = config.root_dir.canonicalize()?;
        let jail = PathJail::new(root);

        Ok(Self {
            config: Arc::new(config),
            users: Arc::new(users),
            jail,
        })
    }

    /// Bind and accept connections until the process is terminated. Each
    /// connection's session runs in its own task, independent of every
    /// other connection.
    pub async fn run(self) -> crate::Result<()> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, root = %self.jail.root().display(), "snow-owl-ftp listening");

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let config = self.config.clone();
            let users = self.users.clone();
            let jail = self.jail.clone();

            tokio::spawn(async move {
                let mut session = match Session::new(stream, config, users, jail) {
                    Ok(session) => session,
                    Err(e) => {
                        error!(peer = %peer_addr, error = %e, "failed to initialize session");
                        return;
                    }
                };

                if let Err(e) = session.run().await {
                    warn!(peer = %peer_addr, error = %e, "session ended with error");
                }
            });
        }
    }
}
