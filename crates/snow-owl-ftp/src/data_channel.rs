//! Data connection establishment and transfer (PORT/PASV)

use crate::codec::{self, TransferMode};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

/// A data connection is either dialed out to a client-advertised address
/// (PORT) or accepted from a listener the server itself opened (PASV).
pub enum DataChannel {
    Active { peer: SocketAddr },
    Passive { listener: TcpListener },
}

impl DataChannel {
    /// Parse PORT's `h1,h2,h3,h4,p1,p2` argument into a socket address.
    pub fn parse_port_arg(arg: &str) -> crate::Result<SocketAddr> {
        let parts: Vec<&str> = arg.split(',').collect();
        if parts.len() != 6 {
            return Err(crate::Error::Protocol(format!(
                "malformed PORT argument: {arg}"
            )));
        }
        let mut octets = [0u8; 4];
        for (slot, part) in octets.iter_mut().zip(&parts[0..4]) {
            *slot = part
                .parse()
                .map_err(|_| crate::Error::Protocol(format!("malformed PORT argument: {arg}")))?;
        }
        let p1: u8 = parts[4]
            .parse()
            .map_err(|_| crate::Error::Protocol(format!("malformed PORT argument: {arg}")))?;
        let p2: u8 = parts[5]
            .parse()
            .map_err(|_| crate::Error::Protocol(format!("malformed PORT argument: {arg}")))?;
        let port = u16::from(p1) * 256 + u16::from(p2);

        let addr = SocketAddrV4::new(
            Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]),
            port,
        );
        Ok(SocketAddr::V4(addr))
    }

    /// Format a listening address as PASV's `h1,h2,h3,h4,p1,p2` reply text.
    pub fn format_pasv_reply(addr: SocketAddr) -> crate::Result<String> {
        let SocketAddr::V4(addr) = addr else {
            return Err(crate::Error::Protocol(
                "PASV requires an IPv4 control connection".to_string(),
            ));
        };
        let octets = addr.ip().octets();
        let port = addr.port();
        Ok(format!(
            "{},{},{},{},{},{}",
            octets[0],
            octets[1],
            octets[2],
            octets[3],
            port / 256,
            port % 256
        ))
    }

    /// Open a passive listener bound to the same interface the control
    /// connection is already reachable on. Resolving the server's own
    /// advertised hostname via DNS would be unreliable in a sandboxed
    /// environment, so the control socket's local address is reused
    /// directly.
    pub async fn listen_passive(control_local_addr: SocketAddr) -> crate::Result<Self> {
        let bind_addr = SocketAddr::new(control_local_addr.ip(), 0);
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| crate::Error::Connection(format!("failed to open PASV listener: {e}")))?;
        Ok(DataChannel::Passive { listener })
    }

    /// The address clients should be told to connect to for a passive
    /// channel; `None` for active channels (the server dials out instead).
    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        match self {
            DataChannel::Passive { listener } => listener
                .local_addr()
                .map_err(|e| crate::Error::Connection(format!("{e}"))),
            DataChannel::Active { .. } => Err(crate::Error::Connection(
                "active data channels have no local listen address".to_string(),
            )),
        }
    }

    /// Establish the actual TCP stream: dial out for `Active`, accept the
    /// pending connection for `Passive`. Bounded by `timeout_secs` of
    /// inactivity.
    pub async fn establish(self, timeout_secs: u64) -> crate::Result<TcpStream> {
        let duration = Duration::from_secs(timeout_secs);
        match self {
            DataChannel::Active { peer } => timeout(duration, TcpStream::connect(peer))
                .await
                .map_err(|_| crate::Error::Timeout)?
                .map_err(|e| crate::Error::Connection(format!("failed to connect to {peer}: {e}"))),
            DataChannel::Passive { listener } => timeout(duration, listener.accept())
                .await
                .map_err(|_| crate::Error::Timeout)?
                .map(|(stream, _)| stream)
                .map_err(|e| crate::Error::Connection(format!("failed to accept data connection: {e}"))),
        }
    }
}

/// Encode `payload` under `mode` and write it fully to `stream`, then close
/// it. The entire artifact is materialized in memory before writing — no
/// streaming requirement. Takes ownership of `stream` and closes it before
/// returning, so the caller's closing control-socket reply (226) is never
/// written while the data socket is still open.
pub async fn send(mut stream: TcpStream, mode: TransferMode, payload: &[u8]) -> crate::Result<()> {
    let framed = codec::encode(mode, payload);
    stream.write_all(&framed).await?;
    stream.shutdown().await?;
    drop(stream);
    Ok(())
}

/// Read `stream` to EOF and decode it under `mode`, bounded by
/// `timeout_secs` of overall inactivity. Takes ownership of `stream` and
/// closes it before returning, for the same reason as `send`.
pub async fn receive(
    mut stream: TcpStream,
    mode: TransferMode,
    timeout_secs: u64,
) -> crate::Result<Vec<u8>> {
    let duration = Duration::from_secs(timeout_secs);
    let mut raw = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = timeout(duration, stream.read(&mut chunk))
            .await
            .map_err(|_| crate::Error::Timeout)??;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    drop(stream);
    codec::decode(mode, &raw)
}
