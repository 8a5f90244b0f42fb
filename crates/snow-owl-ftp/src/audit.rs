//! Structured audit events for the control connection lifecycle
//!
//! Ambient logging support, not part of the protocol core: emitted
//! alongside (never instead of) the wire replies a `Session` sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit event types recorded for an FTP control connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum AuditEvent {
    /// A control connection was accepted.
    ConnectionEstablished {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        timestamp: DateTime<Utc>,
    },
    /// A control connection ended, cleanly or otherwise.
    ConnectionClosed {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        username: Option<String>,
        timestamp: DateTime<Utc>,
        duration_secs: i64,
    },
    /// A USER/PASS exchange was attempted.
    AuthAttempt {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        username: String,
        timestamp: DateTime<Utc>,
        success: bool,
    },
    /// A file-bearing command completed (RETR/STOR/APPE/DELE).
    FileOperation {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        username: Option<String>,
        operation: String,
        path: String,
        timestamp: DateTime<Utc>,
        success: bool,
        bytes_transferred: Option<u64>,
    },
    /// A directory-bearing command completed (MKD/RMD/CWD/NLST).
    DirectoryOperation {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        username: Option<String>,
        operation: String,
        path: String,
        timestamp: DateTime<Utc>,
        success: bool,
    },
    /// A path resolution was rejected for escaping the jail root.
    JailViolation {
        session_id: Uuid,
        client_ip: Option<IpAddr>,
        username: Option<String>,
        attempted_path: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Emit the event through `tracing`, at `info` for routine activity and
    /// `warn` for anything security-relevant.
    pub fn log(&self) {
        match self {
            AuditEvent::ConnectionEstablished { session_id, client_ip, .. } => {
                info!(event = "connection_established", %session_id, client_ip = ?client_ip, audit = ?self, "control connection accepted");
            }
            AuditEvent::ConnectionClosed {
                session_id,
                username,
                duration_secs,
                ..
            } => {
                info!(event = "connection_closed", %session_id, username = ?username, duration_secs, audit = ?self, "control connection closed");
            }
            AuditEvent::AuthAttempt {
                session_id, username, success, ..
            } => {
                info!(event = "auth_attempt", %session_id, username, success, audit = ?self, "authentication attempt");
            }
            AuditEvent::FileOperation {
                session_id,
                operation,
                path,
                success,
                ..
            } => {
                info!(event = "file_operation", %session_id, operation, path, success, audit = ?self, "file operation");
            }
            AuditEvent::DirectoryOperation {
                session_id,
                operation,
                path,
                success,
                ..
            } => {
                info!(event = "directory_operation", %session_id, operation, path, success, audit = ?self, "directory operation");
            }
            AuditEvent::JailViolation {
                session_id,
                attempted_path,
                ..
            } => {
                warn!(event = "jail_violation", %session_id, attempted_path, audit = ?self, "path escaped jail root");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_type_tag() {
        let event = AuditEvent::AuthAttempt {
            session_id: Uuid::new_v4(),
            client_ip: None,
            username: "anonymous".to_string(),
            timestamp: Utc::now(),
            success: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"AuthAttempt\""));
    }
}
