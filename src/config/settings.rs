//! Configuration settings for a transfer session
//!
//! A [`SessionConfig`] is all that is needed to open a transport: where to
//! connect, which protocol to speak and which credentials to present.
//! Credentials default to the conventional anonymous sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire protocol spoken by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Plain FTP
    Ftp,
    /// FTP upgraded to TLS via explicit `AUTH TLS`
    Ftps,
    /// SFTP over SSH
    Sftp,
}

impl Protocol {
    /// Conventional default port for the protocol
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp | Protocol::Ftps => 21,
            Protocol::Sftp => 22,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => write!(f, "ftp"),
            Protocol::Ftps => write!(f, "ftps"),
            Protocol::Sftp => write!(f, "sftp"),
        }
    }
}

/// Username/password pair presented at login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The well-known anonymous sentinel used when no credentials are supplied
    pub fn anonymous() -> Self {
        Self::new("anonymous", "anonymous@example.com")
    }

    /// Username to present at login
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password to present at login
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::anonymous()
    }
}

// The password must never leak into logs or error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open one authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remote host name or address
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Login credentials
    pub credentials: Credentials,
    /// Protocol to speak
    pub protocol: Protocol,
}

impl SessionConfig {
    /// Create a configuration for `host` with the protocol's default port
    /// and anonymous credentials
    pub fn new(host: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port: protocol.default_port(),
            credentials: Credentials::anonymous(),
            protocol,
        }
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the credentials
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// `host:port` form used for socket connects and log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Protocol::Ftp.default_port(), 21);
        assert_eq!(Protocol::Ftps.default_port(), 21);
        assert_eq!(Protocol::Sftp.default_port(), 22);
    }

    #[test]
    fn test_anonymous_sentinel() {
        let creds = Credentials::default();
        assert_eq!(creds.username(), "anonymous");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "secret");
        let text = format!("{:?}", creds);
        assert!(text.contains("alice"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("ftp.example.com", Protocol::Ftp)
            .with_port(2121)
            .with_credentials(Credentials::new("bob", "pw"));
        assert_eq!(config.address(), "ftp.example.com:2121");
        assert_eq!(config.credentials.username(), "bob");
    }
}
