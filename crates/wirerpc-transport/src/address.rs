use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const UNIX_PREFIX: &str = "unix:";

/// Where a wirerpc endpoint listens or connects.
///
/// Parsed from `host:port` for TCP, or `unix:/path` (or any string
/// containing a `/`) for a Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// TCP endpoint, resolved at bind/connect time.
    Tcp(String),
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
}

impl Address {
    /// Build a TCP address from a host and port.
    pub fn tcp(host: &str, port: u16) -> Self {
        Self::Tcp(format!("{host}:{port}"))
    }

    /// Build a Unix domain socket address.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TransportError::InvalidAddress {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("address is empty"));
        }

        if let Some(path) = trimmed.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(invalid("unix socket path is empty"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if trimmed.contains('/') {
            return Ok(Self::Unix(PathBuf::from(trimmed)));
        }

        let Some((host, port)) = trimmed.rsplit_once(':') else {
            return Err(invalid("expected host:port or unix:/path"));
        };
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        port.parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0-65535"))?;

        Ok(Self::Tcp(trimmed.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => f.write_str(addr),
            Address::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}
