use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::TransportError;

/// Transport protocol identifier accepted by [`connect`](crate::connect) and
/// [`Listener::bind`](crate::Listener::bind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP over IPv4 or IPv6, whichever the address resolves to.
    Tcp,
    /// TCP restricted to IPv4 addresses.
    Tcp4,
    /// TCP restricted to IPv6 addresses.
    Tcp6,
    /// Unix domain stream socket addressed by filesystem path.
    #[cfg(unix)]
    Unix,
}

impl Protocol {
    /// Canonical identifier string.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp4 => "tcp4",
            Protocol::Tcp6 => "tcp6",
            #[cfg(unix)]
            Protocol::Unix => "unix",
        }
    }

    /// Whether resolved socket addresses of this family are acceptable.
    pub(crate) fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Protocol::Tcp => true,
            Protocol::Tcp4 => addr.is_ipv4(),
            Protocol::Tcp6 => addr.is_ipv6(),
            #[cfg(unix)]
            Protocol::Unix => false,
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "tcp4" => Ok(Protocol::Tcp4),
            "tcp6" => Ok(Protocol::Tcp6),
            #[cfg(unix)]
            "unix" => Ok(Protocol::Unix),
            _ => Err(TransportError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
