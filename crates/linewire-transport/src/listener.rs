use std::time::Duration;

use crate::error::Result;
use crate::protocol::Protocol;
use crate::stream::{Address, Stream};
use crate::tcp::{self, TcpSocket};
#[cfg(unix)]
use crate::uds::{self, UnixSocket};

/// Open an outbound connection.
///
/// `address` is `host:port` for the tcp family and a socket path for `unix`.
/// No retry is attempted.
pub fn connect(protocol: Protocol, address: &str) -> Result<Stream> {
    connect_timeout(protocol, address, None)
}

/// Open an outbound connection, bounding each tcp attempt by `timeout`.
///
/// The timeout is ignored for `unix`, where connect does not block on the network.
pub fn connect_timeout(
    protocol: Protocol,
    address: &str,
    timeout: Option<Duration>,
) -> Result<Stream> {
    match protocol {
        Protocol::Tcp | Protocol::Tcp4 | Protocol::Tcp6 => tcp::connect(protocol, address, timeout),
        #[cfg(unix)]
        Protocol::Unix => uds::connect(address),
    }
}

/// A bound listening socket of any supported protocol.
#[derive(Debug)]
pub struct Listener {
    inner: ListenerInner,
}

#[derive(Debug)]
enum ListenerInner {
    Tcp(TcpSocket),
    #[cfg(unix)]
    Unix(UnixSocket),
}

impl Listener {
    /// Bind and listen on `address`.
    pub fn bind(protocol: Protocol, address: &str) -> Result<Self> {
        let inner = match protocol {
            Protocol::Tcp | Protocol::Tcp4 | Protocol::Tcp6 => {
                ListenerInner::Tcp(TcpSocket::bind(protocol, address)?)
            }
            #[cfg(unix)]
            Protocol::Unix => ListenerInner::Unix(UnixSocket::bind(address)?),
        };
        Ok(Self { inner })
    }

    /// Accept one incoming connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        match &self.inner {
            ListenerInner::Tcp(socket) => socket.accept(),
            #[cfg(unix)]
            ListenerInner::Unix(socket) => socket.accept(),
        }
    }

    /// The address this listener is bound to.
    ///
    /// For tcp this reports the actual port when binding to port 0.
    pub fn local_addr(&self) -> Result<Address> {
        match &self.inner {
            ListenerInner::Tcp(socket) => Ok(Address::Inet(socket.local_addr()?)),
            #[cfg(unix)]
            ListenerInner::Unix(socket) => Ok(Address::Unix(Some(socket.path().to_path_buf()))),
        }
    }
}
