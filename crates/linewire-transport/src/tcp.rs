use std::io::{Error, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::protocol::Protocol;
use crate::stream::Stream;

/// Resolve `addr` and keep only the candidates admitted by `protocol`.
pub(crate) fn resolve(protocol: Protocol, addr: &str) -> std::io::Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()?
        .filter(|candidate| protocol.admits(candidate))
        .collect();

    if candidates.is_empty() {
        return Err(Error::new(
            ErrorKind::AddrNotAvailable,
            format!("no {protocol} address found for {addr}"),
        ));
    }
    Ok(candidates)
}

/// Dial a TCP address, trying each resolved candidate in order.
pub(crate) fn connect(protocol: Protocol, addr: &str, timeout: Option<Duration>) -> Result<Stream> {
    let connect_err = |source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    };

    let mut last_err = None;
    for candidate in resolve(protocol, addr).map_err(connect_err)? {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                debug!(%candidate, "connected over tcp");
                return Ok(Stream::from_tcp(stream));
            }
            Err(err) => {
                debug!(%candidate, error = %err, "tcp connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(connect_err(last_err.unwrap_or_else(|| {
        Error::new(ErrorKind::AddrNotAvailable, "no address candidates")
    })))
}

/// A bound TCP listener.
#[derive(Debug)]
pub struct TcpSocket {
    listener: TcpListener,
}

impl TcpSocket {
    /// Bind to the first resolved candidate that accepts the bind.
    pub fn bind(protocol: Protocol, addr: &str) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(&resolve(protocol, addr).map_err(bind_err)?[..])
            .map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;
        info!(%local, "listening on tcp");

        Ok(Self { listener })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted tcp connection");
        Ok(Stream::from_tcp(stream))
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
