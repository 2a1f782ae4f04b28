//! Tokio counterparts of [`connect`](crate::connect) and [`Listener`](crate::Listener).

use std::io::{Error, ErrorKind};
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::protocol::Protocol;
use crate::stream::Address;
#[cfg(unix)]
use crate::uds::UnixSocket;

/// Owned read half of an [`AsyncStream`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Owned write half of an [`AsyncStream`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A connected tokio byte stream.
#[derive(Debug)]
pub struct AsyncStream {
    inner: AsyncStreamInner,
}

#[derive(Debug)]
enum AsyncStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(tokio::net::UnixStream),
}

impl AsyncStream {
    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<Address> {
        match &self.inner {
            AsyncStreamInner::Tcp(stream) => Ok(Address::Inet(stream.peer_addr()?)),
            #[cfg(unix)]
            AsyncStreamInner::Unix(stream) => Ok(Address::Unix(
                stream.peer_addr()?.as_pathname().map(|p| p.to_path_buf()),
            )),
        }
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<Address> {
        match &self.inner {
            AsyncStreamInner::Tcp(stream) => Ok(Address::Inet(stream.local_addr()?)),
            #[cfg(unix)]
            AsyncStreamInner::Unix(stream) => Ok(Address::Unix(
                stream.local_addr()?.as_pathname().map(|p| p.to_path_buf()),
            )),
        }
    }

    /// Split into independently owned read and write halves.
    ///
    /// Dropping the write half shuts down the write direction.
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        match self.inner {
            AsyncStreamInner::Tcp(stream) => {
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
            #[cfg(unix)]
            AsyncStreamInner::Unix(stream) => {
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
        }
    }
}

async fn resolve(protocol: Protocol, addr: &str) -> std::io::Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(addr)
        .await?
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

/// Open an outbound connection on the tokio runtime.
pub async fn connect_async(protocol: Protocol, address: &str) -> Result<AsyncStream> {
    let connect_err = |source| TransportError::Connect {
        addr: address.to_string(),
        source,
    };

    match protocol {
        Protocol::Tcp | Protocol::Tcp4 | Protocol::Tcp6 => {
            let mut last_err = None;
            for candidate in resolve(protocol, address).await.map_err(connect_err)? {
                match TcpStream::connect(candidate).await {
                    Ok(stream) => {
                        debug!(%candidate, "connected over tcp");
                        return Ok(AsyncStream {
                            inner: AsyncStreamInner::Tcp(stream),
                        });
                    }
                    Err(err) => last_err = Some(err),
                }
            }
            Err(connect_err(last_err.unwrap_or_else(|| {
                Error::new(ErrorKind::AddrNotAvailable, "no address candidates")
            })))
        }
        #[cfg(unix)]
        Protocol::Unix => {
            let stream = tokio::net::UnixStream::connect(address)
                .await
                .map_err(connect_err)?;
            debug!(path = address, "connected to unix domain socket");
            Ok(AsyncStream {
                inner: AsyncStreamInner::Unix(stream),
            })
        }
    }
}

/// A bound listening socket driven by tokio.
#[derive(Debug)]
pub struct AsyncListener {
    inner: AsyncListenerInner,
}

#[derive(Debug)]
enum AsyncListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        // Owns the socket file; removes it on drop.
        socket: UnixSocket,
    },
}

impl AsyncListener {
    /// Bind and listen on `address`. Must be called within a tokio runtime.
    pub async fn bind(protocol: Protocol, address: &str) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            addr: address.to_string(),
            source,
        };

        let inner = match protocol {
            Protocol::Tcp | Protocol::Tcp4 | Protocol::Tcp6 => {
                let candidates = resolve(protocol, address).await.map_err(bind_err)?;
                let listener = TcpListener::bind(&candidates[..])
                    .await
                    .map_err(bind_err)?;
                let local = listener.local_addr().map_err(bind_err)?;
                info!(%local, "listening on tcp");
                AsyncListenerInner::Tcp(listener)
            }
            #[cfg(unix)]
            Protocol::Unix => {
                let socket = UnixSocket::bind(address)?;
                let std_listener = socket.try_clone_listener().map_err(bind_err)?;
                std_listener.set_nonblocking(true).map_err(bind_err)?;
                let listener = tokio::net::UnixListener::from_std(std_listener).map_err(bind_err)?;
                AsyncListenerInner::Unix { listener, socket }
            }
        };
        Ok(Self { inner })
    }

    /// Accept one incoming connection.
    pub async fn accept(&self) -> Result<AsyncStream> {
        match &self.inner {
            AsyncListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp connection");
                Ok(AsyncStream {
                    inner: AsyncStreamInner::Tcp(stream),
                })
            }
            #[cfg(unix)]
            AsyncListenerInner::Unix { listener, socket } => {
                let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(path = ?socket.path(), "accepted unix connection");
                Ok(AsyncStream {
                    inner: AsyncStreamInner::Unix(stream),
                })
            }
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> Result<Address> {
        match &self.inner {
            AsyncListenerInner::Tcp(listener) => Ok(Address::Inet(listener.local_addr()?)),
            #[cfg(unix)]
            AsyncListenerInner::Unix { socket, .. } => {
                Ok(Address::Unix(Some(socket.path().to_path_buf())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn tcp_connect_accept_split() {
        let listener = AsyncListener::bind(Protocol::Tcp, "127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let client = tokio::spawn(async move {
            let stream = connect_async(Protocol::Tcp, &addr).await.unwrap();
            let (_read, mut write) = stream.into_split();
            write.write_all(b"hello").await.unwrap();
        });

        let stream = listener.accept().await.unwrap();
        let (mut read, _write) = stream.into_split();
        let mut buf = [0u8; 5];
        read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_unsupported_family_fails() {
        let err = connect_async(Protocol::Tcp6, "127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn unix_listener_cleans_up_socket_file() {
        let dir = std::env::temp_dir().join(format!("linewire-async-uds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("a.sock");
        let sock_str = sock_path.to_string_lossy().into_owned();

        let listener = AsyncListener::bind(Protocol::Unix, &sock_str).await.unwrap();
        let client = tokio::spawn(async move {
            let stream = connect_async(Protocol::Unix, &sock_str).await.unwrap();
            let (_read, mut write) = stream.into_split();
            write.write_all(b"u").await.unwrap();
        });

        let stream = listener.accept().await.unwrap();
        let (mut read, _write) = stream.into_split();
        let mut buf = [0u8; 1];
        read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"u");
        client.await.unwrap();

        drop(listener);
        assert!(!sock_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
