use linewire_transport::{Address, Listener, Protocol};
use tracing::info;

use crate::config::EndpointConfig;
use crate::endpoint::{Endpoint, Role};
use crate::error::{EndpointError, Result};

/// A bound listen address waiting for its single peer.
///
/// Binding and accepting are split so callers can learn the actual address
/// (for example an ephemeral tcp port) before blocking in [`accept`](Self::accept).
/// An acceptor serves exactly one connection; the listener it owns is handed
/// to the resulting [`Endpoint`] and released when that endpoint closes.
#[derive(Debug)]
pub struct Acceptor {
    listener: Listener,
    config: EndpointConfig,
}

impl Acceptor {
    /// Bind and listen on `address` over `protocol`.
    pub fn bind(protocol: &str, address: &str) -> Result<Self> {
        let protocol: Protocol = protocol.parse().map_err(EndpointError::Bind)?;
        let listener = Listener::bind(protocol, address).map_err(EndpointError::Bind)?;
        Ok(Self {
            listener,
            config: EndpointConfig::default(),
        })
    }

    /// Override the timeouts applied to the accepted connection.
    pub fn with_config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<Address> {
        self.listener.local_addr().map_err(EndpointError::Bind)
    }

    /// Block until one peer connects, then start an accepting endpoint.
    pub fn accept(self) -> Result<Endpoint> {
        let stream = self.listener.accept().map_err(EndpointError::Bind)?;
        match stream.peer_addr() {
            Ok(peer) => info!(%peer, "accepted connection"),
            Err(_) => info!("accepted connection"),
        }
        Endpoint::start(Role::Accepting, stream, Some(self.listener), &self.config)
    }
}

/// Bind `address`, wait for exactly one peer, and start an accepting endpoint.
///
/// Blocks until a peer connects. Bind and accept failures are reported as
/// [`EndpointError::Bind`].
pub fn listen(protocol: &str, address: &str) -> Result<Endpoint> {
    listen_with_config(protocol, address, &EndpointConfig::default())
}

/// [`listen`] with explicit timeouts for the accepted connection.
pub fn listen_with_config(
    protocol: &str,
    address: &str,
    config: &EndpointConfig,
) -> Result<Endpoint> {
    Acceptor::bind(protocol, address)?
        .with_config(config.clone())
        .accept()
}
