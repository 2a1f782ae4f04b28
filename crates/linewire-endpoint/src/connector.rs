use linewire_transport::Protocol;
use tracing::info;

use crate::config::EndpointConfig;
use crate::endpoint::{Endpoint, Role};
use crate::error::{EndpointError, Result};

/// Dial `address` over `protocol` and start a dialing endpoint.
///
/// `protocol` is one of `tcp`, `tcp4`, `tcp6` or `unix`. Every failure is
/// reported as [`EndpointError::Connection`]; no retry is attempted.
pub fn connect(protocol: &str, address: &str) -> Result<Endpoint> {
    connect_with_config(protocol, address, &EndpointConfig::default())
}

/// Dial with explicit timeouts.
pub fn connect_with_config(
    protocol: &str,
    address: &str,
    config: &EndpointConfig,
) -> Result<Endpoint> {
    let protocol: Protocol = protocol.parse().map_err(EndpointError::Connection)?;
    let stream = linewire_transport::connect_timeout(protocol, address, config.connect_timeout)
        .map_err(EndpointError::Connection)?;

    info!(%protocol, address, "connected");
    Endpoint::start(Role::Dialing, stream, None, config)
}
