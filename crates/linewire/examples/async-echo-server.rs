//! Echo server on the tokio runtime.
//!
//! Run with:
//!   cargo run --example async-echo-server --features async

use linewire::endpoint::{listen_async, EndpointConfig, EndpointError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7879".to_string());

    eprintln!("Listening on {address}");
    let endpoint = listen_async("tcp", &address, &EndpointConfig::default()).await?;
    eprintln!("Peer connected: {}", endpoint.peer_addr());

    loop {
        match endpoint.recv().await {
            Ok(frame) => endpoint.emit(frame.as_bytes()).await?,
            Err(EndpointError::Terminated) => break,
            Err(err) => return Err(err.into()),
        }
    }

    endpoint.close().await;
    eprintln!("Peer disconnected");
    Ok(())
}
