//! Minimal echo server: accepts one peer and echoes its frames back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7878 --data hello --wait

use linewire::endpoint::listen;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7878".to_string());

    eprintln!("Listening on {address}");
    let endpoint = listen("tcp", &address)?;
    eprintln!("Peer connected: {}", endpoint.peer_addr()?);

    for frame in endpoint.incoming() {
        eprintln!("Received {} bytes", frame.len());
        endpoint.emit(frame.as_bytes())?;
    }

    eprintln!("Peer disconnected");
    Ok(())
}
