use std::sync::Arc;

use linewire_endpoint::{listen_with_config, Endpoint, EndpointError};

use crate::cmd::{peer_label, EchoArgs, Interrupt};
use crate::exit::{endpoint_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

enum EmitErrorDisposition {
    DropPeer,
    Fatal(CliError),
}

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = args.conn.endpoint_config()?;
    let interrupt = Interrupt::install()?;
    let mut served = 0usize;

    while !interrupt.fired() {
        let endpoint = listen_with_config(&args.conn.protocol, &args.conn.address, &config)
            .map(Arc::new)
            .map_err(|err| endpoint_error("listen failed", err))?;
        interrupt.guard(Arc::clone(&endpoint));

        let peer = peer_label(&endpoint);
        tracing::info!(%peer, "peer connected");
        let echoed = serve(&endpoint)?;
        tracing::info!(%peer, frames = echoed, "peer done");

        interrupt.release();
        endpoint.close();

        served = served.saturating_add(1);
        if args.peers.is_some_and(|limit| served >= limit) {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Echo every frame back until the peer's decode loop ends.
fn serve(endpoint: &Endpoint) -> CliResult<usize> {
    let mut echoed = 0usize;
    for frame in endpoint.incoming() {
        tracing::debug!(size = frame.len(), "echoing frame");
        match endpoint.emit(frame.as_bytes()) {
            Ok(()) => echoed = echoed.saturating_add(1),
            Err(err) => match classify_emit_error(err) {
                EmitErrorDisposition::DropPeer => break,
                EmitErrorDisposition::Fatal(cli_err) => return Err(cli_err),
            },
        }
    }
    Ok(echoed)
}

fn classify_emit_error(err: EndpointError) -> EmitErrorDisposition {
    match err {
        EndpointError::Write(err) => {
            tracing::warn!(error = %err, "echo write failed; dropping peer");
            EmitErrorDisposition::DropPeer
        }
        EndpointError::Closed | EndpointError::Terminated => EmitErrorDisposition::DropPeer,
        other => EmitErrorDisposition::Fatal(endpoint_error("echo send failed", other)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use linewire_frame::FrameError;

    use super::*;

    #[test]
    fn write_failure_drops_peer() {
        let err = EndpointError::Write(FrameError::ConnectionClosed);
        assert!(matches!(
            classify_emit_error(err),
            EmitErrorDisposition::DropPeer
        ));
    }

    #[test]
    fn interrupted_session_drops_peer() {
        assert!(matches!(
            classify_emit_error(EndpointError::Closed),
            EmitErrorDisposition::DropPeer
        ));
    }

    #[test]
    fn unexpected_error_is_fatal() {
        let disposition = classify_emit_error(EndpointError::Timeout(Duration::from_secs(1)));
        assert!(matches!(disposition, EmitErrorDisposition::Fatal(_)));
    }
}
