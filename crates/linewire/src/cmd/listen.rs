use std::sync::Arc;

use linewire_endpoint::Acceptor;

use crate::cmd::{peer_label, Interrupt, ListenArgs};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.conn.endpoint_config()?;
    let interrupt = Interrupt::install()?;

    let acceptor = Acceptor::bind(&args.conn.protocol, &args.conn.address)
        .map_err(|err| endpoint_error("bind failed", err))?
        .with_config(config);
    if let Ok(local) = acceptor.local_addr() {
        tracing::info!(%local, "waiting for peer");
    }

    let endpoint = acceptor
        .accept()
        .map(Arc::new)
        .map_err(|err| endpoint_error("accept failed", err))?;
    interrupt.guard(Arc::clone(&endpoint));
    let peer = peer_label(&endpoint);

    let mut printed = 0usize;
    for frame in endpoint.incoming() {
        printed = printed.saturating_add(1);
        print_frame(&frame, &peer, printed, format);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }
    tracing::info!(%peer, frames = printed, "session ended");

    interrupt.release();
    endpoint.close();
    Ok(SUCCESS)
}
