use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use linewire_endpoint::connect_with_config;
use linewire_frame::DELIMITER;

use crate::cmd::{parse_duration, peer_label, Interrupt, SendArgs};
use crate::exit::{endpoint_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = args.conn.endpoint_config()?;
    if let Some(timeout) = &args.connect_timeout {
        config = config.with_connect_timeout(parse_duration(timeout)?);
    }
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payloads = resolve_payloads(&args)?;

    let interrupt = Interrupt::install()?;
    let endpoint = connect_with_config(&args.conn.protocol, &args.conn.address, &config)
        .map(Arc::new)
        .map_err(|err| endpoint_error("connect failed", err))?;
    interrupt.guard(Arc::clone(&endpoint));

    for payload in &payloads {
        endpoint
            .emit(payload)
            .map_err(|err| endpoint_error("send failed", err))?;
    }
    tracing::debug!(frames = payloads.len(), "sent");

    if args.wait {
        let frame = endpoint
            .recv_timeout(wait_timeout)
            .map_err(|err| endpoint_error("receive failed", err))?;
        print_frame(&frame, &peer_label(&endpoint), 1, format);
    }

    interrupt.release();
    endpoint.close();
    Ok(SUCCESS)
}

fn resolve_payloads(args: &SendArgs) -> CliResult<Vec<Vec<u8>>> {
    if let Some(json) = &args.json {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        // Compact serialization never contains a raw newline.
        let line = serde_json::to_vec(&value)
            .map_err(|err| CliError::new(USAGE, format!("--json could not be encoded: {err}")))?;
        return Ok(vec![line]);
    }
    if let Some(data) = &args.data {
        return single_line(data.as_bytes()).map(|line| vec![line]);
    }
    if let Some(path) = &args.file {
        let file = File::open(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return read_lines(file)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    if args.stdin {
        return read_lines(std::io::stdin().lock())
            .map_err(|err| io_error("failed reading stdin", err));
    }
    Ok(vec![Vec::new()])
}

fn single_line(data: &[u8]) -> CliResult<Vec<u8>> {
    if data.contains(&DELIMITER) {
        return Err(CliError::new(
            USAGE,
            "payload must not contain a newline; use --file or --stdin to send several frames",
        ));
    }
    Ok(data.to_vec())
}

/// Split input into frames. A final line without a trailing newline still counts.
fn read_lines(input: impl Read) -> std::io::Result<Vec<Vec<u8>>> {
    BufReader::new(input).split(DELIMITER).collect()
}
