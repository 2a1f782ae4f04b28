use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linewire_frame::Frame;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    sequence: usize,
    payload_size: usize,
    payload: String,
    binary: bool,
    peer: &'a str,
    timestamp: String,
}

impl<'a> FrameOutput<'a> {
    fn new(frame: &Frame, peer: &'a str, sequence: usize) -> Self {
        let (payload, binary) = payload_preview(frame.as_bytes());
        Self {
            sequence,
            payload_size: frame.len(),
            payload,
            binary,
            peer,
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_frame(frame: &Frame, peer: &str, sequence: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput::new(frame, peer, sequence);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let out = FrameOutput::new(frame, peer, sequence);
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    out.sequence.to_string(),
                    out.payload_size.to_string(),
                    out.peer.to_string(),
                    out.payload,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let out = FrameOutput::new(frame, peer, sequence);
            println!(
                "#{} size={} peer={} payload={}",
                out.sequence, out.payload_size, out.peer, out.payload
            );
        }
        OutputFormat::Raw => {
            // Raw output is itself newline-framed, so it can be piped into `send --stdin`.
            print_raw(frame.as_bytes());
            print_raw(b"\n");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> (String, bool) {
    match std::str::from_utf8(payload) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (format!("<binary {} bytes>", payload.len()), true),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
