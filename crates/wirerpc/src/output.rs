use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
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

/// One completed call, as printed by `wirerpc call`.
pub struct Reply<'a> {
    pub address: &'a str,
    pub method: &'a str,
    pub body: &'a [u8],
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    address: &'a str,
    method: &'a str,
    response_size: usize,
    response: String,
    elapsed_ms: u128,
    timestamp: String,
}

pub fn print_reply(reply: &Reply<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                address: reply.address,
                method: reply.method,
                response_size: reply.body.len(),
                response: payload_preview(reply.body),
                elapsed_ms: reply.elapsed.as_millis(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METHOD", "SIZE", "ELAPSED", "RESPONSE"])
                .add_row(vec![
                    reply.method.to_string(),
                    reply.body.len().to_string(),
                    format!("{}ms", reply.elapsed.as_millis()),
                    payload_preview(reply.body),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "method={} size={} elapsed_ms={} response={}",
                reply.method,
                reply.body.len(),
                reply.elapsed.as_millis(),
                payload_preview(reply.body)
            );
        }
        OutputFormat::Raw => {
            print_raw(reply.body);
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'static str,
    address: &'a str,
    methods: &'a [&'a str],
}

/// Announce a bound server address on stdout so scripts can pick it up.
pub fn print_listening(address: &str, methods: &[&str], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                address,
                methods,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {address} (methods: {})", methods.join(", "));
        }
        OutputFormat::Raw => {
            println!("{address}");
        }
    }
    let _ = std::io::stdout().flush();
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_marks_binary_payloads() {
        assert_eq!(payload_preview(b"pong"), "pong");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
