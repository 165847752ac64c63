//! Human-readable rendering of blocks.
use chrono::{DateTime, SecondsFormat, Utc};
use ledger_core::Block;
use serde_json::Value;
use std::fmt::Write;

fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render_block(index: usize, block: &Block) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out, "Block {index}:");
    let _ = writeln!(out, "Block Hash: {}", block.hash());
    let _ = writeln!(out, "Previous Hash: {}", block.previous_hash());
    let _ = writeln!(out, "Timestamp: {}", format_timestamp(block.timestamp()));
    let _ = writeln!(out, "Proof-of-Work: {}", block.proof_of_work());
    let _ = writeln!(out, "Data:");
    for (key, value) in block.data().iter() {
        let _ = writeln!(out, "{key}: {}", format_value(value));
    }
    out
}
