//! Formatação de timestamps e linhas de amostra para exibição.

use crate::types::{AlertState, Sample};
use chrono::{DateTime, Utc};

/// Converte ns em `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC).
pub fn ns_to_iso8601(ns: u64) -> String {
    let secs = (ns / 1_000_000_000) as i64;
    let nanos = (ns % 1_000_000_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => format!("{ns}ns"),
    }
}

/// Linha de saída do modo poll.
pub fn format_sample_line(sample: &Sample, alert: &AlertState) -> String {
    let ts = ns_to_iso8601(sample.timestamp_ns);
    if alert.crossed {
        format!(
            "{ts} temp={:.3}C alert=1 (Threshold crossed)",
            sample.temp_celsius()
        )
    } else {
        format!("{ts} temp={:.3}C alert=0", sample.temp_celsius())
    }
}
