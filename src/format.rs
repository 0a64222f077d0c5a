//! Timer-style duration formatting.
//!
//! Values are truncated (never rounded) to the display granularity, so a split never
//! shows a time it has not reached yet.

use std::time::Duration;

/// Placeholder for values that do not exist yet (no history, uncommitted segment).
pub const PLACEHOLDER: &str = "-";

/// Format as `h:mm:ss.f`, `m:ss.f` or `s.f`, with as many fraction digits as the
/// granularity resolves (100ms → 1, 10ms → 2, 1ms → 3, ≥1s → none).
pub fn format_duration(d: Duration, granularity: Duration) -> String {
    let digits = fraction_digits(granularity);
    let step = granularity.as_millis().max(1);
    let total_ms = d.as_millis() / step * step;

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    let whole = if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes}:{seconds:02}")
    } else {
        format!("{seconds}")
    };

    match digits {
        0 => whole,
        n => {
            let frac = format!("{millis:03}");
            format!("{whole}.{}", &frac[..n])
        }
    }
}

/// Signed delta with an explicit `+`/`-`. Zero is shown as `0`.
pub fn format_delta(d: time::Duration, granularity: Duration) -> String {
    let magnitude = Duration::from_nanos(d.whole_nanoseconds().unsigned_abs() as u64);
    let text = format_duration(magnitude, granularity);
    if magnitude.as_millis() < granularity.as_millis().max(1) {
        "0".to_string()
    } else if d.is_negative() {
        format!("-{text}")
    } else {
        format!("+{text}")
    }
}

pub fn format_opt(d: Option<Duration>, granularity: Duration) -> String {
    d.map(|d| format_duration(d, granularity))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn fraction_digits(granularity: Duration) -> usize {
    match granularity.as_millis() {
        0..=1 => 3,
        2..=10 => 2,
        11..=999 => 1,
        _ => 0,
    }
}
