//! Decimal unit formatting for bitrates and sizes

const STEP: f64 = 1000.0;

/// Format bits per second as Kbps or Mbps with three decimals
pub fn format_bitrate(bits_per_second: u64) -> String {
    let mut value = bits_per_second as f64 / STEP;
    let mut suffix = "Kbps";
    if value / STEP >= 1.0 {
        value /= STEP;
        suffix = "Mbps";
    }
    format!("{:.3} {}", value, suffix)
}

/// Format a byte count as B, KB or MB with two decimals
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut suffix = "B";
    if value / STEP >= 1.0 {
        value /= STEP;
        suffix = "KB";
        if value / STEP >= 1.0 {
            value /= STEP;
            suffix = "MB";
        }
    }
    format!("{:.2} {}", value, suffix)
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_millis = duration.as_millis();
    if total_millis < 1000 {
        return format!("{}ms", total_millis);
    }

    let total_seconds = duration.as_secs();
    if total_seconds < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, seconds)
        }
    }
}
