//! Final summary rendering

use std::io;
use std::time::Duration;

use crate::TOOL_AGENT;

use super::Totals;

/// Run parameters the summary reports alongside the totals.
#[derive(Debug, Clone)]
pub(crate) struct RunInfo {
    pub(crate) endpoint: String,
    pub(crate) concurrency: usize,
    pub(crate) duration: Duration,
}

/// Write the labelled plain-text summary.
pub(crate) fn render<W: io::Write>(
    out: &mut W,
    totals: &Totals,
    wall: Duration,
    info: &RunInfo,
) -> io::Result<()> {
    let wall_secs = wall.as_secs_f64().max(f64::EPSILON);
    let per_second = (totals.seen as f64 / wall_secs * 100.0).round() / 100.0;
    let received = totals.bytes_received as f64;
    let sent = totals.bytes_sent as f64;

    writeln!(out)?;
    writeln!(out, "Running benchmark @ {} [{}]", info.endpoint, TOOL_AGENT)?;
    writeln!(out, "Workers:\t{}", info.concurrency)?;
    writeln!(out)?;
    writeln!(out, "WallTime:\t{:.2}s", wall.as_secs_f64())?;
    writeln!(
        out,
        "Requests:\t{} ({per_second}/second)",
        totals.latency.total()
    )?;
    writeln!(
        out,
        "Received:\t{} ({}/s)",
        format_bytes(received),
        format_bytes(received / wall_secs)
    )?;
    writeln!(
        out,
        "Sent:\t\t{} ({}/s)",
        format_bytes(sent),
        format_bytes(sent / wall_secs)
    )?;
    writeln!(
        out,
        "Latency:\tmax={}ms mean={:.2}ms p50={}ms p90={}ms p95={}ms p99={}ms",
        totals.latency.max(),
        totals.latency.mean(),
        totals.latency.quantile(0.50),
        totals.latency.quantile(0.90),
        totals.latency.quantile(0.95),
        totals.latency.quantile(0.99),
    )?;
    writeln!(out, "Errored:\t{}", totals.errors)?;
    writeln!(out, "Conns:\t\t{} opened", totals.new_connections)?;
    writeln!(out, "Waiting:\t{}", waiting_line(totals, wall, info))?;
    writeln!(out)?;
    write!(out, "{}", totals.statuses)?;
    Ok(())
}

/// Per-phase breakdown: absolute seconds plus share of the workload's
/// normalised capacity (`duration x concurrency`, or wall time when the
/// run was count-bound).
fn waiting_line(totals: &Totals, wall: Duration, info: &RunInfo) -> String {
    let base = if info.duration.is_zero() {
        wall
    } else {
        info.duration
    };
    let capacity = (base.as_secs_f64() * info.concurrency.max(1) as f64).max(f64::EPSILON);

    let phase = |spent: Duration| {
        let seconds = spent.as_secs_f64();
        (seconds / capacity * 100.0, seconds)
    };
    let (dns_pct, dns_secs) = phase(totals.waiting_dns);
    let (tls_pct, tls_secs) = phase(totals.waiting_tls);
    let (connect_pct, connect_secs) = phase(totals.waiting_connect);
    let (get_conn_pct, get_conn_secs) = phase(totals.waiting_get_conn);

    format!(
        "[{dns_pct:.2}%] Resolving DNS ({dns_secs:.2}s), \
         [{tls_pct:.2}%] TLS Handshake ({tls_secs:.2}s), \
         [{connect_pct:.2}%] Connecting ({connect_secs:.2}s), \
         [{get_conn_pct:.2}%] Getting Connections ({get_conn_secs:.2}s)"
    )
}

/// Human-readable byte count.
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    if bytes < KB {
        format!("{bytes:.0}B")
    } else if bytes < MB {
        format!("{:.2}KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.2}MB", bytes / MB)
    } else {
        format!("{:.2}GB", bytes / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn info() -> RunInfo {
        RunInfo {
            endpoint: "http://localhost:8080/status/200".into(),
            concurrency: 4,
            duration: Duration::ZERO,
        }
    }

    fn totals() -> Totals {
        let mut totals = Totals::default();
        for ms in [5u64, 10, 20] {
            totals.latency.record(Duration::from_millis(ms));
            totals.statuses.increment(200);
        }
        totals.statuses.increment(500);
        totals.latency.record(Duration::from_millis(7));
        totals.errors.record(ErrorKind::Timeout);
        totals.seen = 5;
        totals.bytes_sent = 4096;
        totals.bytes_received = 2 * 1024 * 1024;
        totals.new_connections = 4;
        totals.waiting_dns = Duration::from_millis(12);
        totals
    }

    #[test]
    fn summary_sections_appear_in_order() {
        let mut out = Vec::new();
        render(&mut out, &totals(), Duration::from_secs(2), &info()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let labels = [
            "WallTime:", "Requests:", "Received:", "Sent:", "Latency:", "Errored:", "Conns:",
            "Waiting:", "Breakdown",
        ];
        let mut last = 0;
        for label in labels {
            let at = text.find(label).unwrap_or_else(|| panic!("missing {label}"));
            assert!(at > last, "{label} out of order");
            last = at;
        }
    }

    #[test]
    fn summary_reports_counts_and_kinds() {
        let mut out = Vec::new();
        render(&mut out, &totals(), Duration::from_secs(2), &info()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Requests:\t4"));
        assert!(text.contains("Timeout(1)"));
        assert!(text.contains("[200]: 3"));
        assert!(text.contains("[500]: 1"));
        assert!(text.contains("4 opened"));
        assert!(text.contains("Resolving DNS (0.01s)"));
    }

    #[test]
    fn latency_line_has_all_quantiles() {
        let mut out = Vec::new();
        render(&mut out, &totals(), Duration::from_secs(1), &info()).unwrap();
        let text = String::from_utf8(out).unwrap();
        for field in ["max=", "mean=", "p50=", "p90=", "p95=", "p99="] {
            assert!(text.contains(field), "missing {field}");
        }
    }

    #[test]
    fn bytes_format_scales_units() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2048.0), "2.00KB");
        assert_eq!(format_bytes(3.5 * 1024.0 * 1024.0), "3.50MB");
        assert!(format_bytes(5.0 * 1024.0 * 1024.0 * 1024.0).ends_with("GB"));
    }
}
