//! Formatted output helpers for CLI commands.

use std::time::Duration;

use mountat_bench::driver::BenchReport;

/// Formats a duration with a unit suited to its magnitude (e.g. "1.5 ms").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    const MICRO: u128 = 1_000;
    const MILLI: u128 = MICRO * 1_000;
    const SECOND: u128 = MILLI * 1_000;

    let nanos = duration.as_nanos();
    if nanos >= SECOND {
        format!("{:.2} s", nanos as f64 / SECOND as f64)
    } else if nanos >= MILLI {
        format!("{:.2} ms", nanos as f64 / MILLI as f64)
    } else if nanos >= MICRO {
        format!("{:.1} µs", nanos as f64 / MICRO as f64)
    } else {
        format!("{nanos} ns")
    }
}

/// Renders a benchmark report as an aligned table.
#[must_use]
pub fn format_report(report: &BenchReport) -> String {
    let mut table = format!(
        "{:<10} {:>8} {:>10} {:>12} {:>12} {:>12}\n",
        "MECHANISM", "LAYERS", "ITERATIONS", "MEAN", "MIN", "MAX"
    );
    for case in &report.cases {
        table.push_str(&format!(
            "{:<10} {:>8} {:>10} {:>12} {:>12} {:>12}\n",
            case.mechanism,
            case.layers,
            case.iterations,
            format_duration(case.mean()),
            format_duration(Duration::from_nanos(case.min_ns)),
            format_duration(Duration::from_nanos(case.max_ns)),
        ));
    }
    table
}
