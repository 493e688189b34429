//! Throttled progress reporting for long row loops.
//!
//! [`ProgressCounter`] wraps a row count over a known `[start, end)` range
//! and draws it through an [`indicatif::ProgressBar`] as a single status
//! line: count, percentage, elapsed time. The line is redrawn at most once
//! per report interval, and once more when the counter is dropped.
//!
//! Drawing failures never reach the caller: reporting cannot affect the loop
//! it observes.

use std::fmt::{self, Write as _};
use std::time::{Duration, Instant};

use indicatif::{HumanCount, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Default minimum time between two reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Default thousands separator of the count.
pub const DEFAULT_SEPARATOR: char = '\'';

const TEMPLATE: &str = "{rows} | {share} | {clock}";
const COUNT_WIDTH: usize = 14;

/// `n` grouped by thousands with `separator`.
fn group(n: u64, separator: char) -> String {
    let grouped = HumanCount(n).to_string();
    if separator == ',' {
        grouped
    } else {
        grouped.replace(',', &separator.to_string())
    }
}

/// Percentage of `len` covered by `pos`; 0 before the first row.
fn share(pos: u64, len: Option<u64>) -> f64 {
    match len {
        Some(len) if len > 0 && pos > 0 => 100.0 * pos as f64 / len as f64,
        _ => 0.0,
    }
}

/// `H:MM:SS`, `M:SS`, `Ss`, or `Nms`.
fn clock(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:5}:{minutes:02}:{seconds:02}")
    } else if minutes > 0 {
        format!("{minutes:2}:{seconds:02}")
    } else if seconds > 0 {
        format!("{seconds:2}s")
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

fn style(start: u64, separator: char) -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key(
            "rows",
            move |state: &ProgressState, w: &mut dyn fmt::Write| {
                let rows = group(start + state.pos(), separator);
                let _ = write!(w, "{rows:>COUNT_WIDTH$}");
            },
        )
        .with_key("share", |state: &ProgressState, w: &mut dyn fmt::Write| {
            let _ = write!(w, "{:6.2}%", share(state.pos(), state.len()));
        })
        .with_key("clock", |state: &ProgressState, w: &mut dyn fmt::Write| {
            let _ = w.write_str(&clock(state.elapsed()));
        })
}

/// Row counter that draws its progress line to a terminal.
///
/// The bar only sees the count when a report is due, so the loop pays for
/// one [`Instant`] comparison per advance.
pub struct ProgressCounter {
    bar: ProgressBar,
    count: u64,
    start: u64,
    last_report: Instant,
    interval: Duration,
    separator: char,
}

impl ProgressCounter {
    /// Count `0..total`, drawing to stderr when it is a terminal.
    pub fn new(total: u64) -> Self {
        Self::with_target(0, total, ProgressDrawTarget::stderr())
    }

    /// Count `start..end`, drawing to `target`. Reports once right away.
    pub fn with_target(start: u64, end: u64, target: ProgressDrawTarget) -> Self {
        Self::with_options(start, end, target, DEFAULT_REPORT_INTERVAL, DEFAULT_SEPARATOR)
    }

    /// Fully configured counter. Reports once right away.
    pub fn with_options(
        start: u64,
        end: u64,
        target: ProgressDrawTarget,
        interval: Duration,
        separator: char,
    ) -> Self {
        let bar = ProgressBar::with_draw_target(Some(end.saturating_sub(start)), target);
        bar.set_style(style(start, separator));
        let mut counter = Self {
            bar,
            count: start,
            start,
            last_report: Instant::now(),
            interval,
            separator,
        };
        counter.report();
        counter
    }

    /// Advance by one.
    pub fn inc(&mut self) {
        self.add(1);
    }

    /// Advance by `n`, reporting if the interval has elapsed.
    pub fn add(&mut self, n: u64) {
        self.count += n;
        if self.last_report.elapsed() >= self.interval {
            self.report();
        }
    }

    /// Re-arm the range and the timers.
    pub fn reset(&mut self, start: u64, end: u64) {
        self.count = start;
        self.start = start;
        self.last_report = Instant::now();
        self.bar.reset();
        self.bar.set_length(end.saturating_sub(start));
        self.bar.set_style(style(start, self.separator));
    }

    /// Draw the current count now.
    pub fn report(&mut self) {
        self.last_report = Instant::now();
        self.bar.set_position(self.count.saturating_sub(self.start));
    }
}

impl Drop for ProgressCounter {
    fn drop(&mut self) {
        self.report();
        // leaves the final line in place; later output starts on a new line
        self.bar.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Screen;

    #[test]
    fn groups_thousands_with_local_separator() {
        assert_eq!(group(0, '\''), "0");
        assert_eq!(group(999, '\''), "999");
        assert_eq!(group(1_000, '\''), "1'000");
        assert_eq!(group(1_234_567, '\''), "1'234'567");
        assert_eq!(group(12_345, ','), "12,345");
    }

    #[test]
    fn clock_formats_by_magnitude() {
        assert_eq!(clock(Duration::from_millis(250)), "250ms");
        assert_eq!(clock(Duration::from_secs(7)), " 7s");
        assert_eq!(clock(Duration::from_secs(125)), " 2:05");
        assert_eq!(clock(Duration::from_secs(3725)), "    1:02:05");
    }

    #[test]
    fn share_is_zero_until_the_first_row() {
        assert_eq!(share(0, Some(10)), 0.0);
        assert_eq!(share(5, Some(10)), 50.0);
        assert_eq!(share(3, Some(0)), 0.0);
        assert_eq!(share(3, None), 0.0);
    }

    #[test]
    fn reports_at_start_and_drop_only_when_fast() {
        let screen = Screen::default();
        {
            let mut counter = ProgressCounter::with_target(0, 10_000, screen.target());
            for _ in 0..10_000 {
                counter.inc();
            }
            assert_eq!(counter.count, 10_000);
        }
        let lines = screen.lines();
        assert!(lines[0].starts_with("             0 |   0.00% |"), "{lines:?}");
        assert!(
            lines.iter().all(|l| l.contains("  0.00%") || l.contains("100.00%")),
            "{lines:?}"
        );
        let last = lines.last().map(String::as_str).unwrap_or_default();
        assert!(last.starts_with("        10'000 | 100.00% |"), "{lines:?}");
    }

    #[test]
    fn zero_interval_reports_every_advance() {
        let screen = Screen::default();
        {
            let mut counter =
                ProgressCounter::with_options(0, 4, screen.target(), Duration::ZERO, ',');
            counter.inc();
            assert!(screen.lines().iter().any(|l| l.contains(" 25.00%")));
            counter.add(3);
            assert!(screen.lines().iter().any(|l| l.contains("100.00%")));
        }
    }

    #[test]
    fn reset_rearms_the_range() {
        let screen = Screen::default();
        let mut counter = ProgressCounter::with_options(0, 4, screen.target(), Duration::ZERO, '\'');
        counter.add(4);
        counter.reset(10, 20);
        assert_eq!(counter.count, 10);
        counter.add(5);
        let last = screen.lines().pop().unwrap_or_default();
        assert!(last.starts_with("            15 |  50.00% |"), "{last:?}");
    }
}
