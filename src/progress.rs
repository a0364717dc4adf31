use std::io::{self, Write};

use crate::trainer::EpochSummary;

/// Console feedback for the training and evaluation loops.
pub trait ProgressReporter {
    /// Overwrites the current progress line with `label` and the `done / total` fraction.
    fn progress(&mut self, label: &str, done: usize, total: usize);
    /// Erases the progress line.
    fn clear(&mut self);
    /// Emits the per-epoch summary line.
    fn epoch_done(&mut self, summary: &EpochSummary);
}

/// Writes a single `\r`-overwritten progress line to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for ConsoleReporter {
    fn progress(&mut self, label: &str, done: usize, total: usize) {
        let mut out = io::stdout().lock();
        // progress output is best effort; a closed stdout must not abort training
        let _ = write!(out, "\r\x1b[2K{}", progress_line(label, done, total));
        let _ = out.flush();
    }

    fn clear(&mut self) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K");
        let _ = out.flush();
    }

    fn epoch_done(&mut self, summary: &EpochSummary) {
        self.clear();
        println!("{}", summary_line(summary));
    }
}

/// Swallows everything. Used by tests and library callers that log through `tracing` only.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn progress(&mut self, _label: &str, _done: usize, _total: usize) {}

    fn clear(&mut self) {}

    fn epoch_done(&mut self, _summary: &EpochSummary) {}
}

/// `Training ...  50% (4/8)`
pub fn progress_line(label: &str, done: usize, total: usize) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    };
    format!("{label} {percent:3.0}% ({done}/{total})")
}

/// `Epoch 3 done in 12 sec - loss: 5.123456 - log_likelihood: -1234 - ppl: 250 - lr: 0.98 - total 1 min`
pub fn summary_line(summary: &EpochSummary) -> String {
    let perplexity = summary.perplexity.map_or(-1, |ppl| ppl as i64);
    format!(
        "Epoch {} done in {} sec - loss: {:.6} - log_likelihood: {} - ppl: {} - lr: {} - total {} min",
        summary.epoch + 1,
        summary.duration.as_secs(),
        summary.mean_loss,
        (-summary.nll) as i64,
        perplexity,
        format_lr(summary.learning_rate),
        summary.total_minutes,
    )
}

/// Three significant digits without trailing zeros, in the manner of `%.3g`.
pub fn format_lr(value: f32) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let exponent = value.abs().log10().floor() as i32;
    if !(-4..3).contains(&exponent) {
        let formatted = format!("{value:.2e}");
        return match formatted.split_once('e').map(|(m, e)| (m, e.parse::<i32>())) {
            Some((mantissa, Ok(exp))) => format!("{}e{:+03}", trim_zeros(mantissa), exp),
            _ => formatted,
        };
    }
    let decimals = (2 - exponent).max(0) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_lr_matches_three_significant_digits() {
        assert_eq!(format_lr(1.0), "1");
        assert_eq!(format_lr(0.98), "0.98");
        assert_eq!(format_lr(0.9604), "0.96");
        assert_eq!(format_lr(0.123456), "0.123");
        assert_eq!(format_lr(0.00001), "1e-05");
        assert_eq!(format_lr(0.0005), "0.0005");
    }

    #[test]
    fn test_progress_line_shows_percentage() {
        assert_eq!(progress_line("Training ...", 4, 8), "Training ...  50% (4/8)");
        assert_eq!(progress_line("Training ...", 8, 8), "Training ... 100% (8/8)");
        assert_eq!(progress_line("Computing perplexity ...", 1, 300), "Computing perplexity ...   0% (1/300)");
    }

    #[test]
    fn test_summary_line_uses_sentinel_without_evaluation() {
        let summary = EpochSummary {
            epoch: 1,
            duration: Duration::from_secs(7),
            mean_loss: 12.5,
            nll: 0.0,
            perplexity: None,
            learning_rate: 1.0,
            total_minutes: 0,
            iterations: 3,
        };
        assert_eq!(
            summary_line(&summary),
            "Epoch 2 done in 7 sec - loss: 12.500000 - log_likelihood: 0 - ppl: -1 - lr: 1 - total 0 min"
        );
    }
}
