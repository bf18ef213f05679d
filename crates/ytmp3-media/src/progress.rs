//! yt-dlp progress parsing.

use std::sync::LazyLock;

use regex::Regex;

/// `[download]  42.0% of ...`
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("progress pattern is valid")
});

/// Parse one output line into the percentages it reports.
///
/// A line may hold several carriage-return separated updates; each segment
/// yields at most one value. Lines without a progress marker yield nothing.
pub fn parse_progress(line: &str) -> Vec<f64> {
    line.split('\r')
        .filter_map(|segment| PROGRESS_RE.captures(segment))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}
