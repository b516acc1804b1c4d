use std::sync::LazyLock;

use regex::Regex;

/// Passed as `--progress-template`. The `[progress]` marker sets these lines
/// apart from the extractor's regular output; missing values print as `NA`.
pub const PROGRESS_TEMPLATE: &str = "download:[progress]%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s";

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[progress\]([a-z_]+)\|([^|]*)\|([^|]*)\|([^|]*)\s*$")
        .expect("progress regex is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
}

impl ProgressUpdate {
    /// Percentage in `0.0..=100.0` when the extractor knows (or estimates)
    /// the total size.
    pub fn percent(&self) -> Option<f32> {
        let total = self
            .total_bytes
            .or(self.total_bytes_estimate)
            .filter(|t| *t > 0)?;
        let percent = self.downloaded_bytes as f64 / total as f64 * 100.0;
        Some(percent.clamp(0.0, 100.0) as f32)
    }
}

/// Parse one line of extractor output. Returns `None` for anything that is
/// not a progress line.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_RE.captures(line)?;

    let status = match &caps[1] {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        other => ProgressStatus::Other(other.to_string()),
    };

    Some(ProgressUpdate {
        status,
        downloaded_bytes: parse_bytes(&caps[2]).unwrap_or(0),
        total_bytes: parse_bytes(&caps[3]),
        total_bytes_estimate: parse_bytes(&caps[4]),
    })
}

// Estimates come out as floats ("1234.0"), exact counts as integers.
fn parse_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "NA" || raw == "None" {
        return None;
    }
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_downloading_line() {
        let update = parse_progress_line("[progress]downloading|512|2048|NA").unwrap();
        assert_eq!(update.status, ProgressStatus::Downloading);
        assert_eq!(update.downloaded_bytes, 512);
        assert_eq!(update.total_bytes, Some(2048));
        assert_eq!(update.total_bytes_estimate, None);
        assert_eq!(update.percent(), Some(25.0));
    }

    #[test]
    fn test_estimate_used_when_total_missing() {
        let update = parse_progress_line("[progress]downloading|100|NA|400.0\r\n").unwrap();
        assert_eq!(update.total_bytes, None);
        assert_eq!(update.total_bytes_estimate, Some(400));
        assert_eq!(update.percent(), Some(25.0));
    }

    #[test]
    fn test_unknown_total_has_no_percent() {
        let update = parse_progress_line("[progress]downloading|100|NA|NA").unwrap();
        assert_eq!(update.percent(), None);
    }

    #[test]
    fn test_finished_line() {
        let update = parse_progress_line("[progress]finished|2048|2048|NA").unwrap();
        assert_eq!(update.status, ProgressStatus::Finished);
        assert_eq!(update.percent(), Some(100.0));
    }

    #[test]
    fn test_non_progress_lines_are_ignored() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("[download]  12.5% of 10.00MiB").is_none());
        assert!(parse_progress_line("").is_none());
    }
}
