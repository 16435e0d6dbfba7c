use crate::engine::FinishReport;

const TWEET_INTENT: &str = "https://twitter.com/intent/tweet?text=";

pub fn share_text(report: &FinishReport) -> String {
    format!(
        "I scored {} in {:.2}s on {}! Can you beat me?",
        report.score,
        report.elapsed_ms as f64 / 1000.0,
        report.kind.name()
    )
}

/// Percent-encode everything outside the URL unreserved set
fn encode(text: &str) -> String {
    text.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

pub fn share_url(report: &FinishReport) -> String {
    format!("{TWEET_INTENT}{}", encode(&share_text(report)))
}
