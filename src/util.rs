//! Small statistics over latency samples.

use crate::clock::Millis;

pub fn mean(samples: &[Millis]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum = samples.iter().map(|s| *s as f64).sum::<f64>();
    Some(sum / samples.len() as f64)
}

/// Population standard deviation
pub fn std_dev(samples: &[Millis]) -> Option<f64> {
    let avg = mean(samples)?;
    let variance = samples
        .iter()
        .map(|s| {
            let diff = avg - *s as f64;
            diff * diff
        })
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

/// `part` as a percentage of `whole`; zero when there is nothing to divide
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
