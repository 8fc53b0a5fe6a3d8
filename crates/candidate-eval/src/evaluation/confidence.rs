use super::domain::ComponentScores;

/// Confidence from how tightly the component scores agree and how high they sit.
///
/// `consistency = 1 - 2 * variance` is floored at zero before it is averaged with the mean.
pub fn estimate_confidence(scores: &ComponentScores) -> f64 {
    let values = scores.as_array();
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;

    let consistency = (1.0 - variance * 2.0).max(0.0);
    ((consistency + mean) / 2.0).clamp(0.0, 1.0)
}
