//! Ranker: logits to a probability distribution and a top-K shortlist

use serde::{Deserialize, Serialize};

use crate::labels::LabelSet;
use crate::utils::error::{DefectError, Result};

/// Raw classifier scores, index-aligned with the label set
#[derive(Debug, Clone, PartialEq)]
pub struct Logits(Vec<f32>);

impl Logits {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for Logits {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// A single ranked class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class name
    #[serde(rename = "class")]
    pub label: String,

    /// Softmax probability in [0, 1]
    pub confidence: f32,
}

/// Top-K predictions, sorted by confidence descending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub results: Vec<Prediction>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Highest-confidence prediction
    pub fn top(&self) -> Option<&Prediction> {
        self.results.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        self.results.iter()
    }
}

/// Numerically stable softmax: shift by the maximum before exponentiating
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices and values of the `k` largest probabilities.
///
/// Equal probabilities keep label order, so the lower index comes first.
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.truncate(k);
    indexed
}

/// Turns logits into a ranked shortlist of labels
#[derive(Debug, Clone)]
pub struct Ranker {
    labels: LabelSet,
    top_k: usize,
}

impl Ranker {
    /// Create a ranker returning `top_k` entries by default
    pub fn new(labels: LabelSet, top_k: usize) -> Result<Self> {
        check_k(top_k, labels.len())?;
        Ok(Self { labels, top_k })
    }

    /// Rank with the configured K
    pub fn rank_default(&self, logits: &Logits) -> Result<ResultSet> {
        self.rank(logits, self.top_k)
    }

    /// Rank `logits` and keep the `k` most probable labels.
    ///
    /// Fails with [`DefectError::InvalidArgument`] unless `1 <= k <= |labels|`
    /// and the logits are finite and one per label.
    pub fn rank(&self, logits: &Logits, k: usize) -> Result<ResultSet> {
        let probabilities = self.probabilities(logits)?;
        check_k(k, self.labels.len())?;

        let results = top_k(&probabilities, k)
            .into_iter()
            .map(|(index, confidence)| Prediction {
                // Index is in range: probabilities has exactly |labels| entries
                label: self.labels.get(index).unwrap_or_default().to_string(),
                confidence,
            })
            .collect();

        Ok(ResultSet { results })
    }

    /// Full probability distribution over the label set
    pub fn probabilities(&self, logits: &Logits) -> Result<Vec<f32>> {
        if logits.len() != self.labels.len() {
            return Err(DefectError::InvalidArgument(format!(
                "got {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        if logits.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(DefectError::InvalidArgument(
                "logits must be finite".to_string(),
            ));
        }

        Ok(softmax(logits.as_slice()))
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

fn check_k(k: usize, num_labels: usize) -> Result<()> {
    if k == 0 || k > num_labels {
        return Err(DefectError::InvalidArgument(format!(
            "k must be in 1..={}, got {}",
            num_labels, k
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranker() -> Ranker {
        Ranker::new(LabelSet::default(), 3).unwrap()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let cases: [&[f32]; 4] = [
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &[1.0, 2.0, 3.0, -4.0, 0.5, 10.0],
            &[1000.0, 999.0, -1000.0, 0.0, 500.0, 1000.0],
            &[-80.0, -90.0, -100.0, -85.0, -95.0, -70.0],
        ];

        for logits in cases {
            let probs = softmax(logits);
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "sum was {} for {:?}", sum, logits);
            assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_softmax_large_logits_do_not_overflow() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_rank_orders_by_confidence() {
        let logits = Logits::new(vec![0.1, 3.0, -1.0, 2.0, 0.0, 1.0]);
        let results = ranker().rank_default(&logits).unwrap();

        let labels: Vec<&str> = results.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["inclusion", "pitted_surface", "scratches"]);
        assert!(results
            .results
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_tie_break_prefers_lower_index() {
        let logits = Logits::new(vec![0.0, 5.0, 0.0, 0.0, 5.0, 0.0]);
        let results = ranker().rank(&logits, 4).unwrap();

        let labels: Vec<&str> = results.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["inclusion", "rolled-in_scale", "crazing", "patches"]
        );
        assert_eq!(results.results[0].confidence, results.results[1].confidence);
    }

    #[test]
    fn test_k_equal_to_label_count_returns_all() {
        let logits = Logits::new(vec![0.5, 0.4, 0.3, 0.2, 0.1, 0.0]);
        let results = ranker().rank(&logits, 6).unwrap();

        assert_eq!(results.len(), 6);
        let total: f32 = results.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(results.top().unwrap().label, "crazing");
    }

    #[test]
    fn test_k_out_of_range_is_invalid_argument() {
        let logits = Logits::new(vec![0.0; 6]);
        let ranker = ranker();

        assert!(matches!(
            ranker.rank(&logits, 0),
            Err(DefectError::InvalidArgument(_))
        ));
        assert!(matches!(
            ranker.rank(&logits, 7),
            Err(DefectError::InvalidArgument(_))
        ));
        assert!(Ranker::new(LabelSet::default(), 0).is_err());
    }

    #[test]
    fn test_rejects_misaligned_or_non_finite_logits() {
        let ranker = ranker();

        assert!(matches!(
            ranker.rank_default(&Logits::new(vec![0.0; 5])),
            Err(DefectError::InvalidArgument(_))
        ));
        assert!(matches!(
            ranker.rank_default(&Logits::new(vec![0.0, f32::NAN, 0.0, 0.0, 0.0, 0.0])),
            Err(DefectError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_result_set_json_shape() {
        let logits = Logits::new(vec![2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let results = ranker().rank(&logits, 1).unwrap();

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["results"][0]["class"], "crazing");
        assert!(json["results"][0]["confidence"].as_f64().unwrap() > 0.5);
    }
}
