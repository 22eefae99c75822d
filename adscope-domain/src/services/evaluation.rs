use thiserror::Error;

use crate::entities::ModelScores;

#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    #[error("{labels} labels but {scores} scores")]
    LengthMismatch { labels: usize, scores: usize },
    #[error("label {0} is not binary")]
    InvalidLabel(u8),
    #[error("score at row {0} is not finite")]
    NonFiniteScore(usize),
    /// Ranking metrics are undefined when only one class is present.
    #[error("ground truth has a single class ({positives} positives out of {total})")]
    SingleClass { positives: usize, total: usize },
}

fn check(labels: &[u8], scores: &[f64]) -> Result<usize, EvaluationError> {
    if labels.len() != scores.len() {
        return Err(EvaluationError::LengthMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }
    if let Some(&bad) = labels.iter().find(|l| **l > 1) {
        return Err(EvaluationError::InvalidLabel(bad));
    }
    if let Some(row) = scores.iter().position(|s| !s.is_finite()) {
        return Err(EvaluationError::NonFiniteScore(row));
    }
    let positives = labels.iter().filter(|l| **l == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(EvaluationError::SingleClass {
            positives,
            total: labels.len(),
        });
    }
    Ok(positives)
}

/// Row order by descending score; ties keep row order.
fn descending(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Area under the ROC curve. Tied scores count one half, which equals the
/// trapezoidal area over distinct thresholds.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64, EvaluationError> {
    let positives = check(labels, scores)?;
    let negatives = labels.len() - positives;
    let order = descending(scores);

    let mut area = 0.0;
    let mut negatives_above = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let tied = &order[start..end];
        let tied_pos = tied.iter().filter(|&&i| labels[i] == 1).count() as f64;
        let tied_neg = tied.len() as f64 - tied_pos;
        area += tied_pos * (negatives as f64 - negatives_above - 0.5 * tied_neg);
        negatives_above += tied_neg;
        start = end;
    }
    Ok(area / (positives as f64 * negatives as f64))
}

/// Average precision: sum over distinct thresholds of the recall gained times
/// the precision at that threshold, without interpolation.
pub fn average_precision(labels: &[u8], scores: &[f64]) -> Result<f64, EvaluationError> {
    let positives = check(labels, scores)? as f64;
    let order = descending(scores);

    let mut ap = 0.0;
    let mut tp = 0.0;
    let mut seen = 0.0;
    let mut prev_recall = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            if labels[order[end]] == 1 {
                tp += 1.0;
            }
            seen += 1.0;
            end += 1;
        }
        let recall = tp / positives;
        ap += (recall - prev_recall) * (tp / seen);
        prev_recall = recall;
        start = end;
    }
    Ok(ap)
}

pub fn evaluate_scores(labels: &[u8], scores: &[f64]) -> Result<ModelScores, EvaluationError> {
    Ok(ModelScores {
        roc_auc: roc_auc(labels, scores)?,
        pr_auc: average_precision(labels, scores)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_example() {
        let labels = [0, 0, 1, 1];
        let scores = [0.1, 0.4, 0.35, 0.8];
        assert!((roc_auc(&labels, &scores).unwrap() - 0.75).abs() < 1e-12);
        assert!((average_precision(&labels, &scores).unwrap() - 0.833_333_333_333).abs() < 1e-9);
    }

    #[test]
    fn perfect_and_inverted_rankings() {
        let labels = [1, 1, 0, 0, 0];
        let good = [0.9, 0.8, 0.3, 0.2, 0.1];
        let bad = [0.1, 0.2, 0.7, 0.8, 0.9];
        assert_eq!(roc_auc(&labels, &good).unwrap(), 1.0);
        assert_eq!(average_precision(&labels, &good).unwrap(), 1.0);
        assert_eq!(roc_auc(&labels, &bad).unwrap(), 0.0);
        let ap_bad = average_precision(&labels, &bad).unwrap();
        assert!((ap_bad - (0.5 * 0.25 + 0.5 * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn fully_tied_scores_give_chance_level() {
        let labels = [1, 0, 1, 0];
        let scores = [0.5; 4];
        assert_eq!(roc_auc(&labels, &scores).unwrap(), 0.5);
        assert_eq!(average_precision(&labels, &scores).unwrap(), 0.5);
    }

    #[test]
    fn partial_ties_count_half() {
        // positive at 0.7 ties one negative; the other negative is below
        let labels = [1, 0, 0];
        let scores = [0.7, 0.7, 0.2];
        assert!((roc_auc(&labels, &scores).unwrap() - 0.75).abs() < 1e-12);
        assert!((average_precision(&labels, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_class_labels_are_rejected() {
        let scores = [0.3, 0.2, 0.1];
        assert_eq!(
            roc_auc(&[0, 0, 0], &scores),
            Err(EvaluationError::SingleClass {
                positives: 0,
                total: 3,
            })
        );
        assert_eq!(
            average_precision(&[1, 1, 1], &scores),
            Err(EvaluationError::SingleClass {
                positives: 3,
                total: 3,
            })
        );
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert_eq!(
            roc_auc(&[0, 1], &[0.1]),
            Err(EvaluationError::LengthMismatch {
                labels: 2,
                scores: 1,
            })
        );
        assert_eq!(
            roc_auc(&[0, 2], &[0.1, 0.2]),
            Err(EvaluationError::InvalidLabel(2))
        );
        assert_eq!(
            evaluate_scores(&[0, 1], &[0.1, f64::NAN]),
            Err(EvaluationError::NonFiniteScore(1))
        );
    }
}
