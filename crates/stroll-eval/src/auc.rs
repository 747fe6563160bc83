//! ROC AUC scoring.
//!
//! Binary AUC uses the rank-sum (Mann-Whitney) form with midranks for ties,
//! which equals the area under the trapezoidal ROC curve. The multi-class
//! score is the unweighted mean of the one-vs-rest AUCs.

use std::collections::BTreeSet;

use ordered_float::OrderedFloat;
use stroll_core::types::ClassId;

/// AUC of `scores` against binary `positives`.
///
/// `None` when either class is empty.
pub fn binary_auc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    debug_assert_eq!(scores.len(), positives.len());
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(scores[i]));

    // Sum of the 1-based midranks of the positive samples.
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let score = OrderedFloat(scores[order[start]]);
        let end = start
            + order[start..]
                .iter()
                .take_while(|&&i| OrderedFloat(scores[i]) == score)
                .count();
        let midrank = (start + end + 1) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| positives[i]).count();
        positive_rank_sum += midrank * tied_positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Macro one-vs-rest AUC over the classes present in `labels`.
///
/// `probabilities[i][k]` is the score of class `k + 1` for sample `i`.
/// `None` when fewer than two classes are present.
pub fn one_vs_rest_auc(probabilities: &[Vec<f64>], labels: &[ClassId]) -> Option<f64> {
    debug_assert_eq!(probabilities.len(), labels.len());
    let classes: BTreeSet<ClassId> = labels.iter().copied().collect();
    if classes.len() < 2 {
        return None;
    }

    let mut total = 0.0;
    for &class_id in &classes {
        let column = (class_id as usize).checked_sub(1)?;
        let scores: Vec<f64> = probabilities
            .iter()
            .map(|p| p.get(column).copied().unwrap_or(0.0))
            .collect();
        let positives: Vec<bool> = labels.iter().map(|&l| l == class_id).collect();
        total += binary_auc(&scores, &positives)?;
    }
    Some(total / classes.len() as f64)
}
