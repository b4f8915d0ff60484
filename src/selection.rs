//! Reductions that pick the winning trial out of per-trial scores.
//!
//! Non-finite scores mark trials that failed numerically; they never win.
//! Ties always go to the lowest index.

/// Direction in which a trial score is optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Keep the trial with the smallest score.
    #[default]
    Minimize,
    /// Keep the trial with the largest score.
    Maximize,
}

impl SelectionPolicy {
    pub fn select(&self, scores: &[f64]) -> Option<usize> {
        match self {
            SelectionPolicy::Minimize => argmin(scores),
            SelectionPolicy::Maximize => argmax(scores),
        }
    }
}

fn best_by(scores: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if !better(score, current) => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the smallest finite score, first occurrence on ties.
pub fn argmin(scores: &[f64]) -> Option<usize> {
    best_by(scores, |candidate, current| candidate < current)
}

/// Index of the largest finite score, first occurrence on ties.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    best_by(scores, |candidate, current| candidate > current)
}

/**
Median of `values`, averaging the two middle elements for even lengths.

Returns `None` for an empty slice or when any value is non-finite, so one failed repeat
disqualifies the whole outer trial.
 */
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Median over the inner repeats of each outer trial, then argmin over the outer trials.
pub fn median_then_argmin(nested: &[Vec<f64>]) -> Option<usize> {
    let medians: Vec<f64> = nested
        .iter()
        .map(|inner| median(inner).unwrap_or(f64::NAN))
        .collect();
    argmin(&medians)
}
