//! Map-then-reduce driver shared by the pipelines.
//!
//! Random draws happen before a trial is evaluated, so each trial is a pure function of its
//! context and the read-only inputs. Evaluation order therefore never changes the outcome.

use rayon::prelude::*;
use crate::errors::{Result, SketchError};

/// Evaluates `f` on every trial context, on the rayon pool when `parallel` is set.
/// Outcomes are returned in trial order.
pub(crate) fn evaluate<C, O, F>(contexts: Vec<C>, parallel: bool, f: F) -> Vec<Result<O>>
where
    C: Send,
    O: Send,
    F: Fn(usize, C) -> Result<O> + Send + Sync,
{
    if parallel {
        contexts
            .into_par_iter()
            .enumerate()
            .map(|(i, context)| f(i, context))
            .collect()
    } else {
        contexts
            .into_iter()
            .enumerate()
            .map(|(i, context)| f(i, context))
            .collect()
    }
}

/// Keeps numerically failed trials as `None` and propagates every other error.
pub(crate) fn viable<O>(outcomes: Vec<Result<O>>) -> Result<Vec<Option<O>>> {
    outcomes
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| match outcome {
            Ok(output) => Ok(Some(output)),
            Err(SketchError::NumericalError(msg)) => {
                log::warn!("trial {} is not viable : {}", i, msg);
                Ok(None)
            }
            Err(e) => Err(e),
        })
        .collect()
}

/// Score of each trial, NaN for trials that did not survive.
pub(crate) fn scores_or_nan<O>(trials: &[Option<O>], score: impl Fn(&O) -> f64) -> Vec<f64> {
    trials
        .iter()
        .map(|trial| trial.as_ref().map_or(f64::NAN, &score))
        .collect()
}

/// Moves the selected trial out of `trials`, or reports that none was viable.
pub(crate) fn take_selected<O>(mut trials: Vec<Option<O>>, selected: Option<usize>, pipeline: &str) -> Result<(usize, O)> {
    selected
        .and_then(|i| trials.get_mut(i).and_then(Option::take).map(|output| (i, output)))
        .ok_or_else(|| {
            SketchError::NumericalError(format!(
                "{}: none of the {} trials produced a finite score",
                pipeline,
                trials.len()
            ))
        })
}
