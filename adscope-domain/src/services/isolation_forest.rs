use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::entities::IsolationForestParams;
use crate::services::detectors::{check_features, DetectorError, OutlierDetector};
use crate::value_objects::ModelName;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const AUTO_MAX_SAMPLES: usize = 256;

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn fit(
        x: &ArrayView2<'_, f64>,
        indices: &mut [usize],
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, indices, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &ArrayView2<'_, f64>,
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        if indices.len() <= 1 || depth >= max_depth {
            return id;
        }

        // Constant features cannot separate anything, draw among the rest.
        let candidates: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|feature| {
                let (lo, hi) = indices
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        let v = x[[i, feature]];
                        (lo.min(v), hi.max(v))
                    });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let mid = partition(indices, |i| x[[i, feature]] <= threshold);
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.grow(x, left_idx, depth + 1, max_depth, rng);
        let right = self.grow(x, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Edges from the root to the leaf plus the expected remaining depth.
    pub fn path_length(&self, sample: ArrayView1<'_, f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut store = 0;
    for k in 0..indices.len() {
        if pred(indices[k]) {
            indices.swap(store, k);
            store += 1;
        }
    }
    store
}

#[derive(Debug, Clone)]
struct FittedForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    n_features: usize,
    offset: f64,
}

/// Isolation forest with scikit-learn scoring conventions: `score_samples`
/// lies in `[-1, 0)` and lower means more abnormal.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    params: IsolationForestParams,
    fitted: Option<FittedForest>,
}

impl IsolationForest {
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Threshold on `score_samples` below which `predict` flags an outlier.
    pub fn offset(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.offset)
    }

    pub fn score_samples(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(DetectorError::NotFitted(ModelName::IsolationForest))?;
        check_features(fitted.n_features, &x)?;
        self.score_with(fitted, &x)
    }

    /// `true` for rows the contamination threshold marks as outliers.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<bool>, DetectorError> {
        let offset = self
            .offset()
            .ok_or(DetectorError::NotFitted(ModelName::IsolationForest))?;
        let scores = self.score_samples(x)?;
        Ok(scores.into_iter().map(|s| s < offset).collect())
    }

    fn score_with(
        &self,
        fitted: &FittedForest,
        x: &ArrayView2<'_, f64>,
    ) -> Result<Vec<f64>, DetectorError> {
        let norm = average_path_length(fitted.max_samples);
        let trees = &fitted.trees;
        self.install(|| {
            (0..x.nrows())
                .into_par_iter()
                .map(|i| {
                    let row = x.row(i);
                    let total: f64 = trees.iter().map(|tree| tree.path_length(row)).sum();
                    let mean_depth = total / trees.len() as f64;
                    let ratio = if norm > 0.0 { mean_depth / norm } else { 0.0 };
                    -(2f64.powf(-ratio))
                })
                .collect()
        })
    }

    fn install<T, F>(&self, op: F) -> Result<T, DetectorError>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match self.params.n_jobs {
            Some(threads) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|err| DetectorError::WorkerPool(err.to_string()))?;
                Ok(pool.install(op))
            }
            None => Ok(op()),
        }
    }

    fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |reason: &str| DetectorError::InvalidParams {
            model: ModelName::IsolationForest,
            reason: reason.to_string(),
        };
        if self.params.n_estimators == 0 {
            return Err(invalid("n_estimators must be greater than 0"));
        }
        if !(self.params.contamination > 0.0 && self.params.contamination <= 0.5) {
            return Err(invalid("contamination must be within (0, 0.5]"));
        }
        if self.params.max_samples == Some(0) {
            return Err(invalid("max_samples must be greater than 0"));
        }
        if self.params.n_jobs == Some(0) {
            return Err(invalid("n_jobs must be greater than 0"));
        }
        Ok(())
    }
}

impl OutlierDetector for IsolationForest {
    fn name(&self) -> ModelName {
        ModelName::IsolationForest
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), DetectorError> {
        self.validate()?;
        let n = x.nrows();
        if n == 0 {
            return Err(DetectorError::EmptyInput(ModelName::IsolationForest));
        }
        let max_samples = self.params.max_samples.unwrap_or(AUTO_MAX_SAMPLES).min(n);
        let max_depth = (max_samples.max(2) as f64).log2().ceil() as usize;

        // Seeds are drawn up front so the forest does not depend on thread count.
        let mut master = StdRng::seed_from_u64(self.params.seed);
        let seeds: Vec<u64> = (0..self.params.n_estimators)
            .map(|_| master.gen())
            .collect();

        let trees = self.install(|| {
            seeds
                .par_iter()
                .map(|&seed| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    let picked = rand::seq::index::sample(&mut rng, n, max_samples);
                    let mut subsample = picked.into_vec();
                    IsolationTree::fit(&x, &mut subsample, max_depth, &mut rng)
                })
                .collect::<Vec<_>>()
        })?;

        let mut fitted = FittedForest {
            trees,
            max_samples,
            n_features: x.ncols(),
            offset: 0.0,
        };
        let mut scores = self.score_with(&fitted, &x)?;
        scores.sort_by(|a, b| a.total_cmp(b));
        fitted.offset = percentile(&scores, 100.0 * self.params.contamination);
        self.fitted = Some(fitted);
        Ok(())
    }

    fn native_scores(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        self.score_samples(x)
    }
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (q / 100.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
