use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::entities::{KernelGamma, OneClassSvmParams};
use crate::services::detectors::{check_features, DetectorError, OutlierDetector};
use crate::value_objects::ModelName;

const TAU: f64 = 1e-12;
const UPPER_BOUND: f64 = 1.0;

fn rbf(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * dist).exp()
}

/// Kernel coefficient resolved against the training matrix.
pub fn resolve_gamma(gamma: KernelGamma, x: &ArrayView2<'_, f64>) -> f64 {
    let n_features = x.ncols().max(1) as f64;
    match gamma {
        KernelGamma::Scale => {
            let var = x.var(0.0);
            if var > 0.0 {
                1.0 / (n_features * var)
            } else {
                1.0
            }
        }
        KernelGamma::Auto => 1.0 / n_features,
        KernelGamma::Value(value) => value,
    }
}

/// Least recently used kernel rows, bounded by a byte budget.
struct KernelCache<'a> {
    x: ArrayView2<'a, f64>,
    gamma: f64,
    rows: LruCache<usize, Arc<Vec<f64>>>,
}

impl<'a> KernelCache<'a> {
    fn new(x: ArrayView2<'a, f64>, gamma: f64, cache_mb: usize) -> Self {
        let row_bytes = (x.nrows() * std::mem::size_of::<f64>()).max(1);
        let capacity = (cache_mb * 1024 * 1024 / row_bytes).max(2);
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            x,
            gamma,
            rows: LruCache::new(capacity),
        }
    }

    fn row(&mut self, i: usize) -> Arc<Vec<f64>> {
        if let Some(row) = self.rows.get(&i) {
            return Arc::clone(row);
        }
        let x = self.x;
        let gamma = self.gamma;
        let xi = x.row(i);
        let computed: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|j| rbf(xi, x.row(j), gamma))
            .collect();
        let row = Arc::new(computed);
        self.rows.put(i, Arc::clone(&row));
        row
    }
}

/// Dual of the one-class problem as solved by libsvm:
/// `min 0.5 a'Qa  s.t. 0 <= a_i <= 1, sum(a) = nu * l`.
struct SmoSolver<'a> {
    cache: KernelCache<'a>,
    alpha: Vec<f64>,
    grad: Vec<f64>,
    tol: f64,
}

impl<'a> SmoSolver<'a> {
    fn new(x: ArrayView2<'a, f64>, gamma: f64, nu: f64, params: &OneClassSvmParams) -> Self {
        let l = x.nrows();
        let mut alpha = vec![0.0; l];
        let total = nu * l as f64;
        let full = total as usize;
        for a in alpha.iter_mut().take(full) {
            *a = UPPER_BOUND;
        }
        if full < l {
            alpha[full] = total - full as f64;
        }

        let mut cache = KernelCache::new(x, gamma, params.cache_mb);
        let mut grad = vec![0.0; l];
        for i in 0..l {
            if alpha[i] > 0.0 {
                let q_i = cache.row(i);
                for (g, q) in grad.iter_mut().zip(q_i.iter()) {
                    *g += alpha[i] * q;
                }
            }
        }

        Self {
            cache,
            alpha,
            grad,
            tol: params.tol,
        }
    }

    fn at_upper(&self, i: usize) -> bool {
        self.alpha[i] >= UPPER_BOUND
    }

    fn at_lower(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    /// Second order working set selection. `None` once the KKT gap is below tol.
    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        let l = self.alpha.len();
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        for t in 0..l {
            if !self.at_upper(t) && -self.grad[t] >= gmax {
                gmax = -self.grad[t];
                gmax_idx = Some(t);
            }
        }
        let i = gmax_idx?;
        let q_i = self.cache.row(i);

        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;
        for j in 0..l {
            if self.at_lower(j) {
                continue;
            }
            let grad_diff = gmax + self.grad[j];
            if self.grad[j] >= gmax2 {
                gmax2 = self.grad[j];
            }
            if grad_diff > 0.0 {
                let quad_coef = 2.0 - 2.0 * q_i[j];
                let obj_diff = if quad_coef > 0.0 {
                    -(grad_diff * grad_diff) / quad_coef
                } else {
                    -(grad_diff * grad_diff) / TAU
                };
                if obj_diff <= obj_diff_min {
                    gmin_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if gmax + gmax2 < self.tol {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn update_pair(&mut self, i: usize, j: usize) {
        let q_i = self.cache.row(i);
        let q_j = self.cache.row(j);
        let old_i = self.alpha[i];
        let old_j = self.alpha[j];

        let mut quad_coef = 2.0 - 2.0 * q_i[j];
        if quad_coef <= 0.0 {
            quad_coef = TAU;
        }
        let delta = (self.grad[i] - self.grad[j]) / quad_coef;
        let sum = old_i + old_j;
        let mut a_i = old_i - delta;
        let mut a_j = old_j + delta;
        if sum > UPPER_BOUND {
            if a_i > UPPER_BOUND {
                a_i = UPPER_BOUND;
                a_j = sum - UPPER_BOUND;
            }
        } else if a_j < 0.0 {
            a_j = 0.0;
            a_i = sum;
        }
        if sum > UPPER_BOUND {
            if a_j > UPPER_BOUND {
                a_j = UPPER_BOUND;
                a_i = sum - UPPER_BOUND;
            }
        } else if a_i < 0.0 {
            a_i = 0.0;
            a_j = sum;
        }
        self.alpha[i] = a_i;
        self.alpha[j] = a_j;

        let d_i = a_i - old_i;
        let d_j = a_j - old_j;
        for (k, g) in self.grad.iter_mut().enumerate() {
            *g += q_i[k] * d_i + q_j[k] * d_j;
        }
    }

    /// Offset from free support vectors, or the midpoint of the bound gradients.
    fn rho(&self) -> f64 {
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut free = 0usize;
        let mut sum_free = 0.0;
        for (i, &g) in self.grad.iter().enumerate() {
            if self.at_upper(i) {
                lb = lb.max(g);
            } else if self.at_lower(i) {
                ub = ub.min(g);
            } else {
                free += 1;
                sum_free += g;
            }
        }
        if free > 0 {
            sum_free / free as f64
        } else {
            (ub + lb) / 2.0
        }
    }
}

#[derive(Debug, Clone)]
struct SvmModel {
    support: Array2<f64>,
    coef: Vec<f64>,
    rho: f64,
    gamma: f64,
}

/// Outcome of the last `fit`, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSummary {
    pub iterations: usize,
    pub converged: bool,
    pub support_vectors: usize,
    pub gamma: f64,
    pub rho: f64,
}

/// One-class SVM with an RBF kernel. `decision_function` is positive inside
/// the learned boundary and negative outside it.
#[derive(Debug, Clone)]
pub struct OneClassSvm {
    params: OneClassSvmParams,
    model: Option<SvmModel>,
    summary: Option<SolverSummary>,
}

impl OneClassSvm {
    pub fn new(params: OneClassSvmParams) -> Self {
        Self {
            params,
            model: None,
            summary: None,
        }
    }

    pub fn summary(&self) -> Option<SolverSummary> {
        self.summary
    }

    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        let model = self
            .model
            .as_ref()
            .ok_or(DetectorError::NotFitted(ModelName::OneClassSvm))?;
        check_features(model.support.ncols(), &x)?;
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let sum: f64 = model
                    .support
                    .axis_iter(Axis(0))
                    .zip(model.coef.iter())
                    .map(|(sv, coef)| coef * rbf(sv, row, model.gamma))
                    .sum();
                sum - model.rho
            })
            .collect())
    }

    fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |reason: &str| DetectorError::InvalidParams {
            model: ModelName::OneClassSvm,
            reason: reason.to_string(),
        };
        if !(self.params.nu > 0.0 && self.params.nu <= 1.0) {
            return Err(invalid("nu must be within (0, 1]"));
        }
        if !(self.params.tol > 0.0) {
            return Err(invalid("tol must be positive"));
        }
        if let KernelGamma::Value(value) = self.params.gamma {
            if !(value > 0.0) {
                return Err(invalid("gamma must be positive"));
            }
        }
        Ok(())
    }
}

impl OutlierDetector for OneClassSvm {
    fn name(&self) -> ModelName {
        ModelName::OneClassSvm
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), DetectorError> {
        self.validate()?;
        let l = x.nrows();
        if l == 0 {
            return Err(DetectorError::EmptyInput(ModelName::OneClassSvm));
        }
        let gamma = resolve_gamma(self.params.gamma, &x);
        let max_iter = self
            .params
            .max_iter
            .unwrap_or_else(|| l.saturating_mul(100).max(10_000_000));

        let mut solver = SmoSolver::new(x, gamma, self.params.nu, &self.params);
        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iter {
            let Some((i, j)) = solver.select_working_set() else {
                converged = true;
                break;
            };
            solver.update_pair(i, j);
            iterations += 1;
        }

        let rho = solver.rho();
        let support: Vec<usize> = (0..l).filter(|&i| solver.alpha[i] > 0.0).collect();
        let coef: Vec<f64> = support.iter().map(|&i| solver.alpha[i]).collect();
        let support_matrix = x.select(Axis(0), &support);

        self.summary = Some(SolverSummary {
            iterations,
            converged,
            support_vectors: support.len(),
            gamma,
            rho,
        });
        self.model = Some(SvmModel {
            support: support_matrix,
            coef,
            rho,
            gamma,
        });
        Ok(())
    }

    fn native_scores(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, DetectorError> {
        self.decision_function(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn cluster_with_outliers() -> (Array2<f64>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Normal::new(0.0, 1.0).expect("normal");
        let mut x = Array2::zeros((205, 2));
        let mut labels = vec![0u8; 205];
        for i in 0..200 {
            x[[i, 0]] = normal.sample(&mut rng);
            x[[i, 1]] = normal.sample(&mut rng);
        }
        for k in 0..5 {
            x[[200 + k, 0]] = 9.0 + k as f64;
            x[[200 + k, 1]] = 9.0 - k as f64;
            labels[200 + k] = 1;
        }
        (x, labels)
    }

    fn mean_by_label(scores: &[f64], labels: &[u8], label: u8) -> f64 {
        let picked: Vec<f64> = scores
            .iter()
            .zip(labels)
            .filter(|(_, l)| **l == label)
            .map(|(s, _)| *s)
            .collect();
        picked.iter().sum::<f64>() / picked.len() as f64
    }

    #[test]
    fn gamma_scale_uses_variance_of_all_entries() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // var of [0, 2, 2, 0] is 1.0
        assert!((resolve_gamma(KernelGamma::Scale, &x.view()) - 0.5).abs() < 1e-12);
        assert!((resolve_gamma(KernelGamma::Auto, &x.view()) - 0.5).abs() < 1e-12);
        let flat = Array2::from_elem((3, 2), 4.0);
        assert_eq!(resolve_gamma(KernelGamma::Scale, &flat.view()), 1.0);
    }

    #[test]
    fn dual_constraints_hold_after_fit() {
        let (x, _) = cluster_with_outliers();
        let params = OneClassSvmParams {
            nu: 0.1,
            ..OneClassSvmParams::default()
        };
        let gamma = resolve_gamma(params.gamma, &x.view());
        let mut solver = SmoSolver::new(x.view(), gamma, params.nu, &params);
        while let Some((i, j)) = solver.select_working_set() {
            solver.update_pair(i, j);
        }
        let total: f64 = solver.alpha.iter().sum();
        assert!((total - 0.1 * 205.0).abs() < 1e-6);
        assert!(solver.alpha.iter().all(|a| (0.0..=1.0).contains(a)));
    }

    #[test]
    fn outliers_score_higher_than_the_cluster() {
        let (x, labels) = cluster_with_outliers();
        let mut svm = OneClassSvm::new(OneClassSvmParams {
            nu: 0.1,
            ..OneClassSvmParams::default()
        });
        let scores = svm.fit_anomaly_scores(x.view()).expect("scores");
        assert!(scores.iter().all(|s| s.is_finite()));
        assert!(mean_by_label(&scores, &labels, 1) > mean_by_label(&scores, &labels, 0));

        let summary = svm.summary().expect("summary");
        assert!(summary.converged);
        assert!(summary.support_vectors >= 21);
    }

    #[test]
    fn default_nu_yields_finite_scores() {
        let (x, _) = cluster_with_outliers();
        let mut svm = OneClassSvm::new(OneClassSvmParams::default());
        let scores = svm.fit_anomaly_scores(x.view()).expect("scores");
        assert_eq!(scores.len(), 205);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn tiny_cache_matches_large_cache() {
        let (x, _) = cluster_with_outliers();
        let mut small = OneClassSvm::new(OneClassSvmParams {
            nu: 0.1,
            cache_mb: 0,
            ..OneClassSvmParams::default()
        });
        let mut large = OneClassSvm::new(OneClassSvmParams {
            nu: 0.1,
            ..OneClassSvmParams::default()
        });
        let a = small.fit_anomaly_scores(x.view()).expect("small");
        let b = large.fit_anomaly_scores(x.view()).expect("large");
        for (s, l) in a.iter().zip(b.iter()) {
            assert!((s - l).abs() < 1e-9);
        }
    }

    #[test]
    fn kernel_cache_evicts_least_recent_row() {
        let (x, _) = cluster_with_outliers();
        let mut cache = KernelCache::new(x.view(), 0.5, 0);
        let first = cache.row(0);
        cache.row(1);
        cache.row(0);
        cache.row(2);
        assert_eq!(cache.rows.len(), 2);
        assert!(cache.rows.contains(&0));
        assert!(!cache.rows.contains(&1));
        assert_eq!(*cache.row(0), *first);
        assert_eq!(first[0], 1.0);
    }

    #[test]
    fn rejects_out_of_range_nu() {
        let mut svm = OneClassSvm::new(OneClassSvmParams {
            nu: 0.0,
            ..OneClassSvmParams::default()
        });
        let x = Array2::zeros((4, 2));
        assert!(matches!(
            svm.fit(x.view()),
            Err(DetectorError::InvalidParams { model: ModelName::OneClassSvm, .. })
        ));
    }
}
