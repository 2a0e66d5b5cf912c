use crate::bath::HybridizationTable;
use crate::segments::{FlavorState, Segment};
use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Inverse hybridization matrix of one flavor.
///
/// For a configuration with segments `(s_0, e_0), ..., (s_{n-1}, e_{n-1})`
/// (sorted by start time) the hybridization matrix is
/// `Delta[i][j] = F(e_i - s_j)`, with `F` the antiperiodically extended
/// hybridization function. The Monte Carlo weight carries `det Delta`;
/// this type maintains `M = Delta^{-1}` incrementally so that weight
/// ratios of trial moves cost O(n) instead of O(n^3), together with the
/// sign of `det Delta`.
///
/// Row index `i` follows the segment end points, column index `j` the
/// start points; both use the segment ordering of the configuration, so a
/// segment inserted at sorted position `k` adds row `k` and column `k`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HybMatrix {
    m: DMatrix<f64>,
    det_sign: f64,
}

/// Cached vectors from a ratio computation, consumed when the matching
/// insertion is accepted.
#[derive(Clone, Debug)]
pub struct InsertPlan {
    /// Sorted position of the new segment (row and column index).
    pub pos: usize,
    /// Determinant ratio `det Delta_new / det Delta_old`.
    pub ratio: f64,
    /// `M u`, with `u_i = F(e_i - s_new)`.
    w: DVector<f64>,
    /// `v^T M`, with `v_j = F(e_new - s_j)`.
    z: DVector<f64>,
}

/// Outcome of a from-scratch reconstruction.
#[derive(Clone, Copy, Debug)]
pub struct RebuildReport {
    /// Largest absolute deviation between the incremental inverse and the
    /// directly recomputed one.
    pub drift: f64,
    /// Whether the tracked determinant sign disagreed with the direct one.
    pub sign_flipped: bool,
}

impl HybMatrix {
    /// Empty-configuration matrix (`det Delta = 1`).
    pub fn empty() -> Self {
        Self {
            m: DMatrix::zeros(0, 0),
            det_sign: 1.0,
        }
    }

    /// Builds the inverse directly from a configuration.
    pub fn from_state(state: &FlavorState, table: &HybridizationTable, flavor: usize) -> Self {
        let mut out = Self::empty();
        out.rebuild(state, table, flavor);
        out
    }

    /// Matrix dimension, equal to the segment count of the configuration.
    pub fn n(&self) -> usize {
        self.m.nrows()
    }

    /// The maintained inverse matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.m
    }

    /// Tracked sign of `det Delta`.
    pub fn det_sign(&self) -> f64 {
        self.det_sign
    }

    /// Hybridization matrix built directly from a configuration.
    pub fn direct_delta(
        state: &FlavorState,
        table: &HybridizationTable,
        flavor: usize,
    ) -> DMatrix<f64> {
        let n = state.len();
        DMatrix::from_fn(n, n, |i, j| {
            table.eval(
                flavor,
                flavor,
                state.segment(i).t_end - state.segment(j).t_start,
            )
        })
    }

    /// Determinant ratio for adding one segment, via the rank-1 bordering
    /// formula `r = d - v^T M u`. O(n); independent of the insertion
    /// position because row and column permute with the same parity.
    ///
    /// `state` is the configuration before the insertion; `pos` the sorted
    /// position the new segment would occupy.
    pub fn insertion_ratio(
        &self,
        state: &FlavorState,
        table: &HybridizationTable,
        flavor: usize,
        seg: &Segment,
        pos: usize,
    ) -> InsertPlan {
        let n = self.n();
        debug_assert_eq!(n, state.len(), "matrix out of sync with configuration");
        let u = DVector::from_fn(n, |i, _| {
            table.eval(flavor, flavor, state.segment(i).t_end - seg.t_start)
        });
        let v = DVector::from_fn(n, |j, _| {
            table.eval(flavor, flavor, seg.t_end - state.segment(j).t_start)
        });
        let d = table.eval(flavor, flavor, seg.t_end - seg.t_start);
        let w = &self.m * &u;
        let z = self.m.tr_mul(&v); // z_j = sum_i v_i M[i][j]
        let ratio = d - v.dot(&w);
        InsertPlan { pos, ratio, w, z }
    }

    /// Extends the inverse by one row and column at `plan.pos`. O(n^2).
    pub fn insert(&mut self, plan: &InsertPlan) {
        let n = self.n();
        let k = plan.pos;
        let p = 1.0 / plan.ratio;
        let m = &self.m;
        let grown = DMatrix::from_fn(n + 1, n + 1, |r, c| {
            // Map back to the pre-insertion labels; `None` is the new one.
            let old_r = if r == k {
                None
            } else {
                Some(if r < k { r } else { r - 1 })
            };
            let old_c = if c == k {
                None
            } else {
                Some(if c < k { c } else { c - 1 })
            };
            match (old_r, old_c) {
                (Some(i), Some(j)) => m[(i, j)] + p * plan.w[i] * plan.z[j],
                (Some(i), None) => -p * plan.w[i],
                (None, Some(j)) => -p * plan.z[j],
                (None, None) => p,
            }
        });
        self.m = grown;
        self.det_sign *= plan.ratio.signum();
    }

    /// Determinant ratio for deleting the segment at index `k`. O(1): the
    /// ratio is the diagonal entry of the inverse.
    pub fn removal_ratio(&self, k: usize) -> f64 {
        self.m[(k, k)]
    }

    /// Deletes row and column `k`, downdating the remaining inverse.
    /// O(n^2).
    pub fn remove(&mut self, k: usize) {
        let n = self.n();
        debug_assert!(k < n);
        let pivot = self.m[(k, k)];
        let m = &self.m;
        let shrunk = DMatrix::from_fn(n - 1, n - 1, |r, c| {
            let i = if r < k { r } else { r + 1 };
            let j = if c < k { c } else { c + 1 };
            m[(i, j)] - m[(i, k)] * m[(k, j)] / pivot
        });
        self.m = shrunk;
        self.det_sign *= pivot.signum();
    }

    /// Determinant ratio for moving the end point of segment `k`, which
    /// replaces row `k` of the hybridization matrix. O(n). Returns the
    /// ratio together with the row vector `w = r^T M` needed to apply the
    /// update.
    pub fn shift_ratio(
        &self,
        state: &FlavorState,
        table: &HybridizationTable,
        flavor: usize,
        k: usize,
        new_end: f64,
    ) -> (f64, DVector<f64>) {
        let n = self.n();
        debug_assert_eq!(n, state.len(), "matrix out of sync with configuration");
        let r = DVector::from_fn(n, |j, _| {
            table.eval(flavor, flavor, new_end - state.segment(j).t_start)
        });
        let w = self.m.tr_mul(&r); // w_j = sum_l r_l M[l][j]
        (w[k], w)
    }

    /// Applies the row replacement of segment `k` by the Sherman-Morrison
    /// formula. O(n^2). `w` and `ratio` come from
    /// [`shift_ratio`](Self::shift_ratio).
    pub fn shift(&mut self, k: usize, w: &DVector<f64>, ratio: f64) {
        let n = self.n();
        let m = &self.m;
        let updated = DMatrix::from_fn(n, n, |i, j| {
            let delta_jk = if j == k { 1.0 } else { 0.0 };
            m[(i, j)] - m[(i, k)] * (w[j] - delta_jk) / ratio
        });
        self.m = updated;
        self.det_sign *= ratio.signum();
    }

    /// Rebuilds the inverse from scratch by direct inversion. O(n^3).
    ///
    /// Reports the accumulated drift of the incremental inverse and fixes
    /// the tracked determinant sign if it disagrees with the directly
    /// recomputed one. Required periodically to bound floating-point error
    /// from repeated incremental updates.
    pub fn rebuild(
        &mut self,
        state: &FlavorState,
        table: &HybridizationTable,
        flavor: usize,
    ) -> RebuildReport {
        let n = state.len();
        if n == 0 {
            let drift = self.m.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            let sign_flipped = self.det_sign < 0.0;
            self.m = DMatrix::zeros(0, 0);
            self.det_sign = 1.0;
            return RebuildReport {
                drift,
                sign_flipped,
            };
        }
        let delta = Self::direct_delta(state, table, flavor);
        let lu = delta.lu();
        let det = lu.determinant();
        let fresh = match lu.try_inverse() {
            Some(inv) => inv,
            None => {
                warn!(
                    "hybridization matrix of flavor {} is singular (n = {}); keeping incremental inverse",
                    flavor, n
                );
                return RebuildReport {
                    drift: f64::NAN,
                    sign_flipped: false,
                };
            }
        };
        let drift = if self.m.shape() == fresh.shape() {
            (&self.m - &fresh)
                .iter()
                .fold(0.0f64, |acc, v| acc.max(v.abs()))
        } else {
            f64::INFINITY
        };
        let direct_sign = det.signum();
        let sign_flipped = direct_sign != self.det_sign;
        self.m = fresh;
        self.det_sign = direct_sign;
        RebuildReport {
            drift,
            sign_flipped,
        }
    }
}
