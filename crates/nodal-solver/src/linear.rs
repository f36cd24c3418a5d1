//! Dense linear solver for the MNA system.

use nalgebra::DVector;

use nodal_core::MnaSystem;

use crate::error::{Error, Result};

/// Pivot magnitudes below this are treated as singular.
pub const PIVOT_THRESHOLD: f64 = 1e-18;

/// A solver for the assembled system A·x = z.
///
/// Behind a trait so a sparse factorization can replace the dense solver
/// without touching the Newton or transient drivers.
pub trait LinearSolver {
    /// Solve A·x = z for x. On a singular pivot, reports the failing row
    /// through [`Error::SingularPivot`] without producing a solution.
    fn solve(&self, system: &MnaSystem) -> Result<DVector<f64>>;
}

/// In-place Gaussian elimination with partial pivoting, on a copy of
/// (A, z).
#[derive(Debug, Default, Clone, Copy)]
pub struct GaussianSolver;

impl LinearSolver for GaussianSolver {
    fn solve(&self, system: &MnaSystem) -> Result<DVector<f64>> {
        let n = system.size();
        let mut a = system.matrix().clone();
        let mut b = system.rhs().clone();
        let mut x = DVector::zeros(n);

        // Forward elimination
        for k in 0..n {
            // Pick the largest pivot among rows k..n-1
            let mut pivot = k;
            let mut max_abs = a[(k, k)].abs();
            for i in (k + 1)..n {
                let v = a[(i, k)].abs();
                if v > max_abs {
                    max_abs = v;
                    pivot = i;
                }
            }

            if max_abs < PIVOT_THRESHOLD {
                return Err(Error::SingularPivot { row: k });
            }

            if pivot != k {
                a.swap_rows(k, pivot);
                b.swap_rows(k, pivot);
            }

            let akk = a[(k, k)];
            for i in (k + 1)..n {
                let factor = a[(i, k)] / akk;
                if factor == 0.0 {
                    continue;
                }
                a[(i, k)] = 0.0;
                for j in (k + 1)..n {
                    a[(i, j)] -= factor * a[(k, j)];
                }
                b[i] -= factor * b[k];
            }
        }

        // Back substitution
        for i in (0..n).rev() {
            let mut sum = b[i];
            for j in (i + 1)..n {
                sum -= a[(i, j)] * x[j];
            }
            x[i] = sum / a[(i, i)];
        }

        Ok(x)
    }
}

/// Solve with the default dense solver.
pub fn solve_dense(system: &MnaSystem) -> Result<DVector<f64>> {
    GaussianSolver.solve(system)
}
