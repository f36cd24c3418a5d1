//! Damped, junction-limited Newton-Raphson inner loop.
//!
//! One call runs Newton at a fixed source scale and Gmin level:
//!
//! 1. Clear and stamp the system (linear parts at the scale, Newton
//!    linearizations at the stored limited operating points), add the Gmin
//!    diagonal and the optional stabilization shunt.
//! 2. Solve; on a singular pivot, boost every node diagonal by 100·Gmin
//!    and retry once.
//! 3. Back-tracking line search on the full step: clamp each component,
//!    refresh the junction limiting, accept as soon as the residual drops
//!    (or the damping floor is reached).
//!
//! Convergence requires both the step and the pre-step residual to be
//! small. The homotopy drivers in [`crate::dc`] call this repeatedly.

use nalgebra::DVector;

use nodal_core::Circuit;

use crate::error::{Error, Result};
use crate::linear::solve_dense;

/// Tolerances and damping limits for one Newton run.
#[derive(Debug, Clone)]
pub struct NewtonCriteria {
    /// Iteration cap for this run.
    pub max_iterations: usize,
    /// Δx convergence threshold (V / A).
    pub tol: f64,
    /// Residual norm that must also be met at convergence.
    pub residual_tol: f64,
    /// Per-component clamp on a single step (V).
    pub dx_clamp: f64,
    /// Back-tracking halvings before the last candidate is kept.
    pub backtrack_limit: usize,
    /// Damping floor; below this the candidate is accepted regardless.
    pub alpha_min: f64,
}

impl Default for NewtonCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tol: 1e-6,
            residual_tol: 1e-4,
            dx_clamp: 2.0,
            backtrack_limit: 10,
            alpha_min: 1e-6,
        }
    }
}

/// A soft conductance to ground on one unknown, used to stabilize a
/// designated node during the early source ramp.
#[derive(Debug, Clone, Copy)]
pub struct SoftShunt {
    /// Matrix row/column of the shunted unknown.
    pub row: usize,
    /// Shunt conductance (S).
    pub g: f64,
}

/// How a Newton run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonStatus {
    Converged,
    /// Iteration cap reached without meeting the criteria.
    Exhausted,
    /// The linear solve stayed singular after the diagonal boost.
    Singular { row: usize },
    /// The caller's global iteration budget ran out.
    BudgetExhausted,
}

/// Residual and step snapshot of a failed run, for ranking diagnostics.
#[derive(Debug, Clone)]
pub struct FailureSnapshot {
    /// Residual A·x − z at the final iterate.
    pub residual: DVector<f64>,
    /// The final iterate's step x_k − x_{k−1}.
    pub delta: DVector<f64>,
    /// Gmin active during the failed run.
    pub gmin: f64,
}

/// Outcome of one Newton run.
#[derive(Debug, Clone)]
pub struct NewtonRun {
    pub status: NewtonStatus,
    /// Iterations consumed (also drained from the global budget).
    pub iterations: usize,
    /// Snapshot for diagnosis when the cap was exhausted.
    pub failure: Option<FailureSnapshot>,
}

impl NewtonRun {
    pub fn converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }
}

/// Run Newton iterations on `circuit` at the given source scale and Gmin,
/// advancing `guess` in place. `budget` is a global iteration allowance
/// shared across a whole DC procedure.
pub fn solve_newton(
    circuit: &mut Circuit,
    guess: &mut DVector<f64>,
    source_scale: f64,
    gmin: f64,
    shunt: Option<SoftShunt>,
    criteria: &NewtonCriteria,
    budget: &mut usize,
) -> Result<NewtonRun> {
    let n = circuit.size();
    let mut iterations = 0;
    let mut last_delta = DVector::zeros(n);

    for k in 0..criteria.max_iterations {
        if *budget == 0 {
            return Ok(NewtonRun {
                status: NewtonStatus::BudgetExhausted,
                iterations,
                failure: None,
            });
        }
        *budget -= 1;
        iterations += 1;

        circuit.assemble(source_scale, guess)?;
        circuit.add_gmin(gmin);
        if let Some(s) = shunt {
            circuit.system_mut().add_a(s.row, s.row, s.g);
        }

        let old_residual = circuit.system().residual_norm(guess);

        let solved = match solve_dense(circuit.system()) {
            Ok(x) => x,
            Err(Error::SingularPivot { .. }) => {
                // Recovery: boost every node diagonal and retry once.
                circuit.add_gmin(gmin * 100.0);
                match solve_dense(circuit.system()) {
                    Ok(x) => x,
                    Err(Error::SingularPivot { row }) => {
                        return Ok(NewtonRun {
                            status: NewtonStatus::Singular { row },
                            iterations,
                            failure: None,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        // Back-tracking line search on the full Newton step. The last
        // candidate is kept if no damping level beats the old residual.
        let mut alpha = 1.0;
        let mut x_new = guess.clone();
        for _ in 0..criteria.backtrack_limit {
            x_new.copy_from(guess);
            for i in 0..n {
                let dx =
                    (alpha * (solved[i] - guess[i])).clamp(-criteria.dx_clamp, criteria.dx_clamp);
                x_new[i] += dx;
            }
            circuit.limit_junctions(&x_new, guess);
            if circuit.system().residual_norm(&x_new) < old_residual || alpha < criteria.alpha_min {
                break;
            }
            alpha *= 0.5;
        }

        let mut dx_max = 0.0_f64;
        for i in 0..n {
            dx_max = dx_max.max((x_new[i] - guess[i]).abs());
        }
        last_delta = &x_new - &*guess;
        guess.copy_from(&x_new);

        log::trace!(
            "newton k={k} scale={source_scale:.3} gmin={gmin:.1e} resid={old_residual:.3e} dx={dx_max:.3e}"
        );

        if dx_max < criteria.tol && old_residual < criteria.residual_tol {
            return Ok(NewtonRun {
                status: NewtonStatus::Converged,
                iterations,
                failure: None,
            });
        }
    }

    // Cap exhausted: snapshot the residual and step for ranking.
    let residual = circuit.system().residual(guess);
    Ok(NewtonRun {
        status: NewtonStatus::Exhausted,
        iterations,
        failure: Some(FailureSnapshot {
            residual,
            delta: last_delta,
            gmin,
        }),
    })
}
