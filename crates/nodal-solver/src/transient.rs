//! Fixed-step transient driver.
//!
//! One call advances the circuit by `dt`: dynamic elements precompute
//! their companion models, a short Newton loop solves the step, and the
//! companion history commits only if the loop converged. Time-step
//! adaptation is deliberately left to the caller, as is advancing any
//! waveform-driven sources before the call.

use nalgebra::DVector;

use nodal_core::Circuit;

use crate::error::{Error, Result};
use crate::linear::solve_dense;

/// Configuration of a transient step.
#[derive(Debug, Clone)]
pub struct TransientOptions {
    /// Newton iteration cap per step.
    pub max_newton_iters: usize,
    /// Δx convergence threshold.
    pub abs_tol: f64,
    /// Per-component Newton step clamp (V).
    pub dx_clamp: f64,
    /// Gmin on every node diagonal.
    pub gmin: f64,
}

impl Default for TransientOptions {
    fn default() -> Self {
        Self {
            max_newton_iters: 8,
            abs_tol: 1e-9,
            dx_clamp: 5.0,
            gmin: 1e-12,
        }
    }
}

/// Advance the circuit by one step of size `dt`.
///
/// Returns `Ok(true)` and commits the dynamic elements' history if the
/// Newton loop converged. On non-convergence (including a singular system)
/// returns `Ok(false)` with companion state untouched, so the caller may
/// retry with a different `dt` or roll back. `x` is used as the initial
/// iterate and receives the solution on success.
pub fn step(
    circuit: &mut Circuit,
    dt: f64,
    x: &mut DVector<f64>,
    opts: &TransientOptions,
) -> Result<bool> {
    circuit.finalize();
    let n = circuit.size();
    if x.len() != n {
        *x = DVector::zeros(n);
    }

    circuit.begin_step(dt)?;

    let mut guess = x.clone();
    let mut converged = false;

    for _ in 0..opts.max_newton_iters {
        circuit.assemble(1.0, &guess)?;
        circuit.add_gmin(opts.gmin);

        let solved = match solve_dense(circuit.system()) {
            Ok(s) => s,
            Err(Error::SingularPivot { row }) => {
                log::trace!("transient step singular at row {row}");
                circuit.store_solution(x);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let mut max_delta = 0.0_f64;
        let mut x_new = guess.clone();
        for i in 0..n {
            let delta = (solved[i] - guess[i]).clamp(-opts.dx_clamp, opts.dx_clamp);
            x_new[i] = guess[i] + delta;
            max_delta = max_delta.max(delta.abs());
        }

        let x_old = guess;
        guess = x_new;
        circuit.limit_junctions(&guess, &x_old);

        if max_delta < opts.abs_tol {
            converged = true;
            break;
        }
    }

    if converged {
        x.copy_from(&guess);
        circuit.commit_step(x);
    }
    circuit.store_solution(x);
    Ok(converged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let o = TransientOptions::default();
        assert_eq!(o.max_newton_iters, 8);
        assert_eq!(o.dx_clamp, 5.0);
        assert_eq!(o.abs_tol, 1e-9);
    }
}
