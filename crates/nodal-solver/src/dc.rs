//! DC operating-point discovery.
//!
//! Direct path: a two-stage homotopy. Stage 1 ramps the independent
//! sources from zero to full value under a conservative Gmin, restarting
//! once from zero with a much larger Gmin if the ramp stalls. Stage 2
//! holds the sources at full value and steps the Gmin down a geometric
//! sequence towards the target, snapshotting before each level and
//! restoring on the first failure; the achieved Gmin is always reported.
//!
//! Fallback path: [`solve_dc_pseudo_transient`] integrates the transient
//! system from a nodeset-seeded state until it settles, then hands the
//! warmed iterate to [`solve_dc`]. Recommended for latch-prone circuits
//! where the direct homotopy fails.

use nalgebra::DVector;

use nodal_core::{Circuit, NodeId};

use crate::diagnostics::{diagnose_failure, NewtonDiagnosis};
use crate::error::Result;
use crate::newton::{solve_newton, NewtonCriteria, SoftShunt};
use crate::transient::{step, TransientOptions};

/// Configuration of the DC homotopy. Every tuning constant of the
/// procedure lives here; the defaults are the stock schedule.
#[derive(Debug, Clone)]
pub struct DcOptions {
    /// Per-stage Newton iteration cap (raised to at least 300 internally).
    pub max_iters: usize,
    /// Δx convergence threshold.
    pub tol: f64,
    /// Residual norm also required at convergence.
    pub residual_tol: f64,
    /// Number of source-scale increments in stage 1 (at least 50).
    pub ramp_steps: usize,
    /// Target Gmin the refinement works towards.
    pub gmin: f64,
    /// Conservative Gmin for the first ramp attempt.
    pub initial_gmin: f64,
    /// Gmin for the restarted ramp after a stall.
    pub fallback_gmin: f64,
    /// Per-component Newton step clamp (V).
    pub dx_clamp: f64,
    /// Back-tracking halvings per iteration.
    pub backtrack_limit: usize,
    /// Damping floor of the line search.
    pub alpha_min: f64,
    /// Hard cap on Newton iterations across the whole procedure.
    pub global_iteration_cap: usize,
    /// Node receiving a soft stabilization shunt while the source scale is
    /// below 0.5. The shunt decays linearly and is strictly gone at 0.5.
    pub stabilization_node: Option<NodeId>,
    /// Peak conductance of the stabilization shunt (S).
    pub stabilization_g: f64,
    /// Emit per-stage traces and failure diagnoses via `log`.
    pub verbose: bool,
}

impl Default for DcOptions {
    fn default() -> Self {
        Self {
            max_iters: 250,
            tol: 1e-6,
            residual_tol: 1e-4,
            ramp_steps: 50,
            gmin: 1e-12,
            initial_gmin: 1e-7,
            fallback_gmin: 1e-3,
            dx_clamp: 2.0,
            backtrack_limit: 10,
            alpha_min: 1e-6,
            global_iteration_cap: 10_000,
            stabilization_node: None,
            stabilization_g: 1e-2,
            verbose: false,
        }
    }
}

/// Accumulated convergence statistics of one DC solve.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceStats {
    /// Newton iterations across all stages.
    pub total_iterations: usize,
    /// Last source-ramp step reached.
    pub source_steps_reached: usize,
    /// Repurposed to report the achieved Gmin.
    pub last_residual: f64,
    /// Whether the solve succeeded.
    pub converged: bool,
}

/// Result of a DC solve. On failure `x` still holds the best intermediate
/// iterate so diagnostics may continue.
#[derive(Debug, Clone)]
pub struct DcReport {
    pub converged: bool,
    /// The Gmin level the refinement actually reached.
    pub final_gmin: f64,
    pub stats: ConvergenceStats,
    /// Ranked failure snapshot, when a refinement level failed.
    pub diagnosis: Option<NewtonDiagnosis>,
}

/// Settling parameters for the pseudo-transient fallback.
#[derive(Debug, Clone)]
pub struct PseudoTransientOptions {
    /// Pseudo-time to integrate (s).
    pub duration: f64,
    /// Fixed pseudo-time step (s).
    pub dt: f64,
    /// Newton cap per settling step.
    pub max_newton_iters: usize,
    /// Relaxed Δx tolerance during settling.
    pub abs_tol: f64,
}

impl Default for PseudoTransientOptions {
    fn default() -> Self {
        Self {
            duration: 1e-3,
            dt: 1e-6,
            max_newton_iters: 10,
            abs_tol: 1e-6,
        }
    }
}

/// Geometric Gmin refinement levels (≈3× per step) down through `target`.
fn gmin_sequence(target: f64) -> Vec<f64> {
    let mut seq = Vec::new();
    for decade in 4..=12 {
        for mant in [5.0, 2.0, 1.0] {
            seq.push(mant * 10f64.powi(-decade));
        }
    }
    seq.push(target);
    seq
}

/// Find the DC operating point, leaving it in `x`.
///
/// `x` is resized to the unknown count if needed and seeded from the
/// circuit's nodeset hints. The achieved Gmin and statistics are recorded
/// on the circuit and in the returned report; non-convergence is a normal
/// return with `converged = false`, not an error.
pub fn solve_dc(circuit: &mut Circuit, x: &mut DVector<f64>, opts: &DcOptions) -> Result<DcReport> {
    circuit.finalize();
    let n = circuit.size();
    if x.len() != n {
        *x = DVector::zeros(n);
    }
    circuit.apply_nodeset(x);

    let mut guess = x.clone();
    let mut stats = ConvergenceStats::default();
    let mut budget = opts.global_iteration_cap;

    let criteria = NewtonCriteria {
        max_iterations: opts.max_iters.max(300),
        tol: opts.tol,
        residual_tol: opts.residual_tol,
        dx_clamp: opts.dx_clamp,
        backtrack_limit: opts.backtrack_limit,
        alpha_min: opts.alpha_min,
    };

    let shunt_row = opts.stabilization_node.and_then(NodeId::index);
    let shunt_at = |scale: f64| -> Option<SoftShunt> {
        let row = shunt_row?;
        if scale < 0.5 {
            Some(SoftShunt {
                row,
                g: opts.stabilization_g * (1.0 - scale * 2.0),
            })
        } else {
            None
        }
    };

    // Stage 1: source ramp at a conservative Gmin.
    let ramp_steps = opts.ramp_steps.max(50);
    let mut active_gmin = opts.initial_gmin;

    'ramp: for s in 0..=ramp_steps {
        let scale = s as f64 / ramp_steps as f64;
        stats.source_steps_reached = s;
        let run = solve_newton(
            circuit,
            &mut guess,
            scale,
            active_gmin,
            shunt_at(scale),
            &criteria,
            &mut budget,
        )?;
        stats.total_iterations += run.iterations;
        if run.converged() {
            continue;
        }

        // Ramp stalled: restart from zero with a much larger Gmin.
        if opts.verbose {
            log::debug!(
                "dc ramp stalled at scale {scale:.2}; restarting with gmin {:.1e}",
                opts.fallback_gmin
            );
        }
        active_gmin = opts.fallback_gmin;
        guess.fill(0.0);
        for s2 in 0..=ramp_steps {
            let scale2 = s2 as f64 / ramp_steps as f64;
            stats.source_steps_reached = s2;
            let run2 = solve_newton(
                circuit,
                &mut guess,
                scale2,
                active_gmin,
                shunt_at(scale2),
                &criteria,
                &mut budget,
            )?;
            stats.total_iterations += run2.iterations;
            if !run2.converged() {
                x.copy_from(&guess);
                circuit.store_solution(x);
                stats.last_residual = active_gmin;
                return Ok(DcReport {
                    converged: false,
                    final_gmin: active_gmin,
                    stats,
                    diagnosis: None,
                });
            }
        }
        break 'ramp;
    }

    // Stage 2: Gmin refinement at full source scale.
    let refine_criteria = NewtonCriteria {
        max_iterations: (opts.max_iters * 2).max(300),
        ..criteria
    };
    let mut diagnosis = None;

    for g in gmin_sequence(opts.gmin) {
        if g >= active_gmin {
            continue;
        }
        let snapshot = guess.clone();
        let run = solve_newton(
            circuit,
            &mut guess,
            1.0,
            g,
            None,
            &refine_criteria,
            &mut budget,
        )?;
        stats.total_iterations += run.iterations;

        if run.converged() {
            active_gmin = g;
        } else {
            if let Some(failure) = &run.failure {
                let d = diagnose_failure(circuit, &guess, failure);
                if opts.verbose {
                    log::debug!("{d}");
                }
                diagnosis = Some(d);
            }
            guess = snapshot;
            if opts.verbose {
                log::debug!(
                    "dc gmin refinement stopped at {active_gmin:.1e} (failed at {g:.1e})"
                );
            }
            break;
        }
    }

    if active_gmin > opts.gmin * 10.0 {
        log::warn!(
            "dc operating point delivered at gmin {active_gmin:.1e} (target {:.1e}); solution may be contaminated",
            opts.gmin
        );
    }

    x.copy_from(&guess);
    circuit.store_solution(x);
    circuit.set_final_gmin(active_gmin);
    stats.converged = true;
    stats.last_residual = active_gmin;
    Ok(DcReport {
        converged: true,
        final_gmin: active_gmin,
        stats,
        diagnosis,
    })
}

/// Find the DC operating point by pseudo-transient continuation.
///
/// Seeds `x` from the nodeset hints, initializes the dynamic elements at
/// that seed, integrates `duration / dt` relaxed transient steps (failed
/// steps do not abort; the latest iterate is kept) and finishes with a
/// direct [`solve_dc`] from the warmed iterate.
pub fn solve_dc_pseudo_transient(
    circuit: &mut Circuit,
    x: &mut DVector<f64>,
    settle: &PseudoTransientOptions,
    opts: &DcOptions,
) -> Result<DcReport> {
    circuit.finalize();
    let n = circuit.size();
    if x.len() != n {
        *x = DVector::zeros(n);
    }
    circuit.apply_nodeset(x);
    circuit.initialize_dynamics(x);

    let step_opts = TransientOptions {
        max_newton_iters: settle.max_newton_iters,
        abs_tol: settle.abs_tol,
        ..TransientOptions::default()
    };

    let steps = (settle.duration / settle.dt) as usize;
    let mut failed_steps = 0usize;
    for _ in 0..steps {
        if !step(circuit, settle.dt, x, &step_opts)? {
            failed_steps += 1;
        }
    }
    if failed_steps > 0 && opts.verbose {
        log::debug!("pseudo-transient settle: {failed_steps}/{steps} steps did not converge");
    }

    solve_dc(circuit, x, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmin_sequence_is_decreasing_through_target() {
        let seq = gmin_sequence(1e-12);
        assert_eq!(seq[0], 5e-4);
        for pair in seq.windows(2) {
            assert!(pair[1] <= pair[0], "sequence must not increase: {pair:?}");
        }
        assert_eq!(*seq.last().unwrap(), 1e-12);
    }

    #[test]
    fn test_default_homotopy_schedule() {
        let o = DcOptions::default();
        assert_eq!(o.max_iters, 250);
        assert_eq!(o.ramp_steps, 50);
        assert_eq!(o.gmin, 1e-12);
        assert_eq!(o.initial_gmin, 1e-7);
        assert_eq!(o.fallback_gmin, 1e-3);
        assert_eq!(o.dx_clamp, 2.0);
        assert_eq!(o.global_iteration_cap, 10_000);
    }
}
