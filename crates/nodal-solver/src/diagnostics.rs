//! Newton failure diagnostics.
//!
//! On a failed refinement the DC driver snapshots the residual and step
//! vectors; this module ranks them by unknown so the worst offenders can
//! be read off by name. The report is data; [`std::fmt::Display`] renders
//! the table.

use std::fmt;

use nalgebra::DVector;

use nodal_core::Circuit;

use crate::newton::FailureSnapshot;

/// How many unknowns each ranking keeps.
const RANK_DEPTH: usize = 10;

/// One unknown in a ranking.
#[derive(Debug, Clone)]
pub struct RankedUnknown {
    /// Human-readable meaning, e.g. "V(OUT)" or "I(L1)".
    pub name: String,
    /// |residual| or |Δx| magnitude the ranking is by.
    pub magnitude: f64,
    /// The unknown's value at the failed iterate.
    pub value: f64,
}

/// Ranked snapshot of a Newton failure.
#[derive(Debug, Clone)]
pub struct NewtonDiagnosis {
    /// Gmin active when the run failed.
    pub gmin: f64,
    /// Worst unknowns by residual magnitude, descending.
    pub worst_residuals: Vec<RankedUnknown>,
    /// Worst unknowns by step magnitude, descending.
    pub worst_deltas: Vec<RankedUnknown>,
}

fn rank(circuit: &Circuit, by: &DVector<f64>, x: &DVector<f64>) -> Vec<RankedUnknown> {
    let mut order: Vec<usize> = (0..by.len()).collect();
    order.sort_by(|&a, &b| {
        by[b]
            .abs()
            .partial_cmp(&by[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
        .into_iter()
        .take(RANK_DEPTH)
        .map(|i| RankedUnknown {
            name: circuit.unknown_meaning(i),
            magnitude: by[i].abs(),
            value: x[i],
        })
        .collect()
}

/// Rank a failure snapshot against the circuit's unknown names.
pub fn diagnose_failure(
    circuit: &Circuit,
    x: &DVector<f64>,
    snapshot: &FailureSnapshot,
) -> NewtonDiagnosis {
    NewtonDiagnosis {
        gmin: snapshot.gmin,
        worst_residuals: rank(circuit, &snapshot.residual, x),
        worst_deltas: rank(circuit, &snapshot.delta, x),
    }
}

impl fmt::Display for NewtonDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "newton failure at gmin = {:.3e}", self.gmin)?;
        writeln!(f, "worst residuals:")?;
        for r in &self.worst_residuals {
            writeln!(
                f,
                "  {:<20} |R| = {:>11.3e}  x = {:>10.4}",
                r.name, r.magnitude, r.value
            )?;
        }
        writeln!(f, "worst steps:")?;
        for r in &self.worst_deltas {
            writeln!(
                f,
                "  {:<20} |dX| = {:>10.3e}  x = {:>10.4}",
                r.name, r.magnitude, r.value
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_orders_by_magnitude() {
        let mut c = Circuit::new();
        let _a = c.create_named_node("A").unwrap();
        let _b = c.create_named_node("B").unwrap();
        let _d = c.create_named_node("C").unwrap();
        c.finalize();

        let snapshot = FailureSnapshot {
            residual: DVector::from_vec(vec![1e-3, -5e-2, 2e-6]),
            delta: DVector::from_vec(vec![-4.0, 0.1, 0.5]),
            gmin: 1e-9,
        };
        let x = DVector::from_vec(vec![0.1, 0.2, 0.3]);

        let d = diagnose_failure(&c, &x, &snapshot);
        assert_eq!(d.worst_residuals[0].name, "V(B)");
        assert_eq!(d.worst_residuals[1].name, "V(A)");
        assert_eq!(d.worst_deltas[0].name, "V(A)");
        assert!((d.worst_deltas[0].magnitude - 4.0).abs() < 1e-12);

        // Display renders without panicking and mentions the gmin.
        let text = d.to_string();
        assert!(text.contains("1.000e-9") || text.contains("1e-9") || text.contains("1.000e-09"));
    }

    #[test]
    fn test_ranking_truncates_to_ten() {
        let mut c = Circuit::new();
        for _ in 0..15 {
            let _ = c.create_node().unwrap();
        }
        c.finalize();

        let snapshot = FailureSnapshot {
            residual: DVector::from_fn(15, |i, _| i as f64),
            delta: DVector::zeros(15),
            gmin: 1e-12,
        };
        let x = DVector::zeros(15);
        let d = diagnose_failure(&c, &x, &snapshot);
        assert_eq!(d.worst_residuals.len(), 10);
        assert_eq!(d.worst_residuals[0].name, "V(node 14)");
    }
}
