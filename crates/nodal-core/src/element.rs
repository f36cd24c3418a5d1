//! Element capability contract.
//!
//! Every element implements [`Element`]. The base capability is the linear
//! stamp; nonlinear, time-discrete and branch-owning behaviour are opt-in
//! through default methods, mirroring how the circuit routes calls:
//!
//! - **Newton** elements ([`is_nonlinear`](Element::is_nonlinear)) get a
//!   mutating [`compute_limited_voltages`](Element::compute_limited_voltages)
//!   pass before each [`stamp_newton`](Element::stamp_newton). The stamp
//!   itself is read-only: it emits the linearization around the stored
//!   limited operating point, adding J to A and `J·v_op − I_op` to z.
//! - **Dynamic** elements ([`is_dynamic`](Element::is_dynamic)) are told
//!   when a time step begins (recompute companion conductance and source)
//!   and when it commits (update history from the converged solution).
//! - **Branch** elements claim extra unknowns via
//!   [`branch_count`](Element::branch_count) and are told their first row
//!   once, at finalize.

use std::any::Any;
use std::fmt;

use nalgebra::DVector;

use crate::error::Result;
use crate::mna::MnaSystem;
use crate::node::NodeId;

/// Context handed to every stamp call.
pub struct StampContext<'a> {
    /// The linear system being assembled.
    pub system: &'a mut MnaSystem,
    /// Homotopy source scale in [0, 1]. Multiplies the values of
    /// independent sources only; all other elements ignore it.
    pub source_scale: f64,
}

/// A circuit element.
///
/// Implementations must be value types owned by the circuit; node
/// references are integer [`NodeId`]s, never pointers. Elements are
/// `Send + Sync` so independent circuits can run on separate threads.
pub trait Element: fmt::Debug + Send + Sync {
    /// Element name used in diagnostics (e.g. "R1", "Q3").
    fn name(&self) -> &str {
        ""
    }

    /// Contribute the linear, iteration-invariant part of the MNA stamp.
    ///
    /// Independent sources scale their value by `ctx.source_scale`.
    fn stamp(&self, ctx: &mut StampContext);

    /// Node pairs joined by a DC conduction path through this element.
    ///
    /// Current sources and pure dynamic elements return nothing; used by
    /// external connectivity audits.
    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        Vec::new()
    }

    /// Whether this element requires Newton linearization.
    fn is_nonlinear(&self) -> bool {
        false
    }

    /// Refresh the stored limited junction voltages from the current
    /// Newton iterate `x_new` and the previous iterate `x_old`.
    ///
    /// Called before [`stamp_newton`](Element::stamp_newton); never mutates
    /// the iterates themselves.
    fn compute_limited_voltages(&mut self, _x_new: &DVector<f64>, _x_old: &DVector<f64>) {}

    /// Stamp the Newton linearization at the stored limited operating
    /// point: J into A and `J·v_op − I_op` into z, so that solving
    /// A·x = z yields the next iterate directly.
    fn stamp_newton(&self, _ctx: &mut StampContext, _x_guess: &DVector<f64>) {}

    /// Whether this element carries companion-model state across time steps.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Precompute the companion conductance and equivalent source for the
    /// upcoming step of size `dt`. `dt <= 0` means DC where permitted.
    fn begin_step(&mut self, _dt: f64) -> Result<()> {
        Ok(())
    }

    /// Update companion history from the converged solution.
    fn commit_step(&mut self, _x_solved: &DVector<f64>) {}

    /// Number of extra branch unknowns this element owns.
    fn branch_count(&self) -> usize {
        0
    }

    /// Receive the first branch row index. Called exactly once, at finalize.
    fn set_branch_index(&mut self, _first: usize) {}

    /// Whether this element is an independent source (subject to the
    /// homotopy source scale).
    fn is_source(&self) -> bool {
        false
    }

    /// Downcast support for typed element handles.
    fn as_any(&self) -> &dyn Any;

    /// Downcast support for typed element handles.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestShunt {
        node: NodeId,
        g: f64,
    }

    impl Element for TestShunt {
        fn name(&self) -> &str {
            "Gtest"
        }

        fn stamp(&self, ctx: &mut StampContext) {
            ctx.system.stamp_conductance(self.node, NodeId::GROUND, self.g);
        }

        fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
            vec![(self.node, NodeId::GROUND)]
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_default_capabilities() {
        let shunt = TestShunt {
            node: NodeId::new(0),
            g: 1e-3,
        };
        assert!(!shunt.is_nonlinear());
        assert!(!shunt.is_dynamic());
        assert!(!shunt.is_source());
        assert_eq!(shunt.branch_count(), 0);
        assert_eq!(shunt.dc_connections().len(), 1);
    }

    #[test]
    fn test_stamp_through_context() {
        let shunt = TestShunt {
            node: NodeId::new(0),
            g: 1e-3,
        };
        let mut sys = MnaSystem::new(1, 0);
        let mut ctx = StampContext {
            system: &mut sys,
            source_scale: 1.0,
        };
        shunt.stamp(&mut ctx);
        assert!((sys.get_a(0, 0) - 1e-3).abs() < 1e-15);
    }
}
