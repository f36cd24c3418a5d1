//! Passive element models: resistor, capacitor, inductor.
//!
//! The reactive elements carry trapezoidal companion state: `begin_step`
//! turns the differential element into a Norton/Thevenin pair for the
//! upcoming step, `commit_step` folds the converged solution back into the
//! history. Before any step has begun the companion parameters are zero,
//! which is exactly the DC behaviour (capacitor open, inductor short).

use std::any::Any;

use nalgebra::DVector;

use nodal_core::error::Error as CoreError;
use nodal_core::{Element, NodeId, StampContext};

use crate::error::{Error, Result};

/// A linear resistor between two nodes.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    node_a: NodeId,
    node_b: NodeId,
    resistance: f64,
}

impl Resistor {
    /// Create a new resistor. `resistance` must be positive.
    pub fn new(
        name: impl Into<String>,
        node_a: NodeId,
        node_b: NodeId,
        resistance: f64,
    ) -> Result<Self> {
        if resistance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Resistor: R must be > 0, got {resistance}"
            )));
        }
        Ok(Self {
            name: name.into(),
            node_a,
            node_b,
            resistance,
        })
    }

    /// Retune the resistance between solves.
    pub fn set_resistance(&mut self, resistance: f64) -> Result<()> {
        if resistance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Resistor: R must be > 0, got {resistance}"
            )));
        }
        self.resistance = resistance;
        Ok(())
    }

    /// The resistance in ohms.
    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// The conductance 1/R.
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Element for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, ctx: &mut StampContext) {
        ctx.system
            .stamp_conductance(self.node_a, self.node_b, self.conductance());
    }

    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        vec![(self.node_a, self.node_b)]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A capacitor discretized with the trapezoidal rule.
///
/// Companion model per step: `G = 2C/dt`, `Ieq = −(i_prev + G·v_prev)`,
/// stamped as a conductance between the terminals plus a current source
/// from a to b. With `dt ≤ 0` (DC) both are zero and the element is open.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    node_a: NodeId,
    node_b: NodeId,
    capacitance: f64,

    // Companion parameters for the current step
    g: f64,
    ieq: f64,

    // History state
    v_prev: f64,
    i_prev: f64,
}

impl Capacitor {
    /// Create a new capacitor. `capacitance` must be non-negative.
    pub fn new(
        name: impl Into<String>,
        node_a: NodeId,
        node_b: NodeId,
        capacitance: f64,
    ) -> Result<Self> {
        if capacitance < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Capacitor: C must be >= 0, got {capacitance}"
            )));
        }
        Ok(Self {
            name: name.into(),
            node_a,
            node_b,
            capacitance,
            g: 0.0,
            ieq: 0.0,
            v_prev: 0.0,
            i_prev: 0.0,
        })
    }

    /// The capacitance in farads.
    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Voltage across the capacitor at the last committed step.
    pub fn voltage(&self) -> f64 {
        self.v_prev
    }

    /// Current through the capacitor at the last committed step.
    pub fn current(&self) -> f64 {
        self.i_prev
    }
}

impl Element for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, ctx: &mut StampContext) {
        ctx.system.stamp_conductance(self.node_a, self.node_b, self.g);
        ctx.system
            .stamp_current_source(self.node_a, self.node_b, self.ieq);
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn begin_step(&mut self, dt: f64) -> nodal_core::Result<()> {
        if dt <= 0.0 {
            // DC: open circuit
            self.g = 0.0;
            self.ieq = 0.0;
            return Ok(());
        }
        self.g = 2.0 * self.capacitance / dt;
        self.ieq = -(self.i_prev + self.g * self.v_prev);
        Ok(())
    }

    fn commit_step(&mut self, x_solved: &DVector<f64>) {
        let v_new = self.node_a.voltage(x_solved) - self.node_b.voltage(x_solved);

        if self.g == 0.0 {
            // DC steady state
            self.v_prev = v_new;
            self.i_prev = 0.0;
            return;
        }

        self.i_prev = self.g * v_new + self.ieq;
        self.v_prev = v_new;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An inductor discretized with the trapezoidal rule.
///
/// Owns one branch unknown (its current). The branch row reads
/// `V(a) − V(b) − R_eff·i = rhs` with `R_eff = 2L/dt` and
/// `rhs = −R_eff·i_prev − v_prev`; before any step has begun both are zero,
/// so the row degenerates to `V(a) = V(b)` — a DC short.
#[derive(Debug, Clone)]
pub struct Inductor {
    name: String,
    node_a: NodeId,
    node_b: NodeId,
    inductance: f64,
    branch: Option<usize>,

    // Companion parameters for the current step
    r_eff: f64,
    rhs: f64,

    // History state
    i_prev: f64,
    v_prev: f64,
}

impl Inductor {
    /// Create a new inductor. `inductance` must be positive.
    pub fn new(
        name: impl Into<String>,
        node_a: NodeId,
        node_b: NodeId,
        inductance: f64,
    ) -> Result<Self> {
        if inductance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Inductor: L must be > 0, got {inductance}"
            )));
        }
        Ok(Self {
            name: name.into(),
            node_a,
            node_b,
            inductance,
            branch: None,
            r_eff: 0.0,
            rhs: 0.0,
            i_prev: 0.0,
            v_prev: 0.0,
        })
    }

    /// The inductance in henries.
    pub fn inductance(&self) -> f64 {
        self.inductance
    }

    /// Branch current at the last committed step.
    pub fn current(&self) -> f64 {
        self.i_prev
    }

    /// The branch row assigned at finalize, if any.
    pub fn branch_index(&self) -> Option<usize> {
        self.branch
    }
}

impl Element for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, ctx: &mut StampContext) {
        // Finalize assigns the branch row before any stamp can run.
        let Some(k) = self.branch else { return };
        let sys = &mut *ctx.system;

        if let Some(i) = self.node_a.index() {
            sys.add_a(k, i, 1.0);
            sys.add_a(i, k, 1.0);
        }
        if let Some(j) = self.node_b.index() {
            sys.add_a(k, j, -1.0);
            sys.add_a(j, k, -1.0);
        }
        sys.add_a(k, k, -self.r_eff);
        sys.add_z(k, self.rhs);
    }

    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        // Short at DC
        vec![(self.node_a, self.node_b)]
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn begin_step(&mut self, dt: f64) -> nodal_core::Result<()> {
        if dt <= 0.0 {
            return Err(CoreError::InvalidTimeStep { dt });
        }
        self.r_eff = 2.0 * self.inductance / dt;
        self.rhs = -self.r_eff * self.i_prev - self.v_prev;
        Ok(())
    }

    fn commit_step(&mut self, x_solved: &DVector<f64>) {
        if let Some(k) = self.branch {
            self.i_prev = x_solved[k];
        }
        self.v_prev = self.node_a.voltage(x_solved) - self.node_b.voltage(x_solved);
    }

    fn branch_count(&self) -> usize {
        1
    }

    fn set_branch_index(&mut self, first: usize) {
        self.branch = Some(first);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodal_core::MnaSystem;

    fn ctx(sys: &mut MnaSystem) -> StampContext<'_> {
        StampContext {
            system: sys,
            source_scale: 1.0,
        }
    }

    #[test]
    fn test_resistor_validation() {
        assert!(Resistor::new("R1", NodeId::new(0), NodeId::GROUND, 0.0).is_err());
        assert!(Resistor::new("R1", NodeId::new(0), NodeId::GROUND, -5.0).is_err());
        let mut r = Resistor::new("R1", NodeId::new(0), NodeId::GROUND, 1e3).unwrap();
        assert!(r.set_resistance(-1.0).is_err());
        r.set_resistance(2e3).unwrap();
        assert_eq!(r.resistance(), 2e3);
    }

    #[test]
    fn test_resistor_stamp() {
        let mut sys = MnaSystem::new(2, 0);
        let r = Resistor::new("R1", NodeId::new(0), NodeId::new(1), 1000.0).unwrap();
        r.stamp(&mut ctx(&mut sys));

        let g = 1e-3;
        assert!((sys.get_a(0, 0) - g).abs() < 1e-12);
        assert!((sys.get_a(1, 1) - g).abs() < 1e-12);
        assert!((sys.get_a(0, 1) + g).abs() < 1e-12);
        assert!((sys.get_a(1, 0) + g).abs() < 1e-12);
    }

    #[test]
    fn test_capacitor_open_at_dc() {
        let mut sys = MnaSystem::new(2, 0);
        let mut c = Capacitor::new("C1", NodeId::new(0), NodeId::new(1), 1e-6).unwrap();
        c.begin_step(0.0).unwrap();
        c.stamp(&mut ctx(&mut sys));
        assert_eq!(sys.get_a(0, 0), 0.0);
        assert_eq!(sys.get_z(0), 0.0);
    }

    #[test]
    fn test_capacitor_trapezoidal_companion() {
        let mut c = Capacitor::new("C1", NodeId::new(0), NodeId::GROUND, 1e-6).unwrap();

        // Commit a DC point at 2.5 V first.
        let dc = DVector::from_vec(vec![2.5]);
        c.commit_step(&dc);
        assert_eq!(c.voltage(), 2.5);
        assert_eq!(c.current(), 0.0);

        // G = 2C/dt = 2.0, Ieq = -(0 + 2.0 * 2.5) = -5.0
        c.begin_step(1e-6).unwrap();
        let mut sys = MnaSystem::new(1, 0);
        c.stamp(&mut ctx(&mut sys));
        assert!((sys.get_a(0, 0) - 2.0).abs() < 1e-12);
        // Ieq flows a->b; z(a) -= Ieq, so z(0) = +5.0
        assert!((sys.get_z(0) - 5.0).abs() < 1e-12);

        // Hold the voltage: current settles to -i_prev + ... = 0 here.
        let x = DVector::from_vec(vec![2.5]);
        c.commit_step(&x);
        assert!((c.current() - 0.0).abs() < 1e-12);
        assert_eq!(c.voltage(), 2.5);
    }

    #[test]
    fn test_inductor_requires_positive_dt() {
        let mut l = Inductor::new("L1", NodeId::new(0), NodeId::GROUND, 1e-3).unwrap();
        assert!(matches!(
            l.begin_step(0.0),
            Err(CoreError::InvalidTimeStep { .. })
        ));
    }

    #[test]
    fn test_inductor_dc_stamp_is_short() {
        let mut sys = MnaSystem::new(2, 1);
        let mut l = Inductor::new("L1", NodeId::new(0), NodeId::new(1), 1e-3).unwrap();
        l.set_branch_index(2);
        l.stamp(&mut ctx(&mut sys));

        // Branch row: V(a) - V(b) = 0, no series resistance yet.
        assert_eq!(sys.get_a(2, 0), 1.0);
        assert_eq!(sys.get_a(2, 1), -1.0);
        assert_eq!(sys.get_a(2, 2), 0.0);
        assert_eq!(sys.get_z(2), 0.0);
        // Node rows couple to the branch current.
        assert_eq!(sys.get_a(0, 2), 1.0);
        assert_eq!(sys.get_a(1, 2), -1.0);
    }

    #[test]
    fn test_inductor_companion_and_commit() {
        let mut l = Inductor::new("L1", NodeId::new(0), NodeId::GROUND, 1e-3).unwrap();
        l.set_branch_index(1);

        l.begin_step(1e-6).unwrap();
        // R_eff = 2L/dt = 2000
        let mut sys = MnaSystem::new(1, 1);
        l.stamp(&mut ctx(&mut sys));
        assert!((sys.get_a(1, 1) + 2000.0).abs() < 1e-9);

        // Commit: i from branch row, v from node voltages.
        let x = DVector::from_vec(vec![3.0, 0.25]);
        l.commit_step(&x);
        assert_eq!(l.current(), 0.25);

        // Next step's rhs carries the history.
        l.begin_step(1e-6).unwrap();
        let expected_rhs = -2000.0 * 0.25 - 3.0;
        let mut sys2 = MnaSystem::new(1, 1);
        l.stamp(&mut ctx(&mut sys2));
        assert!((sys2.get_z(1) - expected_rhs).abs() < 1e-9);
    }
}
