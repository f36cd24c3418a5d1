//! Shockley diode with Newton-Raphson linearization and junction limiting.

use std::any::Any;

use nalgebra::DVector;

use nodal_core::{Element, NodeId, StampContext};

use crate::error::{Error, Result};
use crate::limit::{critical_voltage, pnjlim, safe_exp, MAX_JUNCTION_STEP};

/// Thermal voltage kT/q at a given temperature in kelvin.
pub fn thermal_voltage(temp_k: f64) -> f64 {
    const K_BOLTZMANN: f64 = 1.380649e-23;
    const Q_ELECTRON: f64 = 1.602176634e-19;
    K_BOLTZMANN * temp_k / Q_ELECTRON
}

/// Diode model parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A).
    pub is: f64,
    /// Emission coefficient.
    pub n: f64,
    /// Thermal voltage (V).
    pub vt: f64,
    /// Minimum parallel conductance (S).
    pub gmin: f64,
    /// Reverse breakdown voltage (V); 0 disables the breakdown branch.
    pub bv: f64,
    /// Knee current at breakdown (A).
    pub ibv: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            vt: 0.02585,
            gmin: 1e-12,
            bv: 0.0,
            ibv: 1e-3,
        }
    }
}

impl DiodeParams {
    fn validate(&self) -> Result<()> {
        if self.is <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: Is must be > 0, got {}",
                self.is
            )));
        }
        if self.n <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: n must be > 0, got {}",
                self.n
            )));
        }
        if self.vt <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: Vt must be > 0, got {}",
                self.vt
            )));
        }
        if self.gmin < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: gmin must be >= 0, got {}",
                self.gmin
            )));
        }
        if self.bv < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: BV must be >= 0, got {}",
                self.bv
            )));
        }
        if self.ibv <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Diode: IBV must be > 0, got {}",
                self.ibv
            )));
        }
        Ok(())
    }
}

/// A Shockley diode; current flows from anode to cathode.
///
/// Linearized around its limited junction voltage each Newton iteration:
/// a conductance `gd` between the terminals plus a Norton intercept
/// `Ieq = Id − gd·v` as a current source anode→cathode. With `bv > 0` the
/// region below `−bv` switches to a piecewise-linear breakdown branch of
/// slope `ibv/bv` and offset `−ibv`.
#[derive(Debug, Clone)]
pub struct Diode {
    name: String,
    anode: NodeId,
    cathode: NodeId,
    params: DiodeParams,
    /// Junction voltage the current linearization is anchored at.
    limited_vd: f64,
}

impl Diode {
    /// Create a new diode with the given parameters.
    pub fn new(
        name: impl Into<String>,
        anode: NodeId,
        cathode: NodeId,
        params: DiodeParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            anode,
            cathode,
            params,
            limited_vd: 0.0,
        })
    }

    /// The effective junction thermal voltage n·Vt.
    fn nvt(&self) -> f64 {
        self.params.n * self.params.vt
    }

    /// Evaluate diode current and differential conductance at voltage `v`.
    ///
    /// Returns `(Id, gd)` with `Id = Is·(exp(v/nVt) − 1)` and
    /// `gd = Is/nVt·exp(v/nVt) + gmin`.
    pub fn evaluate(&self, v: f64) -> (f64, f64) {
        let nvt = self.nvt();
        let ev = safe_exp(v / nvt);
        let id = self.params.is * (ev - 1.0);
        let gd = (self.params.is / nvt) * ev + self.params.gmin;
        (id, gd)
    }

    /// The junction voltage used for the current linearization.
    pub fn limited_voltage(&self) -> f64 {
        self.limited_vd
    }
}

impl Element for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    // Nothing to contribute in the pure linear pass.
    fn stamp(&self, _ctx: &mut StampContext) {}

    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        vec![(self.anode, self.cathode)]
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn compute_limited_voltages(&mut self, x_new: &DVector<f64>, x_old: &DVector<f64>) {
        let vd_new = self.anode.voltage(x_new) - self.cathode.voltage(x_new);
        let vd_old = self.anode.voltage(x_old) - self.cathode.voltage(x_old);

        let nvt = self.nvt();
        let vcrit = critical_voltage(nvt, self.params.is);
        self.limited_vd = pnjlim(vd_new, vd_old, nvt, vcrit, MAX_JUNCTION_STEP);
    }

    fn stamp_newton(&self, ctx: &mut StampContext, _x_guess: &DVector<f64>) {
        let v = self.limited_vd;

        if self.params.bv > 0.0 && v < -self.params.bv {
            // Breakdown region: piecewise-linear I = (ibv/bv)·v − ibv.
            let gd = self.params.ibv / self.params.bv;
            let ieq = -self.params.ibv;
            ctx.system
                .stamp_conductance(self.anode, self.cathode, gd + self.params.gmin);
            ctx.system.stamp_current_source(self.anode, self.cathode, ieq);
            return;
        }

        let (id, gd) = self.evaluate(v);
        let ieq = id - gd * v;

        ctx.system.stamp_conductance(self.anode, self.cathode, gd);
        ctx.system.stamp_current_source(self.anode, self.cathode, ieq);
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

    fn diode() -> Diode {
        Diode::new("D1", NodeId::new(0), NodeId::GROUND, DiodeParams::default()).unwrap()
    }

    #[test]
    fn test_parameter_validation() {
        let bad = |f: fn(&mut DiodeParams)| {
            let mut p = DiodeParams::default();
            f(&mut p);
            Diode::new("D", NodeId::new(0), NodeId::GROUND, p)
        };
        assert!(bad(|p| p.is = 0.0).is_err());
        assert!(bad(|p| p.n = -1.0).is_err());
        assert!(bad(|p| p.vt = 0.0).is_err());
        assert!(bad(|p| p.gmin = -1e-12).is_err());
        assert!(bad(|p| p.bv = -5.0).is_err());
        assert!(bad(|p| p.ibv = 0.0).is_err());
    }

    #[test]
    fn test_forward_bias_evaluation() {
        let d = diode();
        let (id, gd) = d.evaluate(0.7);
        assert!(id > 1e-4, "forward current should be large: {id}");
        assert!(gd > 0.0);
    }

    #[test]
    fn test_reverse_bias_evaluation() {
        let d = diode();
        let (id, _gd) = d.evaluate(-1.0);
        assert!(id < 0.0);
        assert!((id + 1e-14).abs() < 1e-15, "reverse current ≈ -Is: {id}");
    }

    #[test]
    fn test_large_voltage_stays_finite() {
        let d = diode();
        let (id, gd) = d.evaluate(100.0);
        assert!(id.is_finite());
        assert!(gd.is_finite());
    }

    #[test]
    fn test_limiting_compresses_newton_overshoot() {
        let mut d = diode();
        let x_old = DVector::from_vec(vec![0.6]);
        let x_new = DVector::from_vec(vec![8.0]);
        d.compute_limited_voltages(&x_new, &x_old);
        assert!(d.limited_voltage() <= 0.6 + MAX_JUNCTION_STEP + 1e-12);
    }

    #[test]
    fn test_newton_stamp_matches_norton_pair() {
        let mut d = diode();
        let x = DVector::from_vec(vec![0.65]);
        // Candidate equals the reference: the limiter passes it through.
        d.compute_limited_voltages(&x, &x);
        let v = d.limited_voltage();
        assert!((v - 0.65).abs() < 1e-12);

        let (id, gd) = d.evaluate(v);
        let mut sys = MnaSystem::new(1, 0);
        d.stamp_newton(
            &mut StampContext {
                system: &mut sys,
                source_scale: 1.0,
            },
            &x,
        );
        assert!((sys.get_a(0, 0) - gd).abs() < 1e-12);
        // z(anode) -= Ieq
        assert!((sys.get_z(0) + (id - gd * v)).abs() < 1e-12);
    }

    #[test]
    fn test_breakdown_region_stamp() {
        let params = DiodeParams {
            bv: 5.0,
            ibv: 1e-3,
            ..DiodeParams::default()
        };
        let mut d = Diode::new("DZ", NodeId::new(0), NodeId::GROUND, params).unwrap();

        // Drive the limited voltage below -BV (hard clamp is 0.2 V/step).
        let zero = DVector::zeros(1);
        let target = DVector::from_vec(vec![-6.0]);
        let mut x_prev = zero.clone();
        for _ in 0..40 {
            d.compute_limited_voltages(&target, &x_prev);
            x_prev = DVector::from_vec(vec![d.limited_voltage()]);
        }
        assert!(d.limited_voltage() < -5.0);

        let mut sys = MnaSystem::new(1, 0);
        d.stamp_newton(
            &mut StampContext {
                system: &mut sys,
                source_scale: 1.0,
            },
            &target,
        );
        let gd = 1e-3 / 5.0;
        assert!((sys.get_a(0, 0) - (gd + 1e-12)).abs() < 1e-15);
        // Ieq = -IBV, z(anode) -= Ieq
        assert!((sys.get_z(0) - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn test_thermal_voltage_room_temp() {
        let vt = thermal_voltage(300.15);
        assert!((vt - 0.02585).abs() < 1e-3, "Vt = {vt}");
    }
}
