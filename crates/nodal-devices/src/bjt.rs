//! Ebers-Moll BJT models (transport form) with Early effect.
//!
//! NPN and PNP share one element type; the PNP is the structural mirror,
//! working in (Veb, Vcb) under identical junction limiting. The Early
//! effect enters as an output conductance `go = |Ic|/VAF` between collector
//! and emitter, folded into the Jacobian rows with opposite signs.

use std::any::Any;

use nalgebra::DVector;

use nodal_core::{Circuit, Element, ElementRef, NodeId, StampContext};

use crate::error::{Error, Result};
use crate::limit::{critical_voltage, pnjlim, safe_exp, MAX_JUNCTION_STEP};
use crate::passive::{Capacitor, Resistor};

/// BJT polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtPolarity {
    Npn,
    Pnp,
}

/// Ebers-Moll model parameters.
#[derive(Debug, Clone)]
pub struct BjtParams {
    /// Transport saturation current (A).
    pub is: f64,
    /// Effective junction thermal voltage n·Vt (V).
    pub n_vt: f64,
    /// Forward current gain.
    pub beta_f: f64,
    /// Reverse current gain.
    pub beta_r: f64,
    /// Forward Early voltage (V); 0 disables the Early effect.
    pub vaf: f64,
    /// Junction shunt conductance (S).
    pub gmin: f64,

    // Parasitics consumed by the extended builder (ohms / farads)
    pub rb: f64,
    pub rc: f64,
    pub re: f64,
    pub cje: f64,
    pub cjc: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            is: 1e-15,
            n_vt: 0.02585,
            beta_f: 200.0,
            beta_r: 2.0,
            vaf: 100.0,
            gmin: 1e-12,
            rb: 0.0,
            rc: 0.0,
            re: 0.0,
            cje: 0.0,
            cjc: 0.0,
        }
    }
}

impl BjtParams {
    fn validate(&self) -> Result<()> {
        if self.is <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Bjt: Is must be > 0, got {}",
                self.is
            )));
        }
        if self.n_vt <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Bjt: nVt must be > 0, got {}",
                self.n_vt
            )));
        }
        if self.beta_f <= 0.0 || self.beta_r <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Bjt: betaF/betaR must be > 0, got {}/{}",
                self.beta_f, self.beta_r
            )));
        }
        if self.vaf < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Bjt: VAF must be >= 0, got {}",
                self.vaf
            )));
        }
        if self.gmin < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Bjt: gmin must be >= 0, got {}",
                self.gmin
            )));
        }
        if self.rb < 0.0 || self.rc < 0.0 || self.re < 0.0 {
            return Err(Error::InvalidParameter(
                "Bjt: parasitic resistances must be >= 0".into(),
            ));
        }
        if self.cje < 0.0 || self.cjc < 0.0 {
            return Err(Error::InvalidParameter(
                "Bjt: junction capacitances must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Terminal currents and the full Jacobian of the intrinsic model at one
/// pair of junction voltages.
///
/// Currents flow into the terminals; every row of derivatives sums to zero
/// (the model is reference-free).
#[derive(Debug, Clone, Copy)]
pub struct BjtOperatingPoint {
    pub ic: f64,
    pub ib: f64,
    pub ie: f64,

    pub dic_dvc: f64,
    pub dic_dvb: f64,
    pub dic_dve: f64,

    pub dib_dvc: f64,
    pub dib_dvb: f64,
    pub dib_dve: f64,

    pub die_dvc: f64,
    pub die_dvb: f64,
    pub die_dve: f64,
}

/// An intrinsic Ebers-Moll BJT between three nodes.
#[derive(Debug, Clone)]
pub struct Bjt {
    name: String,
    collector: NodeId,
    base: NodeId,
    emitter: NodeId,
    polarity: BjtPolarity,
    params: BjtParams,

    // Limited junction voltages the linearization is anchored at:
    // (Vbe, Vbc) for NPN, (Veb, Vcb) for PNP.
    v1_lim: f64,
    v2_lim: f64,
}

impl Bjt {
    /// Create an NPN transistor.
    pub fn npn(
        name: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        params: BjtParams,
    ) -> Result<Self> {
        Self::new(name, collector, base, emitter, BjtPolarity::Npn, params)
    }

    /// Create a PNP transistor.
    pub fn pnp(
        name: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        params: BjtParams,
    ) -> Result<Self> {
        Self::new(name, collector, base, emitter, BjtPolarity::Pnp, params)
    }

    fn new(
        name: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        polarity: BjtPolarity,
        params: BjtParams,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: name.into(),
            collector,
            base,
            emitter,
            polarity,
            params,
            v1_lim: 0.0,
            v2_lim: 0.0,
        })
    }

    /// The model parameters.
    pub fn params(&self) -> &BjtParams {
        &self.params
    }

    /// The polarity.
    pub fn polarity(&self) -> BjtPolarity {
        self.polarity
    }

    /// The limited junction voltages of the current linearization:
    /// (Vbe, Vbc) for NPN, (Veb, Vcb) for PNP.
    pub fn limited_voltages(&self) -> (f64, f64) {
        (self.v1_lim, self.v2_lim)
    }

    /// Evaluate the intrinsic model at a pair of junction voltages:
    /// `(Vbe, Vbc)` for NPN, `(Veb, Vcb)` for PNP.
    pub fn operating_point(&self, v1: f64, v2: f64) -> BjtOperatingPoint {
        match self.polarity {
            BjtPolarity::Npn => self.op_npn(v1, v2),
            BjtPolarity::Pnp => self.op_pnp(v1, v2),
        }
    }

    fn op_npn(&self, vbe: f64, vbc: f64) -> BjtOperatingPoint {
        let p = &self.params;
        let nvt = p.n_vt;

        let exp_be = safe_exp(vbe / nvt);
        let exp_bc = safe_exp(vbc / nvt);

        let i_tran = p.is * (exp_be - exp_bc);
        let i_be = (p.is / p.beta_f) * (exp_be - 1.0) + p.gmin * vbe;
        let i_bc = (p.is / p.beta_r) * (exp_bc - 1.0) + p.gmin * vbc;

        // Vce = Vbe - Vbc
        let vce = vbe - vbc;
        let ic_base = i_tran - i_bc;

        // Early effect as an output conductance between C and E
        let go = if p.vaf > 0.0 {
            ic_base.abs() / p.vaf
        } else {
            0.0
        };

        let ic = ic_base + go * vce;
        let ib = i_be + i_bc;
        let ie = -(ic + ib);

        let g_tran_f = (p.is / nvt) * exp_be;
        let g_tran_r = (p.is / nvt) * exp_bc;
        let g_be = (p.is / (p.beta_f * nvt)) * exp_be + p.gmin;
        let g_bc = (p.is / (p.beta_r * nvt)) * exp_bc + p.gmin;

        // dVce/dVc = +1, dVce/dVe = -1, dVce/dVb = 0
        let dic_dvb = g_tran_f - g_tran_r - g_bc;
        let dic_dvc = g_tran_r + g_bc + go;
        let dic_dve = -g_tran_f - go;

        let dib_dvb = g_be + g_bc;
        let dib_dvc = -g_bc;
        let dib_dve = -g_be;

        BjtOperatingPoint {
            ic,
            ib,
            ie,
            dic_dvc,
            dic_dvb,
            dic_dve,
            dib_dvc,
            dib_dvb,
            dib_dve,
            die_dvc: -(dic_dvc + dib_dvc),
            die_dvb: -(dic_dvb + dib_dvb),
            die_dve: -(dic_dve + dib_dve),
        }
    }

    fn op_pnp(&self, veb: f64, vcb: f64) -> BjtOperatingPoint {
        let p = &self.params;
        let nvt = p.n_vt;

        let exp_eb = safe_exp(veb / nvt);
        let exp_cb = safe_exp(vcb / nvt);

        let i_tran = p.is * (exp_eb - exp_cb);
        let i_eb = (p.is / p.beta_f) * (exp_eb - 1.0) + p.gmin * veb;
        let i_cb = (p.is / p.beta_r) * (exp_cb - 1.0) + p.gmin * vcb;

        // Vec = Veb - Vcb; collector current flows into the collector.
        let vec = veb - vcb;
        let ic_base = -i_tran + i_cb;

        // Early effect modelled as ro between C and E:
        // current into C is -go·Vec, into E is +go·Vec.
        let go = if p.vaf > 0.0 {
            ic_base.abs() / p.vaf
        } else {
            0.0
        };

        let ic = ic_base - go * vec;
        let ie = i_tran + i_eb + go * vec;
        let ib = -(ie + ic);

        let g_tran_f = (p.is / nvt) * exp_eb;
        let g_tran_r = (p.is / nvt) * exp_cb;
        let g_eb = (p.is / (p.beta_f * nvt)) * exp_eb + p.gmin;
        let g_cb = (p.is / (p.beta_r * nvt)) * exp_cb + p.gmin;

        // dVec/dVe = +1, dVec/dVc = -1, dVec/dVb = 0
        let die_dve = g_tran_f + g_eb + go;
        let die_dvc = -g_tran_r - go;
        let die_dvb = -(g_tran_f + g_eb - g_tran_r);

        let dic_dve = -g_tran_f - go;
        let dic_dvc = g_tran_r + g_cb + go;
        let dic_dvb = g_tran_f - (g_tran_r + g_cb);

        BjtOperatingPoint {
            ic,
            ib,
            ie,
            dic_dvc,
            dic_dvb,
            dic_dve,
            dib_dvc: -(die_dvc + dic_dvc),
            dib_dvb: -(die_dvb + dic_dvb),
            dib_dve: -(die_dve + dic_dve),
            die_dvc,
            die_dvb,
            die_dve,
        }
    }
}

impl Element for Bjt {
    fn name(&self) -> &str {
        &self.name
    }

    // Nothing to contribute in the pure linear pass.
    fn stamp(&self, _ctx: &mut StampContext) {}

    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        vec![(self.base, self.emitter), (self.base, self.collector)]
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn compute_limited_voltages(&mut self, x_new: &DVector<f64>, x_old: &DVector<f64>) {
        let vc = self.collector.voltage(x_new);
        let vb = self.base.voltage(x_new);
        let ve = self.emitter.voltage(x_new);
        let vc_old = self.collector.voltage(x_old);
        let vb_old = self.base.voltage(x_old);
        let ve_old = self.emitter.voltage(x_old);

        let (v1_new, v2_new, v1_old, v2_old) = match self.polarity {
            BjtPolarity::Npn => (vb - ve, vb - vc, vb_old - ve_old, vb_old - vc_old),
            BjtPolarity::Pnp => (ve - vb, vc - vb, ve_old - vb_old, vc_old - vb_old),
        };

        let nvt = self.params.n_vt;
        let vcrit = critical_voltage(nvt, self.params.is);

        self.v1_lim = pnjlim(v1_new, v1_old, nvt, vcrit, MAX_JUNCTION_STEP);
        self.v2_lim = pnjlim(v2_new, v2_old, nvt, vcrit, MAX_JUNCTION_STEP);
    }

    fn stamp_newton(&self, ctx: &mut StampContext, _x_guess: &DVector<f64>) {
        let op = self.operating_point(self.v1_lim, self.v2_lim);

        // A node-voltage triple consistent with the limited junction
        // voltages; the reference choice cancels because every Jacobian
        // row sums to zero.
        let (vc_op, vb_op, ve_op) = match self.polarity {
            BjtPolarity::Npn => (self.v1_lim - self.v2_lim, self.v1_lim, 0.0),
            BjtPolarity::Pnp => (self.v2_lim, 0.0, self.v1_lim),
        };

        let sys = &mut *ctx.system;
        let mut stamp_row = |row: NodeId, i_op: f64, d_dvc: f64, d_dvb: f64, d_dve: f64| {
            if row.is_ground() {
                return;
            }
            sys.add_a_node(row, self.collector, d_dvc);
            sys.add_a_node(row, self.base, d_dvb);
            sys.add_a_node(row, self.emitter, d_dve);
            let jv = d_dvc * vc_op + d_dvb * vb_op + d_dve * ve_op;
            sys.add_z_node(row, jv - i_op);
        };

        stamp_row(self.collector, op.ic, op.dic_dvc, op.dic_dvb, op.dic_dve);
        stamp_row(self.base, op.ib, op.dib_dvc, op.dib_dvb, op.dib_dve);
        stamp_row(self.emitter, op.ie, op.die_dvc, op.die_dvb, op.die_dve);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Internal terminal nodes of an extended BJT, inside the parasitics.
///
/// Probing these gives the true junction voltages without the RB/RC/RE
/// drops.
#[derive(Debug, Clone, Copy)]
pub struct BjtInternalNodes {
    pub collector: NodeId,
    pub base: NodeId,
    pub emitter: NodeId,
}

/// Build an extended BJT: parasitic resistances RB/RC/RE between the
/// external and internal terminals, junction capacitances CJE/CJC across
/// the internal junctions, and the intrinsic Ebers-Moll model on the
/// internal triplet. Parasitics with zero value are omitted and the
/// corresponding internal node aliases the external one.
pub fn add_bjt_extended(
    circuit: &mut Circuit,
    collector: NodeId,
    base: NodeId,
    emitter: NodeId,
    polarity: BjtPolarity,
    params: BjtParams,
    name: &str,
) -> Result<(ElementRef<Bjt>, BjtInternalNodes)> {
    let c_int = if params.rc > 0.0 {
        circuit.create_named_node(format!("{name}_ci"))?
    } else {
        collector
    };
    let b_int = if params.rb > 0.0 {
        circuit.create_named_node(format!("{name}_bi"))?
    } else {
        base
    };
    let e_int = if params.re > 0.0 {
        circuit.create_named_node(format!("{name}_ei"))?
    } else {
        emitter
    };

    if params.rb > 0.0 {
        circuit.add_element(Resistor::new(format!("{name}_rb"), base, b_int, params.rb)?)?;
    }
    if params.rc > 0.0 {
        circuit.add_element(Resistor::new(
            format!("{name}_rc"),
            collector,
            c_int,
            params.rc,
        )?)?;
    }
    if params.re > 0.0 {
        circuit.add_element(Resistor::new(
            format!("{name}_re"),
            emitter,
            e_int,
            params.re,
        )?)?;
    }

    if params.cje > 0.0 {
        circuit.add_element(Capacitor::new(
            format!("{name}_cje"),
            b_int,
            e_int,
            params.cje,
        )?)?;
    }
    if params.cjc > 0.0 {
        circuit.add_element(Capacitor::new(
            format!("{name}_cjc"),
            b_int,
            c_int,
            params.cjc,
        )?)?;
    }

    let q = match polarity {
        BjtPolarity::Npn => Bjt::npn(name, c_int, b_int, e_int, params)?,
        BjtPolarity::Pnp => Bjt::pnp(name, c_int, b_int, e_int, params)?,
    };
    let handle = circuit.add_element(q)?;

    Ok((
        handle,
        BjtInternalNodes {
            collector: c_int,
            base: b_int,
            emitter: e_int,
        },
    ))
}
