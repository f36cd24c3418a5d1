//! Linear and nonlinear solvers for the nodal simulator.
//!
//! This crate provides the simulation engines that drive a
//! [`nodal_core::Circuit`]:
//!
//! - **Linear solve** - Gaussian elimination with partial pivoting behind
//!   the [`LinearSolver`] trait
//! - **DC operating point** - Newton-Raphson with junction limiting,
//!   residual-monitored damping, and a two-stage source/Gmin homotopy
//! - **Pseudo-transient DC** - settle the transient equations, then hand
//!   off to the direct solver
//! - **Transient** - fixed-step time integration on the same Newton engine
//!
//! # DC operating point
//!
//! ```rust
//! use nalgebra::DVector;
//! use nodal_core::{Circuit, NodeId};
//! use nodal_solver::{solve_dc, DcOptions};
//!
//! # use nodal_devices::{Resistor, VoltageSource};
//! let mut circuit = Circuit::new();
//! let n1 = circuit.create_node().unwrap();
//! let n2 = circuit.create_node().unwrap();
//!
//! circuit.add_element(VoltageSource::new("V1", n1, NodeId::GROUND, 10.0)).unwrap();
//! circuit.add_element(Resistor::new("R1", n1, n2, 1000.0).unwrap()).unwrap();
//! circuit.add_element(Resistor::new("R2", n2, NodeId::GROUND, 1000.0).unwrap()).unwrap();
//!
//! let mut x = DVector::zeros(0);
//! let report = solve_dc(&mut circuit, &mut x, &DcOptions::default()).unwrap();
//! assert!(report.converged);
//! assert!((x[n2.index().unwrap()] - 5.0).abs() < 1e-6);
//! ```
//!
//! # Transient
//!
//! After a DC solve, seed the dynamic elements with
//! [`Circuit::initialize_dynamics`](nodal_core::Circuit::initialize_dynamics)
//! and call [`step`] per time point; the caller owns the time axis and
//! retunes any waveform sources between steps.

pub mod dc;
pub mod diagnostics;
pub mod error;
pub mod linear;
pub mod newton;
pub mod transient;

pub use dc::{
    solve_dc, solve_dc_pseudo_transient, ConvergenceStats, DcOptions, DcReport,
    PseudoTransientOptions,
};
pub use diagnostics::{diagnose_failure, NewtonDiagnosis, RankedUnknown};
pub use error::{Error, Result};
pub use linear::{solve_dense, GaussianSolver, LinearSolver, PIVOT_THRESHOLD};
pub use newton::{
    solve_newton, FailureSnapshot, NewtonCriteria, NewtonRun, NewtonStatus, SoftShunt,
};
pub use transient::{step, TransientOptions};
