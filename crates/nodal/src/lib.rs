//! # nodal
//!
//! A nonlinear circuit simulation core built on Modified Nodal Analysis
//! and Newton-Raphson iteration, with the globalization machinery that
//! makes DC operating-point discovery robust on stiff analog circuits:
//! source/Gmin homotopy, pn-junction voltage limiting, damped line search,
//! and pseudo-transient continuation.
//!
//! ## Quick start
//!
//! ```rust
//! use nodal::prelude::*;
//!
//! // 1 V source through 1 kΩ into a diode to ground.
//! let mut circuit = Circuit::new();
//! let n_in = circuit.create_node().unwrap();
//! let n_d = circuit.create_named_node("D").unwrap();
//!
//! circuit.add_element(VoltageSource::new("V1", n_in, NodeId::GROUND, 1.0)).unwrap();
//! circuit.add_element(Resistor::new("R1", n_in, n_d, 1000.0).unwrap()).unwrap();
//! circuit
//!     .add_element(Diode::new("D1", n_d, NodeId::GROUND, DiodeParams::default()).unwrap())
//!     .unwrap();
//!
//! let mut x = DVector::zeros(0);
//! let report = solve_dc(&mut circuit, &mut x, &DcOptions::default()).unwrap();
//! assert!(report.converged);
//! let vd = x[n_d.index().unwrap()];
//! assert!(vd > 0.6 && vd < 0.8);
//! ```

pub use nodal_core as core;
pub use nodal_devices as devices;
pub use nodal_solver as solver;

// Convenient re-exports from nodal_core
pub use nodal_core::{Circuit, Element, ElementRef, MnaSystem, Node, NodeId, StampContext};

// Convenient re-exports from nodal_devices
pub use nodal_devices::{
    add_bjt_extended, Bjt, BjtInternalNodes, BjtParams, BjtPolarity, Capacitor, CurrentSource,
    Diode, DiodeParams, Inductor, Resistor, VoltageSource, Waveform,
};

// Convenient re-exports from nodal_solver
pub use nodal_solver::{
    solve_dc, solve_dc_pseudo_transient, step, ConvergenceStats, DcOptions, DcReport,
    GaussianSolver, LinearSolver, NewtonCriteria, NewtonDiagnosis, PseudoTransientOptions,
    TransientOptions,
};

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

/// Prelude module containing commonly used types.
///
/// ```rust
/// use nodal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Circuit, DVector, ElementRef, MnaSystem, NodeId};

    pub use crate::{
        add_bjt_extended, Bjt, BjtParams, BjtPolarity, Capacitor, CurrentSource, Diode,
        DiodeParams, Inductor, Resistor, VoltageSource, Waveform,
    };

    pub use crate::{
        solve_dc, solve_dc_pseudo_transient, step, DcOptions, DcReport, PseudoTransientOptions,
        TransientOptions,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_divider() {
        let mut circuit = Circuit::new();
        let n1 = circuit.create_node().unwrap();
        let n2 = circuit.create_node().unwrap();

        circuit
            .add_element(VoltageSource::new("V1", n1, NodeId::GROUND, 10.0))
            .unwrap();
        circuit
            .add_element(Resistor::new("R1", n1, n2, 1000.0).unwrap())
            .unwrap();
        circuit
            .add_element(Resistor::new("R2", n2, NodeId::GROUND, 1000.0).unwrap())
            .unwrap();

        let mut x = DVector::zeros(0);
        let report = solve_dc(&mut circuit, &mut x, &DcOptions::default()).unwrap();
        assert!(report.converged);
        assert!((x[1] - 5.0).abs() < 1e-6);
    }
}
