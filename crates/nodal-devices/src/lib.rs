//! Element models for the nodal simulator.
//!
//! This crate provides the concrete elements that stamp into the MNA
//! system of [`nodal_core`]:
//!
//! - Passive elements: [`Resistor`], trapezoidal [`Capacitor`] and
//!   [`Inductor`] companion models
//! - Independent sources: [`VoltageSource`], [`CurrentSource`], with
//!   optional [`Waveform`] drive for transient runs
//! - Nonlinear devices: Shockley [`Diode`] (with reverse breakdown),
//!   Ebers-Moll [`Bjt`] (NPN/PNP, Early effect, junction limiting)
//!
//! The [`bjt::add_bjt_extended`] builder wraps the intrinsic BJT in its
//! parasitic resistances and junction capacitances.

pub mod bjt;
pub mod diode;
pub mod error;
pub mod limit;
pub mod passive;
pub mod sources;
pub mod waveforms;

pub use bjt::{add_bjt_extended, Bjt, BjtInternalNodes, BjtOperatingPoint, BjtParams, BjtPolarity};
pub use diode::{thermal_voltage, Diode, DiodeParams};
pub use error::{Error, Result};
pub use limit::{critical_voltage, pnjlim, safe_exp};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use waveforms::Waveform;
