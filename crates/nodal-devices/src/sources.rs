//! Independent source models: voltage and current sources.
//!
//! Both scale their value by the homotopy `source_scale`; nothing else in
//! the element library looks at it. A voltage source may carry a
//! [`Waveform`]; callers advance it with [`VoltageSource::set_time`]
//! before each transient step.

use std::any::Any;

use nodal_core::{Element, NodeId, StampContext};

use crate::waveforms::Waveform;

/// An independent voltage source from `pos` to `neg`.
///
/// Owns one branch unknown: its current, flowing out of the positive
/// terminal through the external circuit.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    node_pos: NodeId,
    node_neg: NodeId,
    voltage: f64,
    waveform: Option<Waveform>,
    branch: Option<usize>,
}

impl VoltageSource {
    /// Create a new DC voltage source.
    pub fn new(name: impl Into<String>, node_pos: NodeId, node_neg: NodeId, voltage: f64) -> Self {
        Self {
            name: name.into(),
            node_pos,
            node_neg,
            voltage,
            waveform: None,
            branch: None,
        }
    }

    /// Create a waveform-driven voltage source; its value starts at t = 0.
    pub fn with_waveform(
        name: impl Into<String>,
        node_pos: NodeId,
        node_neg: NodeId,
        waveform: Waveform,
    ) -> Self {
        let voltage = waveform.value_at(0.0);
        Self {
            name: name.into(),
            node_pos,
            node_neg,
            voltage,
            waveform: Some(waveform),
            branch: None,
        }
    }

    /// The present source value in volts.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Retune the source between solves.
    pub fn set_voltage(&mut self, voltage: f64) {
        self.voltage = voltage;
    }

    /// Re-evaluate the waveform at time `t` and update the source value.
    /// No-op for plain DC sources.
    pub fn set_time(&mut self, t: f64) {
        if let Some(w) = &self.waveform {
            self.voltage = w.value_at(t);
        }
    }

    /// The branch row assigned at finalize, if any.
    pub fn branch_index(&self) -> Option<usize> {
        self.branch
    }
}

impl Element for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, ctx: &mut StampContext) {
        // Finalize assigns the branch row before any stamp can run.
        let Some(k) = self.branch else { return };
        let v = self.voltage * ctx.source_scale;
        ctx.system
            .stamp_voltage_source(self.node_pos, self.node_neg, k, v);
    }

    fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        vec![(self.node_pos, self.node_neg)]
    }

    fn branch_count(&self) -> usize {
        1
    }

    fn set_branch_index(&mut self, first: usize) {
        self.branch = Some(first);
    }

    fn is_source(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An independent current source driving current from `node_a` to `node_b`
/// through itself: the current leaves `node_a` and enters `node_b`.
///
/// Declares no DC conduction path; an ideal current source has infinite
/// impedance.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    node_a: NodeId,
    node_b: NodeId,
    current: f64,
}

impl CurrentSource {
    /// Create a new DC current source.
    pub fn new(name: impl Into<String>, node_a: NodeId, node_b: NodeId, current: f64) -> Self {
        Self {
            name: name.into(),
            node_a,
            node_b,
            current,
        }
    }

    /// The present source value in amperes.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Retune the source between solves.
    pub fn set_current(&mut self, current: f64) {
        self.current = current;
    }
}

impl Element for CurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, ctx: &mut StampContext) {
        ctx.system.stamp_current_source(
            self.node_a,
            self.node_b,
            self.current * ctx.source_scale,
        );
    }

    fn is_source(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
