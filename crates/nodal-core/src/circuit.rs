//! Circuit: owner of nodes, elements and the assembled MNA system.

use std::collections::HashMap;
use std::marker::PhantomData;

use nalgebra::DVector;

use crate::element::{Element, StampContext};
use crate::error::{Error, Result};
use crate::mna::MnaSystem;
use crate::node::{Node, NodeId};

/// Typed handle to an element owned by a [`Circuit`].
///
/// Returned by [`Circuit::add_element`]; lets callers reach back into a
/// specific element (e.g. to retune a source between solves) without any
/// shared mutable state.
pub struct ElementRef<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ElementRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ElementRef<T> {}

impl<T> std::fmt::Debug for ElementRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElementRef({})", self.index)
    }
}

/// A circuit: nodes, elements, and the dense MNA system they stamp into.
///
/// The circuit exclusively owns its elements. The Newton/dynamic/branch
/// registries hold indices into the element vector, populated when an
/// element is added and consulted by the solvers during assembly.
///
/// Lifecycle: build (create nodes, add elements), [`finalize`](Circuit::finalize)
/// (freeze counts, assign branch rows, size the system), then solve. Finalize
/// is idempotent and not reversible.
#[derive(Debug)]
pub struct Circuit {
    nodes: Vec<Node>,
    elements: Vec<Box<dyn Element>>,
    /// Indices of elements requiring Newton linearization.
    newton: Vec<usize>,
    /// Indices of elements with time-step companion state.
    dynamic: Vec<usize>,
    /// Indices of branch-owning elements, in insertion order.
    branch: Vec<usize>,
    system: MnaSystem,
    nodeset: HashMap<usize, f64>,
    finalized: bool,
    num_branches: usize,
    last_solution: DVector<f64>,
    final_gmin: f64,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            elements: Vec::new(),
            newton: Vec::new(),
            dynamic: Vec::new(),
            branch: Vec::new(),
            system: MnaSystem::new(0, 0),
            nodeset: HashMap::new(),
            finalized: false,
            num_branches: 0,
            last_solution: DVector::zeros(0),
            final_gmin: 1e-12,
        }
    }

    /// Create a new anonymous node. Nodes are numbered from 0 in creation
    /// order.
    pub fn create_node(&mut self) -> Result<NodeId> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        let id = NodeId::new(self.nodes.len() as i32);
        self.nodes.push(Node::new(id));
        Ok(id)
    }

    /// Create a new named node.
    pub fn create_named_node(&mut self, name: impl Into<String>) -> Result<NodeId> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        let id = NodeId::new(self.nodes.len() as i32);
        self.nodes.push(Node::with_name(id, name));
        Ok(id)
    }

    /// Add an element, classifying its capabilities into the solver
    /// registries. Returns a typed handle for later access.
    pub fn add_element<T: Element + 'static>(&mut self, element: T) -> Result<ElementRef<T>> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        let index = self.elements.len();
        if element.is_nonlinear() {
            self.newton.push(index);
        }
        if element.is_dynamic() {
            self.dynamic.push(index);
        }
        if element.branch_count() > 0 {
            self.branch.push(index);
        }
        self.elements.push(Box::new(element));
        Ok(ElementRef {
            index,
            _marker: PhantomData,
        })
    }

    /// Shared access to an element through its handle.
    pub fn element<T: Element + 'static>(&self, handle: ElementRef<T>) -> &T {
        self.elements[handle.index]
            .as_any()
            .downcast_ref::<T>()
            .expect("element type matches its handle")
    }

    /// Exclusive access to an element through its handle.
    pub fn element_mut<T: Element + 'static>(&mut self, handle: ElementRef<T>) -> &mut T {
        self.elements[handle.index]
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("element type matches its handle")
    }

    /// Freeze node and element counts, assign branch rows and size the
    /// linear system. Idempotent; the element list is immutable afterwards.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let num_nodes = self.nodes.len();
        let mut next_row = num_nodes;
        for &i in &self.branch {
            let count = self.elements[i].branch_count();
            self.elements[i].set_branch_index(next_row);
            next_row += count;
        }
        self.num_branches = next_row - num_nodes;
        self.system.resize(num_nodes, self.num_branches);
        self.finalized = true;
    }

    /// Whether [`finalize`](Circuit::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of nodes (excluding ground).
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of branch unknowns. Zero before finalize.
    pub fn num_branches(&self) -> usize {
        self.num_branches
    }

    /// Total unknown count (nodes + branches). Zero before finalize.
    pub fn size(&self) -> usize {
        self.system.size()
    }

    /// Display name for a node, if one was given at creation.
    pub fn node_name(&self, node: NodeId) -> Option<&str> {
        node.index().and_then(|i| self.nodes.get(i)).and_then(Node::name)
    }

    /// All named nodes, in index order.
    pub fn node_names(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.nodes.iter().filter_map(|n| n.name().map(|s| (n.id(), s)))
    }

    /// Human-readable meaning of unknown `idx`: "V(...)" for node rows,
    /// "I(...)" for branch rows.
    pub fn unknown_meaning(&self, idx: usize) -> String {
        if idx < self.nodes.len() {
            return match self.nodes[idx].name() {
                Some(name) => format!("V({name})"),
                None => format!("V(node {idx})"),
            };
        }
        let mut row = self.nodes.len();
        for &i in &self.branch {
            let count = self.elements[i].branch_count();
            if idx >= row && idx < row + count {
                let name = self.elements[i].name();
                return if name.is_empty() {
                    format!("I(branch {})", idx - self.nodes.len())
                } else {
                    format!("I({name})")
                };
            }
            row += count;
        }
        format!("unknown({idx})")
    }

    /// Record an initial-voltage hint for a node, used as the starting
    /// iterate by the DC solvers.
    pub fn set_nodeset(&mut self, node: NodeId, volts: f64) -> Result<()> {
        match node.index() {
            Some(i) if i < self.nodes.len() => {
                self.nodeset.insert(i, volts);
                Ok(())
            }
            _ => Err(Error::UnknownNode(node.as_i32())),
        }
    }

    /// Write the nodeset hints into an iterate.
    pub fn apply_nodeset(&self, x: &mut DVector<f64>) {
        for (&i, &v) in &self.nodeset {
            if i < x.len() {
                x[i] = v;
            }
        }
    }

    /// Clear the system and stamp every element: linear contributions at
    /// `source_scale`, then the Newton linearizations of nonlinear elements
    /// at their stored limited operating points.
    pub fn assemble(&mut self, source_scale: f64, guess: &DVector<f64>) -> Result<()> {
        if !self.finalized {
            return Err(Error::NotFinalized("assemble"));
        }
        let Self {
            system,
            elements,
            newton,
            ..
        } = self;
        system.clear();
        let mut ctx = StampContext {
            system,
            source_scale,
        };
        for element in elements.iter() {
            element.stamp(&mut ctx);
        }
        for &i in newton.iter() {
            elements[i].stamp_newton(&mut ctx, guess);
        }
        Ok(())
    }

    /// Add a conductance `g` to ground on every node diagonal (the Gmin
    /// shunt).
    pub fn add_gmin(&mut self, g: f64) {
        for i in 0..self.nodes.len() {
            self.system.add_a(i, i, g);
        }
    }

    /// Refresh the limited junction voltages of every Newton element from
    /// the candidate iterate `x_new` against the reference `x_old`.
    pub fn limit_junctions(&mut self, x_new: &DVector<f64>, x_old: &DVector<f64>) {
        let Self {
            elements, newton, ..
        } = self;
        for &i in newton.iter() {
            elements[i].compute_limited_voltages(x_new, x_old);
        }
    }

    /// Begin a time step on every dynamic element.
    pub fn begin_step(&mut self, dt: f64) -> Result<()> {
        let Self {
            elements, dynamic, ..
        } = self;
        for &i in dynamic.iter() {
            elements[i].begin_step(dt)?;
        }
        Ok(())
    }

    /// Commit a converged time step on every dynamic element.
    pub fn commit_step(&mut self, x_solved: &DVector<f64>) {
        let Self {
            elements, dynamic, ..
        } = self;
        for &i in dynamic.iter() {
            elements[i].commit_step(x_solved);
        }
    }

    /// Seed the companion history of every dynamic element from a solved
    /// operating point (typically before the first transient step).
    pub fn initialize_dynamics(&mut self, x: &DVector<f64>) {
        self.commit_step(x);
        self.last_solution = x.clone();
    }

    /// Aggregate DC conduction paths over all elements, for connectivity
    /// auditing.
    pub fn dc_connections(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::new();
        for element in &self.elements {
            out.extend(element.dc_connections());
        }
        out
    }

    /// The assembled linear system.
    pub fn system(&self) -> &MnaSystem {
        &self.system
    }

    /// Mutable access to the linear system (solver-side shunts and boosts).
    pub fn system_mut(&mut self) -> &mut MnaSystem {
        &mut self.system
    }

    /// The most recently stored solution vector.
    pub fn solution(&self) -> &DVector<f64> {
        &self.last_solution
    }

    /// Record a solution vector (done by the solve drivers).
    pub fn store_solution(&mut self, x: &DVector<f64>) {
        self.last_solution = x.clone();
    }

    /// The Gmin actually achieved by the last DC solve.
    pub fn final_gmin(&self) -> f64 {
        self.final_gmin
    }

    /// Record the achieved Gmin (done by the DC driver).
    pub fn set_final_gmin(&mut self, g: f64) {
        self.final_gmin = g;
    }
}
